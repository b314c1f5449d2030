use cc_core::testutil::{sample_diff, FixedDiffSource, MemoryStore};
use cc_core::types::{CommentAnchor, DiffSide, ReviewStatus, Session};
use cc_serve::{ReviewServer, ReviewServerOptions, ServeError};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct Fixture {
    session: Session,
    store: Arc<MemoryStore>,
    source: Arc<FixedDiffSource>,
}

fn fixture(root: &Path) -> Fixture {
    let diff = sample_diff("src/lib.rs", 2, 1);
    let session = Session::new(
        root.to_path_buf(),
        diff.unified.clone(),
        diff.files.clone(),
        Some("Tighten parser".to_string()),
    );
    let store = Arc::new(MemoryStore::new());
    store.insert(session.clone());
    Fixture {
        session,
        store,
        source: Arc::new(FixedDiffSource::new(root, diff)),
    }
}

fn options(web_root: &Path) -> ReviewServerOptions {
    ReviewServerOptions {
        port: 0,
        timeout: Duration::from_secs(30),
        disconnect_grace: Duration::from_secs(5),
        debounce: Duration::from_millis(50),
        web_root: web_root.to_path_buf(),
        watch: false,
    }
}

async fn start(fixture: &Fixture, options: ReviewServerOptions) -> ReviewServer {
    ReviewServer::start(
        fixture.session.clone(),
        Arc::clone(&fixture.store),
        Arc::clone(&fixture.source),
        options,
    )
    .await
    .unwrap()
}

async fn connect(port: u16) -> Socket {
    let (socket, _) = connect_async(format!("ws://127.0.0.1:{port}/"))
        .await
        .unwrap();
    socket
}

async fn recv(socket: &mut Socket) -> Value {
    loop {
        let frame = timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("socket closed")
            .expect("socket error");
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn send(socket: &mut Socket, value: Value) {
    socket.send(Message::Text(value.to_string())).await.unwrap();
}

async fn expect_closed(socket: &mut Socket) {
    loop {
        let frame = timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("socket stayed open");
        match frame {
            None | Some(Err(_) | Ok(Message::Close(_))) => return,
            Some(Ok(Message::Text(text))) => panic!("unexpected frame: {text}"),
            Some(Ok(_)) => {}
        }
    }
}

fn add_comment(body: &str) -> Value {
    json!({
        "type": "add_comment",
        "data": { "filePath": "src/lib.rs", "line": 3, "side": "new", "body": body }
    })
}

async fn wait(server: ReviewServer) -> cc_core::types::ReviewResult {
    timeout(Duration::from_secs(5), server.wait())
        .await
        .expect("review never completed")
        .unwrap()
}

#[tokio::test]
async fn every_client_gets_init_then_comment_broadcasts() {
    let repo = tempfile::tempdir().unwrap();
    let fixture = fixture(repo.path());
    let server = start(&fixture, options(repo.path())).await;
    assert_eq!(server.url(), format!("http://127.0.0.1:{}", server.port()));

    let mut first = connect(server.port()).await;
    let init = recv(&mut first).await;
    assert_eq!(init["type"], "init");
    assert_eq!(init["data"]["id"], fixture.session.id.as_str());
    assert_eq!(init["data"]["description"], "Tighten parser");
    assert_eq!(init["data"]["files"][0]["path"], "src/lib.rs");

    let mut second = connect(server.port()).await;
    assert_eq!(recv(&mut second).await["type"], "init");

    send(&mut first, add_comment("rename this")).await;
    let seen_first = recv(&mut first).await;
    let seen_second = recv(&mut second).await;
    assert_eq!(seen_first["type"], "comment_added");
    assert_eq!(seen_first, seen_second);
    assert_eq!(seen_first["data"]["body"], "rename this");
    assert_eq!(seen_first["data"]["resolved"], false);
    assert!(seen_first["data"]["id"].as_str().unwrap().starts_with("cmt_"));

    let stored = fixture.store.get(fixture.session.id.as_str()).unwrap();
    assert_eq!(stored.comments.len(), 1);
    assert_eq!(stored.status, ReviewStatus::Pending);
}

#[tokio::test]
async fn submit_with_open_comments_requests_changes() {
    let repo = tempfile::tempdir().unwrap();
    let fixture = fixture(repo.path());
    let server = start(&fixture, options(repo.path())).await;
    let mut socket = connect(server.port()).await;
    recv(&mut socket).await;

    send(&mut socket, add_comment("missing test")).await;
    recv(&mut socket).await;
    send(
        &mut socket,
        json!({ "type": "submit_review", "data": { "summary": "Close, but not yet" } }),
    )
    .await;
    assert_eq!(recv(&mut socket).await["type"], "review_complete");
    expect_closed(&mut socket).await;

    let result = wait(server).await;
    assert_eq!(result.session_id, fixture.session.id);
    assert_eq!(result.status, ReviewStatus::ChangesRequested);
    assert_eq!(result.summary.as_deref(), Some("Close, but not yet"));
    assert_eq!(result.comments.len(), 1);

    let stored = fixture.store.get(fixture.session.id.as_str()).unwrap();
    assert_eq!(stored.status, ReviewStatus::ChangesRequested);
}

#[tokio::test]
async fn second_submit_is_ignored() {
    let repo = tempfile::tempdir().unwrap();
    let fixture = fixture(repo.path());
    let server = start(&fixture, options(repo.path())).await;
    let mut socket = connect(server.port()).await;
    recv(&mut socket).await;

    send(&mut socket, json!({ "type": "submit_review" })).await;
    let _ = socket
        .send(Message::Text(json!({ "type": "submit_review" }).to_string()))
        .await;
    assert_eq!(recv(&mut socket).await["type"], "review_complete");
    expect_closed(&mut socket).await;

    let result = wait(server).await;
    assert_eq!(result.status, ReviewStatus::Approved);
    assert_eq!(result.summary, None);
    assert_eq!(fixture.store.save_count(), 1);
}

#[tokio::test]
async fn malformed_frames_are_dropped_silently() {
    let repo = tempfile::tempdir().unwrap();
    let fixture = fixture(repo.path());
    let server = start(&fixture, options(repo.path())).await;
    let mut socket = connect(server.port()).await;
    recv(&mut socket).await;

    socket
        .send(Message::Text("not json".to_string()))
        .await
        .unwrap();
    send(&mut socket, json!({ "type": "approve_everything" })).await;
    send(&mut socket, add_comment("   ")).await;
    send(
        &mut socket,
        json!({ "type": "add_comment", "data": { "filePath": "a.rs", "line": 0, "side": "new", "body": "x" } }),
    )
    .await;
    send(
        &mut socket,
        json!({ "type": "edit_comment", "data": { "id": "cmt_unknown", "body": "x" } }),
    )
    .await;
    send(&mut socket, add_comment("valid")).await;

    let next = recv(&mut socket).await;
    assert_eq!(next["type"], "comment_added");
    assert_eq!(next["data"]["body"], "valid");
    assert_eq!(
        fixture
            .store
            .get(fixture.session.id.as_str())
            .unwrap()
            .comments
            .len(),
        1
    );
}

#[tokio::test]
async fn resolved_comments_cannot_be_edited_or_deleted() {
    let repo = tempfile::tempdir().unwrap();
    let mut fixture = fixture(repo.path());
    let anchor = CommentAnchor {
        file_path: "src/lib.rs".to_string(),
        line: 1,
        end_line: None,
        side: DiffSide::New,
    };
    let resolved_id = fixture
        .session
        .add_comment(anchor.clone(), "addressed".to_string())
        .id;
    fixture.session.comments[0].resolved = true;
    let open_id = fixture.session.add_comment(anchor, "still open".to_string()).id;
    fixture.store.insert(fixture.session.clone());

    let server = start(&fixture, options(repo.path())).await;
    let mut socket = connect(server.port()).await;
    recv(&mut socket).await;

    send(
        &mut socket,
        json!({ "type": "edit_comment", "data": { "id": resolved_id.as_str(), "body": "reopened" } }),
    )
    .await;
    send(
        &mut socket,
        json!({ "type": "delete_comment", "data": { "id": resolved_id.as_str() } }),
    )
    .await;
    send(
        &mut socket,
        json!({ "type": "edit_comment", "data": { "id": open_id.as_str(), "body": "reworded" } }),
    )
    .await;

    let edited = recv(&mut socket).await;
    assert_eq!(edited["type"], "comment_edited");
    assert_eq!(edited["data"], json!({ "id": open_id.as_str(), "body": "reworded" }));

    send(
        &mut socket,
        json!({ "type": "delete_comment", "data": { "id": open_id.as_str() } }),
    )
    .await;
    let deleted = recv(&mut socket).await;
    assert_eq!(deleted["type"], "comment_deleted");
    assert_eq!(deleted["data"]["id"], open_id.as_str());

    let stored = fixture.store.get(fixture.session.id.as_str()).unwrap();
    assert_eq!(stored.comments.len(), 1);
    assert_eq!(stored.comments[0].body, "addressed");
}

#[tokio::test]
async fn timeout_submits_automatically() {
    let repo = tempfile::tempdir().unwrap();
    let fixture = fixture(repo.path());
    let mut opts = options(repo.path());
    opts.timeout = Duration::from_millis(200);
    let server = start(&fixture, opts).await;

    let result = wait(server).await;
    assert_eq!(result.status, ReviewStatus::Approved);
    let stored = fixture.store.get(fixture.session.id.as_str()).unwrap();
    assert_eq!(stored.status, ReviewStatus::Approved);
}

#[tokio::test]
async fn abandoned_review_submits_after_grace() {
    let repo = tempfile::tempdir().unwrap();
    let fixture = fixture(repo.path());
    let mut opts = options(repo.path());
    opts.disconnect_grace = Duration::from_millis(100);
    let server = start(&fixture, opts).await;

    let mut socket = connect(server.port()).await;
    recv(&mut socket).await;
    send(&mut socket, add_comment("unfinished thought")).await;
    recv(&mut socket).await;
    socket.close(None).await.unwrap();

    let result = wait(server).await;
    assert_eq!(result.status, ReviewStatus::ChangesRequested);
    assert_eq!(result.summary, None);
}

#[tokio::test]
async fn reconnect_within_grace_keeps_round_open() {
    let repo = tempfile::tempdir().unwrap();
    let fixture = fixture(repo.path());
    let mut opts = options(repo.path());
    opts.disconnect_grace = Duration::from_millis(400);
    let server = start(&fixture, opts).await;
    let port = server.port();

    let mut first = connect(port).await;
    recv(&mut first).await;
    first.close(None).await.unwrap();
    sleep(Duration::from_millis(100)).await;

    let mut second = connect(port).await;
    assert_eq!(recv(&mut second).await["type"], "init");
    sleep(Duration::from_millis(600)).await;

    send(&mut second, add_comment("after reload")).await;
    assert_eq!(recv(&mut second).await["type"], "comment_added");
    send(&mut second, json!({ "type": "submit_review", "data": null })).await;
    assert_eq!(recv(&mut second).await["type"], "review_complete");

    let result = wait(server).await;
    assert_eq!(result.status, ReviewStatus::ChangesRequested);
    assert_eq!(result.comments[0].body, "after reload");
}

#[tokio::test]
async fn persistence_failure_does_not_block_the_round() {
    let repo = tempfile::tempdir().unwrap();
    let fixture = fixture(repo.path());
    fixture.store.fail_saves(true);
    let server = start(&fixture, options(repo.path())).await;
    let mut socket = connect(server.port()).await;
    recv(&mut socket).await;

    send(&mut socket, add_comment("kept in memory")).await;
    assert_eq!(recv(&mut socket).await["type"], "comment_added");
    send(&mut socket, json!({ "type": "submit_review" })).await;
    assert_eq!(recv(&mut socket).await["type"], "review_complete");

    let result = wait(server).await;
    assert_eq!(result.status, ReviewStatus::ChangesRequested);
    let stored = fixture.store.get(fixture.session.id.as_str()).unwrap();
    assert_eq!(stored.status, ReviewStatus::Pending);
}

#[tokio::test]
async fn occupied_port_is_a_bind_error() {
    let repo = tempfile::tempdir().unwrap();
    let fixture = fixture(repo.path());
    let first = start(&fixture, options(repo.path())).await;

    let mut opts = options(repo.path());
    opts.port = first.port();
    let second = ReviewServer::start(
        fixture.session.clone(),
        Arc::clone(&fixture.store),
        Arc::clone(&fixture.source),
        opts,
    )
    .await;
    assert!(matches!(second, Err(ServeError::Bind { .. })));
}

async fn http_get(port: u16, path: &str) -> String {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = String::new();
    timeout(Duration::from_secs(5), stream.read_to_string(&mut response))
        .await
        .unwrap()
        .unwrap();
    response
}

#[tokio::test]
async fn root_serves_ui_bundle_alongside_socket() {
    let repo = tempfile::tempdir().unwrap();
    let web = tempfile::tempdir().unwrap();
    std::fs::write(web.path().join("index.html"), "<div id=app></div>").unwrap();
    std::fs::write(web.path().join("app.js"), "console.log(1)").unwrap();
    let fixture = fixture(repo.path());
    let server = start(&fixture, options(web.path())).await;

    let index = http_get(server.port(), "/").await;
    assert!(index.starts_with("HTTP/1.1 200"));
    assert!(index.contains("<div id=app></div>"));

    let script = http_get(server.port(), "/app.js").await;
    assert!(script.starts_with("HTTP/1.1 200"));
    assert!(script.to_ascii_lowercase().contains("javascript"));

    let route = http_get(server.port(), "/sessions/ses_123").await;
    assert!(route.contains("<div id=app></div>"));

    let mut socket = connect(server.port()).await;
    assert_eq!(recv(&mut socket).await["type"], "init");
}

fn canonical_tempdir() -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    (dir, root)
}

#[tokio::test]
async fn file_changes_push_a_refreshed_diff() {
    let (_dir, root) = canonical_tempdir();
    let fixture = fixture(&root);
    let mut opts = options(&root);
    opts.watch = true;
    let server = start(&fixture, opts).await;
    let mut socket = connect(server.port()).await;
    recv(&mut socket).await;

    fixture.source.fail_with("index.lock exists");
    std::fs::write(root.join("scratch.txt"), "one").unwrap();
    sleep(Duration::from_millis(400)).await;

    fixture.source.set(sample_diff("src/new.rs", 5, 0));
    std::fs::write(root.join("scratch.txt"), "two").unwrap();

    let update = recv(&mut socket).await;
    assert_eq!(update["type"], "diff_updated");
    assert_eq!(update["data"]["files"][0]["path"], "src/new.rs");
    assert_eq!(update["data"]["files"][0]["status"], "modified");
    assert!(fixture.source.calls() >= 2);

    let stored = fixture.store.get(fixture.session.id.as_str()).unwrap();
    assert_eq!(stored.files[0].path, "src/new.rs");
}
