use crate::server::{Outbound, ServerEvent};
use crate::{static_files, AppState};
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, Utf8Bytes, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::Uri;
use axum::response::{IntoResponse, Response};
use cc_core::protocol::ClientMessage;
use futures::{SinkExt, StreamExt};
use std::sync::atomic::Ordering;
use tokio::sync::mpsc;
use tracing::debug;

/// The UI connects its socket to the same origin it was served from, so one
/// handler answers both upgrades and plain asset requests.
pub(crate) async fn entry(
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    State(state): State<AppState>,
    uri: Uri,
) -> Response {
    match upgrade {
        Ok(ws) => ws
            .on_upgrade(move |socket| handle_socket(socket, state))
            .into_response(),
        Err(_) => static_files::serve(&state.web_root, uri.path()).await,
    }
}

async fn handle_socket(stream: WebSocket, state: AppState) {
    let client_id = state.next_client_id.fetch_add(1, Ordering::Relaxed);
    let (mut sender, mut receiver) = stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();

    if state
        .events
        .send(ServerEvent::Connected { client_id, sender: tx })
        .is_err()
    {
        let _ = sender.send(Message::Close(None)).await;
        return;
    }
    debug!(client_id, "reviewer connected");

    let mut writer = tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            match outbound {
                Outbound::Frame(text) => {
                    if sender.send(text_message(text)).await.is_err() {
                        break;
                    }
                }
                Outbound::Close => break,
            }
        }
        let _ = sender.send(Message::Close(None)).await;
    });

    loop {
        tokio::select! {
            _ = &mut writer => break,
            inbound = receiver.next() => {
                let Some(Ok(message)) = inbound else {
                    break;
                };
                match message {
                    Message::Text(text) => match ClientMessage::parse(text.as_str()) {
                        Ok(message) => {
                            let _ = state.events.send(ServerEvent::Client(message));
                        }
                        Err(err) => debug!(client_id, error = %err, "dropping client message"),
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    }

    writer.abort();
    let _ = state.events.send(ServerEvent::Disconnected { client_id });
    debug!(client_id, "reviewer disconnected");
}

fn text_message(value: String) -> Message {
    Message::Text(Utf8Bytes::from(value))
}
