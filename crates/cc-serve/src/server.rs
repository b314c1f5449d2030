use crate::error::ServeError;
use crate::{app, watcher, AppState};
use cc_core::protocol::{ClientMessage, ServerMessage};
use cc_core::types::{ReviewResult, Session};
use cc_core::{DiffSource, SessionStore, StoreError};
use notify::RecommendedWatcher;
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Sleep};
use tracing::{debug, error, info, warn};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct ReviewServerOptions {
    /// 0 picks a free port.
    pub port: u16,
    pub timeout: Duration,
    pub disconnect_grace: Duration,
    pub debounce: Duration,
    pub web_root: PathBuf,
    pub watch: bool,
}

impl Default for ReviewServerOptions {
    fn default() -> Self {
        Self {
            port: 0,
            timeout: Duration::from_secs(30 * 60),
            disconnect_grace: Duration::from_secs(5),
            debounce: Duration::from_millis(300),
            web_root: PathBuf::from("."),
            watch: true,
        }
    }
}

/// Frames queued for one connected browser.
#[derive(Debug)]
pub(crate) enum Outbound {
    Frame(String),
    Close,
}

pub(crate) enum ServerEvent {
    Connected {
        client_id: u64,
        sender: mpsc::UnboundedSender<Outbound>,
    },
    Disconnected {
        client_id: u64,
    },
    Client(ClientMessage),
    FilesChanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Reviewer,
    Timeout,
    Abandoned,
}

/// A running review round bound to a loopback port.
pub struct ReviewServer {
    addr: SocketAddr,
    url: String,
    result: oneshot::Receiver<ReviewResult>,
}

impl ReviewServer {
    pub async fn start<S, D>(
        session: Session,
        store: Arc<S>,
        diff_source: Arc<D>,
        options: ReviewServerOptions,
    ) -> Result<Self, ServeError>
    where
        S: SessionStore + 'static,
        D: DiffSource + 'static,
    {
        let requested = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), options.port);
        let listener = TcpListener::bind(requested)
            .await
            .map_err(|source| ServeError::Bind {
                addr: requested,
                source,
            })?;
        let addr = listener.local_addr()?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let router = app(AppState::new(options.web_root.clone(), events_tx.clone()));
        let task = tokio::spawn(async move {
            let served = axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(err) = served {
                warn!(error = %err, "review server stopped with error");
            }
        });

        let watcher = if options.watch {
            watcher::watch_repository(&session.repo_path, events_tx)
        } else {
            drop(events_tx);
            None
        };

        let (result_tx, result_rx) = oneshot::channel();
        info!(
            session_id = %session.id,
            url = %format!("http://{addr}"),
            files = session.files.len(),
            "review server listening"
        );
        let actor = SessionActor {
            session,
            store,
            diff_source,
            clients: BTreeMap::new(),
            submitted: false,
            options,
            watcher,
            server: Some(HttpTask {
                shutdown: shutdown_tx,
                task,
            }),
            result: Some(result_tx),
        };
        tokio::spawn(actor.run(events_rx));

        Ok(Self {
            addr,
            url: format!("http://{addr}"),
            result: result_rx,
        })
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Resolves exactly once, when the round is submitted.
    pub async fn wait(self) -> Result<ReviewResult, ServeError> {
        self.result.await.map_err(|_| ServeError::Closed)
    }
}

struct HttpTask {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl HttpTask {
    async fn stop(mut self) {
        let _ = self.shutdown.send(());
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut self.task)
            .await
            .is_err()
        {
            debug!("review server did not drain in time; aborting");
            self.task.abort();
        }
    }
}

/// Sole owner of the session while the round is open. Every mutation and
/// broadcast happens on this task, so clients observe one total order.
struct SessionActor<S, D> {
    session: Session,
    store: Arc<S>,
    diff_source: Arc<D>,
    clients: BTreeMap<u64, mpsc::UnboundedSender<Outbound>>,
    submitted: bool,
    options: ReviewServerOptions,
    watcher: Option<RecommendedWatcher>,
    server: Option<HttpTask>,
    result: Option<oneshot::Sender<ReviewResult>>,
}

async fn fire(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(timer) => timer.as_mut().await,
        None => std::future::pending().await,
    }
}

impl<S, D> SessionActor<S, D>
where
    S: SessionStore + 'static,
    D: DiffSource + 'static,
{
    async fn run(mut self, mut events: mpsc::UnboundedReceiver<ServerEvent>) {
        let deadline = sleep(self.options.timeout);
        tokio::pin!(deadline);
        let mut grace: Option<Pin<Box<Sleep>>> = None;
        let mut debounce: Option<Pin<Box<Sleep>>> = None;

        while !self.submitted {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else {
                        self.submit(None, Trigger::Abandoned).await;
                        break;
                    };
                    match event {
                        ServerEvent::Connected { client_id, sender } => {
                            grace = None;
                            self.connect(client_id, sender);
                        }
                        ServerEvent::Disconnected { client_id } => {
                            if self.clients.remove(&client_id).is_some() && self.clients.is_empty() {
                                debug!(grace = ?self.options.disconnect_grace, "last reviewer left");
                                grace = Some(Box::pin(sleep(self.options.disconnect_grace)));
                            }
                        }
                        ServerEvent::Client(message) => self.handle(message).await,
                        ServerEvent::FilesChanged => {
                            debounce = Some(Box::pin(sleep(self.options.debounce)));
                        }
                    }
                }
                () = &mut deadline => {
                    info!(session_id = %self.session.id, "review timed out");
                    self.submit(None, Trigger::Timeout).await;
                }
                () = fire(&mut grace) => {
                    grace = None;
                    info!(session_id = %self.session.id, "reviewer did not reconnect");
                    self.submit(None, Trigger::Abandoned).await;
                }
                () = fire(&mut debounce) => {
                    debounce = None;
                    self.refresh_diff().await;
                }
            }
        }
    }

    fn connect(&mut self, client_id: u64, sender: mpsc::UnboundedSender<Outbound>) {
        let init = ServerMessage::Init(self.session.clone()).to_json();
        let _ = sender.send(Outbound::Frame(init));
        self.clients.insert(client_id, sender);
    }

    async fn handle(&mut self, message: ClientMessage) {
        match message {
            ClientMessage::AddComment { anchor, body } => {
                let comment = self.session.add_comment(anchor, body);
                debug!(comment_id = %comment.id, file = %comment.file_path, "comment added");
                self.persist_logged();
                self.broadcast(&ServerMessage::CommentAdded(comment));
            }
            ClientMessage::EditComment { id, body } => {
                let Some(comment) = self.session.edit_comment(&id, body) else {
                    debug!(comment_id = %id, "ignoring edit of unknown or resolved comment");
                    return;
                };
                let message = ServerMessage::CommentEdited {
                    id: comment.id.clone(),
                    body: comment.body.clone(),
                };
                self.persist_logged();
                self.broadcast(&message);
            }
            ClientMessage::DeleteComment { id } => {
                let Some(comment) = self.session.delete_comment(&id) else {
                    debug!(comment_id = %id, "ignoring delete of unknown or resolved comment");
                    return;
                };
                self.persist_logged();
                self.broadcast(&ServerMessage::CommentDeleted { id: comment.id });
            }
            ClientMessage::SubmitReview { summary } => {
                self.submit(summary, Trigger::Reviewer).await;
            }
        }
    }

    fn persist(&mut self) -> Result<(), StoreError> {
        self.store.save(&mut self.session)
    }

    fn persist_logged(&mut self) {
        if let Err(err) = self.persist() {
            warn!(session_id = %self.session.id, error = %err, "failed to persist session");
        }
    }

    fn broadcast(&self, message: &ServerMessage) {
        let frame = message.to_json();
        for sender in self.clients.values() {
            let _ = sender.send(Outbound::Frame(frame.clone()));
        }
    }

    async fn refresh_diff(&mut self) {
        let source = Arc::clone(&self.diff_source);
        let root = self.session.repo_path.clone();
        let computed = tokio::task::spawn_blocking(move || source.diff(&root)).await;
        let diff = match computed {
            Ok(Ok(diff)) => diff,
            Ok(Err(err)) => {
                debug!(error = %err, "live diff refresh failed");
                return;
            }
            Err(err) => {
                debug!(error = %err, "live diff refresh panicked");
                return;
            }
        };
        if diff.unified == self.session.diff {
            return;
        }
        self.session.replace_diff(diff.unified, diff.files);
        debug!(files = self.session.files.len(), "diff refreshed");
        self.persist_logged();
        self.broadcast(&ServerMessage::DiffUpdated {
            diff: self.session.diff.clone(),
            files: self.session.files.clone(),
        });
    }

    async fn submit(&mut self, summary: Option<String>, trigger: Trigger) {
        if self.submitted {
            return;
        }
        self.submitted = true;

        let result = self.session.conclude(summary);
        if let Err(err) = self.persist() {
            if trigger == Trigger::Reviewer {
                warn!(session_id = %self.session.id, error = %err, "failed to persist submitted review");
            } else {
                error!(session_id = %self.session.id, error = %err, "failed to persist automatically submitted review");
            }
        }
        info!(
            session_id = %self.session.id,
            status = %result.status,
            comments = result.comments.len(),
            trigger = ?trigger,
            "review submitted"
        );

        self.broadcast(&ServerMessage::ReviewComplete);
        self.watcher = None;
        for sender in std::mem::take(&mut self.clients).into_values() {
            let _ = sender.send(Outbound::Close);
        }
        if let Some(server) = self.server.take() {
            server.stop().await;
        }
        if let Some(result_tx) = self.result.take() {
            let _ = result_tx.send(result);
        }
    }
}
