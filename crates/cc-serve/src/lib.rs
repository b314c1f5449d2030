//! HTTP and WebSocket front of a single review round.
//!
//! [`ReviewServer`] serves the reviewer UI, keeps every connected browser in
//! sync with the session, and resolves once the review is submitted, either
//! explicitly or by timeout or abandonment.

pub mod error;
pub mod server;
pub mod static_files;
pub mod watcher;
mod ws;

pub use error::ServeError;
pub use server::{ReviewServer, ReviewServerOptions};

use axum::Router;
use server::ServerEvent;
use std::path::PathBuf;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    web_root: Arc<PathBuf>,
    events: mpsc::UnboundedSender<ServerEvent>,
    next_client_id: Arc<AtomicU64>,
}

impl AppState {
    pub(crate) fn new(web_root: PathBuf, events: mpsc::UnboundedSender<ServerEvent>) -> Self {
        Self {
            web_root: Arc::new(web_root),
            events,
            next_client_id: Arc::new(AtomicU64::new(1)),
        }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .fallback(ws::entry)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
