use std::net::SocketAddr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("failed to bind review server to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("review server io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("review server stopped before the review completed")]
    Closed,
}
