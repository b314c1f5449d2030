use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session not found: {id}")]
    NotFound { id: String },
    #[error("storage io failed: {message}")]
    Io { message: String },
    #[error("session encode failed: {message}")]
    Encode { message: String },
    #[error("could not determine a data directory for session storage")]
    DataDirUnavailable,
}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        StoreError::Io {
            message: value.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum VcsError {
    #[error("not a git repository: {}", path.display())]
    NotARepository { path: PathBuf },
    #[error("{command} failed: {message}")]
    CommandFailed { command: String, message: String },
    #[error("backend error: {reason}")]
    Backend { reason: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("invalid json: {message}")]
    InvalidJson { message: String },
    #[error("unknown message type: {kind}")]
    UnknownType { kind: String },
    #[error("invalid payload for {kind}: {message}")]
    InvalidPayload { kind: String, message: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {message}", path.display())]
    Read { path: PathBuf, message: String },
    #[error("failed to parse config {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
}
