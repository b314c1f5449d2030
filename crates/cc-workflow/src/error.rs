use cc_core::{StoreError, VcsError};
use cc_serve::ServeError;
use thiserror::Error;

/// Everything a front-end may have to show the user. `Display` is the message.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Not a git repository.")]
    NotAGitRepository,
    #[error("Session not found: {id}")]
    SessionNotFound { id: String },
    #[error("Could not find web UI assets. Set web_root in the config file or CODECHAT_WEB_DIST.")]
    AssetsNotFound,
    #[error(transparent)]
    Vcs(#[from] VcsError),
    #[error(transparent)]
    Store(StoreError),
    #[error(transparent)]
    Serve(#[from] ServeError),
}

impl From<StoreError> for WorkflowError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound { id } => WorkflowError::SessionNotFound { id },
            other => WorkflowError::Store(other),
        }
    }
}
