use crate::error::StoreError;
use crate::types::{FileSummary, Session};
use std::path::Path;
use std::time::Duration;

/// Durable mapping from (repository, session id) to a session record.
pub trait SessionStore: Send + Sync {
    fn create(
        &self,
        repo_path: &Path,
        diff: String,
        files: Vec<FileSummary>,
        description: Option<String>,
    ) -> Result<Session, StoreError>;

    /// Corrupted records are reported as `NotFound`.
    fn load(&self, id: &str) -> Result<Session, StoreError>;

    /// Refreshes `updated_at` and writes the whole record atomically.
    fn save(&self, session: &mut Session) -> Result<(), StoreError>;

    fn find_latest_by_repo(&self, repo_path: &Path) -> Result<Option<Session>, StoreError>;

    /// Newest first.
    fn list_by_repo(&self, repo_path: &Path) -> Result<Vec<Session>, StoreError>;

    /// Deletes records untouched for longer than `max_age`; returns how many went.
    fn prune_expired(&self, max_age: Duration) -> Result<usize, StoreError>;
}
