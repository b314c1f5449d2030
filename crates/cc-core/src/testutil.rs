//! In-memory collaborators for exercising the resolver, server and workflow
//! without touching the filesystem or git.

use crate::diff::{Diff, DiffSource};
use crate::error::{StoreError, VcsError};
use crate::store::SessionStore;
use crate::types::{FileStatus, FileSummary, Session};
use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
pub struct MemoryStore {
    sessions: Mutex<HashMap<String, Session>>,
    saves: AtomicUsize,
    fail_saves: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: Session) {
        lock(&self.sessions).insert(session.id.to_string(), session);
    }

    pub fn get(&self, id: &str) -> Option<Session> {
        lock(&self.sessions).get(id).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.sessions).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Makes every subsequent `save` fail with an io error.
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

impl SessionStore for MemoryStore {
    fn create(
        &self,
        repo_path: &Path,
        diff: String,
        files: Vec<FileSummary>,
        description: Option<String>,
    ) -> Result<Session, StoreError> {
        let session = Session::new(repo_path.to_path_buf(), diff, files, description);
        self.insert(session.clone());
        Ok(session)
    }

    fn load(&self, id: &str) -> Result<Session, StoreError> {
        self.get(id).ok_or_else(|| StoreError::NotFound { id: id.to_string() })
    }

    fn save(&self, session: &mut Session) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Io {
                message: "disk full".to_string(),
            });
        }
        session.updated_at = Utc::now();
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.insert(session.clone());
        Ok(())
    }

    fn find_latest_by_repo(&self, repo_path: &Path) -> Result<Option<Session>, StoreError> {
        Ok(self.list_by_repo(repo_path)?.into_iter().next())
    }

    fn list_by_repo(&self, repo_path: &Path) -> Result<Vec<Session>, StoreError> {
        let mut sessions: Vec<Session> = lock(&self.sessions)
            .values()
            .filter(|session| session.repo_path == repo_path)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }

    fn prune_expired(&self, _max_age: Duration) -> Result<usize, StoreError> {
        Ok(0)
    }
}

/// A diff source whose answer is set by the test.
pub struct FixedDiffSource {
    root: PathBuf,
    diff: Mutex<Result<Diff, String>>,
    calls: AtomicUsize,
}

impl FixedDiffSource {
    pub fn new(root: impl Into<PathBuf>, diff: Diff) -> Self {
        Self {
            root: root.into(),
            diff: Mutex::new(Ok(diff)),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set(&self, diff: Diff) {
        *lock(&self.diff) = Ok(diff);
    }

    pub fn fail_with(&self, reason: &str) {
        *lock(&self.diff) = Err(reason.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DiffSource for FixedDiffSource {
    fn is_repository(&self, path: &Path) -> bool {
        path.starts_with(&self.root)
    }

    fn repo_root(&self, path: &Path) -> Result<PathBuf, VcsError> {
        if self.is_repository(path) {
            Ok(self.root.clone())
        } else {
            Err(VcsError::NotARepository {
                path: path.to_path_buf(),
            })
        }
    }

    fn diff(&self, _repo_root: &Path) -> Result<Diff, VcsError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.diff)
            .clone()
            .map_err(|reason| VcsError::Backend { reason })
    }
}

/// One modified file with the given counts, plus a matching unified diff body.
pub fn sample_diff(path: &str, additions: u32, deletions: u32) -> Diff {
    let mut unified = format!(
        "diff --git a/{path} b/{path}\n--- a/{path}\n+++ b/{path}\n@@ -1,{deletions} +1,{additions} @@\n"
    );
    for index in 0..deletions {
        unified.push_str(&format!("-old line {index}\n"));
    }
    for index in 0..additions {
        unified.push_str(&format!("+new line {index}\n"));
    }
    Diff {
        unified,
        files: vec![FileSummary {
            path: path.to_string(),
            old_path: None,
            status: FileStatus::Modified,
            additions,
            deletions,
        }],
    }
}
