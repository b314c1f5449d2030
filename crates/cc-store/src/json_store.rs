use crate::fsutil::atomic_write;
use cc_core::error::StoreError;
use cc_core::store::SessionStore;
use cc_core::types::{FileSummary, Session};
use cc_core::Settings;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

const REPO_HASH_LEN: usize = 16;
const EXTENSION: &str = "json";

/// Stable, path-safe key for a canonical repository path.
pub fn repo_hash(repo_path: &Path) -> String {
    let digest = Sha256::digest(repo_path.to_string_lossy().as_bytes());
    let mut hash = hex::encode(digest);
    hash.truncate(REPO_HASH_LEN);
    hash
}

/// One pretty-printed JSON file per session, named `<repo hash>-<session id>.json`.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, StoreError> {
        settings
            .sessions_dir()
            .map(Self::new)
            .ok_or(StoreError::DataDirUnavailable)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, session: &Session) -> PathBuf {
        self.dir.join(format!(
            "{}-{}.{EXTENSION}",
            repo_hash(&session.repo_path),
            session.id
        ))
    }

    fn entries(&self) -> Result<Vec<(String, PathBuf)>, StoreError> {
        let read_dir = match fs::read_dir(&self.dir) {
            Ok(read_dir) => read_dir,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut entries = Vec::new();
        for entry in read_dir {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') || !name.ends_with(&format!(".{EXTENSION}")) {
                continue;
            }
            entries.push((name, entry.path()));
        }
        Ok(entries)
    }

    fn repo_sessions(&self, repo_path: &Path) -> Result<Vec<Session>, StoreError> {
        let prefix = format!("{}-", repo_hash(repo_path));
        let mut sessions = Vec::new();
        for (name, path) in self.entries()? {
            if !name.starts_with(&prefix) {
                continue;
            }
            match read_session(&path) {
                Ok(session) if session.repo_path == repo_path => sessions.push(session),
                Ok(_) => {}
                Err(message) => {
                    warn!(path = %path.display(), error = %message, "skipping unreadable session file");
                }
            }
        }
        Ok(sessions)
    }
}

fn read_session(path: &Path) -> Result<Session, String> {
    let raw = fs::read_to_string(path).map_err(|err| err.to_string())?;
    serde_json::from_str(&raw).map_err(|err| err.to_string())
}

impl SessionStore for JsonFileStore {
    fn create(
        &self,
        repo_path: &Path,
        diff: String,
        files: Vec<FileSummary>,
        description: Option<String>,
    ) -> Result<Session, StoreError> {
        let mut session = Session::new(repo_path.to_path_buf(), diff, files, description);
        self.save(&mut session)?;
        Ok(session)
    }

    fn load(&self, id: &str) -> Result<Session, StoreError> {
        let not_found = || StoreError::NotFound { id: id.to_string() };
        if id.is_empty() {
            return Err(not_found());
        }
        let suffix = format!("-{id}.{EXTENSION}");
        let Some((_, path)) = self
            .entries()?
            .into_iter()
            .find(|(name, _)| name.ends_with(&suffix))
        else {
            return Err(not_found());
        };
        match read_session(&path) {
            Ok(session) if session.id.as_str() == id => Ok(session),
            Ok(_) => Err(not_found()),
            Err(message) => {
                warn!(path = %path.display(), error = %message, "session file is corrupted");
                Err(not_found())
            }
        }
    }

    fn save(&self, session: &mut Session) -> Result<(), StoreError> {
        session.updated_at = Utc::now();
        let data = serde_json::to_vec_pretty(session).map_err(|err| StoreError::Encode {
            message: err.to_string(),
        })?;
        atomic_write(&self.path_for(session), &data)?;
        Ok(())
    }

    fn find_latest_by_repo(&self, repo_path: &Path) -> Result<Option<Session>, StoreError> {
        Ok(self
            .repo_sessions(repo_path)?
            .into_iter()
            .max_by_key(|session| session.updated_at))
    }

    fn list_by_repo(&self, repo_path: &Path) -> Result<Vec<Session>, StoreError> {
        let mut sessions = self.repo_sessions(repo_path)?;
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }

    fn prune_expired(&self, max_age: Duration) -> Result<usize, StoreError> {
        let read_dir = match fs::read_dir(&self.dir) {
            Ok(read_dir) => read_dir,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(err.into()),
        };
        let now = SystemTime::now();
        let mut removed = 0;
        for entry in read_dir.filter_map(Result::ok) {
            let path = entry.path();
            let Ok(modified) = entry.metadata().and_then(|meta| meta.modified()) else {
                continue;
            };
            let expired = now
                .duration_since(modified)
                .is_ok_and(|age| age > max_age);
            if !expired {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(err) => debug!(path = %path.display(), error = %err, "failed to prune session file"),
            }
        }
        if removed > 0 {
            debug!(removed, "pruned expired session files");
        }
        Ok(removed)
    }
}
