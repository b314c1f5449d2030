//! Create-or-resume policy for review sessions.

use crate::error::StoreError;
use crate::store::SessionStore;
use crate::types::{FileSummary, Reply, ReviewStatus, Session};
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    pub session_id: Option<String>,
    pub description: Option<String>,
    pub replies: Vec<Reply>,
}

#[derive(Debug, Clone)]
pub struct Resolution {
    pub session: Session,
    pub created: bool,
}

pub fn resolve_session<S: SessionStore + ?Sized>(
    store: &S,
    repo_path: &Path,
    diff: &str,
    files: &[FileSummary],
    options: &ResolveOptions,
) -> Result<Resolution, StoreError> {
    if let Some(id) = options.session_id.as_deref() {
        let mut session = store.load(id)?;
        // A session only ever describes one repository.
        if session.repo_path != repo_path {
            warn!(
                session_id = %session.id,
                session_repo = %session.repo_path.display(),
                repo = %repo_path.display(),
                "session belongs to another repository"
            );
            return Err(StoreError::NotFound { id: id.to_string() });
        }
        resume(store, &mut session, diff, files, options)?;
        return Ok(Resolution {
            session,
            created: false,
        });
    }

    let latest = store.find_latest_by_repo(repo_path)?;
    match latest {
        Some(mut session)
            if session.status == ReviewStatus::Pending || !options.replies.is_empty() =>
        {
            resume(store, &mut session, diff, files, options)?;
            Ok(Resolution {
                session,
                created: false,
            })
        }
        _ => {
            let session = store.create(
                repo_path,
                diff.to_string(),
                files.to_vec(),
                options.description.clone(),
            )?;
            info!(session_id = %session.id, repo = %repo_path.display(), "created review session");
            Ok(Resolution {
                session,
                created: true,
            })
        }
    }
}

fn resume<S: SessionStore + ?Sized>(
    store: &S,
    session: &mut Session,
    diff: &str,
    files: &[FileSummary],
    options: &ResolveOptions,
) -> Result<(), StoreError> {
    session.replace_diff(diff.to_string(), files.to_vec());
    session.status = ReviewStatus::Pending;
    session.description.clone_from(&options.description);
    let applied = session.apply_replies(&options.replies);
    debug!(
        session_id = %session.id,
        replies = options.replies.len(),
        applied,
        "resuming review session"
    );
    store.save(session)
}
