use crate::assets::locate_web_root;
use crate::browser::{BrowserLauncher, SystemBrowser};
use crate::error::WorkflowError;
use cc_core::types::{ReviewResult, Reply, Session};
use cc_core::{resolve_session, Diff, DiffSource, ResolveOptions, SessionStore, Settings, VcsError};
use cc_serve::{ReviewServer, ReviewServerOptions};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// One request for a review round, shared by the CLI and the MCP tool.
#[derive(Debug, Clone, Default)]
pub struct ReviewOptions {
    pub repo_path: PathBuf,
    pub session_id: Option<String>,
    pub description: Option<String>,
    pub replies: Vec<Reply>,
    pub skip_review: bool,
    pub port: Option<u16>,
    pub timeout: Option<Duration>,
    pub open_browser: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReviewOutcome {
    EmptyDiff,
    Skipped { result: ReviewResult },
    Reviewed { result: ReviewResult, url: String },
}

impl ReviewOutcome {
    pub fn result(&self) -> Option<&ReviewResult> {
        match self {
            Self::EmptyDiff => None,
            Self::Skipped { result } | Self::Reviewed { result, .. } => Some(result),
        }
    }
}

pub struct Workflow<S, D> {
    store: Arc<S>,
    diff_source: Arc<D>,
    settings: Settings,
    browser: Arc<dyn BrowserLauncher>,
}

impl<S, D> Workflow<S, D>
where
    S: SessionStore + 'static,
    D: DiffSource + 'static,
{
    pub fn new(store: Arc<S>, diff_source: Arc<D>, settings: Settings) -> Self {
        Self {
            store,
            diff_source,
            settings,
            browser: Arc::new(SystemBrowser),
        }
    }

    #[must_use]
    pub fn with_browser(mut self, browser: Arc<dyn BrowserLauncher>) -> Self {
        self.browser = browser;
        self
    }

    pub async fn execute_review(&self, options: ReviewOptions) -> Result<ReviewOutcome, WorkflowError> {
        let (repo_root, diff) = self.capture(options.repo_path.clone()).await?;
        if diff.is_empty() {
            debug!(repo = %repo_root.display(), "no uncommitted changes");
            return Ok(ReviewOutcome::EmptyDiff);
        }

        let web_root = if options.skip_review {
            None
        } else {
            Some(locate_web_root(&self.settings).ok_or(WorkflowError::AssetsNotFound)?)
        };

        let resolution = resolve_session(
            self.store.as_ref(),
            &repo_root,
            &diff.unified,
            &diff.files,
            &ResolveOptions {
                session_id: options.session_id,
                description: options.description,
                replies: options.replies,
            },
        )?;
        if resolution.created {
            self.prune_in_background();
        }
        let mut session = resolution.session;

        let Some(web_root) = web_root else {
            let result = session.conclude(None);
            self.store.save(&mut session)?;
            info!(session_id = %session.id, status = %result.status, "review round closed without reviewer");
            return Ok(ReviewOutcome::Skipped { result });
        };

        let server = ReviewServer::start(
            session,
            Arc::clone(&self.store),
            Arc::clone(&self.diff_source),
            ReviewServerOptions {
                port: options.port.unwrap_or(0),
                timeout: options.timeout.unwrap_or_else(|| self.settings.timeout()),
                disconnect_grace: self.settings.disconnect_grace(),
                debounce: self.settings.debounce(),
                web_root,
                watch: true,
            },
        )
        .await?;
        let url = server.url().to_string();

        if options.open_browser.unwrap_or(self.settings.open_browser) {
            self.browser.launch(&url);
        }

        let result = server.wait().await?;
        Ok(ReviewOutcome::Reviewed { result, url })
    }

    pub fn get_session(&self, id: &str) -> Result<Session, WorkflowError> {
        Ok(self.store.load(id)?)
    }

    /// Sessions for the repository containing `path`, newest first.
    pub fn list_sessions(&self, path: &Path) -> Result<Vec<Session>, WorkflowError> {
        if !self.diff_source.is_repository(path) {
            return Err(WorkflowError::NotAGitRepository);
        }
        let root = self.diff_source.repo_root(path)?;
        Ok(self.store.list_by_repo(&root)?)
    }

    async fn capture(&self, path: PathBuf) -> Result<(PathBuf, Diff), WorkflowError> {
        let source = Arc::clone(&self.diff_source);
        let captured = tokio::task::spawn_blocking(move || {
            if !source.is_repository(&path) {
                return Ok(None);
            }
            let root = source.repo_root(&path)?;
            let diff = source.diff(&root)?;
            Ok::<_, VcsError>(Some((root, diff)))
        })
        .await
        .map_err(|err| VcsError::Backend {
            reason: format!("diff task failed: {err}"),
        })??;
        captured.ok_or(WorkflowError::NotAGitRepository)
    }

    /// Detached so a runtime shutdown never waits on the sweep.
    fn prune_in_background(&self) {
        let store = Arc::clone(&self.store);
        let max_age = self.settings.retention();
        let spawned = std::thread::Builder::new()
            .name("codechat-prune".to_string())
            .spawn(move || match store.prune_expired(max_age) {
                Ok(0) => {}
                Ok(removed) => debug!(removed, "pruned expired sessions"),
                Err(err) => warn!(error = %err, "failed to prune expired sessions"),
            });
        if let Err(err) = spawned {
            warn!(error = %err, "failed to start session pruning");
        }
    }
}
