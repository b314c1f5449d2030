use crate::server::ServerEvent;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsStr;
use std::path::{Component, Path};
use tokio::sync::mpsc;
use tracing::{debug, warn};

const IGNORED_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".jj",
    ".svn",
    "node_modules",
    "target",
    ".venv",
    "__pycache__",
];

/// Whether a change under `root` should be ignored for live diff refresh.
pub fn is_ignored(root: &Path, path: &Path) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative.components().any(|component| match component {
        Component::Normal(name) => IGNORED_DIRS.iter().any(|dir| name == OsStr::new(dir)),
        _ => false,
    })
}

/// Watches the repository tree and forwards relevant changes. Dropping the
/// returned watcher stops it. `None` when the platform watcher is unavailable;
/// the review then simply runs without live refresh.
pub(crate) fn watch_repository(
    root: &Path,
    events: mpsc::UnboundedSender<ServerEvent>,
) -> Option<RecommendedWatcher> {
    let watch_root = root.to_path_buf();
    let handler = move |result: notify::Result<notify::Event>| match result {
        Ok(event) => {
            if matches!(event.kind, EventKind::Access(_)) {
                return;
            }
            if event.paths.iter().any(|path| !is_ignored(&watch_root, path)) {
                let _ = events.send(ServerEvent::FilesChanged);
            }
        }
        Err(err) => debug!(error = %err, "file watch error"),
    };

    let mut watcher = match notify::recommended_watcher(handler) {
        Ok(watcher) => watcher,
        Err(err) => {
            warn!(error = %err, "failed to create file watcher; live diff refresh disabled");
            return None;
        }
    };
    if let Err(err) = watcher.watch(root, RecursiveMode::Recursive) {
        warn!(error = %err, root = %root.display(), "failed to watch repository; live diff refresh disabled");
        return None;
    }
    debug!(root = %root.display(), "watching repository for changes");
    Some(watcher)
}
