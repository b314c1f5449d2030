use crate::error::VcsError;
use crate::types::FileSummary;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diff {
    pub unified: String,
    pub files: Vec<FileSummary>,
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        self.unified.trim().is_empty()
    }
}

/// Working-tree changes of a repository: staged, unstaged and untracked.
pub trait DiffSource: Send + Sync {
    fn is_repository(&self, path: &Path) -> bool;

    /// Canonical top-level directory of the working tree containing `path`.
    fn repo_root(&self, path: &Path) -> Result<PathBuf, VcsError>;

    fn diff(&self, repo_root: &Path) -> Result<Diff, VcsError>;
}
