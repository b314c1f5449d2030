use crate::summary::parse_file_summaries;
use cc_core::diff::{Diff, DiffSource};
use cc_core::error::VcsError;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::debug;

/// Working-tree diff against `HEAD` (or the index in a repository without
/// commits), with untracked files appended as additions.
#[derive(Debug, Clone, Default)]
pub struct GitDiffSource;

impl GitDiffSource {
    pub fn new() -> Self {
        Self
    }
}

impl DiffSource for GitDiffSource {
    fn is_repository(&self, path: &Path) -> bool {
        gix::discover(path).is_ok_and(|repo| repo.workdir().is_some())
    }

    fn repo_root(&self, path: &Path) -> Result<PathBuf, VcsError> {
        let repo = open_repo(path)?;
        let workdir = repo.workdir().ok_or_else(|| VcsError::NotARepository {
            path: path.to_path_buf(),
        })?;
        workdir
            .canonicalize()
            .map_err(map_backend_error("canonicalize repository root"))
    }

    fn diff(&self, repo_root: &Path) -> Result<Diff, VcsError> {
        let repo = open_repo(repo_root)?;
        let has_commits = repo.head_commit().is_ok();
        let mut unified = if has_commits {
            git_stdout(repo_root, &["diff", "HEAD", "--no-color", "--no-ext-diff"])?
        } else {
            git_stdout(repo_root, &["diff", "--cached", "--no-color", "--no-ext-diff"])?
        };

        for path in untracked_files(repo_root)? {
            let file_diff = untracked_diff(repo_root, &path)?;
            if !unified.is_empty() && !unified.ends_with('\n') {
                unified.push('\n');
            }
            unified.push_str(&file_diff);
        }

        let files = parse_file_summaries(&unified);
        debug!(repo = %repo_root.display(), files = files.len(), "computed working tree diff");
        Ok(Diff { unified, files })
    }
}

fn open_repo(path: &Path) -> Result<gix::Repository, VcsError> {
    gix::discover(path).map_err(|_| VcsError::NotARepository {
        path: path.to_path_buf(),
    })
}

fn map_backend_error<E: std::fmt::Display>(context: &'static str) -> impl FnOnce(E) -> VcsError {
    move |err| VcsError::Backend {
        reason: format!("{context}: {err}"),
    }
}

fn run_git(repo_root: &Path, args: &[&str]) -> Result<Output, VcsError> {
    Command::new("git")
        .args(["-c", "core.quotePath=false"])
        .args(args)
        .current_dir(repo_root)
        .env("GIT_OPTIONAL_LOCKS", "0")
        .output()
        .map_err(|err| VcsError::CommandFailed {
            command: format!("git {}", args.join(" ")),
            message: err.to_string(),
        })
}

fn git_stdout(repo_root: &Path, args: &[&str]) -> Result<String, VcsError> {
    let output = run_git(repo_root, args)?;
    if !output.status.success() {
        return Err(VcsError::CommandFailed {
            command: format!("git {}", args.join(" ")),
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn untracked_files(repo_root: &Path) -> Result<Vec<String>, VcsError> {
    let listing = git_stdout(
        repo_root,
        &["ls-files", "--others", "--exclude-standard", "-z"],
    )?;
    Ok(listing
        .split('\0')
        .filter(|path| !path.is_empty())
        .map(str::to_string)
        .collect())
}

/// `git diff --no-index` exits with 1 when the inputs differ, which is the
/// expected case here.
fn untracked_diff(repo_root: &Path, path: &str) -> Result<String, VcsError> {
    let args = [
        "diff",
        "--no-index",
        "--no-color",
        "--no-ext-diff",
        "--",
        "/dev/null",
        path,
    ];
    let output = run_git(repo_root, &args)?;
    match output.status.code() {
        Some(0 | 1) => Ok(String::from_utf8_lossy(&output.stdout).into_owned()),
        _ => Err(VcsError::CommandFailed {
            command: format!("git {}", args.join(" ")),
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }),
    }
}
