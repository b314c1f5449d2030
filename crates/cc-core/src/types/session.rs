use crate::types::enums::{DiffSide, FileStatus, ReviewStatus};
use crate::types::ids::{CommentId, SessionId};
use crate::types::io::{Reply, ReviewResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: SessionId,
    pub repo_path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: ReviewStatus,
    pub diff: String,
    pub files: Vec<FileSummary>,
    pub comments: Vec<Comment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: CommentId,
    pub file_path: String,
    pub line: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u32>,
    pub side: DiffSide,
    pub body: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub resolved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_reply: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSummary {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_path: Option<String>,
    pub status: FileStatus,
    pub additions: u32,
    pub deletions: u32,
}

/// Where a new comment attaches in the diff, as sent by the reviewer UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentAnchor {
    pub file_path: String,
    pub line: u32,
    pub end_line: Option<u32>,
    pub side: DiffSide,
}

impl Session {
    pub fn new(
        repo_path: PathBuf,
        diff: String,
        files: Vec<FileSummary>,
        description: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::generate(),
            repo_path,
            created_at: now,
            updated_at: now,
            status: ReviewStatus::Pending,
            diff,
            files,
            comments: Vec::new(),
            description,
        }
    }

    pub fn unresolved_count(&self) -> usize {
        self.comments.iter().filter(|comment| !comment.resolved).count()
    }

    /// Status a submission would produce right now.
    pub fn submission_status(&self) -> ReviewStatus {
        if self.unresolved_count() > 0 {
            ReviewStatus::ChangesRequested
        } else {
            ReviewStatus::Approved
        }
    }

    /// Closes the round: fixes the terminal status and snapshots the result.
    pub fn conclude(&mut self, summary: Option<String>) -> ReviewResult {
        self.status = self.submission_status();
        ReviewResult {
            session_id: self.id.clone(),
            status: self.status,
            comments: self.comments.clone(),
            summary,
        }
    }

    /// Replaces the diff and its file summaries together.
    pub fn replace_diff(&mut self, diff: String, files: Vec<FileSummary>) {
        self.diff = diff;
        self.files = files;
    }

    /// Folds agent replies into matching comments. Unknown ids are skipped.
    /// Returns how many replies matched.
    pub fn apply_replies(&mut self, replies: &[Reply]) -> usize {
        let mut applied = 0;
        for reply in replies {
            let Some(comment) = self
                .comments
                .iter_mut()
                .find(|comment| comment.id.as_str() == reply.comment_id)
            else {
                continue;
            };
            comment.agent_reply = Some(reply.body.clone());
            if reply.resolved.unwrap_or(true) {
                comment.resolved = true;
            }
            applied += 1;
        }
        applied
    }

    pub fn add_comment(&mut self, anchor: CommentAnchor, body: String) -> Comment {
        let (line, end_line) = normalize_range(anchor.line, anchor.end_line);
        let comment = Comment {
            id: CommentId::generate(),
            file_path: anchor.file_path,
            line,
            end_line,
            side: anchor.side,
            body,
            created_at: Utc::now(),
            resolved: false,
            agent_reply: None,
        };
        self.comments.push(comment.clone());
        comment
    }

    /// Edits an unresolved comment. Resolved or missing comments are left alone.
    pub fn edit_comment(&mut self, id: &str, body: String) -> Option<&Comment> {
        let comment = self
            .comments
            .iter_mut()
            .find(|comment| comment.id.as_str() == id && !comment.resolved)?;
        comment.body = body;
        Some(comment)
    }

    /// Removes an unresolved comment. Resolved or missing comments are left alone.
    pub fn delete_comment(&mut self, id: &str) -> Option<Comment> {
        let index = self
            .comments
            .iter()
            .position(|comment| comment.id.as_str() == id && !comment.resolved)?;
        Some(self.comments.remove(index))
    }
}

fn normalize_range(line: u32, end_line: Option<u32>) -> (u32, Option<u32>) {
    match end_line {
        Some(end) if end == line => (line, None),
        Some(end) if end < line => (end, Some(line)),
        other => (line, other),
    }
}
