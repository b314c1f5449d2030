use crate::types::enums::ReviewStatus;
use crate::types::ids::SessionId;
use crate::types::session::Comment;
use serde::{Deserialize, Serialize};

/// An agent's response to one reviewer comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub comment_id: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResult {
    pub session_id: SessionId,
    pub status: ReviewStatus,
    pub comments: Vec<Comment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}
