use cc_core::types::Reply;
use cc_workflow::ReviewOptions;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;

pub const REVIEW_TOOL: &str = "codechat_review";
pub const GET_SESSION_TOOL: &str = "codechat_get_session";

const REVIEW_DESCRIPTION: &str = "\
Request a code review for uncommitted changes. Returns a ReviewResult JSON with { sessionId, status, comments }.

Workflow:
1. First call: opens a browser UI for the user to review the diff and leave inline comments. Blocks until the user submits.
2. When the result comes back, summarize the unresolved comments to the user (file, line, what the reviewer said) and state what you plan to do for each before anything else.
3. Make the fixes, then call this tool again with replies addressing each comment and skipReview set to true.
4. When replying, set resolved: true (default) for addressed comments, or resolved: false to ask the user a clarifying question.
5. With skipReview the tool returns immediately without opening the browser.
6. If the user asks to review or see the changes, call without skipReview so the browser opens.

Sessions are found by repository path; sessionId is only needed to resume a specific completed session.";

const GET_SESSION_DESCRIPTION: &str = "Retrieve the current state of a review session without starting a new review round. Returns the full session JSON including all comments and their resolved/reply state.";

pub fn definitions() -> Value {
    json!([
        {
            "name": REVIEW_TOOL,
            "description": REVIEW_DESCRIPTION,
            "inputSchema": {
                "type": "object",
                "properties": {
                    "repoPath": { "type": "string", "description": "Absolute path to the git repository" },
                    "sessionId": { "type": "string", "description": "Explicit session ID to resume. Usually not needed." },
                    "message": { "type": "string", "description": "Short summary of what changed since the last round, shown in the UI header" },
                    "replies": {
                        "type": "array",
                        "description": "Replies to comments from the previous round",
                        "items": {
                            "type": "object",
                            "properties": {
                                "commentId": { "type": "string" },
                                "body": { "type": "string" },
                                "resolved": { "type": "boolean", "description": "Mark as resolved (default: true)" }
                            },
                            "required": ["commentId", "body"]
                        }
                    },
                    "skipReview": { "type": "boolean", "description": "Return immediately without opening the browser" },
                    "port": { "type": "integer", "minimum": 1, "maximum": 65535, "description": "Port for the review server (default: random)" },
                    "timeout": { "type": "integer", "minimum": 1, "description": "Session timeout in minutes (default: 30)" }
                },
                "required": ["repoPath"]
            }
        },
        {
            "name": GET_SESSION_TOOL,
            "description": GET_SESSION_DESCRIPTION,
            "inputSchema": {
                "type": "object",
                "properties": {
                    "sessionId": { "type": "string", "description": "The sessionId returned by codechat_review" }
                },
                "required": ["sessionId"]
            }
        }
    ])
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewArgs {
    pub repo_path: PathBuf,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub replies: Vec<Reply>,
    #[serde(default)]
    pub skip_review: bool,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub timeout: Option<u64>,
}

impl ReviewArgs {
    pub fn into_options(self) -> Result<ReviewOptions, String> {
        if self.port == Some(0) {
            return Err("port must be positive".to_string());
        }
        if self.timeout == Some(0) {
            return Err("timeout must be positive".to_string());
        }
        Ok(ReviewOptions {
            repo_path: self.repo_path,
            session_id: self.session_id,
            description: self.message,
            replies: self.replies,
            skip_review: self.skip_review,
            port: self.port,
            timeout: self
                .timeout
                .map(|minutes| Duration::from_secs(minutes.saturating_mul(60))),
            open_browser: Some(!self.skip_review),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetSessionArgs {
    pub session_id: String,
}
