//! WebSocket messages exchanged with the reviewer UI.
//!
//! Every frame is a JSON object `{ "type": ..., "data": ... }`. Inbound frames
//! are validated here; anything that does not match a known shape is rejected
//! and the server drops it without replying.

use crate::error::ProtocolError;
use crate::types::{Comment, CommentAnchor, CommentId, DiffSide, FileSummary, Session};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    Init(Session),
    CommentAdded(Comment),
    CommentEdited { id: CommentId, body: String },
    CommentDeleted { id: CommentId },
    DiffUpdated { diff: String, files: Vec<FileSummary> },
    ReviewComplete,
}

impl ServerMessage {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    AddComment { anchor: CommentAnchor, body: String },
    EditComment { id: String, body: String },
    DeleteComment { id: String },
    SubmitReview { summary: Option<String> },
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    data: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddCommentPayload {
    file_path: String,
    line: u32,
    end_line: Option<u32>,
    side: DiffSide,
    body: String,
}

#[derive(Debug, Deserialize)]
struct EditCommentPayload {
    id: String,
    body: String,
}

#[derive(Debug, Deserialize)]
struct DeleteCommentPayload {
    id: String,
}

#[derive(Debug, Default, Deserialize)]
struct SubmitReviewPayload {
    summary: Option<String>,
}

impl ClientMessage {
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let envelope: Envelope =
            serde_json::from_str(text).map_err(|err| ProtocolError::InvalidJson {
                message: err.to_string(),
            })?;
        let kind = envelope.kind.as_str();
        match kind {
            "add_comment" => {
                let payload: AddCommentPayload = payload(kind, envelope.data)?;
                if payload.file_path.trim().is_empty() {
                    return Err(invalid(kind, "filePath must not be empty"));
                }
                if payload.line == 0 || payload.end_line == Some(0) {
                    return Err(invalid(kind, "line numbers start at 1"));
                }
                if payload.body.trim().is_empty() {
                    return Err(invalid(kind, "body must not be empty"));
                }
                Ok(Self::AddComment {
                    anchor: CommentAnchor {
                        file_path: payload.file_path,
                        line: payload.line,
                        end_line: payload.end_line,
                        side: payload.side,
                    },
                    body: payload.body,
                })
            }
            "edit_comment" => {
                let payload: EditCommentPayload = payload(kind, envelope.data)?;
                if payload.body.trim().is_empty() {
                    return Err(invalid(kind, "body must not be empty"));
                }
                Ok(Self::EditComment {
                    id: payload.id,
                    body: payload.body,
                })
            }
            "delete_comment" => {
                let payload: DeleteCommentPayload = payload(kind, envelope.data)?;
                Ok(Self::DeleteComment { id: payload.id })
            }
            "submit_review" => {
                let payload = match envelope.data {
                    None | Some(Value::Null) => SubmitReviewPayload::default(),
                    data => payload::<SubmitReviewPayload>(kind, data)?,
                };
                Ok(Self::SubmitReview {
                    summary: payload.summary.filter(|summary| !summary.trim().is_empty()),
                })
            }
            other => Err(ProtocolError::UnknownType {
                kind: other.to_string(),
            }),
        }
    }
}

fn payload<T: DeserializeOwned>(kind: &str, data: Option<Value>) -> Result<T, ProtocolError> {
    let Some(data) = data else {
        return Err(invalid(kind, "missing data"));
    };
    serde_json::from_value(data).map_err(|err| invalid(kind, &err.to_string()))
}

fn invalid(kind: &str, message: &str) -> ProtocolError {
    ProtocolError::InvalidPayload {
        kind: kind.to_string(),
        message: message.to_string(),
    }
}
