use crate::protocol::{
    McpError, McpRequest, McpResponse, ToolResult, INTERNAL_ERROR, INVALID_PARAMS,
    INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR,
};
use crate::tools::{self, GetSessionArgs, ReviewArgs, GET_SESSION_TOOL, REVIEW_TOOL};
use cc_core::{DiffSource, SessionStore};
use cc_workflow::Workflow;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info};

const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";
const SERVER_NAME: &str = "codechat";
const NO_CHANGES: &str = "No uncommitted changes found.";

#[derive(Debug, Deserialize)]
struct CallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// Tool server for agents speaking the Model Context Protocol over stdio.
pub struct McpServer<S, D> {
    workflow: Workflow<S, D>,
}

impl<S, D> McpServer<S, D>
where
    S: SessionStore + 'static,
    D: DiffSource + 'static,
{
    pub fn new(workflow: Workflow<S, D>) -> Self {
        Self { workflow }
    }

    pub async fn run_stdio(self) -> io::Result<()> {
        info!("mcp server listening on stdio");
        Arc::new(self)
            .serve(tokio::io::stdin(), tokio::io::stdout())
            .await
    }

    /// Reads newline-delimited requests until EOF. Requests run concurrently so
    /// a blocking review does not starve pings; responses are written as they
    /// complete.
    pub async fn serve<R, W>(self: Arc<Self>, reader: R, mut writer: W) -> io::Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = BufReader::new(reader).lines();
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        let reading = async {
            while let Some(line) = lines.next_line().await? {
                if line.trim().is_empty() {
                    continue;
                }
                let server = Arc::clone(&self);
                let tx = tx.clone();
                tokio::spawn(async move {
                    if let Some(response) = server.handle_line(&line).await {
                        let _ = tx.send(response.to_json());
                    }
                });
            }
            drop(tx);
            Ok::<_, io::Error>(())
        };
        let writing = async {
            while let Some(line) = rx.recv().await {
                writer.write_all(line.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
            Ok::<_, io::Error>(())
        };

        tokio::try_join!(reading, writing)?;
        Ok(())
    }

    /// Handles one frame; notifications produce no response.
    pub async fn handle_line(&self, line: &str) -> Option<McpResponse> {
        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(err) => return Some(McpResponse::error(Value::Null, PARSE_ERROR, err.to_string())),
        };
        let id = value.get("id").cloned().unwrap_or(Value::Null);
        let request: McpRequest = match serde_json::from_value(value) {
            Ok(request) => request,
            Err(err) => return Some(McpResponse::error(id, INVALID_REQUEST, err.to_string())),
        };
        if request.is_notification() {
            debug!(method = %request.method, "mcp notification");
            return None;
        }

        let id = request.id.clone().unwrap_or(Value::Null);
        Some(match self.dispatch(&request.method, request.params).await {
            Ok(result) => McpResponse::ok(id, result),
            Err(error) => McpResponse::failed(id, error),
        })
    }

    async fn dispatch(&self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        match method {
            "initialize" => {
                let version = params
                    .as_ref()
                    .and_then(|params| params.get("protocolVersion"))
                    .and_then(Value::as_str)
                    .unwrap_or(DEFAULT_PROTOCOL_VERSION);
                Ok(json!({
                    "protocolVersion": version,
                    "capabilities": { "tools": {} },
                    "serverInfo": { "name": SERVER_NAME, "version": env!("CARGO_PKG_VERSION") }
                }))
            }
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": tools::definitions() })),
            "tools/call" => {
                let call: CallParams = parse_params(params.unwrap_or(Value::Null))?;
                let result = self.call_tool(&call.name, call.arguments).await?;
                to_value(&result)
            }
            other => Err(McpError::new(
                METHOD_NOT_FOUND,
                format!("Method not found: {other}"),
            )),
        }
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolResult, McpError> {
        match name {
            REVIEW_TOOL => {
                let args: ReviewArgs = parse_params(arguments)?;
                let options = args
                    .into_options()
                    .map_err(|message| McpError::new(INVALID_PARAMS, message))?;
                info!(repo = %options.repo_path.display(), skip_review = options.skip_review, "review requested");
                Ok(match self.workflow.execute_review(options).await {
                    Ok(outcome) => match outcome.result() {
                        Some(result) => ToolResult::text(pretty(result)?),
                        None => ToolResult::text(NO_CHANGES),
                    },
                    Err(err) => ToolResult::error(err.to_string()),
                })
            }
            GET_SESSION_TOOL => {
                let args: GetSessionArgs = parse_params(arguments)?;
                Ok(match self.workflow.get_session(&args.session_id) {
                    Ok(session) => ToolResult::text(pretty(&session)?),
                    Err(err) => ToolResult::error(err.to_string()),
                })
            }
            other => Err(McpError::new(
                INVALID_PARAMS,
                format!("Unknown tool: {other}"),
            )),
        }
    }
}

fn parse_params<T: DeserializeOwned>(value: Value) -> Result<T, McpError> {
    serde_json::from_value(value).map_err(|err| McpError::new(INVALID_PARAMS, err.to_string()))
}

fn pretty<T: Serialize>(value: &T) -> Result<String, McpError> {
    serde_json::to_string_pretty(value).map_err(|err| McpError::new(INTERNAL_ERROR, err.to_string()))
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, McpError> {
    serde_json::to_value(value).map_err(|err| McpError::new(INTERNAL_ERROR, err.to_string()))
}
