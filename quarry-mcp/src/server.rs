//! Newline-delimited JSON-RPC over a byte stream.

use crate::dispatch;
use crate::tools;
use crate::types::*;
use quarry_orchestrator::Orchestrator;
use serde_json::{json, Value as JsonValue};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// MCP server answering tool calls with an [`Orchestrator`].
#[derive(Debug, Clone)]
pub struct McpServer {
    orchestrator: Orchestrator,
}

impl McpServer {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self { orchestrator }
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Handle one line of input. Returns the response to write, if any.
    ///
    /// Blank lines and notifications produce no response.
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let raw: JsonValue = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "Unparseable JSON-RPC message");
                return Some(JsonRpcResponse::failure(
                    JsonValue::Null,
                    JsonRpcError::new(PARSE_ERROR, format!("Parse error: {}", e)),
                ));
            }
        };
        let id = raw.get("id").cloned().unwrap_or(JsonValue::Null);
        let request: JsonRpcRequest = match serde_json::from_value(raw) {
            Ok(request) => request,
            Err(e) => {
                return Some(JsonRpcResponse::failure(
                    id,
                    JsonRpcError::new(INVALID_REQUEST, format!("Invalid request: {}", e)),
                ))
            }
        };

        if request.is_notification() {
            tracing::debug!(method = %request.method, "MCP notification");
            return None;
        }
        let id = request.id.clone().unwrap_or(JsonValue::Null);

        Some(match self.handle_request(request).await {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => JsonRpcResponse::failure(id, error),
        })
    }

    async fn handle_request(&self, request: JsonRpcRequest) -> Result<JsonValue, JsonRpcError> {
        match request.method.as_str() {
            "initialize" => {
                tracing::info!(
                    client = %request.params["clientInfo"]["name"],
                    protocol_version = %request.params["protocolVersion"],
                    "MCP session initialized"
                );
                to_result(&InitializeResponse::current())
            }
            "ping" => Ok(json!({})),
            "tools/list" => to_result(&ListToolsResponse {
                tools: tools::catalog(),
            }),
            "tools/call" => {
                let call: CallToolRequest = serde_json::from_value(request.params).map_err(|e| {
                    JsonRpcError::new(INVALID_PARAMS, format!("Invalid params: {}", e))
                })?;
                let response =
                    dispatch::call_tool(&self.orchestrator, &call.name, call.arguments).await;
                to_result(&response)
            }
            other => Err(JsonRpcError::new(
                METHOD_NOT_FOUND,
                format!("Method not found: {}", other),
            )),
        }
    }

    /// Serve requests from `input` until it closes, one message per line.
    ///
    /// A line that is not valid UTF-8 gets a parse error; the loop keeps going.
    pub async fn serve<R, W>(&self, mut input: R, mut output: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if input.read_until(b'\n', &mut buf).await? == 0 {
                break;
            }
            let response = match std::str::from_utf8(&buf) {
                Ok(line) => self.handle_line(line).await,
                Err(e) => {
                    tracing::warn!(error = %e, "Non-UTF-8 JSON-RPC message");
                    Some(JsonRpcResponse::failure(
                        JsonValue::Null,
                        JsonRpcError::new(PARSE_ERROR, format!("Parse error: {}", e)),
                    ))
                }
            };
            let Some(response) = response else {
                continue;
            };
            let mut encoded = serde_json::to_vec(&response)?;
            encoded.push(b'\n');
            output.write_all(&encoded).await?;
            output.flush().await?;
        }
        tracing::info!("Input closed, MCP server stopping");
        Ok(())
    }
}

fn to_result<T: serde::Serialize>(value: &T) -> Result<JsonValue, JsonRpcError> {
    serde_json::to_value(value)
        .map_err(|e| JsonRpcError::new(INVALID_REQUEST, format!("Unserializable result: {}", e)))
}
