// ABOUTME: stdio transport loop: reads JSON-RPC requests from stdin, writes responses to stdout
// ABOUTME: Logging goes to stderr exclusively so it never corrupts the JSON-RPC stream on stdout
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! # MCP stdio Server
//!
//! One JSON-RPC request per line. `initialize`, `ping`, `tools/list`, and
//! `tools/call` are handled; notifications (`id` absent/null) are processed
//! but never answered; anything else gets `METHOD_NOT_FOUND`. The pipeline's
//! tools run one request at a time — matching their synchronous
//! [`crate::backend::Backend`] implementations.

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error, warn};

use crate::errors::M3Result;
use crate::pipeline::Pipeline;

use super::protocol::{McpRequest, McpResponse, ERROR_INVALID_PARAMS, ERROR_METHOD_NOT_FOUND};

/// Protocol version this server implements, echoed in `initialize` responses.
const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

/// Drives the stdio request/response loop over an already-built [`Pipeline`].
pub struct McpServer {
    pipeline: Pipeline,
}

impl McpServer {
    #[must_use]
    pub(crate) fn new(pipeline: Pipeline) -> Self {
        Self { pipeline }
    }

    /// Read JSON-RPC requests from stdin, one per line, until EOF.
    ///
    /// # Errors
    ///
    /// Returns `M3Error::DataIo` if stdin/stdout I/O fails outright; a
    /// malformed individual request is answered with a JSON-RPC error
    /// instead of aborting the loop.
    pub async fn serve_stdio(self) -> M3Result<()> {
        let stdin = tokio::io::stdin();
        let mut stdout = tokio::io::stdout();
        let mut lines = BufReader::new(stdin).lines();

        while let Some(line) = lines.next_line().await? {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let response = self.handle_line(trimmed).await;
            if let Some(response) = response {
                let mut rendered = serde_json::to_string(&response)?;
                rendered.push('\n');
                stdout.write_all(rendered.as_bytes()).await?;
                stdout.flush().await?;
            }
        }
        Ok(())
    }

    async fn handle_line(&self, line: &str) -> Option<McpResponse> {
        let request: McpRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(err) => {
                warn!("rejected malformed JSON-RPC line: {err}");
                return Some(McpResponse::failure(
                    Value::Null,
                    ERROR_INVALID_PARAMS,
                    format!("invalid JSON-RPC request: {err}"),
                ));
            }
        };

        if request.is_notification() {
            debug!(method = %request.method, "ignoring notification");
            return None;
        }

        Some(self.dispatch(request).await)
    }

    async fn dispatch(&self, request: McpRequest) -> McpResponse {
        let id = request.id.clone();
        match request.method.as_str() {
            "initialize" => Self::handle_initialize(id),
            "ping" => McpResponse::success(id, json!({})),
            "tools/list" => self.handle_tools_list(id),
            "tools/call" => self.handle_tools_call(id, request.params).await,
            other => {
                warn!(method = other, "unknown MCP method");
                McpResponse::failure(id, ERROR_METHOD_NOT_FOUND, format!("unknown method '{other}'"))
            }
        }
    }

    fn handle_initialize(id: Value) -> McpResponse {
        McpResponse::success(
            id,
            json!({
                "protocolVersion": MCP_PROTOCOL_VERSION,
                "capabilities": {"tools": {"listChanged": false}},
                "serverInfo": {"name": "m3", "version": env!("CARGO_PKG_VERSION")},
            }),
        )
    }

    fn handle_tools_list(&self, id: Value) -> McpResponse {
        let tools: Vec<Value> = self
            .pipeline
            .tools()
            .iter()
            .flat_map(|tool| tool.actions())
            .map(|action| {
                json!({
                    "name": action.name,
                    "description": action.description,
                    "inputSchema": action.input_schema,
                })
            })
            .collect();
        McpResponse::success(id, json!({"tools": tools}))
    }

    async fn handle_tools_call(&self, id: Value, params: Value) -> McpResponse {
        let Some(action_name) = params.get("name").and_then(Value::as_str) else {
            return McpResponse::failure(id, ERROR_INVALID_PARAMS, "missing 'name' in tools/call params");
        };
        let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));

        let index = self.pipeline.action_index();
        let Some(&tool_index) = index.get(action_name) else {
            return McpResponse::failure(
                id,
                ERROR_METHOD_NOT_FOUND,
                format!("unknown tool action '{action_name}'"),
            );
        };

        match self.pipeline.tools()[tool_index].call(action_name, arguments).await {
            Ok(text) => McpResponse::success(
                id,
                json!({"content": [{"type": "text", "text": text}], "isError": false}),
            ),
            Err(err) => {
                error!(action = action_name, error = %err, "tool action failed");
                McpResponse::success(
                    id,
                    json!({"content": [{"type": "text", "text": err.to_string()}], "isError": true}),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::mimic::MimicTool;

    fn built_pipeline() -> Pipeline {
        Pipeline::new()
            .with_tool(Box::new(MimicTool::new("embedded", false)))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn initialize_echoes_protocol_version() {
        let server = McpServer::new(built_pipeline());
        let response = server
            .dispatch(McpRequest {
                jsonrpc: "2.0".to_owned(),
                id: Value::from(1),
                method: "initialize".to_owned(),
                params: Value::Null,
            })
            .await;
        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], MCP_PROTOCOL_VERSION);
    }

    #[tokio::test]
    async fn tools_list_includes_execute_mimic_query() {
        let server = McpServer::new(built_pipeline());
        let response = server
            .dispatch(McpRequest {
                jsonrpc: "2.0".to_owned(),
                id: Value::from(1),
                method: "tools/list".to_owned(),
                params: Value::Null,
            })
            .await;
        let result = response.result.unwrap();
        let names: Vec<&str> = result["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert!(names.contains(&"execute_mimic_query"));
    }

    #[tokio::test]
    async fn unknown_method_reports_method_not_found() {
        let server = McpServer::new(built_pipeline());
        let response = server
            .dispatch(McpRequest {
                jsonrpc: "2.0".to_owned(),
                id: Value::from(1),
                method: "not/a/method".to_owned(),
                params: Value::Null,
            })
            .await;
        assert_eq!(response.error.unwrap().code, ERROR_METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn tools_call_rejects_unsafe_query_as_tool_error_not_transport_error() {
        let server = McpServer::new(built_pipeline());
        let response = server
            .dispatch(McpRequest {
                jsonrpc: "2.0".to_owned(),
                id: Value::from(1),
                method: "tools/call".to_owned(),
                params: json!({"name": "execute_mimic_query", "arguments": {"sql_query": "DROP TABLE x"}}),
            })
            .await;
        let result = response.result.unwrap();
        assert_eq!(result["isError"], true);
    }
}
