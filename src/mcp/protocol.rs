// ABOUTME: JSON-RPC 2.0 envelope types for the stdio MCP transport
// ABOUTME: Shapes mirror the teacher's McpRequest/McpResponse/McpError, trimmed to the stdio subset
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! # MCP Protocol Types
//!
//! M3 speaks JSON-RPC 2.0 over stdio rather than the teacher's HTTP/WebSocket
//! transport, so there's no session/auth-header plumbing here — just the
//! envelope. `initialize`, `ping`, `tools/list`, and `tools/call` are the only
//! methods this server understands; anything else gets `METHOD_NOT_FOUND`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC 2.0 version string every request/response carries.
pub const JSONRPC_VERSION: &str = "2.0";

/// `-32600 Invalid Request` — malformed envelope (bad `jsonrpc`, empty `method`).
pub const ERROR_INVALID_REQUEST: i64 = -32600;

/// `-32601 Method not found`.
pub const ERROR_METHOD_NOT_FOUND: i64 = -32601;

/// `-32602 Invalid params` — known method, bad/missing arguments.
pub const ERROR_INVALID_PARAMS: i64 = -32602;

/// `-32603 Internal error` — anything else that went wrong while handling a request.
pub const ERROR_INTERNAL_ERROR: i64 = -32603;

/// A single JSON-RPC request read from stdin.
#[derive(Debug, Clone, Deserialize)]
pub struct McpRequest {
    /// Must equal [`JSONRPC_VERSION`].
    #[serde(default)]
    pub jsonrpc: String,
    /// Request id, echoed back verbatim. Absent on notifications.
    #[serde(default)]
    pub id: Value,
    /// Method name, e.g. `tools/call`.
    pub method: String,
    /// Method-specific arguments.
    #[serde(default)]
    pub params: Value,
}

impl McpRequest {
    /// A request with no `id` (or a `null` id) is a notification: the
    /// transport must not write a response for it.
    #[must_use]
    pub fn is_notification(&self) -> bool {
        self.id.is_null()
    }
}

/// A single JSON-RPC response written to stdout.
#[derive(Debug, Clone, Serialize)]
pub struct McpResponse {
    /// Always [`JSONRPC_VERSION`].
    pub jsonrpc: String,
    /// Echoes the request's `id`.
    pub id: Value,
    /// Present on success, absent on error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Present on error, absent on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<McpError>,
}

impl McpResponse {
    /// Build a success response.
    #[must_use]
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Build an error response.
    #[must_use]
    pub fn failure(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            id,
            result: None,
            error: Some(McpError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

/// JSON-RPC error object.
#[derive(Debug, Clone, Serialize)]
pub struct McpError {
    /// JSON-RPC error code; one of the `ERROR_*` constants above.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
    /// Optional structured detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_has_null_id() {
        let request: McpRequest =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"notifications/cancelled"}"#).unwrap();
        assert!(request.is_notification());
    }

    #[test]
    fn success_response_omits_error_field() {
        let response = McpResponse::success(Value::from(1), serde_json::json!({"ok": true}));
        let rendered = serde_json::to_string(&response).unwrap();
        assert!(!rendered.contains("\"error\""));
    }

    #[test]
    fn failure_response_omits_result_field() {
        let response = McpResponse::failure(Value::from(1), ERROR_METHOD_NOT_FOUND, "nope");
        let rendered = serde_json::to_string(&response).unwrap();
        assert!(!rendered.contains("\"result\""));
    }
}
