// ABOUTME: JSON-RPC 2.0 stdio transport: protocol envelope types plus the server loop
// ABOUTME: Tools never see this layer directly; the pipeline dispatches into them
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

pub mod protocol;
pub mod server;

pub use protocol::{McpError, McpRequest, McpResponse};
pub use server::McpServer;
