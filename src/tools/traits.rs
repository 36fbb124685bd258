// ABOUTME: Defines the Tool trait pluggable tools implement to join an M3 pipeline
// ABOUTME: Mirrors the teacher's McpTool trait, adapted to the original's actions()-closures design
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! # Tool Trait
//!
//! A `Tool` contributes one or more named MCP actions to the pipeline. It is
//! built, validated, and (de)serialized as part of [`crate::pipeline::Pipeline`],
//! the same way the original's `BaseTool` subclasses were added via
//! `M3.with_tool(...)`.

use async_trait::async_trait;
use serde_json::Value;

use crate::config::{Config, RequiresEnv};
use crate::errors::M3Result;

/// Metadata describing one callable action an MCP client can invoke.
#[derive(Debug, Clone)]
pub struct ActionMetadata {
    /// Action name, unique across every tool in the pipeline.
    pub name: &'static str,
    /// Human-readable description surfaced in `tools/list`.
    pub description: &'static str,
    /// JSON Schema for the action's input object.
    pub input_schema: Value,
}

/// A pluggable MCP tool.
///
/// Implementations are `Send + Sync` so the pipeline can hold them behind
/// `Box<dyn Tool>` and call into them from the single-threaded stdio
/// dispatch loop without additional synchronization.
#[async_trait]
pub trait Tool: Send + Sync + RequiresEnv {
    /// Stable type tag used when serializing a pipeline to JSON
    /// (`{"type": "...", "params": {...}}`), and when restoring it via the
    /// tool registry.
    fn type_tag(&self) -> &'static str;

    /// Open backend connections, validate table/view names, etc. Called
    /// once during `Pipeline::build`.
    ///
    /// # Errors
    ///
    /// Returns `M3Error::Initialization` on any setup failure.
    fn initialize(&mut self, config: &Config) -> M3Result<()>;

    /// Re-establish runtime state (backend connections) after restoring a
    /// tool from saved JSON, without repeating first-time validation.
    ///
    /// # Errors
    ///
    /// Returns `M3Error::Initialization` on any setup failure.
    fn post_load(&mut self, config: &Config) -> M3Result<()> {
        self.initialize(config)
    }

    /// Every action this tool contributes.
    fn actions(&self) -> Vec<ActionMetadata>;

    /// Execute a named action with the given JSON arguments.
    ///
    /// # Errors
    ///
    /// Returns `M3Error::Validation` if `action_name` isn't one of this
    /// tool's actions; otherwise whatever error the action itself produces.
    async fn call(&self, action_name: &str, args: Value) -> M3Result<String>;

    /// Serialize this tool's construction parameters (not its live runtime
    /// state) for `Pipeline::save`.
    ///
    /// # Errors
    ///
    /// Returns `M3Error::Validation` if serialization fails.
    fn to_params(&self) -> M3Result<Value>;

    /// Release any held resources. Safe to call more than once.
    fn teardown(&mut self) {}
}
