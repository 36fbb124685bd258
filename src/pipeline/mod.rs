// ABOUTME: Builder assembling configured tools into a runnable MCP server
// ABOUTME: Mirrors the original M3 class: with_config/with_tool/build/run/save/load
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! # Pipeline
//!
//! [`Pipeline`] is the top-level object a binary constructs: register one or
//! more [`crate::tools::Tool`]s, `build()` to validate configuration and
//! initialize every tool's backend, then `run()` to drive the stdio MCP
//! server. A built pipeline can be `save()`d to JSON and `load()`ed back,
//! reconstructing each tool through [`crate::tools::ToolRegistry`].

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{Config, RequiresEnv};
use crate::errors::{M3Error, M3Result};
use crate::mcp::server::McpServer;
use crate::tools::{Tool, ToolRegistry};

/// One entry of a saved pipeline: a tool's type tag plus its construction params.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SavedTool {
    #[serde(rename = "type")]
    type_tag: String,
    params: Value,
}

/// A saved pipeline: config plus every tool's persisted state.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SavedPipeline {
    config: Config,
    tools: Vec<SavedTool>,
}

/// Builder assembling tools into a runnable server.
pub struct Pipeline {
    config: Config,
    tools: Vec<Box<dyn Tool>>,
    built: bool,
}

impl Pipeline {
    /// Start a new pipeline with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            tools: Vec::new(),
            built: false,
        }
    }

    /// Replace the pipeline's configuration.
    #[must_use]
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Add one tool.
    #[must_use]
    pub fn with_tool(mut self, tool: Box<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    /// Add several tools at once.
    #[must_use]
    pub fn with_tools(mut self, tools: Vec<Box<dyn Tool>>) -> Self {
        self.tools.extend(tools);
        self
    }

    /// Validate every tool's required configuration, then initialize each
    /// one in registration order. On any failure, tools already initialized
    /// are torn down before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns `M3Error::Build` wrapping the first validation or
    /// initialization failure encountered.
    pub fn build(mut self) -> M3Result<Self> {
        self.validate()?;
        self.initialize_tools()?;
        self.built = true;
        Ok(self)
    }

    fn validate(&self) -> M3Result<()> {
        let requires_env: Vec<&dyn RequiresEnv> = self
            .tools
            .iter()
            .map(|tool| tool.as_ref() as &dyn RequiresEnv)
            .collect();
        self.config
            .validate_for_tools(&requires_env)
            .map_err(|e| M3Error::build_failed("configuration validation failed", e))
    }

    fn initialize_tools(&mut self) -> M3Result<()> {
        for (index, tool) in self.tools.iter_mut().enumerate() {
            if let Err(err) = tool.initialize(&self.config) {
                for earlier in &mut self.tools[..index] {
                    earlier.teardown();
                }
                return Err(M3Error::build_failed(
                    &format!("tool '{}' failed to initialize", tool.type_tag()),
                    err,
                ));
            }
        }
        Ok(())
    }

    /// Whether `build()` has completed successfully.
    #[must_use]
    pub fn is_built(&self) -> bool {
        self.built
    }

    /// Map of every action name across every tool to the owning tool's index,
    /// used by the MCP server to dispatch `tools/call`.
    #[must_use]
    pub(crate) fn action_index(&self) -> HashMap<String, usize> {
        let mut index = HashMap::new();
        for (tool_index, tool) in self.tools.iter().enumerate() {
            for action in tool.actions() {
                index.insert(action.name.to_owned(), tool_index);
            }
        }
        index
    }

    pub(crate) fn tools(&self) -> &[Box<dyn Tool>] {
        &self.tools
    }

    /// Run the stdio MCP server until stdin closes.
    ///
    /// # Errors
    ///
    /// Returns `M3Error::Build` if the pipeline hasn't been built yet,
    /// otherwise whatever I/O error the server loop encounters.
    pub async fn run(self) -> M3Result<()> {
        if !self.built {
            return Err(M3Error::Build(
                "Pipeline::run called before Pipeline::build".to_owned(),
            ));
        }
        McpServer::new(self).serve_stdio().await
    }

    /// Persist this pipeline's configuration and every tool's construction
    /// params to a JSON file.
    ///
    /// # Errors
    ///
    /// Returns `M3Error::Validation` if any tool fails to serialize, or an
    /// I/O error writing the file.
    pub fn save(&self, path: &Path) -> M3Result<()> {
        let saved = SavedPipeline {
            config: self.config.clone(),
            tools: self
                .tools
                .iter()
                .map(|tool| {
                    Ok(SavedTool {
                        type_tag: tool.type_tag().to_owned(),
                        params: tool.to_params()?,
                    })
                })
                .collect::<M3Result<Vec<_>>>()?,
        };
        let json = serde_json::to_string_pretty(&saved)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Restore a pipeline from a JSON file written by [`Pipeline::save`],
    /// reconstructing each tool through the given registry and re-running
    /// `post_load` (not full `initialize`) on each one.
    ///
    /// # Errors
    ///
    /// Returns `M3Error::Config` if the file can't be read/parsed, or
    /// `M3Error::Validation`/`M3Error::Initialization` if a tool can't be
    /// rebuilt or re-initialized.
    pub fn load(path: &Path, registry: &ToolRegistry) -> M3Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| M3Error::Config(format!("failed to read pipeline file {}: {e}", path.display())))?;
        let saved: SavedPipeline = serde_json::from_str(&raw)
            .map_err(|e| M3Error::Config(format!("invalid pipeline file {}: {e}", path.display())))?;

        let mut tools = Vec::with_capacity(saved.tools.len());
        for entry in saved.tools {
            let mut tool = registry.build(&entry.type_tag, &entry.params)?;
            tool.post_load(&saved.config)?;
            tools.push(tool);
        }

        Ok(Self {
            config: saved.config,
            tools,
            built: true,
        })
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        for tool in &mut self.tools {
            tool.teardown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::mimic::MimicTool;

    #[test]
    fn build_fails_fast_on_missing_cloud_config() {
        let pipeline = Pipeline::new().with_tool(Box::new(MimicTool::new("cloud", false)));
        let result = pipeline.build();
        assert!(result.is_err());
    }

    #[test]
    fn build_succeeds_for_embedded_backend() {
        let pipeline = Pipeline::new().with_tool(Box::new(MimicTool::new("embedded", false)));
        let built = pipeline.build().unwrap();
        assert!(built.is_built());
    }

    #[test]
    fn action_index_covers_every_mimic_action() {
        let pipeline = Pipeline::new()
            .with_tool(Box::new(MimicTool::new("embedded", false)))
            .build()
            .unwrap();
        let index = pipeline.action_index();
        assert!(index.contains_key("execute_mimic_query"));
        assert!(index.contains_key("get_database_schema"));
    }

    #[test]
    fn run_before_build_errors() {
        let pipeline = Pipeline::new().with_tool(Box::new(MimicTool::new("embedded", false)));
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let result = runtime.block_on(pipeline.run());
        assert!(result.is_err());
    }
}
