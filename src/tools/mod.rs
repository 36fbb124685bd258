// ABOUTME: Pluggable MCP tools and the registry used to rebuild them from saved pipeline JSON
// ABOUTME: Currently ships a single tool, `mimic`, but the trait/registry split supports more
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

pub mod mimic;
pub mod registry;
pub mod traits;

pub use registry::{ToolFactory, ToolRegistry};
pub use traits::{ActionMetadata, Tool};
