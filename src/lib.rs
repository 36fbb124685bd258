// ABOUTME: Library root wiring config, backends, SQL safety, auth, data ingestion, tools, and MCP
// ABOUTME: The m3-server binary is a thin shell around Pipeline::build/run
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! # M3
//!
//! A composable MCP server exposing the MIMIC-IV clinical database to LLM
//! agents over JSON-RPC/stdio, backed by either an embedded DuckDB/Parquet
//! database or Google BigQuery.

pub mod auth;
pub mod backend;
pub mod config;
pub mod constants;
pub mod datasets;
pub mod errors;
pub mod logging;
pub mod mcp;
pub mod pipeline;
pub mod sql;
pub mod tools;

#[cfg(feature = "embedded")]
pub mod data_io;

pub use config::Config;
pub use errors::{M3Error, M3Result};
pub use pipeline::Pipeline;
