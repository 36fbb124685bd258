// ABOUTME: Binary entry point: initializes logging, builds or loads the pipeline, runs the server
// ABOUTME: Exit code 0 on clean shutdown (stdin closed), 1 on any build/run failure
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use std::path::PathBuf;

use m3_mcp_server::config::Config;
use m3_mcp_server::constants::ENV_CONFIG_PATH;
use m3_mcp_server::tools::ToolRegistry;
use m3_mcp_server::Pipeline;

#[tokio::main]
async fn main() {
    if let Err(err) = m3_mcp_server::logging::init_from_env() {
        eprintln!("failed to initialize logging: {err}");
    }

    if let Err(err) = run().await {
        tracing::error!(error = %err, "m3 server exited with an error");
        std::process::exit(1);
    }
}

/// `M3_CONFIG_PATH` must name a pipeline file produced ahead of time (e.g.
/// by a build step that scrapes/converts/registers a dataset). There is no
/// fallback that builds a fresh pipeline from bare environment variables at
/// server startup.
async fn run() -> m3_mcp_server::M3Result<()> {
    let config = Config::default();

    let saved_path = config.get_env_var(ENV_CONFIG_PATH, None, true)?;
    tracing::info!(path = %saved_path, "loading pipeline from saved configuration");
    let pipeline = Pipeline::load(&PathBuf::from(saved_path), &ToolRegistry::default())?;

    pipeline.run().await
}
