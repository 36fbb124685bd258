// ABOUTME: Dataset ingestion pipeline: discover listing pages, download, convert, register views
// ABOUTME: Grounded on the original DataIO's scrape/download/ETL control flow
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! # Data I/O
//!
//! Four sequential stages turn a [`crate::datasets::DatasetDefinition`] into
//! queryable views: [`discover`] scrapes each module's listing page for
//! `.csv.gz` file links, [`download`] fetches them with progress reporting,
//! [`convert`] turns each CSV into a Zstd-compressed Parquet file via
//! DuckDB's `COPY ... TO ... (FORMAT PARQUET)`, and [`register`] creates a
//! `CREATE OR REPLACE VIEW` over each Parquet file so it's idempotent across
//! restarts.

pub mod convert;
pub mod discover;
pub mod download;
pub mod register;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::backend::embedded::EmbeddedBackend;
use crate::config::Config;
use crate::datasets::DatasetDefinition;
use crate::errors::{M3Error, M3Result};

/// Caps how many CSV->Parquet conversions run concurrently, since each one
/// spawns a blocking DuckDB job; unbounded concurrency here would just
/// contend for the same disk I/O and CPU cores without finishing sooner.
const MAX_CONCURRENT_CONVERSIONS: usize = 4;

/// Run the full discover -> download -> convert -> register pipeline for
/// one dataset against the embedded backend.
///
/// Discovery and download run sequentially per module, failing fast on the
/// first error the way the original pipeline did. Conversion then runs
/// across a bounded worker pool since it's CPU/disk-bound and each file is
/// independent of the others. Registration is cheap DDL and runs
/// sequentially once every file in the batch has converted.
///
/// # Errors
///
/// Returns `M3Error::DataIo` if discovery/download fails, or the first
/// conversion/registration error encountered.
pub async fn ingest_dataset(
    dataset: &DatasetDefinition,
    config: &Config,
    backend: &EmbeddedBackend,
) -> M3Result<Vec<PathBuf>> {
    let raw_dir = config.raw_files_dir(&dataset.key);
    let parquet_dir = config.data_dir().join("parquet").join(&dataset.key);
    std::fs::create_dir_all(&raw_dir)?;
    std::fs::create_dir_all(&parquet_dir)?;

    let mut downloaded_files: Vec<(String, PathBuf)> = Vec::new();
    for module in &dataset.modules {
        let files = discover::discover_files(&module.listing_url).await?;
        for file in files {
            let downloaded = download::download_file(&file, &raw_dir).await?;
            downloaded_files.push((module.module.clone(), downloaded));
        }
    }

    // Small files first so progress advances smoothly rather than stalling
    // on the worker pool's slots all being held by the largest shards.
    downloaded_files.sort_by_key(|(_, path)| {
        std::fs::metadata(path).map(|meta| meta.len()).unwrap_or(u64::MAX)
    });

    let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_CONVERSIONS));
    let mut conversions = JoinSet::new();
    for (module_name, csv_path) in downloaded_files {
        let permit = Arc::clone(&semaphore);
        let parquet_dir = parquet_dir.clone();
        conversions.spawn(async move {
            let _permit = permit
                .acquire_owned()
                .await
                .map_err(|e| M3Error::DataIo(format!("conversion pool shut down: {e}")))?;
            tokio::task::spawn_blocking(move || {
                let parquet_path = convert::convert_to_parquet(&csv_path, &parquet_dir)?;
                Ok::<_, M3Error>((module_name, csv_path, parquet_path))
            })
            .await
            .map_err(|e| M3Error::DataIo(format!("conversion task panicked: {e}")))?
        });
    }

    let mut converted = Vec::new();
    while let Some(joined) = conversions.join_next().await {
        let result = joined.map_err(|e| M3Error::DataIo(format!("conversion task panicked: {e}")))?;
        converted.push(result?);
    }

    let mut registered_views = Vec::with_capacity(converted.len());
    for (module_name, csv_path, parquet_path) in converted {
        let view_name = DatasetDefinition::table_name(
            &module_name,
            csv_path.file_name().and_then(|n| n.to_str()).unwrap_or_default(),
        );
        register::register_view(backend, &view_name, &parquet_path)?;
        registered_views.push(parquet_path);
    }

    let verified_rows = register::verify_registration(backend, &dataset.primary_verification_table)?;
    tracing::info!(
        table = %dataset.primary_verification_table,
        rows = verified_rows,
        "verified dataset registration"
    );

    Ok(registered_views)
}
