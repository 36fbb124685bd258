// ABOUTME: Streams a single discovered file to disk with progress reporting, fail-fast on error
// ABOUTME: Mirrors the original's _download_single_file streaming-chunk-with-cleanup-on-failure behavior
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::AsyncWriteExt;

use crate::errors::{M3Error, M3Result};

use super::discover::DiscoveredFile;

/// Download `file` into `dest_dir`, streaming to disk and reporting
/// progress via `indicatif`. On any failure the partially written file is
/// removed so a retry never sees a truncated file as complete.
///
/// # Errors
///
/// Returns `M3Error::DataIo` on any network or filesystem failure.
pub async fn download_file(file: &DiscoveredFile, dest_dir: &Path) -> M3Result<PathBuf> {
    let dest_path = dest_dir.join(&file.file_name);
    if dest_path.is_file() {
        return Ok(dest_path);
    }

    let result = download_inner(file, &dest_path).await;
    if result.is_err() {
        let _ = std::fs::remove_file(&dest_path);
    }
    result?;
    Ok(dest_path)
}

async fn download_inner(file: &DiscoveredFile, dest_path: &Path) -> M3Result<()> {
    let response = reqwest::get(&file.url)
        .await
        .map_err(|e| M3Error::DataIo(format!("failed to request {}: {e}", file.url)))?;
    if !response.status().is_success() {
        return Err(M3Error::DataIo(format!(
            "download of {} failed with status {}",
            file.url,
            response.status()
        )));
    }

    let total_size = response.content_length().unwrap_or(0);
    let progress = ProgressBar::new(total_size);
    if let Ok(style) = ProgressStyle::with_template(
        "{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
    ) {
        progress.set_style(style.progress_chars("#>-"));
    }
    progress.set_message(file.file_name.clone());

    let mut out = tokio::fs::File::create(dest_path)
        .await
        .map_err(|e| M3Error::DataIo(format!("failed to create {}: {e}", dest_path.display())))?;

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| M3Error::DataIo(format!("stream error for {}: {e}", file.url)))?;
        out.write_all(&chunk)
            .await
            .map_err(|e| M3Error::DataIo(format!("write error for {}: {e}", dest_path.display())))?;
        progress.inc(chunk.len() as u64);
    }
    progress.finish_and_clear();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn skips_download_when_file_already_present() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join("already-here.csv.gz");
        std::fs::write(&existing, b"cached").unwrap();

        let file = DiscoveredFile {
            url: "https://example.invalid/already-here.csv.gz".to_owned(),
            file_name: "already-here.csv.gz".to_owned(),
        };
        let result = download_file(&file, dir.path()).await.unwrap();
        assert_eq!(result, existing);
        assert_eq!(std::fs::read(&result).unwrap(), b"cached");
    }
}
