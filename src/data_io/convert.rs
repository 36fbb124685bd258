// ABOUTME: Converts one downloaded CSV(.gz) file to a Zstd-compressed Parquet file via DuckDB
// ABOUTME: Replaces the original's polars-to-SQLite ETL step with the spec's DuckDB/Parquet pipeline
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use std::path::{Path, PathBuf};

use duckdb::Connection;

use crate::errors::{M3Error, M3Result};

/// Convert `csv_path` to a Parquet file under `dest_dir`, using DuckDB's
/// `read_csv_auto` for robust type inference (the Rust-native analogue of
/// the original's polars `null_values` handling) and Zstd compression.
///
/// This function is synchronous and blocking; callers running it from an
/// async context should dispatch it through `tokio::task::spawn_blocking`.
///
/// # Errors
///
/// Returns `M3Error::DataIo` if the destination can't be created, or
/// `M3Error::BackendExecution` if DuckDB's `COPY` fails.
pub fn convert_to_parquet(csv_path: &Path, dest_dir: &Path) -> M3Result<PathBuf> {
    std::fs::create_dir_all(dest_dir)?;

    let stem = csv_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("output")
        .trim_end_matches(".gz")
        .trim_end_matches(".csv")
        .to_owned();
    let dest_path = dest_dir.join(format!("{stem}.parquet"));

    let conn = Connection::open_in_memory().map_err(M3Error::from)?;
    let sql = format!(
        "COPY (SELECT * FROM read_csv_auto('{}', nullstr=['', 'NULL', 'null', '\\N', 'NA'])) \
         TO '{}' (FORMAT PARQUET, COMPRESSION ZSTD)",
        escape_literal(&csv_path.to_string_lossy()),
        escape_literal(&dest_path.to_string_lossy()),
    );
    conn.execute_batch(&sql).map_err(M3Error::from)?;
    Ok(dest_path)
}

fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_a_simple_csv_to_parquet() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("patients.csv");
        std::fs::write(&csv_path, "subject_id,gender\n1,F\n2,M\n").unwrap();

        let parquet_path = convert_to_parquet(&csv_path, dir.path()).unwrap();
        assert!(parquet_path.is_file());
        assert_eq!(parquet_path.file_name().unwrap(), "patients.parquet");

        let conn = Connection::open_in_memory().unwrap();
        let count: i64 = conn
            .query_row(
                &format!(
                    "SELECT COUNT(*) FROM read_parquet('{}')",
                    parquet_path.to_string_lossy()
                ),
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn rerunning_conversion_overwrites_the_destination() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("labs.csv");
        std::fs::write(&csv_path, "itemid\n1\n").unwrap();
        let first = convert_to_parquet(&csv_path, dir.path()).unwrap();

        std::fs::write(&csv_path, "itemid\n1\n2\n3\n").unwrap();
        let second = convert_to_parquet(&csv_path, dir.path()).unwrap();
        assert_eq!(first, second);

        let conn = Connection::open_in_memory().unwrap();
        let count: i64 = conn
            .query_row(
                &format!(
                    "SELECT COUNT(*) FROM read_parquet('{}')",
                    second.to_string_lossy()
                ),
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 3);
    }
}
