// ABOUTME: Registers a Parquet file as a queryable DuckDB view, idempotently
// ABOUTME: The final stage of the ingestion pipeline; safe to re-run on every startup
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use std::path::Path;

use crate::backend::{embedded::EmbeddedBackend, Backend};
use crate::errors::{M3Error, M3Result};

/// Register `parquet_path` as a view named `view_name` on `backend`.
///
/// # Errors
///
/// Returns `M3Error::BackendExecution` if the `CREATE OR REPLACE VIEW`
/// statement fails.
pub fn register_view(backend: &EmbeddedBackend, view_name: &str, parquet_path: &Path) -> M3Result<()> {
    backend.register_parquet_view(view_name, &parquet_path.to_string_lossy())
}

/// Commit, then verify by querying `verification_table`'s row count.
///
/// Run once every view in a dataset has been registered, against the
/// dataset's `primary_verification_table`. A verification table with zero
/// rows means the registered views point at empty/corrupt Parquet files.
///
/// # Errors
///
/// Returns `M3Error::BackendExecution` if the verification query fails, or
/// `M3Error::DataIo` if the table exists but came back empty.
pub fn verify_registration(backend: &EmbeddedBackend, verification_table: &str) -> M3Result<u64> {
    let sql_text = format!("SELECT COUNT(*) AS n FROM {verification_table}");
    let result = Backend::execute(backend, &sql_text)?;
    let count = result
        .rows
        .first()
        .and_then(|row| row.first())
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| {
            M3Error::DataIo(format!(
                "verification query against '{verification_table}' returned no row count"
            ))
        })?;
    if count == 0 {
        return Err(M3Error::DataIo(format!(
            "verification table '{verification_table}' is empty after registration"
        )));
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_and_queries_a_view() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("demo.csv");
        std::fs::write(&csv_path, "id\n1\n2\n3\n").unwrap();
        let parquet_path = super::super::convert::convert_to_parquet(&csv_path, dir.path()).unwrap();

        let mut backend = EmbeddedBackend::new(dir.path().join("catalog.db"));
        backend.initialize().unwrap();
        register_view(&backend, "icu_demo", &parquet_path).unwrap();

        let result = crate::backend::Backend::execute(&backend, "SELECT COUNT(*) AS n FROM icu_demo").unwrap();
        assert_eq!(result.rows[0][0], serde_json::Value::from(3));
    }

    #[test]
    fn verify_registration_reports_row_count() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("demo.csv");
        std::fs::write(&csv_path, "id\n1\n2\n3\n").unwrap();
        let parquet_path = super::super::convert::convert_to_parquet(&csv_path, dir.path()).unwrap();

        let mut backend = EmbeddedBackend::new(dir.path().join("catalog.db"));
        backend.initialize().unwrap();
        register_view(&backend, "icu_demo", &parquet_path).unwrap();

        let count = verify_registration(&backend, "icu_demo").unwrap();
        assert_eq!(count, 3);
    }

    #[test]
    fn verify_registration_errors_on_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("empty.csv");
        std::fs::write(&csv_path, "id\n").unwrap();
        let parquet_path = super::super::convert::convert_to_parquet(&csv_path, dir.path()).unwrap();

        let mut backend = EmbeddedBackend::new(dir.path().join("catalog.db"));
        backend.initialize().unwrap();
        register_view(&backend, "icu_empty", &parquet_path).unwrap();

        assert!(verify_registration(&backend, "icu_empty").is_err());
    }
}
