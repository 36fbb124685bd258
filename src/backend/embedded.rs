// ABOUTME: Embedded backend running DuckDB over local Parquet-backed views
// ABOUTME: Views are registered ahead of time by the data-io pipeline; this module only queries
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! DuckDB-backed [`Backend`] implementation.
//!
//! DuckDB is opened against a small on-disk catalog file (so `CREATE VIEW`
//! statements persist across restarts) while the actual row data lives in
//! Parquet files referenced by `read_parquet(...)` in each view body. This
//! mirrors the original's SQLite convenience-function layer but swaps the
//! storage engine for a columnar one better suited to analytical queries
//! over a multi-gigabyte clinical dataset.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use duckdb::types::ValueRef;
use duckdb::Connection;
use serde_json::Value;

use crate::errors::{M3Error, M3Result};

use super::{Backend, BackendKind, QueryResult};

/// DuckDB-backed embedded backend.
pub struct EmbeddedBackend {
    database_path: PathBuf,
    conn: Mutex<Option<Connection>>,
}

impl EmbeddedBackend {
    /// Build a backend pointed at the given DuckDB catalog file. The file
    /// is created on first `initialize()` if it doesn't already exist.
    #[must_use]
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
            conn: Mutex::new(None),
        }
    }

    /// Path to the catalog file this backend opens.
    #[must_use]
    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    /// Register (or re-register) a view over a Parquet file. Idempotent:
    /// safe to call on every startup even if the view already exists.
    ///
    /// # Errors
    ///
    /// Returns `M3Error::BackendExecution` if DuckDB rejects the DDL.
    pub fn register_parquet_view(&self, view_name: &str, parquet_glob: &str) -> M3Result<()> {
        let guard = self.conn.lock().map_err(|_| poisoned())?;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;
        let sql = format!(
            "CREATE OR REPLACE VIEW {} AS SELECT * FROM read_parquet('{}')",
            quote_ident(view_name),
            parquet_glob.replace('\'', "''")
        );
        conn.execute_batch(&sql).map_err(M3Error::from)
    }

    /// List every view/table currently registered in the catalog.
    ///
    /// # Errors
    ///
    /// Returns `M3Error::BackendExecution` if the catalog query fails.
    pub fn list_tables(&self) -> M3Result<Vec<String>> {
        let result = self.execute(
            "SELECT table_name FROM information_schema.tables ORDER BY table_name",
        )?;
        Ok(result
            .rows
            .into_iter()
            .filter_map(|row| row.into_iter().next())
            .filter_map(|value| value.as_str().map(str::to_owned))
            .collect())
    }
}

impl Backend for EmbeddedBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Embedded
    }

    fn initialize(&mut self) -> M3Result<()> {
        if let Some(parent) = self.database_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&self.database_path)
            .map_err(|e| M3Error::Initialization(format!("failed to open DuckDB at {}: {e}", self.database_path.display())))?;
        *self.conn.lock().map_err(|_| poisoned())? = Some(conn);
        Ok(())
    }

    fn execute(&self, sql: &str) -> M3Result<QueryResult> {
        let guard = self.conn.lock().map_err(|_| poisoned())?;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        let mut stmt = conn.prepare(sql).map_err(M3Error::from)?;
        let column_count = stmt.column_count();
        let columns: Vec<String> = (0..column_count)
            .map(|i| stmt.column_name(i).unwrap_or("?").to_owned())
            .collect();

        let mut rows_out = Vec::new();
        let mut rows = stmt.query([]).map_err(M3Error::from)?;
        while let Some(row) = rows.next().map_err(M3Error::from)? {
            let mut values = Vec::with_capacity(column_count);
            for i in 0..column_count {
                values.push(value_ref_to_json(row.get_ref(i).map_err(M3Error::from)?));
            }
            rows_out.push(values);
        }

        Ok(QueryResult {
            columns,
            rows: rows_out,
        })
    }

    fn teardown(&mut self) -> M3Result<()> {
        *self.conn.lock().map_err(|_| poisoned())? = None;
        Ok(())
    }

    fn describe(&self) -> String {
        format!(
            "Backend: embedded (DuckDB at {})",
            self.database_path.display()
        )
    }
}

fn not_initialized() -> M3Error {
    M3Error::Initialization("embedded backend has not been initialized".to_owned())
}

fn poisoned() -> M3Error {
    M3Error::BackendExecution("embedded backend connection lock was poisoned".to_owned())
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn value_ref_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Boolean(v) => Value::Bool(v),
        ValueRef::TinyInt(v) => Value::from(v),
        ValueRef::SmallInt(v) => Value::from(v),
        ValueRef::Int(v) => Value::from(v),
        ValueRef::BigInt(v) => Value::from(v),
        ValueRef::HugeInt(v) => Value::from(v as i64),
        ValueRef::UTinyInt(v) => Value::from(v),
        ValueRef::USmallInt(v) => Value::from(v),
        ValueRef::UInt(v) => Value::from(v),
        ValueRef::UBigInt(v) => Value::from(v),
        ValueRef::Float(v) => serde_json::Number::from_f64(f64::from(v))
            .map_or(Value::Null, Value::Number),
        ValueRef::Double(v) => serde_json::Number::from_f64(v).map_or(Value::Null, Value::Number),
        ValueRef::Text(v) => Value::String(String::from_utf8_lossy(v).into_owned()),
        ValueRef::Blob(v) => Value::String(format!("<{} bytes>", v.len())),
        other => Value::String(format!("{other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_backend() -> EmbeddedBackend {
        let mut backend = EmbeddedBackend::new(":memory:");
        backend.initialize().unwrap();
        backend
    }

    #[test]
    fn executes_simple_select() {
        let backend = memory_backend();
        let result = backend.execute("SELECT 1 AS n, 'a' AS s").unwrap();
        assert_eq!(result.columns, vec!["n", "s"]);
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0][0], Value::from(1));
        assert_eq!(result.rows[0][1], Value::String("a".into()));
    }

    #[test]
    fn execute_before_initialize_errors() {
        let backend = EmbeddedBackend::new(":memory:");
        let err = backend.execute("SELECT 1").unwrap_err();
        assert!(matches!(err, M3Error::Initialization(_)));
    }

    #[test]
    fn teardown_then_execute_errors() {
        let mut backend = memory_backend();
        backend.teardown().unwrap();
        assert!(backend.execute("SELECT 1").is_err());
    }

    #[test]
    fn list_tables_reflects_created_table() {
        let backend = memory_backend();
        {
            let guard = backend.conn.lock().unwrap();
            guard
                .as_ref()
                .unwrap()
                .execute_batch("CREATE TABLE demo (id INTEGER)")
                .unwrap();
        }
        let tables = backend.list_tables().unwrap();
        assert!(tables.iter().any(|t| t == "demo"));
    }
}
