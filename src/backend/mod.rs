// ABOUTME: Storage backend abstraction over the embedded DuckDB/Parquet engine and BigQuery
// ABOUTME: Tools talk to whichever backend is configured through this single trait
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! # Backend
//!
//! A `Backend` executes a single validated SQL statement and returns a
//! [`QueryResult`]. There are two implementations: [`embedded::EmbeddedBackend`]
//! runs DuckDB over local Parquet views, and [`cloud::CloudBackend`] talks to
//! BigQuery's REST API. Both are persisted/restored through the `BackendKind`
//! tag so a saved pipeline can be reloaded without re-running `build()`.

#[cfg(feature = "embedded")]
pub mod embedded;

#[cfg(feature = "cloud")]
pub mod cloud;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::M3Result;

/// Tabular result of executing a query, independent of the backend that
/// produced it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column names in result order.
    pub columns: Vec<String>,
    /// Row data; each inner vec has `columns.len()` entries.
    pub rows: Vec<Vec<Value>>,
}

impl QueryResult {
    /// Number of rows actually returned by the backend (before truncation).
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Render this result the way `BackendBase._format_result` does: "No
    /// results found" when empty, a plain-text table otherwise, truncated
    /// to [`crate::constants::MAX_DISPLAY_ROWS`] with a trailing count note.
    #[must_use]
    pub fn format(&self) -> String {
        if self.rows.is_empty() {
            return "No results found".to_owned();
        }

        let total = self.rows.len();
        let truncated = total > crate::constants::MAX_DISPLAY_ROWS;
        let shown = &self.rows[..total.min(crate::constants::MAX_DISPLAY_ROWS)];

        let mut out = String::new();
        out.push_str(&self.columns.join(" | "));
        out.push('\n');
        for row in shown {
            let cells: Vec<String> = row.iter().map(render_cell).collect();
            out.push_str(&cells.join(" | "));
            out.push('\n');
        }
        if truncated {
            out.push_str(&format!(
                "... ({total} total rows, showing first {})",
                crate::constants::MAX_DISPLAY_ROWS
            ));
        }
        out
    }
}

fn render_cell(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_owned(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Which concrete backend a serialized tool refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// DuckDB over local Parquet views.
    Embedded,
    /// Google BigQuery via REST.
    Cloud,
}

impl BackendKind {
    /// The lowercase key used as the tool's `backend_key` (spec section 4.6).
    #[must_use]
    pub const fn as_key(self) -> &'static str {
        match self {
            Self::Embedded => "embedded",
            Self::Cloud => "cloud",
        }
    }

    /// Parse a backend key, the inverse of [`BackendKind::as_key`].
    ///
    /// # Errors
    ///
    /// Returns `M3Error::Validation` for any key other than `embedded`/`cloud`.
    pub fn from_key(key: &str) -> M3Result<Self> {
        match key {
            "embedded" => Ok(Self::Embedded),
            "cloud" => Ok(Self::Cloud),
            other => Err(crate::errors::M3Error::Validation(format!(
                "unknown backend key '{other}', expected 'embedded' or 'cloud'"
            ))),
        }
    }
}

/// Storage backend executing validated, already-safety-checked SQL.
///
/// Implementations are intentionally synchronous: DuckDB's C API and the
/// blocking `reqwest` calls used for the BigQuery REST client are both
/// short-lived relative to a single stdio request/response cycle, and the
/// MCP server host processes one request at a time (spec section 6).
pub trait Backend: Send + Sync {
    /// Which kind this is, for persistence round-tripping.
    fn kind(&self) -> BackendKind;

    /// Open connections/clients and verify the target is reachable.
    ///
    /// # Errors
    ///
    /// Returns `M3Error::Initialization` if the backend cannot be reached
    /// or the local database/view setup fails.
    fn initialize(&mut self) -> M3Result<()>;

    /// Run a single statement and return its result set.
    ///
    /// # Errors
    ///
    /// Returns `M3Error::BackendExecution` with the backend's own message
    /// preserved, so the tool layer can classify missing-table/
    /// missing-column/syntax errors into remediation guidance.
    fn execute(&self, sql: &str) -> M3Result<QueryResult>;

    /// Release any held resources. Safe to call more than once.
    fn teardown(&mut self) -> M3Result<()> {
        Ok(())
    }

    /// Short banner identifying the backend in tool output, e.g.
    /// `"Backend: embedded (DuckDB)"`.
    fn describe(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_empty_result() {
        let result = QueryResult::default();
        assert_eq!(result.format(), "No results found");
    }

    #[test]
    fn format_truncates_past_fifty_rows() {
        let columns = vec!["n".to_owned()];
        let rows = (0..75)
            .map(|i| vec![Value::from(i)])
            .collect::<Vec<_>>();
        let result = QueryResult { columns, rows };
        let rendered = result.format();
        assert!(rendered.contains("75 total rows, showing first 50"));
    }

    #[test]
    fn backend_kind_round_trips_through_key() {
        assert_eq!(BackendKind::from_key("embedded").unwrap(), BackendKind::Embedded);
        assert_eq!(BackendKind::from_key("cloud").unwrap(), BackendKind::Cloud);
        assert!(BackendKind::from_key("bogus").is_err());
    }
}
