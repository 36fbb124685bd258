// ABOUTME: The MIMIC tool: six MCP actions exposing schema introspection and MIMIC-IV queries
// ABOUTME: Ported from the original MIMIC(BaseTool) class in tools/mimic/mimic.py
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! # MIMIC Tool
//!
//! Exposes six actions to an MCP client: `get_database_schema`,
//! `get_table_info`, `execute_mimic_query`, `get_icu_stays`,
//! `get_lab_results`, and `get_race_distribution`. Every action validates
//! its SQL through [`crate::sql::validate`] before handing it to the
//! configured [`Backend`], and every backend error is re-classified into
//! remediation guidance instead of a bare failure message — the same shape
//! the original's exception-message scanning produced.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::auth::{AuthConfig, AuthGuard};
use crate::backend::{Backend, BackendKind, QueryResult};
#[cfg(feature = "embedded")]
use crate::backend::embedded::EmbeddedBackend;
#[cfg(feature = "cloud")]
use crate::backend::cloud::CloudBackend;
use crate::config::{Config, RequiresEnv};
use crate::constants::{
    DEFAULT_DATABASE_FILENAME, DEFAULT_ICU_STAYS_LIMIT, DEFAULT_LAB_RESULTS_LIMIT,
    DEFAULT_MIMIC_VERSION, DEFAULT_RACE_DISTRIBUTION_LIMIT, ENV_BIGQUERY_CREDENTIALS,
    ENV_BIGQUERY_PREFIX, ENV_MIMIC_VERSION, ENV_PROJECT_ID, MAX_QUERY_LIMIT,
};
use crate::errors::{M3Error, M3Result};
use crate::sql;

/// The three tables MIMIC tool actions resolve by logical name.
const RESOLVED_TABLE_KEYS: &[&str] = &["ICUSTAYS_TABLE", "LABEVENTS_TABLE", "ADMISSIONS_TABLE"];

/// Serialized construction parameters for [`MimicTool`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MimicParams {
    /// `"embedded"` or `"cloud"`.
    pub backend_key: String,
    /// Whether OAuth2 bearer-token auth is enforced for this tool's actions.
    #[serde(default)]
    pub auth_enabled: bool,
}

/// The MIMIC-IV MCP tool.
pub struct MimicTool {
    backend_key: String,
    backend: Option<Box<dyn Backend>>,
    auth: Option<AuthGuard>,
    auth_enabled: bool,
    table_names: HashMap<&'static str, String>,
    mimic_version: String,
}

impl MimicTool {
    /// Type tag used for pipeline persistence.
    pub const TYPE_TAG: &'static str = "mimic";

    /// Build an unconfigured tool. Backend connections and table-name
    /// resolution happen in [`Tool::initialize`].
    #[must_use]
    pub fn new(backend_key: impl Into<String>, auth_enabled: bool) -> Self {
        Self {
            backend_key: backend_key.into(),
            backend: None,
            auth: None,
            auth_enabled,
            table_names: HashMap::new(),
            mimic_version: DEFAULT_MIMIC_VERSION.to_owned(),
        }
    }

    /// Reconstruct a tool from its saved `params` object.
    ///
    /// # Errors
    ///
    /// Returns `M3Error::Validation` if `params` doesn't match [`MimicParams`].
    pub fn from_params(params: &Value) -> M3Result<Box<dyn crate::tools::traits::Tool>> {
        let parsed: MimicParams = serde_json::from_value(params.clone())
            .map_err(|e| M3Error::Validation(format!("invalid mimic tool params: {e}")))?;
        Ok(Box::new(Self::new(parsed.backend_key, parsed.auth_enabled)))
    }

    fn table(&self, key: &str) -> &str {
        self.table_names
            .get(key)
            .map(String::as_str)
            .unwrap_or(key)
    }

    fn build_backend(&self, config: &Config) -> M3Result<Box<dyn Backend>> {
        match self.backend_key.as_str() {
            #[cfg(feature = "embedded")]
            "embedded" => {
                let path = config
                    .db_path()
                    .unwrap_or_else(|| config.databases_dir().join(DEFAULT_DATABASE_FILENAME));
                Ok(Box::new(EmbeddedBackend::new(path)))
            }
            #[cfg(feature = "cloud")]
            "cloud" => {
                let project = config.project_id()?;
                let credentials = config.get_env_var(ENV_BIGQUERY_CREDENTIALS, None, true)?;
                Ok(Box::new(CloudBackend::new(project, credentials)))
            }
            other => Err(M3Error::Validation(format!(
                "unsupported or disabled backend '{other}'"
            ))),
        }
    }

    fn resolve_table_names(&mut self, config: &Config) -> M3Result<()> {
        self.mimic_version = config
            .get_env_var(ENV_MIMIC_VERSION, Some(DEFAULT_MIMIC_VERSION), false)?;

        match BackendKind::from_key(&self.backend_key)? {
            BackendKind::Embedded => {
                self.table_names.insert("ICUSTAYS_TABLE", "icu_icustays".to_owned());
                self.table_names.insert("LABEVENTS_TABLE", "hosp_labevents".to_owned());
                self.table_names.insert("ADMISSIONS_TABLE", "hosp_admissions".to_owned());
            }
            BackendKind::Cloud => {
                let prefix = config.get_env_var(ENV_BIGQUERY_PREFIX, None, true)?;
                let version = &self.mimic_version;
                self.table_names.insert(
                    "ICUSTAYS_TABLE",
                    format!("`{prefix}.mimiciv_{version}_icu.icustays`"),
                );
                self.table_names.insert(
                    "LABEVENTS_TABLE",
                    format!("`{prefix}.mimiciv_{version}_hosp.labevents`"),
                );
                self.table_names.insert(
                    "ADMISSIONS_TABLE",
                    format!("`{prefix}.mimiciv_{version}_hosp.admissions`"),
                );
            }
        }
        Ok(())
    }

    fn authorize(&self, authorization_header: Option<&str>) -> M3Result<()> {
        if let Some(guard) = &self.auth {
            guard.authenticate(authorization_header).map(|_| ())?;
        }
        Ok(())
    }

    fn run_validated_query(&self, sql_text: &str) -> M3Result<QueryResult> {
        let backend = self
            .backend
            .as_ref()
            .ok_or_else(|| M3Error::Initialization("mimic tool has not been initialized".to_owned()))?;

        if let Err(reason) = sql::validate(sql_text) {
            return Err(M3Error::Validation(rejection_message(&reason)));
        }

        backend.execute(sql_text).map_err(|err| classify_backend_error(&err, sql_text))
    }

    fn action_get_database_schema(&self) -> M3Result<String> {
        let backend = self
            .backend
            .as_ref()
            .ok_or_else(|| M3Error::Initialization("mimic tool has not been initialized".to_owned()))?;
        let sql_text = match BackendKind::from_key(&self.backend_key)? {
            BackendKind::Embedded => {
                "SELECT table_name FROM information_schema.tables ORDER BY table_name".to_owned()
            }
            BackendKind::Cloud => {
                "SELECT table_catalog, table_schema, table_name FROM information_schema.tables ORDER BY table_name".to_owned()
            }
        };
        let result = backend.execute(&sql_text).map_err(|err| classify_backend_error(&err, &sql_text))?;
        Ok(format!("{}\n{}", backend.describe(), result.format()))
    }

    fn action_get_table_info(&self, table_name: &str, show_sample: bool) -> M3Result<String> {
        let sql_text = match BackendKind::from_key(&self.backend_key)? {
            BackendKind::Embedded => format!("PRAGMA table_info({})", quote_simple_ident(table_name)),
            BackendKind::Cloud => {
                if table_name.split('.').count() != 3 {
                    return Err(M3Error::Validation(format!(
                        "'{table_name}' is not a fully-qualified table name; expected e.g. \
                         `project.dataset.table` such as {}",
                        self.table("ICUSTAYS_TABLE")
                    )));
                }
                format!(
                    "SELECT column_name, data_type FROM {}.INFORMATION_SCHEMA.COLUMNS \
                     WHERE table_name = '{}' ORDER BY ordinal_position",
                    table_name.rsplit_once('.').map(|(ds, _)| ds).unwrap_or(table_name),
                    table_name.rsplit('.').next().unwrap_or(table_name),
                )
            }
        };
        let schema_result = self.run_validated_query(&sql_text)?;
        let mut out = schema_result.format();

        if show_sample {
            let sample_sql = format!("SELECT * FROM {} LIMIT 3", quote_simple_ident(table_name));
            if let Ok(sample) = self.run_validated_query(&sample_sql) {
                out.push_str("\n\nSample rows:\n");
                out.push_str(&sample.format());
            }
        }
        Ok(out)
    }

    fn action_execute_mimic_query(&self, sql_query: &str) -> M3Result<String> {
        match sql::validate(sql_query) {
            Ok(_) => {}
            Err(reason) => {
                let upper = sql_query.trim().to_uppercase();
                if upper.starts_with("DESCRIBE") || upper.starts_with("SHOW") {
                    return Err(M3Error::Validation(
                        "Security Error: DESCRIBE/SHOW statements are not executed directly. \
                         Use get_table_info instead."
                            .to_owned(),
                    ));
                }
                return Err(M3Error::Validation(format!(
                    "Security Error: {reason}. Only SELECT queries are permitted."
                )));
            }
        }
        let backend = self
            .backend
            .as_ref()
            .ok_or_else(|| M3Error::Initialization("mimic tool has not been initialized".to_owned()))?;
        let result = backend
            .execute(sql_query)
            .map_err(|err| classify_backend_error(&err, sql_query))?;
        Ok(result.format())
    }

    fn action_get_icu_stays(&self, patient_id: Option<i64>, limit: u64) -> M3Result<String> {
        let limit = validate_limit(limit)?;
        let table = self.table("ICUSTAYS_TABLE");
        let sql_text = match patient_id {
            Some(id) => format!(
                "SELECT * FROM {table} WHERE subject_id = {id} LIMIT {limit}"
            ),
            None => format!("SELECT * FROM {table} LIMIT {limit}"),
        };
        let result = self.run_validated_query(&sql_text)?;
        Ok(result.format())
    }

    fn action_get_lab_results(
        &self,
        patient_id: Option<i64>,
        lab_item: Option<&str>,
        limit: u64,
    ) -> M3Result<String> {
        let limit = validate_limit(limit)?;
        let table = self.table("LABEVENTS_TABLE");
        let mut clauses = Vec::new();
        if let Some(id) = patient_id {
            clauses.push(format!("subject_id = {id}"));
        }
        if let Some(item) = lab_item {
            let escaped = item.replace('\'', "''");
            clauses.push(format!("label LIKE '%{escaped}%'"));
        }
        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };
        let sql_text = format!("SELECT * FROM {table}{where_clause} LIMIT {limit}");
        let result = self.run_validated_query(&sql_text)?;
        Ok(result.format())
    }

    fn action_get_race_distribution(&self, limit: u64) -> M3Result<String> {
        let limit = validate_limit(limit)?;
        let table = self.table("ADMISSIONS_TABLE");
        let sql_text = format!(
            "SELECT race, COUNT(*) AS n FROM {table} GROUP BY race ORDER BY n DESC LIMIT {limit}"
        );
        let result = self.run_validated_query(&sql_text)?;
        Ok(result.format())
    }
}

fn validate_limit(limit: u64) -> M3Result<u64> {
    if limit == 0 || limit > MAX_QUERY_LIMIT {
        return Err(M3Error::Validation(format!(
            "limit must be between 1 and {MAX_QUERY_LIMIT}, got {limit}"
        )));
    }
    Ok(limit)
}

fn quote_simple_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn rejection_message(reason: &sql::RejectionReason) -> String {
    format!("Security Error: {reason}. Only SELECT queries are permitted.")
}

/// Inspect a backend error's message and rewrite it into actionable
/// guidance, the same way the original's `execute_mimic_query` inspected
/// exception text for "no such table"/"no such column"/"syntax error".
fn classify_backend_error(error: &M3Error, sql_text: &str) -> M3Error {
    let message = error.to_string().to_lowercase();
    if message.contains("no such table") || message.contains("table not found") || message.contains("not found: table") {
        M3Error::BackendExecution(format!(
            "Query failed: table not found. Use get_database_schema to list available tables. \
             Original error: {error}"
        ))
    } else if message.contains("no such column") || message.contains("column not found") || message.contains("unrecognized column") {
        M3Error::BackendExecution(format!(
            "Query failed: column not found. Use get_table_info to inspect the table's columns. \
             Original error: {error}"
        ))
    } else if message.contains("syntax error") || message.contains("parser error") {
        M3Error::BackendExecution(format!(
            "Query failed: SQL syntax error in '{sql_text}'. Original error: {error}"
        ))
    } else {
        M3Error::BackendExecution(error.to_string())
    }
}

impl RequiresEnv for MimicTool {
    fn config_prefix(&self) -> &'static str {
        "MIMIC"
    }

    fn required_env_keys(&self) -> Vec<&'static str> {
        match self.backend_key.as_str() {
            "cloud" => vec![
                ENV_PROJECT_ID,
                ENV_BIGQUERY_CREDENTIALS,
                ENV_BIGQUERY_PREFIX,
            ],
            _ => Vec::new(),
        }
    }
}

#[async_trait]
impl crate::tools::traits::Tool for MimicTool {
    fn type_tag(&self) -> &'static str {
        Self::TYPE_TAG
    }

    fn initialize(&mut self, config: &Config) -> M3Result<()> {
        self.resolve_table_names(config)?;
        let mut backend = self.build_backend(config)?;
        backend.initialize()?;
        self.backend = Some(backend);

        if self.auth_enabled {
            self.auth = Some(AuthGuard::new(AuthConfig::from_config(config)));
        }
        Ok(())
    }

    fn actions(&self) -> Vec<crate::tools::traits::ActionMetadata> {
        vec![
            crate::tools::traits::ActionMetadata {
                name: "get_database_schema",
                description: "List every table/view available in the configured MIMIC-IV backend.",
                input_schema: json!({"type": "object", "properties": {}}),
            },
            crate::tools::traits::ActionMetadata {
                name: "get_table_info",
                description: "Describe a table's columns, optionally with a 3-row sample.",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "table_name": {"type": "string"},
                        "show_sample": {"type": "boolean", "default": true}
                    },
                    "required": ["table_name"]
                }),
            },
            crate::tools::traits::ActionMetadata {
                name: "execute_mimic_query",
                description: "Execute a single read-only SELECT query against the MIMIC-IV backend.",
                input_schema: json!({
                    "type": "object",
                    "properties": {"sql_query": {"type": "string"}},
                    "required": ["sql_query"]
                }),
            },
            crate::tools::traits::ActionMetadata {
                name: "get_icu_stays",
                description: "Convenience query over ICU stays, optionally filtered by patient.",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "patient_id": {"type": "integer"},
                        "limit": {"type": "integer", "default": DEFAULT_ICU_STAYS_LIMIT}
                    }
                }),
            },
            crate::tools::traits::ActionMetadata {
                name: "get_lab_results",
                description: "Convenience query over lab events, optionally filtered by patient or lab name.",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "patient_id": {"type": "integer"},
                        "lab_item": {"type": "string"},
                        "limit": {"type": "integer", "default": DEFAULT_LAB_RESULTS_LIMIT}
                    }
                }),
            },
            crate::tools::traits::ActionMetadata {
                name: "get_race_distribution",
                description: "Convenience query returning patient counts grouped by recorded race.",
                input_schema: json!({
                    "type": "object",
                    "properties": {"limit": {"type": "integer", "default": DEFAULT_RACE_DISTRIBUTION_LIMIT}}
                }),
            },
        ]
    }

    async fn call(&self, action_name: &str, args: Value) -> M3Result<String> {
        self.authorize(args.get("authorization").and_then(Value::as_str))?;

        match action_name {
            "get_database_schema" => self.action_get_database_schema(),
            "get_table_info" => {
                let table_name = args
                    .get("table_name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| M3Error::Validation("'table_name' is required".to_owned()))?;
                let show_sample = args
                    .get("show_sample")
                    .and_then(Value::as_bool)
                    .unwrap_or(true);
                self.action_get_table_info(table_name, show_sample)
            }
            "execute_mimic_query" => {
                let sql_query = args
                    .get("sql_query")
                    .and_then(Value::as_str)
                    .ok_or_else(|| M3Error::Validation("'sql_query' is required".to_owned()))?;
                self.action_execute_mimic_query(sql_query)
            }
            "get_icu_stays" => {
                let patient_id = args.get("patient_id").and_then(Value::as_i64);
                let limit = args
                    .get("limit")
                    .and_then(Value::as_u64)
                    .unwrap_or(DEFAULT_ICU_STAYS_LIMIT);
                self.action_get_icu_stays(patient_id, limit)
            }
            "get_lab_results" => {
                let patient_id = args.get("patient_id").and_then(Value::as_i64);
                let lab_item = args.get("lab_item").and_then(Value::as_str);
                let limit = args
                    .get("limit")
                    .and_then(Value::as_u64)
                    .unwrap_or(DEFAULT_LAB_RESULTS_LIMIT);
                self.action_get_lab_results(patient_id, lab_item, limit)
            }
            "get_race_distribution" => {
                let limit = args
                    .get("limit")
                    .and_then(Value::as_u64)
                    .unwrap_or(DEFAULT_RACE_DISTRIBUTION_LIMIT);
                self.action_get_race_distribution(limit)
            }
            other => Err(M3Error::Validation(format!("unknown mimic action '{other}'"))),
        }
    }

    fn to_params(&self) -> M3Result<Value> {
        serde_json::to_value(MimicParams {
            backend_key: self.backend_key.clone(),
            auth_enabled: self.auth_enabled,
        })
        .map_err(M3Error::from)
    }

    fn teardown(&mut self) {
        if let Some(backend) = self.backend.as_mut() {
            let _ = backend.teardown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::traits::Tool;

    fn test_config() -> Config {
        Config::default()
    }

    #[tokio::test]
    async fn rejects_unsafe_query() {
        let mut tool = MimicTool::new("embedded", false);
        tool.initialize(&test_config()).unwrap();
        let result = tool
            .call("execute_mimic_query", json!({"sql_query": "DROP TABLE icu_icustays"}))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn rejects_limit_over_max() {
        let mut tool = MimicTool::new("embedded", false);
        tool.initialize(&test_config()).unwrap();
        let result = tool
            .call("get_icu_stays", json!({"limit": 5000}))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn get_database_schema_reports_empty_catalog() {
        let mut tool = MimicTool::new("embedded", false);
        tool.initialize(&test_config()).unwrap();
        let result = tool.call("get_database_schema", json!({})).await.unwrap();
        assert!(result.contains("Backend: embedded"));
    }

    #[tokio::test]
    async fn unknown_action_errors() {
        let mut tool = MimicTool::new("embedded", false);
        tool.initialize(&test_config()).unwrap();
        let result = tool.call("not_a_real_action", json!({})).await;
        assert!(result.is_err());
    }

    #[test]
    fn round_trips_through_params() {
        let tool = MimicTool::new("embedded", true);
        let params = tool.to_params().unwrap();
        let restored = MimicTool::from_params(&params).unwrap();
        assert_eq!(restored.type_tag(), MimicTool::TYPE_TAG);
    }

    #[test]
    fn validate_limit_rejects_zero() {
        assert!(validate_limit(0).is_err());
    }

    #[test]
    fn validate_limit_accepts_in_range() {
        assert_eq!(validate_limit(10).unwrap(), 10);
    }
}
