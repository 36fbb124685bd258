// ABOUTME: Pipeline-wide configuration: env var precedence, log level, and derived paths
// ABOUTME: Tools validate their required keys against this config before the pipeline builds
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! # Configuration
//!
//! `Config` holds an explicit key/value override map plus a log level, and
//! resolves any requested key by checking the override map first, then the
//! process environment, then a caller-supplied default. Tools declare which
//! env keys they require (optionally prefixed by their own name) and
//! `Config::validate_for_tools` aggregates every missing key into a single
//! error before the pipeline builds.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::{M3Error, M3Result};

/// Trait implemented by every tool so `Config` can validate its requirements
/// without depending on the `tools` module.
pub trait RequiresEnv {
    /// Name used as the config-key prefix (e.g. `MIMIC`).
    fn config_prefix(&self) -> &'static str;

    /// Env var keys (unprefixed) this tool needs at build time.
    fn required_env_keys(&self) -> Vec<&'static str>;
}

/// Pipeline-wide configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level string (`trace`/`debug`/`info`/`warn`/`error`).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Explicit key/value overrides, checked before the process environment.
    #[serde(default)]
    pub env_vars: HashMap<String, String>,

    /// Project root, used to derive `data_dir`/`databases_dir`/`raw_files_dir`.
    #[serde(skip)]
    project_root: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_owned()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            env_vars: HashMap::new(),
            project_root: None,
        }
    }
}

impl Config {
    /// Build a config with explicit overrides.
    #[must_use]
    pub fn new(log_level: impl Into<String>, env_vars: HashMap<String, String>) -> Self {
        Self {
            log_level: log_level.into(),
            env_vars,
            project_root: None,
        }
    }

    /// Look up a key: explicit override map, then process env, then default.
    ///
    /// # Errors
    ///
    /// Returns `M3Error::Config` if `raise_if_missing` is true and the key is
    /// absent from both the override map and the process environment.
    pub fn get_env_var(
        &self,
        key: &str,
        default: Option<&str>,
        raise_if_missing: bool,
    ) -> M3Result<String> {
        if let Some(value) = self.env_vars.get(key) {
            return Ok(value.clone());
        }
        if let Ok(value) = env::var(key) {
            return Ok(value);
        }
        if raise_if_missing {
            return Err(M3Error::Config(format!(
                "Required environment variable '{key}' is not set"
            )));
        }
        Ok(default.unwrap_or("").to_owned())
    }

    /// Convenience: `get_env_var` returning `None` instead of erroring.
    #[must_use]
    pub fn try_env_var(&self, key: &str) -> Option<String> {
        self.env_vars
            .get(key)
            .cloned()
            .or_else(|| env::var(key).ok())
    }

    /// Merge additional env vars in, optionally under a prefix. Conflicting
    /// keys with different values are rejected to avoid silently shadowing
    /// a value a caller already depends on.
    ///
    /// # Errors
    ///
    /// Returns `M3Error::Config` if a key is already present with a
    /// different value.
    pub fn merge_env(&mut self, new_env: &HashMap<String, String>, prefix: &str) -> M3Result<()> {
        for (key, value) in new_env {
            let full_key = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}_{key}")
            };
            if let Some(existing) = self.env_vars.get(&full_key) {
                if existing != value {
                    return Err(M3Error::Config(format!(
                        "conflicting values for '{full_key}': '{existing}' vs '{value}'"
                    )));
                }
            } else {
                self.env_vars.insert(full_key, value.clone());
            }
        }
        Ok(())
    }

    /// Validate that every tool's required env keys resolve, checking a
    /// tool-prefixed key (`{PREFIX}_{KEY}`) before the unprefixed key.
    /// Every missing key is collected so a caller sees the full picture in
    /// one error rather than one-at-a-time.
    ///
    /// # Errors
    ///
    /// Returns `M3Error::Config` listing every unresolved key across every
    /// tool, or `Ok(())` if all resolve.
    pub fn validate_for_tools(&self, tools: &[&dyn RequiresEnv]) -> M3Result<()> {
        let mut missing = Vec::new();
        for tool in tools {
            let prefix = tool.config_prefix();
            for key in tool.required_env_keys() {
                let prefixed = format!("{prefix}_{key}");
                let resolved = self.try_env_var(&prefixed).or_else(|| self.try_env_var(key));
                if resolved.is_none() {
                    missing.push(prefixed);
                }
            }
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(M3Error::Config(format!(
                "missing required configuration: {}",
                missing.join(", ")
            )))
        }
    }

    /// Project root: 3 ancestors up looking for `Cargo.toml`, falling back
    /// to the user's home directory.
    #[must_use]
    pub fn project_root(&self) -> PathBuf {
        if let Some(root) = &self.project_root {
            return root.clone();
        }
        find_project_root().unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Directory holding downloaded/converted dataset data, overridable via
    /// `M3_DATA_DIR`.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.try_env_var(crate::constants::ENV_DATA_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|| self.project_root().join("m3_data"))
    }

    /// Active dataset definition key, overridable via `M3_DATASET`.
    #[must_use]
    pub fn dataset_key(&self) -> String {
        self.try_env_var(crate::constants::ENV_DATASET)
            .unwrap_or_else(|| crate::constants::DATASET_MIMIC_DEMO.to_owned())
    }

    /// Full path override for the embedded backend's database file, read
    /// from `M3_DB_PATH`. `None` means the caller should derive the default
    /// path from [`Config::databases_dir`].
    #[must_use]
    pub fn db_path(&self) -> Option<PathBuf> {
        self.try_env_var(crate::constants::ENV_DB_PATH).map(PathBuf::from)
    }

    /// GCP project id used for BigQuery billing and dataset lookup.
    ///
    /// # Errors
    ///
    /// Returns `M3Error::Config` if `M3_PROJECT_ID` is not set.
    pub fn project_id(&self) -> M3Result<String> {
        self.get_env_var(crate::constants::ENV_PROJECT_ID, None, true)
    }

    /// Directory holding embedded backend database files.
    #[must_use]
    pub fn databases_dir(&self) -> PathBuf {
        self.try_env_var(crate::constants::ENV_DATABASES_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|| self.data_dir().join("databases"))
    }

    /// Directory holding raw downloaded CSVs for a given dataset key.
    #[must_use]
    pub fn raw_files_dir(&self, dataset_key: &str) -> PathBuf {
        let env_key = format!(
            "{}_{}",
            dataset_key.to_uppercase().replace('-', "_"),
            crate::constants::ENV_RAW_DIR_PREFIX
        );
        self.try_env_var(&env_key)
            .map(PathBuf::from)
            .unwrap_or_else(|| self.data_dir().join("raw").join(dataset_key))
    }
}

fn find_project_root() -> Option<PathBuf> {
    let mut dir = env::current_dir().ok()?;
    for _ in 0..3 {
        if dir.join("Cargo.toml").is_file() {
            return Some(dir);
        }
        dir = dir.parent()?.to_path_buf();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_override_wins_over_env() {
        let mut env_vars = HashMap::new();
        env_vars.insert("M3_TEST_KEY".to_owned(), "explicit".to_owned());
        let config = Config::new("info", env_vars);
        std::env::set_var("M3_TEST_KEY", "from_process_env");
        let value = config.get_env_var("M3_TEST_KEY", None, false).unwrap();
        assert_eq!(value, "explicit");
        std::env::remove_var("M3_TEST_KEY");
    }

    #[test]
    fn missing_required_key_errors() {
        let config = Config::default();
        let result = config.get_env_var("M3_DOES_NOT_EXIST_XYZ", None, true);
        assert!(result.is_err());
    }

    #[test]
    fn missing_key_falls_back_to_default() {
        let config = Config::default();
        let value = config
            .get_env_var("M3_DOES_NOT_EXIST_XYZ", Some("fallback"), false)
            .unwrap();
        assert_eq!(value, "fallback");
    }

    #[test]
    fn merge_env_rejects_conflicting_values() {
        let mut config = Config::default();
        let mut first = HashMap::new();
        first.insert("KEY".to_owned(), "a".to_owned());
        config.merge_env(&first, "").unwrap();

        let mut second = HashMap::new();
        second.insert("KEY".to_owned(), "b".to_owned());
        let result = config.merge_env(&second, "");
        assert!(result.is_err());
    }

    #[test]
    fn data_dir_respects_override() {
        let mut env_vars = HashMap::new();
        env_vars.insert("M3_DATA_DIR".to_owned(), "/tmp/m3-explicit-data".to_owned());
        let config = Config::new("info", env_vars);
        assert_eq!(config.data_dir(), PathBuf::from("/tmp/m3-explicit-data"));
    }

    #[test]
    fn dataset_key_defaults_to_demo() {
        let config = Config::default();
        assert_eq!(config.dataset_key(), "mimic-iv-demo");
    }

    #[test]
    fn db_path_is_none_when_unset() {
        let config = Config::default();
        assert!(config.db_path().is_none());
    }

    #[test]
    fn db_path_respects_override() {
        let mut env_vars = HashMap::new();
        env_vars.insert("M3_DB_PATH".to_owned(), "/tmp/m3-explicit.db".to_owned());
        let config = Config::new("info", env_vars);
        assert_eq!(config.db_path(), Some(PathBuf::from("/tmp/m3-explicit.db")));
    }

    #[test]
    fn project_id_errors_when_unset() {
        let config = Config::default();
        assert!(config.project_id().is_err());
    }

    struct FakeTool;
    impl RequiresEnv for FakeTool {
        fn config_prefix(&self) -> &'static str {
            "MIMIC"
        }
        fn required_env_keys(&self) -> Vec<&'static str> {
            vec!["ICUSTAYS_TABLE"]
        }
    }

    #[test]
    fn validate_for_tools_reports_missing_prefixed_key() {
        let config = Config::default();
        let tool = FakeTool;
        let tools: Vec<&dyn RequiresEnv> = vec![&tool];
        let result = config.validate_for_tools(&tools);
        assert!(result.is_err());
    }

    #[test]
    fn validate_for_tools_accepts_prefixed_key() {
        let mut env_vars = HashMap::new();
        env_vars.insert(
            "MIMIC_ICUSTAYS_TABLE".to_owned(),
            "icu_icustays".to_owned(),
        );
        let config = Config::new("info", env_vars);
        let tool = FakeTool;
        let tools: Vec<&dyn RequiresEnv> = vec![&tool];
        assert!(config.validate_for_tools(&tools).is_ok());
    }
}
