// ABOUTME: Crate-wide constant defaults for config keys, env var names, and limits
// ABOUTME: Centralizing these avoids magic strings scattered across modules
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Default values and well-known environment variable names.

/// Default DuckDB/SQLite-style database file name for the embedded backend.
pub const DEFAULT_DATABASE_FILENAME: &str = "mimic.db";

/// Default MIMIC-IV schema version tag, used to build BigQuery dataset names
/// (`mimiciv_{version}_hosp`, `mimiciv_{version}_icu`).
pub const DEFAULT_MIMIC_VERSION: &str = "3_1";

/// Env var overriding the MIMIC-IV version tag.
pub const ENV_MIMIC_VERSION: &str = "M3_MIMIC_VERSION";

/// Env var naming the BigQuery project/dataset prefix, e.g. `physionet-data`.
pub const ENV_BIGQUERY_PREFIX: &str = "M3_BIGQUERY_PREFIX";

/// Env var pointing at a service-account JSON key file for BigQuery auth.
pub const ENV_BIGQUERY_CREDENTIALS: &str = "M3_BIGQUERY_CREDENTIALS_PATH";

/// Env var pointing at the embedded database directory.
pub const ENV_DATABASES_DIR: &str = "M3_DATABASES_DIR";

/// Env var pointing at the raw downloaded-dataset directory.
pub const ENV_RAW_DIR_PREFIX: &str = "M3_RAW_DIR";

/// Env var selecting the log level (`trace`/`debug`/`info`/`warn`/`error`).
pub const ENV_LOG_LEVEL: &str = "M3_LOG_LEVEL";

/// Env var pointing at a saved pipeline JSON file to load on startup.
pub const ENV_CONFIG_PATH: &str = "M3_CONFIG_PATH";

/// Env var selecting which storage backend the MIMIC tool talks to (`embedded`/`cloud`).
pub const ENV_BACKEND_KIND: &str = "M3_BACKEND";

/// Default storage backend when `M3_BACKEND` is unset.
pub const DEFAULT_BACKEND_KIND: &str = "embedded";

/// Env var overriding the root directory for downloaded/converted dataset data.
pub const ENV_DATA_DIR: &str = "M3_DATA_DIR";

/// Env var selecting which dataset definition key is active (e.g. `mimic-iv-demo`).
pub const ENV_DATASET: &str = "M3_DATASET";

/// Env var overriding the full path to the embedded backend's database file.
pub const ENV_DB_PATH: &str = "M3_DB_PATH";

/// Env var naming the GCP project id used for BigQuery job billing and dataset lookup.
pub const ENV_PROJECT_ID: &str = "M3_PROJECT_ID";

/// Env var enabling OAuth2 bearer-token auth (`true`/`1` to enable).
pub const ENV_OAUTH2_ENABLED: &str = "M3_OAUTH2_ENABLED";

/// Env var naming the expected token issuer.
pub const ENV_OAUTH2_ISSUER: &str = "M3_OAUTH2_ISSUER_URL";

/// Env var naming the expected token audience.
pub const ENV_OAUTH2_AUDIENCE: &str = "M3_OAUTH2_AUDIENCE";

/// Env var naming the space-separated required scopes.
pub const ENV_OAUTH2_SCOPES: &str = "M3_OAUTH2_REQUIRED_SCOPES";

/// Env var naming the JWKS document URL.
pub const ENV_OAUTH2_JWKS_URL: &str = "M3_OAUTH2_JWKS_URL";

/// Env var overriding the JWKS cache TTL in seconds.
pub const ENV_OAUTH2_JWKS_CACHE_TTL: &str = "M3_OAUTH2_JWKS_CACHE_TTL_SECS";

/// Env var overriding the rate-limit request budget per window.
pub const ENV_OAUTH2_RATE_LIMIT_REQUESTS: &str = "M3_OAUTH2_RATE_LIMIT_REQUESTS";

/// Env var overriding the rate-limit window length in seconds.
pub const ENV_OAUTH2_RATE_LIMIT_WINDOW: &str = "M3_OAUTH2_RATE_LIMIT_WINDOW_SECS";

/// Default JWKS cache TTL when not overridden.
pub const DEFAULT_JWKS_CACHE_TTL_SECS: u64 = 3600;

/// Default rate-limit request budget per subject per window.
pub const DEFAULT_RATE_LIMIT_REQUESTS: u32 = 100;

/// Default rate-limit window length in seconds.
pub const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 3600;

/// Hard ceiling on any `limit` argument accepted by MIMIC tool actions.
pub const MAX_QUERY_LIMIT: u64 = 1000;

/// Row count above which `BackendBase::format_result` truncates output.
pub const MAX_DISPLAY_ROWS: usize = 50;

/// Default row limit for `get_icu_stays`.
pub const DEFAULT_ICU_STAYS_LIMIT: u64 = 10;

/// Default row limit for `get_lab_results`.
pub const DEFAULT_LAB_RESULTS_LIMIT: u64 = 20;

/// Default row limit for `get_race_distribution`.
pub const DEFAULT_RACE_DISTRIBUTION_LIMIT: u64 = 10;

/// Built-in dataset identifier for the small, freely-downloadable demo subset.
pub const DATASET_MIMIC_DEMO: &str = "mimic-iv-demo";

/// Built-in dataset identifier for the full, credentialed PhysioNet release.
pub const DATASET_MIMIC_FULL: &str = "mimic-iv-full";
