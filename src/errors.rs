// ABOUTME: Centralized error types for the M3 pipeline, tools, and transport
// ABOUTME: Every variant maps to one of the error kinds in spec section 7
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! # Unified Error Handling
//!
//! `M3Error` is the single error type threaded through config, backends, the
//! SQL validator, auth, data ingestion, and the pipeline builder. Tool
//! actions never let an `M3Error` escape to the transport: they catch it and
//! render remediation text instead (see [`crate::tools::mimic`]).

use thiserror::Error;

/// Crate-wide result alias.
pub type M3Result<T> = Result<T, M3Error>;

/// All error kinds produced by the M3 pipeline.
#[derive(Debug, Error)]
pub enum M3Error {
    /// Missing/invalid env var, bad log level, or a config merge conflict.
    #[error("configuration error: {0}")]
    Config(String),

    /// Bad pipeline JSON, unknown tool type, bad SQL, unknown preset/backend.
    #[error("validation error: {0}")]
    Validation(String),

    /// Backend open failure, missing database file, cloud client init failure.
    #[error("initialization error: {0}")]
    Initialization(String),

    /// Missing token, malformed JWT, signature failure, wrong aud/iss,
    /// expired token, missing scopes, or rate limit exceeded.
    #[error("authentication error: {0}")]
    Authentication(#[from] AuthError),

    /// Validation or initialization failure bubbled up during `Pipeline::build`.
    #[error("build failed: {0}")]
    Build(String),

    /// Unknown preset, or preset creation failure.
    #[error("preset error: {0}")]
    Preset(String),

    /// Backend execution failed; the backend's message is preserved verbatim
    /// so the tool layer can classify it (missing table, bad column, ...).
    #[error("backend execution failed: {0}")]
    BackendExecution(String),

    /// I/O failure during dataset download or conversion.
    #[error("data-io error: {0}")]
    DataIo(String),
}

impl M3Error {
    /// Wrap an arbitrary display-able cause as a `Build` error, preserving
    /// the cause chain in the message the way spec section 7 requires.
    #[must_use]
    pub fn build_failed(context: &str, cause: impl std::fmt::Display) -> Self {
        Self::Build(format!("{context}: {cause}"))
    }
}

/// Authentication-specific failures (spec section 4.4).
#[derive(Debug, Error, Clone)]
pub enum AuthError {
    /// No bearer token present (missing env/config key, or empty after `Bearer ` strip).
    #[error("Missing OAuth2 access token")]
    MissingToken,

    /// Token is not valid JWT (can't even parse the header).
    #[error("Malformed JWT: {0}")]
    Malformed(String),

    /// JWKS document fetch failed (network error, non-200, bad JSON).
    #[error("Failed to fetch JWKS: {0}")]
    JwksFetch(String),

    /// No key in the JWKS document matches the token's `kid`.
    #[error("No signing key found for kid: {0}")]
    UnknownKid(String),

    /// Key type unsupported for conversion to a verifying key (only RSA/EC).
    #[error("Unsupported JWK key type: {0}")]
    UnsupportedKeyType(String),

    /// Signature verification, audience, issuer, or expiry check failed.
    #[error("Token validation failed: {0}")]
    InvalidToken(String),

    /// Token lacks one or more of the required scopes.
    #[error("Missing required scopes: {0}")]
    MissingScopes(String),

    /// Too many requests from this subject within the configured window.
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// A suspension point (JWKS fetch) exceeded its caller-supplied deadline.
    #[error("Authentication timed out")]
    Timeout,
}

impl From<anyhow::Error> for M3Error {
    fn from(error: anyhow::Error) -> Self {
        Self::Initialization(error.to_string())
    }
}

impl From<std::io::Error> for M3Error {
    fn from(error: std::io::Error) -> Self {
        Self::DataIo(error.to_string())
    }
}

impl From<serde_json::Error> for M3Error {
    fn from(error: serde_json::Error) -> Self {
        Self::Validation(format!("JSON error: {error}"))
    }
}

impl From<reqwest::Error> for M3Error {
    fn from(error: reqwest::Error) -> Self {
        Self::DataIo(format!("HTTP error: {error}"))
    }
}

#[cfg(feature = "embedded")]
impl From<duckdb::Error> for M3Error {
    fn from(error: duckdb::Error) -> Self {
        Self::BackendExecution(error.to_string())
    }
}
