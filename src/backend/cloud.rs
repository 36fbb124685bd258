// ABOUTME: Cloud backend running queries against Google BigQuery via its REST API
// ABOUTME: No official BigQuery Rust SDK exists in the retrieved example pack; this talks REST directly
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! BigQuery-backed [`Backend`] implementation.
//!
//! There is no Google Cloud Rust SDK anywhere in the retrieved example pack,
//! so this follows the teacher's own habit (`src/oauth2_client.rs`) of
//! talking to an external HTTP API directly through `reqwest` rather than
//! reaching for a vendor SDK. Authentication uses a service-account JSON key:
//! a short-lived, self-signed JWT is exchanged for an OAuth2 access token at
//! Google's token endpoint, then cached until shortly before it expires.

use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{M3Error, M3Result};

use super::{Backend, BackendKind, QueryResult};

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const BIGQUERY_SCOPE: &str = "https://www.googleapis.com/auth/bigquery.readonly";
const TOKEN_REFRESH_SKEW_SECS: u64 = 60;

/// Minimal shape of a GCP service-account JSON key file.
#[derive(Debug, Clone, Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    token_uri: Option<String>,
}

#[derive(Debug, Serialize)]
struct TokenClaims {
    iss: String,
    scope: String,
    aud: String,
    exp: u64,
    iat: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    access_token: String,
    expires_at: SystemTime,
}

/// BigQuery REST backend.
pub struct CloudBackend {
    project_id: String,
    credentials_path: String,
    http: Client,
    token: Mutex<Option<CachedToken>>,
}

impl CloudBackend {
    /// Build a backend that bills/queries under `project_id`, authenticating
    /// with the service-account key at `credentials_path`.
    #[must_use]
    pub fn new(project_id: impl Into<String>, credentials_path: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            credentials_path: credentials_path.into(),
            http: Client::new(),
            token: Mutex::new(None),
        }
    }

    fn load_service_account(&self) -> M3Result<ServiceAccountKey> {
        let raw = std::fs::read_to_string(&self.credentials_path).map_err(|e| {
            M3Error::Initialization(format!(
                "failed to read BigQuery credentials at {}: {e}",
                self.credentials_path
            ))
        })?;
        serde_json::from_str(&raw)
            .map_err(|e| M3Error::Initialization(format!("invalid service account JSON: {e}")))
    }

    fn fetch_access_token(&self) -> M3Result<CachedToken> {
        let key = self.load_service_account()?;
        let token_uri = key.token_uri.clone().unwrap_or_else(|| TOKEN_URL.to_owned());
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let claims = TokenClaims {
            iss: key.client_email.clone(),
            scope: BIGQUERY_SCOPE.to_owned(),
            aud: token_uri.clone(),
            exp: now + 3600,
            iat: now,
        };
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| M3Error::Initialization(format!("invalid service account key: {e}")))?;
        let header = Header::new(Algorithm::RS256);
        let assertion = jsonwebtoken::encode(&header, &claims, &encoding_key)
            .map_err(|e| M3Error::Initialization(format!("failed to sign token request: {e}")))?;

        let response = self
            .http
            .post(&token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .map_err(|e| M3Error::Initialization(format!("token exchange request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(M3Error::Initialization(format!(
                "token exchange failed with status {}",
                response.status()
            )));
        }

        let parsed: TokenResponse = response
            .json()
            .map_err(|e| M3Error::Initialization(format!("invalid token response: {e}")))?;

        Ok(CachedToken {
            access_token: parsed.access_token,
            expires_at: SystemTime::now() + Duration::from_secs(parsed.expires_in),
        })
    }

    fn access_token(&self) -> M3Result<String> {
        {
            let guard = self.token.lock().map_err(|_| token_poisoned())?;
            if let Some(cached) = guard.as_ref() {
                let near_expiry = match cached
                    .expires_at
                    .checked_sub(Duration::from_secs(TOKEN_REFRESH_SKEW_SECS))
                {
                    Some(deadline) => SystemTime::now() >= deadline,
                    None => true,
                };
                if !near_expiry {
                    return Ok(cached.access_token.clone());
                }
            }
        }
        let fresh = self.fetch_access_token()?;
        let token = fresh.access_token.clone();
        *self.token.lock().map_err(|_| token_poisoned())? = Some(fresh);
        Ok(token)
    }
}

impl Backend for CloudBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Cloud
    }

    fn initialize(&mut self) -> M3Result<()> {
        // Validate the key file parses and a token can be minted before the
        // pipeline reports itself built.
        self.access_token().map(|_| ())
    }

    fn execute(&self, sql: &str) -> M3Result<QueryResult> {
        let token = self.access_token()?;
        let url = format!(
            "https://bigquery.googleapis.com/bigquery/v2/projects/{}/queries",
            self.project_id
        );
        let body = serde_json::json!({
            "query": sql,
            "useLegacySql": false,
            "timeoutMs": 30_000,
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .map_err(|e| M3Error::BackendExecution(format!("BigQuery request failed: {e}")))?;

        let status = response.status();
        let payload: Value = response
            .json()
            .map_err(|e| M3Error::BackendExecution(format!("invalid BigQuery response: {e}")))?;

        if !status.is_success() {
            let message = payload
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("unknown BigQuery error");
            return Err(M3Error::BackendExecution(message.to_owned()));
        }

        parse_bigquery_response(&payload)
    }

    fn describe(&self) -> String {
        format!("Backend: cloud (BigQuery project {})", self.project_id)
    }
}

fn parse_bigquery_response(payload: &Value) -> M3Result<QueryResult> {
    let schema_fields = payload
        .pointer("/schema/fields")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let columns: Vec<String> = schema_fields
        .iter()
        .filter_map(|field| field.get("name").and_then(Value::as_str))
        .map(str::to_owned)
        .collect();

    let raw_rows = payload
        .get("rows")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut rows = Vec::with_capacity(raw_rows.len());
    for raw_row in raw_rows {
        let values = raw_row
            .get("f")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let mut out_row = Vec::with_capacity(values.len());
        for cell in values {
            out_row.push(cell.get("v").cloned().unwrap_or(Value::Null));
        }
        rows.push(out_row);
    }

    Ok(QueryResult { columns, rows })
}

fn token_poisoned() -> M3Error {
    M3Error::Initialization("BigQuery token cache lock was poisoned".to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bigquery_response_shape() {
        let payload = serde_json::json!({
            "schema": {"fields": [{"name": "subject_id"}, {"name": "race"}]},
            "rows": [
                {"f": [{"v": "10001"}, {"v": "WHITE"}]},
                {"f": [{"v": "10002"}, {"v": null}]},
            ]
        });
        let result = parse_bigquery_response(&payload).unwrap();
        assert_eq!(result.columns, vec!["subject_id", "race"]);
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[1][1], Value::Null);
    }

    #[test]
    fn parses_empty_result_set() {
        let payload = serde_json::json!({"schema": {"fields": []}, "rows": []});
        let result = parse_bigquery_response(&payload).unwrap();
        assert!(result.rows.is_empty());
    }
}
