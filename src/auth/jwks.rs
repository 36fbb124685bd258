// ABOUTME: Fetches and caches a remote JWKS document, resolving a kid to a verifying key
// ABOUTME: Mirrors the original Auth._get_jwks/_find_key/_jwk_to_pem TTL-cache behavior
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use jsonwebtoken::DecodingKey;
use serde::{Deserialize, Serialize};

use crate::errors::AuthError;

/// A single JSON Web Key as served by a JWKS endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwk {
    /// Key id, matched against a token's header `kid`.
    pub kid: String,
    /// Key type: `RSA` or `EC`.
    pub kty: String,
    /// RSA modulus, base64url-encoded.
    pub n: Option<String>,
    /// RSA public exponent, base64url-encoded.
    pub e: Option<String>,
    /// EC curve name, e.g. `P-256`.
    pub crv: Option<String>,
    /// EC x coordinate, base64url-encoded.
    pub x: Option<String>,
    /// EC y coordinate, base64url-encoded.
    pub y: Option<String>,
}

impl Jwk {
    /// Build a `jsonwebtoken` verifying key from this JWK's public
    /// material. Only RSA and EC (P-256) keys are supported, matching the
    /// original's `_jwk_to_pem` (RSA-only) extended to EC since
    /// `jsonwebtoken` verifies EC keys directly from raw coordinates.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UnsupportedKeyType` for any other `kty`, or
    /// `AuthError::InvalidToken` if the key material is malformed.
    pub fn to_decoding_key(&self) -> Result<DecodingKey, AuthError> {
        match self.kty.as_str() {
            "RSA" => {
                let n = self.n.as_deref().ok_or_else(|| missing_field("n"))?;
                let e = self.e.as_deref().ok_or_else(|| missing_field("e"))?;
                DecodingKey::from_rsa_components(n, e)
                    .map_err(|err| AuthError::InvalidToken(format!("invalid RSA JWK: {err}")))
            }
            "EC" => {
                let x = self.x.as_deref().ok_or_else(|| missing_field("x"))?;
                let y = self.y.as_deref().ok_or_else(|| missing_field("y"))?;
                DecodingKey::from_ec_components(x, y)
                    .map_err(|err| AuthError::InvalidToken(format!("invalid EC JWK: {err}")))
            }
            other => Err(AuthError::UnsupportedKeyType(other.to_owned())),
        }
    }
}

fn missing_field(name: &str) -> AuthError {
    AuthError::InvalidToken(format!("JWK is missing required field '{name}'"))
}

/// A JWKS document: a set of keys, one of which should match a token's `kid`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwkSet {
    /// Keys present in the document.
    pub keys: Vec<Jwk>,
}

impl JwkSet {
    /// Find the key matching `kid`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UnknownKid` if no key matches.
    pub fn find(&self, kid: &str) -> Result<&Jwk, AuthError> {
        self.keys
            .iter()
            .find(|key| key.kid == kid)
            .ok_or_else(|| AuthError::UnknownKid(kid.to_owned()))
    }
}

struct CacheEntry {
    document: JwkSet,
    fetched_at: Instant,
}

/// TTL-bounded cache over a remote JWKS document.
pub struct JwksCache {
    url: String,
    ttl: Duration,
    http: reqwest::blocking::Client,
    entry: Mutex<Option<CacheEntry>>,
}

impl JwksCache {
    /// Build a cache fetching from `url`, refreshing every `ttl`.
    #[must_use]
    pub fn new(url: impl Into<String>, ttl: Duration) -> Self {
        Self {
            url: url.into(),
            ttl,
            http: reqwest::blocking::Client::new(),
            entry: Mutex::new(None),
        }
    }

    /// Fetch the document if the cache is empty or stale, otherwise return
    /// the cached copy.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::JwksFetch` on network failure, non-success
    /// status, or malformed JSON.
    pub fn get(&self) -> Result<JwkSet, AuthError> {
        {
            let guard = self.entry.lock().map_err(|_| poisoned())?;
            if let Some(entry) = guard.as_ref() {
                if entry.fetched_at.elapsed() < self.ttl {
                    return Ok(entry.document.clone());
                }
            }
        }

        let response = self
            .http
            .get(&self.url)
            .send()
            .map_err(|err| AuthError::JwksFetch(err.to_string()))?;
        if !response.status().is_success() {
            return Err(AuthError::JwksFetch(format!(
                "JWKS endpoint returned status {}",
                response.status()
            )));
        }
        let document: JwkSet = response
            .json()
            .map_err(|err| AuthError::JwksFetch(err.to_string()))?;

        *self.entry.lock().map_err(|_| poisoned())? = Some(CacheEntry {
            document: document.clone(),
            fetched_at: Instant::now(),
        });
        Ok(document)
    }
}

fn poisoned() -> AuthError {
    AuthError::JwksFetch("JWKS cache lock was poisoned".to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jwk_set_find_returns_matching_key() {
        let set = JwkSet {
            keys: vec![Jwk {
                kid: "key-1".into(),
                kty: "RSA".into(),
                n: Some("n".into()),
                e: Some("e".into()),
                crv: None,
                x: None,
                y: None,
            }],
        };
        assert!(set.find("key-1").is_ok());
        assert!(matches!(set.find("missing"), Err(AuthError::UnknownKid(_))));
    }

    #[test]
    fn unsupported_kty_is_rejected() {
        let jwk = Jwk {
            kid: "k".into(),
            kty: "oct".into(),
            n: None,
            e: None,
            crv: None,
            x: None,
            y: None,
        };
        assert!(matches!(
            jwk.to_decoding_key(),
            Err(AuthError::UnsupportedKeyType(_))
        ));
    }
}
