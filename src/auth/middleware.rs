// ABOUTME: Ties JWKS verification, claim validation, and rate limiting into one authenticate() call
// ABOUTME: Grounded on the original Auth class and the teacher's AuthManager/validate_token_detailed
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use std::time::Duration;

use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_JWKS_CACHE_TTL_SECS, DEFAULT_RATE_LIMIT_REQUESTS, DEFAULT_RATE_LIMIT_WINDOW_SECS,
    ENV_OAUTH2_AUDIENCE, ENV_OAUTH2_ENABLED, ENV_OAUTH2_ISSUER, ENV_OAUTH2_JWKS_CACHE_TTL,
    ENV_OAUTH2_JWKS_URL, ENV_OAUTH2_RATE_LIMIT_REQUESTS, ENV_OAUTH2_RATE_LIMIT_WINDOW,
    ENV_OAUTH2_SCOPES,
};
use crate::errors::AuthError;

use super::jwks::JwksCache;
use super::rate_limit::RateLimiter;

/// Claims this crate expects on an inbound bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject — used as the rate-limit key.
    pub sub: String,
    /// Issuer.
    pub iss: Option<String>,
    /// Audience.
    pub aud: Option<String>,
    /// Expiry, Unix seconds.
    pub exp: u64,
    /// Space-separated scopes, OAuth2-style (`scope` claim).
    #[serde(default)]
    pub scope: String,
    /// Array-style scopes some issuers use instead of `scope` (`scp` claim).
    #[serde(default)]
    pub scp: Vec<String>,
}

impl Claims {
    /// Union of `scope` (space-separated) and `scp` (array) claims, the
    /// same union the original's `_validate_scopes` builds before checking
    /// the required set is a subset.
    fn granted_scopes(&self) -> std::collections::HashSet<String> {
        let mut scopes: std::collections::HashSet<String> =
            self.scope.split_whitespace().map(str::to_owned).collect();
        scopes.extend(self.scp.iter().cloned());
        scopes
    }
}

/// Static configuration for the auth guard, resolved from env/config once at
/// pipeline build time.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Whether auth is enforced at all.
    pub enabled: bool,
    /// Expected `iss` claim.
    pub issuer: Option<String>,
    /// Expected `aud` claim.
    pub audience: Option<String>,
    /// Scopes a token must carry (all of).
    pub required_scopes: Vec<String>,
    /// JWKS document URL.
    pub jwks_url: Option<String>,
    /// JWKS cache TTL.
    pub jwks_cache_ttl: Duration,
    /// Rate-limit request budget per window.
    pub rate_limit_requests: u32,
    /// Rate-limit window length.
    pub rate_limit_window: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            issuer: None,
            audience: None,
            required_scopes: Vec::new(),
            jwks_url: None,
            jwks_cache_ttl: Duration::from_secs(DEFAULT_JWKS_CACHE_TTL_SECS),
            rate_limit_requests: DEFAULT_RATE_LIMIT_REQUESTS,
            rate_limit_window: Duration::from_secs(DEFAULT_RATE_LIMIT_WINDOW_SECS),
        }
    }
}

impl AuthConfig {
    /// Build from a resolved [`crate::config::Config`].
    #[must_use]
    pub fn from_config(config: &crate::config::Config) -> Self {
        let enabled = config
            .try_env_var(ENV_OAUTH2_ENABLED)
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);
        let required_scopes = config
            .try_env_var(ENV_OAUTH2_SCOPES)
            .map(|v| v.split_whitespace().map(str::to_owned).collect())
            .unwrap_or_default();
        let jwks_cache_ttl = config
            .try_env_var(ENV_OAUTH2_JWKS_CACHE_TTL)
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_JWKS_CACHE_TTL_SECS));
        let rate_limit_requests = config
            .try_env_var(ENV_OAUTH2_RATE_LIMIT_REQUESTS)
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_RATE_LIMIT_REQUESTS);
        let rate_limit_window = config
            .try_env_var(ENV_OAUTH2_RATE_LIMIT_WINDOW)
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_RATE_LIMIT_WINDOW_SECS));

        Self {
            enabled,
            issuer: config.try_env_var(ENV_OAUTH2_ISSUER),
            audience: config.try_env_var(ENV_OAUTH2_AUDIENCE),
            required_scopes,
            jwks_url: config.try_env_var(ENV_OAUTH2_JWKS_URL),
            jwks_cache_ttl,
            rate_limit_requests,
            rate_limit_window,
        }
    }
}

/// Validates bearer tokens and enforces rate limits ahead of a tool action.
pub struct AuthGuard {
    config: AuthConfig,
    jwks: Option<JwksCache>,
    rate_limiter: RateLimiter,
}

impl AuthGuard {
    /// Build a guard from resolved config. When `config.enabled` is false,
    /// [`AuthGuard::authenticate`] always succeeds without inspecting the
    /// token, matching the original's opt-in design.
    #[must_use]
    pub fn new(config: AuthConfig) -> Self {
        let jwks = config
            .jwks_url
            .clone()
            .map(|url| JwksCache::new(url, config.jwks_cache_ttl));
        let rate_limiter = RateLimiter::new(config.rate_limit_requests, config.rate_limit_window);
        Self {
            config,
            jwks,
            rate_limiter,
        }
    }

    /// Whether auth enforcement is turned on.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Authenticate a raw `Authorization` header value (with or without the
    /// `Bearer ` prefix) and return the validated claims.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingToken` if disabled-but-called-anyway with
    /// an empty header, or any of the JWKS/validation/rate-limit errors
    /// documented on [`AuthError`].
    pub fn authenticate(&self, authorization_header: Option<&str>) -> Result<Claims, AuthError> {
        if !self.config.enabled {
            return Ok(Claims {
                sub: "anonymous".to_owned(),
                iss: None,
                aud: None,
                exp: u64::MAX,
                scope: String::new(),
                scp: Vec::new(),
            });
        }

        let token = authorization_header
            .and_then(|header| header.strip_prefix("Bearer ").or(Some(header)))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MissingToken)?;

        let claims = self.validate_token(token)?;
        self.check_scopes(&claims)?;
        self.rate_limiter.check(&claims.sub)?;
        Ok(claims)
    }

    fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let header = decode_header(token).map_err(|err| AuthError::Malformed(err.to_string()))?;
        let kid = header.kid.ok_or_else(|| AuthError::Malformed("token is missing a kid".to_owned()))?;

        let jwks = self
            .jwks
            .as_ref()
            .ok_or_else(|| AuthError::InvalidToken("no JWKS URL configured".to_owned()))?;
        let document = jwks.get()?;
        let jwk = document.find(&kid)?;
        let decoding_key = jwk.to_decoding_key()?;

        let algorithm = match header.alg {
            Algorithm::RS256 | Algorithm::ES256 => header.alg,
            other => {
                return Err(AuthError::InvalidToken(format!(
                    "unsupported algorithm {other:?}, expected RS256 or ES256"
                )))
            }
        };

        let mut validation = Validation::new(algorithm);
        if let Some(audience) = &self.config.audience {
            validation.set_audience(&[audience]);
        } else {
            validation.validate_aud = false;
        }
        if let Some(issuer) = &self.config.issuer {
            validation.set_issuer(&[issuer]);
        }

        let decoded = decode::<Claims>(token, &decoding_key, &validation)
            .map_err(|err| AuthError::InvalidToken(err.to_string()))?;
        Ok(decoded.claims)
    }

    fn check_scopes(&self, claims: &Claims) -> Result<(), AuthError> {
        if self.config.required_scopes.is_empty() {
            return Ok(());
        }
        let granted = claims.granted_scopes();
        let missing: Vec<&str> = self
            .config
            .required_scopes
            .iter()
            .filter(|scope| !granted.contains(scope.as_str()))
            .map(String::as_str)
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AuthError::MissingScopes(missing.join(", ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_guard_always_authenticates() {
        let guard = AuthGuard::new(AuthConfig::default());
        assert!(guard.authenticate(None).is_ok());
    }

    #[test]
    fn enabled_guard_rejects_missing_token() {
        let mut config = AuthConfig::default();
        config.enabled = true;
        let guard = AuthGuard::new(config);
        assert!(matches!(
            guard.authenticate(None),
            Err(AuthError::MissingToken)
        ));
    }

    #[test]
    fn scope_check_accepts_union_of_scope_and_scp() {
        let claims = Claims {
            sub: "user-1".into(),
            iss: None,
            aud: None,
            exp: u64::MAX,
            scope: "mimic:read".into(),
            scp: vec!["admin".into()],
        };
        let granted = claims.granted_scopes();
        assert!(granted.contains("mimic:read"));
        assert!(granted.contains("admin"));
    }
}
