// ABOUTME: OAuth2 bearer-token authentication: JWKS-backed verification, scopes, rate limiting
// ABOUTME: Wraps a tool action the same way the original's Auth.decorator wrapped a Python callable
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! # Auth
//!
//! When enabled, every MIMIC tool action is gated by [`AuthGuard::authenticate`]:
//! strip the `Bearer ` prefix, verify the JWT against the configured JWKS
//! endpoint (RS256/ES256), check issuer/audience/expiry/required scopes, and
//! enforce a per-subject sliding-window rate limit. Disabled by default —
//! the original ships the same way, leaving auth opt-in per deployment.

pub mod jwks;
pub mod middleware;
pub mod rate_limit;
pub mod test_token;

pub use jwks::{JwksCache, Jwk, JwkSet};
pub use middleware::{AuthConfig, AuthGuard, Claims};
pub use rate_limit::RateLimiter;
pub use test_token::generate_test_token;
