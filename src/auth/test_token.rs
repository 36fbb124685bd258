// ABOUTME: Generates a self-signed, ephemeral RS256 token for local testing of the auth guard
// ABOUTME: Mirrors the original Auth.generate_test_token static helper
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::RsaPrivateKey;
use serde::Serialize;

use crate::errors::AuthError;

#[derive(Debug, Serialize)]
struct TestClaims<'a> {
    sub: &'a str,
    iss: &'a str,
    aud: &'a str,
    exp: u64,
    scope: &'a str,
}

/// Generate a short-lived, self-signed RS256 token good for exercising
/// [`super::AuthGuard`] without standing up a real identity provider.
///
/// This is a development convenience only: the key is generated fresh on
/// every call and discarded immediately, so the token cannot be verified
/// against any real JWKS endpoint.
///
/// # Errors
///
/// Returns `AuthError::InvalidToken` if RSA key generation or signing
/// fails.
pub fn generate_test_token(
    subject: &str,
    issuer: &str,
    audience: &str,
    scope: &str,
    ttl_secs: u64,
) -> Result<String, AuthError> {
    let mut rng = rand::thread_rng();
    let private_key = RsaPrivateKey::new(&mut rng, 2048)
        .map_err(|err| AuthError::InvalidToken(format!("failed to generate test key: {err}")))?;
    let pem = private_key
        .to_pkcs1_pem(rsa::pkcs1::LineEnding::LF)
        .map_err(|err| AuthError::InvalidToken(format!("failed to encode test key: {err}")))?;

    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let claims = TestClaims {
        sub: subject,
        iss: issuer,
        aud: audience,
        exp: now + ttl_secs,
        scope,
    };

    let encoding_key = EncodingKey::from_rsa_pem(pem.as_bytes())
        .map_err(|err| AuthError::InvalidToken(format!("failed to load test key: {err}")))?;
    let header = Header::new(Algorithm::RS256);
    encode(&header, &claims, &encoding_key)
        .map_err(|err| AuthError::InvalidToken(format!("failed to sign test token: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_a_well_formed_jwt() {
        let token =
            generate_test_token("test-user", "https://issuer.example", "m3", "mimic:read", 300)
                .unwrap();
        assert_eq!(token.split('.').count(), 3);
    }
}
