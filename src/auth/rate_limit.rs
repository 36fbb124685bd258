// ABOUTME: Per-subject sliding-window rate limiting for authenticated requests
// ABOUTME: Mirrors the original Auth._check_rate_limit list-based sliding window
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::errors::AuthError;

/// Sliding-window rate limiter keyed by subject (`sub` claim).
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    history: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    /// Build a limiter allowing `limit` requests per `window` per subject.
    #[must_use]
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            history: Mutex::new(HashMap::new()),
        }
    }

    /// Record one request for `subject` and check whether it's within
    /// budget. Old timestamps outside the window are pruned first, so the
    /// check is always against a true sliding window rather than a fixed
    /// bucket.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::RateLimitExceeded` once `subject` has made
    /// `limit` or more requests within the trailing `window`.
    pub fn check(&self, subject: &str) -> Result<(), AuthError> {
        let mut history = self
            .history
            .lock()
            .map_err(|_| AuthError::InvalidToken("rate limiter lock was poisoned".to_owned()))?;
        let now = Instant::now();
        let entry = history.entry(subject.to_owned()).or_default();

        while let Some(oldest) = entry.front() {
            if now.duration_since(*oldest) > self.window {
                entry.pop_front();
            } else {
                break;
            }
        }

        if entry.len() as u32 >= self.limit {
            return Err(AuthError::RateLimitExceeded);
        }
        entry.push_back(now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_requests_within_budget() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        for _ in 0..3 {
            assert!(limiter.check("user-1").is_ok());
        }
    }

    #[test]
    fn rejects_once_budget_exhausted() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        assert!(limiter.check("user-1").is_ok());
        assert!(limiter.check("user-1").is_ok());
        assert!(matches!(
            limiter.check("user-1"),
            Err(AuthError::RateLimitExceeded)
        ));
    }

    #[test]
    fn subjects_are_tracked_independently() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.check("user-1").is_ok());
        assert!(limiter.check("user-2").is_ok());
        assert!(limiter.check("user-1").is_err());
    }
}
