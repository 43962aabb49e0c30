// ============================
// crates/backend-lib/src/auth/rate_limit.rs
// ============================
//! Throttling of failed sign-in attempts per account key.
//!
//! Keys are emails as presented, so an unknown email is throttled the same
//! way as a known one.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::RateLimitSettings;

/// Entry in the attempt map
#[derive(Debug, Clone)]
struct AttemptEntry {
    failed_attempts: u32,
    last_failure: Instant,
    lockout_expiry: Option<Instant>,
}

/// Rate limiter for sign-in attempts
#[derive(Debug, Clone)]
pub struct AuthRateLimiter {
    attempts: Arc<DashMap<String, AttemptEntry>>,
    max_attempts: u32,
    lockout_duration: Duration,
}

impl Default for AuthRateLimiter {
    fn default() -> Self {
        Self::from_settings(&RateLimitSettings::default())
    }
}

impl AuthRateLimiter {
    pub fn new(max_attempts: u32, lockout_duration: Duration) -> Self {
        Self {
            attempts: Arc::new(DashMap::new()),
            max_attempts,
            lockout_duration,
        }
    }

    pub fn from_settings(settings: &RateLimitSettings) -> Self {
        Self::new(
            settings.max_failed_attempts,
            Duration::from_secs(settings.lockout_secs),
        )
    }

    /// Record a failed sign-in. Returns `true` if this failure locked the key.
    pub fn record_failed_attempt(&self, key: &str) -> bool {
        let now = Instant::now();

        let mut entry = self
            .attempts
            .entry(key.to_string())
            .or_insert_with(|| AttemptEntry {
                failed_attempts: 0,
                last_failure: now,
                lockout_expiry: None,
            });

        if entry.lockout_expiry.is_some_and(|expiry| now >= expiry) {
            entry.failed_attempts = 0;
            entry.lockout_expiry = None;
        }

        entry.failed_attempts += 1;
        entry.last_failure = now;

        if entry.failed_attempts >= self.max_attempts && entry.lockout_expiry.is_none() {
            entry.lockout_expiry = Some(now + self.lockout_duration);
            tracing::warn!(
                attempts = entry.failed_attempts,
                lockout_secs = self.lockout_duration.as_secs(),
                "sign-in locked after repeated failures"
            );
            return true;
        }
        false
    }

    /// Clear the counter after a successful sign-in
    pub fn record_success(&self, key: &str) {
        self.attempts.remove(key);
    }

    /// `false` while the key is locked out
    pub fn check(&self, key: &str) -> bool {
        match self.attempts.get(key) {
            Some(entry) => !entry
                .lockout_expiry
                .is_some_and(|expiry| Instant::now() < expiry),
            None => true,
        }
    }

    /// Drop lapsed lockouts, and counters whose last failure is older than
    /// one lockout period
    pub fn cleanup(&self) {
        let now = Instant::now();
        self.attempts.retain(|_, entry| match entry.lockout_expiry {
            Some(expiry) => now < expiry,
            None => now.duration_since(entry.last_failure) < self.lockout_duration,
        });
    }

    pub fn tracked_keys(&self) -> usize {
        self.attempts.len()
    }
}
