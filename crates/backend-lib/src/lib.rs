// ============================
// crates/backend-lib/src/lib.rs
// ============================
//! Session and credential lifecycle service for the bookstore backend.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod mailer;
pub mod metrics;
pub mod middleware;
pub mod router;
pub mod storage;

use std::sync::Arc;

use chrono::Duration;

use crate::auth::{AuthRateLimiter, JwtSigner, SessionManager, SessionOptions, SignerConfig};
use crate::config::Settings;
use crate::mailer::{LogMailer, Mailer};
use crate::storage::{
    InMemoryPasswordResetTokenStore, InMemoryRefreshTokenStore, InMemoryUserStore,
};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Session manager
    pub sessions: SessionManager,
    /// Configuration settings
    pub settings: Arc<Settings>,
}

impl AppState {
    /// Build the state with in-memory stores and the logging mailer
    pub fn new(settings: &Settings) -> Self {
        Self::with_mailer(settings, Arc::new(LogMailer))
    }

    /// Same as [`AppState::new`] with a caller-supplied mailer
    pub fn with_mailer(settings: &Settings, mailer: Arc<dyn Mailer>) -> Self {
        let auth = &settings.auth;
        let users = Arc::new(InMemoryUserStore::new());
        let refresh_tokens = Arc::new(InMemoryRefreshTokenStore::new(
            Duration::seconds(auth.refresh_token_ttl_secs),
            auth.refresh_token_bytes,
        ));
        let reset_tokens = Arc::new(InMemoryPasswordResetTokenStore::new(Duration::seconds(
            auth.reset_token_ttl_secs,
        )));
        let signer = Arc::new(JwtSigner::new(SignerConfig::from_settings(auth)));

        let sessions = SessionManager::new(users, refresh_tokens, reset_tokens, signer, mailer)
            .with_rate_limiter(AuthRateLimiter::from_settings(&settings.rate_limit))
            .with_options(SessionOptions::from_settings(auth));

        Self::from_parts(sessions, settings)
    }

    /// Wrap an already assembled session manager. The signing key is not
    /// kept; the signer already holds its own copy.
    pub fn from_parts(sessions: SessionManager, settings: &Settings) -> Self {
        Self {
            sessions,
            settings: Arc::new(settings.without_secrets()),
        }
    }
}
