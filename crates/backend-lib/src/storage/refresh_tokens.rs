// ============================
// crates/backend-lib/src/storage/refresh_tokens.rs
// ============================
//! Opaque refresh tokens.
//!
//! The `revoked` flag only ever moves false -> true. Expiry is never
//! written back; a token past `expires_at` is rejected by comparison
//! whatever its flag says.
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use std::sync::Arc;
use uuid::Uuid;

use super::StorageError;
use crate::auth::token_generator::{generate_refresh_token, REFRESH_TOKEN_BYTES};

/// Stored refresh token
#[derive(Debug, Clone)]
pub struct RefreshToken {
    pub id: Uuid,
    pub token: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
}

/// Outcome of checking a token that was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTokenState {
    Active,
    Revoked,
    Expired,
}

impl RefreshToken {
    /// Revoked wins over expired
    pub fn state_at(&self, now: DateTime<Utc>) -> RefreshTokenState {
        if self.revoked {
            RefreshTokenState::Revoked
        } else if now >= self.expires_at {
            RefreshTokenState::Expired
        } else {
            RefreshTokenState::Active
        }
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.state_at(now) == RefreshTokenState::Active
    }
}

#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Mint and persist a new unrevoked token for the user
    async fn create(&self, user_id: Uuid) -> Result<RefreshToken, StorageError>;

    async fn find_by_value(&self, token: &str) -> Result<Option<RefreshToken>, StorageError>;

    /// Conditionally flip `revoked` to true. Returns `true` only for the
    /// call that performed the transition; revoking an already revoked
    /// token is a no-op returning `false`.
    async fn revoke(&self, entry: &RefreshToken) -> Result<bool, StorageError>;

    /// Unrevoked and unexpired tokens of one user
    async fn list_active_for_user(&self, user_id: Uuid) -> Result<Vec<RefreshToken>, StorageError>;

    /// Drop rows past their expiry. Returns how many were removed.
    async fn purge_expired(&self) -> Result<usize, StorageError>;
}

/// `DashMap`-backed refresh token store keyed by token value
#[derive(Debug, Clone)]
pub struct InMemoryRefreshTokenStore {
    tokens: Arc<DashMap<String, RefreshToken>>,
    ttl: Duration,
    token_bytes: usize,
}

impl InMemoryRefreshTokenStore {
    pub fn new(ttl: Duration, token_bytes: usize) -> Self {
        Self {
            tokens: Arc::new(DashMap::new()),
            ttl,
            token_bytes,
        }
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self::new(ttl, REFRESH_TOKEN_BYTES)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl RefreshTokenStore for InMemoryRefreshTokenStore {
    async fn create(&self, user_id: Uuid) -> Result<RefreshToken, StorageError> {
        // Unique index on the value: regenerate on the (astronomically
        // unlikely) collision instead of overwriting.
        loop {
            let value = generate_refresh_token(self.token_bytes);
            if let Entry::Vacant(slot) = self.tokens.entry(value.clone()) {
                let now = Utc::now();
                let entry = RefreshToken {
                    id: Uuid::new_v4(),
                    token: value,
                    user_id,
                    expires_at: now + self.ttl,
                    revoked: false,
                    created_at: now,
                };
                slot.insert(entry.clone());
                return Ok(entry);
            }
        }
    }

    async fn find_by_value(&self, token: &str) -> Result<Option<RefreshToken>, StorageError> {
        Ok(self.tokens.get(token).map(|t| t.value().clone()))
    }

    async fn revoke(&self, entry: &RefreshToken) -> Result<bool, StorageError> {
        match self.tokens.get_mut(&entry.token) {
            Some(mut stored) if stored.id == entry.id && !stored.revoked => {
                stored.revoked = true;
                Ok(true)
            },
            _ => Ok(false),
        }
    }

    async fn list_active_for_user(&self, user_id: Uuid) -> Result<Vec<RefreshToken>, StorageError> {
        let now = Utc::now();
        Ok(self
            .tokens
            .iter()
            .filter(|t| t.user_id == user_id && t.is_active_at(now))
            .map(|t| t.value().clone())
            .collect())
    }

    async fn purge_expired(&self) -> Result<usize, StorageError> {
        let now = Utc::now();
        let before = self.tokens.len();
        self.tokens.retain(|_, t| now < t.expires_at);
        Ok(before.saturating_sub(self.tokens.len()))
    }
}
