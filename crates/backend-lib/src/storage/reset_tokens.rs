// ============================
// crates/backend-lib/src/storage/reset_tokens.rs
// ============================
//! One-time password-reset tokens. Consumption is deletion.
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::StorageError;
use crate::auth::token_generator::generate_reset_token;

/// Stored reset token
#[derive(Debug, Clone)]
pub struct PasswordResetToken {
    pub id: Uuid,
    pub token: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait PasswordResetTokenStore: Send + Sync {
    async fn create(&self, user_id: Uuid) -> Result<PasswordResetToken, StorageError>;

    /// Expired rows are indistinguishable from missing ones
    async fn find_unexpired(&self, token: &str) -> Result<Option<PasswordResetToken>, StorageError>;

    /// Returns `true` only for the call that removed the row
    async fn delete(&self, entry: &PasswordResetToken) -> Result<bool, StorageError>;

    /// Remove every outstanding token of one user
    async fn delete_for_user(&self, user_id: Uuid) -> Result<usize, StorageError>;

    /// Put back a token consumed by a redemption that could not finish
    async fn restore(&self, entry: PasswordResetToken) -> Result<(), StorageError>;

    async fn purge_expired(&self) -> Result<usize, StorageError>;
}

/// `DashMap`-backed reset token store keyed by token value
#[derive(Debug, Clone)]
pub struct InMemoryPasswordResetTokenStore {
    tokens: Arc<DashMap<String, PasswordResetToken>>,
    ttl: Duration,
}

impl InMemoryPasswordResetTokenStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            tokens: Arc::new(DashMap::new()),
            ttl,
        }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Outstanding tokens of one user, expired ones included
    pub fn count_for_user(&self, user_id: Uuid) -> usize {
        self.tokens.iter().filter(|t| t.user_id == user_id).count()
    }
}

#[async_trait]
impl PasswordResetTokenStore for InMemoryPasswordResetTokenStore {
    async fn create(&self, user_id: Uuid) -> Result<PasswordResetToken, StorageError> {
        let now = Utc::now();
        let entry = PasswordResetToken {
            id: Uuid::new_v4(),
            token: generate_reset_token(),
            user_id,
            expires_at: now + self.ttl,
            created_at: now,
        };
        self.tokens.insert(entry.token.clone(), entry.clone());
        Ok(entry)
    }

    async fn find_unexpired(&self, token: &str) -> Result<Option<PasswordResetToken>, StorageError> {
        let now = Utc::now();
        Ok(self
            .tokens
            .get(token)
            .filter(|t| now < t.expires_at)
            .map(|t| t.value().clone()))
    }

    async fn delete(&self, entry: &PasswordResetToken) -> Result<bool, StorageError> {
        Ok(self
            .tokens
            .remove_if(&entry.token, |_, stored| stored.id == entry.id)
            .is_some())
    }

    async fn delete_for_user(&self, user_id: Uuid) -> Result<usize, StorageError> {
        let before = self.tokens.len();
        self.tokens.retain(|_, t| t.user_id != user_id);
        Ok(before.saturating_sub(self.tokens.len()))
    }

    async fn restore(&self, entry: PasswordResetToken) -> Result<(), StorageError> {
        self.tokens.insert(entry.token.clone(), entry);
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize, StorageError> {
        let now = Utc::now();
        let before = self.tokens.len();
        self.tokens.retain(|_, t| now < t.expires_at);
        Ok(before.saturating_sub(self.tokens.len()))
    }
}
