// ============================
// crates/backend-lib/src/storage/users.rs
// ============================
//! Credential records owned by user management.
//!
//! Only the fields the session subsystem reads or writes live here.
//! Emails are matched exactly (case-sensitive).
use async_trait::async_trait;
use bookstore_common::Role;
use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use std::sync::Arc;
use uuid::Uuid;

use super::StorageError;

/// Stored credential
#[derive(Debug, Clone)]
pub struct Credential {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for [`UserStore::create`]; the password is already hashed
#[derive(Debug, Clone)]
pub struct NewCredential {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<Credential>, StorageError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Credential>, StorageError>;

    /// Fails with [`StorageError::Duplicate`] when the email is taken
    async fn create(&self, new: NewCredential) -> Result<Credential, StorageError>;

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> Result<(), StorageError>;
}

/// `DashMap`-backed user store with a unique email index
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserStore {
    users: Arc<DashMap<Uuid, Credential>>,
    emails: Arc<DashMap<String, Uuid>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Credential>, StorageError> {
        let Some(id) = self.emails.get(email).map(|e| *e.value()) else {
            return Ok(None);
        };
        Ok(self.users.get(&id).map(|u| u.value().clone()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Credential>, StorageError> {
        Ok(self.users.get(&id).map(|u| u.value().clone()))
    }

    async fn create(&self, new: NewCredential) -> Result<Credential, StorageError> {
        // The email entry stays locked until the user row is written, so two
        // concurrent sign-ups with one email cannot both succeed.
        match self.emails.entry(new.email.clone()) {
            Entry::Occupied(_) => Err(StorageError::Duplicate("email".to_string())),
            Entry::Vacant(slot) => {
                let now = Utc::now();
                let credential = Credential {
                    id: Uuid::new_v4(),
                    name: new.name,
                    email: new.email,
                    password_hash: new.password_hash,
                    role: new.role,
                    created_at: now,
                    updated_at: now,
                };
                self.users.insert(credential.id, credential.clone());
                slot.insert(credential.id);
                Ok(credential)
            },
        }
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> Result<(), StorageError> {
        let mut user = self
            .users
            .get_mut(&id)
            .ok_or_else(|| StorageError::Missing(format!("user {id}")))?;
        user.password_hash = password_hash.to_string();
        user.updated_at = Utc::now();
        Ok(())
    }
}
