// ============================
// crates/backend-lib/src/storage/mod.rs
// ============================
//! Persistence contracts for credentials and tokens, with in-memory
//! implementations.
//!
//! Every trait here is object safe so the session manager can hold
//! `Arc<dyn ...>` and a relational backend can be dropped in without
//! touching callers. Expiry is always evaluated at read time; the
//! `purge_expired` hooks are housekeeping only.

pub mod refresh_tokens;
pub mod reset_tokens;
pub mod users;

use thiserror::Error;

pub use refresh_tokens::{
    InMemoryRefreshTokenStore, RefreshToken, RefreshTokenState, RefreshTokenStore,
};
pub use reset_tokens::{InMemoryPasswordResetTokenStore, PasswordResetToken, PasswordResetTokenStore};
pub use users::{Credential, InMemoryUserStore, NewCredential, UserStore};

/// Failures of the backing store
#[derive(Error, Debug)]
pub enum StorageError {
    /// A unique constraint rejected the write
    #[error("duplicate value for {0}")]
    Duplicate(String),

    /// The row addressed by an update does not exist
    #[error("record not found: {0}")]
    Missing(String),

    /// The backend could not serve the request
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}
