// ============================
// crates/backend-lib/src/auth/password.rs
// ============================
//! Password hashing, verification and the complexity policy.
//!
//! New digests are Argon2id PHC strings. Verification accepts any PHC
//! digest from Argon2 or scrypt, so digests written under older
//! parameters (or by the previous scrypt hasher) keep working and can be
//! upgraded with [`needs_rehash`].
use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
    },
    Algorithm, Argon2, Params,
};
use scrypt::Scrypt;
use zeroize::Zeroizing;

use crate::error::AppError;

/// Minimum password length
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// The one message every policy failure reports
pub const PASSWORD_POLICY_MESSAGE: &str = "Password must be at least 8 characters long and contain at least one uppercase letter, one lowercase letter, one number and one special character";

/// Password complexity requirements
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_digit: bool,
    pub require_special: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: MIN_PASSWORD_LENGTH,
            require_uppercase: true,
            require_lowercase: true,
            require_digit: true,
            require_special: true,
        }
    }
}

impl PasswordPolicy {
    /// True when the password meets every enabled rule
    pub fn is_satisfied_by(&self, password: &str) -> bool {
        if password.chars().count() < self.min_length {
            return false;
        }

        if self.require_uppercase && !password.chars().any(char::is_uppercase) {
            return false;
        }

        if self.require_lowercase && !password.chars().any(char::is_lowercase) {
            return false;
        }

        if self.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            return false;
        }

        if self.require_special
            && !password.chars().any(|c| !c.is_alphanumeric() && !c.is_whitespace())
        {
            return false;
        }

        true
    }

    /// Same check as [`Self::is_satisfied_by`], as a domain outcome
    pub fn validate(&self, password: &str) -> Result<(), AppError> {
        if self.is_satisfied_by(password) {
            Ok(())
        } else {
            Err(AppError::PolicyViolation(PASSWORD_POLICY_MESSAGE.to_string()))
        }
    }
}

/// Hash a password with Argon2id and a fresh random salt
pub fn hash_password(plain: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))?
        .to_string();
    Ok(hash)
}

/// Verify a password against a PHC digest. A digest that cannot be parsed
/// is a non-match.
pub fn verify_password(hash: &str, plain: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    let argon2 = Argon2::default();
    let verifiers: [&dyn PasswordVerifier; 2] = [&argon2, &Scrypt];
    parsed_hash.verify_password(&verifiers, plain.as_bytes()).is_ok()
}

/// True when the digest was not produced by the current algorithm and
/// parameters
pub fn needs_rehash(hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return true;
    };
    if parsed.algorithm != Algorithm::Argon2id.ident() {
        return true;
    }
    match Params::try_from(&parsed) {
        Ok(params) => {
            let current = Params::default();
            params.m_cost() != current.m_cost()
                || params.t_cost() != current.t_cost()
                || params.p_cost() != current.p_cost()
        },
        Err(_) => true,
    }
}

/// Hash on the blocking pool; the plaintext is wiped when the task ends
pub async fn hash_password_blocking(plain: Zeroizing<String>) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || hash_password(&plain))
        .await
        .map_err(|e| AppError::Internal(format!("hashing task failed: {e}")))?
}

/// Verify on the blocking pool
pub async fn verify_password_blocking(hash: String, plain: Zeroizing<String>) -> bool {
    tokio::task::spawn_blocking(move || verify_password(&hash, &plain))
        .await
        .unwrap_or(false)
}
