// ============================
// crates/backend-lib/src/auth/mod.rs
// ============================
//! Authentication module.

pub mod jwt;
pub mod password;
pub mod rate_limit;
pub mod session;
pub mod token_generator;

pub use jwt::{AccessClaims, IssuedAccessToken, JwtSigner, SignerConfig, TokenSigner};
pub use password::{
    hash_password, needs_rehash, verify_password, PasswordPolicy, MIN_PASSWORD_LENGTH,
    PASSWORD_POLICY_MESSAGE,
};
pub use rate_limit::AuthRateLimiter;
pub use session::{SessionManager, SessionOptions};
