// ==============
// crates/backend-lib/src/metrics.rs

//! Central place for metric keys
pub const SIGNUP_CREATED: &str = "auth.signup.created";
pub const SIGNIN_SUCCESS: &str = "auth.signin.success";
pub const SIGNIN_FAILED: &str = "auth.signin.failed";
pub const SIGNIN_LOCKED: &str = "auth.signin.locked";
pub const REFRESH_ROTATED: &str = "auth.refresh.rotated";
pub const REFRESH_REJECTED: &str = "auth.refresh.rejected";
pub const REFRESH_REVOKED: &str = "auth.refresh.revoked";
pub const LOGOUT: &str = "auth.logout";
pub const RESET_ISSUED: &str = "auth.reset.issued";
pub const RESET_REDEEMED: &str = "auth.reset.redeemed";
pub const PASSWORD_CHANGED: &str = "auth.password.changed";
pub const TOKENS_PURGED: &str = "auth.tokens.purged";
