// crates/backend-lib/src/middleware/mod.rs

//! Request extractors shared by the handlers.

pub mod auth;

pub use auth::AuthenticatedUser;
