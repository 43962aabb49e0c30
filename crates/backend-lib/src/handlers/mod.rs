// crates/backend-lib/src/handlers/mod.rs

//! HTTP handlers. Each one unpacks the request, calls the
//! [`SessionManager`](crate::auth::SessionManager) and maps the outcome to
//! a status code.

pub mod auth;
