// ============================
// crates/backend-lib/src/middleware/auth.rs
// ============================
//! Bearer token extraction.
use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::auth::AccessClaims;
use crate::error::AppError;
use crate::AppState;

pub const MISSING_BEARER: &str = "Missing bearer token";

/// Claims of a caller whose `Authorization: Bearer` token verified
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub AccessClaims);

impl FromRequestParts<Arc<AppState>> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AppError::Auth(MISSING_BEARER.to_string()))?;

        state.sessions.verify_access_token(token).map(AuthenticatedUser)
    }
}
