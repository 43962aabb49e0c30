// ============================
// crates/backend-lib/src/handlers/auth.rs
// ============================
//! `/auth/*` handlers.
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use bookstore_common::{
    ChangePasswordRequest, CurrentUserResponse, MessageResponse, RecoverPasswordRequest,
    RefreshTokenRequest, SignInRequest, SignUpRequest, SignUpResponse, TokenResponse,
    UpdatePasswordRequest,
};

use crate::error::AppError;
use crate::middleware::AuthenticatedUser;
use crate::AppState;

pub const MALFORMED_BODY: &str = "Malformed request body";
pub const RECOVERY_ACK: &str =
    "If the email is registered, a password reset link has been sent";

/// Decoder failures become the same 400 as any other bad input
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload.map(|Json(value)| value).map_err(|rejection| {
        tracing::debug!(reason = %rejection.body_text(), "rejected request body");
        AppError::InvalidInput(MALFORMED_BODY.to_string())
    })
}

/// `POST /auth/signup`
pub async fn sign_up(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SignUpRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SignUpResponse>), AppError> {
    let credential = state.sessions.sign_up(body(payload)?).await?;
    Ok((
        StatusCode::CREATED,
        Json(SignUpResponse {
            message: "User created successfully".to_string(),
            id: credential.id,
        }),
    ))
}

/// `POST /auth/signin`
pub async fn sign_in(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SignInRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, AppError> {
    Ok(Json(state.sessions.sign_in(body(payload)?).await?))
}

/// `POST /auth/refresh`
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RefreshTokenRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, AppError> {
    let req = body(payload)?;
    Ok(Json(state.sessions.refresh(&req.refresh_token).await?))
}

/// `POST /auth/logout`
pub async fn logout(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(claims): AuthenticatedUser,
    payload: Result<Json<RefreshTokenRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let req = body(payload)?;
    state.sessions.logout(claims.sub, &req.refresh_token).await?;
    Ok(Json(MessageResponse::new("Logged out successfully")))
}

/// `POST /auth/recover-password`. Always 200 for a well-formed request.
pub async fn recover_password(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RecoverPasswordRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let req = body(payload)?;
    state.sessions.recover_password(&req.email).await?;
    Ok(Json(MessageResponse::new(RECOVERY_ACK)))
}

/// `PUT /auth/update-password`
pub async fn update_password(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<UpdatePasswordRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    state.sessions.update_password(body(payload)?).await?;
    Ok(Json(MessageResponse::new("Password updated successfully")))
}

/// `PUT /auth/change-password`
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(claims): AuthenticatedUser,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .sessions
        .change_password(claims.sub, body(payload)?)
        .await?;
    Ok(Json(MessageResponse::new("Password changed successfully")))
}

/// `GET /auth/me`
pub async fn me(AuthenticatedUser(claims): AuthenticatedUser) -> Json<CurrentUserResponse> {
    Json(CurrentUserResponse {
        id: claims.sub,
        name: claims.name,
        email: claims.email,
        role: claims.role,
    })
}
