// crates/backend-lib/src/error.rs

//! Central error type + Axum integration.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::storage::StorageError;

/// Application error types with error codes and context
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing or malformed request fields
    #[error("{0}")]
    InvalidInput(String),

    /// Password does not satisfy the complexity rules
    #[error("{0}")]
    PolicyViolation(String),

    /// Wrong credentials, or an invalid, expired or revoked token
    #[error("{0}")]
    Auth(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Too many failed sign-in attempts, please try again later")]
    RateLimitExceeded,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) | AppError::PolicyViolation(_) => StatusCode::BAD_REQUEST,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            AppError::Storage(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::InvalidInput(_) => "VAL_001",
            AppError::PolicyViolation(_) => "VAL_002",
            AppError::Auth(_) => "AUTH_001",
            AppError::Conflict(_) => "CONF_001",
            AppError::NotFound(_) => "NF_001",
            AppError::RateLimitExceeded => "AUTH_003",
            AppError::Storage(_) => "STORE_001",
            AppError::Internal(_) => "INT_001",
        }
    }

    /// Message safe to hand to a client. Domain outcomes already carry
    /// client-facing text; infrastructure faults never leak their detail.
    pub fn sanitized_message(&self) -> String {
        match self {
            AppError::Storage(_) | AppError::Internal(_) => {
                "An internal server error occurred".to_string()
            },
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code = self.error_code(), "request failed");
        }

        let body = serde_json::json!({
            "error": {
                "code": self.error_code(),
                "message": self.sanitized_message(),
            }
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        AppError::Internal(format!("token signing failed: {err}"))
    }
}
