use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::db::{Entity, StoreError};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("No token provided")]
    AuthenticationRequired,

    #[error("Invalid or expired token")]
    AuthenticationFailed,

    #[error("Google auth failed")]
    SocialAuthFailed,

    #[error("{0}")]
    Validation(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("{0} not found")]
    NotFound(Entity),

    #[error("{0}")]
    Conflict(String),

    #[error("Not enough stock")]
    InsufficientStock { requested: i32, available: i32 },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::AuthenticationRequired
            | AppError::AuthenticationFailed
            | AppError::SocialAuthFailed => StatusCode::UNAUTHORIZED,
            AppError::Validation(_)
            | AppError::InvalidCredentials
            | AppError::InsufficientStock { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable name of the error category.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::AuthenticationRequired => "authentication_required",
            AppError::AuthenticationFailed | AppError::SocialAuthFailed => {
                "authentication_failed"
            }
            AppError::Validation(_) => "validation_failed",
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::InsufficientStock { .. } => "insufficient_stock",
            AppError::Internal(_) => "server_error",
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(entity) => AppError::NotFound(entity),
            StoreError::Conflict(message) => AppError::Conflict(message),
            StoreError::InsufficientStock {
                requested,
                available,
            } => AppError::InsufficientStock {
                requested,
                available,
            },
            StoreError::Sqlx(e) => AppError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = match &self {
            AppError::Internal(details) => {
                log::error!("Request failed: {}", details);
                "Server error".to_string()
            }
            AppError::InsufficientStock {
                requested,
                available,
            } => {
                log::warn!(
                    "Rejected withdrawal of {} units, only {} available",
                    requested,
                    available
                );
                self.to_string()
            }
            other => other.to_string(),
        };

        let body = json!({ "error": self.kind(), "message": message });
        (self.status(), Json(body)).into_response()
    }
}
