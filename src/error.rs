use axum::{http::StatusCode, response::IntoResponse, Json};
use thiserror::Error;

use crate::models::response::{
    ApiResponse, CODE_DUPLICATE_RESOURCE, CODE_FORBIDDEN, CODE_INTERNAL_ERROR,
    CODE_INVALID_CREDENTIALS, CODE_INVALID_PARAMS, CODE_NOT_FOUND, CODE_QUOTA_EXCEEDED,
    CODE_RATE_LIMIT_EXCEEDED, CODE_SERVICE_DISABLED, CODE_TOKEN_EXPIRED, CODE_TOKEN_INVALID,
    CODE_UNAUTHORIZED,
};
use crate::store::StoreError;

pub type AppResult<T> = Result<T, AppError>;

/// Request-level error: every variant maps onto an envelope code and
/// an HTTP status, so handlers can `?` their way out and the client
/// always receives the uniform `{code, message, data}` shape.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    InvalidParams(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Duplicate(String),

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("token expired")]
    TokenExpired,

    #[error("invalid token")]
    TokenInvalid,

    #[error("rate limit exceeded, retry later")]
    RateLimitExceeded,

    #[error("daily quota exhausted")]
    QuotaExceeded,

    #[error("service is disabled")]
    ServiceDisabled,

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn invalid_params(msg: impl Into<String>) -> Self {
        AppError::InvalidParams(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        AppError::Unauthorized(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidParams(_) | AppError::Duplicate(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_)
            | AppError::InvalidCredentials
            | AppError::TokenExpired
            | AppError::TokenInvalid => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) | AppError::QuotaExceeded | AppError::ServiceDisabled => {
                StatusCode::FORBIDDEN
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            AppError::Store(StoreError::NotFound) => StatusCode::NOT_FOUND,
            AppError::Store(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn envelope_code(&self) -> i64 {
        match self {
            AppError::InvalidParams(_) => CODE_INVALID_PARAMS,
            AppError::Unauthorized(_) => CODE_UNAUTHORIZED,
            AppError::Forbidden(_) => CODE_FORBIDDEN,
            AppError::NotFound(_) => CODE_NOT_FOUND,
            AppError::Duplicate(_) => CODE_DUPLICATE_RESOURCE,
            AppError::InvalidCredentials => CODE_INVALID_CREDENTIALS,
            AppError::TokenExpired => CODE_TOKEN_EXPIRED,
            AppError::TokenInvalid => CODE_TOKEN_INVALID,
            AppError::RateLimitExceeded => CODE_RATE_LIMIT_EXCEEDED,
            AppError::QuotaExceeded => CODE_QUOTA_EXCEEDED,
            AppError::ServiceDisabled => CODE_SERVICE_DISABLED,
            AppError::Store(StoreError::NotFound) => CODE_NOT_FOUND,
            AppError::Store(StoreError::DuplicateKey(_)) => CODE_DUPLICATE_RESOURCE,
            AppError::Store(_) | AppError::Internal(_) => CODE_INTERNAL_ERROR,
        }
    }

    /// Message safe to hand to the client. Server-side failures keep
    /// their detail in the log only.
    fn user_message(&self) -> String {
        match self {
            AppError::Store(StoreError::NotFound) => "resource not found".to_string(),
            AppError::Store(StoreError::DuplicateKey(_)) => "resource already exists".to_string(),
            AppError::Store(_) | AppError::Internal(_) => "internal error".to_string(),
            other => other.to_string(),
        }
    }

    fn log(&self) {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "request failed");
        } else if status == StatusCode::UNAUTHORIZED {
            tracing::warn!(error = %self, "authentication failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "client error");
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        self.log();
        let body = ApiResponse::error(self.envelope_code(), self.user_message());
        (self.status_code(), Json(body)).into_response()
    }
}
