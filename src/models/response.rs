use serde::{Deserialize, Serialize};

/// Uniform response envelope returned by every endpoint.
///
/// `code` is 0 on success; clients should branch on the envelope code
/// rather than the HTTP status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T = serde_json::Value> {
    pub code: i64,
    pub message: String,
    pub data: Option<T>,
}

pub const CODE_SUCCESS: i64 = 0;
pub const CODE_INVALID_PARAMS: i64 = 1001;
pub const CODE_UNAUTHORIZED: i64 = 1002;
pub const CODE_FORBIDDEN: i64 = 1003;
pub const CODE_NOT_FOUND: i64 = 1004;
pub const CODE_INTERNAL_ERROR: i64 = 1005;
pub const CODE_DUPLICATE_RESOURCE: i64 = 1006;
pub const CODE_INVALID_CREDENTIALS: i64 = 1007;
pub const CODE_TOKEN_EXPIRED: i64 = 1008;
pub const CODE_TOKEN_INVALID: i64 = 1009;
pub const CODE_RATE_LIMIT_EXCEEDED: i64 = 1010;
pub const CODE_QUOTA_EXCEEDED: i64 = 1011;
pub const CODE_SERVICE_DISABLED: i64 = 1012;

pub const MSG_SUCCESS: &str = "ok";

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            code: CODE_SUCCESS,
            message: MSG_SUCCESS.to_string(),
            data: Some(data),
        }
    }
}

impl ApiResponse<serde_json::Value> {
    pub fn error(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn error_with_data(
        code: i64,
        message: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }
}
