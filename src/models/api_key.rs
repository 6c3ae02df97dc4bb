use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const API_KEY_STATUS_DISABLED: i64 = 0;
pub const API_KEY_STATUS_ACTIVE: i64 = 1;

/// Machine credential owned by one operator.
///
/// At rest `api_key` holds the deterministic ciphertext of the secret;
/// the cleartext is only ever present in-memory, on creation/rotation
/// responses and in the owner's own listing.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ApiKey {
    pub id: i64,
    pub user_id: i64,
    pub key_name: String,
    pub api_key: String,
    pub status: i64,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ApiKey {
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(at) => at < Utc::now(),
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == API_KEY_STATUS_ACTIVE && !self.is_expired()
    }
}

#[derive(Debug, Deserialize)]
pub struct GenerateApiKeyRequest {
    pub key_name: String,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateApiKeyRequest {
    pub id: i64,
    pub key_name: Option<String>,
    pub status: Option<i64>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteApiKeyRequest {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct RotateApiKeyRequest {
    pub id: i64,
}
