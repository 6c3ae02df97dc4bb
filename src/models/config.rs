use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SystemConfig {
    pub id: i64,
    pub config_key: String,
    pub config_value: String,
    pub updated_at: DateTime<Utc>,
}

// Well-known configuration rows.
pub const CONFIG_KEY_SYSTEM_INITIALIZED: &str = "system_initialized";
pub const CONFIG_KEY_JWT_SECRET: &str = "jwt_secret";
pub const CONFIG_KEY_API_KEY_SECRET: &str = "api_key_secret";
pub const CONFIG_KEY_DEFAULT_QUOTA_LIMIT: &str = "default_quota_limit";
pub const CONFIG_KEY_REGISTRATION_OPEN: &str = "registration_open";
