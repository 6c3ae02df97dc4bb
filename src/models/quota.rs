use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The only window label the accounting pipeline uses today.
pub const WINDOW_DAILY: &str = "daily";

/// Usage counter for one (operator, service, window) triple.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ServiceQuota {
    pub id: i64,
    pub user_id: i64,
    pub service_name: String,
    pub time_window: String,
    pub usage: i64,
    /// -1 disables the limit entirely.
    pub limit_value: i64,
    pub reset_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ServiceQuota {
    pub fn is_exceeded(&self) -> bool {
        self.limit_value != -1 && self.usage >= self.limit_value
    }
}

#[derive(Debug, Serialize)]
pub struct QuotaView {
    pub service_name: String,
    pub time_window: String,
    pub usage: i64,
    pub limit_value: i64,
    pub reset_time: DateTime<Utc>,
    pub is_exceeded: bool,
}

impl ServiceQuota {
    pub fn to_view(&self) -> QuotaView {
        QuotaView {
            service_name: self.service_name.clone(),
            time_window: self.time_window.clone(),
            usage: self.usage,
            limit_value: self.limit_value,
            reset_time: self.reset_time,
            is_exceeded: self.is_exceeded(),
        }
    }
}

/// Administrative quota assignment for one (operator, service) pair.
#[derive(Debug, Deserialize)]
pub struct SetQuotaRequest {
    pub user_id: i64,
    pub service_name: String,
    /// -1 = unlimited.
    pub limit_value: i64,
}

#[derive(Debug, Deserialize)]
pub struct ResetQuotaRequest {
    pub user_id: i64,
    pub service_name: String,
}

/// Immutable append-only record of one completed invocation.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AccessLog {
    pub id: i64,
    pub api_key_id: i64,
    pub user_id: i64,
    pub service_name: String,
    pub endpoint: String,
    pub status: i64,
    pub cost: i64,
    pub created_at: DateTime<Utc>,
}

/// Entry handed to the asynchronous access-log writer; ids default to
/// 0 for anonymous callers.
#[derive(Debug, Clone)]
pub struct NewAccessLog {
    pub api_key_id: i64,
    pub user_id: i64,
    pub service_name: String,
    pub endpoint: String,
    pub status: i64,
    pub cost: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DailyUsage {
    pub date: String,
    pub total_calls: i64,
    pub success_calls: i64,
    pub error_calls: i64,
    pub total_cost: i64,
}

#[derive(Debug, Serialize)]
pub struct UsageStats {
    pub user_id: i64,
    pub service_name: String,
    pub total_cost: i64,
    pub daily: Vec<DailyUsage>,
}
