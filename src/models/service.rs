use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const SERVICE_STATUS_DISABLED: i64 = 0;
pub const SERVICE_STATUS_ENABLED: i64 = 1;

/// Persisted catalog entry for one named callable capability.
///
/// Policy knobs live here; the handler lives on the in-memory
/// [`crate::registry::RegisteredService`]. The two are joined by name
/// at registration time and never cross-mutate.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ServiceDefinition {
    pub id: i64,
    pub service_name: String,
    pub description: String,
    /// Default daily quota granted on first charged use; -1 = unlimited.
    pub default_limit: i64,
    pub status: i64,
    pub allow_anonymous: bool,
    /// Requests per minute; a non-positive value falls back to the
    /// gateway-wide default.
    pub rate_limit: i64,
    /// Quota units charged per invocation; 0 disables quota accounting.
    pub quota_cost: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ServiceDefinition {
    pub fn is_enabled(&self) -> bool {
        self.status == SERVICE_STATUS_ENABLED
    }
}

/// In-process registration config for a service that is not yet in
/// the catalog. When the catalog already has an entry for the name,
/// the stored values win and this config is ignored.
#[derive(Debug, Clone)]
pub struct ServiceSpec {
    pub description: String,
    pub allow_anonymous: bool,
    pub rate_limit: i64,
    pub quota_cost: i64,
    pub default_limit: i64,
}

impl Default for ServiceSpec {
    fn default() -> Self {
        Self {
            description: String::new(),
            allow_anonymous: false,
            rate_limit: 60,
            quota_cost: 1,
            default_limit: 1000,
        }
    }
}

/// Catalog entry as shown on the public service listing.
#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceSummary {
    pub service_name: String,
    pub description: String,
    pub allow_anonymous: bool,
}

/// Administrative edit of a catalog entry's policy knobs.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateServiceRequest {
    pub description: Option<String>,
    pub status: Option<i64>,
    pub allow_anonymous: Option<bool>,
    pub rate_limit: Option<i64>,
    pub quota_cost: Option<i64>,
    pub default_limit: Option<i64>,
}
