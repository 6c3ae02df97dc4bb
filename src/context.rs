use std::sync::Arc;

use crate::accounting::Accounting;
use crate::auth::AuthServices;
use crate::config::Config;
use crate::quota::QuotaEngine;
use crate::rate_limit::RateLimiter;
use crate::registry::ServiceRegistry;
use crate::store::DynStore;

/// Shared dependencies for the request pipeline; one instance per
/// process, cloned into every handler via the router state.
pub struct AppContext {
    pub store: DynStore,
    pub auth: Arc<AuthServices>,
    pub registry: Arc<ServiceRegistry>,
    pub rate_limiter: Arc<RateLimiter>,
    pub quotas: QuotaEngine,
    pub accounting: Accounting,
    pub config: Arc<Config>,
}
