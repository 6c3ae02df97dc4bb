//! Quota admission and charging.
//!
//! The admission check (lookup, create-on-miss, limit test) runs
//! before the handler; the increment runs in the accounting stage
//! afterwards. The pair is intentionally not transactional: under
//! concurrent requests the counter may overshoot by at most the
//! number of in-flight admissions, which is acceptable at the target
//! deployment scale.

use chrono::{Duration, Utc};

use crate::error::AppError;
use crate::models::{ServiceDefinition, ServiceQuota, WINDOW_DAILY};
use crate::store::{DynStore, QuotaRepository as _, Store as _, StoreError};

pub struct QuotaEngine {
    store: DynStore,
}

impl QuotaEngine {
    pub fn new(store: DynStore) -> Self {
        Self { store }
    }

    /// Admission for an identified invocation of `definition`.
    /// Zero-cost services pass unconditionally; a missing quota row
    /// is created with the definition's default daily limit.
    pub async fn admit(
        &self,
        user_id: i64,
        definition: &ServiceDefinition,
    ) -> Result<(), AppError> {
        if definition.quota_cost <= 0 {
            return Ok(());
        }

        let quota = self.get_or_create(user_id, definition).await?;

        if quota.is_exceeded() {
            return Err(AppError::QuotaExceeded);
        }

        Ok(())
    }

    /// Current usage snapshot for an operator, for the dashboard.
    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<ServiceQuota>, AppError> {
        Ok(self.store.quotas().get_by_user_id(user_id).await?)
    }

    pub async fn reset(&self, user_id: i64, service_name: &str) -> Result<(), AppError> {
        self.store
            .quotas()
            .reset_usage(user_id, service_name, WINDOW_DAILY)
            .await?;
        Ok(())
    }

    /// Administrative limit assignment; creates the row when the
    /// operator has never been charged for the service.
    pub async fn set_limit(
        &self,
        user_id: i64,
        service_name: &str,
        limit_value: i64,
    ) -> Result<ServiceQuota, AppError> {
        match self
            .store
            .quotas()
            .get(user_id, service_name, WINDOW_DAILY)
            .await
        {
            Ok(mut quota) => {
                quota.limit_value = limit_value;
                self.store.quotas().update(&quota).await?;
                Ok(quota)
            }
            Err(StoreError::NotFound) => {
                let mut quota = ServiceQuota {
                    id: 0,
                    user_id,
                    service_name: service_name.to_string(),
                    time_window: WINDOW_DAILY.to_string(),
                    usage: 0,
                    limit_value,
                    reset_time: Utc::now() + Duration::hours(24),
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                };
                self.store.quotas().create(&mut quota).await?;
                Ok(quota)
            }
            Err(other) => Err(other.into()),
        }
    }

    async fn get_or_create(
        &self,
        user_id: i64,
        definition: &ServiceDefinition,
    ) -> Result<ServiceQuota, AppError> {
        let name = definition.service_name.as_str();

        match self.store.quotas().get(user_id, name, WINDOW_DAILY).await {
            Ok(quota) => Ok(quota),
            Err(StoreError::NotFound) => {
                let mut quota = ServiceQuota {
                    id: 0,
                    user_id,
                    service_name: name.to_string(),
                    time_window: WINDOW_DAILY.to_string(),
                    usage: 0,
                    limit_value: definition.default_limit,
                    reset_time: Utc::now() + Duration::hours(24),
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                };

                match self.store.quotas().create(&mut quota).await {
                    Ok(()) => Ok(quota),
                    // Lost a create race; the winner's row is the one
                    // that counts.
                    Err(StoreError::DuplicateKey(_)) => {
                        Ok(self.store.quotas().get(user_id, name, WINDOW_DAILY).await?)
                    }
                    Err(other) => Err(other.into()),
                }
            }
            Err(other) => Err(other.into()),
        }
    }
}
