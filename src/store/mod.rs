//! Persistence contract.
//!
//! The gateway core depends only on these repository traits; the
//! SQLite implementation lives in [`sqlite`]. Cancellation follows
//! the usual async contract: dropping a repository future abandons
//! the operation, and implementations never leave a transaction
//! half-applied.

pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{
    AccessLog, ApiKey, NewAccessLog, ServiceDefinition, ServiceQuota, SystemConfig, UsageStats,
    User,
};

/// Categorized persistence failure. `NotFound` is deliberately
/// distinct from the constraint-class errors so create-on-miss sites
/// can branch on it.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("migration failed: {0}")]
    MigrationFailed(String),

    #[error("not found")]
    NotFound,

    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("transaction failed: {0}")]
    TransactionFailed(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(db) => match db.kind() {
                sqlx::error::ErrorKind::UniqueViolation => {
                    StoreError::DuplicateKey(db.message().to_string())
                }
                _ => StoreError::ConstraintViolation(db.message().to_string()),
            },
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::ConnectionFailed(err.to_string())
            }
            _ => StoreError::ConstraintViolation(err.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: &mut User) -> StoreResult<()>;
    async fn get_by_id(&self, id: i64) -> StoreResult<User>;
    async fn get_by_username(&self, username: &str) -> StoreResult<User>;
    async fn get_by_email(&self, email: &str) -> StoreResult<User>;
    async fn update(&self, user: &User) -> StoreResult<()>;
    async fn delete(&self, id: i64) -> StoreResult<()>;
    async fn list(&self, offset: i64, limit: i64) -> StoreResult<Vec<User>>;
    async fn count(&self) -> StoreResult<i64>;
}

#[async_trait]
pub trait ApiKeyRepository: Send + Sync {
    async fn create(&self, key: &mut ApiKey) -> StoreResult<()>;
    async fn get_by_id(&self, id: i64) -> StoreResult<ApiKey>;
    /// Exact equality lookup on the encrypted column; the cipher's
    /// determinism is what makes this possible.
    async fn get_by_key(&self, ciphertext: &str) -> StoreResult<ApiKey>;
    async fn get_by_user_id(&self, user_id: i64) -> StoreResult<Vec<ApiKey>>;
    async fn update(&self, key: &ApiKey) -> StoreResult<()>;
    async fn delete(&self, id: i64) -> StoreResult<()>;
}

#[async_trait]
pub trait ConfigRepository: Send + Sync {
    /// Upsert on `config_key`.
    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;
    async fn get(&self, key: &str) -> StoreResult<String>;
    async fn get_all(&self) -> StoreResult<Vec<SystemConfig>>;
    async fn delete(&self, key: &str) -> StoreResult<()>;
    /// Writes every pair inside one transaction.
    async fn batch_set(&self, entries: &[(String, String)]) -> StoreResult<()>;
}

#[async_trait]
pub trait QuotaRepository: Send + Sync {
    async fn create(&self, quota: &mut ServiceQuota) -> StoreResult<()>;
    async fn get(
        &self,
        user_id: i64,
        service_name: &str,
        time_window: &str,
    ) -> StoreResult<ServiceQuota>;
    async fn get_by_user_id(&self, user_id: i64) -> StoreResult<Vec<ServiceQuota>>;
    async fn update(&self, quota: &ServiceQuota) -> StoreResult<()>;
    /// Single-statement atomic add; no read-modify-write race.
    async fn increment_usage(
        &self,
        user_id: i64,
        service_name: &str,
        time_window: &str,
        cost: i64,
    ) -> StoreResult<()>;
    async fn reset_usage(
        &self,
        user_id: i64,
        service_name: &str,
        time_window: &str,
    ) -> StoreResult<()>;
}

#[async_trait]
pub trait ServiceRepository: Send + Sync {
    async fn create(&self, service: &mut ServiceDefinition) -> StoreResult<()>;
    async fn get_by_id(&self, id: i64) -> StoreResult<ServiceDefinition>;
    async fn get_by_name(&self, service_name: &str) -> StoreResult<ServiceDefinition>;
    async fn update(&self, service: &ServiceDefinition) -> StoreResult<()>;
    async fn delete(&self, id: i64) -> StoreResult<()>;
    async fn list(&self, offset: i64, limit: i64) -> StoreResult<Vec<ServiceDefinition>>;
    async fn get_enabled(&self) -> StoreResult<Vec<ServiceDefinition>>;
}

#[async_trait]
pub trait AccessLogRepository: Send + Sync {
    async fn create(&self, entry: &NewAccessLog) -> StoreResult<i64>;
    async fn get_by_user_id(
        &self,
        user_id: i64,
        offset: i64,
        limit: i64,
    ) -> StoreResult<Vec<AccessLog>>;
    async fn get_by_api_key_id(
        &self,
        api_key_id: i64,
        offset: i64,
        limit: i64,
    ) -> StoreResult<Vec<AccessLog>>;
    /// Per-day aggregation over a closed date range.
    async fn usage_stats(
        &self,
        user_id: i64,
        service_name: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<UsageStats>;
    async fn delete_before(&self, before: DateTime<Utc>) -> StoreResult<u64>;
}

/// Bundle of repositories the rest of the gateway is written against.
pub trait Store: Send + Sync {
    fn users(&self) -> &dyn UserRepository;
    fn api_keys(&self) -> &dyn ApiKeyRepository;
    fn configs(&self) -> &dyn ConfigRepository;
    fn quotas(&self) -> &dyn QuotaRepository;
    fn services(&self) -> &dyn ServiceRepository;
    fn access_logs(&self) -> &dyn AccessLogRepository;
}

pub type DynStore = std::sync::Arc<dyn Store>;
