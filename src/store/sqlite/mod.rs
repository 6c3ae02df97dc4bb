//! SQLite-backed implementation of the persistence contract.
//!
//! One shared `SqlitePool` handle; the pool is responsible for its
//! own concurrency. WAL journal mode keeps readers from blocking the
//! accounting writer.

mod access_logs;
mod api_keys;
mod configs;
mod quotas;
mod services;
mod users;

use std::path::Path;
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;

use super::{
    AccessLogRepository, ApiKeyRepository, ConfigRepository, QuotaRepository, ServiceRepository,
    Store, StoreError, StoreResult, UserRepository,
};

pub use access_logs::SqliteAccessLogRepository;
pub use api_keys::SqliteApiKeyRepository;
pub use configs::SqliteConfigRepository;
pub use quotas::SqliteQuotaRepository;
pub use services::SqliteServiceRepository;
pub use users::SqliteUserRepository;

pub struct SqliteStore {
    pool: SqlitePool,
    users: SqliteUserRepository,
    api_keys: SqliteApiKeyRepository,
    configs: SqliteConfigRepository,
    quotas: SqliteQuotaRepository,
    services: SqliteServiceRepository,
    access_logs: SqliteAccessLogRepository,
}

impl SqliteStore {
    /// Open (or create) the database file and wrap it in a store.
    pub async fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;
            }
        }

        let options =
            SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))
                .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?
                .journal_mode(SqliteJournalMode::Wal)
                .foreign_keys(true)
                .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;

        tracing::info!(path = %path.display(), "database opened");
        Ok(Self::from_pool(pool))
    }

    /// In-memory database for tests.
    pub async fn open_in_memory() -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?
            .foreign_keys(true);

        // A single connection: every handle must see the same
        // in-memory database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;

        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            users: SqliteUserRepository::new(pool.clone()),
            api_keys: SqliteApiKeyRepository::new(pool.clone()),
            configs: SqliteConfigRepository::new(pool.clone()),
            quotas: SqliteQuotaRepository::new(pool.clone()),
            services: SqliteServiceRepository::new(pool.clone()),
            access_logs: SqliteAccessLogRepository::new(pool.clone()),
            pool,
        }
    }

    /// Apply the embedded schema migrations. Ordered, idempotent and
    /// recorded in the migrations ledger table, so running twice is a
    /// no-op.
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!()
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::MigrationFailed(e.to_string()))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl Store for SqliteStore {
    fn users(&self) -> &dyn UserRepository {
        &self.users
    }

    fn api_keys(&self) -> &dyn ApiKeyRepository {
        &self.api_keys
    }

    fn configs(&self) -> &dyn ConfigRepository {
        &self.configs
    }

    fn quotas(&self) -> &dyn QuotaRepository {
        &self.quotas
    }

    fn services(&self) -> &dyn ServiceRepository {
        &self.services
    }

    fn access_logs(&self) -> &dyn AccessLogRepository {
        &self.access_logs
    }
}
