use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::models::SystemConfig;
use crate::store::{ConfigRepository, StoreError, StoreResult};

pub struct SqliteConfigRepository {
    pool: SqlitePool,
}

impl SqliteConfigRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConfigRepository for SqliteConfigRepository {
    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO system_configs (config_key, config_value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT (config_key)
            DO UPDATE SET config_value = excluded.config_value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<String> {
        let value: (String,) =
            sqlx::query_as("SELECT config_value FROM system_configs WHERE config_key = ?")
                .bind(key)
                .fetch_one(&self.pool)
                .await?;

        Ok(value.0)
    }

    async fn get_all(&self) -> StoreResult<Vec<SystemConfig>> {
        let configs = sqlx::query_as::<_, SystemConfig>(
            "SELECT id, config_key, config_value, updated_at FROM system_configs ORDER BY config_key",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(configs)
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM system_configs WHERE config_key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn batch_set(&self, entries: &[(String, String)]) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::TransactionFailed(e.to_string()))?;

        for (key, value) in entries {
            sqlx::query(
                r#"
                INSERT INTO system_configs (config_key, config_value, updated_at)
                VALUES (?, ?, ?)
                ON CONFLICT (config_key)
                DO UPDATE SET config_value = excluded.config_value, updated_at = excluded.updated_at
                "#,
            )
            .bind(key)
            .bind(value)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::TransactionFailed(e.to_string()))?;

        Ok(())
    }
}
