use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::models::ServiceQuota;
use crate::store::{QuotaRepository, StoreResult};

pub struct SqliteQuotaRepository {
    pool: SqlitePool,
}

impl SqliteQuotaRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

const QUOTA_COLUMNS: &str =
    "id, user_id, service_name, time_window, usage, limit_value, reset_time, created_at, updated_at";

#[async_trait]
impl QuotaRepository for SqliteQuotaRepository {
    async fn create(&self, quota: &mut ServiceQuota) -> StoreResult<()> {
        let now = Utc::now();
        quota.created_at = now;
        quota.updated_at = now;

        let result = sqlx::query(
            r#"
            INSERT INTO service_quotas
                (user_id, service_name, time_window, usage, limit_value, reset_time, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(quota.user_id)
        .bind(&quota.service_name)
        .bind(&quota.time_window)
        .bind(quota.usage)
        .bind(quota.limit_value)
        .bind(quota.reset_time)
        .bind(quota.created_at)
        .bind(quota.updated_at)
        .execute(&self.pool)
        .await?;

        quota.id = result.last_insert_rowid();
        Ok(())
    }

    async fn get(
        &self,
        user_id: i64,
        service_name: &str,
        time_window: &str,
    ) -> StoreResult<ServiceQuota> {
        let quota = sqlx::query_as::<_, ServiceQuota>(&format!(
            "SELECT {QUOTA_COLUMNS} FROM service_quotas
             WHERE user_id = ? AND service_name = ? AND time_window = ?"
        ))
        .bind(user_id)
        .bind(service_name)
        .bind(time_window)
        .fetch_one(&self.pool)
        .await?;

        Ok(quota)
    }

    async fn get_by_user_id(&self, user_id: i64) -> StoreResult<Vec<ServiceQuota>> {
        let quotas = sqlx::query_as::<_, ServiceQuota>(&format!(
            "SELECT {QUOTA_COLUMNS} FROM service_quotas
             WHERE user_id = ? ORDER BY service_name, time_window"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(quotas)
    }

    async fn update(&self, quota: &ServiceQuota) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE service_quotas
            SET usage = ?, limit_value = ?, reset_time = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(quota.usage)
        .bind(quota.limit_value)
        .bind(quota.reset_time)
        .bind(Utc::now())
        .bind(quota.id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn increment_usage(
        &self,
        user_id: i64,
        service_name: &str,
        time_window: &str,
        cost: i64,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE service_quotas
            SET usage = usage + ?, updated_at = ?
            WHERE user_id = ? AND service_name = ? AND time_window = ?
            "#,
        )
        .bind(cost)
        .bind(Utc::now())
        .bind(user_id)
        .bind(service_name)
        .bind(time_window)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn reset_usage(
        &self,
        user_id: i64,
        service_name: &str,
        time_window: &str,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE service_quotas
            SET usage = 0, updated_at = ?
            WHERE user_id = ? AND service_name = ? AND time_window = ?
            "#,
        )
        .bind(Utc::now())
        .bind(user_id)
        .bind(service_name)
        .bind(time_window)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
