use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::models::{AccessLog, DailyUsage, NewAccessLog, UsageStats};
use crate::store::{AccessLogRepository, StoreResult};

pub struct SqliteAccessLogRepository {
    pool: SqlitePool,
}

impl SqliteAccessLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

const LOG_COLUMNS: &str = "id, api_key_id, user_id, service_name, endpoint, status, cost, created_at";

#[async_trait]
impl AccessLogRepository for SqliteAccessLogRepository {
    async fn create(&self, entry: &NewAccessLog) -> StoreResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO access_logs
                (api_key_id, user_id, service_name, endpoint, status, cost, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.api_key_id)
        .bind(entry.user_id)
        .bind(&entry.service_name)
        .bind(&entry.endpoint)
        .bind(entry.status)
        .bind(entry.cost)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn get_by_user_id(
        &self,
        user_id: i64,
        offset: i64,
        limit: i64,
    ) -> StoreResult<Vec<AccessLog>> {
        let logs = sqlx::query_as::<_, AccessLog>(&format!(
            "SELECT {LOG_COLUMNS} FROM access_logs
             WHERE user_id = ? ORDER BY created_at DESC LIMIT ? OFFSET ?"
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(logs)
    }

    async fn get_by_api_key_id(
        &self,
        api_key_id: i64,
        offset: i64,
        limit: i64,
    ) -> StoreResult<Vec<AccessLog>> {
        let logs = sqlx::query_as::<_, AccessLog>(&format!(
            "SELECT {LOG_COLUMNS} FROM access_logs
             WHERE api_key_id = ? ORDER BY created_at DESC LIMIT ? OFFSET ?"
        ))
        .bind(api_key_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(logs)
    }

    async fn usage_stats(
        &self,
        user_id: i64,
        service_name: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<UsageStats> {
        let rows: Vec<(String, i64, i64, i64, i64)> = sqlx::query_as(
            r#"
            SELECT date(created_at) AS day,
                   COUNT(*) AS total_calls,
                   COALESCE(SUM(CASE WHEN status < 400 THEN 1 ELSE 0 END), 0) AS success_calls,
                   COALESCE(SUM(CASE WHEN status >= 400 THEN 1 ELSE 0 END), 0) AS error_calls,
                   COALESCE(SUM(cost), 0) AS total_cost
            FROM access_logs
            WHERE user_id = ? AND service_name = ? AND created_at >= ? AND created_at <= ?
            GROUP BY day
            ORDER BY day
            "#,
        )
        .bind(user_id)
        .bind(service_name)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        let daily: Vec<DailyUsage> = rows
            .into_iter()
            .map(
                |(date, total_calls, success_calls, error_calls, total_cost)| DailyUsage {
                    date,
                    total_calls,
                    success_calls,
                    error_calls,
                    total_cost,
                },
            )
            .collect();

        let total_cost = daily.iter().map(|d| d.total_cost).sum();

        Ok(UsageStats {
            user_id,
            service_name: service_name.to_string(),
            total_cost,
            daily,
        })
    }

    async fn delete_before(&self, before: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM access_logs WHERE created_at < ?")
            .bind(before)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
