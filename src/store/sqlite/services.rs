use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::models::{ServiceDefinition, SERVICE_STATUS_ENABLED};
use crate::store::{ServiceRepository, StoreResult};

pub struct SqliteServiceRepository {
    pool: SqlitePool,
}

impl SqliteServiceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

const SERVICE_COLUMNS: &str = "id, service_name, description, default_limit, status, \
                               allow_anonymous, rate_limit, quota_cost, created_at, updated_at";

#[async_trait]
impl ServiceRepository for SqliteServiceRepository {
    async fn create(&self, service: &mut ServiceDefinition) -> StoreResult<()> {
        let now = Utc::now();
        service.created_at = now;
        service.updated_at = now;

        let result = sqlx::query(
            r#"
            INSERT INTO service_definitions
                (service_name, description, default_limit, status, allow_anonymous,
                 rate_limit, quota_cost, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&service.service_name)
        .bind(&service.description)
        .bind(service.default_limit)
        .bind(service.status)
        .bind(service.allow_anonymous)
        .bind(service.rate_limit)
        .bind(service.quota_cost)
        .bind(service.created_at)
        .bind(service.updated_at)
        .execute(&self.pool)
        .await?;

        service.id = result.last_insert_rowid();
        Ok(())
    }

    async fn get_by_id(&self, id: i64) -> StoreResult<ServiceDefinition> {
        let service = sqlx::query_as::<_, ServiceDefinition>(&format!(
            "SELECT {SERVICE_COLUMNS} FROM service_definitions WHERE id = ?"
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(service)
    }

    async fn get_by_name(&self, service_name: &str) -> StoreResult<ServiceDefinition> {
        let service = sqlx::query_as::<_, ServiceDefinition>(&format!(
            "SELECT {SERVICE_COLUMNS} FROM service_definitions WHERE service_name = ?"
        ))
        .bind(service_name)
        .fetch_one(&self.pool)
        .await?;

        Ok(service)
    }

    async fn update(&self, service: &ServiceDefinition) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE service_definitions
            SET description = ?, default_limit = ?, status = ?, allow_anonymous = ?,
                rate_limit = ?, quota_cost = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&service.description)
        .bind(service.default_limit)
        .bind(service.status)
        .bind(service.allow_anonymous)
        .bind(service.rate_limit)
        .bind(service.quota_cost)
        .bind(Utc::now())
        .bind(service.id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, id: i64) -> StoreResult<()> {
        sqlx::query("DELETE FROM service_definitions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn list(&self, offset: i64, limit: i64) -> StoreResult<Vec<ServiceDefinition>> {
        let services = sqlx::query_as::<_, ServiceDefinition>(&format!(
            "SELECT {SERVICE_COLUMNS} FROM service_definitions ORDER BY id LIMIT ? OFFSET ?"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(services)
    }

    async fn get_enabled(&self) -> StoreResult<Vec<ServiceDefinition>> {
        let services = sqlx::query_as::<_, ServiceDefinition>(&format!(
            "SELECT {SERVICE_COLUMNS} FROM service_definitions WHERE status = ? ORDER BY service_name"
        ))
        .bind(SERVICE_STATUS_ENABLED)
        .fetch_all(&self.pool)
        .await?;

        Ok(services)
    }
}
