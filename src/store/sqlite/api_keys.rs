use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::models::ApiKey;
use crate::store::{ApiKeyRepository, StoreResult};

pub struct SqliteApiKeyRepository {
    pool: SqlitePool,
}

impl SqliteApiKeyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

const KEY_COLUMNS: &str = "id, user_id, key_name, api_key, status, expires_at, created_at";

#[async_trait]
impl ApiKeyRepository for SqliteApiKeyRepository {
    async fn create(&self, key: &mut ApiKey) -> StoreResult<()> {
        key.created_at = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO api_keys (user_id, key_name, api_key, status, expires_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(key.user_id)
        .bind(&key.key_name)
        .bind(&key.api_key)
        .bind(key.status)
        .bind(key.expires_at)
        .bind(key.created_at)
        .execute(&self.pool)
        .await?;

        key.id = result.last_insert_rowid();
        Ok(())
    }

    async fn get_by_id(&self, id: i64) -> StoreResult<ApiKey> {
        let key = sqlx::query_as::<_, ApiKey>(&format!(
            "SELECT {KEY_COLUMNS} FROM api_keys WHERE id = ?"
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(key)
    }

    async fn get_by_key(&self, ciphertext: &str) -> StoreResult<ApiKey> {
        let key = sqlx::query_as::<_, ApiKey>(&format!(
            "SELECT {KEY_COLUMNS} FROM api_keys WHERE api_key = ?"
        ))
        .bind(ciphertext)
        .fetch_one(&self.pool)
        .await?;

        Ok(key)
    }

    async fn get_by_user_id(&self, user_id: i64) -> StoreResult<Vec<ApiKey>> {
        let keys = sqlx::query_as::<_, ApiKey>(&format!(
            "SELECT {KEY_COLUMNS} FROM api_keys WHERE user_id = ? ORDER BY id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(keys)
    }

    async fn update(&self, key: &ApiKey) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE api_keys
            SET key_name = ?, api_key = ?, status = ?, expires_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&key.key_name)
        .bind(&key.api_key)
        .bind(key.status)
        .bind(key.expires_at)
        .bind(key.id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, id: i64) -> StoreResult<()> {
        sqlx::query("DELETE FROM api_keys WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
