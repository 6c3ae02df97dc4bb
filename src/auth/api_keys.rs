//! Machine-key credentials: generate, validate, rotate, revoke.

use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::models::{ApiKey, API_KEY_STATUS_ACTIVE, API_KEY_STATUS_DISABLED};
use crate::store::{ApiKeyRepository as _, DynStore, Store as _, StoreError};

use super::crypto::{random_hex, DeterministicCipher};

/// Length of a generated secret in hex characters.
const KEY_LENGTH: usize = 32;

pub struct ApiKeyService {
    store: DynStore,
    cipher: DeterministicCipher,
}

impl ApiKeyService {
    pub fn new(store: DynStore, cipher: DeterministicCipher) -> Self {
        Self { store, cipher }
    }

    /// Fresh secret from a cryptographically strong source.
    pub fn generate_secret() -> String {
        random_hex(KEY_LENGTH / 2)
    }

    /// Creates a machine key for `user_id`. The returned record
    /// carries the cleartext secret; this is the only time it leaves
    /// the service, all persisted state holds the ciphertext.
    pub async fn create(
        &self,
        user_id: i64,
        key_name: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<ApiKey, AppError> {
        let secret = Self::generate_secret();
        let ciphertext = self
            .cipher
            .encrypt(&secret)
            .map_err(|e| AppError::internal(format!("key encryption failed: {e}")))?;

        let mut key = ApiKey {
            id: 0,
            user_id,
            key_name: key_name.to_string(),
            api_key: ciphertext,
            status: API_KEY_STATUS_ACTIVE,
            expires_at,
            created_at: Utc::now(),
        };

        self.store.api_keys().create(&mut key).await?;

        key.api_key = secret;
        Ok(key)
    }

    /// Validates a presented cleartext secret.
    ///
    /// Encrypts the presented value and looks it up by ciphertext
    /// equality. Every failure mode (empty, unknown, disabled,
    /// expired) collapses into the same `unauthorized` so the caller
    /// learns nothing about which it was.
    pub async fn validate(&self, presented: &str) -> Result<ApiKey, AppError> {
        if presented.is_empty() {
            return Err(AppError::unauthorized("invalid api key"));
        }

        let ciphertext = self
            .cipher
            .encrypt(presented)
            .map_err(|_| AppError::unauthorized("invalid api key"))?;

        let mut key = match self.store.api_keys().get_by_key(&ciphertext).await {
            Ok(key) => key,
            Err(StoreError::NotFound) => return Err(AppError::unauthorized("invalid api key")),
            Err(other) => return Err(other.into()),
        };

        if !key.is_active() {
            return Err(AppError::unauthorized("invalid api key"));
        }

        key.api_key = presented.to_string();
        Ok(key)
    }

    /// The owner may inspect its own secrets: each stored ciphertext
    /// is decrypted back to cleartext. An undecryptable row yields an
    /// empty string rather than failing the whole listing.
    pub async fn list_for_owner(&self, user_id: i64) -> Result<Vec<ApiKey>, AppError> {
        let mut keys = self.store.api_keys().get_by_user_id(user_id).await?;

        for key in &mut keys {
            key.api_key = self.cipher.decrypt(&key.api_key).unwrap_or_default();
        }

        Ok(keys)
    }

    pub async fn get(&self, id: i64) -> Result<ApiKey, AppError> {
        Ok(self.store.api_keys().get_by_id(id).await?)
    }

    pub async fn update(
        &self,
        id: i64,
        key_name: Option<String>,
        status: Option<i64>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<ApiKey, AppError> {
        let mut key = self.store.api_keys().get_by_id(id).await?;

        if let Some(name) = key_name {
            if !name.is_empty() {
                key.key_name = name;
            }
        }
        if let Some(status) = status {
            if status == API_KEY_STATUS_ACTIVE || status == API_KEY_STATUS_DISABLED {
                key.status = status;
            }
        }
        if expires_at.is_some() {
            key.expires_at = expires_at;
        }

        self.store.api_keys().update(&key).await?;
        Ok(key)
    }

    /// Atomically replaces the stored ciphertext with a fresh secret.
    /// Like `create`, the cleartext is returned exactly once.
    pub async fn rotate(&self, id: i64) -> Result<ApiKey, AppError> {
        let mut key = self.store.api_keys().get_by_id(id).await?;

        let secret = Self::generate_secret();
        key.api_key = self
            .cipher
            .encrypt(&secret)
            .map_err(|e| AppError::internal(format!("key encryption failed: {e}")))?;

        self.store.api_keys().update(&key).await?;

        key.api_key = secret;
        Ok(key)
    }

    pub async fn revoke(&self, id: i64) -> Result<(), AppError> {
        let mut key = self.store.api_keys().get_by_id(id).await?;
        key.status = API_KEY_STATUS_DISABLED;
        self.store.api_keys().update(&key).await?;
        Ok(())
    }

    pub async fn delete(&self, id: i64) -> Result<(), AppError> {
        self.store.api_keys().delete(id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::sqlite::SqliteStore;
    use crate::store::{Store, UserRepository};
    use std::sync::Arc;

    async fn service_with_owner() -> (ApiKeyService, i64) {
        let store = SqliteStore::open_in_memory().await.unwrap();
        store.migrate().await.unwrap();
        let store: DynStore = Arc::new(store);

        let mut owner = crate::models::User {
            id: 0,
            username: "owner".to_string(),
            password: "hash".to_string(),
            email: String::new(),
            role: "user".to_string(),
            status: 1,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        store.users().create(&mut owner).await.unwrap();

        let cipher = DeterministicCipher::new("test-secret");
        (ApiKeyService::new(store, cipher), owner.id)
    }

    fn assert_unauthorized(err: AppError) {
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn issued_secret_validates_until_revoked() {
        let (service, owner) = service_with_owner().await;

        let created = service.create(owner, "ci", None).await.unwrap();
        let secret = created.api_key.clone();
        assert_eq!(secret.len(), 32);

        let validated = service.validate(&secret).await.unwrap();
        assert_eq!(validated.id, created.id);
        assert_eq!(validated.user_id, owner);

        service.revoke(created.id).await.unwrap();
        assert_unauthorized(service.validate(&secret).await.unwrap_err());
    }

    #[tokio::test]
    async fn never_issued_secrets_are_unauthorized() {
        let (service, _owner) = service_with_owner().await;

        assert_unauthorized(service.validate("").await.unwrap_err());
        assert_unauthorized(
            service
                .validate("00000000000000000000000000000000")
                .await
                .unwrap_err(),
        );
    }

    #[tokio::test]
    async fn expired_keys_are_unauthorized() {
        let (service, owner) = service_with_owner().await;

        let past = chrono::Utc::now() - chrono::Duration::hours(1);
        let created = service.create(owner, "stale", Some(past)).await.unwrap();

        assert_unauthorized(service.validate(&created.api_key).await.unwrap_err());
    }

    #[tokio::test]
    async fn owner_listing_decrypts_the_stored_secrets() {
        let (service, owner) = service_with_owner().await;

        let a = service.create(owner, "a", None).await.unwrap();
        let b = service.create(owner, "b", None).await.unwrap();

        let listed = service.list_for_owner(owner).await.unwrap();
        let mut secrets: Vec<&str> = listed.iter().map(|k| k.api_key.as_str()).collect();
        secrets.sort_unstable();
        let mut expected = vec![a.api_key.as_str(), b.api_key.as_str()];
        expected.sort_unstable();
        assert_eq!(secrets, expected);
    }

    #[tokio::test]
    async fn rotation_replaces_the_secret_exactly_once() {
        let (service, owner) = service_with_owner().await;

        let created = service.create(owner, "rotating", None).await.unwrap();
        let old_secret = created.api_key.clone();

        let rotated = service.rotate(created.id).await.unwrap();
        assert_ne!(rotated.api_key, old_secret);
        assert_eq!(rotated.id, created.id);

        assert_unauthorized(service.validate(&old_secret).await.unwrap_err());
        assert!(service.validate(&rotated.api_key).await.is_ok());
    }
}
