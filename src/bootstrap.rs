//! First-run provisioning.
//!
//! Runs after schema migration on every start; the `system_initialized`
//! config row makes the whole sequence idempotent, so repeated starts
//! (and crashes mid-provisioning) converge on the same state.

use anyhow::Context;

use crate::auth::crypto::{hash_password, random_hex};
use crate::models::{
    User, CONFIG_KEY_API_KEY_SECRET, CONFIG_KEY_DEFAULT_QUOTA_LIMIT, CONFIG_KEY_JWT_SECRET,
    CONFIG_KEY_REGISTRATION_OPEN, CONFIG_KEY_SYSTEM_INITIALIZED, ROLE_ADMIN, USER_STATUS_ACTIVE,
};
use crate::store::{ConfigRepository as _, Store, StoreError, UserRepository as _};

const DEFAULT_ADMIN_USERNAME: &str = "admin";
const DEFAULT_QUOTA_LIMIT: &str = "1000";

/// Provisions the default operator and secrets on a fresh store.
/// Returns the generated admin password when an operator was created
/// this run; it is also logged once and never recoverable afterwards.
pub async fn provision(store: &dyn Store) -> anyhow::Result<Option<String>> {
    if is_initialized(store).await? {
        tracing::debug!("system already initialized, skipping provisioning");
        return Ok(None);
    }

    tracing::info!("first start detected, provisioning system defaults");

    let admin_password = create_default_admin(store).await?;

    ensure_secret(store, CONFIG_KEY_JWT_SECRET).await?;
    ensure_secret(store, CONFIG_KEY_API_KEY_SECRET).await?;
    ensure_value(store, CONFIG_KEY_DEFAULT_QUOTA_LIMIT, DEFAULT_QUOTA_LIMIT).await?;
    ensure_value(store, CONFIG_KEY_REGISTRATION_OPEN, "false").await?;

    store
        .configs()
        .set(CONFIG_KEY_SYSTEM_INITIALIZED, "true")
        .await
        .context("failed to mark system as initialized")?;

    tracing::info!("system provisioning complete");
    Ok(admin_password)
}

async fn is_initialized(store: &dyn Store) -> anyhow::Result<bool> {
    match store.configs().get(CONFIG_KEY_SYSTEM_INITIALIZED).await {
        Ok(value) => Ok(value == "true"),
        Err(StoreError::NotFound) => Ok(false),
        Err(other) => Err(other).context("failed to read initialization flag"),
    }
}

async fn create_default_admin(store: &dyn Store) -> anyhow::Result<Option<String>> {
    match store.users().get_by_username(DEFAULT_ADMIN_USERNAME).await {
        Ok(_) => return Ok(None),
        Err(StoreError::NotFound) => {}
        Err(other) => return Err(other).context("failed to look up default admin"),
    }

    let password = random_hex(8);
    let mut admin = User {
        id: 0,
        username: DEFAULT_ADMIN_USERNAME.to_string(),
        password: hash_password(&password)?,
        email: String::new(),
        role: ROLE_ADMIN.to_string(),
        status: USER_STATUS_ACTIVE,
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
    };

    store
        .users()
        .create(&mut admin)
        .await
        .context("failed to create default admin")?;

    // The only time this password is ever visible. Operators are
    // expected to change it immediately.
    tracing::warn!(
        username = DEFAULT_ADMIN_USERNAME,
        password = %password,
        "default admin account created; change this password"
    );

    Ok(Some(password))
}

async fn ensure_secret(store: &dyn Store, key: &str) -> anyhow::Result<()> {
    match store.configs().get(key).await {
        Ok(_) => Ok(()),
        Err(StoreError::NotFound) => {
            let secret = random_hex(32);
            store
                .configs()
                .set(key, &secret)
                .await
                .with_context(|| format!("failed to persist {key}"))?;
            tracing::info!(key, "generated secret");
            Ok(())
        }
        Err(other) => Err(other).with_context(|| format!("failed to read {key}")),
    }
}

async fn ensure_value(store: &dyn Store, key: &str, value: &str) -> anyhow::Result<()> {
    match store.configs().get(key).await {
        Ok(_) => Ok(()),
        Err(StoreError::NotFound) => {
            store
                .configs()
                .set(key, value)
                .await
                .with_context(|| format!("failed to persist {key}"))?;
            Ok(())
        }
        Err(other) => Err(other).with_context(|| format!("failed to read {key}")),
    }
}
