//! First-run provisioning and idempotence.

mod test_utils;

use std::sync::Arc;

use apigate::models::{
    CONFIG_KEY_API_KEY_SECRET, CONFIG_KEY_DEFAULT_QUOTA_LIMIT, CONFIG_KEY_JWT_SECRET,
    CONFIG_KEY_REGISTRATION_OPEN, CONFIG_KEY_SYSTEM_INITIALIZED,
};
use apigate::store::sqlite::SqliteStore;
use apigate::store::{ConfigRepository as _, DynStore, Store as _, UserRepository as _};

use test_utils::spawn_app;

#[tokio::test]
async fn first_run_provisions_admin_and_secrets() {
    let app = spawn_app().await;
    let store = &app.context.store;

    let admin = store.users().get_by_username("admin").await.unwrap();
    assert_eq!(admin.role, "admin");
    assert_eq!(admin.id, 1);
    // The password is stored hashed, never in the clear.
    assert_ne!(admin.password, app.admin_password);
    assert!(admin.password.starts_with("$2"));

    for key in [
        CONFIG_KEY_JWT_SECRET,
        CONFIG_KEY_API_KEY_SECRET,
        CONFIG_KEY_DEFAULT_QUOTA_LIMIT,
        CONFIG_KEY_REGISTRATION_OPEN,
    ] {
        assert!(store.configs().get(key).await.is_ok(), "missing {key}");
    }

    let secret = store.configs().get(CONFIG_KEY_JWT_SECRET).await.unwrap();
    assert_eq!(secret.len(), 64);

    let flag = store
        .configs()
        .get(CONFIG_KEY_SYSTEM_INITIALIZED)
        .await
        .unwrap();
    assert_eq!(flag, "true");
}

#[tokio::test]
async fn provisioning_twice_is_a_no_op() {
    let sqlite = SqliteStore::open_in_memory().await.unwrap();
    sqlite.migrate().await.unwrap();
    let store: DynStore = Arc::new(sqlite);

    let first = apigate::bootstrap::provision(store.as_ref()).await.unwrap();
    assert!(first.is_some());

    let jwt_secret = store.configs().get(CONFIG_KEY_JWT_SECRET).await.unwrap();

    let second = apigate::bootstrap::provision(store.as_ref()).await.unwrap();
    assert!(second.is_none());

    assert_eq!(store.users().count().await.unwrap(), 1);
    assert_eq!(
        store.configs().get(CONFIG_KEY_JWT_SECRET).await.unwrap(),
        jwt_secret
    );
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let sqlite = SqliteStore::open_in_memory().await.unwrap();
    sqlite.migrate().await.unwrap();
    sqlite.migrate().await.unwrap();

    let store: DynStore = Arc::new(sqlite);
    assert_eq!(store.users().count().await.unwrap(), 0);
}
