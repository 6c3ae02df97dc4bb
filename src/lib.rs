//! apigate: a lightweight unified API gateway.
//!
//! Exposes a curated catalog of in-process functional services behind
//! a uniform authentication, rate-limiting and quota-accounting
//! pipeline, plus an administrative dashboard surface.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod accounting;
pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod context;
pub mod error;
pub mod models;
pub mod quota;
pub mod rate_limit;
pub mod registry;
pub mod routes;
pub mod services;
pub mod store;
pub mod utils;

use accounting::Accounting;
use auth::{AuthConfig, AuthServices, TokenConfig};
use config::Config;
use context::AppContext;
use models::CONFIG_KEY_API_KEY_SECRET;
use quota::QuotaEngine;
use rate_limit::RateLimiter;
use registry::ServiceRegistry;
use store::sqlite::SqliteStore;
use store::{ConfigRepository as _, DynStore, Store as _};

/// A fully wired gateway, ready to serve or to drive in tests.
pub struct App {
    pub router: Router,
    pub context: Arc<AppContext>,
    /// Present only when this boot provisioned the default operator.
    pub admin_password: Option<String>,
}

/// Wires every subsystem against an already-migrated store.
pub async fn build_app(config: Config, store: DynStore) -> Result<App> {
    let admin_password = bootstrap::provision(store.as_ref()).await?;

    // Environment override wins over the persisted secret.
    let api_key_secret = match &config.api_key_secret {
        Some(secret) => secret.clone(),
        None => store
            .configs()
            .get(CONFIG_KEY_API_KEY_SECRET)
            .await
            .context("api_key_secret is missing from the store")?,
    };

    let auth = AuthServices::new(
        AuthConfig {
            token: TokenConfig {
                private_key_pem: config.jwt_private_key.clone(),
                public_key_pem: config.jwt_public_key.clone(),
                access_expiry_hours: config.access_expiry_hours,
                issuer: config.jwt_issuer.clone(),
            },
            api_key_secret,
            cache_cleanup_interval: Duration::from_secs(config.cache_cleanup_interval_secs),
        },
        store.clone(),
    )?;

    let registry = Arc::new(ServiceRegistry::new(store.clone()));
    services::register_builtin(&registry).await?;

    let rate_limiter = Arc::new(RateLimiter::new(config.default_rate_limit));
    rate_limit::spawn_sweeper(
        rate_limiter.clone(),
        Duration::from_secs(config.rate_sweep_interval_secs),
        Duration::from_secs(config.rate_max_age_secs),
    );

    let context = Arc::new(AppContext {
        store: store.clone(),
        auth,
        registry,
        rate_limiter,
        quotas: QuotaEngine::new(store.clone()),
        accounting: Accounting::new(store),
        config: Arc::new(config),
    });

    let router = routes::build_router(context.clone());

    Ok(App {
        router,
        context,
        admin_password,
    })
}

pub async fn run() -> Result<()> {
    let config = Config::from_env()?;
    init_tracing(config.log_json);

    let sqlite = SqliteStore::open(&config.database_path).await?;
    sqlite.migrate().await.context("schema migration failed")?;
    let store: DynStore = Arc::new(sqlite);

    let bind_address = format!("{}:{}", config.host, config.port);
    let app = build_app(config, store).await?;

    let listener = TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind {bind_address}"))?;
    tracing::info!("apigate listening on http://{bind_address}");

    axum::serve(
        listener,
        app.router
            .into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

fn init_tracing(log_json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "apigate=info,tower_http=warn".into()),
    );

    if log_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
