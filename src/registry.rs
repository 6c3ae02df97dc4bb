//! In-memory service registry.
//!
//! Binds named handlers to persisted service definitions. The store
//! is the source of truth for policy knobs: when a definition already
//! exists for a name, registration adopts the stored values and the
//! in-process config is ignored. The hot path (`get`) only takes the
//! read lock.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::{bail, Context};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::auth::Principal;
use crate::models::{ServiceDefinition, ServiceSpec, SERVICE_STATUS_ENABLED};
use crate::store::{DynStore, ServiceRepository as _, Store as _, StoreError};

/// Request context handed to a service handler. Handlers must be
/// free of hidden global state; everything they may consult is here.
#[derive(Debug, Clone)]
pub struct ServiceRequest {
    pub body: serde_json::Value,
    pub principal: Option<Principal>,
}

/// Handler fault attributable to the caller's input; mapped to the
/// invalid-parameters envelope.
#[derive(Error, Debug)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

pub type HandlerResult = Result<serde_json::Value, HandlerError>;
pub type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;
pub type ServiceHandler = Arc<dyn Fn(ServiceRequest) -> HandlerFuture + Send + Sync>;

/// In-memory composite of a persisted definition and its handler.
#[derive(Clone)]
pub struct RegisteredService {
    pub definition: ServiceDefinition,
    pub handler: ServiceHandler,
}

pub struct ServiceRegistry {
    services: RwLock<HashMap<String, RegisteredService>>,
    store: DynStore,
}

impl ServiceRegistry {
    pub fn new(store: DynStore) -> Self {
        Self {
            services: RwLock::new(HashMap::new()),
            store,
        }
    }

    /// Registers a handler under `name`.
    ///
    /// A duplicate in-memory name is a programmer error and fails
    /// startup. A missing catalog entry is created from `spec`; an
    /// existing entry wins over `spec` wholesale.
    pub async fn register(
        &self,
        name: &str,
        handler: ServiceHandler,
        spec: ServiceSpec,
    ) -> anyhow::Result<()> {
        let mut services = self.services.write().await;

        if services.contains_key(name) {
            bail!("service {name} is already registered");
        }

        let definition = match self.store.services().get_by_name(name).await {
            Ok(existing) => existing,
            Err(StoreError::NotFound) => {
                let mut definition = ServiceDefinition {
                    id: 0,
                    service_name: name.to_string(),
                    description: spec.description,
                    default_limit: spec.default_limit,
                    status: SERVICE_STATUS_ENABLED,
                    allow_anonymous: spec.allow_anonymous,
                    rate_limit: spec.rate_limit,
                    quota_cost: spec.quota_cost,
                    created_at: chrono::Utc::now(),
                    updated_at: chrono::Utc::now(),
                };
                self.store
                    .services()
                    .create(&mut definition)
                    .await
                    .with_context(|| format!("failed to persist definition for {name}"))?;
                definition
            }
            Err(other) => {
                return Err(other).with_context(|| format!("failed to look up service {name}"))
            }
        };

        tracing::info!(
            service = name,
            rate_limit = definition.rate_limit,
            quota_cost = definition.quota_cost,
            allow_anonymous = definition.allow_anonymous,
            "service registered"
        );

        services.insert(
            name.to_string(),
            RegisteredService {
                definition,
                handler,
            },
        );

        Ok(())
    }

    pub async fn get(&self, name: &str) -> Option<RegisteredService> {
        self.services.read().await.get(name).cloned()
    }

    /// Swaps the in-memory definition for an already-registered
    /// service, after an administrative catalog edit. The handler
    /// binding is untouched. Returns false for names that were never
    /// registered in this process.
    pub async fn refresh(&self, definition: ServiceDefinition) -> bool {
        let mut services = self.services.write().await;
        match services.get_mut(&definition.service_name) {
            Some(registered) => {
                registered.definition = definition;
                true
            }
            None => false,
        }
    }

    pub async fn list(&self) -> Vec<RegisteredService> {
        self.services.read().await.values().cloned().collect()
    }

    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.services.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn count(&self) -> usize {
        self.services.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::sqlite::SqliteStore;
    use crate::store::{ServiceRepository, Store};

    async fn test_store() -> DynStore {
        let store = SqliteStore::open_in_memory().await.unwrap();
        store.migrate().await.unwrap();
        Arc::new(store)
    }

    fn noop_handler() -> ServiceHandler {
        Arc::new(|_req| Box::pin(async { Ok(serde_json::Value::Null) }))
    }

    #[tokio::test]
    async fn first_registration_persists_the_definition() {
        let store = test_store().await;
        let registry = ServiceRegistry::new(store.clone());

        registry
            .register(
                "fresh",
                noop_handler(),
                ServiceSpec {
                    description: "new service".to_string(),
                    rate_limit: 10,
                    quota_cost: 2,
                    ..ServiceSpec::default()
                },
            )
            .await
            .unwrap();

        let stored = store.services().get_by_name("fresh").await.unwrap();
        assert_eq!(stored.rate_limit, 10);
        assert_eq!(stored.quota_cost, 2);
        assert!(stored.is_enabled());
        assert_eq!(registry.count().await, 1);
    }

    #[tokio::test]
    async fn stored_definition_wins_over_registration_config() {
        let store = test_store().await;

        let mut existing = ServiceDefinition {
            id: 0,
            service_name: "tuned".to_string(),
            description: "tuned by an operator".to_string(),
            default_limit: 5,
            status: SERVICE_STATUS_ENABLED,
            allow_anonymous: false,
            rate_limit: 3,
            quota_cost: 7,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        store.services().create(&mut existing).await.unwrap();

        let registry = ServiceRegistry::new(store);
        registry
            .register(
                "tuned",
                noop_handler(),
                ServiceSpec {
                    rate_limit: 1000,
                    quota_cost: 0,
                    allow_anonymous: true,
                    ..ServiceSpec::default()
                },
            )
            .await
            .unwrap();

        let registered = registry.get("tuned").await.unwrap();
        assert_eq!(registered.definition.rate_limit, 3);
        assert_eq!(registered.definition.quota_cost, 7);
        assert!(!registered.definition.allow_anonymous);
    }

    #[tokio::test]
    async fn duplicate_name_is_rejected() {
        let registry = ServiceRegistry::new(test_store().await);

        registry
            .register("once", noop_handler(), ServiceSpec::default())
            .await
            .unwrap();
        let err = registry
            .register("once", noop_handler(), ServiceSpec::default())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("already registered"));
        assert_eq!(registry.count().await, 1);
    }

    #[tokio::test]
    async fn refresh_swaps_the_definition_in_place() {
        let store = test_store().await;
        let registry = ServiceRegistry::new(store.clone());

        registry
            .register("live", noop_handler(), ServiceSpec::default())
            .await
            .unwrap();

        let mut definition = store.services().get_by_name("live").await.unwrap();
        definition.rate_limit = 1;
        assert!(registry.refresh(definition).await);

        assert_eq!(registry.get("live").await.unwrap().definition.rate_limit, 1);

        let mut ghost = store.services().get_by_name("live").await.unwrap();
        ghost.service_name = "never-registered".to_string();
        assert!(!registry.refresh(ghost).await);
    }

    #[tokio::test]
    async fn names_are_sorted() {
        let registry = ServiceRegistry::new(test_store().await);

        for name in ["zeta", "alpha", "mid"] {
            registry
                .register(name, noop_handler(), ServiceSpec::default())
                .await
                .unwrap();
        }

        assert_eq!(registry.names().await, vec!["alpha", "mid", "zeta"]);
    }
}
