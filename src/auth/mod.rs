//! Authentication subsystem: signed bearer tokens, encrypted machine
//! keys, the revocation cache and the permission matrix, wired
//! together behind [`AuthServices`].

pub mod api_keys;
pub mod crypto;
pub mod permission;
pub mod revocation;
pub mod tokens;

use std::sync::Arc;
use std::time::Duration;

use crate::store::DynStore;

pub use api_keys::ApiKeyService;
pub use crypto::DeterministicCipher;
pub use revocation::RevocationCache;
pub use tokens::{Claims, TokenConfig, TokenService};

/// Authenticated caller identity attached to an in-flight request.
#[derive(Debug, Clone)]
pub enum Principal {
    /// Interactive operator carrying verified token claims.
    Operator(Claims),
    /// Programmatic caller authenticated by machine key.
    MachineKey { key_id: i64, user_id: i64 },
}

impl Principal {
    pub fn user_id(&self) -> i64 {
        match self {
            Principal::Operator(claims) => claims.user_id,
            Principal::MachineKey { user_id, .. } => *user_id,
        }
    }

    pub fn api_key_id(&self) -> i64 {
        match self {
            Principal::Operator(_) => 0,
            Principal::MachineKey { key_id, .. } => *key_id,
        }
    }

    pub fn role(&self) -> Option<&str> {
        match self {
            Principal::Operator(claims) => Some(&claims.role),
            Principal::MachineKey { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub token: TokenConfig,
    /// Secret feeding the deterministic machine-key cipher KDF.
    pub api_key_secret: String,
    /// Cadence of the revocation-cache sweeper.
    pub cache_cleanup_interval: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token: TokenConfig::default(),
            api_key_secret: "change-me-in-production".to_string(),
            cache_cleanup_interval: Duration::from_secs(600),
        }
    }
}

/// Bundle of the authentication services a gateway instance needs.
pub struct AuthServices {
    pub tokens: TokenService,
    pub api_keys: ApiKeyService,
    pub revocations: RevocationCache,
}

impl AuthServices {
    pub fn new(config: AuthConfig, store: DynStore) -> anyhow::Result<Arc<Self>> {
        let revocations = RevocationCache::new();
        revocations.spawn_sweeper(config.cache_cleanup_interval);

        let tokens = TokenService::new(config.token, revocations.clone())?;
        let cipher = DeterministicCipher::new(&config.api_key_secret);
        let api_keys = ApiKeyService::new(store, cipher);

        Ok(Arc::new(Self {
            tokens,
            api_keys,
            revocations,
        }))
    }
}
