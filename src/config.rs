use std::path::PathBuf;

use anyhow::Result;

// Defaults applied when the environment does not say otherwise.
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DB_PATH: &str = "apigate.db";
const DEFAULT_ISSUER: &str = "apigate";
const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;
const DEFAULT_RATE_LIMIT_PER_MINUTE: i64 = 60;
const DEFAULT_RATE_SWEEP_INTERVAL_SECS: u64 = 300;
const DEFAULT_RATE_MAX_AGE_SECS: u64 = 1800;
const DEFAULT_CACHE_CLEANUP_INTERVAL_SECS: u64 = 600;

/// Process configuration, loaded from the environment. Secrets that
/// are absent here are read from (or provisioned into) the config
/// rows of the store at bootstrap.
#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: PathBuf,

    pub jwt_issuer: String,
    pub access_expiry_hours: i64,
    /// PEM material; when either half is missing a key pair is
    /// generated for this process.
    pub jwt_private_key: Option<String>,
    pub jwt_public_key: Option<String>,

    /// Overrides the persisted `api_key_secret` row when set.
    pub api_key_secret: Option<String>,

    pub default_rate_limit: i64,
    pub rate_sweep_interval_secs: u64,
    pub rate_max_age_secs: u64,
    pub cache_cleanup_interval_secs: u64,

    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            database_path: PathBuf::from(DEFAULT_DB_PATH),
            jwt_issuer: DEFAULT_ISSUER.to_string(),
            access_expiry_hours: DEFAULT_TOKEN_TTL_HOURS,
            jwt_private_key: None,
            jwt_public_key: None,
            api_key_secret: None,
            default_rate_limit: DEFAULT_RATE_LIMIT_PER_MINUTE,
            rate_sweep_interval_secs: DEFAULT_RATE_SWEEP_INTERVAL_SECS,
            rate_max_age_secs: DEFAULT_RATE_MAX_AGE_SECS,
            cache_cleanup_interval_secs: DEFAULT_CACHE_CLEANUP_INTERVAL_SECS,
            log_json: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        if let Ok(host) = std::env::var("APIGATE_HOST") {
            config.host = host;
        }
        if let Ok(port) = std::env::var("APIGATE_PORT") {
            config.port = port.parse()?;
        }
        if let Ok(path) = std::env::var("APIGATE_DB_PATH") {
            config.database_path = PathBuf::from(path);
        }
        if let Ok(issuer) = std::env::var("APIGATE_JWT_ISSUER") {
            config.jwt_issuer = issuer;
        }
        if let Ok(hours) = std::env::var("APIGATE_TOKEN_TTL_HOURS") {
            config.access_expiry_hours = hours.parse()?;
        }
        config.jwt_private_key = std::env::var("APIGATE_JWT_PRIVATE_KEY").ok();
        config.jwt_public_key = std::env::var("APIGATE_JWT_PUBLIC_KEY").ok();
        config.api_key_secret = std::env::var("APIGATE_API_KEY_SECRET").ok();
        if let Ok(limit) = std::env::var("APIGATE_DEFAULT_RATE_LIMIT") {
            config.default_rate_limit = limit.parse()?;
        }
        if let Ok(secs) = std::env::var("APIGATE_RATE_SWEEP_INTERVAL_SECS") {
            config.rate_sweep_interval_secs = secs.parse()?;
        }
        if let Ok(secs) = std::env::var("APIGATE_RATE_MAX_AGE_SECS") {
            config.rate_max_age_secs = secs.parse()?;
        }
        if let Ok(secs) = std::env::var("APIGATE_CACHE_CLEANUP_INTERVAL_SECS") {
            config.cache_cleanup_interval_secs = secs.parse()?;
        }
        config.log_json = std::env::var("APIGATE_LOG_JSON")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(config)
    }
}
