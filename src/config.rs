//! Configuration management for taskdeck.
//!
//! Configuration can be set via environment variables:
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `3000`.
//! - `DATA_DIR` - Optional. Directory for the sqlite database. Defaults to `./data`.
//! - `TASK_STORE` - Optional. Storage backend, `sqlite` (default) or `memory`.
//! - `DASHBOARD_PASSWORD` - Password for the login form. Required unless `DEV_MODE=true`.
//! - `JWT_SECRET` - Secret for signing login tokens. Required unless `DEV_MODE=true`.
//! - `JWT_TTL_DAYS` - Optional. Login token lifetime. Defaults to `30`.
//! - `DEV_MODE` - Optional. `true` disables the auth gate entirely. Defaults to `false`.

use crate::store::TaskStoreKind;
use rand::distributions::{Alphanumeric, DistString};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Authentication settings.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Password for the login form (single-tenant).
    pub dashboard_password: Option<String>,

    /// Secret for signing the session login token.
    pub jwt_secret: Option<String>,

    /// Login token lifetime in days.
    pub jwt_ttl_days: i64,
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Directory for persistent data (sqlite database)
    pub data_dir: PathBuf,

    /// Which task store backend to use
    pub store_kind: TaskStoreKind,

    /// Authentication settings
    pub auth: AuthConfig,

    /// When true, every request counts as authenticated (local development)
    pub dev_mode: bool,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` when auth is enabled (`DEV_MODE`
    /// unset or false) but `DASHBOARD_PASSWORD` or `JWT_SECRET` is not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|e| ConfigError::InvalidValue("PORT".to_string(), format!("{}", e)))?;

        let data_dir = std::env::var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));

        let store_kind = std::env::var("TASK_STORE")
            .map(|v| TaskStoreKind::parse(&v))
            .unwrap_or_default();

        let dev_mode = std::env::var("DEV_MODE")
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let dashboard_password = std::env::var("DASHBOARD_PASSWORD").ok();
        if dashboard_password.is_none() && !dev_mode {
            return Err(ConfigError::MissingEnvVar("DASHBOARD_PASSWORD".to_string()));
        }

        // In dev mode an ephemeral secret is fine; logins simply don't
        // survive a restart.
        let jwt_secret = std::env::var("JWT_SECRET")
            .ok()
            .or_else(|| dev_mode.then(|| Alphanumeric.sample_string(&mut rand::thread_rng(), 48)));
        if jwt_secret.is_none() {
            return Err(ConfigError::MissingEnvVar("JWT_SECRET".to_string()));
        }

        let jwt_ttl_days = std::env::var("JWT_TTL_DAYS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .map_err(|e| ConfigError::InvalidValue("JWT_TTL_DAYS".to_string(), format!("{}", e)))?;

        Ok(Self {
            host,
            port,
            data_dir,
            store_kind,
            auth: AuthConfig {
                dashboard_password,
                jwt_secret,
                jwt_ttl_days,
            },
            dev_mode,
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn for_testing(password: &str, jwt_secret: &str) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            data_dir: PathBuf::from("."),
            store_kind: TaskStoreKind::Memory,
            auth: AuthConfig {
                dashboard_password: Some(password.to_string()),
                jwt_secret: Some(jwt_secret.to_string()),
                jwt_ttl_days: 1,
            },
            dev_mode: false,
        }
    }
}
