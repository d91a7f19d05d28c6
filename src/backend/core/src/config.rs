//! Configuration management.
//!
//! Values come from an optional file plus `ACCESSGATE__*` environment
//! variables, e.g. `ACCESSGATE__CACHE__STALENESS=90s`.

use serde::Deserialize;
use std::time::Duration;

use crate::access::{AccessLevel, Page, PageCatalog};
use crate::telemetry::TelemetryConfig;

const ENV_PREFIX: &str = "ACCESSGATE";
const ENV_SEPARATOR: &str = "__";

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub access: AccessConfig,

    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_acquire_timeout", with = "humantime_serde")]
    pub acquire_timeout: Duration,

    /// Apply embedded migrations on startup
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            acquire_timeout: default_acquire_timeout(),
            run_migrations: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// How long fetched roles, grants and rules are trusted before refetching.
    #[serde(default = "default_staleness", with = "humantime_serde")]
    pub staleness: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            staleness: default_staleness(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccessConfig {
    /// Attempts per bulk commit, including the first.
    #[serde(default = "default_commit_max_attempts")]
    pub commit_max_attempts: u32,

    /// Delay before the first retry. Doubles on each further attempt.
    #[serde(default = "default_commit_retry_backoff", with = "humantime_serde")]
    pub commit_retry_backoff: Duration,

    #[serde(default = "default_login_path")]
    pub login_path: String,

    #[serde(default = "default_unauthorized_path")]
    pub unauthorized_path: String,

    /// Level written by "create all" for missing pairs.
    #[serde(default)]
    pub materialize_level: AccessLevel,

    /// Page whose `read` level unlocks the management configuration view.
    #[serde(default = "default_management_page")]
    pub management_page: String,

    /// `resource:action` required for management writes.
    #[serde(default = "default_manage_permission")]
    pub manage_permission: String,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            commit_max_attempts: default_commit_max_attempts(),
            commit_retry_backoff: default_commit_retry_backoff(),
            login_path: default_login_path(),
            unauthorized_path: default_unauthorized_path(),
            materialize_level: AccessLevel::None,
            management_page: default_management_page(),
            manage_permission: default_manage_permission(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogConfig {
    /// Pages known to the application. Empty means the built-in catalog.
    #[serde(default)]
    pub pages: Vec<Page>,
}

impl CatalogConfig {
    pub fn build(&self) -> PageCatalog {
        if self.pages.is_empty() {
            PageCatalog::business_default()
        } else {
            PageCatalog::new(self.pages.clone())
        }
    }
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_database_url() -> String { "postgres://localhost:5432/accessgate".to_string() }
fn default_max_connections() -> u32 { 20 }
fn default_min_connections() -> u32 { 2 }
fn default_acquire_timeout() -> Duration { Duration::from_secs(5) }
fn default_true() -> bool { true }
fn default_staleness() -> Duration { Duration::from_secs(180) }
fn default_commit_max_attempts() -> u32 { 3 }
fn default_commit_retry_backoff() -> Duration { Duration::from_millis(200) }
fn default_login_path() -> String { "/login".to_string() }
fn default_unauthorized_path() -> String { "/unauthorized".to_string() }
fn default_management_page() -> String { "/settings/permissions".to_string() }
fn default_manage_permission() -> String { "permissions:manage".to_string() }

impl Config {
    /// Load configuration from the environment only.
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator(ENV_SEPARATOR))
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        Ok(cfg)
    }

    /// Load from a file, with environment variables taking precedence.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator(ENV_SEPARATOR))
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        Ok(cfg)
    }
}
