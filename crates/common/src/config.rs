//! Application configuration.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Largest number of deletes committed in one purge batch.
pub const MAX_PURGE_BATCH_SIZE: u64 = 500;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Blob storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Identity and account configuration.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Transaction runner configuration.
    #[serde(default)]
    pub transactions: TransactionConfig,
    /// Scheduled job configuration.
    #[serde(default)]
    pub jobs: JobsConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public URL of this instance, used in outgoing mail links.
    pub url: String,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Connection URL (`postgres://...` or `sqlite:...`).
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Blob storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory blobs are written under.
    #[serde(default = "default_storage_path")]
    pub base_path: PathBuf,
    /// URL prefix blobs are served from.
    #[serde(default = "default_storage_url")]
    pub base_url: String,
}

/// Identity and account configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Profile picture assigned at registration.
    #[serde(default = "default_photo_url")]
    pub default_photo_url: String,
    /// Lifetime of a password reset code.
    #[serde(default = "default_reset_code_ttl")]
    pub reset_code_ttl_minutes: i64,
}

/// Transaction runner configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionConfig {
    /// Attempts before a conflicting transaction is reported as transient failure.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

/// Scheduled job configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct JobsConfig {
    /// Interval between read-notification purges, in seconds.
    #[serde(default = "default_purge_interval")]
    pub purge_interval_secs: u64,
    /// Notifications deleted per atomic batch (capped at [`MAX_PURGE_BATCH_SIZE`]).
    #[serde(default = "default_purge_batch_size")]
    pub purge_batch_size: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_max_connections() -> u32 {
    100
}

const fn default_min_connections() -> u32 {
    5
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("./files")
}

fn default_storage_url() -> String {
    "/files".to_string()
}

fn default_photo_url() -> String {
    "/files/shared/profile_default.png".to_string()
}

const fn default_reset_code_ttl() -> i64 {
    60
}

const fn default_max_attempts() -> u32 {
    5
}

const fn default_purge_interval() -> u64 {
    7 * 24 * 60 * 60
}

const fn default_purge_batch_size() -> u64 {
    MAX_PURGE_BATCH_SIZE
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_path: default_storage_path(),
            base_url: default_storage_url(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            default_photo_url: default_photo_url(),
            reset_code_ttl_minutes: default_reset_code_ttl(),
        }
    }
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
        }
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            purge_interval_secs: default_purge_interval(),
            purge_batch_size: default_purge_batch_size(),
        }
    }
}

impl JobsConfig {
    /// Effective purge batch size, never above [`MAX_PURGE_BATCH_SIZE`] and never zero.
    #[must_use]
    pub fn effective_batch_size(&self) -> u64 {
        self.purge_batch_size.clamp(1, MAX_PURGE_BATCH_SIZE)
    }
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `COMPANION_ENV`)
    /// 3. Environment variables with `COMPANION_` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let env = std::env::var("COMPANION_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("COMPANION")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("COMPANION")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Address the HTTP server binds to.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
