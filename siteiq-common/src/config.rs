//! Service configuration loading
//!
//! Configuration values resolve in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing default config file is not an error: the service starts on
//! compiled defaults. A config file named explicitly (CLI or ENV) must exist.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming the TOML config file
pub const CONFIG_ENV_VAR: &str = "SITEIQ_CONFIG";

/// Environment variable naming the SQLite database file
pub const DATABASE_ENV_VAR: &str = "SITEIQ_DATABASE";

/// Default model version stamped on new runs
pub const DEFAULT_MODEL_VERSION: &str = "site-selection-iq-v1.0";

/// Complete service configuration (one TOML document)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub scoring: ScoringConfig,
    pub idempotency: IdempotencyConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address the HTTP listener binds to
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:5730".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database file; `None` means the platform data directory
    pub path: Option<PathBuf>,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_connections: 20,
        }
    }
}

/// Scoring pipeline tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Retries after the first attempt (total attempts = max_retries + 1)
    pub max_retries: u32,
    /// Base backoff in milliseconds, doubled per attempt
    pub retry_base_ms: u64,
    /// Rows per INSERT chunk inside the single result transaction
    pub batch_size: usize,
    /// Pipeline attempts allowed to execute concurrently
    pub worker_count: usize,
    pub model_version: String,
    /// Optional JSON file installed as the active global schema at startup
    pub global_schema_path: Option<PathBuf>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_base_ms: 2000,
            batch_size: 1000,
            worker_count: 4,
            model_version: DEFAULT_MODEL_VERSION.to_string(),
            global_schema_path: None,
        }
    }
}

impl ScoringConfig {
    pub fn retry_base(&self) -> Duration {
        Duration::from_millis(self.retry_base_ms)
    }
}

/// Longest accepted claim lifetime, ten years
pub const MAX_TTL_HOURS: i64 = 87_600;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdempotencyConfig {
    /// Lifetime of a claim before it becomes eligible for cleanup
    pub ttl_hours: i64,
    pub cleanup_interval_secs: u64,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            ttl_hours: 24,
            cleanup_interval_secs: 3600,
        }
    }
}

impl IdempotencyConfig {
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.ttl_hours)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `tracing` filter directive when RUST_LOG is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Parse a TOML document; absent sections and keys take defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ServiceConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.scoring.worker_count == 0 {
            return Err(Error::Config("scoring.worker_count must be at least 1".to_string()));
        }
        if self.scoring.batch_size == 0 {
            return Err(Error::Config("scoring.batch_size must be at least 1".to_string()));
        }
        if self.idempotency.ttl_hours <= 0 {
            return Err(Error::Config("idempotency.ttl_hours must be positive".to_string()));
        }
        if self.idempotency.ttl_hours > MAX_TTL_HOURS {
            return Err(Error::Config(format!(
                "idempotency.ttl_hours must be at most {}",
                MAX_TTL_HOURS
            )));
        }
        if self.database.max_connections == 0 {
            return Err(Error::Config("database.max_connections must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Load service configuration
///
/// Priority for the file location: `cli_path`, then `SITEIQ_CONFIG`, then the
/// platform config directory (`<config dir>/siteiq/siteiq.toml`). Only the
/// platform default may be absent.
pub fn load_config(cli_path: Option<&Path>) -> Result<ServiceConfig> {
    // Priority 1 and 2: explicit file
    let explicit = cli_path
        .map(Path::to_path_buf)
        .or_else(|| std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from));

    if let Some(path) = explicit {
        let content = std::fs::read_to_string(&path).map_err(|e| {
            Error::Config(format!("Read config file {} failed: {}", path.display(), e))
        })?;
        info!("Loaded configuration from {}", path.display());
        return ServiceConfig::from_toml_str(&content);
    }

    // Priority 3: platform default location
    if let Some(path) = default_config_path() {
        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            info!("Loaded configuration from {}", path.display());
            return ServiceConfig::from_toml_str(&content);
        }
    }

    // Priority 4: compiled defaults
    warn!("No configuration file found, using compiled defaults");
    Ok(ServiceConfig::default())
}

/// Resolve the SQLite database path
///
/// Priority: CLI argument, `SITEIQ_DATABASE`, `database.path` from TOML,
/// platform data directory.
pub fn resolve_database_path(cli_arg: Option<&Path>, config: &ServiceConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(DATABASE_ENV_VAR) {
        return PathBuf::from(path);
    }

    if let Some(path) = &config.database.path {
        return path.clone();
    }

    default_data_dir().join("siteiq.db")
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("siteiq").join("siteiq.toml"))
}

/// Get OS-dependent default data folder
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("siteiq"))
        .unwrap_or_else(|| PathBuf::from("./siteiq_data"))
}
