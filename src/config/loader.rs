//! Configuration Loader
//!
//! Environment-aware configuration loading on top of the `config` crate.
//! Handles file discovery, environment detection and environment-variable
//! overrides.

use super::{ShiptrackConfig, WorkerSettings};
use crate::error::Result;
use config::{Config, Environment, File, FileFormat};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const ENV_PREFIX: &str = "SHIPTRACK";
const ENV_SEPARATOR: &str = "__";

pub struct ConfigManager {
    config: ShiptrackConfig,
    environment: String,
    config_directory: PathBuf,
}

impl std::fmt::Debug for ConfigManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigManager")
            .field("environment", &self.environment)
            .field("config_directory", &self.config_directory)
            .field("database_url", &redact_database_url(&self.config.database.url))
            .field("worker", &self.config.worker)
            .finish()
    }
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> Result<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> Result<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment,
    /// reading overrides from the process environment
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> Result<Arc<ConfigManager>> {
        Self::load_with_overrides(config_dir, environment, None)
    }

    /// Load configuration with an explicit set of environment variables instead
    /// of the process environment. `None` reads the process environment.
    pub fn load_with_overrides(
        config_dir: Option<PathBuf>,
        environment: &str,
        vars: Option<HashMap<String, String>>,
    ) -> Result<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);

        debug!(
            "Loading configuration for environment '{}' from directory: {}",
            environment,
            config_directory.display()
        );

        let database_url = match &vars {
            Some(vars) => vars.get("DATABASE_URL").cloned(),
            None => env::var("DATABASE_URL").ok(),
        };

        let settings = Config::builder()
            .add_source(Self::file_source(&config_directory.join("shiptrack.toml")))
            .add_source(Self::file_source(
                &config_directory.join(format!("shiptrack.{environment}.toml")),
            ))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true)
                    .source(vars),
            )
            .build()?;

        let mut config: ShiptrackConfig = settings.try_deserialize()?;
        if let Some(url) = database_url {
            config.database.url = url;
        }

        info!(
            environment = environment,
            database_url = %redact_database_url(&config.database.url),
            interval_ms = config.worker.interval_ms,
            batch_size = config.worker.batch_size,
            concurrency = config.worker.concurrency,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &ShiptrackConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Normalized worker settings
    pub fn worker_settings(&self) -> WorkerSettings {
        self.config.worker.normalized()
    }

    /// Current environment from `SHIPTRACK_ENV`, then `APP_ENV`
    pub fn detect_environment() -> String {
        env::var("SHIPTRACK_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
    }

    fn default_config_directory() -> PathBuf {
        env::var("SHIPTRACK_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"))
    }

    fn file_source(path: &Path) -> File<config::FileSourceFile, FileFormat> {
        File::from(path).format(FileFormat::Toml).required(false)
    }
}

/// Mask the password component of a connection URL for logging.
pub fn redact_database_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let Some((credentials, host)) = rest.rsplit_once('@') else {
        return url.to_string();
    };
    match credentials.split_once(':') {
        Some((user, _password)) => format!("{scheme}://{user}:****@{host}"),
        None => url.to_string(),
    }
}
