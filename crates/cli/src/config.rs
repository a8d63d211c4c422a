//! Environment configuration for the `stepwise` binary
//!
//! Values come from the environment and can be overridden by command line
//! flags before validation.

use std::env;
use std::path::PathBuf;

use stepwise_migrator::{MigratorConfig, StepMode, DEFAULT_HISTORY_TABLE, DEFAULT_MIGRATIONS_DIR};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}")]
    MissingEnvVar { var: String },

    #[error("Invalid value for {field}: '{value}', expected {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },

    #[error("Validation failed for {field}: {reason}")]
    ValidationFailed { field: String, reason: String },
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(ConfigError::InvalidValue {
                field: "log_format".to_string(),
                value: s.to_string(),
                expected: "compact, pretty, or json".to_string(),
            }),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl LoggingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let level = get_env_or_default("LOG_LEVEL", "info");
        let format = get_env_or_default("LOG_FORMAT", "compact").parse()?;

        let config = LoggingConfig { level, format };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "log_level".to_string(),
                value: self.level.clone(),
                expected: "trace, debug, info, warn, or error".to_string(),
            });
        }
        Ok(())
    }
}

/// Settings for one `stepwise` invocation
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub migrations_path: PathBuf,
    pub history_table: String,
    pub step_mode: StepMode,
}

impl AppConfig {
    /// Load from the environment; `database_url` falls back to the override
    pub fn from_env(database_url: Option<String>) -> Result<Self, ConfigError> {
        let database_url = match database_url {
            Some(url) => url,
            None => get_env_required("DATABASE_URL")?,
        };

        Ok(AppConfig {
            database_url,
            migrations_path: PathBuf::from(get_env_or_default("MIGRATIONS_PATH", DEFAULT_MIGRATIONS_DIR)),
            history_table: get_env_or_default("MIGRATIONS_TABLE", DEFAULT_HISTORY_TABLE),
            step_mode: StepMode::default(),
        })
    }

    /// Apply command line overrides
    pub fn with_overrides(mut self, path: Option<PathBuf>, table: Option<String>) -> Self {
        if let Some(path) = path {
            self.migrations_path = path;
        }
        if let Some(table) = table.filter(|t| !t.is_empty()) {
            self.history_table = table;
        }
        self
    }

    /// Wrap each script and its ledger row in one transaction
    pub fn transactional(mut self, enabled: bool) -> Self {
        if enabled {
            self.step_mode = StepMode::Transactional;
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = url::Url::parse(&self.database_url).map_err(|e| ConfigError::ValidationFailed {
            field: "database_url".to_string(),
            reason: e.to_string(),
        })?;

        if url.scheme() != "postgres" && url.scheme() != "postgresql" {
            return Err(ConfigError::InvalidValue {
                field: "database_url".to_string(),
                value: self.masked_database_url(),
                expected: "a postgres:// or postgresql:// URL".to_string(),
            });
        }

        self.migrator_config()
            .validate()
            .map_err(|e| ConfigError::ValidationFailed {
                field: "history_table".to_string(),
                reason: e.to_string(),
            })
    }

    pub fn migrator_config(&self) -> MigratorConfig {
        MigratorConfig::new(&self.migrations_path)
            .with_history_table(self.history_table.clone())
            .with_step_mode(self.step_mode)
    }

    /// Database URL with the password replaced, for display
    pub fn masked_database_url(&self) -> String {
        url::Url::parse(&self.database_url)
            .map(|mut url| {
                if url.password().is_some() {
                    let _ = url.set_password(Some("***"));
                }
                url.to_string()
            })
            .unwrap_or_else(|_| "<invalid url>".to_string())
    }
}

fn get_env_required(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingEnvVar {
        var: key.to_string(),
    })
}

fn get_env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
