//! `payroll.toml` settings.
//!
//! ```toml
//! [database]
//! backend = "sqlite"
//! connection_string = "payroll.db"
//!
//! [logging]
//! level = "info"
//! file = "payroll.log"
//!
//! [withholding]
//! inss_ceiling = 7786.02
//! irrf_dependent_deduction = 189.59
//! ```
//!
//! Every section and key is optional.

use std::path::{Path, PathBuf};

use payroll_core::calculations::WithholdingConfig;
use payroll_core::db::DbConfig;
use serde::Deserialize;
use thiserror::Error;

/// Read when `--config` is not given, if it exists.
pub const DEFAULT_CONFIG_FILE: &str = "payroll.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid [withholding] section: {0}")]
    Withholding(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    pub backend: String,
    pub connection_string: String,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            backend: "sqlite".to_string(),
            connection_string: "payroll.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Bare level or any `EnvFilter` directive; `RUST_LOG` wins over it.
    pub level: String,
    /// Log file opened in append mode.
    pub file: Option<PathBuf>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Plain numbers as written in TOML; converted by [`AppConfig::withholding`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WithholdingSection {
    pub inss_ceiling: f64,
    pub irrf_dependent_deduction: f64,
}

impl Default for WithholdingSection {
    fn default() -> Self {
        Self {
            inss_ceiling: 7786.02,
            irrf_dependent_deduction: 189.59,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseSection,
    pub logging: LoggingSection,
    pub withholding: WithholdingSection,
}

impl AppConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Loads `path`, or [`DEFAULT_CONFIG_FILE`] when it exists, or defaults.
    ///
    /// An explicit path that cannot be read is an error; a missing default
    /// file is not.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.is_file() {
                    return Ok(Self::default());
                }
                default
            }
        };
        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Applies command-line overrides on top of the file.
    pub fn with_overrides(
        mut self,
        backend: Option<String>,
        connection_string: Option<String>,
        log_level: Option<String>,
    ) -> Self {
        if let Some(backend) = backend {
            self.database.backend = backend;
        }
        if let Some(conn) = connection_string {
            self.database.connection_string = conn;
        }
        if let Some(level) = log_level {
            self.logging.level = level;
        }
        self
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.backend, self.database.connection_string.clone())
    }

    /// Statutory constants, rounded to cents.
    pub fn withholding(&self) -> Result<WithholdingConfig, ConfigError> {
        let section = &self.withholding;
        let config =
            WithholdingConfig::from_f64(section.inss_ceiling, section.irrf_dependent_deduction)
                .ok_or_else(|| {
                    ConfigError::Withholding("values must be finite numbers".to_string())
                })?;
        config
            .validate()
            .map_err(|e| ConfigError::Withholding(e.to_string()))?;
        Ok(config)
    }
}
