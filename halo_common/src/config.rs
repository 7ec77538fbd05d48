//! TOML configuration loading.
//!
//! Every section struct derives `Deserialize` and gets [`ConfigLoader`] for
//! free. Loading only parses; range checks live in each section's
//! `validate()` so a caller can report every problem against the file it
//! came from.
//!
//! ```rust,no_run
//! use halo_common::config::{ConfigError, ConfigLoader};
//! use halo_common::control_unit::config::ControllerConfig;
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = ControllerConfig::load(Path::new("halo.toml"))?;
//!     config.validate()?;
//!     println!("{} on {}", config.shared.service_name, config.driver.name);
//!     Ok(())
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading or validation failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// No file at the given path.
    #[error("configuration file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// The file exists but could not be read.
    #[error("cannot read {}: {reason}", path.display())]
    ReadError {
        /// File that failed.
        path: PathBuf,
        /// OS error text.
        reason: String,
    },

    /// Invalid TOML, or a value of the wrong type.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// A value is out of range.
    #[error("configuration validation failed: {0}")]
    ValidationError(String),

    /// Zero encoder resolution or non-positive spool circumference.
    #[error("invalid spool geometry: {0}")]
    InvalidGeometry(String),
}

/// `[shared] log_level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

/// `[shared]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SharedConfig {
    /// Name attached to log output.
    pub service_name: String,
    /// Default log verbosity; `RUST_LOG` and `-v` override it.
    pub log_level: LogLevel,
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            service_name: "halo".to_string(),
            log_level: LogLevel::default(),
        }
    }
}

impl SharedConfig {
    /// `service_name` must not be blank.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "shared.service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// TOML loading for any deserializable config type.
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Read and parse `path`.
    ///
    /// # Errors
    /// `FileNotFound`, `ReadError` or `ParseError`.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::FileNotFound(path.to_path_buf()));
            }
            Err(e) => {
                return Err(ConfigError::ReadError {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                });
            }
        };
        Self::from_toml(&content)
    }

    /// Parse an in-memory TOML document.
    fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}
