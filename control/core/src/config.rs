//! TOML Configuration File Support
//!
//! Configuration lives at `$XDG_CONFIG_HOME/surface-control/config.toml`
//! (typically `~/.config/surface-control/config.toml`).
//!
//! # Configuration Priority
//!
//! Highest first:
//! 1. CLI arguments (applied by the caller)
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [parcel]
//! max_size_bytes = 1048576
//! initial_capacity = 256
//!
//! [log]
//! level = "debug"
//! ```
//!
//! # Environment Variables
//!
//! - `SURFACE_CONTROL_MAX_PARCEL_SIZE`: parcel size limit in bytes
//! - `SURFACE_CONTROL_LOG_LEVEL`: log level (trace, debug, info, warn, error)

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::parcel::{DEFAULT_INITIAL_CAPACITY, DEFAULT_MAX_PARCEL_SIZE};
use crate::protocol::NULLABLE_SURFACE_CONTROL_WIRE_SIZE;

/// Smallest parcel limit that still fits a present handle in the nullable form
pub const MIN_PARCEL_SIZE: usize = NULLABLE_SURFACE_CONTROL_WIRE_SIZE;

/// Environment variable overriding the parcel size limit
pub const ENV_MAX_PARCEL_SIZE: &str = "SURFACE_CONTROL_MAX_PARCEL_SIZE";

/// Environment variable overriding the log level
pub const ENV_LOG_LEVEL: &str = "SURFACE_CONTROL_LOG_LEVEL";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where the configuration came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Parcel section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParcelToml {
    /// Maximum parcel data size in bytes
    pub max_size_bytes: Option<usize>,

    /// Initial data capacity in bytes
    pub initial_capacity: Option<usize>,
}

/// Logging section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogToml {
    /// Log level (trace, debug, info, warn, error)
    pub level: Option<String>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceControlToml {
    /// Parcel configuration section
    pub parcel: ParcelToml,

    /// Logging configuration section
    pub log: LogToml,
}

// =============================================================================
// Runtime Configuration
// =============================================================================

/// Limits applied to new parcels
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParcelConfig {
    /// Maximum data size in bytes
    pub max_size_bytes: usize,
    /// Initial data capacity in bytes
    pub initial_capacity: usize,
}

impl Default for ParcelConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: DEFAULT_MAX_PARCEL_SIZE,
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
        }
    }
}

/// Resolved configuration
#[derive(Clone, Debug)]
pub struct SurfaceControlConfig {
    /// Parcel limits
    pub parcel: ParcelConfig,

    /// Log level
    pub log_level: String,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    source: ConfigSource,
}

impl Default for SurfaceControlConfig {
    fn default() -> Self {
        Self {
            parcel: ParcelConfig::default(),
            log_level: "info".to_string(),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl SurfaceControlConfig {
    /// Get the source of the most specific value applied
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Check the limits are usable
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if the parcel limit is too small
    /// or below the initial capacity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.parcel.max_size_bytes < MIN_PARCEL_SIZE {
            return Err(ConfigError::ValidationError(format!(
                "parcel.max_size_bytes must be at least {MIN_PARCEL_SIZE}, got {}",
                self.parcel.max_size_bytes
            )));
        }
        if self.parcel.initial_capacity > self.parcel.max_size_bytes {
            return Err(ConfigError::ValidationError(format!(
                "parcel.initial_capacity ({}) exceeds parcel.max_size_bytes ({})",
                self.parcel.initial_capacity, self.parcel.max_size_bytes
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("surface-control").join("config.toml"))
}

/// Load configuration from the default path, environment and defaults
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or if
/// the resulting values are invalid. A missing file is not an error.
pub fn load_config() -> Result<SurfaceControlConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or if the resulting
/// values are invalid.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<SurfaceControlConfig, ConfigError> {
    let mut config = SurfaceControlConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: SurfaceControlToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config, |key| std::env::var(key).ok())?;
    config.validate()?;

    Ok(config)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut SurfaceControlConfig, toml: &SurfaceControlToml) {
    if let Some(max) = toml.parcel.max_size_bytes {
        config.parcel.max_size_bytes = max;
    }
    if let Some(capacity) = toml.parcel.initial_capacity {
        config.parcel.initial_capacity = capacity;
    }
    if let Some(ref level) = toml.log.level {
        config.log_level = level.clone();
    }
}

/// Apply environment overrides looked up through `lookup`
fn apply_env_config<F>(config: &mut SurfaceControlConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(ENV_MAX_PARCEL_SIZE) {
        let max = raw.trim().parse().map_err(|_| {
            ConfigError::ValidationError(format!("{ENV_MAX_PARCEL_SIZE} is not a size: {raw:?}"))
        })?;
        config.parcel.max_size_bytes = max;
        config.source = ConfigSource::Env;
    }
    if let Some(level) = lookup(ENV_LOG_LEVEL) {
        config.log_level = level;
        config.source = ConfigSource::Env;
    }
    Ok(())
}
