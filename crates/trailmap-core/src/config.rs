//! File-based configuration.
//!
//! ```toml
//! [storage]
//! path = "/home/me/.local/share/trailmap/locations.db3"
//! busy_timeout_ms = 5000
//!
//! [session]
//! marker_radius_m = 200.0
//! clear_on_start = true
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use trailmap_store::{LocationStore, StoreOptions};

use crate::session::SessionOptions;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage settings.
    pub storage: StorageConfig,
    /// Session settings.
    pub session: SessionOptions,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Save configuration to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration and return every problem found.
    ///
    /// This checks:
    /// - Storage path is not empty
    /// - Channel capacities are non-zero
    /// - Radii are positive and finite
    ///
    /// # Example
    ///
    /// ```
    /// use trailmap_core::Config;
    ///
    /// let config = Config::default();
    /// config.validate().expect("Default config should be valid");
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        errors.extend(self.storage.validate());
        errors.extend(validate_session(&self.session, "session"));

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Load and validate configuration from a file.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }
}

/// Storage configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file path.
    pub path: PathBuf,
    /// How long a write waits on another connection's lock, in milliseconds.
    pub busy_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: trailmap_store::default_db_path(),
            busy_timeout_ms: trailmap_store::DEFAULT_BUSY_TIMEOUT.as_millis() as u64,
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.path.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "storage.path".to_string(),
                message: "database path cannot be empty".to_string(),
            });
        }

        errors
    }

    /// Connection options derived from this configuration.
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
        }
    }

    /// Open the configured store.
    pub fn open_store(&self) -> trailmap_store::Result<LocationStore> {
        LocationStore::open_with_options(&self.path, &self.store_options())
    }
}

/// Collect validation errors for session options, with fields under `prefix`.
pub(crate) fn validate_session(options: &SessionOptions, prefix: &str) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if options.buffer_size == 0 {
        errors.push(ValidationError {
            field: format!("{}.buffer_size", prefix),
            message: "buffer_size must be > 0".to_string(),
        });
    }

    if options.event_capacity == 0 {
        errors.push(ValidationError {
            field: format!("{}.event_capacity", prefix),
            message: "event_capacity must be > 0".to_string(),
        });
    }

    for (name, value) in [
        ("marker_radius_m", options.marker_radius_m),
        ("follow_radius_m", options.follow_radius_m),
        ("overview_radius_m", options.overview_radius_m),
    ] {
        if !value.is_finite() || value <= 0.0 {
            errors.push(ValidationError {
                field: format!("{}.{}", prefix, name),
                message: format!("radius {} must be a positive number of meters", value),
            });
        }
    }

    errors
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid configuration:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The field path (e.g., `storage.path` or `session.buffer_size`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("trailmap")
        .join("trailmap.toml")
}
