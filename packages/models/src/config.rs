//! Tunable pipeline parameters, loadable from a TOML file.
//!
//! ```toml
//! batch_size = 1000
//! buffer_meters = 100.0
//! split_chunk_size = 5000
//! ```
//!
//! Every key is optional and falls back to its default.

use serde::{Deserialize, Serialize};

/// Records parsed per flattening batch.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Distance restricted-area polygons are expanded by before matching.
pub const DEFAULT_BUFFER_METERS: f64 = 100.0;

/// Rows per file when a city extract is written in parts.
pub const DEFAULT_SPLIT_CHUNK_SIZE: usize = 5000;

/// Pipeline parameters shared by every stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of raw records parsed and flattened at a time.
    pub batch_size: usize,
    /// Buffer distance for restricted-area polygons, in meters.
    pub buffer_meters: f64,
    /// Rows per part when splitting a city extract.
    pub split_chunk_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            buffer_meters: DEFAULT_BUFFER_METERS,
            split_chunk_size: DEFAULT_SPLIT_CHUNK_SIZE,
        }
    }
}

/// Errors raised while loading a [`PipelineConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The TOML text could not be deserialized.
    #[error("Invalid config: {0}")]
    Toml(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("Invalid config value for {key}: {message}")]
    Invalid {
        /// Offending key.
        key: &'static str,
        /// Why the value was rejected.
        message: String,
    },
}

impl PipelineConfig {
    /// Parses a config from TOML text and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the text is not valid TOML for this
    /// schema or a value is out of range.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::de::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a zero batch or chunk size, or a
    /// negative or non-finite buffer distance.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid {
                key: "batch_size",
                message: "must be at least 1".to_string(),
            });
        }
        if self.split_chunk_size == 0 {
            return Err(ConfigError::Invalid {
                key: "split_chunk_size",
                message: "must be at least 1".to_string(),
            });
        }
        if !self.buffer_meters.is_finite() || self.buffer_meters < 0.0 {
            return Err(ConfigError::Invalid {
                key: "buffer_meters",
                message: format!("must be a non-negative distance, got {}", self.buffer_meters),
            });
        }
        Ok(())
    }
}
