//! Engine configuration.
//!
//! Settings are organized into logical sections that map to TOML tables.
//! Every field has a serde default so a partial (or missing) file loads
//! cleanly; saves are atomic (temp file + rename).

mod settings;

pub use settings::{
    CapabilitySettings, EstimatorSettings, MediaSettings, PathSettings, ResourceSettings,
    Settings, TaskSettings,
};

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during config operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
}

/// Result type for config operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
