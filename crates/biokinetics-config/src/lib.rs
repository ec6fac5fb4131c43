// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # biokinetics configuration
//!
//! `biokinetics.toml` mapped onto [`KineticsConfig`]. Every key of the
//! `[channels]` and `[mesh]` sections can be overridden from the environment
//! (`BIOKINETICS_<KEY>`) and then from a CLI key/value map.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use biokinetics_config::{load_config, validate_config};
//!
//! let config = load_config(None, None)?;
//! validate_config(&config)?;
//! assert!(config.channels.dt > 0.0);
//! # Ok::<(), biokinetics_config::ConfigError>(())
//! ```

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration file name searched by [`find_config_file`]
pub const CONFIG_FILE_NAME: &str = "biokinetics.toml";

#[cfg(feature = "std")]
pub mod loader;

pub mod types;
pub mod validation;

#[cfg(feature = "std")]
pub use loader::{
    apply_cli_overrides, apply_environment_overrides, apply_override, find_config_file, load_config,
    OVERRIDE_KEYS,
};

pub use types::*;
pub use validation::{validate_config, ConfigValidationError};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[cfg(feature = "std")]
    #[error("biokinetics.toml not found: {0}")]
    NotFound(String),

    #[cfg(feature = "std")]
    #[error("cannot read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "std")]
    #[error("malformed configuration: {0}")]
    Parse(String),

    #[error("invalid configuration:\n{0}")]
    ValidationError(String),

    #[error("cannot apply override {key} = {value:?}")]
    Override { key: String, value: String },
}

#[cfg(feature = "std")]
impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;
