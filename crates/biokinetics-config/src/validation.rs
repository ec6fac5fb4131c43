// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! Ensures configuration values are within valid ranges and consistent with
//! each other before the engines consume them.

use crate::{ConfigError, ConfigResult, KineticsConfig};

/// Validation errors that can occur during config validation
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    NotPositive { field: String, value: f64 },
    ZeroCount { field: String },
    NodeIndexOutOfRange { node_index: usize, num_nodes: usize },
    InvalidValue { field: String, reason: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotPositive { field, value } => {
                write!(f, "{} = {} must be finite and > 0", field, value)
            }
            Self::ZeroCount { field } => write!(f, "{} must be at least 1", field),
            Self::NodeIndexOutOfRange {
                node_index,
                num_nodes,
            } => write!(
                f,
                "mesh.node_index = {} is outside 0..{} (mesh.num_nodes)",
                node_index, num_nodes
            ),
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
        }
    }
}

/// Validate the complete configuration
///
/// All problems are collected and reported together.
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` with details if validation fails
pub fn validate_config(config: &KineticsConfig) -> ConfigResult<()> {
    let mut errors = Vec::new();

    validate_channels(config, &mut errors);
    validate_mesh(config, &mut errors);

    if !errors.is_empty() {
        let error_messages = errors
            .iter()
            .map(|e| format!("  - {}", e))
            .collect::<Vec<_>>()
            .join("\n");

        return Err(ConfigError::ValidationError(format!(
            "Configuration validation failed:\n{}",
            error_messages
        )));
    }

    Ok(())
}

fn check_positive(field: &str, value: f64, errors: &mut Vec<ConfigValidationError>) {
    if !(value.is_finite() && value > 0.0) {
        errors.push(ConfigValidationError::NotPositive {
            field: field.to_string(),
            value,
        });
    }
}

fn validate_channels(config: &KineticsConfig, errors: &mut Vec<ConfigValidationError>) {
    check_positive("channels.dt", config.channels.dt, errors);

    if config.channels.power_warning_limit.is_nan() || config.channels.power_warning_limit < 0.0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "channels.power_warning_limit".to_string(),
            reason: "must be a non-negative number".to_string(),
        });
    }
}

fn validate_mesh(config: &KineticsConfig, errors: &mut Vec<ConfigValidationError>) {
    let mesh = &config.mesh;

    if mesh.num_nodes == 0 {
        errors.push(ConfigValidationError::ZeroCount {
            field: "mesh.num_nodes".to_string(),
        });
    } else if mesh.node_index >= mesh.num_nodes {
        errors.push(ConfigValidationError::NodeIndexOutOfRange {
            node_index: mesh.node_index,
            num_nodes: mesh.num_nodes,
        });
    }

    if mesh.threads_per_node == 0 {
        errors.push(ConfigValidationError::ZeroCount {
            field: "mesh.threads_per_node".to_string(),
        });
    }

    if mesh.default_entries == 0 {
        errors.push(ConfigValidationError::ZeroCount {
            field: "mesh.default_entries".to_string(),
        });
    }

    check_positive("mesh.match_tolerance", mesh.match_tolerance, errors);
    check_positive("mesh.default_size", mesh.default_size, errors);
}
