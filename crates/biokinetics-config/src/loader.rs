// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading
//!
//! Precedence, lowest first: the TOML file, `BIOKINETICS_*` environment
//! variables, the CLI key/value map.

use crate::{ConfigError, ConfigResult, KineticsConfig, CONFIG_FILE_NAME};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Keys accepted by [`apply_override`]
///
/// The environment form is `BIOKINETICS_` followed by the upper-cased key.
pub const OVERRIDE_KEYS: &[&str] = &[
    "log_level",
    "debug",
    "dt",
    "parallel_threshold",
    "clamp_gate_state",
    "power_warning_limit",
    "num_nodes",
    "threads_per_node",
    "node_index",
    "symmetric_junctions",
    "match_tolerance",
    "default_size",
    "default_entries",
];

const ENV_PREFIX: &str = "BIOKINETICS_";

/// Locate `biokinetics.toml`
///
/// `BIOKINETICS_CONFIG_PATH` wins when set; otherwise the current directory
/// and up to five of its ancestors are searched.
///
/// # Errors
///
/// `ConfigError::NotFound` listing every location tried
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(explicit) = env::var("BIOKINETICS_CONFIG_PATH") {
        let path = PathBuf::from(explicit);
        return if path.is_file() {
            Ok(path)
        } else {
            Err(ConfigError::NotFound(format!(
                "BIOKINETICS_CONFIG_PATH points at {}",
                path.display()
            )))
        };
    }

    let cwd = env::current_dir()?;
    let candidates: Vec<PathBuf> = cwd
        .ancestors()
        .take(6)
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .collect();

    if let Some(found) = candidates.iter().find(|p| p.is_file()) {
        return Ok(found.clone());
    }

    let tried = candidates
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ");
    Err(ConfigError::NotFound(format!(
        "searched {tried}; set BIOKINETICS_CONFIG_PATH to choose a file"
    )))
}

/// Load, then apply environment and CLI overrides in that order
///
/// # Errors
///
/// Missing or unreadable file, malformed TOML, or a CLI override that does
/// not apply. Unusable environment values are skipped.
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<KineticsConfig> {
    let path = match config_path {
        Some(path) => path.to_path_buf(),
        None => find_config_file()?,
    };

    let mut config: KineticsConfig = toml::from_str(&fs::read_to_string(&path)?)?;
    apply_environment_overrides(&mut config);
    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli)?;
    }
    Ok(config)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn assign<T: FromStr>(slot: &mut T, value: &str) -> bool {
    match value.trim().parse() {
        Ok(parsed) => {
            *slot = parsed;
            true
        }
        Err(_) => false,
    }
}

fn assign_flag(slot: &mut bool, value: &str) -> bool {
    match parse_flag(value.trim()) {
        Some(flag) => {
            *slot = flag;
            true
        }
        None => false,
    }
}

/// Set one configuration key from its textual value
///
/// # Errors
///
/// `ConfigError::Override` for an unknown key or a value that does not parse
pub fn apply_override(config: &mut KineticsConfig, key: &str, value: &str) -> ConfigResult<()> {
    let channels = &mut config.channels;
    let mesh = &mut config.mesh;
    let applied = match key {
        "log_level" => {
            config.system.log_level = value.to_string();
            true
        }
        "debug" => assign_flag(&mut config.system.debug, value),
        "dt" => assign(&mut channels.dt, value),
        "parallel_threshold" => assign(&mut channels.parallel_threshold, value),
        "clamp_gate_state" => assign_flag(&mut channels.clamp_gate_state, value),
        "power_warning_limit" => assign(&mut channels.power_warning_limit, value),
        "num_nodes" => assign(&mut mesh.num_nodes, value),
        "threads_per_node" => assign(&mut mesh.threads_per_node, value),
        "node_index" => assign(&mut mesh.node_index, value),
        "symmetric_junctions" => assign_flag(&mut mesh.symmetric_junctions, value),
        "match_tolerance" => assign(&mut mesh.match_tolerance, value),
        "default_size" => assign(&mut mesh.default_size, value),
        "default_entries" => assign(&mut mesh.default_entries, value),
        _ => false,
    };
    if applied {
        Ok(())
    } else {
        Err(ConfigError::Override {
            key: key.to_string(),
            value: value.to_string(),
        })
    }
}

/// Apply `BIOKINETICS_<KEY>` variables for every key in [`OVERRIDE_KEYS`]
///
/// `BIOKINETICS_DEBUG` is left to the logging setup, which reads it as a
/// crate list.
pub fn apply_environment_overrides(config: &mut KineticsConfig) {
    for key in OVERRIDE_KEYS.iter().filter(|k| **k != "debug") {
        let var = format!("{ENV_PREFIX}{}", key.to_ascii_uppercase());
        if let Ok(value) = env::var(&var) {
            // Stale or malformed environment values keep the file value
            let _ = apply_override(config, key, &value);
        }
    }
}

/// Apply a CLI key/value map, e.g. `{"dt": "1e-5", "num_nodes": "4"}`
///
/// # Errors
///
/// The first override that cannot be applied
pub fn apply_cli_overrides(config: &mut KineticsConfig, cli_args: &HashMap<String, String>) -> ConfigResult<()> {
    let mut keys: Vec<&String> = cli_args.keys().collect();
    keys.sort();
    for key in keys {
        apply_override(config, key, &cli_args[key])?;
    }
    Ok(())
}
