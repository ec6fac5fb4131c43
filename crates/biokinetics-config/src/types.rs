// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! This module defines all configuration structs that map to sections in
//! `biokinetics.toml`.

use serde::{Deserialize, Serialize};

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct KineticsConfig {
    pub system: SystemConfig,
    pub channels: ChannelsConfig,
    pub mesh: MeshConfig,
}

/// System-level configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SystemConfig {
    pub debug: bool,
    pub log_level: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            debug: false,
            log_level: "info".to_string(),
        }
    }
}

/// Gated-channel integration settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ChannelsConfig {
    /// Integration timestep in seconds
    pub dt: f64,
    /// Instance count above which an element updates its channels in parallel
    pub parallel_threshold: usize,
    /// Clamp gate state into [0, 1] after every update
    pub clamp_gate_state: bool,
    /// Gate powers above this value are logged as implausible
    pub power_warning_limit: f64,
}

impl Default for ChannelsConfig {
    fn default() -> Self {
        Self {
            dt: 5.0e-5,
            parallel_threshold: 4096,
            clamp_gate_state: false,
            power_warning_limit: 5.0,
        }
    }
}

/// Compartment mesh and node decomposition settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MeshConfig {
    /// Number of execution nodes the mesh is split across
    pub num_nodes: usize,
    /// Worker threads available on each node
    pub threads_per_node: usize,
    /// Index of the node this process runs as
    pub node_index: usize,
    /// Also extend the follower mesh when building junctions
    pub symmetric_junctions: bool,
    /// Distance under which two boundary face planes are considered coincident (m)
    pub match_tolerance: f64,
    /// Volume of a default mesh (m^3)
    pub default_size: f64,
    /// Entry count of a default mesh
    pub default_entries: usize,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            num_nodes: 1,
            threads_per_node: 1,
            node_index: 0,
            symmetric_junctions: false,
            match_tolerance: 1.0e-9,
            default_size: 1.0e-18,
            default_entries: 1,
        }
    }
}
