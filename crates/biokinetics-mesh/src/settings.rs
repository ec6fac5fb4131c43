// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Mesh settings derived from `[mesh]` configuration

use biokinetics_config::MeshConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeshSettings {
    pub num_nodes: usize,
    pub threads_per_node: usize,
    pub node_index: usize,
    /// Extend both meshes when building a junction
    pub symmetric_junctions: bool,
    pub match_tolerance: f64,
    pub default_size: f64,
    pub default_entries: usize,
}

impl Default for MeshSettings {
    fn default() -> Self {
        Self::from(&MeshConfig::default())
    }
}

impl From<&MeshConfig> for MeshSettings {
    fn from(config: &MeshConfig) -> Self {
        Self {
            num_nodes: config.num_nodes,
            threads_per_node: config.threads_per_node,
            node_index: config.node_index,
            symmetric_junctions: config.symmetric_junctions,
            match_tolerance: config.match_tolerance,
            default_size: config.default_size,
            default_entries: config.default_entries,
        }
    }
}
