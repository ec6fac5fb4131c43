// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for meshes, stencils and node decomposition

use crate::stencil::MeshId;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MeshError {
    #[error("entry {entry} has invalid volume {volume}")]
    InvalidVolume { entry: usize, volume: f64 },

    #[error("invalid mesh size {0}")]
    InvalidSize(f64),

    #[error("invalid mesh dimensions: {0}")]
    InvalidDimensions(String),

    #[error("coupling of entry {entry} has negative or non-finite coefficient {coefficient}")]
    NegativeCoefficient { entry: usize, coefficient: f64 },

    #[error("entry {entry} out of range for {len} entries")]
    EntryOutOfRange { entry: usize, len: usize },

    #[error("invalid node info: {num_nodes} nodes x {threads_per_node} threads")]
    InvalidNodeInfo { num_nodes: usize, threads_per_node: usize },

    #[error("node {node} out of range for {num_nodes} nodes")]
    NodeOutOfRange { node: usize, num_nodes: usize },

    #[error("expected {expected} values, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("remote concentration for {mesh} entry {entry} is unavailable")]
    MissingRemote { mesh: MeshId, entry: usize },

    #[error("concentration of entry {entry} is neither local nor in the halo")]
    MissingHalo { entry: usize },

    #[error("meshing reply queue is full")]
    Backpressure,

    #[error("meshing peer disconnected")]
    Disconnected,
}

pub type Result<T> = core::result::Result<T, MeshError>;
