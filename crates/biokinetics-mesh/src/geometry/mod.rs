// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Mesh geometry
//!
//! Geometry is the only input the core stencil depends on: entry volumes,
//! face adjacency and the boundary faces used to match abutting meshes.

mod cube;

use core::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::stencil::Stencil;

pub use cube::CubeMesh;

/// An axis-aligned rectangular face on the outer surface of a mesh
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundaryFace {
    pub entry: usize,
    pub centre: [f64; 3],
    /// Outward unit normal
    pub normal: [f64; 3],
    pub area: f64,
    /// Half the face size along each axis, zero along the normal
    pub half_extent: [f64; 3],
    /// Distance from the entry centre to the face
    pub distance: f64,
}

impl BoundaryFace {
    /// Axis the face is perpendicular to
    pub fn normal_axis(&self) -> usize {
        let mut axis = 0;
        for i in 1..3 {
            if self.normal[i].abs() > self.normal[axis].abs() {
                axis = i;
            }
        }
        axis
    }
}

pub trait MeshGeometry: Send + Sync + Debug {
    fn num_entries(&self) -> usize;

    fn volume(&self, entry: usize) -> Option<f64>;

    fn volumes(&self) -> Vec<f64> {
        (0..self.num_entries())
            .filter_map(|entry| self.volume(entry))
            .collect()
    }

    fn total_volume(&self) -> f64 {
        self.volumes().iter().sum()
    }

    fn dimensions(&self) -> u32;

    /// Within-mesh couplings, derived from geometry alone
    fn core_stencil(&self) -> Stencil;

    fn boundary_faces(&self) -> Vec<BoundaryFace>;

    /// Replace the geometry with a default layout of `num_entries` entries
    /// filling `size` cubic metres
    fn build_default(&mut self, size: f64, num_entries: usize) -> Result<()>;
}
