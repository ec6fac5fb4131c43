// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{BoundaryFace, MeshGeometry};
use crate::error::{MeshError, Result};
use crate::stencil::Stencil;

const CBRT_TOLERANCE: f64 = 1e-9;

/// Regular grid of identical cuboid voxels
///
/// Entries are numbered x-fastest: `ix + nx * (iy + ny * iz)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CubeMesh {
    origin: [f64; 3],
    spacing: [f64; 3],
    counts: [usize; 3],
}

impl CubeMesh {
    pub fn new(origin: [f64; 3], spacing: [f64; 3], counts: [usize; 3]) -> Result<Self> {
        if origin.iter().any(|o| !o.is_finite()) {
            return Err(MeshError::InvalidDimensions(format!(
                "origin must be finite, got {origin:?}"
            )));
        }
        if spacing.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(MeshError::InvalidDimensions(format!(
                "spacing must be positive, got {spacing:?}"
            )));
        }
        if counts.contains(&0) {
            return Err(MeshError::InvalidDimensions(format!(
                "every axis needs at least one voxel, got {counts:?}"
            )));
        }
        Ok(Self {
            origin,
            spacing,
            counts,
        })
    }

    /// Cube of volume `size` holding `num_entries` voxels, or the largest
    /// perfect cube below it
    pub fn with_default_layout(size: f64, num_entries: usize) -> Result<Self> {
        if !size.is_finite() || size <= 0.0 {
            return Err(MeshError::InvalidSize(size));
        }
        let per_side = voxels_per_side(num_entries);
        let side = size.cbrt() / per_side as f64;
        Self::new([0.0; 3], [side; 3], [per_side; 3])
    }

    pub fn origin(&self) -> [f64; 3] {
        self.origin
    }

    pub fn spacing(&self) -> [f64; 3] {
        self.spacing
    }

    pub fn counts(&self) -> [usize; 3] {
        self.counts
    }

    pub fn index(&self, ix: usize, iy: usize, iz: usize) -> usize {
        ix + self.counts[0] * (iy + self.counts[1] * iz)
    }

    fn voxel_volume(&self) -> f64 {
        self.spacing[0] * self.spacing[1] * self.spacing[2]
    }

    /// Area of the face perpendicular to `axis`
    fn face_area(&self, axis: usize) -> f64 {
        let [dx, dy, dz] = self.spacing;
        match axis {
            0 => dy * dz,
            1 => dx * dz,
            _ => dx * dy,
        }
    }

    fn centre(&self, cell: [usize; 3]) -> [f64; 3] {
        let mut c = [0.0; 3];
        for axis in 0..3 {
            c[axis] = self.origin[axis] + (cell[axis] as f64 + 0.5) * self.spacing[axis];
        }
        c
    }

    fn cells(&self) -> impl Iterator<Item = [usize; 3]> + '_ {
        let [nx, ny, nz] = self.counts;
        (0..nz).flat_map(move |iz| (0..ny).flat_map(move |iy| (0..nx).map(move |ix| [ix, iy, iz])))
    }
}

fn voxels_per_side(num_entries: usize) -> usize {
    let root = (num_entries as f64).cbrt();
    let rounded = root.round();
    let per_side = if (root - rounded).abs() < CBRT_TOLERANCE {
        rounded
    } else {
        root.floor()
    };
    (per_side as usize).max(1)
}

impl MeshGeometry for CubeMesh {
    fn num_entries(&self) -> usize {
        self.counts.iter().product()
    }

    fn volume(&self, entry: usize) -> Option<f64> {
        (entry < self.num_entries()).then(|| self.voxel_volume())
    }

    fn dimensions(&self) -> u32 {
        3
    }

    fn core_stencil(&self) -> Stencil {
        let mut stencil = Stencil::new(self.num_entries());
        for cell in self.cells() {
            let here = self.index(cell[0], cell[1], cell[2]);
            for axis in 0..3 {
                if cell[axis] + 1 >= self.counts[axis] {
                    continue;
                }
                let mut next = cell;
                next[axis] += 1;
                let there = self.index(next[0], next[1], next[2]);
                let coefficient = self.face_area(axis) / self.spacing[axis];
                // Both indices come from the grid and the coefficient is positive
                if let Err(e) = stencil.add_symmetric(here, there, coefficient) {
                    debug!(target: "biokinetics-mesh", "skipping core coupling {here}-{there}: {e}");
                }
            }
        }
        stencil
    }

    fn boundary_faces(&self) -> Vec<BoundaryFace> {
        let mut faces = Vec::new();
        for cell in self.cells() {
            let entry = self.index(cell[0], cell[1], cell[2]);
            let centre = self.centre(cell);
            for axis in 0..3 {
                let half = 0.5 * self.spacing[axis];
                let area = self.face_area(axis);
                let mut sides = Vec::with_capacity(2);
                if cell[axis] == 0 {
                    sides.push(-1.0);
                }
                if cell[axis] + 1 == self.counts[axis] {
                    sides.push(1.0);
                }
                for sign in sides {
                    let mut face_centre = centre;
                    face_centre[axis] += sign * half;
                    let mut normal = [0.0; 3];
                    normal[axis] = sign;
                    let mut half_extent = [0.5 * self.spacing[0], 0.5 * self.spacing[1], 0.5 * self.spacing[2]];
                    half_extent[axis] = 0.0;
                    faces.push(BoundaryFace {
                        entry,
                        centre: face_centre,
                        normal,
                        area,
                        half_extent,
                        distance: half,
                    });
                }
            }
        }
        faces
    }

    fn build_default(&mut self, size: f64, num_entries: usize) -> Result<()> {
        *self = Self::with_default_layout(size, num_entries)?;
        debug!(
            target: "biokinetics-mesh",
            "rebuilt default cube: {:?} voxels of side {:.3e}",
            self.counts,
            self.spacing[0]
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_degenerate_grid() {
        assert!(CubeMesh::new([0.0; 3], [1.0, 0.0, 1.0], [1, 1, 1]).is_err());
        assert!(CubeMesh::new([0.0; 3], [1.0; 3], [2, 0, 1]).is_err());
        assert!(CubeMesh::with_default_layout(-1.0, 8).is_err());
    }

    #[test]
    fn test_voxels_per_side() {
        assert_eq!(voxels_per_side(0), 1);
        assert_eq!(voxels_per_side(1), 1);
        assert_eq!(voxels_per_side(8), 2);
        assert_eq!(voxels_per_side(26), 2);
        assert_eq!(voxels_per_side(27), 3);
        assert_eq!(voxels_per_side(64), 4);
        assert_eq!(voxels_per_side(1000), 10);
    }

    #[test]
    fn test_default_layout_preserves_volume() {
        let mesh = CubeMesh::with_default_layout(8.0, 8).unwrap();
        assert_eq!(mesh.num_entries(), 8);
        assert!((mesh.total_volume() - 8.0).abs() < 1e-12);
        assert_eq!(mesh.dimensions(), 3);
    }

    #[test]
    fn test_core_stencil_is_symmetric() {
        let mesh = CubeMesh::new([0.0; 3], [1.0, 2.0, 3.0], [3, 2, 2]).unwrap();
        let stencil = mesh.core_stencil();
        // 2*2*2 along x, 3*1*2 along y, 3*2*1 along z, both directions
        assert_eq!(stencil.num_couplings(), 2 * (8 + 6 + 6));
        for entry in 0..stencil.len() {
            for coupling in stencil.row(entry) {
                let crate::stencil::Neighbor::Local(other) = coupling.neighbor else {
                    panic!("core stencil has a remote neighbour");
                };
                assert!(stencil
                    .row(other)
                    .iter()
                    .any(|c| c.neighbor == crate::stencil::Neighbor::Local(entry)
                        && c.coefficient == coupling.coefficient));
            }
        }
        // x-neighbours share a 2x3 face one unit apart
        assert_eq!(stencil.row(0)[0].coefficient, 6.0);
    }

    #[test]
    fn test_boundary_faces_cover_surface() {
        let mesh = CubeMesh::new([0.0; 3], [1.0; 3], [2, 2, 2]).unwrap();
        let faces = mesh.boundary_faces();
        assert_eq!(faces.len(), 24);
        assert!(faces.iter().all(|f| f.distance == 0.5 && f.area == 1.0));
    }
}
