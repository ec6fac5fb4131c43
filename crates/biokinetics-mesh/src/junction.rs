// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Cross-mesh junctions
//!
//! Two meshes touch where a boundary face of one overlaps an oppositely
//! oriented boundary face of the other in the same plane. Each overlapping
//! pair becomes a [`VoxelJunction`] whose coefficient is the shared area over
//! the distance between the two entry centres.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::geometry::{BoundaryFace, MeshGeometry};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoxelJunction {
    /// Entry in the mesh whose stencil is extended
    pub first: usize,
    /// Entry in the other mesh
    pub second: usize,
    pub coefficient: f64,
}

impl VoxelJunction {
    pub fn new(first: usize, second: usize, coefficient: f64) -> Self {
        Self {
            first,
            second,
            coefficient,
        }
    }

    /// Same coupling seen from the other mesh
    pub fn flip(self) -> Self {
        Self {
            first: self.second,
            second: self.first,
            coefficient: self.coefficient,
        }
    }
}

pub fn flip_all(junctions: &[VoxelJunction]) -> Vec<VoxelJunction> {
    junctions.iter().map(|j| j.flip()).collect()
}

/// Broad-phase key: the normal axis and the quantised plane coordinate
type PlaneKey = (usize, i64);

fn plane_key(face: &BoundaryFace, tolerance: f64) -> PlaneKey {
    let axis = face.normal_axis();
    (axis, (face.centre[axis] / tolerance).floor() as i64)
}

fn opposed(a: &BoundaryFace, b: &BoundaryFace) -> bool {
    a.normal[0] * b.normal[0] + a.normal[1] * b.normal[1] + a.normal[2] * b.normal[2] < -0.5
}

/// Area shared by two coplanar faces, zero when they only touch along an edge
fn overlap_area(a: &BoundaryFace, b: &BoundaryFace, tolerance: f64) -> f64 {
    let normal_axis = a.normal_axis();
    let mut area = 1.0;
    for axis in (0..3).filter(|&axis| axis != normal_axis) {
        let lo = (a.centre[axis] - a.half_extent[axis]).max(b.centre[axis] - b.half_extent[axis]);
        let hi = (a.centre[axis] + a.half_extent[axis]).min(b.centre[axis] + b.half_extent[axis]);
        let length = hi - lo;
        if length <= tolerance {
            return 0.0;
        }
        area *= length;
    }
    area
}

/// Match boundary faces of `first` against those of `second`
///
/// Faces with opposed normals whose planes lie within `tolerance` are joined
/// wherever their rectangles overlap, so grids of different spacing or with
/// offset origins still couple. The coefficient is the overlap area over the
/// summed centre-to-face distances. The result is sorted by
/// `(first, second)`.
pub fn match_entries(first: &dyn MeshGeometry, second: &dyn MeshGeometry, tolerance: f64) -> Vec<VoxelJunction> {
    let mut planes: AHashMap<PlaneKey, Vec<BoundaryFace>> = AHashMap::new();
    for face in second.boundary_faces() {
        planes.entry(plane_key(&face, tolerance)).or_default().push(face);
    }

    let mut junctions = Vec::new();
    for face in first.boundary_faces() {
        let (axis, cell) = plane_key(&face, tolerance);
        for offset in -1..=1 {
            let Some(candidates) = planes.get(&(axis, cell + offset)) else {
                continue;
            };
            for other in candidates {
                if !opposed(&face, other) || (face.centre[axis] - other.centre[axis]).abs() > tolerance {
                    continue;
                }
                let area = overlap_area(&face, other, tolerance);
                if area > 0.0 {
                    let span = face.distance + other.distance;
                    junctions.push(VoxelJunction::new(face.entry, other.entry, area / span));
                }
            }
        }
    }

    junctions.sort_by(|a, b| (a.first, a.second).cmp(&(b.first, b.second)));
    junctions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::CubeMesh;

    #[test]
    fn test_flip_swaps_indices() {
        let j = VoxelJunction::new(2, 0, 5.0).flip();
        assert_eq!((j.first, j.second, j.coefficient), (0, 2, 5.0));
    }

    #[test]
    fn test_abutting_cubes_match_once() {
        let a = CubeMesh::new([0.0; 3], [1.0, 5.0, 1.0], [3, 1, 1]).unwrap();
        let b = CubeMesh::new([3.0, 0.0, 0.0], [1.0, 5.0, 1.0], [3, 1, 1]).unwrap();
        let junctions = match_entries(&a, &b, 1e-9);
        assert_eq!(junctions, vec![VoxelJunction::new(2, 0, 5.0)]);
    }

    #[test]
    fn test_separated_cubes_do_not_match() {
        let a = CubeMesh::new([0.0; 3], [1.0; 3], [2, 2, 1]).unwrap();
        let b = CubeMesh::new([2.5, 0.0, 0.0], [1.0; 3], [2, 2, 1]).unwrap();
        assert!(match_entries(&a, &b, 1e-9).is_empty());
    }

    #[test]
    fn test_face_of_stacked_grids() {
        // 2x2 face shared along z
        let a = CubeMesh::new([0.0; 3], [1.0; 3], [2, 2, 1]).unwrap();
        let b = CubeMesh::new([0.0, 0.0, 1.0], [1.0; 3], [2, 2, 3]).unwrap();
        let junctions = match_entries(&a, &b, 1e-9);
        assert_eq!(junctions.len(), 4);
        assert!(junctions.iter().all(|j| j.first == j.second && j.coefficient == 1.0));
    }

    #[test]
    fn test_unequal_spacing_couples_by_overlap() {
        let coarse = CubeMesh::new([0.0; 3], [1.0; 3], [1, 1, 1]).unwrap();
        let fine = CubeMesh::new([1.0, 0.0, 0.0], [0.5; 3], [2, 2, 2]).unwrap();
        let junctions = match_entries(&coarse, &fine, 1e-9);

        // The four fine voxels on the x = 1 plane
        let seconds: Vec<usize> = junctions.iter().map(|j| j.second).collect();
        assert_eq!(seconds, vec![0, 2, 4, 6]);
        let span = 0.5 + 0.25;
        let area: f64 = junctions.iter().map(|j| j.coefficient * span).sum();
        assert!((area - 1.0).abs() < 1e-12);

        // Seen from the fine side the same interface appears
        let back = match_entries(&fine, &coarse, 1e-9);
        let area: f64 = back.iter().map(|j| j.coefficient * span).sum();
        assert!((area - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_offset_grids_share_partial_faces() {
        let a = CubeMesh::new([0.0; 3], [1.0; 3], [1, 2, 1]).unwrap();
        let b = CubeMesh::new([1.0, 0.5, 0.0], [1.0; 3], [1, 2, 1]).unwrap();
        let junctions = match_entries(&a, &b, 1e-9);
        assert_eq!(
            junctions,
            vec![
                VoxelJunction::new(0, 0, 0.5),
                VoxelJunction::new(1, 0, 0.5),
                VoxelJunction::new(1, 1, 0.5),
            ]
        );
    }

    #[test]
    fn test_edge_contact_is_not_a_junction() {
        // Touching only along the line y = 1
        let a = CubeMesh::new([0.0; 3], [1.0; 3], [1, 1, 1]).unwrap();
        let b = CubeMesh::new([1.0, 1.0, 0.0], [1.0; 3], [1, 1, 1]).unwrap();
        assert!(match_entries(&a, &b, 1e-9).is_empty());
    }
}
