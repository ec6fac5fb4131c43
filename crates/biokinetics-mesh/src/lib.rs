// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # biokinetics-mesh
//!
//! Voxel meshes for diffusing chemical species.
//!
//! A [`ChemMesh`] wraps a [`MeshGeometry`] and the [`Stencil`] derived from
//! it. Abutting meshes are coupled with [`ChemMesh::build_junction`], which
//! matches boundary faces into [`VoxelJunction`]s and appends them to the
//! stencil as remote neighbours. For distributed runs a
//! [`NodeDecomposition`] deals entries out to nodes and lists the entries
//! each pair of nodes must exchange.
//!
//! ## Example
//!
//! ```
//! use biokinetics_mesh::prelude::*;
//!
//! let a = CubeMesh::new([0.0; 3], [1.0, 5.0, 1.0], [3, 1, 1]).unwrap();
//! let b = CubeMesh::new([3.0, 0.0, 0.0], [1.0, 5.0, 1.0], [3, 1, 1]).unwrap();
//! let mut a = ChemMesh::new(MeshId(0), Box::new(a), MeshSettings::default());
//! let mut b = ChemMesh::new(MeshId(1), Box::new(b), MeshSettings::default());
//!
//! let junctions = a.build_junction(&mut b).unwrap();
//! assert_eq!(junctions, vec![VoxelJunction::new(2, 0, 5.0)]);
//! ```

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod chem_mesh;
pub mod decomposition;
pub mod error;
pub mod geometry;
pub mod junction;
pub mod messages;
pub mod settings;
pub mod sink;
pub mod stencil;

pub use chem_mesh::{ChemMesh, MeshStats};
pub use decomposition::{MeshSplit, NodeDecomposition, NodeInfo};
pub use error::{MeshError, Result};
pub use geometry::{BoundaryFace, CubeMesh, MeshGeometry};
pub use junction::{flip_all, match_entries, VoxelJunction};
pub use messages::{meshing_channel, MeshingClient, MeshingPort, MeshingReply, MeshingRequest};
pub use settings::MeshSettings;
pub use sink::DiffusionSink;
pub use stencil::{no_remote, Coupling, MeshId, Neighbor, Stencil};

pub mod prelude {
    pub use crate::{
        ChemMesh, CubeMesh, DiffusionSink, MeshError, MeshGeometry, MeshId, MeshSettings,
        MeshSplit, NodeDecomposition, NodeInfo, Stencil, VoxelJunction,
    };
}
