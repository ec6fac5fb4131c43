// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # biokinetics
//!
//! Numeric kernel of a multi-compartment biophysical simulator: gated ion
//! channels advanced every tick, and voxel meshes whose diffusion stencils
//! couple chemical species across meshes and execution nodes.
//!
//! ## Feature Flags
//!
//! - **`channels`** (default): rate tables, gates, Hodgkin-Huxley channels
//!   and the collective solver hand-off
//! - **`mesh`** (default): stencils, junctions, node decomposition
//! - **`config`** (default): `biokinetics.toml` loading and validation
//! - **`observability`** (default): tracing subscriber setup
//! - **`file-logging`**: per-run JSON log files with retention
//!
//! ## Usage
//!
//! ```rust,no_run
//! use biokinetics::prelude::*;
//!
//! let config = biokinetics::config::load_config(None, None)?;
//! biokinetics::config::validate_config(&config)?;
//!
//! let settings = IntegrationSettings::from(&config.channels);
//! let mut arena = RateTableArena::new();
//! let mut element = ChannelElement::new(ElementId(0), ChannelId(0), 1000, settings);
//! element.process(&arena, settings.dt)?;
//!
//! let mesh = ChemMesh::default_cube(MeshId(0), MeshSettings::from(&config.mesh))?;
//! let split = mesh.decompose(NodeInfo::new(4, 2)?)?.split(0)?;
//! # let _ = (&mut arena, split);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Foundation: biokinetics-config, -observability         │
//! │  (TOML + overrides, tracing setup)                      │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Kernel: biokinetics-channels, biokinetics-mesh         │
//! │  (gate integration, diffusion coupling, no I/O)         │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## License
//!
//! Apache-2.0

#[cfg(feature = "channels")]
pub use biokinetics_channels as channels;

#[cfg(feature = "mesh")]
pub use biokinetics_mesh as mesh;

#[cfg(feature = "config")]
pub use biokinetics_config as config;

#[cfg(feature = "observability")]
pub use biokinetics_observability as observability;

/// Prelude - commonly used types and traits
pub mod prelude {
    #[cfg(feature = "channels")]
    pub use crate::channels::prelude::*;

    #[cfg(feature = "mesh")]
    pub use crate::mesh::prelude::*;

    #[cfg(feature = "config")]
    pub use crate::config::KineticsConfig;
}

#[cfg(test)]
mod tests {
    #[test]
    #[cfg(all(feature = "channels", feature = "mesh"))]
    fn test_versions_match() {
        assert_eq!(crate::channels::VERSION, crate::mesh::VERSION);
    }
}
