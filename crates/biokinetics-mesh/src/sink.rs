// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use core::fmt::Debug;

use crate::decomposition::MeshSplit;
use crate::stencil::Stencil;

/// Consumer of stencils and node splits, typically a reaction-diffusion solver
pub trait DiffusionSink: Send + Debug {
    fn update_diffusion(&mut self, mesh_index: usize, stencil: &Stencil);

    fn handle_mesh_split(&mut self, _split: &MeshSplit) {}
}
