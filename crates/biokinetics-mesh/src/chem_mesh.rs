// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Chemical compartment mesh
//!
//! A `ChemMesh` pairs a geometry with its diffusion stencil. The stencil
//! starts as the geometric core and grows remote couplings as junctions are
//! built; [`ChemMesh::reset_stencil`] drops them again. Every rebuild of the
//! geometry bumps the mesh epoch so peers can tell their junctions are stale.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::decomposition::{MeshSplit, NodeDecomposition, NodeInfo};
use crate::error::{MeshError, Result};
use crate::geometry::{CubeMesh, MeshGeometry};
use crate::junction::{flip_all, match_entries, VoxelJunction};
use crate::settings::MeshSettings;
use crate::sink::DiffusionSink;
use crate::stencil::{MeshId, Stencil};

/// Entry count and the distinct voxel volumes of a mesh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshStats {
    pub num_entries: usize,
    pub volumes: Vec<f64>,
}

#[derive(Debug)]
pub struct ChemMesh {
    id: MeshId,
    geometry: Box<dyn MeshGeometry>,
    stencil: Stencil,
    method: String,
    epoch: u64,
    /// Peer epochs at the time each junction was built
    peer_epochs: AHashMap<MeshId, u64>,
    settings: MeshSettings,
    sink: Option<Box<dyn DiffusionSink>>,
}

impl ChemMesh {
    pub fn new(id: MeshId, geometry: Box<dyn MeshGeometry>, settings: MeshSettings) -> Self {
        let stencil = geometry.core_stencil();
        Self {
            id,
            geometry,
            stencil,
            method: String::new(),
            epoch: 0,
            peer_epochs: AHashMap::new(),
            settings,
            sink: None,
        }
    }

    /// Cube of `settings.default_size` holding `settings.default_entries`
    pub fn default_cube(id: MeshId, settings: MeshSettings) -> Result<Self> {
        let cube = CubeMesh::with_default_layout(settings.default_size, settings.default_entries)?;
        Ok(Self::new(id, Box::new(cube), settings))
    }

    pub fn id(&self) -> MeshId {
        self.id
    }

    pub fn geometry(&self) -> &dyn MeshGeometry {
        self.geometry.as_ref()
    }

    pub fn stencil(&self) -> &Stencil {
        &self.stencil
    }

    pub fn settings(&self) -> &MeshSettings {
        &self.settings
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn num_entries(&self) -> usize {
        self.geometry.num_entries()
    }

    pub fn num_dimensions(&self) -> u32 {
        self.geometry.dimensions()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.geometry.volumes()
    }

    /// Advisory name of the numerical method, not interpreted here
    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn set_method(&mut self, method: impl Into<String>) {
        self.method = method.into();
    }

    pub fn entire_size(&self) -> f64 {
        self.geometry.total_volume()
    }

    /// Rebuild as a default mesh of `size` keeping the entry count
    pub fn set_entire_size(&mut self, size: f64) -> Result<()> {
        let n = self.num_entries();
        self.build_default_mesh(size, n)
    }

    pub fn build_default_mesh(&mut self, size: f64, num_entries: usize) -> Result<()> {
        self.geometry.build_default(size, num_entries)?;
        self.epoch += 1;
        info!(
            target: "biokinetics-mesh",
            "{} rebuilt with {} entries (epoch {})",
            self.id,
            self.num_entries(),
            self.epoch
        );
        self.reset_stencil();
        Ok(())
    }

    /// Back to the geometric core, dropping every junction
    pub fn reset_stencil(&mut self) {
        self.stencil = self.geometry.core_stencil();
        self.peer_epochs.clear();
        debug!(target: "biokinetics-mesh", "{} stencil reset", self.id);
    }

    /// Couple this mesh to `other` where their boundaries meet
    ///
    /// Only this mesh's stencil is extended unless symmetric junctions are
    /// configured. Couplings from an earlier junction with the same peer are
    /// replaced.
    pub fn build_junction(&mut self, other: &mut ChemMesh) -> Result<Vec<VoxelJunction>> {
        let dropped = self.stencil.remove_remote(other.id);
        if dropped > 0 {
            warn!(
                target: "biokinetics-mesh",
                "{} already joined to {}, replacing {dropped} couplings",
                self.id,
                other.id
            );
        }

        let junctions = match_entries(
            self.geometry.as_ref(),
            other.geometry.as_ref(),
            self.settings.match_tolerance,
        );
        self.stencil.extend(other.id, &junctions)?;
        self.peer_epochs.insert(other.id, other.epoch);

        if self.settings.symmetric_junctions {
            other.stencil.remove_remote(self.id);
            other.stencil.extend(self.id, &flip_all(&junctions))?;
            other.peer_epochs.insert(self.id, self.epoch);
        }

        debug!(
            target: "biokinetics-mesh",
            "{} joined to {} with {} junctions",
            self.id,
            other.id,
            junctions.len()
        );
        Ok(junctions)
    }

    /// Whether `peer` was rebuilt since a junction to it was built
    pub fn has_stale_junctions(&self, peer: &ChemMesh) -> bool {
        self.peer_epochs
            .get(&peer.id)
            .is_some_and(|&epoch| epoch != peer.epoch)
    }

    pub fn mesh_stats(&self) -> MeshStats {
        let mut volumes: Vec<f64> = Vec::new();
        for v in self.geometry.volumes() {
            if !volumes.iter().any(|u| u.to_bits() == v.to_bits()) {
                volumes.push(v);
            }
        }
        MeshStats {
            num_entries: self.num_entries(),
            volumes,
        }
    }

    pub fn attach_sink(&mut self, sink: Box<dyn DiffusionSink>) -> Option<Box<dyn DiffusionSink>> {
        self.sink.replace(sink)
    }

    pub fn detach_sink(&mut self) -> Option<Box<dyn DiffusionSink>> {
        self.sink.take()
    }

    pub fn has_sink(&self) -> bool {
        self.sink.is_some()
    }

    /// Push the current stencil to the sink; false when none is attached
    pub fn update_diffusion(&mut self, mesh_index: usize) -> bool {
        match self.sink.as_mut() {
            Some(sink) => {
                sink.update_diffusion(mesh_index, &self.stencil);
                true
            }
            None => false,
        }
    }

    pub fn decompose(&self, info: NodeInfo) -> Result<NodeDecomposition> {
        NodeDecomposition::new(info, &self.stencil, &self.geometry.volumes())
    }

    /// Split for this mesh's node, also handed to the sink
    pub fn handle_node_info(&mut self, num_nodes: usize, threads_per_node: usize) -> Result<MeshSplit> {
        let info = NodeInfo::new(num_nodes, threads_per_node).map_err(|e| {
            warn!(target: "biokinetics-mesh", "{} refused node info: {e}", self.id);
            e
        })?;
        let node = self.settings.node_index;
        if node >= num_nodes {
            warn!(
                target: "biokinetics-mesh",
                "{} runs as node {node} but only {num_nodes} nodes were announced",
                self.id
            );
            return Err(MeshError::NodeOutOfRange { node, num_nodes });
        }
        let split = self.decompose(info)?.split(node)?;
        if let Some(sink) = self.sink.as_mut() {
            sink.handle_mesh_split(&split);
        }
        Ok(split)
    }

    /// Node layout from `mesh.num_nodes` and `mesh.threads_per_node`
    pub fn configured_node_info(&self) -> Result<NodeInfo> {
        NodeInfo::new(self.settings.num_nodes, self.settings.threads_per_node)
    }

    /// [`handle_node_info`](Self::handle_node_info) with the configured layout
    pub fn split_configured(&mut self) -> Result<MeshSplit> {
        self.handle_node_info(self.settings.num_nodes, self.settings.threads_per_node)
    }

    pub fn diffusion_rates<F>(&self, conc: &[f64], diff_const: f64, remote: F) -> Result<Vec<f64>>
    where
        F: Fn(MeshId, usize) -> Option<f64>,
    {
        self.stencil
            .diffusion_rates(conc, &self.geometry.volumes(), diff_const, remote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slab(id: u32, x: f64) -> ChemMesh {
        let cube = CubeMesh::new([x, 0.0, 0.0], [1.0, 5.0, 1.0], [3, 1, 1]).unwrap();
        ChemMesh::new(MeshId(id), Box::new(cube), MeshSettings::default())
    }

    #[test]
    fn test_default_cube() {
        let settings = MeshSettings {
            default_size: 27.0,
            default_entries: 27,
            ..MeshSettings::default()
        };
        let mesh = ChemMesh::default_cube(MeshId(0), settings).unwrap();
        assert_eq!(mesh.num_entries(), 27);
        assert_eq!(mesh.num_dimensions(), 3);
        assert!((mesh.entire_size() - 27.0).abs() < 1e-9);
        assert_eq!(mesh.method(), "");
    }

    #[test]
    fn test_set_entire_size_keeps_count_and_bumps_epoch() {
        let mut mesh = slab(0, 0.0);
        mesh.set_entire_size(1e-18).unwrap();
        // Three entries fall back to a single voxel per side
        assert_eq!(mesh.num_entries(), 1);
        assert_eq!(mesh.epoch(), 1);
        assert!(mesh.set_entire_size(0.0).is_err());
        assert_eq!(mesh.epoch(), 1);
    }

    #[test]
    fn test_rebuilding_junction_does_not_duplicate() {
        let mut a = slab(0, 0.0);
        let mut b = slab(1, 3.0);
        a.build_junction(&mut b).unwrap();
        a.build_junction(&mut b).unwrap();
        assert_eq!(a.stencil().num_remote_couplings(), 1);
    }

    #[test]
    fn test_symmetric_junction_extends_both() {
        let mut a = slab(0, 0.0);
        a.settings.symmetric_junctions = true;
        let mut b = slab(1, 3.0);
        a.build_junction(&mut b).unwrap();
        a.build_junction(&mut b).unwrap();
        assert_eq!(b.stencil().num_remote_couplings(), 1);
        assert_eq!(b.stencil().row(0).len(), 2);
    }

    #[test]
    fn test_stale_junctions_after_peer_resize() {
        let mut a = slab(0, 0.0);
        let mut b = slab(1, 3.0);
        a.build_junction(&mut b).unwrap();
        assert!(!a.has_stale_junctions(&b));
        b.build_default_mesh(1.0, 8).unwrap();
        assert!(a.has_stale_junctions(&b));
        a.reset_stencil();
        assert!(!a.has_stale_junctions(&b));
        assert_eq!(a.stencil(), &a.geometry().core_stencil());
    }

    #[test]
    fn test_mesh_stats_unique_volumes() {
        let mesh = slab(0, 0.0);
        let stats = mesh.mesh_stats();
        assert_eq!(stats.num_entries, 3);
        assert_eq!(stats.volumes, vec![5.0]);
    }

    #[test]
    fn test_update_diffusion_without_sink() {
        let mut mesh = slab(0, 0.0);
        assert!(!mesh.update_diffusion(0));
    }

    #[test]
    fn test_node_info_validation() {
        let mut mesh = slab(0, 0.0);
        assert!(matches!(
            mesh.handle_node_info(0, 1),
            Err(MeshError::InvalidNodeInfo { .. })
        ));
        mesh.settings.node_index = 2;
        assert!(matches!(
            mesh.handle_node_info(2, 1),
            Err(MeshError::NodeOutOfRange { .. })
        ));
        let split = mesh.handle_node_info(3, 1).unwrap();
        assert_eq!(split.local_entries, vec![2]);
    }

    #[test]
    fn test_split_uses_configured_layout() {
        let mut mesh = slab(0, 0.0);
        assert_eq!(mesh.configured_node_info().unwrap(), NodeInfo::new(1, 1).unwrap());
        mesh.settings.num_nodes = 3;
        mesh.settings.threads_per_node = 2;
        mesh.settings.node_index = 1;
        let split = mesh.split_configured().unwrap();
        assert_eq!((split.node, split.num_nodes), (1, 3));
        assert_eq!(split.local_entries, vec![1]);
        assert_eq!(split.thread_ranges, vec![0..1, 1..1]);

        mesh.settings.num_nodes = 0;
        assert!(matches!(mesh.split_configured(), Err(MeshError::InvalidNodeInfo { .. })));
    }
}
