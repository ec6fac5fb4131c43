// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Sink delivery and decomposition properties across the public API

use std::sync::Arc;

use biokinetics_mesh::prelude::*;
use biokinetics_mesh::{no_remote, Neighbor};
use parking_lot::Mutex;
use proptest::prelude::*;

#[derive(Debug, Default)]
struct Recorded {
    stencils: Vec<(usize, usize)>,
    splits: Vec<MeshSplit>,
}

#[derive(Debug, Clone, Default)]
struct RecordingSink(Arc<Mutex<Recorded>>);

impl DiffusionSink for RecordingSink {
    fn update_diffusion(&mut self, mesh_index: usize, stencil: &Stencil) {
        self.0.lock().stencils.push((mesh_index, stencil.num_couplings()));
    }

    fn handle_mesh_split(&mut self, split: &MeshSplit) {
        self.0.lock().splits.push(split.clone());
    }
}

fn grid(id: u32, origin: [f64; 3], counts: [usize; 3]) -> ChemMesh {
    let cube = CubeMesh::new(origin, [1.0; 3], counts).unwrap();
    ChemMesh::new(MeshId(id), Box::new(cube), MeshSettings::default())
}

#[test]
fn test_sink_receives_stencil_and_split() {
    let sink = RecordingSink::default();
    let mut mesh = grid(0, [0.0; 3], [4, 1, 1]);
    mesh.attach_sink(Box::new(sink.clone()));

    assert!(mesh.update_diffusion(3));
    let split = mesh.handle_node_info(2, 2).unwrap();

    let recorded = sink.0.lock();
    assert_eq!(recorded.stencils, vec![(3, 6)]);
    assert_eq!(recorded.splits, vec![split]);
}

#[test]
fn test_split_serialises() {
    let mesh = grid(0, [0.0; 3], [3, 3, 1]);
    let split = mesh.decompose(NodeInfo::new(2, 1).unwrap()).unwrap().split(1).unwrap();
    let json = serde_json::to_string(&split).unwrap();
    let back: MeshSplit = serde_json::from_str(&json).unwrap();
    assert_eq!(back, split);
}

#[test]
fn test_cross_mesh_flux_flows_one_way() {
    let mut a = grid(0, [0.0; 3], [2, 1, 1]);
    let mut b = grid(1, [2.0, 0.0, 0.0], [2, 1, 1]);
    a.build_junction(&mut b).unwrap();

    let row = a.stencil().row(1);
    assert!(row.contains(&biokinetics_mesh::Coupling {
        neighbor: Neighbor::Remote {
            mesh: MeshId(1),
            entry: 0
        },
        coefficient: 1.0
    }));

    let b_conc = [4.0, 0.0];
    let rates = a
        .diffusion_rates(&[0.0, 0.0], 0.5, |mesh, entry| (mesh == MeshId(1)).then(|| b_conc[entry]))
        .unwrap();
    assert_eq!(rates, vec![0.0, 2.0]);

    // b has no view of a
    let rates = b.diffusion_rates(&b_conc, 0.5, no_remote).unwrap();
    assert_eq!(rates, vec![-2.0, 2.0]);
}

proptest! {
    #[test]
    fn prop_outgoing_matches_incoming(
        nx in 1usize..6,
        ny in 1usize..4,
        nz in 1usize..3,
        nodes in 1usize..6,
        threads in 1usize..4,
    ) {
        let mesh = grid(0, [0.0; 3], [nx, ny, nz]);
        let d = mesh.decompose(NodeInfo::new(nodes, threads).unwrap()).unwrap();
        let splits = d.split_all();
        prop_assert_eq!(splits.len(), nodes);

        let mut owned: Vec<usize> = splits.iter().flat_map(|s| s.local_entries.clone()).collect();
        owned.sort_unstable();
        prop_assert_eq!(owned, (0..nx * ny * nz).collect::<Vec<_>>());

        for i in 0..nodes {
            for j in 0..nodes {
                prop_assert_eq!(&splits[i].outgoing[j], &splits[j].incoming[i]);
            }
            prop_assert!(splits[i].outgoing[i].is_empty());
            let covered: usize = splits[i].thread_ranges.iter().map(|r| r.len()).sum();
            prop_assert_eq!(covered, splits[i].local_entries.len());
        }
    }
}
