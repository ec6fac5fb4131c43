// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Node decomposition
//!
//! Entries are dealt out to nodes in contiguous, balanced blocks. For every
//! ordered pair of nodes the decomposition records which entries sit on the
//! cut; node `i`'s outgoing list towards `j` is by construction the same list
//! node `j` reads as incoming from `i`.

use std::collections::BTreeSet;
use std::ops::Range;

use ahash::AHashMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MeshError, Result};
use crate::stencil::{MeshId, Stencil};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub num_nodes: usize,
    pub threads_per_node: usize,
}

impl NodeInfo {
    pub fn new(num_nodes: usize, threads_per_node: usize) -> Result<Self> {
        if num_nodes == 0 || threads_per_node == 0 {
            return Err(MeshError::InvalidNodeInfo {
                num_nodes,
                threads_per_node,
            });
        }
        Ok(Self {
            num_nodes,
            threads_per_node,
        })
    }
}

/// Partition plan for one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshSplit {
    pub node: usize,
    pub num_nodes: usize,
    pub num_entries: usize,
    /// Volume of the first entry before the split
    pub old_volume: f64,
    pub volumes: Vec<f64>,
    /// Entries owned by this node, ascending
    pub local_entries: Vec<usize>,
    /// `outgoing[j]`: local entries whose concentration node `j` needs
    pub outgoing: Vec<Vec<usize>>,
    /// `incoming[j]`: entries of node `j` this node needs
    pub incoming: Vec<Vec<usize>>,
    /// Contiguous ranges into `local_entries`, one per worker thread
    pub thread_ranges: Vec<Range<usize>>,
}

impl MeshSplit {
    fn local_position(&self, entry: usize) -> Option<usize> {
        self.local_entries.binary_search(&entry).ok()
    }

    /// Values this node sends, `result[j]` in the order of `outgoing[j]`
    ///
    /// `local_conc` is indexed like `local_entries`.
    pub fn gather_outgoing(&self, local_conc: &[f64]) -> Result<Vec<Vec<f64>>> {
        if local_conc.len() != self.local_entries.len() {
            return Err(MeshError::LengthMismatch {
                expected: self.local_entries.len(),
                actual: local_conc.len(),
            });
        }
        self.outgoing
            .iter()
            .map(|entries| {
                entries
                    .iter()
                    .map(|&entry| {
                        self.local_position(entry)
                            .map(|i| local_conc[i])
                            .ok_or(MeshError::EntryOutOfRange {
                                entry,
                                len: self.num_entries,
                            })
                    })
                    .collect()
            })
            .collect()
    }

    /// du/dt for the local entries from local values and the received halo
    ///
    /// `halo[j]` holds node `j`'s values in the order of `incoming[j]`,
    /// which is what node `j`'s [`gather_outgoing`](Self::gather_outgoing)
    /// produced for this node.
    pub fn halo_rates<F>(
        &self,
        stencil: &Stencil,
        local_conc: &[f64],
        halo: &[Vec<f64>],
        diff_const: f64,
        remote: F,
    ) -> Result<Vec<f64>>
    where
        F: Fn(MeshId, usize) -> Option<f64>,
    {
        if local_conc.len() != self.local_entries.len() {
            return Err(MeshError::LengthMismatch {
                expected: self.local_entries.len(),
                actual: local_conc.len(),
            });
        }
        if halo.len() != self.incoming.len() {
            return Err(MeshError::LengthMismatch {
                expected: self.incoming.len(),
                actual: halo.len(),
            });
        }
        let mut received = AHashMap::new();
        for (entries, values) in self.incoming.iter().zip(halo) {
            if entries.len() != values.len() {
                return Err(MeshError::LengthMismatch {
                    expected: entries.len(),
                    actual: values.len(),
                });
            }
            received.extend(entries.iter().copied().zip(values.iter().copied()));
        }

        let local = |entry: usize| match self.local_position(entry) {
            Some(i) => Some(local_conc[i]),
            None => received.get(&entry).copied(),
        };
        stencil.diffusion_rates_with(&self.local_entries, local, &self.volumes, diff_const, remote)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeDecomposition {
    info: NodeInfo,
    volumes: Vec<f64>,
    blocks: Vec<Range<usize>>,
    /// `cut[i][j]`: entries owned by `i` adjacent to an entry owned by `j`
    cut: Vec<Vec<Vec<usize>>>,
}

fn balanced_ranges(len: usize, parts: usize) -> Vec<Range<usize>> {
    let base = len / parts;
    let extra = len % parts;
    let mut start = 0;
    (0..parts)
        .map(|p| {
            let size = base + usize::from(p < extra);
            let range = start..start + size;
            start += size;
            range
        })
        .collect()
}

impl NodeDecomposition {
    pub fn new(info: NodeInfo, stencil: &Stencil, volumes: &[f64]) -> Result<Self> {
        let n = stencil.len();
        if volumes.len() != n {
            return Err(MeshError::LengthMismatch {
                expected: n,
                actual: volumes.len(),
            });
        }
        if let Some((entry, &volume)) = volumes
            .iter()
            .enumerate()
            .find(|(_, v)| !v.is_finite() || **v <= 0.0)
        {
            return Err(MeshError::InvalidVolume { entry, volume });
        }

        let blocks = balanced_ranges(n, info.num_nodes);
        let owner = |entry: usize| blocks.iter().position(|b| b.contains(&entry));

        let mut sets = vec![vec![BTreeSet::new(); info.num_nodes]; info.num_nodes];
        for entry in 0..n {
            let Some(here) = owner(entry) else { continue };
            for neighbor in stencil.local_neighbors(entry) {
                let Some(there) = owner(neighbor) else { continue };
                if here != there {
                    // Directed stencils still exchange both ways across the cut
                    sets[here][there].insert(entry);
                    sets[there][here].insert(neighbor);
                }
            }
        }
        let cut = sets
            .into_iter()
            .map(|row| row.into_iter().map(|s| s.into_iter().collect()).collect())
            .collect();

        debug!(
            target: "biokinetics-mesh",
            "decomposed {} entries over {} nodes x {} threads",
            n,
            info.num_nodes,
            info.threads_per_node
        );

        Ok(Self {
            info,
            volumes: volumes.to_vec(),
            blocks,
            cut,
        })
    }

    pub fn info(&self) -> NodeInfo {
        self.info
    }

    pub fn num_entries(&self) -> usize {
        self.volumes.len()
    }

    pub fn node_of(&self, entry: usize) -> Option<usize> {
        self.blocks.iter().position(|b| b.contains(&entry))
    }

    pub fn local_entries(&self, node: usize) -> Result<Vec<usize>> {
        self.check_node(node)?;
        Ok(self.blocks[node].clone().collect())
    }

    fn check_node(&self, node: usize) -> Result<()> {
        if node >= self.info.num_nodes {
            return Err(MeshError::NodeOutOfRange {
                node,
                num_nodes: self.info.num_nodes,
            });
        }
        Ok(())
    }

    pub fn split(&self, node: usize) -> Result<MeshSplit> {
        self.check_node(node)?;
        let local_entries: Vec<usize> = self.blocks[node].clone().collect();
        let thread_ranges = balanced_ranges(local_entries.len(), self.info.threads_per_node);
        Ok(MeshSplit {
            node,
            num_nodes: self.info.num_nodes,
            num_entries: self.volumes.len(),
            old_volume: self.volumes.first().copied().unwrap_or(0.0),
            volumes: self.volumes.clone(),
            local_entries,
            outgoing: self.cut[node].clone(),
            incoming: self.cut.iter().map(|row| row[node].clone()).collect(),
            thread_ranges,
        })
    }

    /// Splits for every node, computed in parallel
    pub fn split_all(&self) -> Vec<MeshSplit> {
        (0..self.info.num_nodes)
            .into_par_iter()
            .filter_map(|node| self.split(node).ok())
            .collect()
    }

    /// du/dt for the entries owned by `node`, in `local_entries` order
    pub fn local_rates<F>(&self, node: usize, stencil: &Stencil, conc: &[f64], diff_const: f64, remote: F) -> Result<Vec<f64>>
    where
        F: Fn(MeshId, usize) -> Option<f64>,
    {
        self.check_node(node)?;
        let entries: Vec<usize> = self.blocks[node].clone().collect();
        stencil.diffusion_rates_for(&entries, conc, &self.volumes, diff_const, remote)
    }

    /// [`local_rates`](Self::local_rates) for every node, one task per node
    pub fn all_local_rates<F>(&self, stencil: &Stencil, conc: &[f64], diff_const: f64, remote: F) -> Result<Vec<Vec<f64>>>
    where
        F: Fn(MeshId, usize) -> Option<f64> + Sync,
    {
        (0..self.info.num_nodes)
            .into_par_iter()
            .map(|node| self.local_rates(node, stencil, conc, diff_const, &remote))
            .collect()
    }
}
