// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Diffusion stencils
//!
//! A stencil lists, for every entry of a mesh, the entries it exchanges
//! diffusive flux with and the geometric coupling coefficient
//! (interface area over centre distance). Neighbours are either in the same
//! mesh or, after a junction has been built, in another mesh.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{MeshError, Result};
use crate::junction::VoxelJunction;

/// Mesh identity, used to address remote neighbours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MeshId(pub u32);

impl fmt::Display for MeshId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mesh({})", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Neighbor {
    Local(usize),
    Remote { mesh: MeshId, entry: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coupling {
    pub neighbor: Neighbor,
    pub coefficient: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Stencil {
    rows: Vec<Vec<Coupling>>,
}

impl Stencil {
    pub fn new(num_entries: usize) -> Self {
        Self {
            rows: vec![Vec::new(); num_entries],
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, entry: usize) -> &[Coupling] {
        self.rows.get(entry).map_or(&[], |r| r.as_slice())
    }

    pub fn rows(&self) -> &[Vec<Coupling>] {
        &self.rows
    }

    pub fn num_couplings(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    pub fn num_remote_couplings(&self) -> usize {
        self.rows
            .iter()
            .flatten()
            .filter(|c| matches!(c.neighbor, Neighbor::Remote { .. }))
            .count()
    }

    /// Add one directed coupling
    pub fn add(&mut self, entry: usize, neighbor: Neighbor, coefficient: f64) -> Result<()> {
        if !coefficient.is_finite() || coefficient < 0.0 {
            return Err(MeshError::NegativeCoefficient { entry, coefficient });
        }
        let len = self.rows.len();
        if let Neighbor::Local(other) = neighbor {
            if other >= len {
                return Err(MeshError::EntryOutOfRange { entry: other, len });
            }
        }
        let row = self
            .rows
            .get_mut(entry)
            .ok_or(MeshError::EntryOutOfRange { entry, len })?;
        row.push(Coupling {
            neighbor,
            coefficient,
        });
        Ok(())
    }

    /// Add a coupling in both directions between two local entries
    pub fn add_symmetric(&mut self, a: usize, b: usize, coefficient: f64) -> Result<()> {
        self.add(a, Neighbor::Local(b), coefficient)?;
        self.add(b, Neighbor::Local(a), coefficient)
    }

    /// Append the `first` side of each junction as remote neighbours in `mesh`
    ///
    /// All junctions are validated before any is applied.
    pub fn extend(&mut self, mesh: MeshId, junctions: &[VoxelJunction]) -> Result<usize> {
        for j in junctions {
            if j.first >= self.rows.len() {
                return Err(MeshError::EntryOutOfRange {
                    entry: j.first,
                    len: self.rows.len(),
                });
            }
            if !j.coefficient.is_finite() || j.coefficient < 0.0 {
                return Err(MeshError::NegativeCoefficient {
                    entry: j.first,
                    coefficient: j.coefficient,
                });
            }
        }
        for j in junctions {
            self.rows[j.first].push(Coupling {
                neighbor: Neighbor::Remote {
                    mesh,
                    entry: j.second,
                },
                coefficient: j.coefficient,
            });
        }
        Ok(junctions.len())
    }

    /// Drop every coupling into `mesh`, returning how many were removed
    pub fn remove_remote(&mut self, mesh: MeshId) -> usize {
        let mut removed = 0;
        for row in &mut self.rows {
            let before = row.len();
            row.retain(|c| !matches!(c.neighbor, Neighbor::Remote { mesh: m, .. } if m == mesh));
            removed += before - row.len();
        }
        removed
    }

    /// Local neighbours of an entry
    pub fn local_neighbors(&self, entry: usize) -> impl Iterator<Item = usize> + '_ {
        self.row(entry).iter().filter_map(|c| match c.neighbor {
            Neighbor::Local(other) => Some(other),
            Neighbor::Remote { .. } => None,
        })
    }

    /// Rate of change of concentration of one entry
    ///
    /// Flux from a neighbour is `D · coefficient · (c_neighbour - c_entry)`;
    /// the rate divides the net flux by the entry volume.
    fn rate_for<L, F>(&self, entry: usize, local: &L, volume: f64, diff_const: f64, remote: &F) -> Result<f64>
    where
        L: Fn(usize) -> Option<f64>,
        F: Fn(MeshId, usize) -> Option<f64>,
    {
        let here = local(entry).ok_or(MeshError::MissingHalo { entry })?;
        let mut flux = 0.0;
        for coupling in self.row(entry) {
            let there = match coupling.neighbor {
                Neighbor::Local(other) => local(other).ok_or(MeshError::MissingHalo { entry: other })?,
                Neighbor::Remote { mesh, entry } => {
                    remote(mesh, entry).ok_or(MeshError::MissingRemote { mesh, entry })?
                }
            };
            flux += coupling.coefficient * (there - here);
        }
        Ok(diff_const * flux / volume)
    }

    fn check_lengths(&self, conc: &[f64], volumes: &[f64]) -> Result<()> {
        for actual in [conc.len(), volumes.len()] {
            if actual != self.rows.len() {
                return Err(MeshError::LengthMismatch {
                    expected: self.rows.len(),
                    actual,
                });
            }
        }
        Ok(())
    }

    /// du/dt for every entry
    pub fn diffusion_rates<F>(&self, conc: &[f64], volumes: &[f64], diff_const: f64, remote: F) -> Result<Vec<f64>>
    where
        F: Fn(MeshId, usize) -> Option<f64>,
    {
        self.check_lengths(conc, volumes)?;
        let local = |entry: usize| conc.get(entry).copied();
        volumes
            .iter()
            .enumerate()
            .map(|(entry, &volume)| self.rate_for(entry, &local, volume, diff_const, &remote))
            .collect()
    }

    /// du/dt for a subset of entries
    pub fn diffusion_rates_for<F>(
        &self,
        entries: &[usize],
        conc: &[f64],
        volumes: &[f64],
        diff_const: f64,
        remote: F,
    ) -> Result<Vec<f64>>
    where
        F: Fn(MeshId, usize) -> Option<f64>,
    {
        self.check_lengths(conc, volumes)?;
        self.diffusion_rates_with(entries, |entry| conc.get(entry).copied(), volumes, diff_const, remote)
    }

    /// du/dt for a subset of entries, reading concentrations through `local`
    ///
    /// `local` only has to answer for `entries` and their local neighbours,
    /// which is what a node holds once it has received its halo.
    pub fn diffusion_rates_with<L, F>(
        &self,
        entries: &[usize],
        local: L,
        volumes: &[f64],
        diff_const: f64,
        remote: F,
    ) -> Result<Vec<f64>>
    where
        L: Fn(usize) -> Option<f64>,
        F: Fn(MeshId, usize) -> Option<f64>,
    {
        let len = self.rows.len();
        entries
            .iter()
            .map(|&entry| {
                let volume = match volumes.get(entry) {
                    Some(&volume) if entry < len => volume,
                    _ => return Err(MeshError::EntryOutOfRange { entry, len }),
                };
                self.rate_for(entry, &local, volume, diff_const, &remote)
            })
            .collect()
    }
}

/// Closure for meshes without remote neighbours
pub fn no_remote(_mesh: MeshId, _entry: usize) -> Option<f64> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(n: usize) -> Stencil {
        let mut s = Stencil::new(n);
        for i in 1..n {
            s.add_symmetric(i - 1, i, 2.0).unwrap();
        }
        s
    }

    #[test]
    fn test_rejects_negative_coefficient() {
        let mut s = Stencil::new(2);
        assert!(matches!(
            s.add(0, Neighbor::Local(1), -1.0),
            Err(MeshError::NegativeCoefficient { .. })
        ));
        assert!(s.add(0, Neighbor::Local(5), 1.0).is_err());
        assert_eq!(s.num_couplings(), 0);
    }

    #[test]
    fn test_extend_validates_before_applying() {
        let mut s = chain(3);
        let bad = [
            VoxelJunction::new(2, 0, 1.0),
            VoxelJunction::new(7, 0, 1.0),
        ];
        assert!(s.extend(MeshId(1), &bad).is_err());
        assert_eq!(s.num_remote_couplings(), 0);

        assert_eq!(s.extend(MeshId(1), &bad[..1]).unwrap(), 1);
        assert_eq!(s.num_remote_couplings(), 1);
    }

    #[test]
    fn test_rates_conserve_mass() {
        let s = chain(4);
        let conc = [1.0, 0.0, 3.0, 0.5];
        let volumes = [1.0, 2.0, 0.5, 1.5];
        let rates = s.diffusion_rates(&conc, &volumes, 0.1, no_remote).unwrap();
        let net: f64 = rates.iter().zip(&volumes).map(|(r, v)| r * v).sum();
        assert!(net.abs() < 1e-12);
        // Entry 0 only sees entry 1
        assert!((rates[0] - 0.1 * 2.0 * (0.0 - 1.0) / 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_remote_concentration_is_required() {
        let mut s = chain(2);
        s.extend(MeshId(4), &[VoxelJunction::new(1, 0, 1.0)]).unwrap();
        let conc = [0.0, 0.0];
        let volumes = [1.0, 1.0];
        assert!(matches!(
            s.diffusion_rates(&conc, &volumes, 1.0, no_remote),
            Err(MeshError::MissingRemote { .. })
        ));
        let rates = s
            .diffusion_rates(&conc, &volumes, 1.0, |_, _| Some(2.0))
            .unwrap();
        assert_eq!(rates, vec![0.0, 2.0]);
    }
}
