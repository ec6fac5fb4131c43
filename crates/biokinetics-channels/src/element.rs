// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Channel elements
//!
//! An element groups the instances of one channel class. Its storage is
//! either native [`HhChannel`]s integrated here, or [`SolverChannel`]
//! records after the element has been handed to a collective solver.

use rayon::prelude::*;
use tracing::{debug, trace, warn};

use crate::arena::RateTableArena;
use crate::channel::{ChannelOutput, HhChannel};
use crate::error::{ChannelError, Result};
use crate::gate::GateName;
use crate::ids::{ChannelId, ElementId, SolverId};
use crate::settings::IntegrationSettings;
use crate::snapshot::{ParameterSnapshot, PARAMS_PER_CHANNEL};
use crate::solver::{ChannelSolver, SolverChannel};

/// Instance storage of an element
#[derive(Debug, Clone)]
pub enum ChannelStorage {
    Native(Vec<HhChannel>),
    Solver {
        solver: SolverId,
        channels: Vec<SolverChannel>,
    },
}

#[derive(Debug, Clone)]
pub struct ChannelElement {
    id: ElementId,
    settings: IntegrationSettings,
    storage: ChannelStorage,
}

impl ChannelElement {
    /// `count` original channels with consecutive ids from `first`
    pub fn new(id: ElementId, first: ChannelId, count: usize, settings: IntegrationSettings) -> Self {
        let channels = (0..count)
            .map(|i| HhChannel::new(ChannelId(first.0 + i as u32), settings))
            .collect();
        Self {
            id,
            settings,
            storage: ChannelStorage::Native(channels),
        }
    }

    pub fn from_channels(id: ElementId, mut channels: Vec<HhChannel>, settings: IntegrationSettings) -> Self {
        for channel in channels.iter_mut() {
            channel.set_settings(settings);
        }
        Self {
            id,
            settings,
            storage: ChannelStorage::Native(channels),
        }
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn settings(&self) -> &IntegrationSettings {
        &self.settings
    }

    pub fn storage(&self) -> &ChannelStorage {
        &self.storage
    }

    pub fn len(&self) -> usize {
        match &self.storage {
            ChannelStorage::Native(channels) => channels.len(),
            ChannelStorage::Solver { channels, .. } => channels.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_zombified(&self) -> bool {
        matches!(self.storage, ChannelStorage::Solver { .. })
    }

    pub fn solver(&self) -> Option<SolverId> {
        match &self.storage {
            ChannelStorage::Native(_) => None,
            ChannelStorage::Solver { solver, .. } => Some(*solver),
        }
    }

    pub fn channels(&self) -> Option<&[HhChannel]> {
        match &self.storage {
            ChannelStorage::Native(channels) => Some(channels),
            ChannelStorage::Solver { .. } => None,
        }
    }

    pub fn channels_mut(&mut self) -> Option<&mut [HhChannel]> {
        match &mut self.storage {
            ChannelStorage::Native(channels) => Some(channels),
            ChannelStorage::Solver { .. } => None,
        }
    }

    pub fn solver_channels(&self) -> Option<&[SolverChannel]> {
        match &self.storage {
            ChannelStorage::Native(_) => None,
            ChannelStorage::Solver { channels, .. } => Some(channels),
        }
    }

    pub fn solver_channels_mut(&mut self) -> Option<&mut [SolverChannel]> {
        match &mut self.storage {
            ChannelStorage::Native(_) => None,
            ChannelStorage::Solver { channels, .. } => Some(channels),
        }
    }

    /// The six migrated parameters of every instance
    pub fn parameters(&self) -> ParameterSnapshot {
        match &self.storage {
            ChannelStorage::Native(channels) => ParameterSnapshot::capture(channels),
            ChannelStorage::Solver { channels, .. } => ParameterSnapshot::capture(channels),
        }
    }

    fn native_mut(&mut self) -> Result<&mut Vec<HhChannel>> {
        match &mut self.storage {
            ChannelStorage::Native(channels) => Ok(channels),
            ChannelStorage::Solver { solver, .. } => Err(ChannelError::SolverOwned {
                element: self.id,
                solver: *solver,
            }),
        }
    }

    /// Assign a gate power on every instance; returns how many changed
    pub fn set_power(&mut self, gate: GateName, power: f64, arena: &mut RateTableArena) -> Result<usize> {
        let mut changed = 0;
        match &mut self.storage {
            ChannelStorage::Native(channels) => {
                for channel in channels.iter_mut() {
                    changed += usize::from(channel.set_power(gate, power, arena)?);
                }
            }
            ChannelStorage::Solver { channels, .. } => {
                for channel in channels.iter_mut() {
                    changed += usize::from(channel.set_power(gate, power)?);
                }
            }
        }
        Ok(changed)
    }

    /// Element of copies sharing this element's tables, instance by instance
    pub fn duplicate(&self, id: ElementId, first: ChannelId, arena: &mut RateTableArena) -> Result<ChannelElement> {
        let channels = match &self.storage {
            ChannelStorage::Native(channels) => channels,
            ChannelStorage::Solver { solver, .. } => {
                return Err(ChannelError::SolverOwned {
                    element: self.id,
                    solver: *solver,
                })
            }
        };
        let copies = channels
            .iter()
            .enumerate()
            .map(|(i, channel)| channel.duplicate(ChannelId(first.0 + i as u32), arena))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            id,
            settings: self.settings,
            storage: ChannelStorage::Native(copies),
        })
    }

    /// Release every table reference held by native instances
    pub fn release(&mut self, arena: &mut RateTableArena) {
        if let ChannelStorage::Native(channels) = &mut self.storage {
            for channel in channels.iter_mut() {
                channel.release_tables(arena);
            }
        }
    }

    /// Advance every instance by `dt`
    ///
    /// Elements at or above the parallel threshold are updated with rayon;
    /// the arena is only read during the tick.
    pub fn process(&mut self, arena: &RateTableArena, dt: f64) -> Result<Vec<ChannelOutput>> {
        let threshold = self.settings.parallel_threshold;
        let id = self.id;
        let channels = self.native_mut()?;
        trace!(target: "biokinetics-channels", "{}: processing {} instances", id, channels.len());
        if channels.len() >= threshold {
            Ok(channels.par_iter_mut().map(|c| c.process(arena, dt)).collect())
        } else {
            Ok(channels.iter_mut().map(|c| c.process(arena, dt)).collect())
        }
    }

    pub fn reinit(&mut self, arena: &RateTableArena) -> Result<Vec<ChannelOutput>> {
        let channels = self.native_mut()?;
        Ok(channels.iter_mut().map(|c| c.reinit(arena)).collect())
    }

    /// Hand the element over to a solver that has already adopted it
    ///
    /// Snapshots Gbar, Ek, the three powers and `use_concentration` of every
    /// instance, swaps the storage to solver records, then replays the values
    /// through the record setters. `use_concentration` is not replayed; the
    /// solver consumed it during adoption. Returns `Ok(false)` when there was
    /// nothing to do.
    pub fn zombify(&mut self, solver: &dyn ChannelSolver) -> Result<bool> {
        let channels = match &self.storage {
            ChannelStorage::Solver { solver: owner, .. } if *owner == solver.solver_id() => {
                return Ok(false);
            }
            ChannelStorage::Solver { solver: owner, .. } => {
                warn!(
                    target: "biokinetics-channels",
                    "{} already handed to {}",
                    self.id, owner
                );
                return Err(ChannelError::SolverOwned {
                    element: self.id,
                    solver: *owner,
                });
            }
            ChannelStorage::Native(channels) => channels,
        };
        if channels.is_empty() {
            return Ok(false);
        }

        let slots = solver.adopted_slots(self.id).ok_or_else(|| {
            warn!(
                target: "biokinetics-channels",
                "{} must be adopted by {} before zombify",
                self.id,
                solver.solver_id()
            );
            ChannelError::NotAdopted {
                element: self.id,
                solver: solver.solver_id(),
            }
        })?;
        if slots.len() != channels.len() {
            return Err(ChannelError::SlotMismatch {
                element: self.id,
                expected: slots.len(),
                actual: channels.len(),
            });
        }

        let snapshot = ParameterSnapshot::capture(channels);
        let ids: Vec<ChannelId> = channels.iter().map(|c| c.id()).collect();

        let solver_id = solver.solver_id();
        let limit = self.settings.power_warning_limit;
        let swapped = ids
            .into_iter()
            .zip(slots)
            .map(|(id, slot)| {
                let tables = GateName::ALL.map(|gate| solver.has_table(slot, gate));
                SolverChannel::new(id, solver_id, slot, solver.use_concentration(slot), tables, limit)
            })
            .collect();
        self.storage = ChannelStorage::Solver {
            solver: solver_id,
            channels: swapped,
        };

        let Some(records) = self.solver_channels_mut() else {
            return Ok(false);
        };
        for (i, record) in records.iter_mut().enumerate() {
            let values = snapshot.channel(i);
            debug_assert_eq!(values.len(), PARAMS_PER_CHANNEL);
            record.set_gbar(values[0]);
            record.set_ek(values[1]);
            record.set_power(GateName::X, values[2])?;
            record.set_power(GateName::Y, values[3])?;
            record.set_power(GateName::Z, values[4])?;
        }

        debug!(
            target: "biokinetics-channels",
            "{} zombified into {} ({} instances)",
            self.id,
            solver_id,
            snapshot.len()
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_table::{RateLookup, TableAxis};
    use crate::solver::CollectiveSolver;

    fn populated(count: usize, settings: IntegrationSettings) -> (ChannelElement, RateTableArena) {
        let mut arena = RateTableArena::new();
        let mut element = ChannelElement::new(ElementId(1), ChannelId(100), count, settings);
        let axis = TableAxis::new(-0.1, 0.05, 1).unwrap();
        for (i, chan) in element.channels_mut().unwrap().iter_mut().enumerate() {
            chan.set_gbar(1.0 + i as f64);
            chan.set_ek(-0.07);
            chan.handle_vm(-0.05);
            chan.set_power(GateName::X, 3.0, &mut arena).unwrap();
            chan.set_power(GateName::Y, 1.0, &mut arena).unwrap();
            let table = RateLookup::from_samples(axis, vec![200.0, 200.0], vec![400.0, 400.0]).unwrap();
            chan.set_gate_table(GateName::X, table.clone(), &mut arena).unwrap();
            chan.set_gate_table(GateName::Y, table, &mut arena).unwrap();
        }
        (element, arena)
    }

    #[test]
    fn test_parallel_and_serial_paths_agree() {
        let serial_settings = IntegrationSettings {
            parallel_threshold: usize::MAX,
            ..IntegrationSettings::default()
        };
        let parallel_settings = IntegrationSettings {
            parallel_threshold: 1,
            ..IntegrationSettings::default()
        };
        let (mut serial, serial_arena) = populated(16, serial_settings);
        let (mut parallel, parallel_arena) = populated(16, parallel_settings);

        let a = serial.process(&serial_arena, 1e-4).unwrap();
        let b = parallel.process(&parallel_arena, 1e-4).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_zombify_requires_adoption() {
        let (mut element, _arena) = populated(2, IntegrationSettings::default());
        let solver = CollectiveSolver::new(SolverId(9), IntegrationSettings::default());
        assert!(matches!(
            element.zombify(&solver),
            Err(ChannelError::NotAdopted { .. })
        ));
        assert!(!element.is_zombified());
    }

    #[test]
    fn test_zombify_is_idempotent() {
        let (mut element, _arena) = populated(3, IntegrationSettings::default());
        let mut solver = CollectiveSolver::new(SolverId(9), IntegrationSettings::default());
        solver.adopt(&element).unwrap();

        assert!(element.zombify(&solver).unwrap());
        let after_first = element.parameters();
        assert!(!element.zombify(&solver).unwrap());
        assert!(after_first.bit_identical(&element.parameters()));
        assert!(element.process(&RateTableArena::new(), 1e-4).is_err());
    }

    #[test]
    fn test_empty_element_is_left_native() {
        let mut element = ChannelElement::new(ElementId(4), ChannelId(0), 0, IntegrationSettings::default());
        let solver = CollectiveSolver::new(SolverId(1), IntegrationSettings::default());
        assert!(!element.zombify(&solver).unwrap());
        assert!(!element.is_zombified());
    }

    #[test]
    fn test_duplicate_element_shares_tables() {
        let (element, mut arena) = populated(2, IntegrationSettings::default());
        let copy = element.duplicate(ElementId(2), ChannelId(500), &mut arena).unwrap();
        let original_x = element.channels().unwrap()[0].gate(GateName::X).handle().unwrap().id;
        let copy_x = copy.channels().unwrap()[0].gate(GateName::X).handle().unwrap().id;
        assert_eq!(original_x, copy_x);
        assert_eq!(arena.ref_count(original_x), 2);
        assert!(copy.channels().unwrap().iter().all(|c| !c.is_original()));
    }

    #[test]
    fn test_set_power_counts_changes() {
        let (mut element, mut arena) = populated(4, IntegrationSettings::default());
        assert_eq!(element.set_power(GateName::X, 3.0, &mut arena).unwrap(), 0);
        assert_eq!(element.set_power(GateName::X, 2.0, &mut arena).unwrap(), 4);
    }
}
