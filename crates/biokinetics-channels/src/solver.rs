// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Collective solver hand-off
//!
//! A [`CollectiveSolver`] takes over integration of whole elements. Adoption
//! migrates the gate objects (table ids, states, instant flags) and consumes
//! `use_concentration`; the element is then zombified into
//! [`SolverChannel`] records that keep only the parameters set from outside.

use core::ops::Range;

use tracing::{debug, error, warn};

use crate::arena::RateTableArena;
use crate::channel::{drive_values, ChannelOutput};
use crate::element::{ChannelElement, ChannelStorage};
use crate::error::{ChannelError, Result};
use crate::gate::{next_state, GateName};
use crate::ids::{ChannelId, ElementId, SolverId, TableId};
use crate::power::{powers_equal, GatePower};
use crate::rate_table::RatePair;
use crate::settings::IntegrationSettings;

/// What an element needs from the solver it is handed to
pub trait ChannelSolver {
    fn solver_id(&self) -> SolverId;

    /// Solver slots assigned to an adopted element
    fn adopted_slots(&self, element: ElementId) -> Option<Range<usize>>;

    /// `use_concentration` as consumed during adoption
    fn use_concentration(&self, slot: usize) -> bool;

    /// Whether a rate table for `gate` was migrated into `slot`
    fn has_table(&self, slot: usize, gate: GateName) -> bool;
}

/// Solver-backed channel record
#[derive(Debug, Clone)]
pub struct SolverChannel {
    id: ChannelId,
    solver: SolverId,
    slot: usize,
    gbar: f64,
    ek: f64,
    powers: [GatePower; 3],
    /// Gates whose table the solver holds
    tables: [bool; 3],
    use_concentration: bool,
    power_warning_limit: f64,
}

impl SolverChannel {
    pub(crate) fn new(
        id: ChannelId,
        solver: SolverId,
        slot: usize,
        use_concentration: bool,
        tables: [bool; 3],
        power_warning_limit: f64,
    ) -> Self {
        Self {
            id,
            solver,
            slot,
            gbar: 0.0,
            ek: 0.0,
            powers: [GatePower::ZERO; 3],
            tables,
            use_concentration,
            power_warning_limit,
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn solver(&self) -> SolverId {
        self.solver
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn gbar(&self) -> f64 {
        self.gbar
    }

    pub fn set_gbar(&mut self, gbar: f64) {
        self.gbar = gbar;
    }

    pub fn ek(&self) -> f64 {
        self.ek
    }

    pub fn set_ek(&mut self, ek: f64) {
        self.ek = ek;
    }

    pub fn power(&self, gate: GateName) -> f64 {
        self.powers[gate.index()].exponent()
    }

    pub(crate) fn gate_power(&self, gate: GateName) -> GatePower {
        self.powers[gate.index()]
    }

    /// Assign a gate power; tables stay with the solver
    ///
    /// Tables cannot be created after adoption, so a gate that arrived
    /// without one keeps a zero power.
    pub fn set_power(&mut self, gate: GateName, power: f64) -> Result<bool> {
        if power < 0.0 || power.is_nan() {
            warn!(
                target: "biokinetics-channels",
                "{}: cannot use negative power {} for gate {}",
                self.id, power, gate
            );
            return Err(ChannelError::NegativePower { gate, power });
        }
        if power > self.power_warning_limit {
            warn!(
                target: "biokinetics-channels",
                "{}: implausible power {} for gate {}",
                self.id, power, gate
            );
        }
        let current = self.powers[gate.index()];
        if powers_equal(power, current.exponent()) {
            return Ok(false);
        }
        if current.is_zero() && !self.tables[gate.index()] {
            warn!(
                target: "biokinetics-channels",
                "{}: gate {} has no table in {}, power {} refused",
                self.id, gate, self.solver, power
            );
            return Err(ChannelError::MissingTable {
                channel: self.id,
                gate,
            });
        }
        self.powers[gate.index()] = GatePower::new(power);
        Ok(true)
    }

    pub fn use_concentration(&self) -> bool {
        self.use_concentration
    }

    /// Ignored: the solver consumed `use_concentration` at adoption
    pub fn set_use_concentration(&mut self, value: bool) {
        warn!(
            target: "biokinetics-channels",
            "{}: use_concentration={} ignored, owned by {}",
            self.id, value, self.solver
        );
    }
}

#[derive(Debug, Clone, Copy)]
struct MigratedGate {
    table: Option<TableId>,
    state: f64,
    instant: bool,
}

#[derive(Debug, Clone)]
struct SolverSlot {
    gates: [MigratedGate; 3],
    use_concentration: bool,
    vm: f64,
    conc: f64,
    modulation: f64,
}

impl SolverSlot {
    fn rates(&self, gate: GateName, arena: &RateTableArena) -> RatePair {
        let Some(table) = self.gates[gate.index()].table.and_then(|id| arena.table(id)) else {
            error!(
                target: "biokinetics-channels",
                "solver gate {} has a power but no live table",
                gate
            );
            return RatePair::ZERO;
        };
        let (x, y) = drive_values(gate, table, self.vm, self.conc, self.use_concentration);
        table.lookup(x, y)
    }

    /// Advance (`Some(dt)`) or reinitialise (`None`) and combine
    fn update(
        &mut self,
        channel: &SolverChannel,
        arena: &RateTableArena,
        dt: Option<f64>,
        clamp: bool,
    ) -> ChannelOutput {
        let mut g = channel.gbar() * self.modulation;
        for gate in GateName::ALL {
            let power = channel.gate_power(gate);
            if power.is_zero() {
                continue;
            }
            let rates = self.rates(gate, arena);
            let migrated = &mut self.gates[gate.index()];
            migrated.state = match dt {
                Some(dt) => next_state(migrated.state, migrated.instant, rates, dt),
                None => rates.steady_state().unwrap_or(migrated.state),
            };
            if clamp && dt.is_some() {
                migrated.state = migrated.state.clamp(0.0, 1.0);
            }
            g *= power.apply(migrated.state);
        }
        ChannelOutput {
            gk: g,
            ik: g * (self.vm - channel.ek()),
        }
    }
}

/// Solver integrating adopted elements in bulk
#[derive(Debug)]
pub struct CollectiveSolver {
    id: SolverId,
    settings: IntegrationSettings,
    slots: Vec<SolverSlot>,
    adopted: Vec<(ElementId, Range<usize>)>,
}

impl CollectiveSolver {
    pub fn new(id: SolverId, settings: IntegrationSettings) -> Self {
        Self {
            id,
            settings,
            slots: Vec::new(),
            adopted: Vec::new(),
        }
    }

    pub fn id(&self) -> SolverId {
        self.id
    }

    /// Total adopted instances
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Migrate an element's gates into the solver
    ///
    /// Adopting the same element twice returns the existing slots.
    pub fn adopt(&mut self, element: &ChannelElement) -> Result<Range<usize>> {
        if let Some(range) = self.adopted_slots(element.id()) {
            return Ok(range);
        }
        let channels = match element.storage() {
            ChannelStorage::Native(channels) => channels,
            ChannelStorage::Solver { solver, .. } => {
                return Err(ChannelError::SolverOwned {
                    element: element.id(),
                    solver: *solver,
                })
            }
        };

        let start = self.slots.len();
        self.slots.extend(channels.iter().map(|channel| SolverSlot {
            gates: GateName::ALL.map(|gate| {
                let variable = channel.gate(gate);
                MigratedGate {
                    table: variable.handle().map(|h| h.id),
                    state: variable.state(),
                    instant: variable.is_instant(),
                }
            }),
            use_concentration: channel.use_concentration(),
            vm: channel.vm(),
            conc: channel.conc(),
            modulation: channel.modulation(),
        }));
        let range = start..self.slots.len();
        self.adopted.push((element.id(), range.clone()));
        debug!(
            target: "biokinetics-channels",
            "{} adopted {} ({} instances)",
            self.id,
            element.id(),
            range.len()
        );
        Ok(range)
    }

    pub fn handle_vm(&mut self, slot: usize, vm: f64) {
        if let Some(s) = self.slots.get_mut(slot) {
            s.vm = vm;
        }
    }

    pub fn handle_conc(&mut self, slot: usize, conc: f64) {
        if let Some(s) = self.slots.get_mut(slot) {
            s.conc = conc;
        }
    }

    pub fn gate_state(&self, slot: usize, gate: GateName) -> Option<f64> {
        self.slots.get(slot).map(|s| s.gates[gate.index()].state)
    }

    fn bound<'e>(&self, element: &'e ChannelElement) -> Result<(Range<usize>, &'e [SolverChannel])> {
        let range = self
            .adopted_slots(element.id())
            .ok_or(ChannelError::NotAdopted {
                element: element.id(),
                solver: self.id,
            })?;
        match element.storage() {
            ChannelStorage::Solver { solver, channels } if *solver == self.id => Ok((range, channels)),
            ChannelStorage::Solver { solver, .. } => Err(ChannelError::SolverOwned {
                element: element.id(),
                solver: *solver,
            }),
            ChannelStorage::Native(_) => Err(ChannelError::NotZombified(element.id())),
        }
    }

    fn run(
        &mut self,
        element: &ChannelElement,
        arena: &RateTableArena,
        dt: Option<f64>,
    ) -> Result<Vec<ChannelOutput>> {
        let (range, channels) = self.bound(element)?;
        let clamp = self.settings.clamp_gate_state;
        Ok(self.slots[range]
            .iter_mut()
            .zip(channels)
            .map(|(slot, channel)| slot.update(channel, arena, dt, clamp))
            .collect())
    }

    /// Integrate every instance of a zombified element by `dt`
    pub fn advance(
        &mut self,
        element: &ChannelElement,
        arena: &RateTableArena,
        dt: f64,
    ) -> Result<Vec<ChannelOutput>> {
        self.run(element, arena, Some(dt))
    }

    /// Steady-state reset of a zombified element
    pub fn reinit(&mut self, element: &ChannelElement, arena: &RateTableArena) -> Result<Vec<ChannelOutput>> {
        self.run(element, arena, None)
    }
}

impl ChannelSolver for CollectiveSolver {
    fn solver_id(&self) -> SolverId {
        self.id
    }

    fn adopted_slots(&self, element: ElementId) -> Option<Range<usize>> {
        self.adopted
            .iter()
            .find(|(id, _)| *id == element)
            .map(|(_, range)| range.clone())
    }

    fn use_concentration(&self, slot: usize) -> bool {
        self.slots.get(slot).is_some_and(|s| s.use_concentration)
    }

    fn has_table(&self, slot: usize, gate: GateName) -> bool {
        self.slots
            .get(slot)
            .is_some_and(|s| s.gates[gate.index()].table.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_table::{RateLookup, TableAxis};

    fn element(arena: &mut RateTableArena) -> ChannelElement {
        let mut element = ChannelElement::new(ElementId(3), ChannelId(10), 2, IntegrationSettings::default());
        let axis = TableAxis::new(-0.1, 0.05, 1).unwrap();
        for chan in element.channels_mut().unwrap() {
            chan.set_gbar(1.0);
            chan.set_ek(-0.07);
            chan.handle_vm(-0.05);
            chan.set_power(GateName::X, 3.0, arena).unwrap();
            let table = RateLookup::from_samples(axis, vec![200.0, 200.0], vec![400.0, 400.0]).unwrap();
            chan.set_gate_table(GateName::X, table, arena).unwrap();
        }
        element
    }

    #[test]
    fn test_solver_matches_native_integration() {
        let mut arena = RateTableArena::new();
        let mut native = element(&mut arena);
        let mut zombie = native.clone();

        let mut solver = CollectiveSolver::new(SolverId(1), IntegrationSettings::default());
        let slots = solver.adopt(&zombie).unwrap();
        assert_eq!(slots, 0..2);
        assert!(zombie.zombify(&solver).unwrap());

        for _ in 0..5 {
            let expected = native.process(&arena, 1e-4).unwrap();
            let actual = solver.advance(&zombie, &arena, 1e-4).unwrap();
            assert_eq!(expected, actual);
        }
        assert_eq!(
            solver.gate_state(0, GateName::X),
            Some(native.channels().unwrap()[0].state(GateName::X))
        );
    }

    #[test]
    fn test_adoption_is_idempotent() {
        let mut arena = RateTableArena::new();
        let element = element(&mut arena);
        let mut solver = CollectiveSolver::new(SolverId(1), IntegrationSettings::default());
        let first = solver.adopt(&element).unwrap();
        let second = solver.adopt(&element).unwrap();
        assert_eq!(first, second);
        assert_eq!(solver.len(), 2);
    }

    #[test]
    fn test_advance_requires_zombified_element() {
        let mut arena = RateTableArena::new();
        let element = element(&mut arena);
        let mut solver = CollectiveSolver::new(SolverId(1), IntegrationSettings::default());
        assert!(matches!(
            solver.advance(&element, &arena, 1e-4),
            Err(ChannelError::NotAdopted { .. })
        ));
        solver.adopt(&element).unwrap();
        assert!(matches!(
            solver.advance(&element, &arena, 1e-4),
            Err(ChannelError::NotZombified(_))
        ));
    }

    #[test]
    fn test_use_concentration_is_owned_by_solver() {
        let mut arena = RateTableArena::new();
        let mut element = element(&mut arena);
        element.channels_mut().unwrap()[1].set_use_concentration(true);

        let mut solver = CollectiveSolver::new(SolverId(1), IntegrationSettings::default());
        solver.adopt(&element).unwrap();
        element.zombify(&solver).unwrap();

        let records = element.solver_channels_mut().unwrap();
        assert!(!records[0].use_concentration());
        assert!(records[1].use_concentration());
        records[0].set_use_concentration(true);
        assert!(!records[0].use_concentration());
    }

    #[test]
    fn test_record_power_needs_migrated_table() {
        let mut arena = RateTableArena::new();
        let mut element = element(&mut arena);
        let mut solver = CollectiveSolver::new(SolverId(1), IntegrationSettings::default());
        solver.adopt(&element).unwrap();
        element.zombify(&solver).unwrap();

        let record = &mut element.solver_channels_mut().unwrap()[0];
        assert!(matches!(
            record.set_power(GateName::Y, 1.0),
            Err(ChannelError::MissingTable { gate: GateName::Y, .. })
        ));
        assert_eq!(record.power(GateName::Y), 0.0);

        // X keeps its migrated table across a zero power
        assert!(record.set_power(GateName::X, 0.0).unwrap());
        assert!(record.set_power(GateName::X, 2.0).unwrap());
        assert!(record.set_power(GateName::X, 7.0).unwrap());
        assert_eq!(record.power(GateName::X), 7.0);
    }
}
