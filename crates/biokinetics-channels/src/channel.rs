// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Hodgkin-Huxley channel instance
//!
//! A channel combines up to three gates into a conductance
//! `Gk = Gbar · modulation · X^Xpower · Y^Ypower · Z^Zpower` and a current
//! `Ik = Gk · (Vm - Ek)`. Gate tables live in a shared [`RateTableArena`];
//! the original channel owns them and copies made with
//! [`HhChannel::duplicate`] only read them.

use tracing::{debug, error, warn};

use crate::arena::{RateTableArena, Release};
use crate::error::{ChannelError, Result};
use crate::gate::{GateHandle, GateName, GateVariable, TableRole};
use crate::ids::ChannelId;
use crate::power::{powers_equal, GatePower};
use crate::rate_table::{RatePair, RateTable};
use crate::settings::IntegrationSettings;

/// Conductance and current produced by one update
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChannelOutput {
    pub gk: f64,
    pub ik: f64,
}

/// Driving values `(x, y)` for a gate's table lookup
///
/// 2-D tables take (Vm, conc). For 1-D tables X and Y follow Vm and Z
/// follows the concentration when `use_concentration` is set.
#[inline]
pub(crate) fn drive_values(
    gate: GateName,
    table: &RateTable,
    vm: f64,
    conc: f64,
    use_concentration: bool,
) -> (f64, f64) {
    if table.is_two_dimensional() {
        return (vm, conc);
    }
    match gate {
        GateName::Z if use_concentration => (conc, vm),
        _ => (vm, conc),
    }
}

#[derive(Debug, Clone)]
pub struct HhChannel {
    id: ChannelId,
    origin: ChannelId,
    gbar: f64,
    ek: f64,
    vm: f64,
    conc: f64,
    modulation: f64,
    use_concentration: bool,
    gates: [GateVariable; 3],
    gk: f64,
    ik: f64,
    settings: IntegrationSettings,
}

impl HhChannel {
    /// New original channel with no gates
    pub fn new(id: ChannelId, settings: IntegrationSettings) -> Self {
        Self {
            id,
            origin: id,
            gbar: 0.0,
            ek: 0.0,
            vm: 0.0,
            conc: 0.0,
            modulation: 1.0,
            use_concentration: false,
            gates: [GateVariable::default(); 3],
            gk: 0.0,
            ik: 0.0,
            settings,
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// The channel whose tables this one uses
    pub fn origin(&self) -> ChannelId {
        self.origin
    }

    /// Only the original may restructure its gate tables
    pub fn is_original(&self) -> bool {
        self.id == self.origin
    }

    pub fn settings(&self) -> &IntegrationSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: IntegrationSettings) {
        self.settings = settings;
    }

    /// Copy sharing every gate table of this channel
    pub fn duplicate(&self, id: ChannelId, arena: &mut RateTableArena) -> Result<HhChannel> {
        let mut copy = self.clone();
        copy.id = id;
        for gate in copy.gates.iter_mut() {
            if let Some(handle) = gate.handle() {
                arena.share(handle.id)?;
                gate.set_handle(Some(GateHandle {
                    id: handle.id,
                    role: TableRole::Shared,
                }));
            }
        }
        debug!(target: "biokinetics-channels", "{} duplicated from {}", id, self.id);
        Ok(copy)
    }

    /// Drop every table reference this channel holds
    pub fn release_tables(&mut self, arena: &mut RateTableArena) {
        for gate in self.gates.iter_mut() {
            if let Some(handle) = gate.handle() {
                if let Err(e) = arena.release(handle.id, self.id) {
                    warn!(target: "biokinetics-channels", "{} release failed: {}", self.id, e);
                }
                gate.set_handle(None);
            }
        }
    }

    // ---------------------------------------------------------------------
    // Fields
    // ---------------------------------------------------------------------

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

    pub fn vm(&self) -> f64 {
        self.vm
    }

    pub fn handle_vm(&mut self, vm: f64) {
        self.vm = vm;
    }

    pub fn conc(&self) -> f64 {
        self.conc
    }

    pub fn handle_conc(&mut self, conc: f64) {
        self.conc = conc;
    }

    pub fn modulation(&self) -> f64 {
        self.modulation
    }

    pub fn set_modulation(&mut self, modulation: f64) {
        self.modulation = modulation;
    }

    pub fn use_concentration(&self) -> bool {
        self.use_concentration
    }

    pub fn set_use_concentration(&mut self, use_concentration: bool) {
        self.use_concentration = use_concentration;
    }

    pub fn gk(&self) -> f64 {
        self.gk
    }

    pub fn ik(&self) -> f64 {
        self.ik
    }

    pub fn gate(&self, gate: GateName) -> &GateVariable {
        &self.gates[gate.index()]
    }

    pub fn state(&self, gate: GateName) -> f64 {
        self.gates[gate.index()].state()
    }

    pub fn set_state(&mut self, gate: GateName, state: f64) {
        self.gates[gate.index()].set_state(state);
    }

    pub fn power(&self, gate: GateName) -> f64 {
        self.gates[gate.index()].power().exponent()
    }

    /// Instant bitmap: X = 1, Y = 2, Z = 4
    pub fn instant(&self) -> u8 {
        GateName::ALL
            .iter()
            .filter(|g| self.gates[g.index()].is_instant())
            .fold(0, |bits, g| bits | g.instant_bit())
    }

    pub fn set_instant(&mut self, bits: u8) {
        for gate in GateName::ALL {
            self.gates[gate.index()].set_instant(bits & gate.instant_bit() != 0);
        }
    }

    // ---------------------------------------------------------------------
    // Gate lifecycle
    // ---------------------------------------------------------------------

    /// Assign a gate power
    ///
    /// Returns `Ok(false)` when the power is unchanged. Going from zero to a
    /// positive power creates the gate table; going to zero destroys it.
    /// Setting the Z power also turns `use_concentration` on, a coupling
    /// kept for compatibility with existing models.
    pub fn set_power(&mut self, gate: GateName, power: f64, arena: &mut RateTableArena) -> Result<bool> {
        if power < 0.0 || power.is_nan() {
            warn!(
                target: "biokinetics-channels",
                "{}: cannot use negative power {} for gate {}",
                self.id, power, gate
            );
            return Err(ChannelError::NegativePower { gate, power });
        }
        if power > self.settings.power_warning_limit {
            warn!(
                target: "biokinetics-channels",
                "{}: implausible power {} for gate {}",
                self.id, power, gate
            );
        }

        let current = self.gates[gate.index()].power().exponent();
        if powers_equal(power, current) {
            return Ok(false);
        }
        if powers_equal(current, 0.0) {
            self.attach_table(gate, arena)?;
        } else if powers_equal(power, 0.0) {
            self.destroy_gate(gate, arena)?;
        }
        self.gates[gate.index()].set_power(GatePower::new(power));

        if gate == GateName::Z && power > 0.0 {
            self.use_concentration = true;
        }
        Ok(true)
    }

    fn check_original(&self, gate: GateName, action: &str) -> Result<()> {
        if self.is_original() {
            return Ok(());
        }
        warn!(
            target: "biokinetics-channels",
            "{}: {} gate {} not allowed from a copy of {}",
            self.id, action, gate, self.origin
        );
        Err(ChannelError::NotOriginal {
            channel: self.id,
            gate,
        })
    }

    /// Create the gate's owned, empty table
    ///
    /// Only gates with a positive power carry a table; assigning the power
    /// creates it, so this is a no-op for any gate that already has one.
    pub fn create_gate(&mut self, gate: GateName, arena: &mut RateTableArena) -> Result<()> {
        if self.gates[gate.index()].power().is_zero() {
            warn!(
                target: "biokinetics-channels",
                "{}: gate {} has zero power, not creating a table",
                self.id, gate
            );
            return Err(ChannelError::ZeroPower {
                channel: self.id,
                gate,
            });
        }
        self.attach_table(gate, arena)
    }

    fn attach_table(&mut self, gate: GateName, arena: &mut RateTableArena) -> Result<()> {
        self.check_original(gate, "create")?;
        let slot = &mut self.gates[gate.index()];
        if slot.handle().is_some() {
            return Ok(());
        }
        let id = arena.create(self.id, RateTable::default());
        slot.set_handle(Some(GateHandle {
            id,
            role: TableRole::Owner,
        }));
        Ok(())
    }

    /// Release the gate table; the owner's release tears it down
    pub fn destroy_gate(&mut self, gate: GateName, arena: &mut RateTableArena) -> Result<()> {
        self.check_original(gate, "destroy")?;
        let slot = &mut self.gates[gate.index()];
        if let Some(handle) = slot.handle() {
            if let Release::TornDown { orphaned } = arena.release(handle.id, self.id)? {
                debug!(
                    target: "biokinetics-channels",
                    "{}: gate {} destroyed, {} copies orphaned",
                    self.id, gate, orphaned
                );
            }
            slot.set_handle(None);
        }
        Ok(())
    }

    /// Create a gate by name ("X", "Y" or "Z")
    pub fn create_gate_named(&mut self, name: &str, arena: &mut RateTableArena) -> Result<()> {
        self.create_gate(name.parse()?, arena)
    }

    /// Destroy a gate by name ("X", "Y" or "Z")
    pub fn destroy_gate_named(&mut self, name: &str, arena: &mut RateTableArena) -> Result<()> {
        self.destroy_gate(name.parse()?, arena)
    }

    /// Mutable access to a gate table, for the original only
    pub fn gate_table_mut<'a>(
        &self,
        gate: GateName,
        arena: &'a mut RateTableArena,
    ) -> Result<&'a mut RateTable> {
        self.check_original(gate, "modify")?;
        let handle = self.gates[gate.index()]
            .handle()
            .ok_or(ChannelError::MissingTable {
                channel: self.id,
                gate,
            })?;
        arena.table_mut(handle.id, self.id)
    }

    /// Replace a gate table, for the original only
    pub fn set_gate_table(
        &self,
        gate: GateName,
        table: impl Into<RateTable>,
        arena: &mut RateTableArena,
    ) -> Result<()> {
        *self.gate_table_mut(gate, arena)? = table.into();
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Update
    // ---------------------------------------------------------------------

    fn rates(&self, gate: GateName, arena: &RateTableArena) -> RatePair {
        let Some(handle) = self.gates[gate.index()].handle() else {
            error!(
                target: "biokinetics-channels",
                "{}: gate {} has a power but no table",
                self.id, gate
            );
            return RatePair::ZERO;
        };
        let Some(table) = arena.table(handle.id) else {
            error!(
                target: "biokinetics-channels",
                "{}: gate {} references {} which was torn down",
                self.id, gate, handle.id
            );
            return RatePair::ZERO;
        };
        let (x, y) = drive_values(gate, table, self.vm, self.conc, self.use_concentration);
        table.lookup(x, y)
    }

    fn emit(&mut self, g: f64) -> ChannelOutput {
        self.gk = g;
        self.ik = g * (self.vm - self.ek);
        ChannelOutput {
            gk: self.gk,
            ik: self.ik,
        }
    }

    /// Advance every active gate by `dt` and recompute Gk and Ik
    pub fn process(&mut self, arena: &RateTableArena, dt: f64) -> ChannelOutput {
        let clamp = self.settings.clamp_gate_state;
        let mut g = self.gbar * self.modulation;
        for gate in GateName::ALL {
            if !self.gates[gate.index()].is_active() {
                continue;
            }
            let rates = self.rates(gate, arena);
            let slot = &mut self.gates[gate.index()];
            slot.advance(rates, dt, clamp);
            g *= slot.factor();
        }
        self.emit(g)
    }

    /// Set every active gate to steady state and recompute Gk and Ik
    pub fn reinit(&mut self, arena: &RateTableArena) -> ChannelOutput {
        let mut g = self.gbar * self.modulation;
        for gate in GateName::ALL {
            if !self.gates[gate.index()].is_active() {
                continue;
            }
            let rates = self.rates(gate, arena);
            let slot = &mut self.gates[gate.index()];
            if rates.steady_state().is_none() {
                debug!(
                    target: "biokinetics-channels",
                    "{}: gate {} has no steady state at reinit, state kept",
                    self.id, gate
                );
            }
            slot.reinit(rates);
            g *= slot.factor();
        }
        self.emit(g)
    }
}
