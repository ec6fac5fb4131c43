// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Gate variables and the gate integrator
//!
//! Each gate relaxes towards `A / B` following `ds/dt = A - B·s`. For
//! `B > EPSILON` the exact exponential solution over one step is used;
//! otherwise a forward Euler step `s + A·dt`.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ChannelError;
use crate::ids::TableId;
use crate::power::GatePower;
use crate::rate_table::RatePair;

/// Rate sum under which the integrator falls back to Euler
pub const EPSILON: f64 = 1.0e-10;

/// Gate dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GateName {
    X,
    Y,
    Z,
}

impl GateName {
    pub const ALL: [GateName; 3] = [GateName::X, GateName::Y, GateName::Z];

    #[inline]
    pub fn index(self) -> usize {
        match self {
            GateName::X => 0,
            GateName::Y => 1,
            GateName::Z => 2,
        }
    }

    /// Bit of this gate in the `instant` bitmap
    #[inline]
    pub fn instant_bit(self) -> u8 {
        1 << self.index()
    }
}

impl fmt::Display for GateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GateName::X => "X",
            GateName::Y => "Y",
            GateName::Z => "Z",
        };
        f.write_str(name)
    }
}

impl FromStr for GateName {
    type Err = ChannelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "X" | "x" => Ok(GateName::X),
            "Y" | "y" => Ok(GateName::Y),
            "Z" | "z" => Ok(GateName::Z),
            other => Err(ChannelError::UnknownGate(other.to_string())),
        }
    }
}

/// One integration step of `ds/dt = A - B·s`
#[inline]
pub fn integrate(state: f64, dt: f64, a: f64, b: f64) -> f64 {
    if b > EPSILON {
        let x = (-b * dt).exp();
        state * x + (a / b) * (1.0 - x)
    } else {
        state + a * dt
    }
}

/// Next state of a gate for one tick
#[inline]
pub fn next_state(state: f64, instant: bool, rates: RatePair, dt: f64) -> f64 {
    if instant {
        rates.steady_state().unwrap_or(state)
    } else {
        integrate(state, dt, rates.a, rates.b)
    }
}

/// Whether a gate owns its table or shares the original's
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableRole {
    Owner,
    Shared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateHandle {
    pub id: TableId,
    pub role: TableRole,
}

/// One gating dimension of a channel
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GateVariable {
    state: f64,
    power: GatePower,
    instant: bool,
    handle: Option<GateHandle>,
}

impl GateVariable {
    pub fn state(&self) -> f64 {
        self.state
    }

    pub fn set_state(&mut self, state: f64) {
        self.state = state;
    }

    pub fn power(&self) -> GatePower {
        self.power
    }

    pub(crate) fn set_power(&mut self, power: GatePower) {
        self.power = power;
    }

    pub fn is_instant(&self) -> bool {
        self.instant
    }

    pub fn set_instant(&mut self, instant: bool) {
        self.instant = instant;
    }

    pub fn handle(&self) -> Option<GateHandle> {
        self.handle
    }

    pub(crate) fn set_handle(&mut self, handle: Option<GateHandle>) {
        self.handle = handle;
    }

    /// Gate takes part in the conductance product
    pub fn is_active(&self) -> bool {
        !self.power.is_zero()
    }

    pub fn advance(&mut self, rates: RatePair, dt: f64, clamp: bool) {
        self.state = next_state(self.state, self.instant, rates, dt);
        if clamp {
            self.state = self.state.clamp(0.0, 1.0);
        }
    }

    /// Jump to steady state, ignoring the instant flag
    pub fn reinit(&mut self, rates: RatePair) {
        if let Some(steady) = rates.steady_state() {
            self.state = steady;
        }
    }

    /// Multiplicative contribution to the conductance
    #[inline]
    pub fn factor(&self) -> f64 {
        self.power.apply(self.state)
    }
}
