// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-instance parameter snapshots taken across a representation swap

use crate::channel::HhChannel;
use crate::gate::GateName;
use crate::solver::SolverChannel;

/// Gbar, Ek, Xpower, Ypower, Zpower, useConcentration
pub const PARAMS_PER_CHANNEL: usize = 6;

/// Channel representations exposing the six migrated parameters
pub trait ChannelParameters {
    fn parameters(&self) -> [f64; PARAMS_PER_CHANNEL];
}

fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

impl ChannelParameters for HhChannel {
    fn parameters(&self) -> [f64; PARAMS_PER_CHANNEL] {
        [
            self.gbar(),
            self.ek(),
            self.power(GateName::X),
            self.power(GateName::Y),
            self.power(GateName::Z),
            flag(self.use_concentration()),
        ]
    }
}

impl ChannelParameters for SolverChannel {
    fn parameters(&self) -> [f64; PARAMS_PER_CHANNEL] {
        [
            self.gbar(),
            self.ek(),
            self.power(GateName::X),
            self.power(GateName::Y),
            self.power(GateName::Z),
            flag(self.use_concentration()),
        ]
    }
}

/// Flat buffer of `PARAMS_PER_CHANNEL` values per instance
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParameterSnapshot {
    values: Vec<f64>,
}

impl ParameterSnapshot {
    pub fn capture<T: ChannelParameters>(channels: &[T]) -> Self {
        let mut values = Vec::with_capacity(channels.len() * PARAMS_PER_CHANNEL);
        for channel in channels {
            values.extend_from_slice(&channel.parameters());
        }
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len() / PARAMS_PER_CHANNEL
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn channel(&self, i: usize) -> &[f64] {
        &self.values[i * PARAMS_PER_CHANNEL..(i + 1) * PARAMS_PER_CHANNEL]
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Bitwise equality, so `-0.0` and `0.0` differ and NaNs compare by payload
    pub fn bit_identical(&self, other: &ParameterSnapshot) -> bool {
        self.values.len() == other.values.len()
            && self
                .values
                .iter()
                .zip(&other.values)
                .all(|(a, b)| a.to_bits() == b.to_bits())
    }
}
