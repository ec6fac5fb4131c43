// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Gate power evaluation
//!
//! Integer exponents 0 through 4 resolve to plain multiplication chains when
//! the power is assigned. Any other exponent goes through `exp(p * ln x)`.

use core::fmt;

/// Tolerance for treating two powers as equal
pub const POWER_TOLERANCE: f64 = 1.0e-9;

/// Power evaluator: `(state, exponent) -> state^exponent`
pub type PowerFn = fn(f64, f64) -> f64;

pub fn power0(_x: f64, _p: f64) -> f64 {
    1.0
}

pub fn power1(x: f64, _p: f64) -> f64 {
    x
}

pub fn power2(x: f64, _p: f64) -> f64 {
    x * x
}

pub fn power3(x: f64, _p: f64) -> f64 {
    x * x * x
}

pub fn power4(x: f64, _p: f64) -> f64 {
    x * x * x * x
}

/// Generic power; non-positive states contribute nothing
pub fn power_n(x: f64, p: f64) -> f64 {
    if x > 0.0 {
        (p * x.ln()).exp()
    } else {
        0.0
    }
}

pub(crate) fn powers_equal(a: f64, b: f64) -> bool {
    (a - b).abs() < POWER_TOLERANCE
}

/// Pick the evaluator for an exponent
pub fn select_power(exponent: f64) -> PowerFn {
    if powers_equal(exponent, 0.0) {
        power0
    } else if powers_equal(exponent, 1.0) {
        power1
    } else if powers_equal(exponent, 2.0) {
        power2
    } else if powers_equal(exponent, 3.0) {
        power3
    } else if powers_equal(exponent, 4.0) {
        power4
    } else {
        power_n
    }
}

/// Gate exponent with its evaluator resolved once
#[derive(Clone, Copy)]
pub struct GatePower {
    exponent: f64,
    take: PowerFn,
}

impl GatePower {
    pub const ZERO: GatePower = GatePower {
        exponent: 0.0,
        take: power0,
    };

    pub fn new(exponent: f64) -> Self {
        Self {
            exponent,
            take: select_power(exponent),
        }
    }

    pub fn exponent(&self) -> f64 {
        self.exponent
    }

    pub fn is_zero(&self) -> bool {
        powers_equal(self.exponent, 0.0)
    }

    #[inline]
    pub fn apply(&self, state: f64) -> f64 {
        (self.take)(state, self.exponent)
    }
}

impl Default for GatePower {
    fn default() -> Self {
        Self::ZERO
    }
}

impl PartialEq for GatePower {
    fn eq(&self, other: &Self) -> bool {
        self.exponent.to_bits() == other.exponent.to_bits()
    }
}

impl fmt::Debug for GatePower {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("GatePower").field(&self.exponent).finish()
    }
}
