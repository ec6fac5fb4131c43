// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Rate lookup tables
//!
//! A table maps a driving value (membrane potential or concentration) to the
//! pair `(A, B)` where `A` is the forward rate and `B` is forward plus
//! reverse rate. Samples are uniformly spaced over `[min, max]`; lookups
//! outside the domain clamp to the end samples.
//!
//! Two shapes exist: [`RateLookup`] driven by one value and
//! [`RateLookup2D`] driven by voltage and concentration together.

use serde::{Deserialize, Serialize};

use crate::error::{ChannelError, Result};

/// Default domain of a freshly created gate table (volts)
pub const DEFAULT_TABLE_MIN: f64 = -0.1;
pub const DEFAULT_TABLE_MAX: f64 = 0.05;

/// Denominator magnitude under which the parametric form is re-evaluated
/// slightly off the singular point
const SINGULARITY: f64 = 1.0e-6;

/// Rates returned by a table lookup
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RatePair {
    /// Forward rate
    pub a: f64,
    /// Forward plus reverse rate
    pub b: f64,
}

impl RatePair {
    pub const ZERO: RatePair = RatePair { a: 0.0, b: 0.0 };

    pub fn new(a: f64, b: f64) -> Self {
        Self { a, b }
    }

    /// Steady-state open fraction `A / B`, if defined
    pub fn steady_state(&self) -> Option<f64> {
        (self.b > 0.0).then(|| self.a / self.b)
    }

    /// Relaxation time constant `1 / B`, if defined
    pub fn tau(&self) -> Option<f64> {
        (self.b > 0.0).then(|| 1.0 / self.b)
    }
}

/// Uniformly sampled axis `[min, max]` split into `divs` intervals
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawAxis")]
pub struct TableAxis {
    min: f64,
    max: f64,
    divs: usize,
}

impl TableAxis {
    pub fn new(min: f64, max: f64, divs: usize) -> Result<Self> {
        if !min.is_finite() || !max.is_finite() {
            return Err(ChannelError::InvalidTable(format!(
                "axis bounds must be finite, got [{}, {}]",
                min, max
            )));
        }
        if divs > 0 && max <= min {
            return Err(ChannelError::InvalidTable(format!(
                "axis max {} must exceed min {}",
                max, min
            )));
        }
        Ok(Self { min, max, divs })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn divs(&self) -> usize {
        self.divs
    }

    pub fn samples(&self) -> usize {
        self.divs + 1
    }

    pub fn step(&self) -> f64 {
        if self.divs == 0 {
            0.0
        } else {
            (self.max - self.min) / self.divs as f64
        }
    }

    /// Value at sample `i`
    pub fn value_at(&self, i: usize) -> f64 {
        self.min + self.step() * i as f64
    }

    /// Lower sample index and the fractional offset towards the next one
    fn locate(&self, value: f64) -> (usize, f64) {
        if self.divs == 0 || value.is_nan() {
            return (0, 0.0);
        }
        let clamped = value.clamp(self.min, self.max);
        let pos = (clamped - self.min) / self.step();
        let index = (pos.floor() as usize).min(self.divs - 1);
        (index, (pos - index as f64).clamp(0.0, 1.0))
    }

    /// Sample index without interpolation
    fn nearest_lower(&self, value: f64) -> usize {
        let (index, frac) = self.locate(value);
        if frac >= 1.0 {
            index + 1
        } else {
            index
        }
    }
}

#[derive(Deserialize)]
struct RawAxis {
    min: f64,
    max: f64,
    divs: usize,
}

impl TryFrom<RawAxis> for TableAxis {
    type Error = ChannelError;

    fn try_from(raw: RawAxis) -> Result<Self> {
        TableAxis::new(raw.min, raw.max, raw.divs)
    }
}

fn check_samples(a: &[f64], b: &[f64], expected: usize) -> Result<()> {
    if a.len() != expected || b.len() != expected {
        return Err(ChannelError::InvalidTable(format!(
            "expected {} samples, got A={} B={}",
            expected,
            a.len(),
            b.len()
        )));
    }
    for (i, (&ra, &rb)) in a.iter().zip(b).enumerate() {
        if !ra.is_finite() || !rb.is_finite() || ra < 0.0 || rb < 0.0 {
            return Err(ChannelError::InvalidTable(format!(
                "sample {} is not a finite non-negative rate pair ({}, {})",
                i, ra, rb
            )));
        }
    }
    Ok(())
}

/// Parametric HH rate form `(A + B·x) / (C + exp((x + D) / F))`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HhRateForm {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub f: f64,
}

impl HhRateForm {
    pub fn new(a: f64, b: f64, c: f64, d: f64, f: f64) -> Self {
        Self { a, b, c, d, f }
    }

    /// Evaluate at `x`; `nudge` shifts the point when the denominator vanishes
    pub fn evaluate(&self, x: f64, nudge: f64) -> f64 {
        let denominator = self.c + ((x + self.d) / self.f).exp();
        if denominator.abs() < SINGULARITY {
            let x = x + nudge;
            let denominator = self.c + ((x + self.d) / self.f).exp();
            (self.a + self.b * x) / denominator
        } else {
            (self.a + self.b * x) / denominator
        }
    }
}

/// 1-D rate table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawLookup")]
pub struct RateLookup {
    axis: TableAxis,
    a: Vec<f64>,
    b: Vec<f64>,
    interpolate: bool,
}

#[derive(Deserialize)]
struct RawLookup {
    axis: TableAxis,
    a: Vec<f64>,
    b: Vec<f64>,
    interpolate: bool,
}

impl TryFrom<RawLookup> for RateLookup {
    type Error = ChannelError;

    fn try_from(raw: RawLookup) -> Result<Self> {
        let mut table = RateLookup::from_samples(raw.axis, raw.a, raw.b)?;
        table.interpolate = raw.interpolate;
        Ok(table)
    }
}

impl RateLookup {
    /// Zero-rate single-sample table over the default voltage domain
    pub fn empty() -> Self {
        Self {
            axis: TableAxis {
                min: DEFAULT_TABLE_MIN,
                max: DEFAULT_TABLE_MAX,
                divs: 0,
            },
            a: vec![0.0],
            b: vec![0.0],
            interpolate: false,
        }
    }

    pub fn from_samples(axis: TableAxis, a: Vec<f64>, b: Vec<f64>) -> Result<Self> {
        check_samples(&a, &b, axis.samples())?;
        Ok(Self {
            axis,
            a,
            b,
            interpolate: false,
        })
    }

    /// Sample `A = alpha(x)`, `B = alpha(x) + beta(x)`
    pub fn from_alpha_beta<F, G>(axis: TableAxis, alpha: F, beta: G) -> Result<Self>
    where
        F: Fn(f64) -> f64,
        G: Fn(f64) -> f64,
    {
        let (a, b) = (0..axis.samples())
            .map(|i| {
                let x = axis.value_at(i);
                let alpha = alpha(x);
                (alpha, alpha + beta(x))
            })
            .unzip();
        Self::from_samples(axis, a, b)
    }

    /// Sample `A = inf(x) / tau(x)`, `B = 1 / tau(x)`
    pub fn from_tau_inf<F, G>(axis: TableAxis, tau: F, inf: G) -> Result<Self>
    where
        F: Fn(f64) -> f64,
        G: Fn(f64) -> f64,
    {
        let mut a = Vec::with_capacity(axis.samples());
        let mut b = Vec::with_capacity(axis.samples());
        for i in 0..axis.samples() {
            let x = axis.value_at(i);
            let t = tau(x);
            if t.is_nan() || t <= 0.0 {
                return Err(ChannelError::InvalidTable(format!(
                    "tau must be positive, got {} at {}",
                    t, x
                )));
            }
            a.push(inf(x) / t);
            b.push(1.0 / t);
        }
        Self::from_samples(axis, a, b)
    }

    /// Sample the classic parametric alpha/beta forms
    pub fn from_hh_forms(axis: TableAxis, alpha: HhRateForm, beta: HhRateForm) -> Result<Self> {
        let nudge = axis.step() / 10.0;
        Self::from_alpha_beta(
            axis,
            |x| alpha.evaluate(x, nudge),
            |x| beta.evaluate(x, nudge),
        )
    }

    pub fn axis(&self) -> &TableAxis {
        &self.axis
    }

    pub fn interpolate(&self) -> bool {
        self.interpolate
    }

    pub fn set_interpolate(&mut self, interpolate: bool) {
        self.interpolate = interpolate;
    }

    pub fn samples_a(&self) -> &[f64] {
        &self.a
    }

    pub fn samples_b(&self) -> &[f64] {
        &self.b
    }

    pub fn lookup(&self, x: f64) -> RatePair {
        if self.interpolate && self.axis.divs > 0 {
            let (i, frac) = self.axis.locate(x);
            RatePair {
                a: self.a[i] + (self.a[i + 1] - self.a[i]) * frac,
                b: self.b[i] + (self.b[i + 1] - self.b[i]) * frac,
            }
        } else {
            let i = self.axis.nearest_lower(x);
            RatePair {
                a: self.a[i],
                b: self.b[i],
            }
        }
    }
}

/// 2-D rate table driven by (voltage, concentration)
///
/// Samples are stored row-major by the first axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawLookup2D")]
pub struct RateLookup2D {
    x_axis: TableAxis,
    y_axis: TableAxis,
    a: Vec<f64>,
    b: Vec<f64>,
    interpolate: bool,
}

#[derive(Deserialize)]
struct RawLookup2D {
    x_axis: TableAxis,
    y_axis: TableAxis,
    a: Vec<f64>,
    b: Vec<f64>,
    interpolate: bool,
}

impl TryFrom<RawLookup2D> for RateLookup2D {
    type Error = ChannelError;

    fn try_from(raw: RawLookup2D) -> Result<Self> {
        let mut table = RateLookup2D::from_samples(raw.x_axis, raw.y_axis, raw.a, raw.b)?;
        table.interpolate = raw.interpolate;
        Ok(table)
    }
}

impl RateLookup2D {
    pub fn from_samples(x_axis: TableAxis, y_axis: TableAxis, a: Vec<f64>, b: Vec<f64>) -> Result<Self> {
        check_samples(&a, &b, x_axis.samples() * y_axis.samples())?;
        Ok(Self {
            x_axis,
            y_axis,
            a,
            b,
            interpolate: false,
        })
    }

    /// Sample `A = alpha(x, y)`, `B = alpha(x, y) + beta(x, y)`
    pub fn from_alpha_beta<F, G>(x_axis: TableAxis, y_axis: TableAxis, alpha: F, beta: G) -> Result<Self>
    where
        F: Fn(f64, f64) -> f64,
        G: Fn(f64, f64) -> f64,
    {
        let mut a = Vec::with_capacity(x_axis.samples() * y_axis.samples());
        let mut b = Vec::with_capacity(a.capacity());
        for i in 0..x_axis.samples() {
            let x = x_axis.value_at(i);
            for j in 0..y_axis.samples() {
                let y = y_axis.value_at(j);
                let alpha = alpha(x, y);
                a.push(alpha);
                b.push(alpha + beta(x, y));
            }
        }
        Self::from_samples(x_axis, y_axis, a, b)
    }

    pub fn x_axis(&self) -> &TableAxis {
        &self.x_axis
    }

    pub fn y_axis(&self) -> &TableAxis {
        &self.y_axis
    }

    pub fn set_interpolate(&mut self, interpolate: bool) {
        self.interpolate = interpolate;
    }

    #[inline]
    fn at(&self, i: usize, j: usize) -> RatePair {
        let k = i * self.y_axis.samples() + j;
        RatePair {
            a: self.a[k],
            b: self.b[k],
        }
    }

    pub fn lookup(&self, x: f64, y: f64) -> RatePair {
        if !self.interpolate {
            return self.at(self.x_axis.nearest_lower(x), self.y_axis.nearest_lower(y));
        }

        let (i, fx) = self.x_axis.locate(x);
        let (j, fy) = self.y_axis.locate(y);
        let i1 = if self.x_axis.divs > 0 { i + 1 } else { i };
        let j1 = if self.y_axis.divs > 0 { j + 1 } else { j };

        let p00 = self.at(i, j);
        let p01 = self.at(i, j1);
        let p10 = self.at(i1, j);
        let p11 = self.at(i1, j1);
        let blend = |v00: f64, v01: f64, v10: f64, v11: f64| {
            let lo = v00 + (v01 - v00) * fy;
            let hi = v10 + (v11 - v10) * fy;
            lo + (hi - lo) * fx
        };
        RatePair {
            a: blend(p00.a, p01.a, p10.a, p11.a),
            b: blend(p00.b, p01.b, p10.b, p11.b),
        }
    }
}

/// Rate table of either shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RateTable {
    OneDim(RateLookup),
    TwoDim(RateLookup2D),
}

impl RateTable {
    /// Look up rates; `y` is ignored by 1-D tables
    #[inline]
    pub fn lookup(&self, x: f64, y: f64) -> RatePair {
        match self {
            RateTable::OneDim(t) => t.lookup(x),
            RateTable::TwoDim(t) => t.lookup(x, y),
        }
    }

    pub fn dimensions(&self) -> usize {
        match self {
            RateTable::OneDim(_) => 1,
            RateTable::TwoDim(_) => 2,
        }
    }

    pub fn is_two_dimensional(&self) -> bool {
        matches!(self, RateTable::TwoDim(_))
    }
}

impl Default for RateTable {
    fn default() -> Self {
        RateTable::OneDim(RateLookup::empty())
    }
}

impl From<RateLookup> for RateTable {
    fn from(table: RateLookup) -> Self {
        RateTable::OneDim(table)
    }
}

impl From<RateLookup2D> for RateTable {
    fn from(table: RateLookup2D) -> Self {
        RateTable::TwoDim(table)
    }
}
