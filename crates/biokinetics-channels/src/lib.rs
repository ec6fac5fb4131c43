// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # biokinetics-channels
//!
//! Hodgkin-Huxley style gated channels.
//!
//! Every tick a channel looks up `(A, B)` for each active gate in its rate
//! table, advances the gate state and combines the gates into a conductance
//! and a current. Tables are held in a [`RateTableArena`]: the original
//! channel owns each table and copies share it read-only.
//!
//! Elements of channels can be handed to a [`CollectiveSolver`], which
//! migrates their gates and then replaces the element storage with
//! solver-backed records (see [`ChannelElement::zombify`]).
//!
//! ## Example
//!
//! ```
//! use biokinetics_channels::prelude::*;
//!
//! let mut arena = RateTableArena::new();
//! let mut chan = HhChannel::new(ChannelId(0), IntegrationSettings::default());
//! chan.set_gbar(1.0);
//! chan.set_power(GateName::X, 3.0, &mut arena).unwrap();
//!
//! let axis = TableAxis::new(-0.1, 0.05, 1).unwrap();
//! let table = RateLookup::from_samples(axis, vec![200.0; 2], vec![400.0; 2]).unwrap();
//! chan.set_gate_table(GateName::X, table, &mut arena).unwrap();
//!
//! chan.handle_vm(-0.05);
//! let out = chan.process(&arena, 1e-4);
//! assert!(out.gk > 0.0);
//! ```

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod arena;
pub mod channel;
pub mod element;
pub mod error;
pub mod gate;
pub mod ids;
pub mod power;
pub mod rate_table;
pub mod settings;
pub mod snapshot;
pub mod solver;

pub use arena::{RateTableArena, Release};
pub use channel::{ChannelOutput, HhChannel};
pub use element::{ChannelElement, ChannelStorage};
pub use error::{ChannelError, Result};
pub use gate::{integrate, GateHandle, GateName, GateVariable, TableRole, EPSILON};
pub use ids::{ChannelId, ElementId, SolverId, TableId};
pub use power::{select_power, GatePower, PowerFn};
pub use rate_table::{HhRateForm, RateLookup, RateLookup2D, RatePair, RateTable, TableAxis};
pub use settings::IntegrationSettings;
pub use snapshot::{ChannelParameters, ParameterSnapshot, PARAMS_PER_CHANNEL};
pub use solver::{ChannelSolver, CollectiveSolver, SolverChannel};

pub mod prelude {
    pub use crate::{
        ChannelElement, ChannelError, ChannelId, ChannelOutput, ChannelSolver, CollectiveSolver,
        ElementId, GateName, HhChannel, IntegrationSettings, RateLookup, RateLookup2D, RatePair,
        RateTable, RateTableArena, SolverId, TableAxis,
    };
}
