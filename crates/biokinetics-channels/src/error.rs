// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for channel integration

use crate::gate::GateName;
use crate::ids::{ChannelId, ElementId, SolverId, TableId};

/// Errors raised by channel, rate table and solver operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChannelError {
    #[error("cannot use negative power {power} for gate {gate}")]
    NegativePower { gate: GateName, power: f64 },

    #[error("{channel} is a copy; gate {gate} can only be restructured on the original")]
    NotOriginal { channel: ChannelId, gate: GateName },

    #[error("{requester} does not own {table}")]
    NotOwner { table: TableId, requester: ChannelId },

    #[error("gate {gate} of {channel} has zero power and takes no rate table")]
    ZeroPower { channel: ChannelId, gate: GateName },

    #[error("unknown gate '{0}', expected X, Y or Z")]
    UnknownGate(String),

    #[error("gate {gate} of {channel} has no rate table")]
    MissingTable { channel: ChannelId, gate: GateName },

    #[error("{0} is no longer live")]
    StaleTable(TableId),

    #[error("invalid rate table: {0}")]
    InvalidTable(String),

    #[error("{element} has not been adopted by {solver}")]
    NotAdopted { element: ElementId, solver: SolverId },

    #[error("{element} has {expected} solver slots but {actual} instances")]
    SlotMismatch {
        element: ElementId,
        expected: usize,
        actual: usize,
    },

    #[error("{element} is already owned by {solver}")]
    SolverOwned { element: ElementId, solver: SolverId },

    #[error("{0} still uses native storage")]
    NotZombified(ElementId),
}

pub type Result<T> = core::result::Result<T, ChannelError>;
