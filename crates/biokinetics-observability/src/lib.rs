// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # biokinetics-observability
//!
//! Logging infrastructure shared by the biokinetics crates, with per-crate
//! debug flag support.
//!
//! ## Features
//! - `file-logging`: timestamped run folders with per-crate JSON logs and retention cleanup

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod config;
pub mod init;

pub use cli::*;
pub use config::*;
pub use init::*;

/// Known crate names (and `tracing` targets) for debug flags
pub const KNOWN_CRATES: &[&str] = &[
    "biokinetics-channels",
    "biokinetics-mesh",
    "biokinetics-config",
];
