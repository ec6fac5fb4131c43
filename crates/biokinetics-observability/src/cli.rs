// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-crate debug flags
//!
//! `--debug-<crate>` and `--debug-all` on the command line, or
//! `BIOKINETICS_DEBUG=biokinetics-mesh,biokinetics-channels` (or `all`) in
//! the environment, raise the named `tracing` targets to `DEBUG`.

use std::collections::BTreeSet;
use std::env;

use crate::KNOWN_CRATES;

const FLAG_PREFIX: &str = "--debug-";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrateDebugFlags {
    enabled: BTreeSet<String>,
}

impl CrateDebugFlags {
    pub fn from_args<I>(args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut flags = Self::default();
        for arg in args {
            if let Some(name) = arg.strip_prefix(FLAG_PREFIX) {
                flags.enable(name);
            }
        }
        flags
    }

    /// Enable one crate; `all` enables every known crate
    pub fn enable(&mut self, name: &str) {
        let name = name.trim();
        if name == "all" {
            self.enabled
                .extend(KNOWN_CRATES.iter().map(|c| (*c).to_string()));
        } else if !name.is_empty() {
            self.enabled.insert(name.to_string());
        }
    }

    /// Merge a comma-separated list as found in `BIOKINETICS_DEBUG`
    pub fn merge_list(&mut self, list: &str) {
        list.split(',').for_each(|name| self.enable(name));
    }

    pub fn is_enabled(&self, crate_name: &str) -> bool {
        self.enabled.contains(crate_name)
    }

    pub fn any_enabled(&self) -> bool {
        !self.enabled.is_empty()
    }

    pub fn enabled(&self) -> impl Iterator<Item = &str> {
        self.enabled.iter().map(String::as_str)
    }

    pub fn log_level(&self, crate_name: &str) -> tracing::Level {
        if self.is_enabled(crate_name) {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// `EnvFilter` directives, e.g. `biokinetics-mesh=debug,info`
    pub fn to_filter_string(&self, base_level: &str) -> String {
        self.enabled
            .iter()
            .map(|name| format!("{name}=debug"))
            .chain(std::iter::once(base_level.to_string()))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Flags from the process arguments merged with `BIOKINETICS_DEBUG`
pub fn parse_debug_flags() -> CrateDebugFlags {
    let mut flags = CrateDebugFlags::from_args(env::args());
    if let Ok(list) = env::var("BIOKINETICS_DEBUG") {
        flags.merge_list(&list);
    }
    flags
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_single_crate_flag() {
        let flags = CrateDebugFlags::from_args(args(&["sim", "--debug-biokinetics-mesh"]));
        assert!(flags.is_enabled("biokinetics-mesh"));
        assert!(!flags.is_enabled("biokinetics-channels"));
        assert_eq!(flags.log_level("biokinetics-mesh"), tracing::Level::DEBUG);
    }

    #[test]
    fn test_debug_all() {
        let flags = CrateDebugFlags::from_args(args(&["--debug-all"]));
        assert!(KNOWN_CRATES.iter().all(|c| flags.is_enabled(c)));
        assert!(!flags.is_enabled("all"));
    }

    #[test]
    fn test_filter_string_is_sorted() {
        let flags = CrateDebugFlags::from_args(args(&[
            "--debug-biokinetics-mesh",
            "--debug-biokinetics-channels",
        ]));
        assert_eq!(
            flags.to_filter_string("warn"),
            "biokinetics-channels=debug,biokinetics-mesh=debug,warn"
        );
        assert_eq!(CrateDebugFlags::default().to_filter_string("info"), "info");
    }

    #[test]
    fn test_merge_list() {
        let mut flags = CrateDebugFlags::default();
        flags.merge_list(" biokinetics-channels , ,biokinetics-config");
        assert_eq!(
            flags.enabled().collect::<Vec<_>>(),
            vec!["biokinetics-channels", "biokinetics-config"]
        );
        assert_eq!(flags.log_level("biokinetics-mesh"), tracing::Level::INFO);
    }
}
