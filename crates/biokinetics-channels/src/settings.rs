// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Integration settings derived from `[channels]` configuration

use biokinetics_config::ChannelsConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntegrationSettings {
    /// Timestep in seconds
    pub dt: f64,
    /// Instance count from which an element updates in parallel
    pub parallel_threshold: usize,
    /// Clamp gate state into [0, 1] after each step
    pub clamp_gate_state: bool,
    /// Powers above this are logged as implausible
    pub power_warning_limit: f64,
}

impl Default for IntegrationSettings {
    fn default() -> Self {
        Self::from(&ChannelsConfig::default())
    }
}

impl From<&ChannelsConfig> for IntegrationSettings {
    fn from(config: &ChannelsConfig) -> Self {
        Self {
            dt: config.dt,
            parallel_threshold: config.parallel_threshold,
            clamp_gate_state: config.clamp_gate_state,
            power_warning_limit: config.power_warning_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_follow_config() {
        let config = ChannelsConfig {
            dt: 1e-5,
            clamp_gate_state: true,
            ..ChannelsConfig::default()
        };
        let settings = IntegrationSettings::from(&config);
        assert_eq!(settings.dt, 1e-5);
        assert!(settings.clamp_gate_state);
        assert_eq!(settings.power_warning_limit, 5.0);
    }
}
