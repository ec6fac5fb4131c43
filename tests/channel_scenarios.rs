// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! End-to-end channel scenarios: one tick, reinit, table lifecycle and the
//! solver hand-off

use biokinetics_channels::prelude::*;
use biokinetics_channels::ParameterSnapshot;

fn flat_table(a: f64, b: f64) -> RateLookup {
    let axis = TableAxis::new(-0.1, 0.05, 3).unwrap();
    RateLookup::from_samples(axis, vec![a; 4], vec![b; 4]).unwrap()
}

fn x_cubed_channel(id: u32, arena: &mut RateTableArena) -> HhChannel {
    let mut chan = HhChannel::new(ChannelId(id), IntegrationSettings::default());
    chan.set_gbar(1.0);
    chan.set_ek(-0.07);
    chan.set_power(GateName::X, 3.0, arena).unwrap();
    chan.set_gate_table(GateName::X, flat_table(200.0, 400.0), arena)
        .unwrap();
    chan.handle_vm(-0.05);
    chan
}

#[test]
fn test_single_tick_conductance_and_current() {
    let mut arena = RateTableArena::new();
    let mut chan = x_cubed_channel(0, &mut arena);

    let out = chan.process(&arena, 1e-4);

    let x = 0.5 * (1.0 - (-0.04f64).exp());
    assert!((chan.state(GateName::X) - x).abs() < 1e-12);
    assert!((out.gk - x.powi(3)).abs() < 1e-15);
    assert!((out.ik - out.gk * 0.02).abs() < 1e-15);
    assert_eq!(out.gk, chan.gk());
}

#[test]
fn test_reinit_ignores_instant_flag() {
    let mut arena = RateTableArena::new();
    let mut plain = x_cubed_channel(0, &mut arena);
    let mut instant = x_cubed_channel(1, &mut arena);
    instant.set_instant(1);
    plain.set_state(GateName::X, 0.9);
    instant.set_state(GateName::X, 0.1);

    plain.reinit(&arena);
    instant.reinit(&arena);
    assert_eq!(plain.state(GateName::X), 0.5);
    assert_eq!(instant.state(GateName::X), plain.state(GateName::X));
}

#[test]
fn test_table_lifecycle_follows_power() {
    let mut arena = RateTableArena::new();
    let mut chan = HhChannel::new(ChannelId(0), IntegrationSettings::default());

    assert!(chan.set_power(GateName::Y, 2.0, &mut arena).unwrap());
    assert_eq!(arena.live_tables(), 1);
    assert!(!chan.set_power(GateName::Y, 2.0, &mut arena).unwrap());
    assert_eq!(arena.live_tables(), 1);
    assert!(chan.set_power(GateName::Y, 0.0, &mut arena).unwrap());
    assert_eq!(arena.live_tables(), 0);

    assert!(chan.set_power(GateName::Y, -1.0, &mut arena).is_err());
    assert_eq!(chan.power(GateName::Y), 0.0);
}

#[test]
fn test_copies_read_but_never_restructure() {
    let mut arena = RateTableArena::new();
    let original = x_cubed_channel(0, &mut arena);
    let mut copy = original.duplicate(ChannelId(1), &mut arena).unwrap();
    assert!(original.is_original());
    assert!(!copy.is_original());

    assert!(matches!(
        copy.set_gate_table(GateName::X, flat_table(1.0, 1.0), &mut arena),
        Err(ChannelError::NotOriginal { .. })
    ));
    copy.handle_vm(-0.05);
    let out = copy.process(&arena, 1e-4);
    assert!(out.gk > 0.0);
}

#[test]
fn test_zombification_preserves_parameters() {
    let mut arena = RateTableArena::new();
    let channels: Vec<HhChannel> = (0..5)
        .map(|i| {
            let mut chan = x_cubed_channel(i, &mut arena);
            chan.set_gbar(1.0 + f64::from(i) * 0.25);
            chan.set_ek(-0.09 + f64::from(i) * 1e-3);
            if i % 2 == 0 {
                chan.set_power(GateName::Y, 1.0, &mut arena).unwrap();
            }
            if i == 3 {
                chan.set_power(GateName::Z, 1.5, &mut arena).unwrap();
            }
            chan
        })
        .collect();
    let mut element = ChannelElement::from_channels(ElementId(1), channels, IntegrationSettings::default());
    let before: ParameterSnapshot = element.parameters();

    let mut solver = CollectiveSolver::new(SolverId(9), IntegrationSettings::default());
    solver.adopt(&element).unwrap();
    assert!(element.zombify(&solver).unwrap());
    assert!(!element.zombify(&solver).unwrap());

    let after = element.parameters();
    assert_eq!(after.len(), 5);
    assert!(before.bit_identical(&after));
    // Z power forced the concentration drive on
    assert_eq!(after.channel(3)[5], 1.0);
}
