// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Gate update microbenchmarks
//!
//! Per-tick channel processing for elements below and above the parallel
//! threshold, plus the bare integrator.

use std::time::Duration;

use biokinetics_channels::prelude::*;
use biokinetics_channels::{integrate, HhRateForm};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

fn sodium_element(count: usize, parallel_threshold: usize) -> (ChannelElement, RateTableArena) {
    let settings = IntegrationSettings {
        parallel_threshold,
        ..IntegrationSettings::default()
    };
    let mut arena = RateTableArena::new();
    let mut original = HhChannel::new(ChannelId(0), settings);
    original.set_gbar(1.2e-3);
    original.set_ek(0.05);
    original.set_power(GateName::X, 3.0, &mut arena).unwrap();
    original.set_power(GateName::Y, 1.0, &mut arena).unwrap();

    // Rates in 1/ms over mV, evaluated on the membrane potential in mV
    let axis = TableAxis::new(-100.0, 50.0, 3000).unwrap();
    let m = RateLookup::from_hh_forms(
        axis,
        HhRateForm::new(-4.0, -0.1, -1.0, 40.0, -10.0),
        HhRateForm::new(4.0, 0.0, 0.0, 65.0, 18.0),
    )
    .unwrap();
    let h = RateLookup::from_hh_forms(
        axis,
        HhRateForm::new(0.07, 0.0, 0.0, 65.0, 20.0),
        HhRateForm::new(1.0, 0.0, 1.0, 35.0, -10.0),
    )
    .unwrap();
    original.set_gate_table(GateName::X, m, &mut arena).unwrap();
    original.set_gate_table(GateName::Y, h, &mut arena).unwrap();

    let mut channels = Vec::with_capacity(count);
    for i in 1..count {
        let mut copy = original.duplicate(ChannelId(i as u32), &mut arena).unwrap();
        copy.handle_vm(-65.0 + (i % 100) as f64 * 0.5);
        channels.push(copy);
    }
    channels.push(original);
    (ChannelElement::from_channels(ElementId(0), channels, settings), arena)
}

fn bench_element_process(c: &mut Criterion) {
    let mut group = c.benchmark_group("element_process");
    group.sample_size(20);
    group.warm_up_time(Duration::from_millis(500));
    group.measurement_time(Duration::from_secs(2));

    for &count in &[1_000usize, 100_000] {
        group.throughput(Throughput::Elements(count as u64));
        for (label, threshold) in [("serial", usize::MAX), ("parallel", 4096)] {
            let (mut element, arena) = sodium_element(count, threshold);
            group.bench_with_input(BenchmarkId::new(label, count), &count, |b, _| {
                b.iter(|| {
                    let out = element.process(black_box(&arena), black_box(0.01)).unwrap();
                    black_box(out);
                });
            });
        }
    }

    group.finish();
}

fn bench_integrator(c: &mut Criterion) {
    c.bench_function("integrate_exponential", |b| {
        b.iter(|| integrate(black_box(0.3), black_box(1e-4), black_box(200.0), black_box(400.0)))
    });
}

criterion_group!(benches, bench_element_process, bench_integrator);
criterion_main!(benches);
