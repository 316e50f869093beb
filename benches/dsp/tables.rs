//! Benchmarks for table lookups against their libm equivalents.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use resona::dsp::LookupTables;

use crate::BLOCK_SIZES;

pub fn bench_tables(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/tables");
    let tables = LookupTables::new();

    for &size in BLOCK_SIZES {
        let phases: Vec<f32> = (0..size).map(|i| i as f32 / size as f32).collect();

        group.bench_with_input(BenchmarkId::new("sin_table", size), &size, |b, _| {
            b.iter(|| phases.iter().map(|&p| tables.sin(black_box(p))).sum::<f32>())
        });

        group.bench_with_input(BenchmarkId::new("sin_libm", size), &size, |b, _| {
            b.iter(|| {
                phases
                    .iter()
                    .map(|&p| (black_box(p) * std::f32::consts::TAU).sin())
                    .sum::<f32>()
            })
        });

        group.bench_with_input(BenchmarkId::new("exp_decay", size), &size, |b, _| {
            b.iter(|| {
                phases
                    .iter()
                    .map(|&p| tables.exp_decay(black_box(p * 8.0)))
                    .sum::<f32>()
            })
        });
    }

    group.finish();
}
