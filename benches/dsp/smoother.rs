//! Benchmarks for parameter smoothing, including the atomic target read.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use resona::dsp::smoothed_param;
use resona::synth::param_pair;

use crate::{BLOCK_SIZES, SAMPLE_RATE};

pub fn bench_smoother(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/smoother");

    for &size in BLOCK_SIZES {
        let (mut handle, mut smoother) = smoothed_param(0.0, SAMPLE_RATE);
        group.bench_with_input(BenchmarkId::new("single", size), &size, |b, _| {
            let mut flip = false;
            b.iter(|| {
                flip = !flip;
                handle.set(if flip { 1.0 } else { 0.0 });
                let mut last = 0.0;
                for _ in 0..size {
                    last = smoother.get_smoothed();
                }
                black_box(last)
            })
        });

        // Every instrument parameter, once per sample
        let (_bank, mut set) = param_pair(SAMPLE_RATE);
        group.bench_with_input(BenchmarkId::new("param_set", size), &size, |b, _| {
            b.iter(|| {
                for _ in 0..size {
                    set.tick();
                }
                black_box(set.scale_params())
            })
        });
    }

    group.finish();
}
