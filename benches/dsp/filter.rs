//! Benchmarks for the loop filters and the bow-noise shaper.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use resona::dsp::filter::{Allpass, OnePole, SVFilter};

use crate::{BLOCK_SIZES, SAMPLE_RATE};

pub fn bench_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/filter");

    for &size in BLOCK_SIZES {
        let input: Vec<f32> = (0..size)
            .map(|i| (i as f32 / size as f32) * 2.0 - 1.0)
            .collect();

        // Loss filter + dispersion allpass: the per-sample cost of one rail
        let mut lowpass = OnePole::new(0.3);
        let mut allpass = Allpass::new(-0.4);
        group.bench_with_input(BenchmarkId::new("loop_filters", size), &size, |b, _| {
            b.iter(|| {
                let mut sum = 0.0f32;
                for &x in &input {
                    sum += allpass.process(lowpass.process(black_box(x)));
                }
                sum
            })
        });

        let mut svf = SVFilter::new();
        svf.set_params(1_800.0, 0.5, SAMPLE_RATE);
        group.bench_with_input(BenchmarkId::new("svf_bandpass", size), &size, |b, _| {
            b.iter(|| {
                let mut sum = 0.0f32;
                for &x in &input {
                    sum += svf.next_sample(black_box(x)).bandpass;
                }
                sum
            })
        });
    }

    group.finish();
}
