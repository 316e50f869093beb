//! Benchmarks for a single waveguide line, free and bridge-terminated.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use resona::model::{BridgeCoupling, WaveguideLine};

use crate::{BLOCK_SIZES, SAMPLE_RATE};

fn plucked_line(freq: f32) -> WaveguideLine {
    let mut line = WaveguideLine::new(SAMPLE_RATE);
    line.configure(freq, 0.3, 0.2, 0.1, 1.0);
    line.excite(&[1.0, 0.8, 0.5, 0.2], 1.0);
    line
}

pub fn bench_waveguide(c: &mut Criterion) {
    let mut group = c.benchmark_group("model/waveguide");

    for &size in BLOCK_SIZES {
        let mut buffer = vec![0.0f32; size];

        let mut line = plucked_line(110.0);
        group.bench_with_input(BenchmarkId::new("rigid_110hz", size), &size, |b, _| {
            b.iter(|| {
                for out in buffer.iter_mut() {
                    *out = line.process_sample();
                }
                black_box(&buffer);
            })
        });

        let mut line = plucked_line(880.0);
        let mut bridge = BridgeCoupling::new(0.2, 3.0);
        group.bench_with_input(BenchmarkId::new("nonlinear_bridge_880hz", size), &size, |b, _| {
            b.iter(|| {
                for out in buffer.iter_mut() {
                    *out = line.process_sample_with(&mut bridge);
                }
                black_box(&buffer);
            })
        });
    }

    group.finish();
}
