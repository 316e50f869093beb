//! Benchmarks for the delay line behind every waveguide rail.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use resona::dsp::delay::DelayLine;

use crate::BLOCK_SIZES;

pub fn bench_delay(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/delay");

    for &size in BLOCK_SIZES {
        let input: Vec<f32> = (0..size).map(|i| (i as f32 * 0.1).sin()).collect();

        // Integer tap, as used by excitation placement
        let mut delay = DelayLine::with_capacity(1204);
        group.bench_with_input(BenchmarkId::new("write_read", size), &size, |b, _| {
            b.iter(|| {
                let mut sum = 0.0f32;
                for &x in &input {
                    delay.write(black_box(x));
                    sum += delay.read(black_box(600));
                }
                sum
            })
        });

        // Fractional tap, as used by the rails; the length drifts like a pitch bend
        let mut delay = DelayLine::with_capacity(1204);
        for &x in &input {
            delay.write(x);
        }
        group.bench_with_input(BenchmarkId::new("read_interpolated", size), &size, |b, _| {
            b.iter(|| {
                let mut sum = 0.0f32;
                for i in 0..size {
                    let d = 218.3 + (i as f32 * 0.01).sin() * 3.0;
                    sum += delay.read_interpolated(black_box(d));
                }
                sum
            })
        });
    }

    group.finish();
}
