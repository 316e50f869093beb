//! Benchmarks for modal banks at their full mode counts.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use resona::dsp::LookupTables;
use resona::model::{ModalBank, ModalType};

use crate::{BLOCK_SIZES, SAMPLE_RATE};

pub fn bench_modal(c: &mut Criterion) {
    let mut group = c.benchmark_group("model/modal");
    let tables = LookupTables::shared();

    for &size in BLOCK_SIZES {
        let mut buffer = vec![0.0f32; size];

        for kind in [ModalType::Gong, ModalType::Bar] {
            let mut bank = ModalBank::new(SAMPLE_RATE, tables.clone());
            bank.set_parameters(kind, 1.5, kind.mode_count());
            bank.set_fundamental(98.0);
            bank.set_shimmer(0.3);
            bank.strike(1.0, 0.7, 0.3);

            group.bench_with_input(
                BenchmarkId::new(format!("{kind:?}").to_lowercase(), size),
                &size,
                |b, _| {
                    b.iter(|| {
                        for out in buffer.iter_mut() {
                            *out = bank.process_sample();
                        }
                        black_box(&buffer);
                    })
                },
            );
        }
    }

    group.finish();
}
