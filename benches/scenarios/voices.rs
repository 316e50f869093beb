//! Benchmarks for voice pools under load.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use resona::model::{ModalType, SympatheticTuning};
use resona::synth::{Gesture, InstrumentKind};
use resona::{Instrument, InstrumentConfig};

use crate::{BLOCK_SIZES, SAMPLE_RATE};

const CHORD: [u8; 6] = [40, 47, 52, 55, 59, 64];

fn loaded(config: InstrumentConfig, gesture: Gesture) -> Instrument {
    let (mut controller, mut instrument) = Instrument::new(config.with_sample_rate(SAMPLE_RATE));
    for note in CHORD {
        let _ = controller.note_on_with(note, 0.9, gesture);
    }
    let mut warmup = vec![0.0f32; 256];
    instrument.process_block(&mut [&mut warmup[..]]);
    instrument
}

pub fn bench_voices(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios/voices");

    let cases = [
        (
            "strings_6",
            InstrumentConfig::default().with_polyphony(6),
            Gesture::Pluck,
        ),
        (
            "strings_sympathetic_12",
            InstrumentConfig::default()
                .with_polyphony(12)
                .with_sympathetic(SympatheticTuning::Harmonic, 65.41),
            Gesture::Pluck,
        ),
        (
            "bowed_6",
            InstrumentConfig::default()
                .with_polyphony(6)
                .with_kind(InstrumentKind::Bowed),
            Gesture::Bow,
        ),
        (
            "gong_6",
            InstrumentConfig::default()
                .with_polyphony(6)
                .with_kind(InstrumentKind::Modal(ModalType::Gong)),
            Gesture::Pluck,
        ),
    ];

    for &size in BLOCK_SIZES {
        let mut left = vec![0.0f32; size];
        let mut right = vec![0.0f32; size];

        for (name, config, gesture) in cases {
            let mut instrument = loaded(config, gesture);
            group.bench_with_input(BenchmarkId::new(name, size), &size, |b, _| {
                b.iter(|| {
                    instrument.process_block(&mut [&mut left[..], &mut right[..]]);
                    black_box(&left);
                })
            });
        }
    }

    group.finish();
}
