//! Precomputed, interpolated transcendental tables.

/*
Lookup-Table Cache
==================

Every per-sample path in this crate needs a handful of transcendental
functions: sines for modal oscillators and windowed bursts, cosines for the
equal-power crossfade and pan laws, exponentials for decay envelopes and
pitch ratios. Calling `sin`/`exp` per mode per sample is the single largest
cost of a naive modal bank, so the values are computed once and read back
with linear interpolation.

  phase units   Sine/cosine take phase in CYCLES (0.0..1.0 is one period),
                which makes wrapping a `floor` instead of a modulo by TAU.

  exp_decay     e^-x for x in [0, EXP_RANGE]. Past the range the true value
                is below 1e-7 and the table returns 0.

  exp2          2^x split into integer and fractional parts: the fraction
                comes from the table, the integer part from `powi`.

  log_taper     (10^(3t) - 1) / 999, a 60 dB logarithmic taper mapping a
                normalized control in [0, 1] to a musically even sweep.

  midi          Equal-tempered note frequencies, A4 = 440 Hz.

The tables are built once, before any voice processes audio, and shared by
reference (`Arc<LookupTables>`) for the lifetime of the instrument. Nothing
here is global.
*/

use std::sync::Arc;

const SINE_SIZE: usize = 4096;
const EXP_SIZE: usize = 2048;
const EXP_RANGE: f32 = 16.0;
const EXP2_SIZE: usize = 1024;
const TAPER_SIZE: usize = 1024;

pub struct LookupTables {
    sine: Box<[f32]>,
    exp_decay: Box<[f32]>,
    exp2_frac: Box<[f32]>,
    taper: Box<[f32]>,
    midi: [f32; 128],
}

impl LookupTables {
    pub fn new() -> Self {
        // One guard point at the end of each table so interpolation never wraps.
        let sine = (0..=SINE_SIZE)
            .map(|i| (std::f64::consts::TAU * i as f64 / SINE_SIZE as f64).sin() as f32)
            .collect();

        let exp_decay = (0..=EXP_SIZE)
            .map(|i| (-(i as f64) * EXP_RANGE as f64 / EXP_SIZE as f64).exp() as f32)
            .collect();

        let exp2_frac = (0..=EXP2_SIZE)
            .map(|i| 2.0_f64.powf(i as f64 / EXP2_SIZE as f64) as f32)
            .collect();

        let taper = (0..=TAPER_SIZE)
            .map(|i| {
                let t = i as f64 / TAPER_SIZE as f64;
                ((10.0_f64.powf(3.0 * t) - 1.0) / 999.0) as f32
            })
            .collect();

        let mut midi = [0.0f32; 128];
        for (note, freq) in midi.iter_mut().enumerate() {
            *freq = (440.0 * 2.0_f64.powf((note as f64 - 69.0) / 12.0)) as f32;
        }

        log::debug!(
            "lookup tables built: sine={SINE_SIZE} exp={EXP_SIZE} exp2={EXP2_SIZE} taper={TAPER_SIZE}"
        );

        Self {
            sine,
            exp_decay,
            exp2_frac,
            taper,
            midi,
        }
    }

    /// Build the tables and wrap them for sharing between components.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    #[inline]
    fn lookup(table: &[f32], position: f32) -> f32 {
        let last = table.len() - 2;
        let index = (position as usize).min(last);
        let frac = (position - index as f32).clamp(0.0, 1.0);
        let a = table[index];
        let b = table[index + 1];
        a + (b - a) * frac
    }

    /// Sine of `phase` cycles.
    #[inline]
    pub fn sin(&self, phase: f32) -> f32 {
        let wrapped = phase - phase.floor();
        Self::lookup(&self.sine, wrapped * SINE_SIZE as f32)
    }

    /// Cosine of `phase` cycles.
    #[inline]
    pub fn cos(&self, phase: f32) -> f32 {
        self.sin(phase + 0.25)
    }

    /// e^-x for x >= 0.
    #[inline]
    pub fn exp_decay(&self, x: f32) -> f32 {
        if x <= 0.0 {
            return 1.0;
        }
        if x >= EXP_RANGE {
            return 0.0;
        }
        Self::lookup(&self.exp_decay, x * (EXP_SIZE as f32 / EXP_RANGE))
    }

    /// 2^x.
    #[inline]
    pub fn exp2(&self, x: f32) -> f32 {
        let x = x.clamp(-126.0, 126.0);
        let whole = x.floor();
        let frac = x - whole;
        Self::lookup(&self.exp2_frac, frac * EXP2_SIZE as f32) * 2.0_f32.powi(whole as i32)
    }

    /// Frequency ratio for a pitch offset in semitones.
    #[inline]
    pub fn semitones_to_ratio(&self, semitones: f32) -> f32 {
        self.exp2(semitones / 12.0)
    }

    /// Logarithmic taper: maps `t` in [0, 1] onto [0, 1] along a 60 dB curve.
    #[inline]
    pub fn log_taper(&self, t: f32) -> f32 {
        Self::lookup(&self.taper, t.clamp(0.0, 1.0) * TAPER_SIZE as f32)
    }

    /// Logarithmic sweep between `start` and `end` at normalized position `t`.
    #[inline]
    pub fn log_sweep(&self, t: f32, start: f32, end: f32) -> f32 {
        start + (end - start) * self.log_taper(t)
    }

    /// Frequency of a (possibly fractional) MIDI note number.
    #[inline]
    pub fn midi_to_freq(&self, note: f32) -> f32 {
        let note = note.clamp(0.0, 127.0);
        let whole = note.floor();
        let base = self.midi[whole as usize];
        let frac = note - whole;
        if frac > 0.0 {
            base * self.semitones_to_ratio(frac)
        } else {
            base
        }
    }
}

impl Default for LookupTables {
    fn default() -> Self {
        Self::new()
    }
}
