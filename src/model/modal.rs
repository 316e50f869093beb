//! Modal resonator bank for bells, gongs, plates, membranes and bars.

/*
Modal Resonator Bank
====================

A rigid body rings as a sum of independent damped sinusoids, one per normal
mode. Each mode here is a phase accumulator plus an amplitude that shrinks by
a fixed factor every sample:

    out      += gain * amplitude * sin(phase)
    phase    += increment
    amplitude *= decay            with decay in [0, 1)

Because amplitude only ever multiplies by a factor below one, the bank is
unconditionally stable and its energy (sum of amplitude^2) falls strictly
from one silent sample to the next.

Templates. Each body type has a table of frequency ratios and relative
gains. `size` scales the whole table:

    f_i   = fundamental / size * (1 + (ratio_i - 1) / sqrt(size))    lower and denser
    t60_i = base_t60 * size^1.5 / ratio_i^tilt                        longer

Sub-fundamental ratios (a bell's hum) spread as ratio_i^(1 / sqrt(size))
instead, which stays above zero at every size.

Strikes. A strike at `position` along the body excites mode i in proportion
to |sin(pi * (i + 1) * position)|, so hitting near a node leaves that mode
quiet. Brightness tilts energy toward the upper modes.

Shimmer. At high amplitude a mode's frequency drifts slightly sharp,
proportional to amplitude^2 and capped at a few percent. It only ever touches
the phase increment, never the decay, so it cannot destabilise anything.
*/

use std::sync::Arc;

use crate::dsp::LookupTables;

pub const MAX_MODES: usize = 16;

const MAX_AMPLITUDE: f32 = 4.0;
const MAX_SHIMMER: f32 = 0.03;
const SHIMMER_DEPTH: f32 = 0.02;
const MAX_DECAY: f32 = 1.0 - 1.0e-6;
const OUTPUT_GAIN: f32 = 0.5;
const EXCITE_GAIN: f32 = 0.05;
/// Decay time imposed by a full damper, in seconds.
const DAMPER_T60: f32 = 0.15;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModalType {
    #[default]
    Gong,
    Bell,
    Plate,
    Membrane,
    Bar,
}

struct Template {
    ratios: &'static [f32],
    gains: &'static [f32],
    /// Fundamental decay time at unit size, in seconds.
    t60: f32,
    /// How quickly upper modes die relative to the fundamental.
    tilt: f32,
}

const GONG: Template = Template {
    ratios: &[
        1.0, 1.52, 2.03, 2.48, 2.98, 3.56, 4.12, 4.57, 5.09, 5.61, 6.23, 6.82, 7.35, 7.91, 8.44,
        9.02,
    ],
    gains: &[
        1.0, 0.85, 0.8, 0.7, 0.62, 0.55, 0.5, 0.45, 0.4, 0.36, 0.32, 0.28, 0.25, 0.22, 0.2, 0.18,
    ],
    t60: 6.0,
    tilt: 0.5,
};

const BELL: Template = Template {
    ratios: &[0.5, 1.0, 1.183, 1.506, 2.0, 2.514, 2.662, 3.011, 4.166, 5.433, 6.796, 8.215],
    gains: &[0.6, 1.0, 0.8, 0.6, 0.5, 0.4, 0.35, 0.3, 0.2, 0.15, 0.1, 0.08],
    t60: 4.5,
    tilt: 0.7,
};

// Simply supported square plate, (m^2 + n^2) / 2.
const PLATE: Template = Template {
    ratios: &[
        1.0, 2.5, 4.0, 5.0, 6.5, 8.5, 9.0, 10.0, 12.5, 13.0, 14.5, 16.0, 17.0, 18.5, 20.0, 20.5,
    ],
    gains: &[
        1.0, 0.9, 0.8, 0.75, 0.7, 0.6, 0.55, 0.5, 0.45, 0.4, 0.35, 0.3, 0.28, 0.25, 0.22, 0.2,
    ],
    t60: 3.0,
    tilt: 0.4,
};

// Zeros of the Bessel functions for a circular membrane.
const MEMBRANE: Template = Template {
    ratios: &[
        1.0, 1.594, 2.136, 2.296, 2.653, 2.918, 3.156, 3.501, 3.6, 3.652, 4.059, 4.154, 4.241,
        4.601, 4.61, 4.654,
    ],
    gains: &[
        1.0, 0.8, 0.6, 0.55, 0.45, 0.4, 0.35, 0.3, 0.28, 0.25, 0.22, 0.2, 0.18, 0.16, 0.14, 0.12,
    ],
    t60: 0.8,
    tilt: 1.2,
};

// Free-free bar.
const BAR: Template = Template {
    ratios: &[1.0, 2.756, 5.404, 8.933, 13.344, 18.636, 24.81, 31.865],
    gains: &[1.0, 0.5, 0.3, 0.18, 0.1, 0.06, 0.04, 0.02],
    t60: 2.0,
    tilt: 0.9,
};

impl ModalType {
    fn template(self) -> &'static Template {
        match self {
            ModalType::Gong => &GONG,
            ModalType::Bell => &BELL,
            ModalType::Plate => &PLATE,
            ModalType::Membrane => &MEMBRANE,
            ModalType::Bar => &BAR,
        }
    }

    /// Number of modes the template defines.
    pub fn mode_count(self) -> usize {
        self.template().ratios.len()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Mode {
    pub frequency: f32,
    /// Per-sample amplitude retention, in [0, 1).
    pub decay: f32,
    pub amplitude: f32,
    /// Phase in cycles.
    pub phase: f32,
    increment: f32,
    gain: f32,
    strike_weight: f32,
}

pub struct ModalBank {
    modes: [Mode; MAX_MODES],
    count: usize,
    kind: ModalType,
    size: f32,
    fundamental: f32,
    shimmer: f32,
    release_mult: f32,
    damper_decay: f32,
    sample_rate: f32,
    tables: Arc<LookupTables>,
}

impl ModalBank {
    pub fn new(sample_rate: f32, tables: Arc<LookupTables>) -> Self {
        let sample_rate = sample_rate.max(1_000.0);
        let mut bank = Self {
            modes: [Mode::default(); MAX_MODES],
            count: 0,
            kind: ModalType::Gong,
            size: 1.0,
            fundamental: 220.0,
            shimmer: 0.0,
            release_mult: 1.0,
            damper_decay: 0.001_f32.powf(1.0 / (DAMPER_T60 * sample_rate)),
            sample_rate,
            tables,
        };
        bank.set_parameters(ModalType::Gong, 1.0, MAX_MODES);
        bank
    }

    pub fn set_instrument_type(&mut self, kind: ModalType) {
        self.set_parameters(kind, self.size, self.count.max(1));
    }

    /// Repopulate the modes from `kind`'s template scaled by `size`.
    /// Amplitudes and phases of surviving modes are kept.
    pub fn set_parameters(&mut self, kind: ModalType, size: f32, mode_count: usize) {
        self.kind = kind;
        self.size = if size.is_finite() {
            size.clamp(0.25, 4.0)
        } else {
            1.0
        };
        self.count = mode_count.clamp(1, kind.mode_count().min(MAX_MODES));
        for mode in &mut self.modes[self.count..] {
            *mode = Mode::default();
        }
        self.update_modes();
    }

    pub fn set_fundamental(&mut self, hz: f32) {
        self.fundamental = if hz.is_finite() {
            hz.clamp(crate::MIN_FREQUENCY_HZ, self.sample_rate * 0.45)
        } else {
            crate::MIN_FREQUENCY_HZ
        };
        self.update_modes();
    }

    fn update_modes(&mut self) {
        let template = self.kind.template();
        let size = self.size;
        let spread = size.sqrt().recip();
        let base_t60 = template.t60 * size.powf(1.5);
        let nyquist_guard = self.sample_rate * 0.45;

        for (i, mode) in self.modes[..self.count].iter_mut().enumerate() {
            let ratio = template.ratios[i];
            let stretched = if ratio >= 1.0 {
                1.0 + (ratio - 1.0) * spread
            } else {
                ratio.powf(spread)
            };
            let frequency = self.fundamental / size * stretched;
            let t60 = base_t60 / ratio.max(0.5).powf(template.tilt);

            mode.frequency = frequency;
            mode.increment = (frequency / self.sample_rate).clamp(0.0, 0.49);
            mode.decay = 0.001_f32
                .powf(1.0 / (t60 * self.sample_rate))
                .clamp(0.0, MAX_DECAY);
            // Modes that would alias are muted rather than folded.
            mode.gain = if frequency < nyquist_guard {
                template.gains[i]
            } else {
                0.0
            };
        }
    }

    pub fn set_shimmer(&mut self, amount: f32) {
        self.shimmer = if amount.is_finite() {
            amount.clamp(0.0, 1.0)
        } else {
            0.0
        };
    }

    /// Extra loss while damped. 0 lets the body ring, 1 stops it within a
    /// fraction of a second.
    pub fn set_release_damping(&mut self, amount: f32) {
        let amount = if amount.is_finite() {
            amount.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.release_mult = 1.0 + (self.damper_decay - 1.0) * amount;
    }

    /// Add a strike's worth of amplitude to every mode.
    pub fn strike(&mut self, force: f32, brightness: f32, position: f32) {
        let force = if force.is_finite() {
            force.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let brightness = brightness.clamp(0.0, 1.0);
        let position = position.clamp(0.02, 0.98);

        for (i, mode) in self.modes[..self.count].iter_mut().enumerate() {
            let comb = self.tables.sin(0.5 * (i + 1) as f32 * position).abs();
            let dark = 1.0 / (1.0 + i as f32);
            let tilt = dark + (1.0 - dark) * brightness;
            mode.strike_weight = comb * tilt;
            mode.amplitude = (mode.amplitude + force * mode.strike_weight).min(MAX_AMPLITUDE);
        }
    }

    /// Feed a continuous excitation sample, distributed by the last strike's
    /// weighting.
    #[inline]
    pub fn excite(&mut self, input: f32) {
        if input == 0.0 {
            return;
        }
        let drive = input.abs() * EXCITE_GAIN;
        for mode in &mut self.modes[..self.count] {
            let weight = if mode.strike_weight > 0.0 {
                mode.strike_weight
            } else {
                mode.gain
            };
            mode.amplitude = (mode.amplitude + drive * weight).min(MAX_AMPLITUDE);
        }
    }

    #[inline]
    pub fn process_sample(&mut self) -> f32 {
        let mut out = 0.0;
        let decay_mult = self.release_mult;
        let shimmer = self.shimmer * SHIMMER_DEPTH;

        for mode in &mut self.modes[..self.count] {
            if mode.amplitude == 0.0 {
                continue;
            }
            out += mode.gain * mode.amplitude * self.tables.sin(mode.phase);

            let bend = (shimmer * mode.amplitude * mode.amplitude).min(MAX_SHIMMER);
            let increment = (mode.increment * (1.0 + bend)).min(0.49);
            mode.phase += increment;
            if mode.phase >= 1.0 {
                mode.phase -= 1.0;
            }

            mode.amplitude *= mode.decay * decay_mult;
            if mode.amplitude < 1.0e-12 {
                mode.amplitude = 0.0;
            }
        }

        out * OUTPUT_GAIN
    }

    /// Sum of squared mode amplitudes.
    pub fn total_energy(&self) -> f32 {
        self.modes[..self.count]
            .iter()
            .map(|m| m.amplitude * m.amplitude)
            .sum()
    }

    pub fn modes(&self) -> &[Mode] {
        &self.modes[..self.count]
    }

    pub fn kind(&self) -> ModalType {
        self.kind
    }

    pub fn size(&self) -> f32 {
        self.size
    }

    pub fn reset(&mut self) {
        for mode in &mut self.modes {
            mode.amplitude = 0.0;
            mode.phase = 0.0;
            mode.strike_weight = 0.0;
        }
        self.release_mult = 1.0;
    }
}
