//! Two-rail digital waveguide for strings and bores.

/*
Waveguide Line
==============

A vibrating string carries two travelling waves. Each rail is a delay line
holding half a period; the ends reflect with a sign flip:

        nut                                          bridge
         │  ── forward rail (rail_delay samples) ──▶  │
   -1 ◀──┤                                            ├──▶ loop filter ──▶ bridge termination
         │  ◀── backward rail (rail_delay samples) ── │                          │
         └────────────────────────────────────────────┴──────────────────────────┘

Loop filter at the bridge, in order:

  lowpass   one-pole, unity DC gain; frequency-dependent loss (damping)
  allpass   first-order; frequency-dependent delay (stiffness / dispersion)
  gain      loop_gain < 1
  bridge    termination reflects at most |input| (see coupling.rs)
  damper    release_gain <= 1, scaling the whole reflection including any
            shared-bridge return

Every stage has magnitude response <= 1 and the loop gain is strictly below 1,
so the recirculating energy can only shrink. Rail writes and the level meter
are flushed to zero once they decay below DENORMAL_FLOOR.

Tuning. One round trip is 2 * rail_delay plus the low-frequency delay of the
two filters, so

    rail_delay = (sample_rate / f - lowpass_delay - allpass_delay) / 2

with a linearly interpolated read for the fractional part.

Scale. A bigger instrument has a heavier, longer body: its decay time grows,
its dispersion and bridge coupling shrink. The coefficients are re-derived
from the user values and the scale every time either changes.
*/

use crate::dsp::delay::DelayLine;
use crate::dsp::filter::{Allpass, OnePole};
use crate::dsp::flush_denormal;
use crate::model::coupling::{BridgeTermination, RigidBridge};
use crate::MIN_FREQUENCY_HZ;

/// Decay time at zero damping and unit scale, in seconds.
const MAX_T60: f32 = 12.0;
/// Decay time at full damping and unit scale, in seconds.
const MIN_T60: f32 = 0.08;
const MAX_LOOP_GAIN: f32 = 0.9995;
/// Decay time imposed by a full damper, in seconds.
const DAMPER_T60: f32 = 0.12;
const LEVEL_TIME: f32 = 0.05;

pub const MIN_SCALE: f32 = 0.25;
pub const MAX_SCALE: f32 = 4.0;
pub const MAX_BRIDGE_COUPLING: f32 = 0.5;

pub struct WaveguideLine {
    sample_rate: f32,
    forward: DelayLine,
    backward: DelayLine,
    lowpass: OnePole,
    allpass: Allpass,

    // User-facing values.
    frequency: f32,
    damping: f32,
    stiffness: f32,
    bridge_coupling: f32,
    scale: f32,
    release_amount: f32,

    // Derived.
    rail_delay: f32,
    loop_gain: f32,
    coupling: f32,
    decay_time: f32,
    release_gain: f32,

    pending: f32,
    level: f32,
    level_coeff: f32,
}

impl WaveguideLine {
    pub fn new(sample_rate: f32) -> Self {
        let sample_rate = sample_rate.max(1_000.0);
        // Half a period at the lowest supported pitch, plus interpolation headroom.
        let capacity = (sample_rate / MIN_FREQUENCY_HZ / 2.0) as usize + 4;
        let mut line = Self {
            sample_rate,
            forward: DelayLine::with_capacity(capacity),
            backward: DelayLine::with_capacity(capacity),
            lowpass: OnePole::new(0.0),
            allpass: Allpass::new(0.0),
            frequency: 220.0,
            damping: 0.3,
            stiffness: 0.0,
            bridge_coupling: 0.1,
            scale: 1.0,
            release_amount: 0.0,
            rail_delay: 1.0,
            loop_gain: 0.0,
            coupling: 0.0,
            decay_time: 0.0,
            release_gain: 1.0,
            pending: 0.0,
            level: 0.0,
            level_coeff: (-1.0 / (LEVEL_TIME * sample_rate)).exp(),
        };
        line.update_coefficients();
        line
    }

    /// Set every user value at once and re-derive the loop a single time.
    pub fn configure(
        &mut self,
        frequency: f32,
        damping: f32,
        stiffness: f32,
        bridge_coupling: f32,
        scale: f32,
    ) {
        self.frequency = self.clamp_frequency(frequency);
        self.damping = clamp_unit(damping);
        self.stiffness = clamp_unit(stiffness);
        self.bridge_coupling = clamp_coupling(bridge_coupling);
        self.scale = clamp_scale(scale);
        self.update_coefficients();
    }

    pub fn set_frequency(&mut self, hz: f32) {
        self.frequency = self.clamp_frequency(hz);
        self.update_coefficients();
    }

    pub fn set_damping(&mut self, damping: f32) {
        self.damping = clamp_unit(damping);
        self.update_coefficients();
    }

    pub fn set_stiffness(&mut self, stiffness: f32) {
        self.stiffness = clamp_unit(stiffness);
        self.update_coefficients();
    }

    pub fn set_bridge_coupling(&mut self, coupling: f32) {
        self.bridge_coupling = clamp_coupling(coupling);
        self.update_coefficients();
    }

    pub fn set_scale(&mut self, scale: f32) {
        self.scale = clamp_scale(scale);
        self.update_coefficients();
    }

    /// Extra loss applied while a damper rests on the element. 0 lets it
    /// ring, 1 silences it within roughly a tenth of a second.
    pub fn set_release_damping(&mut self, amount: f32) {
        self.release_amount = clamp_unit(amount);
        self.update_release_gain();
    }

    fn clamp_frequency(&self, hz: f32) -> f32 {
        if !hz.is_finite() {
            return MIN_FREQUENCY_HZ;
        }
        hz.clamp(MIN_FREQUENCY_HZ, self.sample_rate * 0.45)
    }

    fn update_coefficients(&mut self) {
        let scale = self.scale;

        let t60 = MAX_T60 * (MIN_T60 / MAX_T60).powf(self.damping) * scale;
        self.decay_time = t60;
        self.loop_gain = 0.001_f32
            .powf(1.0 / (t60 * self.frequency))
            .min(MAX_LOOP_GAIN);

        self.lowpass
            .set_coefficient(((0.05 + 0.55 * self.damping) / scale.sqrt()).clamp(0.0, 0.9));
        self.allpass
            .set_coefficient(-(0.7 * self.stiffness / scale).min(0.9));
        self.coupling = (self.bridge_coupling / scale).clamp(0.0, MAX_BRIDGE_COUPLING);

        let period = self.sample_rate / self.frequency;
        let filter_delay = self.lowpass.phase_delay() + self.allpass.phase_delay();
        self.rail_delay =
            ((period - filter_delay) * 0.5).clamp(1.0, self.forward.max_delay() - 1.0);

        self.update_release_gain();
    }

    fn update_release_gain(&mut self) {
        self.release_gain = if self.release_amount > 0.0 {
            0.001_f32.powf(self.release_amount / (DAMPER_T60 * self.frequency))
        } else {
            1.0
        };
    }

    /// Add `signal * velocity` to the forward rail so that `signal[0]` reaches
    /// the bridge on the next step and each later sample one step after the
    /// previous. Samples beyond one rail length are dropped.
    pub fn excite(&mut self, signal: &[f32], velocity: f32) {
        let reach = self.rail_delay as usize;
        for (i, &s) in signal.iter().take(reach).enumerate() {
            self.forward.add_at(reach - i, s * velocity);
        }
    }

    /// Drive launched from the bridge end into the backward rail on the next step.
    #[inline]
    pub fn inject(&mut self, x: f32) {
        self.pending += x;
    }

    /// Advance one step against a rigid bridge.
    #[inline]
    pub fn process_sample(&mut self) -> f32 {
        self.process_sample_with(&mut RigidBridge)
    }

    /// Advance one step, reflecting through `bridge`. Returns the wave
    /// arriving at the bridge.
    #[inline]
    pub fn process_sample_with<B: BridgeTermination + ?Sized>(&mut self, bridge: &mut B) -> f32 {
        let arriving = self.forward.read_interpolated(self.rail_delay);
        let returning = self.backward.read_interpolated(self.rail_delay);

        let damped = self.allpass.process(self.lowpass.process(arriving)) * self.loop_gain;
        let reflected = bridge.reflect(damped, self.coupling) * self.release_gain;

        let drive = self.pending;
        self.pending = 0.0;

        self.backward.write(flush_denormal(-reflected + drive));
        self.forward.write(flush_denormal(-returning));

        self.level = flush_denormal(arriving.abs().max(self.level * self.level_coeff));
        arriving
    }

    /// Squared peak level of recent output.
    pub fn energy(&self) -> f32 {
        self.level * self.level
    }

    pub fn reset(&mut self) {
        self.forward.reset();
        self.backward.reset();
        self.lowpass.reset();
        self.allpass.reset();
        self.pending = 0.0;
        self.level = 0.0;
        self.release_amount = 0.0;
        self.release_gain = 1.0;
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    pub fn rail_delay(&self) -> f32 {
        self.rail_delay
    }

    pub fn loop_gain(&self) -> f32 {
        self.loop_gain * self.release_gain
    }

    /// Bridge coupling after scale has been applied.
    pub fn effective_coupling(&self) -> f32 {
        self.coupling
    }

    /// Nominal 60 dB decay time in seconds, before loop-filter losses.
    pub fn decay_time(&self) -> f32 {
        self.decay_time
    }

    pub fn dispersion(&self) -> f32 {
        self.allpass.phase_delay() - 1.0
    }
}

#[inline]
fn clamp_unit(x: f32) -> f32 {
    if x.is_finite() {
        x.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[inline]
fn clamp_scale(x: f32) -> f32 {
    if x.is_finite() {
        x.clamp(MIN_SCALE, MAX_SCALE)
    } else {
        1.0
    }
}

#[inline]
fn clamp_coupling(x: f32) -> f32 {
    if x.is_finite() {
        x.clamp(0.0, MAX_BRIDGE_COUPLING)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 48_000.0;

    fn plucked(frequency: f32, damping: f32) -> WaveguideLine {
        let mut line = WaveguideLine::new(SAMPLE_RATE);
        line.configure(frequency, damping, 0.0, 0.0, 1.0);
        line.excite(&[1.0, 0.6, 0.3, 0.1], 1.0);
        line
    }

    fn window_peak(line: &mut WaveguideLine, len: usize) -> f32 {
        (0..len).fold(0.0f32, |acc, _| acc.max(line.process_sample().abs()))
    }

    #[test]
    fn impulse_response_decays_below_one_percent() {
        let mut line = plucked(220.0, 0.5);
        let peak = window_peak(&mut line, 1024);
        assert!(peak > 0.1);

        // 60 dB in decay_time seconds, so -40 dB is well inside that bound.
        let bound = (line.decay_time() * SAMPLE_RATE) as usize;
        for _ in 0..bound {
            line.process_sample();
        }
        let tail = window_peak(&mut line, 1024);
        assert!(tail < peak * 0.01, "tail {tail} vs peak {peak}");
    }

    #[test]
    fn envelope_is_non_increasing_in_the_long_run() {
        let mut line = plucked(330.0, 0.3);
        let windows: Vec<f32> = (0..24).map(|_| window_peak(&mut line, 2048)).collect();
        for pair in windows.windows(5) {
            assert!(pair[4] <= pair[0] * 1.001, "{:?}", pair);
        }
    }

    #[test]
    fn pitch_matches_requested_frequency() {
        let frequency = 440.0;
        let mut line = plucked(frequency, 0.2);
        let samples: Vec<f32> = (0..4096).map(|_| line.process_sample()).collect();

        let expected = SAMPLE_RATE / frequency;
        let lo = (expected * 0.8) as usize;
        let hi = (expected * 1.2) as usize;
        let best = (lo..=hi)
            .max_by(|&a, &b| {
                let ca: f32 = samples.iter().zip(&samples[a..]).map(|(x, y)| x * y).sum();
                let cb: f32 = samples.iter().zip(&samples[b..]).map(|(x, y)| x * y).sum();
                ca.total_cmp(&cb)
            })
            .unwrap();
        assert!(
            (best as f32 - expected).abs() <= 1.0,
            "period {best}, expected {expected}"
        );
    }

    #[test]
    fn damped_tail_reaches_exact_silence() {
        let mut line = plucked(98.0, 0.1);
        window_peak(&mut line, 2048);
        line.set_release_damping(1.0);
        for _ in 0..(5.0 * SAMPLE_RATE) as usize {
            line.process_sample();
        }
        assert_eq!(line.energy(), 0.0);
        assert_eq!(line.process_sample(), 0.0);
    }

    #[test]
    fn loop_gain_stays_below_one_for_every_setting() {
        let mut line = WaveguideLine::new(SAMPLE_RATE);
        for &f in &[20.0, 55.0, 440.0, 4_000.0, 21_000.0] {
            for &d in &[0.0, 0.5, 1.0] {
                for &s in &[0.0, 1.0] {
                    for &scale in &[0.25, 1.0, 4.0] {
                        line.configure(f, d, s, 0.5, scale);
                        assert!(line.loop_gain() < 1.0);
                        assert!(line.rail_delay() >= 1.0);
                    }
                }
            }
        }
    }

    #[test]
    fn output_stays_bounded_under_constant_drive() {
        let mut line = WaveguideLine::new(SAMPLE_RATE);
        line.configure(2_000.0, 0.0, 1.0, 0.0, 4.0);
        // DC settles at drive / (1 - loop gain); nothing may run past it.
        let ceiling = 0.1 / (1.0 - line.loop_gain()) * 2.0;
        for _ in 0..48_000 {
            line.inject(0.1);
            let y = line.process_sample();
            assert!(y.is_finite() && y.abs() < ceiling, "{y} >= {ceiling}");
        }
    }

    #[test]
    fn larger_scale_rings_longer_and_couples_less() {
        let mut small = WaveguideLine::new(SAMPLE_RATE);
        let mut large = WaveguideLine::new(SAMPLE_RATE);
        small.configure(110.0, 0.4, 0.6, 0.3, 1.0);
        large.configure(110.0, 0.4, 0.6, 0.3, 3.0);

        assert!(large.decay_time() > small.decay_time());
        assert!(large.effective_coupling() < small.effective_coupling());
        assert!(large.dispersion() < small.dispersion());
    }

    #[test]
    fn invalid_inputs_are_clamped() {
        let mut line = WaveguideLine::new(SAMPLE_RATE);
        line.set_frequency(-10.0);
        assert_eq!(line.frequency(), MIN_FREQUENCY_HZ);
        line.set_frequency(f32::NAN);
        assert_eq!(line.frequency(), MIN_FREQUENCY_HZ);
        line.set_frequency(1.0e6);
        assert_eq!(line.frequency(), SAMPLE_RATE * 0.45);
        assert!(line.rail_delay() >= 1.0);

        line.set_bridge_coupling(7.0);
        assert!(line.effective_coupling() <= MAX_BRIDGE_COUPLING);
    }

    #[test]
    fn release_damping_shortens_the_tail() {
        let mut free = plucked(220.0, 0.1);
        let mut damped = plucked(220.0, 0.1);
        damped.set_release_damping(1.0);
        window_peak(&mut free, 9_600);
        window_peak(&mut damped, 9_600);
        assert!(window_peak(&mut damped, 1024) < window_peak(&mut free, 1024) * 0.05);
    }

    #[test]
    fn reset_silences_the_line() {
        let mut line = plucked(220.0, 0.1);
        window_peak(&mut line, 100);
        line.reset();
        assert_eq!(window_peak(&mut line, 2048), 0.0);
        assert_eq!(line.energy(), 0.0);
    }
}
