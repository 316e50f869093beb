//! Energy exchange between vibrating elements and the structures they rest on.

/*
Coupling Network
================

Three shapes of coupling, from simplest to most connected:

  BridgeCoupling   One element against its own termination. A fraction of the
                   arriving wave is absorbed, the rest reflects. Above a knee
                   the reflection is soft-limited so a hard drive cannot pump
                   the loop. Absorbed energy accumulates into a decaying
                   meter.

  SharedBridge     Every voice's element pushes into one scalar bridge
                   motion. Contributions are clamped per voice before they
                   are summed, the sum lands in `pending`, and `tick()` folds
                   it into the motion once per sample:

                       load   = max(mass, sum of port weights)
                       motion = motion * retention + (1 - retention) * pending / load

                   With every contribution clamped to 1, |motion| <= 1 however
                   many voices push, so the return of BRIDGE_FEEDBACK * motion
                   keeps each element's loop gain below 1 at any polyphony.
                   Voices read the motion as it stood before the tick, so
                   every voice in one sample sees the same value.

  SympatheticBank  Undamped-ish waveguide lines tuned to fixed ratios. They
                   never receive note input; their only drive is a fraction
                   of the shared bridge motion.

The trait `BridgeTermination` is the seam a waveguide reflects through. A
rigid termination, the single-element coupling and a voice's port onto the
shared bridge all implement it.
*/

use crate::dsp::filter::DcBlocker;
use crate::dsp::{flush_denormal, soft_clip};
use crate::model::waveguide::WaveguideLine;

pub trait BridgeTermination {
    /// Reflect `incoming` back into the element. `coupling` is the fraction
    /// the termination absorbs.
    fn reflect(&mut self, incoming: f32, coupling: f32) -> f32;
}

/// Termination that absorbs exactly `coupling` and nothing else.
pub struct RigidBridge;

impl BridgeTermination for RigidBridge {
    #[inline]
    fn reflect(&mut self, incoming: f32, coupling: f32) -> f32 {
        incoming * (1.0 - coupling)
    }
}

/// Reflection level above which the nonlinearity engages.
const KNEE: f32 = 0.5;
/// Decay per sample of the absorbed-energy meter.
const ENERGY_RETENTION: f32 = 0.999;

/// Single-element bridge with optional soft limiting.
#[derive(Debug, Clone)]
pub struct BridgeCoupling {
    coupling: f32,
    nonlinearity: f32,
    energy: f32,
}

impl BridgeCoupling {
    pub fn new(coupling: f32, nonlinearity: f32) -> Self {
        let mut bridge = Self {
            coupling: 0.0,
            nonlinearity: 0.0,
            energy: 0.0,
        };
        bridge.set_coupling(coupling);
        bridge.set_nonlinearity(nonlinearity);
        bridge
    }

    pub fn set_coupling(&mut self, coupling: f32) {
        self.coupling = if coupling.is_finite() {
            coupling.clamp(0.0, 1.0)
        } else {
            0.0
        };
    }

    pub fn set_nonlinearity(&mut self, amount: f32) {
        self.nonlinearity = if amount.is_finite() {
            amount.clamp(0.0, 10.0)
        } else {
            0.0
        };
    }

    /// Reflect one sample of element output and meter what was absorbed.
    #[inline]
    pub fn process_string(&mut self, output: f32) -> f32 {
        let linear = output * (1.0 - self.coupling);
        let magnitude = linear.abs();
        let reflected = if self.nonlinearity > 0.0 && magnitude > KNEE {
            let over = magnitude - KNEE;
            (KNEE + over / (1.0 + self.nonlinearity * over)).copysign(linear)
        } else {
            linear
        };

        let absorbed = output - reflected;
        self.energy = self.energy * ENERGY_RETENTION + absorbed * absorbed;
        reflected
    }

    /// Decaying accumulation of absorbed energy.
    pub fn energy(&self) -> f32 {
        self.energy
    }

    pub fn reset(&mut self) {
        self.energy = 0.0;
    }
}

impl BridgeTermination for BridgeCoupling {
    #[inline]
    fn reflect(&mut self, incoming: f32, coupling: f32) -> f32 {
        self.set_coupling(coupling);
        self.process_string(incoming)
    }
}

/// Largest magnitude any one voice may push into the shared bridge per tick.
pub const MAX_CONTRIBUTION: f32 = 1.0;
/// Share of bridge motion returned into each connected element.
const BRIDGE_FEEDBACK: f32 = 0.5;

/// One mass shared by every voice of an instrument.
pub struct SharedBridge {
    motion: f32,
    pending: f32,
    mass: f32,
    load: f32,
    retention: f32,
    coupling: f32,
    weights: Vec<f32>,
}

impl SharedBridge {
    /// `voices` fixes the number of ports; the weight table is allocated here
    /// and never again.
    pub fn new(voices: usize, mass: f32, sample_rate: f32) -> Self {
        let time_constant = 0.004 * sample_rate.max(1.0);
        let mut bridge = Self {
            motion: 0.0,
            pending: 0.0,
            mass: if mass.is_finite() { mass.max(0.1) } else { 1.0 },
            load: 1.0,
            retention: (-1.0 / time_constant).exp(),
            coupling: 0.1,
            weights: vec![1.0; voices],
        };
        bridge.update_load();
        bridge
    }

    fn update_load(&mut self) {
        let total: f32 = self.weights.iter().sum();
        self.load = self.mass.max(total);
    }

    pub fn set_coupling(&mut self, coupling: f32) {
        self.coupling = if coupling.is_finite() {
            coupling.clamp(0.0, 0.5)
        } else {
            0.0
        };
    }

    pub fn set_weight(&mut self, voice: usize, weight: f32) {
        if let Some(w) = self.weights.get_mut(voice) {
            *w = if weight.is_finite() {
                weight.clamp(0.0, 1.0)
            } else {
                0.0
            };
            self.update_load();
        }
    }

    /// Accumulate one voice's output and return that voice's reflection,
    /// using the bridge's own coupling coefficient.
    #[inline]
    pub fn add_string_energy(&mut self, output: f32, voice: usize) -> f32 {
        self.exchange(output, voice, self.coupling)
    }

    #[inline]
    fn exchange(&mut self, output: f32, voice: usize, coupling: f32) -> f32 {
        let weight = self.weights.get(voice).copied().unwrap_or(0.0);
        let contribution = output.clamp(-MAX_CONTRIBUTION, MAX_CONTRIBUTION) * weight;
        self.pending += contribution;
        // Motion is read before this sample's tick.
        output * (1.0 - coupling) + coupling * BRIDGE_FEEDBACK * self.motion
    }

    /// Fold this sample's contributions into the motion. Exactly once per
    /// sample, after every voice has contributed.
    #[inline]
    pub fn tick(&mut self) {
        let drive = self.pending / self.load;
        self.motion = flush_denormal(self.motion * self.retention + (1.0 - self.retention) * drive);
        self.pending = 0.0;
    }

    pub fn bridge_motion(&self) -> f32 {
        self.motion
    }

    /// A termination that routes one voice's element through this bridge.
    pub fn port(&mut self, voice: usize) -> SharedBridgePort<'_> {
        SharedBridgePort {
            bridge: self,
            voice,
        }
    }

    pub fn voices(&self) -> usize {
        self.weights.len()
    }

    pub fn reset(&mut self) {
        self.motion = 0.0;
        self.pending = 0.0;
    }
}

pub struct SharedBridgePort<'a> {
    bridge: &'a mut SharedBridge,
    voice: usize,
}

impl BridgeTermination for SharedBridgePort<'_> {
    #[inline]
    fn reflect(&mut self, incoming: f32, coupling: f32) -> f32 {
        self.bridge.exchange(incoming, self.voice, coupling)
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SympatheticTuning {
    /// First six harmonics of the base pitch.
    #[default]
    Harmonic,
    /// Root, fifth, octave, twelfth, two octaves, two octaves and a fifth.
    Drone,
}

impl SympatheticTuning {
    pub fn ratios(self) -> &'static [f32] {
        match self {
            SympatheticTuning::Harmonic => &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            SympatheticTuning::Drone => &[1.0, 1.5, 2.0, 3.0, 4.0, 6.0],
        }
    }
}

const SYMPATHETIC_DAMPING: f32 = 0.05;
const SYMPATHETIC_SEND: f32 = 0.5;

/// Strings that only ever hear the bridge.
pub struct SympatheticBank {
    lines: Vec<WaveguideLine>,
    dc: DcBlocker,
    tuning: SympatheticTuning,
    base_frequency: f32,
    level: f32,
}

impl SympatheticBank {
    pub fn new(sample_rate: f32, tuning: SympatheticTuning, base_frequency: f32) -> Self {
        let lines = tuning
            .ratios()
            .iter()
            .map(|_| WaveguideLine::new(sample_rate))
            .collect();
        let mut bank = Self {
            lines,
            dc: DcBlocker::new(sample_rate),
            tuning,
            base_frequency,
            level: 1.0,
        };
        bank.retune(base_frequency);
        bank
    }

    pub fn retune(&mut self, base_frequency: f32) {
        self.base_frequency = base_frequency;
        for (line, ratio) in self.lines.iter_mut().zip(self.tuning.ratios()) {
            line.configure(base_frequency * ratio, SYMPATHETIC_DAMPING, 0.05, 0.0, 1.0);
        }
    }

    pub fn set_level(&mut self, level: f32) {
        self.level = if level.is_finite() {
            level.clamp(0.0, 1.0)
        } else {
            0.0
        };
    }

    #[inline]
    pub fn excite_from_bridge(&mut self, bridge_motion: f32) {
        let drive = bridge_motion * SYMPATHETIC_SEND;
        for line in &mut self.lines {
            line.inject(drive);
        }
    }

    /// Sum of every line, soft-limited to unit amplitude.
    #[inline]
    pub fn process_sample(&mut self) -> f32 {
        let sum: f32 = self.lines.iter_mut().map(|line| line.process_sample()).sum();
        // Bridge motion carries a slow offset; keep it out of the mix.
        let sum = self.dc.process(sum);
        soft_clip(sum * self.level / self.lines.len().max(1) as f32)
    }

    pub fn energy(&self) -> f32 {
        self.lines.iter().map(WaveguideLine::energy).sum()
    }

    pub fn base_frequency(&self) -> f32 {
        self.base_frequency
    }

    pub fn tuning(&self) -> SympatheticTuning {
        self.tuning
    }

    pub fn reset(&mut self) {
        for line in &mut self.lines {
            line.reset();
        }
        self.dc.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 48_000.0;

    #[test]
    fn rigid_bridge_absorbs_the_coupling_fraction() {
        assert!((RigidBridge.reflect(1.0, 0.25) - 0.75).abs() < 1e-6);
    }

    #[test]
    fn nonlinear_reflection_never_exceeds_linear() {
        let mut bridge = BridgeCoupling::new(0.1, 2.0);
        for i in -100..=100 {
            let x = i as f32 * 0.1;
            let r = bridge.process_string(x);
            assert!(r.abs() <= (x * 0.9).abs() + 1e-6, "x {x} r {r}");
            assert_eq!(r.signum(), (x * 0.9).signum());
        }
        assert!(bridge.energy() > 0.0);
    }

    #[test]
    fn absorbed_energy_meter_decays() {
        let mut bridge = BridgeCoupling::new(0.5, 0.0);
        bridge.process_string(1.0);
        let after_hit = bridge.energy();
        for _ in 0..100 {
            bridge.process_string(0.0);
        }
        assert!(bridge.energy() < after_hit);
    }

    #[test]
    fn three_voices_move_the_bridge_more_than_one() {
        let mut single = SharedBridge::new(4, 2.0, SAMPLE_RATE);
        single.add_string_energy(0.3, 0);
        single.tick();

        let mut shared = SharedBridge::new(4, 2.0, SAMPLE_RATE);
        for voice in 0..3 {
            shared.add_string_energy(0.3, voice);
        }
        shared.tick();

        assert!(shared.bridge_motion() > single.bridge_motion());
        assert!(single.bridge_motion() > 0.0);
    }

    #[test]
    fn every_voice_reads_pre_tick_motion() {
        let mut bridge = SharedBridge::new(3, 1.0, SAMPLE_RATE);
        bridge.set_coupling(0.5);
        bridge.add_string_energy(1.0, 0);
        bridge.tick();

        let a = bridge.add_string_energy(0.0, 0);
        let b = bridge.add_string_energy(0.0, 1);
        let c = bridge.add_string_energy(0.0, 2);
        assert!(a != 0.0);
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn contributions_are_clamped_before_injection() {
        let mut huge = SharedBridge::new(1, 1.0, SAMPLE_RATE);
        huge.add_string_energy(1.0e6, 0);
        huge.tick();

        let mut unit = SharedBridge::new(1, 1.0, SAMPLE_RATE);
        unit.add_string_energy(MAX_CONTRIBUTION, 0);
        unit.tick();

        assert_eq!(huge.bridge_motion(), unit.bridge_motion());
    }

    #[test]
    fn heavier_bridge_moves_less() {
        let mut light = SharedBridge::new(1, 1.0, SAMPLE_RATE);
        let mut heavy = SharedBridge::new(1, 8.0, SAMPLE_RATE);
        light.add_string_energy(0.5, 0);
        heavy.add_string_energy(0.5, 0);
        light.tick();
        heavy.tick();
        assert!(heavy.bridge_motion() < light.bridge_motion());
    }

    #[test]
    fn motion_stays_within_unit_at_full_load() {
        for voices in [1, 6, 24] {
            let mut bridge = SharedBridge::new(voices, 4.0, SAMPLE_RATE);
            for _ in 0..48_000 {
                for voice in 0..voices {
                    bridge.add_string_energy(10.0, voice);
                }
                bridge.tick();
            }
            let motion = bridge.bridge_motion();
            assert!(motion > 0.0 && motion <= 1.0 + 1.0e-6, "{voices}: {motion}");
        }
    }

    #[test]
    fn latched_bridge_loop_decays_at_full_polyphony() {
        // Every port reflects its own output plus the shared return, the
        // worst case for a DC build-up through the bridge.
        let voices = 24;
        let mut bridge = SharedBridge::new(voices, 4.0, SAMPLE_RATE);
        bridge.set_coupling(0.5);
        let mut y = vec![1.0f32; voices];
        for _ in 0..48_000 {
            for (voice, y) in y.iter_mut().enumerate() {
                *y = bridge.port(voice).reflect(*y, 0.5);
            }
            bridge.tick();
        }
        assert!(y.iter().all(|y| y.abs() < 1.0e-6), "{:?}", &y[..4]);
    }

    #[test]
    fn idle_bridge_settles_to_exact_zero() {
        let mut bridge = SharedBridge::new(2, 4.0, SAMPLE_RATE);
        bridge.add_string_energy(1.0, 0);
        for _ in 0..48_000 {
            bridge.tick();
        }
        assert_eq!(bridge.bridge_motion(), 0.0);
    }

    #[test]
    fn sympathetic_bank_rings_after_one_kick() {
        let mut bank = SympatheticBank::new(SAMPLE_RATE, SympatheticTuning::Harmonic, 110.0);
        bank.excite_from_bridge(1.0);
        for _ in 0..1000 {
            bank.process_sample();
        }
        let tail = (0..2000).fold(0.0f32, |acc, _| acc.max(bank.process_sample().abs()));
        assert!(tail > 1.0e-3, "tail {tail}");
        assert!(bank.energy() > crate::SILENCE_THRESHOLD);
    }

    #[test]
    fn sympathetic_bank_is_silent_without_bridge_motion() {
        let mut bank = SympatheticBank::new(SAMPLE_RATE, SympatheticTuning::Drone, 98.0);
        for _ in 0..4096 {
            assert_eq!(bank.process_sample(), 0.0);
        }
    }
}
