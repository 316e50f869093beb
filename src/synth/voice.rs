use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::dsp::{soft_clip, LookupTables};
use crate::model::coupling::{BridgeCoupling, SharedBridge};
use crate::model::modal::{ModalBank, ModalType, MAX_MODES};
use crate::model::waveguide::WaveguideLine;
use crate::synth::articulation::{Articulation, ArticulationState, Gesture, GestureParams};
use crate::synth::params::ScaleParams;
use crate::SILENCE_THRESHOLD;

/// Reed/lip nonlinearity of the wind voice's own termination.
const WIND_NONLINEARITY: f32 = 3.0;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstrumentKind {
    /// Plucked strings on a shared bridge.
    #[default]
    String,
    /// Bowed strings on a shared bridge.
    Bowed,
    /// A bore closed by its own nonlinear termination.
    Wind,
    /// Struck bodies.
    Modal(ModalType),
}

impl InstrumentKind {
    pub fn default_gesture(self) -> Gesture {
        match self {
            InstrumentKind::Bowed | InstrumentKind::Wind => Gesture::Bow,
            InstrumentKind::String | InstrumentKind::Modal(_) => Gesture::Pluck,
        }
    }

    pub fn is_modal(self) -> bool {
        matches!(self, InstrumentKind::Modal(_))
    }
}

/// The element a voice drives.
enum Resonator {
    Waveguide(WaveguideLine),
    Modal(ModalBank),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    Free,      // Available for allocation
    Active,    // Excitation playing or element still ringing
    Releasing, // Note released, tail playing out
}

/// One slot of the pool: an articulation driving one element.
pub struct Voice {
    slot: usize,
    note: u8,
    velocity: f32,
    pressure: f32,
    active: bool,
    age: u64,
    kind: InstrumentKind,
    articulation: Articulation,
    resonator: Resonator,
    termination: BridgeCoupling,
    scale: ScaleParams,
    base_frequency: f32,
    pitch_bend: f32,
    applied_state: ArticulationState,
    pan: (f32, f32),
    tables: Arc<LookupTables>,
}

impl Voice {
    pub fn new(
        slot: usize,
        kind: InstrumentKind,
        sample_rate: f32,
        seed: u32,
        tables: Arc<LookupTables>,
    ) -> Self {
        let resonator = match kind {
            InstrumentKind::Modal(modal) => {
                let mut bank = ModalBank::new(sample_rate, Arc::clone(&tables));
                bank.set_parameters(modal, 1.0, MAX_MODES);
                Resonator::Modal(bank)
            }
            _ => Resonator::Waveguide(WaveguideLine::new(sample_rate)),
        };
        Self {
            slot,
            note: 0,
            velocity: 0.0,
            pressure: 0.0,
            active: false,
            age: 0,
            kind,
            articulation: Articulation::new(sample_rate, seed, Arc::clone(&tables)),
            resonator,
            termination: BridgeCoupling::new(0.1, WIND_NONLINEARITY),
            scale: ScaleParams::default(),
            base_frequency: 220.0,
            pitch_bend: 0.0,
            applied_state: ArticulationState::Idle,
            pan: (std::f32::consts::FRAC_1_SQRT_2, std::f32::consts::FRAC_1_SQRT_2),
            tables,
        }
    }

    /// Start, or restart in place, a note. `age` is the activation stamp used
    /// for stealing.
    ///
    /// A free slot starts from cleared elements; an active one keeps ringing
    /// into the new note.
    pub fn trigger(
        &mut self,
        note: u8,
        velocity: f32,
        gesture: GestureParams,
        scale: &ScaleParams,
        age: u64,
    ) {
        if !self.active {
            self.reset();
        }
        let note = note.min(127);
        self.note = note;
        self.velocity = velocity.clamp(0.0, 1.0);
        self.pressure = if gesture.gesture == Gesture::Bow {
            gesture.force
        } else {
            0.0
        };
        self.active = true;
        self.age = age;
        self.scale = *scale;
        self.base_frequency = self.tables.midi_to_freq(note as f32);

        // Low notes lean left, high notes right, never hard-panned.
        let pan = 0.2 + 0.6 * ((note as f32 - 36.0) / 60.0).clamp(0.0, 1.0);
        self.pan = (self.tables.cos(pan * 0.25), self.tables.sin(pan * 0.25));

        let frequency = self.frequency();
        match &mut self.resonator {
            Resonator::Waveguide(line) => {
                line.configure(
                    frequency,
                    scale.damping,
                    scale.stiffness,
                    scale.bridge_coupling,
                    scale.size,
                );
                line.set_release_damping(0.0);
            }
            Resonator::Modal(bank) => {
                bank.set_parameters(bank.kind(), scale.size, MAX_MODES);
                bank.set_fundamental(frequency);
                bank.set_shimmer(scale.shimmer);
                bank.set_release_damping(0.0);
                if gesture.gesture != Gesture::Bow {
                    bank.strike(
                        gesture.force * self.velocity,
                        scale.brightness,
                        scale.strike_position,
                    );
                }
            }
        }

        self.articulation.trigger(gesture, self.velocity, frequency);
        self.applied_state = self.articulation.state();
    }

    /// Note-off: the articulation decides between damping and ringing out.
    pub fn release(&mut self) {
        if self.active {
            self.articulation.release(self.kind.is_modal());
        }
    }

    pub fn damp(&mut self) {
        if self.active {
            self.articulation.damp();
        }
    }

    pub fn set_bow_pressure(&mut self, pressure: f32) {
        self.pressure = pressure.clamp(0.0, 1.0);
        self.articulation.set_bow_pressure(self.pressure);
    }

    fn frequency(&self) -> f32 {
        self.base_frequency * self.tables.semitones_to_ratio(self.pitch_bend)
    }

    /// Control-rate update of the body settings and pitch bend.
    pub fn apply_params(&mut self, scale: &ScaleParams, pitch_bend: f32) {
        let retune = pitch_bend != self.pitch_bend;
        self.pitch_bend = pitch_bend;
        if !self.active {
            return;
        }
        let frequency = self.frequency();

        match &mut self.resonator {
            Resonator::Waveguide(line) => {
                if *scale != self.scale || retune {
                    line.configure(
                        frequency,
                        scale.damping,
                        scale.stiffness,
                        scale.bridge_coupling,
                        scale.size,
                    );
                }
            }
            Resonator::Modal(bank) => {
                if scale.size != self.scale.size {
                    bank.set_parameters(bank.kind(), scale.size, MAX_MODES);
                    bank.set_fundamental(frequency);
                } else if retune {
                    bank.set_fundamental(frequency);
                }
                bank.set_shimmer(scale.shimmer);
            }
        }
        self.scale = *scale;
    }

    /// Render one sample. String and bowed voices reflect through their port
    /// on the shared bridge; the others only push energy into it.
    #[inline]
    pub fn process_sample(&mut self, bridge: &mut SharedBridge) -> f32 {
        if !self.active {
            return 0.0;
        }

        let energy = self.energy();
        let excitation = self.articulation.next_sample(energy);

        let state = self.articulation.state();
        if state != self.applied_state {
            self.apply_release_damping(state);
        }

        let out = match &mut self.resonator {
            Resonator::Waveguide(line) => {
                if excitation != 0.0 {
                    line.excite(&[excitation], 1.0);
                }
                match self.kind {
                    InstrumentKind::Wind => {
                        let y = line.process_sample_with(&mut self.termination);
                        bridge.add_string_energy(y, self.slot);
                        y
                    }
                    _ => line.process_sample_with(&mut bridge.port(self.slot)),
                }
            }
            Resonator::Modal(bank) => {
                bank.excite(excitation);
                let y = bank.process_sample();
                bridge.add_string_energy(y, self.slot);
                y
            }
        };

        if self.articulation.take_timed_out() {
            self.reset_elements();
        }

        soft_clip(out)
    }

    fn apply_release_damping(&mut self, state: ArticulationState) {
        let amount = if state == ArticulationState::ReleaseDamp {
            1.0
        } else {
            0.0
        };
        match &mut self.resonator {
            Resonator::Waveguide(line) => line.set_release_damping(amount),
            Resonator::Modal(bank) => bank.set_release_damping(amount),
        }
        self.applied_state = state;
    }

    pub fn energy(&self) -> f32 {
        match &self.resonator {
            Resonator::Waveguide(line) => line.energy(),
            Resonator::Modal(bank) => bank.total_energy(),
        }
    }

    /// Idle and silent: the pool may reclaim this slot.
    pub fn is_finished(&self) -> bool {
        self.active && self.articulation.is_idle() && self.energy() < SILENCE_THRESHOLD
    }

    fn reset_elements(&mut self) {
        match &mut self.resonator {
            Resonator::Waveguide(line) => line.reset(),
            Resonator::Modal(bank) => bank.reset(),
        }
        self.termination.reset();
    }

    /// Clear everything that could sound. Buffers are zeroed, not reallocated.
    pub fn reset(&mut self) {
        self.reset_elements();
        self.articulation.reset();
        self.applied_state = ArticulationState::Idle;
        self.active = false;
        self.pressure = 0.0;
    }

    pub fn free(&mut self) {
        self.active = false;
    }

    pub fn state(&self) -> VoiceState {
        if !self.active {
            VoiceState::Free
        } else if self.articulation.state().is_release() || self.articulation.is_idle() {
            VoiceState::Releasing
        } else {
            VoiceState::Active
        }
    }

    pub fn articulation_state(&self) -> ArticulationState {
        self.articulation.state()
    }

    pub fn is_free(&self) -> bool {
        !self.active
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn note(&self) -> u8 {
        self.note
    }

    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    pub fn pressure(&self) -> f32 {
        self.pressure
    }

    pub fn age(&self) -> u64 {
        self.age
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Equal-power `(left, right)` gains for this note.
    pub fn pan_gains(&self) -> (f32, f32) {
        self.pan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::articulation::Gesture;

    const SAMPLE_RATE: f32 = 48_000.0;

    fn voice(kind: InstrumentKind) -> (Voice, SharedBridge) {
        let tables = LookupTables::shared();
        (
            Voice::new(0, kind, SAMPLE_RATE, 42, tables),
            SharedBridge::new(1, 4.0, SAMPLE_RATE),
        )
    }

    fn render(v: &mut Voice, bridge: &mut SharedBridge, n: usize) -> Vec<f32> {
        (0..n)
            .map(|_| {
                let y = v.process_sample(bridge);
                bridge.tick();
                y
            })
            .collect()
    }

    #[test]
    fn plucked_string_sounds_and_stays_bounded() {
        let (mut v, mut bridge) = voice(InstrumentKind::String);
        v.trigger(60, 0.8, GestureParams::default(), &ScaleParams::default(), 1);
        let out = render(&mut v, &mut bridge, 4_800);
        let peak = out.iter().fold(0.0f32, |a, x| a.max(x.abs()));
        assert!(peak > 0.01 && peak <= 1.0, "peak {peak}");
        assert_eq!(v.state(), VoiceState::Active);
    }

    #[test]
    fn every_kind_produces_sound() {
        for kind in [
            InstrumentKind::String,
            InstrumentKind::Bowed,
            InstrumentKind::Wind,
            InstrumentKind::Modal(ModalType::Bell),
        ] {
            let (mut v, mut bridge) = voice(kind);
            let gesture = GestureParams::default().with_gesture(kind.default_gesture());
            v.trigger(57, 1.0, gesture, &ScaleParams::default(), 1);
            let out = render(&mut v, &mut bridge, 9_600);
            assert!(out.iter().any(|x| x.abs() > 1.0e-3), "{kind:?}");
            assert!(out.iter().all(|x| x.is_finite() && x.abs() <= 1.0));
        }
    }

    #[test]
    fn damped_voice_finishes() {
        let (mut v, mut bridge) = voice(InstrumentKind::String);
        v.trigger(64, 1.0, GestureParams::default(), &ScaleParams::default(), 1);
        render(&mut v, &mut bridge, 1_000);
        v.damp();
        assert_eq!(v.state(), VoiceState::Releasing);
        render(&mut v, &mut bridge, 48_000);
        assert!(v.is_finished());
    }

    #[test]
    fn modal_release_rings_out() {
        let (mut v, mut bridge) = voice(InstrumentKind::Modal(ModalType::Gong));
        v.trigger(48, 1.0, GestureParams::default(), &ScaleParams::default(), 1);
        render(&mut v, &mut bridge, 100);
        v.release();
        assert_eq!(v.articulation_state(), ArticulationState::ReleaseGhost);
        render(&mut v, &mut bridge, 4_800);
        assert!(v.energy() > SILENCE_THRESHOLD);
    }

    #[test]
    fn bow_pressure_to_zero_releases() {
        let (mut v, mut bridge) = voice(InstrumentKind::Bowed);
        let bow = GestureParams::default().with_gesture(Gesture::Bow);
        v.trigger(55, 1.0, bow, &ScaleParams::default(), 1);
        render(&mut v, &mut bridge, 2_000);
        v.set_bow_pressure(0.0);
        render(&mut v, &mut bridge, 1);
        assert_eq!(v.articulation_state(), ArticulationState::ReleaseGhost);
    }

    #[test]
    fn reset_silences_immediately() {
        let (mut v, mut bridge) = voice(InstrumentKind::String);
        v.trigger(60, 1.0, GestureParams::default(), &ScaleParams::default(), 1);
        render(&mut v, &mut bridge, 500);
        v.reset();
        assert!(v.is_free());
        assert_eq!(v.energy(), 0.0);
        assert_eq!(v.process_sample(&mut bridge), 0.0);
    }

    #[test]
    fn reused_slot_starts_silent() {
        let (mut v, mut bridge) = voice(InstrumentKind::String);
        v.trigger(40, 1.0, GestureParams::default(), &ScaleParams::default(), 1);
        render(&mut v, &mut bridge, 2_000);
        v.free();
        assert!(v.energy() > 0.0);

        v.trigger(80, 1.0, GestureParams::default(), &ScaleParams::default(), 2);
        assert_eq!(v.energy(), 0.0);
    }

    #[test]
    fn retrigger_in_place_keeps_ringing() {
        let (mut v, mut bridge) = voice(InstrumentKind::String);
        v.trigger(40, 1.0, GestureParams::default(), &ScaleParams::default(), 1);
        render(&mut v, &mut bridge, 2_000);
        v.trigger(40, 1.0, GestureParams::default(), &ScaleParams::default(), 2);
        assert!(v.energy() > 0.0);
    }

    #[test]
    fn pan_is_equal_power() {
        let (mut v, _) = voice(InstrumentKind::String);
        for note in [0u8, 40, 60, 90, 127] {
            v.trigger(note, 1.0, GestureParams::default(), &ScaleParams::default(), 1);
            let (l, r) = v.pan_gains();
            assert!((l * l + r * r - 1.0).abs() < 1e-4);
            assert!(l > 0.0 && r > 0.0);
        }
    }
}
