use std::sync::Arc;

use crate::dsp::{soft_clip, LookupTables};
use crate::model::coupling::{SharedBridge, SympatheticBank};
use crate::synth::articulation::{Gesture, GestureParams};
use crate::synth::message::{MessageReceiver, SynthMessage};
use crate::synth::params::{ParamId, ParamSet, ScaleParams};
use crate::synth::voice::{InstrumentKind, Voice};

pub const MIN_POLYPHONY: usize = 6;
pub const MAX_POLYPHONY: usize = 24;

const BRIDGE_MASS: f32 = 4.0;
const CENTRE_GAIN: f32 = std::f32::consts::FRAC_1_SQRT_2;

/// Fixed pool of voices sharing one bridge.
///
/// Slots are allocated lowest-index-first; when every slot is busy the voice
/// with the oldest activation stamp is stolen. Stamps come from a counter
/// that advances on every note-on, so no two voices ever share one.
pub struct VoiceManager {
    voices: Vec<Voice>,
    note_map: [Option<usize>; 128],
    next_stamp: u64,
    bridge: SharedBridge,
    sympathetic: Option<SympatheticBank>,
    normalization: f32,
    kind: InstrumentKind,
    scale: ScaleParams,
    gesture: GestureParams,
    bow: GestureParams,
    pitch_bend: f32,
}

impl VoiceManager {
    pub fn new(
        sample_rate: f32,
        polyphony: usize,
        kind: InstrumentKind,
        sympathetic: Option<SympatheticBank>,
        seed: u32,
        tables: Arc<LookupTables>,
    ) -> Self {
        let capacity = polyphony.clamp(MIN_POLYPHONY, MAX_POLYPHONY);
        if capacity != polyphony {
            log::warn!("polyphony {polyphony} clamped to {capacity}");
        }

        let voices = (0..capacity)
            .map(|slot| {
                let voice_seed = seed.wrapping_add((slot as u32).wrapping_mul(0x9E37_79B9));
                Voice::new(slot, kind, sample_rate, voice_seed, Arc::clone(&tables))
            })
            .collect();

        // Every voice plus the sympathetic bank at unit amplitude sums to 1.
        let sources = capacity + usize::from(sympathetic.is_some());

        log::debug!("voice pool: {capacity} x {kind:?}, sympathetic={}", sympathetic.is_some());

        Self {
            voices,
            note_map: [None; 128],
            next_stamp: 0,
            bridge: SharedBridge::new(capacity, BRIDGE_MASS, sample_rate),
            sympathetic,
            normalization: 1.0 / sources as f32,
            kind,
            scale: ScaleParams::default(),
            gesture: GestureParams::default(),
            bow: GestureParams::default().with_gesture(Gesture::Bow),
            pitch_bend: 0.0,
        }
    }

    pub fn handle_note_on(
        &mut self,
        note: u8,
        velocity: f32,
        gesture: GestureParams,
        scale: &ScaleParams,
    ) -> usize {
        let note = note.min(127);
        self.next_stamp += 1;
        let stamp = self.next_stamp;

        if let Some(idx) = self.note_map[note as usize] {
            if self.voices[idx].is_active() && self.voices[idx].note() == note {
                self.voices[idx].trigger(note, velocity, gesture, scale, stamp);
                return idx;
            }
        }

        let idx = match self.voices.iter().position(Voice::is_free) {
            Some(free) => free,
            None => self.steal(),
        };
        self.voices[idx].trigger(note, velocity, gesture, scale, stamp);
        self.note_map[note as usize] = Some(idx);
        idx
    }

    /// Least recently triggered voice, silenced and unmapped. Ties go to the
    /// lowest slot.
    fn steal(&mut self) -> usize {
        let idx = self
            .voices
            .iter()
            .enumerate()
            .min_by_key(|(slot, voice)| (voice.age(), *slot))
            .map(|(slot, _)| slot)
            .unwrap_or(0);

        let old_note = self.voices[idx].note() as usize;
        if self.note_map[old_note] == Some(idx) {
            self.note_map[old_note] = None;
        }
        self.voices[idx].reset();
        idx
    }

    /// Release the note's voice. Unknown or already-finished notes are ignored.
    pub fn handle_note_off(&mut self, note: u8) {
        if let Some(voice) = self.mapped_voice(note) {
            voice.release();
        }
    }

    pub fn damp_note(&mut self, note: u8) {
        if let Some(voice) = self.mapped_voice(note) {
            voice.damp();
        }
    }

    pub fn set_bow_pressure(&mut self, note: u8, pressure: f32) {
        if let Some(voice) = self.mapped_voice(note) {
            voice.set_bow_pressure(pressure);
        }
    }

    pub fn all_notes_off(&mut self) {
        for voice in self.voices.iter_mut().filter(|v| v.is_active()) {
            voice.damp();
        }
    }

    fn mapped_voice(&mut self, note: u8) -> Option<&mut Voice> {
        let idx = self.note_map.get(note as usize).copied().flatten()?;
        let voice = &mut self.voices[idx];
        (voice.is_active() && voice.note() == note).then_some(voice)
    }

    /// Apply one queued event using the pool's current gesture and body settings.
    pub fn handle_message(&mut self, msg: SynthMessage) {
        match msg {
            SynthMessage::NoteOn {
                note,
                velocity,
                gesture,
                ..
            } => {
                let params = self.gesture_for(gesture);
                let scale = self.scale;
                self.handle_note_on(note, velocity, params, &scale);
            }
            SynthMessage::NoteOff { note, .. } => self.handle_note_off(note),
            SynthMessage::BowPressure { note, pressure } => self.set_bow_pressure(note, pressure),
            SynthMessage::Damp { note } => self.damp_note(note),
            SynthMessage::AllNotesOff => self.all_notes_off(),
        }
    }

    /// Apply every pending event, in arrival order.
    pub fn drain_messages<R: MessageReceiver + ?Sized>(&mut self, rx: &mut R) {
        while let Some(msg) = rx.pop() {
            self.handle_message(msg);
        }
    }

    fn gesture_for(&self, gesture: Gesture) -> GestureParams {
        match gesture {
            Gesture::Bow => self.bow,
            other => self.gesture.with_gesture(other),
        }
    }

    /// Control-rate update from the smoothed parameter set. Gesture settings
    /// are captured here and used by later queued note-ons.
    pub fn apply_params(&mut self, params: &ParamSet) {
        let scale = params.scale_params();
        let pitch_bend = params.get(ParamId::PitchBend);

        self.scale = scale;
        self.gesture = params.gesture_params(Gesture::Pluck);
        self.bow = params.gesture_params(Gesture::Bow);
        self.pitch_bend = pitch_bend;
        self.bridge.set_coupling(scale.bridge_coupling);
        if let Some(bank) = &mut self.sympathetic {
            bank.set_level(params.get(ParamId::SympatheticLevel));
        }
        for voice in &mut self.voices {
            voice.apply_params(&scale, pitch_bend);
        }
    }

    /// One stereo frame.
    #[inline]
    pub fn next_frame(&mut self) -> (f32, f32) {
        let mut left = 0.0;
        let mut right = 0.0;

        for voice in self.voices.iter_mut().filter(|v| v.is_active()) {
            let y = voice.process_sample(&mut self.bridge);
            let (gl, gr) = voice.pan_gains();
            left += y * gl;
            right += y * gr;
        }

        self.bridge.tick();

        if let Some(bank) = &mut self.sympathetic {
            bank.excite_from_bridge(self.bridge.bridge_motion());
            let y = soft_clip(bank.process_sample());
            left += y * CENTRE_GAIN;
            right += y * CENTRE_GAIN;
        }

        for (idx, voice) in self.voices.iter_mut().enumerate() {
            if voice.is_finished() {
                voice.free();
                let note = voice.note() as usize;
                if self.note_map[note] == Some(idx) {
                    self.note_map[note] = None;
                }
            }
        }

        (left * self.normalization, right * self.normalization)
    }

    /// Mono render; each sample is the mean of the stereo pair.
    pub fn process_block(&mut self, out: &mut [f32]) {
        for sample in out.iter_mut() {
            let (l, r) = self.next_frame();
            *sample = 0.5 * (l + r);
        }
    }

    pub fn process_block_stereo(&mut self, left: &mut [f32], right: &mut [f32]) {
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            (*l, *r) = self.next_frame();
        }
    }

    pub fn active_voice_count(&self) -> usize {
        self.voices.iter().filter(|v| v.is_active()).count()
    }

    pub fn capacity(&self) -> usize {
        self.voices.len()
    }

    pub fn normalization(&self) -> f32 {
        self.normalization
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    pub fn voice_for_note(&self, note: u8) -> Option<usize> {
        self.note_map.get(note as usize).copied().flatten()
    }

    pub fn kind(&self) -> InstrumentKind {
        self.kind
    }

    pub fn pitch_bend(&self) -> f32 {
        self.pitch_bend
    }

    pub fn bridge_motion(&self) -> f32 {
        self.bridge.bridge_motion()
    }

    pub fn sympathetic_energy(&self) -> f32 {
        self.sympathetic.as_ref().map_or(0.0, SympatheticBank::energy)
    }

    pub fn reset(&mut self) {
        for voice in &mut self.voices {
            voice.reset();
        }
        self.note_map = [None; 128];
        self.bridge.reset();
        if let Some(bank) = &mut self.sympathetic {
            bank.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::coupling::SympatheticTuning;
    use crate::model::ModalType;

    const SAMPLE_RATE: f32 = 48_000.0;

    fn pool(polyphony: usize) -> VoiceManager {
        pool_of(InstrumentKind::String, polyphony)
    }

    fn pool_of(kind: InstrumentKind, polyphony: usize) -> VoiceManager {
        VoiceManager::new(SAMPLE_RATE, polyphony, kind, None, 1, LookupTables::shared())
    }

    fn note_on(pool: &mut VoiceManager, note: u8) -> usize {
        pool.handle_note_on(note, 0.8, GestureParams::default(), &ScaleParams::default())
    }

    #[test]
    fn polyphony_is_clamped_to_pool_limits() {
        assert_eq!(pool(1).capacity(), MIN_POLYPHONY);
        assert_eq!(pool(100).capacity(), MAX_POLYPHONY);
        assert_eq!(pool(12).capacity(), 12);
    }

    #[test]
    fn allocates_lowest_free_slot() {
        let mut p = pool(6);
        assert_eq!(note_on(&mut p, 60), 0);
        assert_eq!(note_on(&mut p, 62), 1);
        assert_eq!(note_on(&mut p, 64), 2);
    }

    #[test]
    fn retrigger_reuses_the_same_slot() {
        let mut p = pool(6);
        let first = note_on(&mut p, 60);
        note_on(&mut p, 64);
        let again = note_on(&mut p, 60);
        assert_eq!(first, again);
        assert_eq!(p.active_voice_count(), 2);
    }

    #[test]
    fn steals_least_recently_triggered() {
        let mut p = pool(6);
        for note in 60..66 {
            note_on(&mut p, note);
        }
        // Retrigger the oldest so the second-oldest becomes the victim.
        note_on(&mut p, 60);
        let slot = note_on(&mut p, 80);
        assert_eq!(slot, 1);
        assert_eq!(p.voice_for_note(61), None);
        assert_eq!(p.voice_for_note(80), Some(1));
        assert_eq!(p.active_voice_count(), 6);
    }

    #[test]
    fn stolen_string_starts_from_silence() {
        let mut p = pool(6);
        for note in [40, 45, 50, 55, 59, 64] {
            p.handle_note_on(note, 1.0, GestureParams::default(), &ScaleParams::default());
        }
        let mut out = vec![0.0; 2_048];
        p.process_block(&mut out);
        assert!(p.voices()[0].energy() > 0.0);

        let slot = note_on(&mut p, 90);
        assert_eq!(slot, 0);
        assert_eq!(p.voices()[slot].energy(), 0.0);
    }

    #[test]
    fn stolen_modal_body_starts_from_silence() {
        let gong = InstrumentKind::Modal(ModalType::Gong);
        let mut p = pool_of(gong, 6);
        for note in [36, 40, 43, 48, 52, 55] {
            p.handle_note_on(note, 1.0, GestureParams::default(), &ScaleParams::default());
        }
        let mut out = vec![0.0; 2_048];
        p.process_block(&mut out);

        // Bowing does not strike, so nothing may be left in the modes.
        let bow = GestureParams::default().with_gesture(Gesture::Bow);
        let slot = p.handle_note_on(90, 0.8, bow, &ScaleParams::default());
        assert_eq!(p.voices()[slot].energy(), 0.0);

        // A struck steal carries exactly the energy of a strike on a fresh body.
        let slot = note_on(&mut p, 91);
        let mut fresh = pool_of(gong, 6);
        let fresh_slot = note_on(&mut fresh, 91);
        assert_eq!(
            p.voices()[slot].energy(),
            fresh.voices()[fresh_slot].energy()
        );
    }

    #[test]
    fn freed_slot_is_cleared_before_reuse() {
        let mut p = pool(6);
        note_on(&mut p, 40);
        let mut out = vec![0.0; 256];
        p.process_block(&mut out);
        p.handle_note_off(40);
        for _ in 0..1_000 {
            if p.active_voice_count() == 0 {
                break;
            }
            p.process_block(&mut out);
        }
        assert_eq!(p.active_voice_count(), 0);

        assert_eq!(note_on(&mut p, 80), 0);
        assert_eq!(p.voices()[0].energy(), 0.0);
    }

    #[test]
    fn full_pool_on_a_stiff_bridge_falls_silent() {
        let (mut bank, mut set) = crate::synth::params::param_pair(SAMPLE_RATE);
        bank.set_immediate(ParamId::BridgeCoupling, 0.5);
        set.tick();
        let scale = set.scale_params();

        let mut p = pool(MAX_POLYPHONY);
        p.apply_params(&set);
        for note in (40..).step_by(2).take(MAX_POLYPHONY) {
            p.handle_note_on(note, 1.0, GestureParams::default(), &scale);
        }
        assert_eq!(p.active_voice_count(), MAX_POLYPHONY);

        let mut out = vec![0.0; 4_800];
        for _ in 0..10 {
            p.process_block(&mut out);
        }
        p.all_notes_off();
        for _ in 0..10 {
            p.process_block(&mut out);
        }
        assert_eq!(p.active_voice_count(), 0, "bridge motion {}", p.bridge_motion());
        assert!(p.bridge_motion().abs() < 1.0e-3);
    }

    #[test]
    fn chord_in_one_block_steals_in_arrival_order() {
        let mut p = pool(6);
        for note in [60, 64, 67, 72, 76, 79] {
            note_on(&mut p, note);
        }
        // All six arrived in the same block; stamps still order them.
        assert_eq!(note_on(&mut p, 84), 0);
        assert_eq!(note_on(&mut p, 86), 1);
    }

    #[test]
    fn note_off_for_unknown_note_is_a_no_op() {
        let mut p = pool(6);
        p.handle_note_off(61);
        note_on(&mut p, 60);
        p.handle_note_off(61);
        assert_eq!(p.active_voice_count(), 1);
    }

    #[test]
    fn released_voices_are_eventually_freed() {
        let mut p = pool(6);
        note_on(&mut p, 60);
        note_on(&mut p, 67);
        let mut out = vec![0.0; 256];
        p.process_block(&mut out);
        p.handle_note_off(60);
        p.all_notes_off();
        for _ in 0..400 {
            p.process_block(&mut out);
        }
        assert_eq!(p.active_voice_count(), 0);
        assert_eq!(p.voice_for_note(60), None);
    }

    #[test]
    fn normalization_depends_only_on_capacity() {
        let plain = pool(8);
        let with_bank = VoiceManager::new(
            SAMPLE_RATE,
            8,
            InstrumentKind::String,
            Some(SympatheticBank::new(SAMPLE_RATE, SympatheticTuning::Harmonic, 65.4)),
            1,
            LookupTables::shared(),
        );
        assert_eq!(plain.normalization(), 1.0 / 8.0);
        assert_eq!(with_bank.normalization(), 1.0 / 9.0);
    }

    #[test]
    fn queued_bow_notes_start_from_bow_pressure() {
        let (mut bank, mut set) = crate::synth::params::param_pair(SAMPLE_RATE);
        bank.set_immediate(ParamId::BowPressure, 0.25);
        bank.set_immediate(ParamId::GestureForce, 0.9);
        set.tick();

        let mut p = pool(6);
        p.apply_params(&set);
        assert_eq!(p.gesture_for(Gesture::Bow).force, 0.25);
        assert_eq!(p.gesture_for(Gesture::Scrape).force, 0.9);
        assert_eq!(p.gesture_for(Gesture::Scrape).gesture, Gesture::Scrape);
    }

    #[test]
    fn queued_messages_drive_the_pool() {
        let mut p = pool(6);
        p.handle_message(SynthMessage::NoteOn {
            note: 60,
            velocity: 0.7,
            gesture: Gesture::Pluck,
            offset: 0,
        });
        p.handle_message(SynthMessage::NoteOn {
            note: 64,
            velocity: 0.7,
            gesture: Gesture::Bow,
            offset: 0,
        });
        assert_eq!(p.active_voice_count(), 2);
        p.handle_message(SynthMessage::NoteOff { note: 99, offset: 0 });
        assert_eq!(p.active_voice_count(), 2);
    }

    #[test]
    fn full_pool_cannot_clip() {
        let mut p = pool(6);
        for note in [40, 47, 52, 55, 59, 64] {
            p.handle_note_on(note, 1.0, GestureParams::default(), &ScaleParams::default());
        }
        let mut left = vec![0.0; 4096];
        let mut right = vec![0.0; 4096];
        p.process_block_stereo(&mut left, &mut right);
        assert!(left.iter().chain(&right).all(|x| x.abs() <= 1.0));
    }

    #[test]
    fn sympathetic_bank_rings_from_played_notes() {
        let mut p = VoiceManager::new(
            SAMPLE_RATE,
            6,
            InstrumentKind::String,
            Some(SympatheticBank::new(SAMPLE_RATE, SympatheticTuning::Harmonic, 110.0)),
            1,
            LookupTables::shared(),
        );
        note_on(&mut p, 57);
        let mut out = vec![0.0; 4800];
        p.process_block(&mut out);
        assert!(p.sympathetic_energy() > 0.0);

        p.reset();
        assert_eq!(p.active_voice_count(), 0);
        assert_eq!(p.sympathetic_energy(), 0.0);
    }
}
