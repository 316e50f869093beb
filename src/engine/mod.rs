/*
Controller / Instrument
=======================

An instrument is split in two at construction:

  Controller   lives on the control thread (UI, MIDI, sequencer). Note events
               go into a bounded wait-free queue; parameter moves go into
               per-parameter atomic cells.
  Instrument   lives on the audio thread. `process_block` drains the queue,
               advances every parameter smoother once per sample, applies
               body settings every CONTROL_BLOCK samples and renders.

Nothing on the audio side allocates or locks. A full queue is reported to
the caller as a `PushError` and the event is dropped.
*/

mod config;

pub use config::InstrumentConfig;

use rtrb::{Consumer, Producer, PushError, RingBuffer};

use crate::dsp::LookupTables;
use crate::model::coupling::SympatheticBank;
use crate::synth::articulation::Gesture;
use crate::synth::message::SynthMessage;
use crate::synth::params::{param_pair, ParamBank, ParamId, ParamSet, ParamSnapshot};
use crate::synth::poly::VoiceManager;
use crate::CONTROL_BLOCK;

/// Events that fit in the queue between two audio callbacks.
pub const EVENT_QUEUE_CAPACITY: usize = 256;

/// Control-thread half of an instrument.
pub struct Controller {
    tx: Producer<SynthMessage>,
    params: ParamBank,
    default_gesture: Gesture,
}

impl Controller {
    /// Note-on with the instrument's natural gesture.
    pub fn note_on(&mut self, note: u8, velocity: f32) -> Result<(), PushError<SynthMessage>> {
        self.note_on_with(note, velocity, self.default_gesture)
    }

    pub fn note_on_with(
        &mut self,
        note: u8,
        velocity: f32,
        gesture: Gesture,
    ) -> Result<(), PushError<SynthMessage>> {
        self.tx.push(SynthMessage::NoteOn {
            note: note.min(127),
            velocity: velocity.clamp(0.0, 1.0),
            gesture,
            offset: 0,
        })
    }

    pub fn note_off(&mut self, note: u8) -> Result<(), PushError<SynthMessage>> {
        self.tx.push(SynthMessage::NoteOff { note, offset: 0 })
    }

    pub fn bow_pressure(&mut self, note: u8, pressure: f32) -> Result<(), PushError<SynthMessage>> {
        self.tx.push(SynthMessage::BowPressure {
            note,
            pressure: pressure.clamp(0.0, 1.0),
        })
    }

    pub fn damp(&mut self, note: u8) -> Result<(), PushError<SynthMessage>> {
        self.tx.push(SynthMessage::Damp { note })
    }

    pub fn all_notes_off(&mut self) -> Result<(), PushError<SynthMessage>> {
        self.tx.push(SynthMessage::AllNotesOff)
    }

    /// Set a parameter by its registry name. Returns false for unknown names.
    pub fn set_param(&mut self, name: &str, value: f32) -> bool {
        self.params.set_by_name(name, value)
    }

    pub fn param(&self, id: ParamId) -> f32 {
        self.params.get(id)
    }

    pub fn params(&mut self) -> &mut ParamBank {
        &mut self.params
    }

    pub fn snapshot(&self) -> ParamSnapshot {
        self.params.snapshot()
    }

    /// Load a preset. Values jump without a ramp.
    pub fn restore(&mut self, snapshot: &ParamSnapshot) {
        self.params.restore(snapshot);
    }

    /// Free slots left in the event queue.
    pub fn queue_space(&self) -> usize {
        self.tx.slots()
    }
}

/// Audio-thread half of an instrument.
pub struct Instrument {
    rx: Consumer<SynthMessage>,
    params: ParamSet,
    voices: VoiceManager,
    left: Vec<f32>,
    right: Vec<f32>,
    control_countdown: usize,
    config: InstrumentConfig,
}

impl Instrument {
    /// Allocate everything the instrument will ever need and hand back both
    /// halves.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(config: InstrumentConfig) -> (Controller, Instrument) {
        let config = config.sanitized();
        let tables = LookupTables::shared();

        let (tx, rx) = RingBuffer::new(EVENT_QUEUE_CAPACITY);
        let (bank, params) = param_pair(config.sample_rate);

        let sympathetic = config.sympathetic.map(|tuning| {
            SympatheticBank::new(config.sample_rate, tuning, config.sympathetic_base_hz)
        });
        let mut voices = VoiceManager::new(
            config.sample_rate,
            config.polyphony,
            config.kind,
            sympathetic,
            config.seed,
            tables,
        );
        voices.apply_params(&params);

        log::info!(
            "instrument ready: {:?}, {} voices at {} Hz",
            config.kind,
            voices.capacity(),
            config.sample_rate
        );

        let controller = Controller {
            tx,
            params: bank,
            default_gesture: config.kind.default_gesture(),
        };
        let instrument = Instrument {
            rx,
            params,
            voices,
            left: vec![0.0; config.max_block_size],
            right: vec![0.0; config.max_block_size],
            control_countdown: 0,
            config,
        };
        (controller, instrument)
    }

    /// Render into one buffer per channel.
    ///
    /// One channel gets the mono mix; two or more get left and right with
    /// the mono mix copied to every further channel. Blocks longer than the
    /// configured maximum are rendered in pieces.
    pub fn process_block(&mut self, outputs: &mut [&mut [f32]]) {
        let frames = outputs.iter().map(|ch| ch.len()).min().unwrap_or(0);

        self.voices.drain_messages(&mut self.rx);

        let mut done = 0;
        while done < frames {
            let n = (frames - done).min(self.left.len());
            self.render(n);

            let left = &self.left[..n];
            let right = &self.right[..n];
            match &mut *outputs {
                [] => {}
                [mono] => {
                    let mono = &mut mono[done..done + n];
                    for (out, (l, r)) in mono.iter_mut().zip(left.iter().zip(right)) {
                        *out = 0.5 * (l + r);
                    }
                }
                [out_l, out_r, rest @ ..] => {
                    out_l[done..done + n].copy_from_slice(left);
                    out_r[done..done + n].copy_from_slice(right);
                    for extra in rest.iter_mut() {
                        for (out, (l, r)) in
                            extra[done..done + n].iter_mut().zip(left.iter().zip(right))
                        {
                            *out = 0.5 * (l + r);
                        }
                    }
                }
            }
            done += n;
        }
    }

    /// Render into one interleaved buffer, as audio callbacks usually
    /// provide it.
    pub fn process_interleaved(&mut self, data: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        let frames = data.len() / channels;

        self.voices.drain_messages(&mut self.rx);

        let mut done = 0;
        while done < frames {
            let n = (frames - done).min(self.left.len());
            self.render(n);

            for (i, frame) in data[done * channels..(done + n) * channels]
                .chunks_exact_mut(channels)
                .enumerate()
            {
                let (l, r) = (self.left[i], self.right[i]);
                match frame {
                    [mono] => *mono = 0.5 * (l + r),
                    [out_l, out_r, rest @ ..] => {
                        *out_l = l;
                        *out_r = r;
                        rest.fill(0.5 * (l + r));
                    }
                    [] => {}
                }
            }
            done += n;
        }
    }

    fn render(&mut self, frames: usize) {
        for i in 0..frames {
            self.params.tick();

            if self.control_countdown == 0 {
                self.voices.apply_params(&self.params);
                self.control_countdown = CONTROL_BLOCK;
            }
            self.control_countdown -= 1;

            let gain = self.params.get(ParamId::MasterGain);
            let (l, r) = self.voices.next_frame();
            self.left[i] = l * gain;
            self.right[i] = r * gain;
        }
    }

    pub fn active_voice_count(&self) -> usize {
        self.voices.active_voice_count()
    }

    pub fn voices(&self) -> &VoiceManager {
        &self.voices
    }

    pub fn config(&self) -> &InstrumentConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> f32 {
        self.config.sample_rate
    }

    /// Silence every voice and the bridge. Queued events are kept.
    pub fn reset(&mut self) {
        self.voices.reset();
    }
}
