#[cfg(feature = "rtrb")]
use rtrb::Consumer;

use crate::synth::articulation::Gesture;

/// Events crossing from the control thread to the audio thread.
///
/// `offset` is the intended position inside the next block. Events are
/// applied at block start in arrival order; the offset is carried for hosts
/// that want it but does not move the event within the block.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum SynthMessage {
    NoteOn {
        note: u8,
        velocity: f32,
        gesture: Gesture,
        offset: u32,
    },
    NoteOff {
        note: u8,
        offset: u32,
    },
    BowPressure {
        note: u8,
        pressure: f32,
    },
    Damp {
        note: u8,
    },
    AllNotesOff,
}

pub trait MessageReceiver {
    fn pop(&mut self) -> Option<SynthMessage>;
}

#[cfg(feature = "rtrb")]
impl MessageReceiver for Consumer<SynthMessage> {
    fn pop(&mut self) -> Option<SynthMessage> {
        Consumer::pop(self).ok()
    }
}
