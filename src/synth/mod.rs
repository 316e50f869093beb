// Purpose: Articulation, voices and the polyphonic pool
// This layer sits above the vibrating elements and decides what excites them

pub mod articulation;
pub mod excitation;
pub mod message;
pub mod params;
pub mod poly;
pub mod voice;

pub use articulation::{Articulation, ArticulationState, Gesture, GestureParams};
pub use message::{MessageReceiver, SynthMessage};
pub use params::{param_pair, ParamBank, ParamId, ParamSet, ParamSnapshot, ScaleParams};
pub use poly::VoiceManager;
pub use voice::{InstrumentKind, Voice, VoiceState};
