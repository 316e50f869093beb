//! State passed from the audio callback to the UI
//!
//! Everything here is `Copy` and fixed-size so the callback never allocates.

use resona::synth::{ArticulationState, VoiceState};

/// Most voices a snapshot can describe.
pub const MAX_VIEW_VOICES: usize = 24;

#[derive(Clone, Copy, Debug)]
pub struct VoiceView {
    pub note: u8,
    pub state: VoiceState,
    pub articulation: ArticulationState,
    pub energy: f32,
}

impl Default for VoiceView {
    fn default() -> Self {
        Self {
            note: 0,
            state: VoiceState::Free,
            articulation: ArticulationState::Idle,
            energy: 0.0,
        }
    }
}

/// One snapshot per audio callback.
#[derive(Clone, Copy, Debug, Default)]
pub struct UiStateUpdate {
    pub voices: [VoiceView; MAX_VIEW_VOICES],
    pub voice_count: u8,
    pub active: u8,
    pub bridge_motion: f32,
}
