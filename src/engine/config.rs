use crate::model::coupling::SympatheticTuning;
use crate::synth::poly::{MAX_POLYPHONY, MIN_POLYPHONY};
use crate::synth::voice::InstrumentKind;
use crate::MAX_BLOCK_SIZE;

const MIN_SAMPLE_RATE: f32 = 8_000.0;
const MAX_SAMPLE_RATE: f32 = 384_000.0;

/// Construction-time settings. Nothing here can change once the instrument
/// is built; live changes go through [`crate::synth::params::ParamBank`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstrumentConfig {
    pub sample_rate: f32,
    pub polyphony: usize,
    pub kind: InstrumentKind,
    /// Optional set of undamped strings driven by the bridge.
    pub sympathetic: Option<SympatheticTuning>,
    /// Lowest pitch of the sympathetic set.
    pub sympathetic_base_hz: f32,
    /// Seed for every noise source. Equal seeds give identical output.
    pub seed: u32,
    pub max_block_size: usize,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000.0,
            polyphony: 8,
            kind: InstrumentKind::String,
            sympathetic: None,
            sympathetic_base_hz: 65.41,
            seed: 0x5EED,
            max_block_size: 512,
        }
    }
}

impl InstrumentConfig {
    pub fn with_sample_rate(mut self, sample_rate: f32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_polyphony(mut self, polyphony: usize) -> Self {
        self.polyphony = polyphony;
        self
    }

    pub fn with_kind(mut self, kind: InstrumentKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_sympathetic(mut self, tuning: SympatheticTuning, base_hz: f32) -> Self {
        self.sympathetic = Some(tuning);
        self.sympathetic_base_hz = base_hz;
        self
    }

    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_max_block_size(mut self, frames: usize) -> Self {
        self.max_block_size = frames;
        self
    }

    /// Pull every field into its supported range, logging what moved.
    pub fn sanitized(mut self) -> Self {
        let rate = if self.sample_rate.is_finite() {
            self.sample_rate.clamp(MIN_SAMPLE_RATE, MAX_SAMPLE_RATE)
        } else {
            48_000.0
        };
        if rate != self.sample_rate {
            log::warn!("sample rate {} out of range, using {rate}", self.sample_rate);
            self.sample_rate = rate;
        }

        let voices = self.polyphony.clamp(MIN_POLYPHONY, MAX_POLYPHONY);
        if voices != self.polyphony {
            log::warn!("polyphony {} out of range, using {voices}", self.polyphony);
            self.polyphony = voices;
        }

        let block = self.max_block_size.clamp(1, MAX_BLOCK_SIZE);
        if block != self.max_block_size {
            log::warn!("block size {} out of range, using {block}", self.max_block_size);
            self.max_block_size = block;
        }

        let nyquist_safe = self.sample_rate / 8.0;
        if !(crate::MIN_FREQUENCY_HZ..=nyquist_safe).contains(&self.sympathetic_base_hz) {
            let base = self
                .sympathetic_base_hz
                .clamp(crate::MIN_FREQUENCY_HZ, nyquist_safe);
            let base = if base.is_finite() { base } else { 65.41 };
            log::warn!(
                "sympathetic base {} Hz out of range, using {base}",
                self.sympathetic_base_hz
            );
            self.sympathetic_base_hz = base;
        }

        self
    }
}
