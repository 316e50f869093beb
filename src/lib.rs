//! Realtime-safe physical-modeling synthesis core.
//!
//! Excitation events (pluck, bow, scrape, harmonic touch) drive waveguide
//! lines and modal resonator banks; a coupling network moves energy between
//! voices, a shared bridge and a sympathetic string set; a fixed voice pool
//! sums everything into the output block.

pub mod dsp; // Allocation-free primitives: tables, smoothing, delay, filters
pub mod model; // Vibrating elements and the coupling network
pub mod synth; // Articulation, voices and polyphony

#[cfg(feature = "rtrb")]
pub mod engine; // Controller/instrument pair over a lock-free event queue

#[cfg(feature = "rtrb")]
pub use engine::{Controller, Instrument, InstrumentConfig};

/// Largest block the instrument renders in one call.
pub const MAX_BLOCK_SIZE: usize = 2048;

/// Samples between control-rate updates (parameter application, bow noise
/// regeneration, state-machine bookkeeping).
pub const CONTROL_BLOCK: usize = 32;

/// Lowest pitch any element can be tuned to. Delay buffers are sized for it.
pub const MIN_FREQUENCY_HZ: f32 = 20.0;

/// Energy below which an element is considered silent.
pub const SILENCE_THRESHOLD: f32 = 1.0e-6;
