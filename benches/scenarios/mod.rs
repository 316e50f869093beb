//! Full-instrument benchmarks.
//!
//! These render through the same path an audio callback uses: event queue,
//! parameter smoothing, voice pool, bridge and sympathetic strings.

mod voices;

pub use voices::bench_voices;
