//! Low-level DSP primitives used by the physical elements and voices.
//!
//! These components are allocation-free once constructed and realtime-safe,
//! making them safe to embed directly inside voice structs. They stay focused
//! on the signal-processing math; the model and synth layers add the physics
//! and orchestration.

/// Fractional delay line with a fixed, preallocated capacity.
pub mod delay;
/// One-pole, allpass and state-variable filters.
pub mod filter;
/// Deterministic per-voice noise stream.
pub mod noise;
/// Lock-free parameter smoothing between control and audio threads.
pub mod smoother;
/// Precomputed transcendental tables.
pub mod tables;

pub use smoother::{smoothed_param, ParamHandle, ParamSmoother};
pub use tables::LookupTables;

/// Bounded soft clipper.
///
/// Close to unity gain for small signals, monotonic, and never exceeds ±1.
#[inline]
pub fn soft_clip(x: f32) -> f32 {
    if x <= -3.0 {
        -1.0
    } else if x >= 3.0 {
        1.0
    } else {
        let x2 = x * x;
        x * (27.0 + x2) / (27.0 + 9.0 * x2)
    }
}

/// Decaying state below this magnitude is zeroed.
pub const DENORMAL_FLOOR: f32 = 1.0e-20;

/// Zero `x` once it has decayed below [`DENORMAL_FLOOR`], so recirculating
/// state never reaches the subnormal range.
#[inline]
pub fn flush_denormal(x: f32) -> f32 {
    if x.abs() < DENORMAL_FLOOR {
        0.0
    } else {
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn soft_clip_is_bounded_and_monotonic() {
        let mut prev = soft_clip(-10.0);
        for i in -1000..=1000 {
            let x = i as f32 * 0.01;
            let y = soft_clip(x);
            assert!(y.abs() <= 1.0, "soft_clip({x}) = {y}");
            assert!(y >= prev - 1e-6, "not monotonic at {x}");
            prev = y;
        }
    }

    #[test]
    fn soft_clip_is_transparent_for_small_signals() {
        assert!((soft_clip(0.05) - 0.05).abs() < 1e-3);
    }

    #[test]
    fn tiny_values_flush_to_zero() {
        assert_eq!(flush_denormal(1.0e-30), 0.0);
        assert_eq!(flush_denormal(-1.0e-25), 0.0);
        assert_eq!(flush_denormal(f32::MIN_POSITIVE * 0.5), 0.0);
        assert_eq!(flush_denormal(1.0e-6), 1.0e-6);
    }
}
