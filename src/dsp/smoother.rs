//! Lock-free parameter smoothing between a control thread and the audio thread.

/*
Parameter Smoother
==================

A control change applied directly to an audio parameter produces an audible
step ("zipper noise"). The smoother keeps a TARGET written by the control
side and a CURRENT value that the audio side walks toward the target with a
one-pole ramp:

    current = target + (current - target) * coeff
    coeff   = e^(-1 / (tau * sample_rate))

The two sides never share mutable state except one 64-bit atomic cell:

    ┌─────────────── u64 ───────────────┐
    │  f32 target bits  │  snap counter │
    └───────────────────┴───────────────┘

  ParamHandle    The single writer. `set` stores a new target; `set_immediate`
                 stores the value AND bumps the snap counter.

  ParamSmoother  The single reader. Owns all ramp state. Each call loads the
                 cell once; a changed snap counter means "jump current to the
                 target", otherwise it ramps.

Because target and counter travel in one atomic word the reader can never see
half of a write, and neither side ever waits on the other. The split mirrors
the producer/consumer pair of a ring buffer: construct with
`smoothed_param`, move the handle to the control thread and the smoother into
the audio callback.
*/

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Ramp time constant for ordinary parameters, in seconds.
pub const SMOOTH_TIME: f32 = 0.050;
/// Ramp time constant for parameters that must track quickly, in seconds.
pub const FAST_TIME: f32 = 0.002;

const SNAP_EPSILON: f32 = 1.0e-6;

#[inline]
fn pack(value: f32, snaps: u32) -> u64 {
    ((value.to_bits() as u64) << 32) | snaps as u64
}

#[inline]
fn unpack(word: u64) -> (f32, u32) {
    (f32::from_bits((word >> 32) as u32), word as u32)
}

fn ramp_coefficient(time_constant: f32, sample_rate: f32) -> f32 {
    let samples = (time_constant * sample_rate).max(1.0);
    (-1.0 / samples).exp()
}

/// Create a connected writer/reader pair starting at `initial`.
pub fn smoothed_param(initial: f32, sample_rate: f32) -> (ParamHandle, ParamSmoother) {
    let cell = Arc::new(AtomicU64::new(pack(initial, 0)));
    let handle = ParamHandle {
        cell: Arc::clone(&cell),
        snaps: 0,
    };
    let smoother = ParamSmoother {
        cell,
        snaps: 0,
        target: initial,
        current: initial,
        fast: initial,
        coeff: ramp_coefficient(SMOOTH_TIME, sample_rate),
        fast_coeff: ramp_coefficient(FAST_TIME, sample_rate),
    };
    (handle, smoother)
}

/// Control-side writer. There is exactly one per parameter; it is `Send` but
/// not `Clone`.
pub struct ParamHandle {
    cell: Arc<AtomicU64>,
    snaps: u32,
}

impl ParamHandle {
    /// Store a new target. The audio side ramps toward it.
    pub fn set(&mut self, target: f32) {
        self.cell.store(pack(target, self.snaps), Ordering::Release);
    }

    /// Store a value that the audio side adopts without a ramp.
    ///
    /// Only for preset loads and re-initialization; live changes go through
    /// [`ParamHandle::set`].
    pub fn set_immediate(&mut self, value: f32) {
        self.snaps = self.snaps.wrapping_add(1);
        self.cell.store(pack(value, self.snaps), Ordering::Release);
    }

    /// Most recently written target.
    pub fn get(&self) -> f32 {
        unpack(self.cell.load(Ordering::Acquire)).0
    }
}

/// Audio-side reader. Owns the ramp state.
pub struct ParamSmoother {
    cell: Arc<AtomicU64>,
    snaps: u32,
    target: f32,
    current: f32,
    fast: f32,
    coeff: f32,
    fast_coeff: f32,
}

impl ParamSmoother {
    #[inline]
    fn sync(&mut self) {
        let (target, snaps) = unpack(self.cell.load(Ordering::Acquire));
        self.target = target;
        if snaps != self.snaps {
            self.snaps = snaps;
            self.current = target;
            self.fast = target;
        }
    }

    /// Advance the slow ramp by one sample and return it.
    ///
    /// Call exactly once per sample so the ramp rate stays sample-rate correct.
    #[inline]
    pub fn get_smoothed(&mut self) -> f32 {
        self.sync();
        self.current = Self::step(self.current, self.target, self.coeff);
        self.current
    }

    /// Advance the fast ramp by one sample and return it.
    #[inline]
    pub fn get_fast(&mut self) -> f32 {
        self.sync();
        self.fast = Self::step(self.fast, self.target, self.fast_coeff);
        self.fast
    }

    #[inline]
    fn step(current: f32, target: f32, coeff: f32) -> f32 {
        let next = target + (current - target) * coeff;
        if (next - target).abs() < SNAP_EPSILON {
            target
        } else {
            next
        }
    }

    /// Current slow-ramp value without advancing.
    #[inline]
    pub fn get(&self) -> f32 {
        self.current
    }

    /// Target as of the last advance.
    pub fn target(&self) -> f32 {
        self.target
    }

    pub fn is_settled(&self) -> bool {
        self.current == self.target
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.coeff = ramp_coefficient(SMOOTH_TIME, sample_rate);
        self.fast_coeff = ramp_coefficient(FAST_TIME, sample_rate);
    }
}
