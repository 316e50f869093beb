//! Named parameters: the flat string namespace, the control-side bank and the
//! audio-side set of smoothers behind it.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::dsp::{smoothed_param, ParamHandle, ParamSmoother};
use crate::synth::articulation::{Gesture, GestureParams};

#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(rename_all = "snake_case")
)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamId {
    ScaleSize,
    Damping,
    Stiffness,
    BridgeCoupling,
    Brightness,
    StrikePosition,
    GestureForce,
    GestureSpeed,
    ContactArea,
    Roughness,
    BowPressure,
    Shimmer,
    SympatheticLevel,
    PitchBend,
    MasterGain,
}

impl ParamId {
    pub const COUNT: usize = 15;

    pub const ALL: [ParamId; ParamId::COUNT] = [
        ParamId::ScaleSize,
        ParamId::Damping,
        ParamId::Stiffness,
        ParamId::BridgeCoupling,
        ParamId::Brightness,
        ParamId::StrikePosition,
        ParamId::GestureForce,
        ParamId::GestureSpeed,
        ParamId::ContactArea,
        ParamId::Roughness,
        ParamId::BowPressure,
        ParamId::Shimmer,
        ParamId::SympatheticLevel,
        ParamId::PitchBend,
        ParamId::MasterGain,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            ParamId::ScaleSize => "scale_size",
            ParamId::Damping => "damping",
            ParamId::Stiffness => "stiffness",
            ParamId::BridgeCoupling => "bridge_coupling",
            ParamId::Brightness => "brightness",
            ParamId::StrikePosition => "strike_position",
            ParamId::GestureForce => "gesture_force",
            ParamId::GestureSpeed => "gesture_speed",
            ParamId::ContactArea => "contact_area",
            ParamId::Roughness => "roughness",
            ParamId::BowPressure => "bow_pressure",
            ParamId::Shimmer => "shimmer",
            ParamId::SympatheticLevel => "sympathetic_level",
            ParamId::PitchBend => "pitch_bend",
            ParamId::MasterGain => "master_gain",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.name() == name)
    }

    /// Valid `(min, max)`; anything outside is clamped.
    pub fn range(self) -> (f32, f32) {
        match self {
            ParamId::ScaleSize => (0.25, 4.0),
            ParamId::BridgeCoupling => (0.0, 0.5),
            ParamId::PitchBend => (-2.0, 2.0),
            _ => (0.0, 1.0),
        }
    }

    pub fn default_value(self) -> f32 {
        match self {
            ParamId::ScaleSize => 1.0,
            ParamId::Damping => 0.3,
            ParamId::Stiffness => 0.2,
            ParamId::BridgeCoupling => 0.1,
            ParamId::Brightness => 0.6,
            ParamId::StrikePosition => 0.3,
            ParamId::GestureForce => 0.8,
            ParamId::GestureSpeed => 0.5,
            ParamId::ContactArea => 0.5,
            ParamId::Roughness => 0.3,
            ParamId::BowPressure => 0.7,
            ParamId::Shimmer => 0.2,
            ParamId::SympatheticLevel => 0.5,
            ParamId::PitchBend => 0.0,
            ParamId::MasterGain => 0.8,
        }
    }

    pub fn clamp(self, value: f32) -> f32 {
        let (lo, hi) = self.range();
        if value.is_nan() {
            self.default_value()
        } else {
            value.clamp(lo, hi)
        }
    }
}

/// Every parameter's value, in `ParamId::ALL` order.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSnapshot {
    pub values: [f32; ParamId::COUNT],
}

impl ParamSnapshot {
    pub fn get(&self, id: ParamId) -> f32 {
        self.values[id.index()]
    }

    pub fn set(&mut self, id: ParamId, value: f32) {
        self.values[id.index()] = id.clamp(value);
    }
}

impl Default for ParamSnapshot {
    fn default() -> Self {
        Self {
            values: ParamId::ALL.map(ParamId::default_value),
        }
    }
}

/// Physical body settings applied to every voice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleParams {
    pub size: f32,
    pub damping: f32,
    pub stiffness: f32,
    pub bridge_coupling: f32,
    pub brightness: f32,
    pub strike_position: f32,
    pub shimmer: f32,
}

impl Default for ScaleParams {
    fn default() -> Self {
        Self::from_values(&ParamSnapshot::default().values)
    }
}

impl ScaleParams {
    fn from_values(v: &[f32; ParamId::COUNT]) -> Self {
        Self {
            size: v[ParamId::ScaleSize.index()],
            damping: v[ParamId::Damping.index()],
            stiffness: v[ParamId::Stiffness.index()],
            bridge_coupling: v[ParamId::BridgeCoupling.index()],
            brightness: v[ParamId::Brightness.index()],
            strike_position: v[ParamId::StrikePosition.index()],
            shimmer: v[ParamId::Shimmer.index()],
        }
    }
}

/// Build the control-side bank and the audio-side set for one instrument.
pub fn param_pair(sample_rate: f32) -> (ParamBank, ParamSet) {
    let (handles, smoothers) = ParamId::ALL
        .iter()
        .map(|id| smoothed_param(id.default_value(), sample_rate))
        .unzip();
    (
        ParamBank { handles },
        ParamSet {
            smoothers,
            values: ParamSnapshot::default().values,
        },
    )
}

/// Control-side writers for every parameter.
pub struct ParamBank {
    handles: Vec<ParamHandle>,
}

impl ParamBank {
    pub fn get(&self, id: ParamId) -> f32 {
        self.handles[id.index()].get()
    }

    /// Ramp toward `value`, clamped into range.
    pub fn set(&mut self, id: ParamId, value: f32) {
        self.handles[id.index()].set(id.clamp(value));
    }

    /// Jump to `value` without a ramp. For preset loads only.
    pub fn set_immediate(&mut self, id: ParamId, value: f32) {
        self.handles[id.index()].set_immediate(id.clamp(value));
    }

    /// Returns false, and changes nothing, for an unknown name.
    pub fn set_by_name(&mut self, name: &str, value: f32) -> bool {
        match ParamId::from_name(name) {
            Some(id) => {
                self.set(id, value);
                true
            }
            None => {
                log::debug!("ignoring unknown parameter '{name}'");
                false
            }
        }
    }

    pub fn get_by_name(&self, name: &str) -> Option<f32> {
        ParamId::from_name(name).map(|id| self.get(id))
    }

    pub fn snapshot(&self) -> ParamSnapshot {
        ParamSnapshot {
            values: ParamId::ALL.map(|id| self.get(id)),
        }
    }

    pub fn restore(&mut self, snapshot: &ParamSnapshot) {
        for id in ParamId::ALL {
            self.set_immediate(id, snapshot.get(id));
        }
    }
}

/// Audio-side smoothers. `tick` must run exactly once per sample.
pub struct ParamSet {
    smoothers: Vec<ParamSmoother>,
    values: [f32; ParamId::COUNT],
}

impl ParamSet {
    #[inline]
    pub fn tick(&mut self) {
        for (id, (smoother, value)) in ParamId::ALL
            .iter()
            .zip(self.smoothers.iter_mut().zip(self.values.iter_mut()))
        {
            *value = if *id == ParamId::PitchBend {
                smoother.get_fast()
            } else {
                smoother.get_smoothed()
            };
        }
    }

    #[inline]
    pub fn get(&self, id: ParamId) -> f32 {
        self.values[id.index()]
    }

    pub fn scale_params(&self) -> ScaleParams {
        ScaleParams::from_values(&self.values)
    }

    /// Gesture settings for a new note. A bow starts at the current bow
    /// pressure; every other gesture uses the gesture force.
    pub fn gesture_params(&self, gesture: Gesture) -> GestureParams {
        let force = match gesture {
            Gesture::Bow => self.get(ParamId::BowPressure),
            _ => self.get(ParamId::GestureForce),
        };
        GestureParams {
            gesture,
            force,
            speed: self.get(ParamId::GestureSpeed),
            contact_area: self.get(ParamId::ContactArea),
            roughness: self.get(ParamId::Roughness),
        }
    }
}
