//! Per-voice articulation: which excitation is playing, and the crossfade
//! between successive ones.

/*
Articulation State Machine
==========================

            pluck / scrape / harmonic          bow
   Idle ───────────────┬───────────────  ───────────── AttackBowSustain
                       ▼                                   │
            Attack{Pluck,Scrape,Harmonic}                  │ pressure -> 0
                       │ ATTACK_SECONDS                    │ or release()
                       ▼                                   ▼
                     Decay ── DECAY_SECONDS ──────▶  ReleaseGhost ─┐
                       │                                           │ silent, or
                       │ release() / damp()                        │ MAX_RELEASE_SECONDS
                       ▼                                           ▼
                  ReleaseDamp ─────────────────────────────────▶  Idle

damp() moves any non-idle state to ReleaseDamp. A release-triggered
transition to Idle only happens once the element's energy is below
SILENCE_THRESHOLD and the last crossfade has finished, or unconditionally
after MAX_RELEASE_SECONDS. The timeout case is flagged so the voice can clear
whatever tail was left behind.

Crossfades. Every transition restarts `crossfade` at 0 and lets it climb to
1 over CROSSFADE_SECONDS. While it climbs, the generator that was playing
fades out and the new one fades in along an equal-power curve:

    previous gain = cos(p * pi / 2)
    current gain  = sin(p * pi / 2)

If the outgoing generator has already gone quiet (a finished pluck, or
nothing at all coming out of Idle) there is nothing to blend against, and the
new generator plays at full gain from its first sample. A ten-sample pluck
faded in over five milliseconds would otherwise never be heard.
*/

use std::sync::Arc;

use crate::dsp::LookupTables;
use crate::synth::excitation::{ExcitationKind, Exciters};
use crate::SILENCE_THRESHOLD;

pub const ATTACK_SECONDS: f32 = 0.050;
pub const DECAY_SECONDS: f32 = 4.0;
pub const MAX_RELEASE_SECONDS: f32 = 12.0;
pub const CROSSFADE_SECONDS: f32 = 0.005;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArticulationState {
    Idle,
    AttackPluck,
    AttackBowSustain,
    AttackScrape,
    AttackHarmonic,
    Decay,
    ReleaseDamp,
    ReleaseGhost,
}

impl ArticulationState {
    pub fn is_release(self) -> bool {
        matches!(
            self,
            ArticulationState::ReleaseDamp | ArticulationState::ReleaseGhost
        )
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Gesture {
    /// Pluck on strings, strike on modal bodies.
    #[default]
    Pluck,
    Bow,
    Scrape,
    Harmonic,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureParams {
    pub gesture: Gesture,
    pub force: f32,
    pub speed: f32,
    pub contact_area: f32,
    pub roughness: f32,
}

impl Default for GestureParams {
    fn default() -> Self {
        Self {
            gesture: Gesture::Pluck,
            force: 1.0,
            speed: 0.5,
            contact_area: 0.5,
            roughness: 0.3,
        }
    }
}

impl GestureParams {
    pub fn with_gesture(self, gesture: Gesture) -> Self {
        Self { gesture, ..self }
    }
}

/// Equal-power gains `(previous, current)` at progress `p`.
#[inline]
pub fn crossfade_gains(tables: &LookupTables, p: f32) -> (f32, f32) {
    let quarter = p.clamp(0.0, 1.0) * 0.25;
    (tables.cos(quarter), tables.sin(quarter))
}

pub struct Articulation {
    state: ArticulationState,
    previous_state: ArticulationState,
    current: ExcitationKind,
    previous: ExcitationKind,
    crossfade: f32,
    crossfade_step: f32,
    elapsed: u32,
    attack_samples: u32,
    decay_samples: u32,
    max_release_samples: u32,
    timed_out: bool,
    exciters: Exciters,
    sample_rate: f32,
    tables: Arc<LookupTables>,
}

impl Articulation {
    pub fn new(sample_rate: f32, seed: u32, tables: Arc<LookupTables>) -> Self {
        let seconds = |s: f32| (s * sample_rate) as u32;
        Self {
            state: ArticulationState::Idle,
            previous_state: ArticulationState::Idle,
            current: ExcitationKind::Silent,
            previous: ExcitationKind::Silent,
            crossfade: 1.0,
            crossfade_step: 1.0 / (CROSSFADE_SECONDS * sample_rate).max(1.0),
            elapsed: 0,
            attack_samples: seconds(ATTACK_SECONDS),
            decay_samples: seconds(DECAY_SECONDS),
            max_release_samples: seconds(MAX_RELEASE_SECONDS),
            timed_out: false,
            exciters: Exciters::new(sample_rate, seed),
            sample_rate,
            tables,
        }
    }

    fn enter(&mut self, state: ArticulationState, kind: ExcitationKind) {
        self.previous_state = self.state;
        self.state = state;
        // Only a generator that is still producing and is not about to be
        // restarted has anything to fade out.
        self.previous = if self.current != kind && self.exciters.is_sounding(self.current) {
            self.current
        } else {
            ExcitationKind::Silent
        };
        self.current = kind;
        self.crossfade = 0.0;
        self.elapsed = 0;
    }

    /// Start a new excitation. `velocity` scales the generator's force;
    /// `frequency` tunes the harmonic burst.
    pub fn trigger(&mut self, gesture: GestureParams, velocity: f32, frequency: f32) {
        let force = (gesture.force * velocity).clamp(0.0, 1.0);
        let (state, kind) = match gesture.gesture {
            Gesture::Pluck => {
                self.exciters.pluck.trigger(force);
                (ArticulationState::AttackPluck, ExcitationKind::Pluck)
            }
            Gesture::Bow => {
                self.exciters
                    .bow
                    .trigger(force, gesture.speed, gesture.contact_area);
                (ArticulationState::AttackBowSustain, ExcitationKind::Bow)
            }
            Gesture::Scrape => {
                self.exciters.scrape.trigger(force, gesture.roughness);
                (ArticulationState::AttackScrape, ExcitationKind::Scrape)
            }
            Gesture::Harmonic => {
                self.exciters
                    .harmonic
                    .trigger(force, frequency * 2.0, self.sample_rate);
                (ArticulationState::AttackHarmonic, ExcitationKind::Harmonic)
            }
        };
        self.timed_out = false;
        self.enter(state, kind);
    }

    /// Note-off. A bow lifts and lets the element ring; anything else is
    /// damped unless `ring_out` asks for the ghost release.
    pub fn release(&mut self, ring_out: bool) {
        match self.state {
            ArticulationState::Idle
            | ArticulationState::ReleaseDamp
            | ArticulationState::ReleaseGhost => {}
            ArticulationState::AttackBowSustain => {
                self.enter(ArticulationState::ReleaseGhost, ExcitationKind::Silent);
            }
            _ if ring_out => self.enter(ArticulationState::ReleaseGhost, ExcitationKind::Silent),
            _ => self.enter(ArticulationState::ReleaseDamp, ExcitationKind::Silent),
        }
    }

    /// Explicit mute, from any sounding state.
    pub fn damp(&mut self) {
        if matches!(
            self.state,
            ArticulationState::Idle | ArticulationState::ReleaseDamp
        ) {
            return;
        }
        self.enter(ArticulationState::ReleaseDamp, ExcitationKind::Silent);
    }

    pub fn set_bow_pressure(&mut self, pressure: f32) {
        if self.state == ArticulationState::AttackBowSustain {
            self.exciters.bow.set_pressure(pressure);
        }
    }

    /// One sample of crossfaded excitation. `element_energy` is the driven
    /// element's current energy, used to end release states.
    #[inline]
    pub fn next_sample(&mut self, element_energy: f32) -> f32 {
        let tables = &*self.tables;
        let current = self.exciters.next(self.current, tables);

        let out = if self.previous != ExcitationKind::Silent && self.crossfade < 1.0 {
            let outgoing = self.exciters.next(self.previous, tables);
            let (fade_out, fade_in) = crossfade_gains(tables, self.crossfade);
            outgoing * fade_out + current * fade_in
        } else {
            current
        };

        if self.crossfade < 1.0 {
            self.crossfade = (self.crossfade + self.crossfade_step).min(1.0);
            if self.crossfade >= 1.0 {
                self.previous = ExcitationKind::Silent;
            }
        }
        self.elapsed = self.elapsed.saturating_add(1);
        self.advance(element_energy);
        out
    }

    fn advance(&mut self, element_energy: f32) {
        match self.state {
            ArticulationState::Idle => {}
            ArticulationState::AttackPluck
            | ArticulationState::AttackScrape
            | ArticulationState::AttackHarmonic => {
                if self.elapsed >= self.attack_samples {
                    self.enter(ArticulationState::Decay, ExcitationKind::Silent);
                }
            }
            ArticulationState::AttackBowSustain => {
                if !self.exciters.bow.is_sounding() {
                    self.enter(ArticulationState::ReleaseGhost, ExcitationKind::Silent);
                }
            }
            ArticulationState::Decay => {
                if self.elapsed >= self.decay_samples {
                    self.enter(ArticulationState::ReleaseGhost, ExcitationKind::Silent);
                }
            }
            ArticulationState::ReleaseDamp | ArticulationState::ReleaseGhost => {
                if self.elapsed >= self.max_release_samples {
                    self.timed_out = true;
                    self.enter(ArticulationState::Idle, ExcitationKind::Silent);
                } else if self.crossfade >= 1.0 && element_energy < SILENCE_THRESHOLD {
                    self.enter(ArticulationState::Idle, ExcitationKind::Silent);
                }
            }
        }
    }

    /// True once, after a release was cut short by the safety timeout.
    pub fn take_timed_out(&mut self) -> bool {
        std::mem::take(&mut self.timed_out)
    }

    pub fn state(&self) -> ArticulationState {
        self.state
    }

    pub fn previous_state(&self) -> ArticulationState {
        self.previous_state
    }

    pub fn crossfade_progress(&self) -> f32 {
        self.crossfade
    }

    pub fn is_idle(&self) -> bool {
        self.state == ArticulationState::Idle
    }

    pub fn reset(&mut self) {
        self.state = ArticulationState::Idle;
        self.previous_state = ArticulationState::Idle;
        self.current = ExcitationKind::Silent;
        self.previous = ExcitationKind::Silent;
        self.crossfade = 1.0;
        self.elapsed = 0;
        self.timed_out = false;
        self.exciters.reset();
    }
}
