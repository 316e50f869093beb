//! Excitation generators: the signals that set an element vibrating.

use crate::dsp::filter::SVFilter;
use crate::dsp::noise::NoiseSource;
use crate::dsp::LookupTables;
use crate::CONTROL_BLOCK;

pub const PLUCK_SAMPLES: usize = 10;
pub const SCRAPE_SAMPLES: usize = 20;
pub const HARMONIC_SAMPLES: usize = 100;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExcitationKind {
    #[default]
    Silent,
    Pluck,
    Bow,
    Scrape,
    Harmonic,
}

/// Short decaying impulse.
#[derive(Debug, Clone, Default)]
pub struct PluckBurst {
    position: usize,
    amplitude: f32,
}

impl PluckBurst {
    pub fn trigger(&mut self, force: f32) {
        self.position = 0;
        self.amplitude = force;
    }

    #[inline]
    pub fn next(&mut self, tables: &LookupTables) -> f32 {
        if self.position >= PLUCK_SAMPLES {
            return 0.0;
        }
        let y = self.amplitude * tables.exp_decay(self.position as f32 * 0.4);
        self.position += 1;
        y
    }

    pub fn is_sounding(&self) -> bool {
        self.position < PLUCK_SAMPLES
    }
}

/// Continuous band-passed noise. Filter and level are recomputed once per
/// control block from pressure, speed and contact area.
pub struct BowNoise {
    filter: SVFilter,
    pressure: f32,
    speed: f32,
    contact_area: f32,
    amplitude: f32,
    countdown: usize,
    sample_rate: f32,
}

impl BowNoise {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            filter: SVFilter::new(),
            pressure: 0.0,
            speed: 0.5,
            contact_area: 0.5,
            amplitude: 0.0,
            countdown: 0,
            sample_rate,
        }
    }

    pub fn trigger(&mut self, pressure: f32, speed: f32, contact_area: f32) {
        self.pressure = pressure.clamp(0.0, 1.0);
        self.speed = speed.clamp(0.0, 1.0);
        self.contact_area = contact_area.clamp(0.0, 1.0);
        self.filter.reset();
        self.countdown = 0;
    }

    pub fn set_pressure(&mut self, pressure: f32) {
        self.pressure = if pressure.is_finite() {
            pressure.clamp(0.0, 1.0)
        } else {
            0.0
        };
    }

    pub fn pressure(&self) -> f32 {
        self.pressure
    }

    fn regenerate(&mut self, tables: &LookupTables) {
        // Faster strokes open the band along a log curve.
        let cutoff = tables.log_sweep(self.speed, 300.0, 5_300.0);
        // A wide contact patch gives a broader, less resonant band.
        let resonance = 0.2 + 0.6 * (1.0 - self.contact_area);
        self.filter.set_params(cutoff, resonance, self.sample_rate);
        self.amplitude = self.pressure * (0.3 + 0.7 * self.speed) * 0.25;
        self.countdown = CONTROL_BLOCK;
    }

    #[inline]
    pub fn next(&mut self, noise: &mut NoiseSource, tables: &LookupTables) -> f32 {
        if self.countdown == 0 {
            self.regenerate(tables);
        }
        self.countdown -= 1;
        self.filter.next_sample(noise.next_bipolar()).bandpass * self.amplitude
    }

    pub fn is_sounding(&self) -> bool {
        self.pressure > 0.0
    }

    pub fn reset(&mut self) {
        self.filter.reset();
        self.pressure = 0.0;
        self.amplitude = 0.0;
        self.countdown = 0;
    }
}

/// Fixed-length noise burst with a linear fade.
#[derive(Debug, Clone, Default)]
pub struct ScrapeBurst {
    position: usize,
    amplitude: f32,
}

impl ScrapeBurst {
    pub fn trigger(&mut self, force: f32, roughness: f32) {
        self.position = 0;
        self.amplitude = force * (0.5 + 0.5 * roughness.clamp(0.0, 1.0));
    }

    #[inline]
    pub fn next(&mut self, noise: &mut NoiseSource) -> f32 {
        if self.position >= SCRAPE_SAMPLES {
            return 0.0;
        }
        let fade = 1.0 - self.position as f32 / SCRAPE_SAMPLES as f32;
        self.position += 1;
        noise.next_bipolar() * self.amplitude * fade
    }

    pub fn is_sounding(&self) -> bool {
        self.position < SCRAPE_SAMPLES
    }
}

/// Hann-windowed sine at the note frequency.
#[derive(Debug, Clone, Default)]
pub struct HarmonicBurst {
    position: usize,
    amplitude: f32,
    phase: f32,
    increment: f32,
}

impl HarmonicBurst {
    pub fn trigger(&mut self, force: f32, frequency: f32, sample_rate: f32) {
        self.position = 0;
        self.amplitude = force;
        self.phase = 0.0;
        self.increment = (frequency / sample_rate).clamp(0.0, 0.49);
    }

    #[inline]
    pub fn next(&mut self, tables: &LookupTables) -> f32 {
        if self.position >= HARMONIC_SAMPLES {
            return 0.0;
        }
        let t = self.position as f32 / HARMONIC_SAMPLES as f32;
        let window = 0.5 - 0.5 * tables.cos(t);
        let y = tables.sin(self.phase) * window * self.amplitude;
        self.phase += self.increment;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        self.position += 1;
        y
    }

    pub fn is_sounding(&self) -> bool {
        self.position < HARMONIC_SAMPLES
    }
}

/// One instance of every generator plus the voice's noise stream.
pub struct Exciters {
    pub pluck: PluckBurst,
    pub bow: BowNoise,
    pub scrape: ScrapeBurst,
    pub harmonic: HarmonicBurst,
    noise: NoiseSource,
}

impl Exciters {
    pub fn new(sample_rate: f32, seed: u32) -> Self {
        Self {
            pluck: PluckBurst::default(),
            bow: BowNoise::new(sample_rate),
            scrape: ScrapeBurst::default(),
            harmonic: HarmonicBurst::default(),
            noise: NoiseSource::new(seed),
        }
    }

    #[inline]
    pub fn next(&mut self, kind: ExcitationKind, tables: &LookupTables) -> f32 {
        match kind {
            ExcitationKind::Silent => 0.0,
            ExcitationKind::Pluck => self.pluck.next(tables),
            ExcitationKind::Bow => self.bow.next(&mut self.noise, tables),
            ExcitationKind::Scrape => self.scrape.next(&mut self.noise),
            ExcitationKind::Harmonic => self.harmonic.next(tables),
        }
    }

    pub fn is_sounding(&self, kind: ExcitationKind) -> bool {
        match kind {
            ExcitationKind::Silent => false,
            ExcitationKind::Pluck => self.pluck.is_sounding(),
            ExcitationKind::Bow => self.bow.is_sounding(),
            ExcitationKind::Scrape => self.scrape.is_sounding(),
            ExcitationKind::Harmonic => self.harmonic.is_sounding(),
        }
    }

    /// Stop every generator. The noise stream keeps its position.
    pub fn reset(&mut self) {
        self.pluck = PluckBurst::default();
        self.bow.reset();
        self.scrape = ScrapeBurst::default();
        self.harmonic = HarmonicBurst::default();
    }
}
