use std::f32::consts::PI;

/*
| type              | used by                  | passes          | phase/delay at DC   |
| ----------------- | ------------------------ | --------------- | ------------------- |
| one-pole lowpass  | waveguide loop damping   | below corner    | a / (1 - a) samples |
| first-order AP    | waveguide dispersion     | everything      | (1 - c) / (1 + c)   |
| DC blocker        | wind bore, voice output  | above ~20 Hz    | -                   |
| SVF (TPT)         | bow noise shaping        | LP / BP / HP    | -                   |

The waveguide tunes its delay length by subtracting the low-frequency delay
of its loop filters, which is why the first two rows list it.
*/

pub struct FilterOutputs {
    pub lowpass: f32,
    pub bandpass: f32,
    pub highpass: f32,
}

/// Topology-preserving-transform state variable filter.
pub struct SVFilter {
    ic1eq: f32, // First integrator's memory
    ic2eq: f32, // Second integrator's memory

    g: f32,
    k: f32,
}

impl SVFilter {
    pub fn new() -> Self {
        Self {
            ic1eq: 0.0,
            ic2eq: 0.0,
            g: 0.0,
            k: 2.0,
        }
    }

    /// Recompute coefficients. Call at control rate, not per sample.
    ///
    /// `resonance` is in [0, 1); 1 would be self-oscillation and is clamped away.
    pub fn set_params(&mut self, cutoff_hz: f32, resonance: f32, sample_rate: f32) {
        let cutoff_hz = cutoff_hz.clamp(1.0, sample_rate * 0.49);
        self.g = (PI * cutoff_hz / sample_rate).tan();
        self.k = 2.0 - 2.0 * resonance.clamp(0.0, 0.98);
    }

    #[inline]
    pub fn next_sample(&mut self, sample: f32) -> FilterOutputs {
        let g = self.g;
        let k = self.k;
        let h = 1.0 / (1.0 + g * (g + k));
        let v3 = sample - self.ic2eq;
        let v1 = h * (self.ic1eq + g * v3);
        let v2 = self.ic2eq + g * v1;

        self.ic1eq = 2.0 * v1 - self.ic1eq;
        self.ic2eq = 2.0 * v2 - self.ic2eq;

        FilterOutputs {
            lowpass: v2,
            bandpass: v1,
            highpass: sample - k * v1 - v2,
        }
    }

    pub fn reset(&mut self) {
        self.ic1eq = 0.0;
        self.ic2eq = 0.0;
    }
}

impl Default for SVFilter {
    fn default() -> Self {
        Self::new()
    }
}

/// y[n] = (1 - a) x[n] + a y[n-1]; unity gain at DC.
#[derive(Debug, Clone, Default)]
pub struct OnePole {
    a: f32,
    z1: f32,
}

impl OnePole {
    pub fn new(a: f32) -> Self {
        let mut filter = Self { a: 0.0, z1: 0.0 };
        filter.set_coefficient(a);
        filter
    }

    pub fn set_coefficient(&mut self, a: f32) {
        self.a = a.clamp(0.0, 0.99);
    }

    pub fn coefficient(&self) -> f32 {
        self.a
    }

    /// Low-frequency delay in samples.
    pub fn phase_delay(&self) -> f32 {
        self.a / (1.0 - self.a)
    }

    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        self.z1 = super::flush_denormal((1.0 - self.a) * x + self.a * self.z1);
        self.z1
    }

    pub fn reset(&mut self) {
        self.z1 = 0.0;
    }
}

/// First-order allpass (c + z^-1) / (1 + c z^-1).
#[derive(Debug, Clone, Default)]
pub struct Allpass {
    c: f32,
    x1: f32,
    y1: f32,
}

impl Allpass {
    pub fn new(c: f32) -> Self {
        let mut filter = Self::default();
        filter.set_coefficient(c);
        filter
    }

    pub fn set_coefficient(&mut self, c: f32) {
        self.c = c.clamp(-0.95, 0.95);
    }

    /// Low-frequency delay in samples.
    pub fn phase_delay(&self) -> f32 {
        (1.0 - self.c) / (1.0 + self.c)
    }

    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let y = super::flush_denormal(self.c * x + self.x1 - self.c * self.y1);
        self.x1 = x;
        self.y1 = y;
        y
    }

    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.y1 = 0.0;
    }
}

/// Leaky differentiator removing DC offset.
#[derive(Debug, Clone)]
pub struct DcBlocker {
    r: f32,
    x1: f32,
    y1: f32,
}

impl DcBlocker {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            r: 1.0 - (2.0 * PI * 20.0 / sample_rate).min(0.5),
            x1: 0.0,
            y1: 0.0,
        }
    }

    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let y = super::flush_denormal(x - self.x1 + self.r * self.y1);
        self.x1 = x;
        self.y1 = y;
        y
    }

    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.y1 = 0.0;
    }
}
