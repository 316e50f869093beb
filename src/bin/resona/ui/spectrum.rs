//! Spectrum widget
//!
//! Log-spaced bands; each band shows the strongest FFT bin it covers so
//! narrow modal partials are not averaged away.

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    symbols,
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType},
    Frame,
};
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

const BANDS: usize = 64;
const FLOOR_DB: f64 = -100.0;

pub struct SpectrumAnalyzer {
    window: Vec<f32>,
    /// `[start, end)` FFT bins per band.
    ranges: Vec<(usize, usize)>,
    fft: Arc<dyn Fft<f32>>,
    scratch: Vec<Complex<f32>>,
    /// (log10 of band centre in Hz, level in dB)
    spectrum: Vec<(f64, f64)>,
}

impl SpectrumAnalyzer {
    pub fn new(fft_len: usize, sample_rate: f32) -> Self {
        let fft_len = fft_len.max(64);
        let fft = FftPlanner::new().plan_fft_forward(fft_len);

        let denom = (fft_len - 1) as f32;
        let window = (0..fft_len)
            .map(|i| 0.5 * (1.0 - (std::f32::consts::TAU * i as f32 / denom).cos()))
            .collect();

        let half = fft_len / 2;
        let hz_per_bin = sample_rate as f64 / fft_len as f64;
        let low = 30.0f64;
        let high = (sample_rate as f64 / 2.0).min(16_000.0).max(low * 2.0);
        let step = (high / low).powf(1.0 / BANDS as f64);

        let mut ranges = Vec::with_capacity(BANDS);
        let mut spectrum = Vec::with_capacity(BANDS);
        for band in 0..BANDS {
            let lo = low * step.powi(band as i32);
            let hi = lo * step;
            let start = ((lo / hz_per_bin).floor() as usize).clamp(1, half - 1);
            let end = ((hi / hz_per_bin).ceil() as usize).clamp(start + 1, half);
            ranges.push((start, end));
            spectrum.push(((lo * hi).sqrt().log10(), FLOOR_DB));
        }

        Self {
            window,
            ranges,
            fft,
            scratch: vec![Complex::new(0.0, 0.0); fft_len],
            spectrum,
        }
    }

    /// Analyse the newest `fft_len` samples. Shorter buffers are ignored.
    pub fn update(&mut self, buffer: &[f32]) {
        let n = self.window.len();
        if buffer.len() < n {
            return;
        }
        let recent = &buffer[buffer.len() - n..];

        for ((bin, &x), &w) in self.scratch.iter_mut().zip(recent).zip(&self.window) {
            *bin = Complex::new(x * w, 0.0);
        }
        self.fft.process(&mut self.scratch);

        let norm = 2.0 / n as f32;
        for ((_, level), &(start, end)) in self.spectrum.iter_mut().zip(&self.ranges) {
            let peak = self.scratch[start..end]
                .iter()
                .map(|c| c.norm() * norm)
                .fold(0.0f32, f32::max);
            let db = 20.0 * (peak.max(1e-6) as f64).log10();
            // Fall back slowly so decays are readable
            *level = db.max(*level - 1.5).max(FLOOR_DB);
        }
    }

    pub fn data(&self) -> &[(f64, f64)] {
        &self.spectrum
    }
}

pub fn render_spectrum(frame: &mut Frame, area: Rect, spectrum: &[(f64, f64)]) {
    let block = Block::default().title(" Spectrum ").borders(Borders::ALL);

    let dataset = Dataset::default()
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(Color::Green))
        .data(spectrum);

    let (min_x, max_x) = match (spectrum.first(), spectrum.last()) {
        (Some(first), Some(last)) => (first.0, last.0.max(first.0 + 1.0)),
        _ => (1.0, 4.0),
    };

    let chart = Chart::new(vec![dataset])
        .block(block)
        .x_axis(
            Axis::default()
                .bounds([min_x, max_x])
                .labels(vec!["30", "300", "3k"])
                .style(Style::default().fg(Color::DarkGray)),
        )
        .y_axis(
            Axis::default()
                .bounds([FLOOR_DB, 0.0])
                .labels(vec!["-100", "-50", "0"])
                .style(Style::default().fg(Color::DarkGray)),
        );

    frame.render_widget(chart, area);
}
