//! Spectrum analyser widget
//!
//! The analysis itself runs in the graph (`SpectrumNode`); this side only
//! picks log-spaced bins and draws them in dB.

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    symbols,
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType},
    Frame,
};

/// Number of frequency bands to display
pub const SPECTRUM_BANDS: usize = 48;

const MIN_FREQ: f64 = 20.0;
const FLOOR_DB: f64 = -80.0;

/// Display band centre frequencies, 20 Hz to Nyquist (or 20 kHz).
pub fn band_freqs(sample_rate: f64) -> [f64; SPECTRUM_BANDS] {
    let max_freq = (sample_rate / 2.0).min(20_000.0).max(MIN_FREQ);
    let ratio = max_freq / MIN_FREQ;
    let mut freqs = [0.0; SPECTRUM_BANDS];
    for (i, f) in freqs.iter_mut().enumerate() {
        let t = i as f64 / (SPECTRUM_BANDS - 1) as f64;
        *f = MIN_FREQ * ratio.powf(t);
    }
    freqs
}

/// FFT bin index for each display band.
pub fn band_indices(sample_rate: f64, frame_size: usize) -> [usize; SPECTRUM_BANDS] {
    let half = (frame_size / 2).max(1);
    let mut indices = [0; SPECTRUM_BANDS];
    for (index, freq) in indices.iter_mut().zip(band_freqs(sample_rate)) {
        *index = ((freq * frame_size as f64 / sample_rate).round() as usize).min(half - 1);
    }
    indices
}

/// Chart points: (frequency in Hz, level in dB).
pub struct SpectrumView {
    freqs: [f64; SPECTRUM_BANDS],
    data: Vec<(f64, f64)>,
}

impl SpectrumView {
    pub fn new(sample_rate: f64) -> Self {
        let freqs = band_freqs(sample_rate);
        Self {
            freqs,
            data: freqs.iter().map(|&f| (f, FLOOR_DB)).collect(),
        }
    }

    pub fn update(&mut self, bands: &[f32; SPECTRUM_BANDS]) {
        for ((point, &freq), &mag) in self.data.iter_mut().zip(&self.freqs).zip(bands) {
            let db = 20.0 * (mag as f64).max(1e-6).log10();
            *point = (freq, db.max(FLOOR_DB));
        }
    }

    pub fn data(&self) -> &[(f64, f64)] {
        &self.data
    }
}

/// Render the spectrum analyser widget
pub fn render_spectrum(frame: &mut Frame, area: Rect, spectrum: &[(f64, f64)]) {
    let block = Block::default().title(" Spectrum ").borders(Borders::ALL);

    // log frequency axis: plot against band position
    let points: Vec<(f64, f64)> = spectrum
        .iter()
        .enumerate()
        .map(|(i, &(_, db))| (i as f64, db))
        .collect();
    let dataset = Dataset::default()
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(Color::Green))
        .data(&points);

    let chart = Chart::new(vec![dataset])
        .block(block)
        .x_axis(
            Axis::default()
                .bounds([0.0, (SPECTRUM_BANDS - 1) as f64])
                .labels(vec!["20", "200", "2k", "20k"])
                .style(Style::default().fg(Color::DarkGray)),
        )
        .y_axis(
            Axis::default()
                .bounds([FLOOR_DB, 0.0])
                .labels(vec!["-80", "-40", "0"])
                .style(Style::default().fg(Color::DarkGray)),
        );

    frame.render_widget(chart, area);
}
