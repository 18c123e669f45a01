//! Transport bar widget - tempo, play state, position and output level

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use super::{Controls, UiFrame};

/// Output level of the visible scope window
pub struct AudioStats {
    pub peak: f32,
    pub rms: f32,
}

impl AudioStats {
    pub fn from_buffer(buffer: &[f32]) -> Self {
        if buffer.is_empty() {
            return Self { peak: 0.0, rms: 0.0 };
        }
        let peak = buffer.iter().fold(0.0f32, |acc, &x| acc.max(x.abs()));
        let rms = (buffer.iter().map(|&x| x * x).sum::<f32>() / buffer.len() as f32).sqrt();
        Self { peak, rms }
    }
}

pub fn render_transport(
    frame: &mut Frame,
    area: Rect,
    bpm: f64,
    sample_rate: u32,
    state: &UiFrame,
    controls: &Controls,
    stats: &AudioStats,
) {
    let block = Block::default().title(" timbre ").borders(Borders::ALL);

    // bar.beat at 4/4
    let beat_ms = 60_000.0 / bpm;
    let beats = (state.elapsed_ms / beat_ms) as u64;
    let (bar, beat) = (beats / 4 + 1, beats % 4 + 1);

    let running = controls.running && state.playing;
    let (symbol, label) = if running { ("▶", "Playing") } else { ("⏸", "Stopped") };

    let line = Line::from(vec![
        Span::styled(format!(" BPM: {bpm:.0}  "), Style::default().fg(Color::Cyan)),
        Span::styled(
            format!("{symbol} {label}  "),
            Style::default().fg(if running { Color::Green } else { Color::Yellow }),
        ),
        Span::styled(format!("Bar {bar} | Beat {beat}  "), Style::default().fg(Color::White)),
        Span::styled(
            format!("{:.1}kHz  ", sample_rate as f64 / 1000.0),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(
            format!("Cutoff: {:.0}Hz  Amp: {:.2}  ", controls.cutoff, state.amp),
            Style::default().fg(Color::Blue),
        ),
        Span::styled(
            format!("Peak: {:.2}  RMS: {:.2}", stats.peak, stats.rms),
            Style::default().fg(Color::Magenta),
        ),
    ]);

    frame.render_widget(Paragraph::new(line).block(block), area);
}
