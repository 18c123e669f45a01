//! Lead note panel: the envelope shape, where the current note sits on it,
//! and the output scope drawn faintly behind.

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    symbols,
    text::Span,
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType},
    Frame,
};

/// Points taken from `EnvNode::preview` for the curve.
pub const ENVELOPE_POINTS: usize = 128;

pub struct EnvelopeView {
    curve: Vec<(f64, f64)>,
    /// Envelope length in ms, the width of the chart.
    length_ms: f64,
    /// Time between note starts.
    note_ms: f64,
    peak: f64,
}

impl EnvelopeView {
    pub fn new(shape: &[f32], length_ms: f64, note_ms: f64) -> Self {
        let step = length_ms / shape.len().max(1) as f64;
        let curve: Vec<(f64, f64)> = shape
            .iter()
            .enumerate()
            .map(|(i, &level)| (i as f64 * step, level as f64))
            .collect();
        let peak = curve.iter().fold(0.0f64, |m, p| m.max(p.1)).max(1e-3);
        Self {
            curve,
            length_ms: length_ms.max(1.0),
            note_ms: note_ms.max(1.0),
            peak,
        }
    }

    /// Position of the playing note: ms since its last bang, or `None`
    /// once the envelope has run out.
    pub fn cursor_ms(&self, elapsed_ms: f64) -> Option<f64> {
        let t = elapsed_ms % self.note_ms;
        (t <= self.length_ms).then_some(t)
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, elapsed_ms: f64, level: f32, scope: &[f32]) {
        let peak = self.peak;

        // scope centred on the middle of the chart, scaled to the curve's range
        let span = self.length_ms / scope.len().max(1) as f64;
        let backdrop: Vec<(f64, f64)> = scope
            .iter()
            .enumerate()
            .map(|(i, &x)| (i as f64 * span, (x as f64 * 0.5 + 0.5) * peak))
            .collect();

        let cursor: Vec<(f64, f64)> = self
            .cursor_ms(elapsed_ms)
            .map(|t| vec![(t, 0.0), (t, level as f64)])
            .unwrap_or_default();

        let datasets = vec![
            Dataset::default()
                .marker(symbols::Marker::Dot)
                .graph_type(GraphType::Scatter)
                .style(Style::default().fg(Color::DarkGray))
                .data(&backdrop),
            Dataset::default()
                .name("perc")
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(Color::Yellow))
                .data(&self.curve),
            Dataset::default()
                .marker(symbols::Marker::Block)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(Color::Magenta))
                .data(&cursor),
        ];

        let title = Span::styled(
            format!(" Lead envelope  {:.0} ms  level {level:.2} ", self.length_ms),
            Style::default().fg(Color::Yellow),
        );
        let chart = Chart::new(datasets)
            .block(Block::default().title(title).borders(Borders::ALL))
            .x_axis(
                Axis::default()
                    .bounds([0.0, self.length_ms])
                    .labels(vec![Span::raw("0"), Span::raw(format!("{:.0} ms", self.length_ms))])
                    .style(Style::default().fg(Color::DarkGray)),
            )
            .y_axis(
                Axis::default()
                    .bounds([0.0, peak])
                    .style(Style::default().fg(Color::DarkGray)),
            );

        frame.render_widget(chart, area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn curve_spans_the_envelope_length() {
        let shape = [0.0, 0.5, 1.0, 0.5];
        let view = EnvelopeView::new(&shape, 200.0, 250.0);
        assert_eq!(view.curve.len(), 4);
        assert_eq!(view.curve[2], (100.0, 1.0));
        assert_eq!(view.peak, 1.0);
    }

    #[test]
    fn cursor_follows_each_note_and_hides_after_the_tail() {
        let view = EnvelopeView::new(&[0.0, 1.0], 200.0, 250.0);
        assert_eq!(view.cursor_ms(60.0), Some(60.0));
        assert_eq!(view.cursor_ms(310.0), Some(60.0));
        assert_eq!(view.cursor_ms(240.0), None);
    }
}
