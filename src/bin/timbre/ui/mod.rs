//! Terminal UI. The transport bar sits on top; below it the spectrum and the
//! lead envelope share the screen side by side.

pub mod envelope;
pub mod spectrum;
mod state;
mod transport;

use std::time::Duration;

use color_eyre::eyre::Result as EyreResult;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::{
    layout::{Constraint, Layout},
    style::{Color, Style},
    widgets::Paragraph,
    DefaultTerminal, Frame,
};
use rtrb::Consumer;

pub use state::{Controls, UiFrame};

use envelope::EnvelopeView;
use spectrum::{render_spectrum, SpectrumView};
use transport::{render_transport, AudioStats};

/// Decimated output samples kept for the level meter and the backdrop.
const SCOPE_LEN: usize = 1024;
const FRAME_BUDGET: Duration = Duration::from_millis(16);
const HELP: &str = " q quit · space start/stop · r restart · ↑↓ cutoff · +/- volume";

enum Action {
    Quit,
    Toggle,
    Restart,
    Cutoff(bool),
    Volume(bool),
}

fn action(key: KeyCode) -> Option<Action> {
    Some(match key {
        KeyCode::Char('q' | 'Q') | KeyCode::Esc => Action::Quit,
        KeyCode::Char(' ') => Action::Toggle,
        KeyCode::Char('r' | 'R') => Action::Restart,
        KeyCode::Up => Action::Cutoff(true),
        KeyCode::Down => Action::Cutoff(false),
        KeyCode::Char('+' | '=') => Action::Volume(true),
        KeyCode::Char('-') => Action::Volume(false),
        _ => return None,
    })
}

pub struct UiApp {
    scope_rx: Consumer<f32>,
    frame_rx: Consumer<UiFrame>,
    controls: Controls,
    latest: UiFrame,
    scope: Vec<f32>,
    spectrum: SpectrumView,
    lead: EnvelopeView,
    sample_rate: u32,
    bpm: f64,
}

impl UiApp {
    pub fn new(
        scope_rx: Consumer<f32>,
        frame_rx: Consumer<UiFrame>,
        controls: Controls,
        lead: EnvelopeView,
        sample_rate: u32,
        bpm: f64,
    ) -> Self {
        Self {
            scope_rx,
            frame_rx,
            controls,
            latest: UiFrame::default(),
            scope: Vec::with_capacity(SCOPE_LEN * 2),
            spectrum: SpectrumView::new(sample_rate as f64),
            lead,
            sample_rate,
            bpm,
        }
    }

    pub fn run(&mut self, terminal: &mut DefaultTerminal) -> EyreResult<()> {
        loop {
            self.drain_rings();
            terminal.draw(|frame| self.draw(frame))?;

            if !event::poll(FRAME_BUDGET)? {
                continue;
            }
            let Event::Key(key) = event::read()? else {
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match action(key.code) {
                Some(Action::Quit) => return Ok(()),
                Some(Action::Toggle) => self.controls.toggle(),
                Some(Action::Restart) => self.controls.restart(),
                Some(Action::Cutoff(up)) => self.controls.open_filter(up),
                Some(Action::Volume(up)) => self.controls.nudge_amp(up),
                None => {}
            }
        }
    }

    /// Take everything the audio thread pushed since the last frame. Only
    /// the newest snapshot matters.
    fn drain_rings(&mut self) {
        while let Ok(sample) = self.scope_rx.pop() {
            self.scope.push(sample);
        }
        let keep_from = self.scope.len().saturating_sub(SCOPE_LEN);
        self.scope.drain(..keep_from);

        if let Some(frame) = std::iter::from_fn(|| self.frame_rx.pop().ok()).last() {
            self.spectrum.update(&frame.spectrum);
            self.latest = frame;
        }
    }

    fn draw(&self, frame: &mut Frame) {
        let [top, middle, help] = Layout::vertical([
            Constraint::Length(3),
            Constraint::Min(10),
            Constraint::Length(1),
        ])
        .areas(frame.area());
        let [left, right] =
            Layout::horizontal([Constraint::Percentage(60), Constraint::Percentage(40)]).areas(middle);

        let stats = AudioStats::from_buffer(&self.scope);
        render_transport(
            frame,
            top,
            self.bpm,
            self.sample_rate,
            &self.latest,
            &self.controls,
            &stats,
        );
        render_spectrum(frame, left, self.spectrum.data());
        self.lead
            .render(frame, right, self.latest.elapsed_ms, self.latest.lead_level, &self.scope);
        frame.render_widget(Paragraph::new(HELP).style(Style::default().fg(Color::DarkGray)), help);
    }
}
