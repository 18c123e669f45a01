//! Audio device setup and the callback that drives the sound system.

use color_eyre::eyre::{eyre, Result as EyreResult, WrapErr};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rtrb::RingBuffer;
use timbre_dsp::graph::{EnvNode, SpectrumNode, SystemStatus};
use timbre_dsp::{AudioContext, SoundSystem};
use tracing::{error, info};

use super::patch::{self, Patch, DEFAULT_CUTOFF, SPECTRUM_SIZE};
use super::ui::envelope::{EnvelopeView, ENVELOPE_POINTS};
use super::ui::spectrum::{band_indices, SPECTRUM_BANDS};
use super::ui::{Controls, UiApp, UiFrame};

/// Samples kept for the oscilloscope, with headroom for a slow UI.
const SCOPE_RING: usize = 8192;
const FRAME_RING: usize = 64;
const COMMAND_RING: usize = 256;

pub struct App {
    bpm: f64,
    stream_ms: f64,
}

impl App {
    pub fn new() -> Self {
        Self {
            bpm: 120.0,
            stream_ms: 20.0,
        }
    }

    pub fn bpm(mut self, bpm: f64) -> Self {
        self.bpm = bpm;
        self
    }

    /// Takes over the terminal until the user quits.
    pub fn run(self) -> EyreResult<()> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| eyre!("no default output device available"))?;
        let config = device
            .default_output_config()
            .wrap_err("failed to fetch default output config")?;

        let sample_rate = config.sample_rate().0;
        let device_channels = config.channels() as usize;
        let ctx = AudioContext::builder()
            .sample_rate(sample_rate)
            .channels(device_channels.min(2))
            .bpm(self.bpm)
            .stream_ms(self.stream_ms)
            .try_build()
            .wrap_err_with(|| format!("device runs at {sample_rate} Hz"))?;

        let mut system = SoundSystem::new(&ctx);
        let commands = system.command_channel(COMMAND_RING);
        let patch = patch::build(&mut system, self.bpm).wrap_err("failed to build patch")?;
        let lead = lead_view(&system, &patch, self.bpm);
        system.play();
        info!(sample_rate, channels = device_channels, bpm = self.bpm, "audio ready");

        let (scope_tx, scope_rx) = RingBuffer::<f32>::new(SCOPE_RING);
        let (frame_tx, frame_rx) = RingBuffer::<UiFrame>::new(FRAME_RING);
        let mut engine = Engine::new(system, patch, scope_tx, frame_tx);

        let stream = device.build_output_stream(
            &config.into(),
            move |data: &mut [f32], _| engine.fill(data, device_channels),
            |err| error!(error = %err, "audio stream error"),
            None,
        )?;
        stream.play()?;

        let controls = Controls::new(patch, commands, DEFAULT_CUTOFF, ctx.amp());
        let mut ui = UiApp::new(scope_rx, frame_rx, controls, lead, sample_rate, self.bpm);
        let mut terminal = ratatui::init();
        let result = ui.run(&mut terminal);
        ratatui::restore();

        drop(stream);
        info!("stopped");
        result
    }
}

/// Preview of the lead envelope, taken before the system moves to the audio
/// thread.
fn lead_view(system: &SoundSystem, handles: &Patch, bpm: f64) -> EnvelopeView {
    let note = patch::note_ms(bpm, system.context());
    match system.graph().get::<EnvNode>(handles.lead) {
        Some(env) => EnvelopeView::new(
            &env.preview(ENVELOPE_POINTS),
            env.envelope().info(0.0).total_ms,
            note,
        ),
        None => EnvelopeView::new(&[], note, note),
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything the audio thread owns. Stream blocks are rendered whole and
/// handed out to however many frames the device asks for.
struct Engine {
    system: SoundSystem,
    patch: Patch,
    left: Vec<f32>,
    right: Vec<f32>,
    pos: usize,
    elapsed_ms: f64,
    bands: [usize; SPECTRUM_BANDS],
    scope_tx: rtrb::Producer<f32>,
    frame_tx: rtrb::Producer<UiFrame>,
}

impl Engine {
    fn new(
        system: SoundSystem,
        patch: Patch,
        scope_tx: rtrb::Producer<f32>,
        frame_tx: rtrb::Producer<UiFrame>,
    ) -> Self {
        let bands = band_indices(system.context().sample_rate_f64(), SPECTRUM_SIZE);
        let size = system.stream_size();
        Self {
            system,
            patch,
            left: vec![0.0; size],
            right: vec![0.0; size],
            pos: size,
            elapsed_ms: 0.0,
            bands,
            scope_tx,
            frame_tx,
        }
    }

    fn fill(&mut self, data: &mut [f32], channels: usize) {
        for frame in data.chunks_mut(channels.max(1)) {
            if self.pos >= self.left.len() {
                self.render();
            }
            let (l, r) = (self.left[self.pos], self.right[self.pos]);
            self.pos += 1;
            match frame {
                [mono] => *mono = (l + r) * 0.5,
                [fl, fr, rest @ ..] => {
                    *fl = l;
                    *fr = r;
                    rest.fill(0.0);
                }
                [] => {}
            }
        }
    }

    fn render(&mut self) {
        let (l, r) = self.system.process_stream();
        self.left.copy_from_slice(l);
        self.right.copy_from_slice(r);
        self.pos = 0;

        let ctx = self.system.context();
        self.elapsed_ms += self.left.len() as f64 * 1000.0 / ctx.sample_rate_f64();

        // a full scope ring means the UI is behind; it only needs the latest
        for &x in self.left.iter().step_by(4) {
            if self.scope_tx.push(x).is_err() {
                break;
            }
        }

        let mut frame = UiFrame {
            playing: self.system.status() == SystemStatus::Playing,
            elapsed_ms: self.elapsed_ms,
            amp: self.system.amp(),
            lead_level: 0.0,
            spectrum: [0.0; SPECTRUM_BANDS],
        };
        if let Some(node) = self.system.graph().get::<SpectrumNode>(self.patch.spectrum) {
            let bins = node.spectrum();
            for (out, &index) in frame.spectrum.iter_mut().zip(&self.bands) {
                *out = bins.get(index).copied().unwrap_or(0.0);
            }
        }
        if let Some(env) = self.system.graph().get::<EnvNode>(self.patch.lead) {
            frame.lead_level = env.level() as f32;
        }
        let _ = self.frame_tx.push(frame);
    }
}
