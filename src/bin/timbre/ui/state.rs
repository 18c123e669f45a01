//! Types crossing between the audio and UI threads.
//!
//! The audio thread only ever pushes `Copy` values into preallocated rings,
//! so nothing it sends allocates.

use rtrb::Producer;
use timbre_dsp::graph::SystemCommand;
use tracing::{debug, warn};

use super::spectrum::SPECTRUM_BANDS;
use crate::patch::Patch;

/// Snapshot sent once per stream block.
#[derive(Clone, Copy, Debug)]
pub struct UiFrame {
    pub playing: bool,
    pub elapsed_ms: f64,
    pub amp: f32,
    /// Current level of the lead note's envelope.
    pub lead_level: f32,
    /// Peak-normalised magnitudes at the log-spaced display bands.
    pub spectrum: [f32; SPECTRUM_BANDS],
}

impl Default for UiFrame {
    fn default() -> Self {
        Self {
            playing: false,
            elapsed_ms: 0.0,
            amp: 0.0,
            lead_level: 0.0,
            spectrum: [0.0; SPECTRUM_BANDS],
        }
    }
}

const CUTOFF_RANGE: (f32, f32) = (120.0, 9000.0);
const CUTOFF_STEP: f32 = 1.25;
const AMP_STEP: f32 = 0.05;

/// UI-side view of the patch controls. Every change is sent to the audio
/// thread as a `SystemCommand`.
pub struct Controls {
    patch: Patch,
    commands: Producer<SystemCommand>,
    pub running: bool,
    pub cutoff: f32,
    pub amp: f32,
}

impl Controls {
    pub fn new(patch: Patch, commands: Producer<SystemCommand>, cutoff: f32, amp: f32) -> Self {
        Self {
            patch,
            commands,
            running: true,
            cutoff,
            amp,
        }
    }

    fn send(&mut self, command: SystemCommand) {
        match self.commands.push(command) {
            Ok(()) => debug!(?command, "sent"),
            Err(_) => warn!(?command, "command ring full, dropped"),
        }
    }

    /// Start or stop both sequencers.
    pub fn toggle(&mut self) {
        self.running = !self.running;
        let (riff, metro) = (self.patch.riff, self.patch.metro);
        if self.running {
            self.send(SystemCommand::Start(riff));
            self.send(SystemCommand::Start(metro));
        } else {
            self.send(SystemCommand::Stop(riff));
            self.send(SystemCommand::Stop(metro));
        }
    }

    /// Back to the first note of the riff.
    pub fn restart(&mut self) {
        self.send(SystemCommand::Bang(self.patch.riff, None));
    }

    pub fn open_filter(&mut self, up: bool) {
        let cutoff = if up {
            self.cutoff * CUTOFF_STEP
        } else {
            self.cutoff / CUTOFF_STEP
        };
        self.cutoff = cutoff.clamp(CUTOFF_RANGE.0, CUTOFF_RANGE.1);
        self.send(SystemCommand::SetMul(self.patch.cutoff, self.cutoff));
    }

    pub fn nudge_amp(&mut self, up: bool) {
        let step = if up { AMP_STEP } else { -AMP_STEP };
        self.amp = (self.amp + step).clamp(0.0, 1.0);
        self.send(SystemCommand::SetAmp(self.amp));
    }
}
