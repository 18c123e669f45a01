#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConfigError;

/*
Audio Context
=============

Every component that needs to know "how fast" or "how big" receives an
`AudioContext` when it is built. Nothing reads a global sample rate.

  sample_rate   Samples per second. Only the rates the scheduler was tuned
                for are accepted (8 kHz .. 48 kHz). An offline context
                (`builder().offline()`) takes any rate up to 192 kHz; it is
                meant for rendering and analysis, not for a device.

  cell_size     Samples per tick. One tick renders one cell in every node
                that is pulled. 32, 64, 128 or 256.

  channels      1 (mono) or 2 (stereo) output channels.

  bpm           Tempo used by musical time strings ("bpm l8", "1.2.0").

  amp           Master gain applied at the system mix before clamping.

  stream_ms     Target length of one output stream block. The real length
                is the next power of two samples, clamped to 256..16384,
                and is always a whole number of cells.

The context is immutable once built. Build a second one to render at a
different rate.
*/

pub const ACCEPTED_SAMPLE_RATES: &[u32] = &[
    8000, 11025, 12000, 16000, 22050, 24000, 32000, 44100, 48000,
];
pub const ACCEPTED_CELL_SIZES: &[usize] = &[32, 64, 128, 256];
pub const MAX_OFFLINE_SAMPLE_RATE: u32 = 192_000;

pub const DEFAULT_SAMPLE_RATE: u32 = 44100;
pub const DEFAULT_CELL_SIZE: usize = 128;
pub const DEFAULT_BPM: f64 = 120.0;
pub const DEFAULT_AMP: f32 = 0.8;
pub const DEFAULT_STREAM_MS: f64 = 20.0;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioContext {
    sample_rate: u32,
    cell_size: usize,
    channels: usize,
    bpm: f64,
    amp: f32,
    stream_ms: f64,
}

impl AudioContext {
    pub fn builder() -> AudioContextBuilder {
        AudioContextBuilder::default()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn sample_rate_f64(&self) -> f64 {
        self.sample_rate as f64
    }

    pub fn cell_size(&self) -> usize {
        self.cell_size
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn amp(&self) -> f32 {
        self.amp
    }

    /// Duration of one tick in milliseconds.
    pub fn cell_ms(&self) -> f64 {
        self.cell_size as f64 * 1000.0 / self.sample_rate as f64
    }

    /// Number of samples in one output stream block.
    pub fn stream_size(&self) -> usize {
        let samples = self.stream_ms / 1000.0 * self.sample_rate as f64;
        let bits = samples.log2().ceil().clamp(8.0, 14.0) as u32;
        (1usize << bits).max(self.cell_size)
    }

    /// Converts milliseconds to whole samples, truncating.
    pub fn ms_to_samples(&self, ms: f64) -> i64 {
        (self.sample_rate as f64 * ms * 0.001) as i64
    }
}

impl Default for AudioContext {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            cell_size: DEFAULT_CELL_SIZE,
            channels: 2,
            bpm: DEFAULT_BPM,
            amp: DEFAULT_AMP,
            stream_ms: DEFAULT_STREAM_MS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AudioContextBuilder {
    sample_rate: u32,
    cell_size: usize,
    channels: usize,
    bpm: f64,
    amp: f32,
    stream_ms: f64,
    offline: bool,
}

impl Default for AudioContextBuilder {
    fn default() -> Self {
        let ctx = AudioContext::default();
        Self {
            sample_rate: ctx.sample_rate,
            cell_size: ctx.cell_size,
            channels: ctx.channels,
            bpm: ctx.bpm,
            amp: ctx.amp,
            stream_ms: ctx.stream_ms,
            offline: false,
        }
    }
}

impl AudioContextBuilder {
    /// Accept any sample rate in `1..=192000`, for offline rendering.
    pub fn offline(mut self) -> Self {
        self.offline = true;
        self
    }

    fn accepts_sample_rate(&self) -> bool {
        if self.offline {
            (1..=MAX_OFFLINE_SAMPLE_RATE).contains(&self.sample_rate)
        } else {
            ACCEPTED_SAMPLE_RATES.contains(&self.sample_rate)
        }
    }

    pub fn sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn cell_size(mut self, cell_size: usize) -> Self {
        self.cell_size = cell_size;
        self
    }

    pub fn channels(mut self, channels: usize) -> Self {
        self.channels = channels;
        self
    }

    pub fn bpm(mut self, bpm: f64) -> Self {
        self.bpm = bpm;
        self
    }

    pub fn amp(mut self, amp: f32) -> Self {
        self.amp = amp;
        self
    }

    pub fn stream_ms(mut self, stream_ms: f64) -> Self {
        self.stream_ms = stream_ms;
        self
    }

    /// Strict build: any out-of-range value is an error.
    pub fn try_build(self) -> Result<AudioContext, ConfigError> {
        if !self.accepts_sample_rate() {
            return Err(ConfigError::SampleRate(self.sample_rate));
        }
        if !ACCEPTED_CELL_SIZES.contains(&self.cell_size) {
            return Err(ConfigError::CellSize(self.cell_size));
        }
        if !(1..=2).contains(&self.channels) {
            return Err(ConfigError::Channels(self.channels));
        }
        if !(5.0..=300.0).contains(&self.bpm) {
            return Err(ConfigError::Bpm(self.bpm));
        }
        if self.stream_ms.is_nan() || self.stream_ms <= 0.0 {
            return Err(ConfigError::StreamLength(self.stream_ms));
        }
        Ok(AudioContext {
            sample_rate: self.sample_rate,
            cell_size: self.cell_size,
            channels: self.channels,
            bpm: self.bpm,
            amp: self.amp,
            stream_ms: self.stream_ms,
        })
    }

    /// Lenient build: rejected values fall back to their defaults.
    pub fn build(self) -> AudioContext {
        let defaults = AudioContext::default();
        let mut ctx = defaults;

        if self.accepts_sample_rate() {
            ctx.sample_rate = self.sample_rate;
        } else {
            warn!(sample_rate = self.sample_rate, "unsupported sample rate, using default");
        }
        if ACCEPTED_CELL_SIZES.contains(&self.cell_size) {
            ctx.cell_size = self.cell_size;
        } else {
            warn!(cell_size = self.cell_size, "unsupported cell size, using default");
        }
        if (1..=2).contains(&self.channels) {
            ctx.channels = self.channels;
        } else {
            warn!(channels = self.channels, "unsupported channel count, using stereo");
        }
        if (5.0..=300.0).contains(&self.bpm) {
            ctx.bpm = self.bpm;
        } else {
            warn!(bpm = self.bpm, "bpm out of range, using default");
        }
        if self.stream_ms > 0.0 {
            ctx.stream_ms = self.stream_ms;
        }
        ctx.amp = self.amp;
        ctx
    }
}
