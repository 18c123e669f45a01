use std::sync::Arc;

use crate::context::AudioContext;
use crate::graph::{Capabilities, Node, NodeCore, NodeEvent, NodeId, Param, ProcessCtx};
use crate::impl_node_core;
use crate::io::SoundBuffer;

/// Plays a sample buffer at its own rate, scaled by `pitch`. Ends with
/// silence when it runs off either end unless looped.
pub struct BufferNode {
    core: NodeCore,
    samples: Arc<[f32]>,
    samplerate: f64,
    system_rate: f64,
    pitch: Param,
    looped: bool,
    reversed: bool,
    phase: f64,
    phase_incr: f64,
    duration: f64,
    current_time: f64,
    current_time_incr: f64,
}

impl BufferNode {
    pub fn new(ctx: &AudioContext) -> Self {
        Self {
            core: NodeCore::audio(ctx),
            samples: Vec::<f32>::new().into(),
            samplerate: 44100.0,
            system_rate: ctx.sample_rate_f64(),
            pitch: Param::Value(1.0),
            looped: false,
            reversed: false,
            phase: 0.0,
            phase_incr: 0.0,
            duration: 0.0,
            current_time: 0.0,
            current_time_incr: ctx.cell_ms(),
        }
    }

    pub fn with_buffer(ctx: &AudioContext, buffer: &SoundBuffer) -> Self {
        let mut node = Self::new(ctx);
        node.set_buffer(buffer);
        node
    }

    pub fn pitch(mut self, pitch: impl Into<Param>) -> Self {
        self.pitch = pitch.into();
        self
    }

    pub fn looped(mut self, looped: bool) -> Self {
        self.looped = looped;
        self
    }

    pub fn reverse(mut self, reversed: bool) -> Self {
        self.set_reversed(reversed);
        self
    }

    /// Load a buffer and rewind. The samples are shared, not copied.
    pub fn set_buffer(&mut self, buffer: &SoundBuffer) {
        self.load(Arc::clone(&buffer.samples), buffer.samplerate as f64);
    }

    fn load(&mut self, samples: Arc<[f32]>, samplerate: f64) {
        if samplerate > 0.0 {
            self.samplerate = samplerate;
        }
        self.samples = samples;
        self.phase = 0.0;
        self.phase_incr = self.samplerate / self.system_rate;
        self.duration = self.samples.len() as f64 * 1000.0 / self.samplerate;
        self.current_time = 0.0;
        self.set_reversed(self.reversed);
    }

    pub fn set_pitch(&mut self, pitch: impl Into<Param>) {
        self.pitch = pitch.into();
    }

    pub fn set_looped(&mut self, looped: bool) {
        self.looped = looped;
    }

    pub fn set_reversed(&mut self, reversed: bool) {
        self.reversed = reversed;
        if reversed {
            self.phase_incr = -self.phase_incr.abs();
            if self.phase == 0.0 && !self.samples.is_empty() {
                self.phase = self.samples.len() as f64 + self.phase_incr;
            }
        } else {
            self.phase_incr = self.phase_incr.abs();
        }
    }

    /// Flip the playback direction.
    pub fn toggle_reversed(&mut self) {
        self.set_reversed(!self.reversed);
    }

    pub fn is_looped(&self) -> bool {
        self.looped
    }

    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn samplerate(&self) -> f64 {
        self.samplerate
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    /// Seek. Times outside `0..=duration` are ignored.
    pub fn set_current_time(&mut self, ms: f64) {
        if (0.0..=self.duration).contains(&ms) {
            self.phase = ms * 0.001 * self.samplerate;
            self.current_time = ms;
        }
    }

    /// A fresh player over the same samples with the same flags.
    pub fn clone_node(&self, ctx: &AudioContext) -> Self {
        let mut node = Self::new(ctx).looped(self.looped);
        node.reversed = self.reversed;
        node.load(Arc::clone(&self.samples), self.samplerate);
        node
    }

    /// A player over `begin..end` ms of this one. A reversed range plays
    /// backwards.
    pub fn slice(&self, ctx: &AudioContext, begin: f64, end: Option<f64>) -> Self {
        let len = self.samples.len();
        let to_index = |ms: f64| ((ms * 0.001 * self.samplerate) as usize).min(len);
        let mut begin = to_index(begin.max(0.0));
        let mut end = end.map_or(len, |ms| to_index(ms.max(0.0)));
        let mut reversed = self.reversed;
        if begin > end {
            std::mem::swap(&mut begin, &mut end);
            reversed = !reversed;
        }
        let mut node = Self::new(ctx).looped(self.looped);
        node.reversed = reversed;
        node.load(Arc::from(&self.samples[begin..end]), self.samplerate);
        node
    }

    fn rewind(&mut self) {
        self.phase = if self.reversed {
            self.samples.len() as f64 + self.phase_incr
        } else {
            0.0
        };
        self.current_time = 0.0;
    }
}

impl Node for BufferNode {
    impl_node_core!();

    fn capabilities(&self) -> Capabilities {
        Capabilities::BANG
    }

    fn dependencies(&self) -> Vec<NodeId> {
        self.pitch.node().into_iter().collect()
    }

    fn process(&mut self, ctx: &mut ProcessCtx<'_>) {
        if self.core.ended || self.samples.is_empty() {
            return;
        }
        let pitch = ctx.param(self.pitch) as f64;
        let incr = self.phase_incr * pitch;
        let len = self.samples.len() as f64;
        let (mul, add) = (self.core.mul, self.core.add);
        for x in self.core.cell.iter_mut() {
            let sample = if 0.0 <= self.phase && self.phase < len {
                self.samples[self.phase as usize]
            } else {
                0.0
            };
            *x = sample * mul + add;
            self.phase += incr;
        }
        self.current_time += self.current_time_incr;

        if self.phase >= len || self.phase < 0.0 {
            if self.looped {
                self.phase = if self.phase >= len { 0.0 } else { len + self.phase_incr };
                ctx.emit(NodeEvent::Looped);
            } else {
                ctx.end(Some(0.0));
            }
        }
    }

    /// Rewind and play again. Reversed buffers start from the end.
    fn bang(&mut self, _ctx: &mut ProcessCtx<'_>, _arg: Option<f64>) {
        self.rewind();
        self.core.ended = false;
    }
}
