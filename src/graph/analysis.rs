use tracing::{debug, info};

use crate::context::AudioContext;
use crate::dsp::fft::{Fft, DEFAULT_FFT_SIZE};
use crate::graph::{
    scale_output_ar, sum_inputs_ar, Capabilities, Node, NodeCore, NodeEvent, NodeId, ProcessCtx, TickTask,
};
use crate::impl_node_core;
use crate::io::SoundBuffer;
use crate::sequencing::timevalue::timevalue;

/*
Analysis and Capture
====================

Listener nodes pass their summed input straight through, so they can sit
inline in a chain, and watch it on the side:

  FftNode        per-tick transform of the last two cells; real and imag
                 halves in the left and right cells
  IfftNode       the inverse, reading an FftNode's left/right pair
  SpectrumNode   windowed magnitude spectrum every `interval` ms
  WaveNode       decimated scope buffer of the last `interval` ms
  RecNode        records into a buffer until stopped or timed out

Started with `Graph::start`, a listener is evaluated every tick after the
sinks even when nothing downstream pulls it.
*/

pub struct FftNode {
    core: NodeCore,
    fft: Fft,
    frame: Vec<f32>,
    prev: Vec<f32>,
}

impl FftNode {
    pub fn new(ctx: &AudioContext) -> Self {
        let n = ctx.cell_size();
        Self {
            core: NodeCore::audio(ctx).with_stereo(),
            fft: Fft::new(n * 2),
            frame: vec![0.0; n * 2],
            prev: vec![0.0; n],
        }
    }

    pub fn window(mut self, key: &str) -> Self {
        self.set_window(key);
        self
    }

    /// Unknown window keys are ignored and return false.
    pub fn set_window(&mut self, key: &str) -> bool {
        self.fft.set_window(key)
    }

    pub fn window_name(&self) -> Option<&str> {
        self.fft.window_name()
    }

    pub fn spectrum(&self) -> &[f32] {
        self.fft.spectrum()
    }

    pub fn real(&self) -> &[f32] {
        self.fft.real()
    }

    pub fn imag(&self) -> &[f32] {
        self.fft.imag()
    }
}

impl Node for FftNode {
    impl_node_core!();

    fn capabilities(&self) -> Capabilities {
        Capabilities::LISTENER
    }

    fn process(&mut self, ctx: &mut ProcessCtx<'_>) {
        sum_inputs_ar(&mut self.core, ctx);
        let n = self.core.cell.len();
        self.frame[..n].copy_from_slice(&self.prev);
        self.frame[n..].copy_from_slice(&self.core.cell);
        self.prev.copy_from_slice(&self.core.cell);

        let (real, imag) = self.fft.forward(&self.frame);
        if let Some(stereo) = &mut self.core.stereo {
            stereo.left.copy_from_slice(&real[..n]);
            stereo.right.copy_from_slice(&imag[..n]);
        }
    }
}

/// Resynthesises the output of an `FftNode`. Silent until a source is set.
pub struct IfftNode {
    core: NodeCore,
    fft: Fft,
    source: Option<NodeId>,
    real: Vec<f32>,
    imag: Vec<f32>,
}

impl IfftNode {
    pub fn new(ctx: &AudioContext) -> Self {
        let n = ctx.cell_size() * 2;
        Self {
            core: NodeCore::audio(ctx),
            fft: Fft::new(n),
            source: None,
            real: vec![0.0; n],
            imag: vec![0.0; n],
        }
    }

    pub fn source(mut self, fft: NodeId) -> Self {
        self.source = Some(fft);
        self
    }

    pub fn set_source(&mut self, fft: Option<NodeId>) {
        self.source = fft;
    }
}

impl Node for IfftNode {
    impl_node_core!();

    fn dependencies(&self) -> Vec<NodeId> {
        self.source.into_iter().collect()
    }

    fn process(&mut self, ctx: &mut ProcessCtx<'_>) {
        let Some(source) = self.source else {
            return;
        };
        let n = self.core.cell.len();
        let (real, imag) = ctx.pull_stereo(source);
        self.real[..n].copy_from_slice(&real[..n]);
        self.imag[..n].copy_from_slice(&imag[..n]);

        let out = self.fft.inverse(&self.real, &self.imag);
        self.core.cell.copy_from_slice(&out[..n]);
        scale_output_ar(&mut self.core);
    }
}

/// Magnitude spectrum of `size` samples taken every `interval` ms. Emits
/// `NodeEvent::Fft` when a frame is ready.
pub struct SpectrumNode {
    core: NodeCore,
    fft: Fft,
    buffer: Vec<f32>,
    interval: f64,
    samples: i64,
    samples_incr: i64,
    write_index: usize,
    collecting: bool,
    samplerate: f64,
}

impl SpectrumNode {
    pub fn new(ctx: &AudioContext) -> Self {
        let mut node = Self {
            core: NodeCore::audio(ctx),
            fft: Fft::new(DEFAULT_FFT_SIZE),
            buffer: vec![0.0; DEFAULT_FFT_SIZE],
            interval: 500.0,
            samples: 0,
            samples_incr: 0,
            write_index: 0,
            collecting: false,
            samplerate: ctx.sample_rate_f64(),
        };
        node.set_interval(500.0);
        node
    }

    /// Frame size, clamped to 256..=2048 and rounded up to a power of two.
    pub fn size(mut self, size: usize) -> Self {
        let window = self.fft.window_name().map(str::to_string);
        self.fft = Fft::new(size.clamp(256, 2048));
        if let Some(key) = window {
            self.fft.set_window(&key);
        }
        self.buffer = vec![0.0; self.fft.len()];
        self.set_interval(self.interval);
        self
    }

    pub fn window(mut self, key: &str) -> Self {
        self.set_window(key);
        self
    }

    pub fn interval(mut self, ms: f64) -> Self {
        self.set_interval(ms);
        self
    }

    pub fn set_window(&mut self, key: &str) -> bool {
        self.fft.set_window(key)
    }

    /// Non-positive intervals are ignored. Intervals shorter than one frame
    /// are raised to one frame.
    pub fn set_interval(&mut self, ms: f64) {
        if ms <= 0.0 {
            return;
        }
        let frame = self.buffer.len() as i64;
        let incr = (ms * 0.001 * self.samplerate) as i64;
        if incr < frame {
            self.samples_incr = frame;
            self.interval = frame as f64 * 1000.0 / self.samplerate;
        } else {
            self.samples_incr = incr;
            self.interval = ms;
        }
    }

    pub fn set_interval_str(&mut self, text: &str, ctx: &AudioContext) {
        self.set_interval(timevalue(text, ctx));
    }

    pub fn interval_ms(&self) -> f64 {
        self.interval
    }

    pub fn frame_size(&self) -> usize {
        self.buffer.len()
    }

    pub fn spectrum(&self) -> &[f32] {
        self.fft.spectrum()
    }

    pub fn real(&self) -> &[f32] {
        self.fft.real()
    }

    pub fn imag(&self) -> &[f32] {
        self.fft.imag()
    }
}

impl Node for SpectrumNode {
    impl_node_core!();

    fn capabilities(&self) -> Capabilities {
        Capabilities::LISTENER | Capabilities::BANG
    }

    fn process(&mut self, ctx: &mut ProcessCtx<'_>) {
        sum_inputs_ar(&mut self.core, ctx);
        let mut ready = false;
        for &x in &self.core.cell {
            if self.samples <= 0 && !self.collecting {
                self.collecting = true;
                self.write_index = 0;
                self.samples += self.samples_incr;
            }
            if self.collecting {
                self.buffer[self.write_index] = x;
                self.write_index += 1;
                if self.write_index >= self.buffer.len() {
                    self.fft.forward(&self.buffer);
                    self.collecting = false;
                    ready = true;
                }
            }
            self.samples -= 1;
        }
        scale_output_ar(&mut self.core);
        if ready {
            ctx.emit(NodeEvent::Fft);
        }
    }

    /// Start a new frame now.
    fn bang(&mut self, _ctx: &mut ProcessCtx<'_>, _arg: Option<f64>) {
        self.samples = 0;
        self.write_index = 0;
        self.collecting = false;
    }
}

/// Scope capture: keeps `size` points spread over the last `interval` ms.
pub struct WaveNode {
    core: NodeCore,
    buffer: Vec<f32>,
    interval: f64,
    samples: f64,
    samples_incr: f64,
    write_index: usize,
    samplerate: f64,
}

impl WaveNode {
    pub fn new(ctx: &AudioContext) -> Self {
        let mut node = Self {
            core: NodeCore::audio(ctx),
            buffer: vec![0.0; 1024],
            interval: 1000.0,
            samples: 0.0,
            samples_incr: 1.0,
            write_index: 0,
            samplerate: ctx.sample_rate_f64(),
        };
        node.set_interval(1000.0);
        node
    }

    /// Point count, clamped to 64..=2048 and rounded up to a power of two.
    pub fn size(mut self, size: usize) -> Self {
        self.buffer = vec![0.0; size.clamp(64, 2048).next_power_of_two()];
        self.write_index = 0;
        self.set_interval(self.interval);
        self
    }

    pub fn interval(mut self, ms: f64) -> Self {
        self.set_interval(ms);
        self
    }

    /// Non-positive intervals are ignored.
    pub fn set_interval(&mut self, ms: f64) {
        if ms > 0.0 {
            self.interval = ms;
            self.samples_incr = (ms * 0.001 * self.samplerate / self.buffer.len() as f64).max(1.0);
        }
    }

    pub fn set_interval_str(&mut self, text: &str, ctx: &AudioContext) {
        self.set_interval(timevalue(text, ctx));
    }

    pub fn interval_ms(&self) -> f64 {
        self.interval
    }

    /// Captured points, oldest first.
    pub fn wave(&self) -> Vec<f32> {
        let mask = self.buffer.len() - 1;
        (0..self.buffer.len())
            .map(|i| self.buffer[(self.write_index + i) & mask])
            .collect()
    }
}

impl Node for WaveNode {
    impl_node_core!();

    fn capabilities(&self) -> Capabilities {
        Capabilities::LISTENER | Capabilities::BANG
    }

    fn process(&mut self, ctx: &mut ProcessCtx<'_>) {
        sum_inputs_ar(&mut self.core, ctx);
        let mask = self.buffer.len() - 1;
        for &x in &self.core.cell {
            if self.samples <= 0.0 {
                self.buffer[self.write_index] = x;
                self.write_index = (self.write_index + 1) & mask;
                self.samples += self.samples_incr;
            }
            self.samples -= 1.0;
        }
        scale_output_ar(&mut self.core);
    }

    /// Clear the capture.
    fn bang(&mut self, _ctx: &mut ProcessCtx<'_>, _arg: Option<f64>) {
        self.buffer.fill(0.0);
        self.samples = 0.0;
        self.write_index = 0;
    }
}

/// Records its input while started. Stopping, or reaching `timeout` ms,
/// emits `NodeEvent::Recorded` with what was captured.
pub struct RecNode {
    core: NodeCore,
    timeout: f64,
    samplerate: u32,
    system_rate: f64,
    buffer: Vec<f32>,
    write_index: f64,
    write_incr: f64,
    current_time: f64,
    recording: bool,
    finishing: bool,
}

impl RecNode {
    pub fn new(ctx: &AudioContext) -> Self {
        Self {
            core: NodeCore::audio(ctx),
            timeout: 5000.0,
            samplerate: ctx.sample_rate(),
            system_rate: ctx.sample_rate_f64(),
            buffer: Vec::new(),
            write_index: 0.0,
            write_incr: 1.0,
            current_time: 0.0,
            recording: false,
            finishing: false,
        }
    }

    pub fn timeout(mut self, ms: f64) -> Self {
        self.set_timeout(ms);
        self
    }

    pub fn samplerate(mut self, samplerate: u32) -> Self {
        self.set_samplerate(samplerate);
        self
    }

    /// Non-positive timeouts are ignored.
    pub fn set_timeout(&mut self, ms: f64) {
        if ms > 0.0 {
            self.timeout = ms;
        }
    }

    pub fn set_timeout_str(&mut self, text: &str, ctx: &AudioContext) {
        self.set_timeout(timevalue(text, ctx));
    }

    /// Recording rate. Must be positive and no higher than the system rate.
    pub fn set_samplerate(&mut self, samplerate: u32) {
        if samplerate > 0 && samplerate as f64 <= self.system_rate {
            self.samplerate = samplerate;
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    fn finish(&mut self, ctx: &mut ProcessCtx<'_>) {
        let len = (self.write_index as usize).min(self.buffer.len());
        let samples = self.buffer[..len].to_vec();
        info!(node = %ctx.id(), samples = len, ms = self.current_time, "recording finished");
        self.recording = false;
        self.finishing = false;
        self.write_index = 0.0;
        self.current_time = 0.0;
        ctx.emit(NodeEvent::Recorded(SoundBuffer::new(samples, self.samplerate)));
    }
}

impl Node for RecNode {
    impl_node_core!();

    fn capabilities(&self) -> Capabilities {
        Capabilities::LISTENER | Capabilities::BANG
    }

    fn process(&mut self, ctx: &mut ProcessCtx<'_>) {
        sum_inputs_ar(&mut self.core, ctx);
        if self.recording && !self.finishing {
            let time_incr = 1000.0 / self.system_rate;
            for &x in &self.core.cell {
                if let Some(slot) = self.buffer.get_mut(self.write_index as usize) {
                    *slot = x;
                }
                self.write_index += self.write_incr;
                self.current_time += time_incr;
                if self.current_time >= self.timeout {
                    self.finishing = true;
                    let node = ctx.id();
                    ctx.defer(TickTask::Unlisten(node));
                    break;
                }
            }
        }
        scale_output_ar(&mut self.core);
    }

    fn on_start(&mut self, ctx: &mut ProcessCtx<'_>) -> bool {
        if self.recording {
            return true;
        }
        let len = (self.timeout * 0.001 * self.samplerate as f64).ceil() as usize + 1;
        if self.buffer.len() < len {
            self.buffer = vec![0.0; len];
        }
        self.write_index = 0.0;
        self.write_incr = self.samplerate as f64 / self.system_rate;
        self.current_time = 0.0;
        self.recording = true;
        self.finishing = false;
        debug!(node = %ctx.id(), timeout = self.timeout, "recording started");
        true
    }

    fn on_stop(&mut self, ctx: &mut ProcessCtx<'_>) -> bool {
        if self.recording {
            self.finish(ctx);
        }
        true
    }

    /// Toggle recording.
    fn bang(&mut self, ctx: &mut ProcessCtx<'_>, _arg: Option<f64>) {
        let node = ctx.id();
        if self.recording {
            ctx.defer(TickTask::Unlisten(node));
        } else {
            ctx.defer(TickTask::Listen(node));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Graph, OscNode, ValueNode};

    fn ctx() -> AudioContext {
        AudioContext::builder().sample_rate(8000).cell_size(64).build()
    }

    fn argmax(xs: &[f32]) -> usize {
        xs.iter()
            .enumerate()
            .fold((0, f32::MIN), |best, (i, &x)| if x > best.1 { (i, x) } else { best })
            .0
    }

    #[test]
    fn fft_node_finds_the_bin_and_exposes_real_and_imag() {
        let ctx = ctx();
        let mut graph = Graph::new(&ctx);
        // bin 8 of a 128 point frame at 8 kHz
        let osc = graph.add(OscNode::sin(&ctx).freq(500.0));
        let fft = graph.add(FftNode::new(&ctx));
        graph.append(fft, osc).unwrap();
        graph.render(fft);
        graph.render(fft);

        let node = graph.get::<FftNode>(fft).unwrap();
        assert_eq!(argmax(node.spectrum()), 8);
        let (left, right) = graph.stereo_cells(fft);
        assert_eq!(left, &node.real()[..64]);
        assert_eq!(right, &node.imag()[..64]);
        assert_eq!(graph.cell(fft), graph.cell(osc), "the signal passes through");
    }

    #[test]
    fn ifft_is_silent_without_a_source() {
        let ctx = ctx();
        let mut graph = Graph::new(&ctx);
        let osc = graph.add(OscNode::sin(&ctx).freq(500.0));
        let fft = graph.add(FftNode::new(&ctx));
        graph.append(fft, osc).unwrap();

        let idle = graph.add(IfftNode::new(&ctx));
        assert!(graph.render(idle).iter().all(|&x| x == 0.0));

        let ifft = graph.add(IfftNode::new(&ctx).source(fft));
        graph.render(ifft);
        graph.render(ifft);
        assert!(graph.cell(ifft).iter().any(|&x| x.abs() > 0.01));
        assert!(graph.append(fft, ifft).is_err(), "source counts as a dependency");
    }

    #[test]
    fn spectrum_emits_once_per_frame() {
        let ctx = ctx();
        let mut graph = Graph::new(&ctx);
        let osc = graph.add(OscNode::sin(&ctx).freq(500.0));
        let spectrum = graph.add(SpectrumNode::new(&ctx).size(256).interval(10.0));
        assert_eq!(graph.get::<SpectrumNode>(spectrum).unwrap().interval_ms(), 32.0, "raised to one frame");
        graph.append(spectrum, osc).unwrap();
        graph.start(spectrum).unwrap();

        let sink = graph.add(ValueNode::new(&ctx, 0.0));
        for _ in 0..3 {
            graph.render(sink);
        }
        assert!(graph.drain_events().iter().all(|e| e.event != NodeEvent::Fft));
        graph.render(sink);
        assert!(graph.drain_events().iter().any(|e| e.node == spectrum && e.event == NodeEvent::Fft));
        assert_eq!(argmax(graph.get::<SpectrumNode>(spectrum).unwrap().spectrum()), 16);
    }

    #[test]
    fn wave_captures_and_clears() {
        let ctx = ctx();
        let mut graph = Graph::new(&ctx);
        let wave = graph.add(WaveNode::new(&ctx).size(64).interval(1.0));
        graph.append(wave, 0.5).unwrap();
        graph.render(wave);
        let points = graph.get::<WaveNode>(wave).unwrap().wave();
        assert_eq!(points.len(), 64);
        assert!(points.iter().all(|&x| x == 0.5));

        graph.bang(wave).unwrap();
        assert!(graph.get::<WaveNode>(wave).unwrap().wave().iter().all(|&x| x == 0.0));
    }

    #[test]
    fn rec_stops_itself_at_the_timeout() {
        let ctx = ctx();
        let mut graph = Graph::new(&ctx);
        let rec = graph.add(RecNode::new(&ctx).timeout(16.0));
        graph.append(rec, 0.25).unwrap();
        graph.start(rec).unwrap();
        assert!(graph.get::<RecNode>(rec).unwrap().is_recording());

        let sink = graph.add(ValueNode::new(&ctx, 0.0));
        for _ in 0..4 {
            graph.render(sink);
        }
        assert!(graph.listeners().is_empty());
        let recorded: Vec<_> = graph
            .drain_events()
            .into_iter()
            .filter_map(|e| match e.event {
                NodeEvent::Recorded(buffer) => Some(buffer),
                _ => None,
            })
            .collect();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].len(), 128);
        assert!(recorded[0].samples.iter().all(|&x| x == 0.25));
    }

    #[test]
    fn rec_bang_toggles_and_downsamples() {
        let ctx = ctx();
        let mut graph = Graph::new(&ctx);
        let rec = graph.add(RecNode::new(&ctx).samplerate(4000).samplerate(96000));
        graph.append(rec, 1.0).unwrap();
        graph.bang(rec).unwrap();
        assert_eq!(graph.listeners(), &[rec]);

        let sink = graph.add(ValueNode::new(&ctx, 0.0));
        graph.render(sink);
        graph.bang(rec).unwrap();
        assert!(graph.listeners().is_empty());

        let buffer = graph
            .drain_events()
            .into_iter()
            .find_map(|e| match e.event {
                NodeEvent::Recorded(buffer) => Some(buffer),
                _ => None,
            })
            .unwrap();
        assert_eq!(buffer.samplerate, 4000);
        assert_eq!(buffer.len(), 32);
    }
}
