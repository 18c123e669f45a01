use crate::context::AudioContext;
use crate::dsp::oscillator::Oscillator;
use crate::graph::{scale_output_ar, sum_inputs_ar, Capabilities, Node, NodeCore, NodeId, Param, ProcessCtx, Rate};
use crate::impl_node_core;

/*
Oscillator Nodes
================

OscNode reads a wavetable at a frequency taken from a parameter. The
frequency can be a constant, a control-rate node (one value per cell) or an
audio-rate node (one value per sample, for FM and vibrato).

Inputs are not mixed in. They are multiplied with the wave, so an envelope
appended to an oscillator works as its amplitude:

    cell[i] = Σinputs[i] * osc[i]        (no inputs: osc[i])

At control rate the oscillator produces one value per cell and advances by
a whole cell each tick. The "+" tables (+sin, +saw, ...) are unipolar and
meant for that use: slow LFOs feeding other parameters.

COscNode is a detuned pair. Two copies of the wave run `beats` Hz apart,
each at half amplitude, and the sum beats at that rate:

    osc1 = freq - beats/2        osc2 = freq + beats/2
*/

pub struct OscNode {
    core: NodeCore,
    osc: Oscillator,
    freq: Param,
    tmp: Vec<f32>,
    freqs: Vec<f32>,
}

impl OscNode {
    pub fn new(ctx: &AudioContext) -> Self {
        let mut osc = Oscillator::new(ctx);
        osc.step = ctx.cell_size();
        Self {
            core: NodeCore::new(ctx),
            osc,
            freq: Param::Value(440.0),
            tmp: vec![0.0; ctx.cell_size()],
            freqs: vec![0.0; ctx.cell_size()],
        }
    }

    pub fn sin(ctx: &AudioContext) -> Self {
        Self::new(ctx).wave("sin")
    }

    pub fn cos(ctx: &AudioContext) -> Self {
        Self::new(ctx).wave("cos")
    }

    pub fn pulse(ctx: &AudioContext) -> Self {
        Self::new(ctx).wave("pulse")
    }

    pub fn tri(ctx: &AudioContext) -> Self {
        Self::new(ctx).wave("tri")
    }

    pub fn saw(ctx: &AudioContext) -> Self {
        Self::new(ctx).wave("saw")
    }

    pub fn fami(ctx: &AudioContext) -> Self {
        Self::new(ctx).wave("fami")
    }

    pub fn konami(ctx: &AudioContext) -> Self {
        Self::new(ctx).wave("konami")
    }

    /// Unipolar sine at control rate.
    pub fn lfo_sin(ctx: &AudioContext) -> Self {
        Self::new(ctx).wave("+sin").kr()
    }

    pub fn lfo_pulse(ctx: &AudioContext) -> Self {
        Self::new(ctx).wave("+pulse").kr()
    }

    pub fn lfo_tri(ctx: &AudioContext) -> Self {
        Self::new(ctx).wave("+tri").kr()
    }

    pub fn lfo_saw(ctx: &AudioContext) -> Self {
        Self::new(ctx).wave("+saw").kr()
    }

    pub fn wave(mut self, key: &str) -> Self {
        self.set_wave(key);
        self
    }

    pub fn freq(mut self, freq: impl Into<Param>) -> Self {
        self.set_freq(freq);
        self
    }

    pub fn kr(mut self) -> Self {
        self.core.set_rate(Rate::Control);
        self
    }

    /// Unknown names keep the current table and return `false`.
    pub fn set_wave(&mut self, key: &str) -> bool {
        self.osc.set_wave(key)
    }

    pub fn set_freq(&mut self, freq: impl Into<Param>) {
        self.freq = freq.into();
    }

    /// Frequency given as a period ("500ms", "bpm120 l4"). Non-positive
    /// periods are ignored.
    pub fn set_period(&mut self, text: &str, ctx: &AudioContext) {
        if let Some(freq) = Param::period(text, ctx) {
            self.freq = freq;
        }
    }

    pub fn freq_param(&self) -> Param {
        self.freq
    }

    pub fn oscillator(&self) -> &Oscillator {
        &self.osc
    }
}

impl Node for OscNode {
    impl_node_core!();

    fn capabilities(&self) -> Capabilities {
        Capabilities::BANG
    }

    fn dependencies(&self) -> Vec<NodeId> {
        self.freq.node().into_iter().collect()
    }

    fn process(&mut self, ctx: &mut ProcessCtx<'_>) {
        if self.core.inputs.is_empty() {
            self.core.cell.fill(1.0);
        } else {
            sum_inputs_ar(&mut self.core, ctx);
        }

        if self.core.is_ar() {
            match self.freq {
                Param::Node(id) if ctx.is_ar(id) => {
                    let src = ctx.pull_cell(id);
                    let n = self.freqs.len();
                    self.freqs.copy_from_slice(&src[..n]);
                    self.osc.process_with_freqs(&mut self.tmp, &self.freqs);
                }
                freq => {
                    self.osc.frequency = ctx.param(freq) as f64;
                    self.osc.process(&mut self.tmp);
                }
            }
            for (x, &y) in self.core.cell.iter_mut().zip(&self.tmp) {
                *x *= y;
            }
        } else {
            self.osc.frequency = ctx.param(self.freq) as f64;
            let value = self.osc.next();
            self.core.cell.fill(value);
        }

        scale_output_ar(&mut self.core);
    }

    /// Restart the cycle.
    fn bang(&mut self, _ctx: &mut ProcessCtx<'_>, _arg: Option<f64>) {
        self.osc.reset();
    }
}

pub struct COscNode {
    core: NodeCore,
    osc1: Oscillator,
    osc2: Oscillator,
    freq: Param,
    beats: f64,
    tmp: Vec<f32>,
}

impl COscNode {
    pub fn new(ctx: &AudioContext) -> Self {
        Self {
            core: NodeCore::audio(ctx),
            osc1: Oscillator::new(ctx),
            osc2: Oscillator::new(ctx),
            freq: Param::Value(440.0),
            beats: 0.5,
            tmp: vec![0.0; ctx.cell_size()],
        }
    }

    pub fn wave(mut self, key: &str) -> Self {
        self.set_wave(key);
        self
    }

    pub fn freq(mut self, freq: impl Into<Param>) -> Self {
        self.freq = freq.into();
        self
    }

    pub fn set_wave(&mut self, key: &str) -> bool {
        self.osc1.set_wave(key) && self.osc2.set_wave(key)
    }

    pub fn set_freq(&mut self, freq: impl Into<Param>) {
        self.freq = freq.into();
    }

    pub fn set_period(&mut self, text: &str, ctx: &AudioContext) {
        if let Some(freq) = Param::period(text, ctx) {
            self.freq = freq;
        }
    }

    pub fn beats(&self) -> f64 {
        self.beats
    }

    /// Non-positive values are ignored.
    pub fn set_beats(&mut self, beats: f64) {
        if beats > 0.0 {
            self.beats = beats;
        }
    }
}

impl Node for COscNode {
    impl_node_core!();

    fn capabilities(&self) -> Capabilities {
        Capabilities::BANG
    }

    fn dependencies(&self) -> Vec<NodeId> {
        self.freq.node().into_iter().collect()
    }

    fn process(&mut self, ctx: &mut ProcessCtx<'_>) {
        let freq = ctx.param(self.freq) as f64;
        let half = self.beats * 0.5;

        self.osc1.frequency = freq - half;
        self.osc1.process(&mut self.tmp);
        for (x, &y) in self.core.cell.iter_mut().zip(&self.tmp) {
            *x = y * 0.5;
        }

        self.osc2.frequency = freq + half;
        self.osc2.process(&mut self.tmp);
        for (x, &y) in self.core.cell.iter_mut().zip(&self.tmp) {
            *x += y * 0.5;
        }

        scale_output_ar(&mut self.core);
    }

    fn bang(&mut self, _ctx: &mut ProcessCtx<'_>, _arg: Option<f64>) {
        self.osc1.reset();
        self.osc2.reset();
    }
}
