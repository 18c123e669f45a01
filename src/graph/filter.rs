use crate::context::AudioContext;
use crate::dsp::biquad::{Biquad, BiquadType};
use crate::graph::{scale_output_ar, sum_inputs_ar, Node, NodeCore, NodeId, Param, ProcessCtx};
use crate::impl_node_core;

/*
Biquad Filter Node
==================

Second-order filter over the sum of the inputs. Frequency, Q and gain are
parameters, so any of them can follow another node (an envelope sweeping
the cutoff, an LFO wobbling Q). Each is read once per tick and the
coefficients are redesigned only when one of the three actually moved.

Types
-----

  lowpass   lpf        passes below freq
  highpass  hpf        passes above freq
  bandpass  bpf        passes around freq, width set by Q
  lowshelf             boosts or cuts below freq by gain dB
  highshelf            boosts or cuts above freq by gain dB
  peaking   peak       bell around freq, gain dB
  notch     bef, brf   removes a band around freq
  allpass   apf        flat magnitude, phase shift around freq

Defaults: freq 340 Hz, Q 1, gain 0 dB.
*/

pub struct BiquadNode {
    core: NodeCore,
    biquad: Biquad,
    freq: Param,
    q: Param,
    gain: Param,
    prev: Option<(f32, f32, f32)>,
}

impl BiquadNode {
    pub fn new(ctx: &AudioContext, kind: BiquadType) -> Self {
        Self {
            core: NodeCore::audio(ctx),
            biquad: Biquad::new(kind, ctx.sample_rate_f64()),
            freq: Param::Value(340.0),
            q: Param::Value(1.0),
            gain: Param::Value(0.0),
            prev: None,
        }
    }

    /// Build from a type name or alias. `None` for unknown names.
    pub fn named(ctx: &AudioContext, name: &str) -> Option<Self> {
        BiquadType::parse(name).map(|kind| Self::new(ctx, kind))
    }

    pub fn lowpass(ctx: &AudioContext) -> Self {
        Self::new(ctx, BiquadType::LowPass)
    }

    pub fn highpass(ctx: &AudioContext) -> Self {
        Self::new(ctx, BiquadType::HighPass)
    }

    pub fn bandpass(ctx: &AudioContext) -> Self {
        Self::new(ctx, BiquadType::BandPass)
    }

    pub fn notch(ctx: &AudioContext) -> Self {
        Self::new(ctx, BiquadType::Notch)
    }

    pub fn freq(mut self, freq: impl Into<Param>) -> Self {
        self.freq = freq.into();
        self
    }

    pub fn q(mut self, q: impl Into<Param>) -> Self {
        self.q = q.into();
        self
    }

    pub fn gain(mut self, gain: impl Into<Param>) -> Self {
        self.gain = gain.into();
        self
    }

    pub fn set_freq(&mut self, freq: impl Into<Param>) {
        self.freq = freq.into();
    }

    pub fn set_q(&mut self, q: impl Into<Param>) {
        self.q = q.into();
    }

    pub fn set_gain(&mut self, gain: impl Into<Param>) {
        self.gain = gain.into();
    }

    pub fn kind(&self) -> BiquadType {
        self.biquad.kind()
    }

    pub fn set_kind(&mut self, kind: BiquadType) {
        self.biquad.set_kind(kind);
    }

    pub fn biquad(&self) -> &Biquad {
        &self.biquad
    }
}

impl Node for BiquadNode {
    impl_node_core!();

    fn dependencies(&self) -> Vec<NodeId> {
        [self.freq, self.q, self.gain].iter().filter_map(|p| p.node()).collect()
    }

    fn process(&mut self, ctx: &mut ProcessCtx<'_>) {
        sum_inputs_ar(&mut self.core, ctx);

        let params = (ctx.param(self.freq), ctx.param(self.q), ctx.param(self.gain));
        if self.prev != Some(params) {
            self.prev = Some(params);
            let (freq, q, gain) = params;
            self.biquad.set_params(freq as f64, q as f64, gain as f64);
        }

        self.biquad.process(&mut self.core.cell);
        scale_output_ar(&mut self.core);
    }
}
