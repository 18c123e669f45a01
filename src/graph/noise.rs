use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::context::AudioContext;
use crate::dsp::noise::{Lfsr, LfsrMode, PinkNoise};
use crate::dsp::pluck::Pluck;
use crate::graph::{scale_output_ar, Capabilities, Node, NodeCore, NodeId, Param, ProcessCtx, Rate};
use crate::impl_node_core;

/// Uniform white noise in [-1, 1). At control rate one value per cell.
pub struct NoiseNode {
    core: NodeCore,
    rng: StdRng,
}

impl NoiseNode {
    pub fn new(ctx: &AudioContext) -> Self {
        Self::with_rng(ctx, StdRng::from_entropy())
    }

    pub fn seeded(ctx: &AudioContext, seed: u64) -> Self {
        Self::with_rng(ctx, StdRng::seed_from_u64(seed))
    }

    fn with_rng(ctx: &AudioContext, rng: StdRng) -> Self {
        Self {
            core: NodeCore::new(ctx),
            rng,
        }
    }

    pub fn kr(mut self) -> Self {
        self.core.set_rate(Rate::Control);
        self
    }
}

impl Node for NoiseNode {
    impl_node_core!();

    fn process(&mut self, _ctx: &mut ProcessCtx<'_>) {
        let (mul, add) = (self.core.mul, self.core.add);
        if self.core.is_ar() {
            for x in self.core.cell.iter_mut() {
                *x = (self.rng.gen::<f32>() * 2.0 - 1.0) * mul + add;
            }
        } else {
            let x = (self.rng.gen::<f32>() * 2.0 - 1.0) * mul + add;
            self.core.cell.fill(x);
        }
    }
}

/// Voss-McCartney pink noise.
pub struct PinkNoiseNode {
    core: NodeCore,
    pink: PinkNoise,
}

impl PinkNoiseNode {
    pub fn new(ctx: &AudioContext) -> Self {
        Self {
            core: NodeCore::audio(ctx),
            pink: PinkNoise::new(),
        }
    }

    pub fn seeded(ctx: &AudioContext, seed: u64) -> Self {
        Self {
            core: NodeCore::audio(ctx),
            pink: PinkNoise::seeded(seed),
        }
    }
}

impl Node for PinkNoiseNode {
    impl_node_core!();

    fn process(&mut self, _ctx: &mut ProcessCtx<'_>) {
        self.pink.render(&mut self.core.cell);
        scale_output_ar(&mut self.core);
    }
}

/// Chip-style noise from a 16-bit shift register clocked at `freq`. The
/// short mode taps a shorter feedback path and sounds metallic.
pub struct FNoiseNode {
    core: NodeCore,
    lfsr: Lfsr,
    freq: Param,
    sample_rate: f64,
}

impl FNoiseNode {
    pub fn new(ctx: &AudioContext) -> Self {
        Self {
            core: NodeCore::audio(ctx),
            lfsr: Lfsr::new(),
            freq: Param::Value(440.0),
            sample_rate: ctx.sample_rate_f64(),
        }
    }

    pub fn freq(mut self, freq: impl Into<Param>) -> Self {
        self.freq = freq.into();
        self
    }

    pub fn short(mut self, short: bool) -> Self {
        self.set_short(short);
        self
    }

    pub fn set_freq(&mut self, freq: impl Into<Param>) {
        self.freq = freq.into();
    }

    pub fn set_short(&mut self, short: bool) {
        self.lfsr.mode = if short { LfsrMode::Short } else { LfsrMode::Long };
    }

    pub fn is_short(&self) -> bool {
        self.lfsr.mode == LfsrMode::Short
    }
}

impl Node for FNoiseNode {
    impl_node_core!();

    fn dependencies(&self) -> Vec<NodeId> {
        self.freq.node().into_iter().collect()
    }

    fn process(&mut self, ctx: &mut ProcessCtx<'_>) {
        let step = ctx.param(self.freq) as f64 / self.sample_rate;
        self.lfsr.render(&mut self.core.cell, step);
        scale_output_ar(&mut self.core);
    }
}

/// Plucked string. Silent until banged; every bang re-excites the string
/// at the current frequency.
pub struct PluckNode {
    core: NodeCore,
    pluck: Pluck,
    freq: Param,
}

impl PluckNode {
    pub fn new(ctx: &AudioContext) -> Self {
        Self::with_pluck(ctx, Pluck::new())
    }

    pub fn seeded(ctx: &AudioContext, seed: u64) -> Self {
        Self::with_pluck(ctx, Pluck::seeded(seed))
    }

    fn with_pluck(ctx: &AudioContext, pluck: Pluck) -> Self {
        Self {
            core: NodeCore::audio(ctx),
            pluck,
            freq: Param::Value(440.0),
        }
    }

    pub fn freq(mut self, freq: impl Into<Param>) -> Self {
        self.freq = freq.into();
        self
    }

    pub fn set_freq(&mut self, freq: impl Into<Param>) {
        self.freq = freq.into();
    }
}

impl Node for PluckNode {
    impl_node_core!();

    fn capabilities(&self) -> Capabilities {
        Capabilities::BANG
    }

    fn dependencies(&self) -> Vec<NodeId> {
        self.freq.node().into_iter().collect()
    }

    fn process(&mut self, _ctx: &mut ProcessCtx<'_>) {
        self.pluck.render(&mut self.core.cell);
        scale_output_ar(&mut self.core);
    }

    fn bang(&mut self, ctx: &mut ProcessCtx<'_>, _arg: Option<f64>) {
        let freq = ctx.param(self.freq) as f64;
        let sample_rate = ctx.context().sample_rate();
        self.pluck.pluck(freq, sample_rate);
    }
}
