use crate::context::AudioContext;
use crate::dsp::distortion::{Distortion, DEFAULT_POST_GAIN, DEFAULT_PRE_GAIN};
use crate::graph::{scale_output_ar, sum_inputs_ar, Node, NodeCore, NodeId, Param, ProcessCtx};
use crate::impl_node_core;

/*
Distortion Node
===============

Hard clipping with gain staging in dB:

    x * 2^(-pre/6) * 2^(-post/6)   clamped to ±2^(-post/6)

The default pre -60 / post 18 boosts the signal by about 42 dB and caps it
at one eighth of full scale, which squares off almost anything. A positive
cutoff runs the clipped signal through a lowpass inside the clipper to tame
the fizz.
*/

pub struct DistNode {
    core: NodeCore,
    dist: Distortion,
    pre_gain: Param,
    post_gain: Param,
}

impl DistNode {
    pub fn new(ctx: &AudioContext) -> Self {
        Self {
            core: NodeCore::audio(ctx),
            dist: Distortion::new(ctx.sample_rate()),
            pre_gain: Param::Value(DEFAULT_PRE_GAIN as f32),
            post_gain: Param::Value(DEFAULT_POST_GAIN as f32),
        }
    }

    pub fn pre_gain(mut self, db: impl Into<Param>) -> Self {
        self.pre_gain = db.into();
        self
    }

    pub fn post_gain(mut self, db: impl Into<Param>) -> Self {
        self.post_gain = db.into();
        self
    }

    pub fn cutoff(mut self, hz: f64) -> Self {
        self.dist.set_cutoff(hz);
        self
    }

    pub fn set_pre_gain(&mut self, db: impl Into<Param>) {
        self.pre_gain = db.into();
    }

    pub fn set_post_gain(&mut self, db: impl Into<Param>) {
        self.post_gain = db.into();
    }

    /// Non-positive values are ignored.
    pub fn set_cutoff(&mut self, hz: f64) {
        self.dist.set_cutoff(hz);
    }

    pub fn cutoff_hz(&self) -> f64 {
        self.dist.cutoff()
    }
}

impl Node for DistNode {
    impl_node_core!();

    fn dependencies(&self) -> Vec<NodeId> {
        [self.pre_gain, self.post_gain].iter().filter_map(|p| p.node()).collect()
    }

    fn process(&mut self, ctx: &mut ProcessCtx<'_>) {
        sum_inputs_ar(&mut self.core, ctx);
        let pre = ctx.param(self.pre_gain) as f64;
        let post = ctx.param(self.post_gain) as f64;
        self.dist.set_gains(pre, post);
        self.dist.process(&mut self.core.cell);
        scale_output_ar(&mut self.core);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;

    #[test]
    fn clips_to_the_post_gain_ceiling() {
        let ctx = AudioContext::builder().sample_rate(8000).cell_size(32).build();
        let mut graph = Graph::new(&ctx);
        let dist = graph.add(DistNode::new(&ctx));
        graph.append(dist, 0.5).unwrap();
        assert!(graph.render(dist).iter().all(|&x| (x - 0.125).abs() < 1e-4));

        let quiet = graph.add(DistNode::new(&ctx).pre_gain(0.0).post_gain(0.0));
        graph.append(quiet, 0.5).unwrap();
        assert!(graph.render(quiet).iter().all(|&x| (x - 0.5).abs() < 1e-6));
    }

    #[test]
    fn cutoff_rejects_non_positive() {
        let ctx = AudioContext::default();
        let mut node = DistNode::new(&ctx).cutoff(2000.0);
        node.set_cutoff(-1.0);
        assert_eq!(node.cutoff_hz(), 2000.0);
    }
}
