use crate::context::AudioContext;
use crate::dsp::delay::DelayLine;
use crate::graph::{scale_output_ar, sum_inputs_ar, Capabilities, Node, NodeCore, NodeId, Param, ProcessCtx};
use crate::impl_node_core;
use crate::sequencing::timevalue::timevalue;

/// Longest accepted delay time in milliseconds (exclusive).
pub const MAX_DELAY_MS: f64 = 15000.0;

/// Feedback delay over the summed inputs. Time is fixed per setting;
/// feedback and wet can follow other nodes.
pub struct DelayNode {
    core: NodeCore,
    delay: DelayLine,
    time: f64,
    feedback: Param,
    wet: Param,
    prev: Option<(f32, f32)>,
}

impl DelayNode {
    pub fn new(ctx: &AudioContext) -> Self {
        let mut delay = DelayLine::new(ctx.sample_rate());
        delay.set_time(100.0);
        Self {
            core: NodeCore::audio(ctx),
            delay,
            time: 100.0,
            feedback: Param::Value(0.25),
            wet: Param::Value(0.2),
            prev: None,
        }
    }

    pub fn time(mut self, ms: f64) -> Self {
        self.set_time(ms);
        self
    }

    pub fn feedback(mut self, feedback: impl Into<Param>) -> Self {
        self.feedback = feedback.into();
        self
    }

    pub fn wet(mut self, wet: impl Into<Param>) -> Self {
        self.wet = wet.into();
        self
    }

    pub fn delay_time(&self) -> f64 {
        self.time
    }

    /// Accepted only in `(0, 15000)` ms.
    pub fn set_time(&mut self, ms: f64) {
        if 0.0 < ms && ms < MAX_DELAY_MS {
            self.time = ms;
            self.delay.set_time(ms);
        }
    }

    pub fn set_time_str(&mut self, text: &str, ctx: &AudioContext) {
        self.set_time(timevalue(text, ctx));
    }

    pub fn set_feedback(&mut self, feedback: impl Into<Param>) {
        self.feedback = feedback.into();
    }

    pub fn set_wet(&mut self, wet: impl Into<Param>) {
        self.wet = wet.into();
    }
}

impl Node for DelayNode {
    impl_node_core!();

    fn capabilities(&self) -> Capabilities {
        Capabilities::RESET
    }

    fn dependencies(&self) -> Vec<NodeId> {
        [self.feedback, self.wet].iter().filter_map(|p| p.node()).collect()
    }

    fn process(&mut self, ctx: &mut ProcessCtx<'_>) {
        sum_inputs_ar(&mut self.core, ctx);

        let params = (ctx.param(self.feedback), ctx.param(self.wet));
        if self.prev != Some(params) {
            self.prev = Some(params);
            self.delay.feedback = params.0;
            self.delay.wet = params.1;
        }

        self.delay.render(&mut self.core.cell);
        scale_output_ar(&mut self.core);
    }

    /// Clear the delay line.
    fn reset(&mut self, _ctx: &mut ProcessCtx<'_>) {
        self.delay.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;

    /// A single 1.0 on the first sample of the first tick.
    struct Impulse {
        core: NodeCore,
        fired: bool,
    }

    impl Node for Impulse {
        impl_node_core!();

        fn process(&mut self, _ctx: &mut ProcessCtx<'_>) {
            self.core.cell.fill(0.0);
            if !self.fired {
                self.fired = true;
                self.core.cell[0] = 1.0;
            }
        }
    }

    #[test]
    fn echo_arrives_after_the_delay_time() {
        let ctx = AudioContext::builder().sample_rate(8000).cell_size(32).build();
        let mut graph = Graph::new(&ctx);
        let impulse = graph.add(Impulse {
            core: NodeCore::audio(&ctx),
            fired: false,
        });
        let delay = graph.add(DelayNode::new(&ctx).time(50.0).feedback(0.0).wet(0.5));
        graph.append(delay, impulse).unwrap();

        let mut out = Vec::new();
        for _ in 0..20 {
            out.extend_from_slice(graph.render(delay));
        }
        // 50 ms at 8 kHz is 400 samples
        assert!((out[0] - 0.5).abs() < 1e-6, "dry half");
        assert!((out[400] - 0.5).abs() < 1e-6, "wet half after 50 ms");
        assert!(out.iter().enumerate().all(|(i, &x)| i == 0 || i == 400 || x.abs() < 1e-6));
    }

    #[test]
    fn out_of_range_times_are_ignored() {
        let ctx = AudioContext::builder().sample_rate(8000).cell_size(32).build();
        let mut node = DelayNode::new(&ctx);
        node.set_time(0.0);
        node.set_time(15000.0);
        assert_eq!(node.delay_time(), 100.0);
        node.set_time_str("250ms", &ctx);
        assert_eq!(node.delay_time(), 250.0);
    }
}
