use crate::context::AudioContext;
use crate::dsp::envelope::{CurveSpec, Envelope, EnvelopeEvent, EnvelopeTable, Segment, TimeSpec};
use crate::error::TableError;
use crate::graph::{sum_inputs_ar, Capabilities, Node, NodeCore, NodeEvent, ProcessCtx};
use crate::impl_node_core;

/*
Envelope Nodes
==============

EnvNode runs an `Envelope` one step per tick and multiplies its inputs by
the level (no inputs: the level itself). Appending an oscillator to an
envelope gives a note:

    env ─┬─ osc
         └─ cell = osc * level * mul + add

Lifecycle
---------

    bang      restart from the first row
    release   jump to the release node
    ended     last row reached: the cell is held at 0, `Ended` is emitted
              after the tick and the node reports `is_ended`

ParamNode is the same machinery locked to control rate, driven by one-shot
ramps from its current level instead of a fixed table.
*/

fn apply_level(core: &mut NodeCore, ctx: &mut ProcessCtx<'_>, level: f32) {
    if core.inputs.is_empty() {
        core.cell.fill(1.0);
    } else {
        sum_inputs_ar(core, ctx);
    }
    let (mul, add) = (core.mul, core.add);
    for x in core.cell.iter_mut() {
        *x = *x * level * mul + add;
    }
}

pub struct EnvNode {
    core: NodeCore,
    env: Envelope,
}

impl EnvNode {
    pub fn new(ctx: &AudioContext) -> Self {
        Self::with_envelope(ctx, Envelope::new(ctx))
    }

    pub fn with_envelope(ctx: &AudioContext, mut env: Envelope) -> Self {
        env.step = ctx.cell_size() as f64;
        Self {
            core: NodeCore::new(ctx),
            env,
        }
    }

    pub fn with_table(ctx: &AudioContext, table: EnvelopeTable) -> Self {
        Self::with_envelope(ctx, Envelope::with_table(ctx, table))
    }

    pub fn perc(ctx: &AudioContext, attack_ms: f64, release_ms: f64, level: f64) -> Self {
        Self::with_envelope(ctx, Envelope::perc(ctx, attack_ms, release_ms, level))
    }

    pub fn adsr(ctx: &AudioContext, attack_ms: f64, decay_ms: f64, sustain: f64, release_ms: f64, level: f64) -> Self {
        Self::with_envelope(ctx, Envelope::adsr(ctx, attack_ms, decay_ms, sustain, release_ms, level))
    }

    pub fn asr(ctx: &AudioContext, attack_ms: f64, sustain: f64, release_ms: f64) -> Self {
        Self::with_envelope(ctx, Envelope::asr(ctx, attack_ms, sustain, release_ms))
    }

    pub fn dadsr(
        ctx: &AudioContext,
        delay_ms: f64,
        attack_ms: f64,
        decay_ms: f64,
        sustain: f64,
        release_ms: f64,
        level: f64,
    ) -> Self {
        Self::with_envelope(
            ctx,
            Envelope::dadsr(ctx, delay_ms, attack_ms, decay_ms, sustain, release_ms, level),
        )
    }

    pub fn linen(ctx: &AudioContext, attack_ms: f64, sustain_ms: f64, release_ms: f64, level: f64) -> Self {
        Self::with_envelope(ctx, Envelope::linen(ctx, attack_ms, sustain_ms, release_ms, level))
    }

    pub fn tri(ctx: &AudioContext, duration_ms: f64, level: f64) -> Self {
        Self::with_envelope(ctx, Envelope::tri(ctx, duration_ms, level))
    }

    pub fn cutoff(ctx: &AudioContext, release_ms: f64, level: f64) -> Self {
        Self::with_envelope(ctx, Envelope::cutoff(ctx, release_ms, level))
    }

    pub fn envelope(&self) -> &Envelope {
        &self.env
    }

    pub fn envelope_mut(&mut self) -> &mut Envelope {
        &mut self.env
    }

    pub fn set_table(&mut self, table: EnvelopeTable) {
        self.env.set_table(table);
    }

    /// Parse a table literal such as `[0, [1, 10], [0, 500, "exp"]]`.
    pub fn set_table_str(&mut self, text: &str) -> Result<(), TableError> {
        self.env.set_table(text.parse()?);
        Ok(())
    }

    pub fn set_curve(&mut self, curve: impl Into<CurveSpec>) {
        self.env.set_curve(curve);
    }

    /// 1-based row index where the gate phase stops and waits for release.
    pub fn set_release_node(&mut self, node: i32) {
        self.env.set_release_node(node);
    }

    /// 1-based row index the gate phase loops back to.
    pub fn set_loop_node(&mut self, node: i32) {
        self.env.set_loop_node(node);
    }

    pub fn level(&self) -> f64 {
        self.env.level()
    }

    /// The whole shape sampled at `points` positions, rendered on a copy.
    pub fn preview(&self, points: usize) -> Vec<f32> {
        self.env.preview(points)
    }
}

impl Node for EnvNode {
    impl_node_core!();

    fn capabilities(&self) -> Capabilities {
        Capabilities::BANG | Capabilities::RELEASE | Capabilities::RESET
    }

    fn process(&mut self, ctx: &mut ProcessCtx<'_>) {
        // keeps the held silence
        if self.core.ended {
            return;
        }
        let level = self.env.next() as f32;
        apply_level(&mut self.core, ctx, level);

        match self.env.event() {
            Some(EnvelopeEvent::Ended) => ctx.end(Some(0.0)),
            Some(EnvelopeEvent::Sustained) => ctx.emit(NodeEvent::Sustained),
            None => {}
        }
    }

    fn bang(&mut self, _ctx: &mut ProcessCtx<'_>, _arg: Option<f64>) {
        self.core.ended = false;
        self.env.gate();
    }

    fn release(&mut self, ctx: &mut ProcessCtx<'_>) {
        self.env.release();
        ctx.emit(NodeEvent::Released);
    }

    fn reset(&mut self, _ctx: &mut ProcessCtx<'_>) {
        self.env.reset();
    }
}

/// A control value that glides. Every ramp starts from the current level.
pub struct ParamNode {
    core: NodeCore,
    env: Envelope,
}

impl ParamNode {
    pub fn new(ctx: &AudioContext) -> Self {
        let mut env = Envelope::new(ctx);
        env.step = ctx.cell_size() as f64;
        Self {
            core: NodeCore::control(ctx),
            env,
        }
    }

    fn start(&mut self, table: EnvelopeTable) {
        self.core.ended = false;
        self.env.set_table(table);
        self.env.gate();
    }

    pub fn value(&self) -> f64 {
        self.env.level()
    }

    /// Jump to `value` with no ramp.
    pub fn set_value(&mut self, value: f64) {
        self.start(EnvelopeTable::new(value));
    }

    /// Ramp to `level` over `time` ("200ms", 1500.0, ...) along `curve`.
    pub fn to(&mut self, level: f64, time: impl Into<TimeSpec>, curve: impl Into<CurveSpec>) {
        let from = self.env.level();
        self.start(EnvelopeTable::new(from).then(Segment::new(level, time).curve(curve)));
    }

    pub fn lin_to(&mut self, level: f64, time: impl Into<TimeSpec>) {
        self.to(level, time, "lin");
    }

    pub fn exp_to(&mut self, level: f64, time: impl Into<TimeSpec>) {
        self.to(level, time, "exp");
    }

    pub fn sin_to(&mut self, level: f64, time: impl Into<TimeSpec>) {
        self.to(level, time, "sin");
    }

    pub fn wel_to(&mut self, level: f64, time: impl Into<TimeSpec>) {
        self.to(level, time, "wel");
    }

    pub fn sqr_to(&mut self, level: f64, time: impl Into<TimeSpec>) {
        self.to(level, time, "sqr");
    }

    pub fn cub_to(&mut self, level: f64, time: impl Into<TimeSpec>) {
        self.to(level, time, "cub");
    }

    /// Hold the current level for `time`, then jump to `level`.
    pub fn set_at(&mut self, level: f64, time: impl Into<TimeSpec>) {
        let from = self.env.level();
        self.start(
            EnvelopeTable::new(from)
                .then(Segment::new(from, time))
                .then(Segment::new(level, 0.0)),
        );
    }

    /// Stop the ramp where it is.
    pub fn cancel(&mut self) {
        self.env.cancel();
    }
}

impl Node for ParamNode {
    impl_node_core!();

    fn process(&mut self, ctx: &mut ProcessCtx<'_>) {
        let level = self.env.next() as f32;
        apply_level(&mut self.core, ctx, level);

        match self.env.event() {
            Some(EnvelopeEvent::Ended) => ctx.end(None),
            Some(EnvelopeEvent::Sustained) => ctx.emit(NodeEvent::Sustained),
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Graph, NodeEvent};

    fn ctx() -> AudioContext {
        // 32 samples at 32 kHz: one tick per millisecond
        AudioContext::builder().sample_rate(32000).cell_size(32).build()
    }

    #[test]
    fn perc_rises_falls_and_ends() {
        let ctx = ctx();
        let mut graph = Graph::new(&ctx);
        let env = graph.add(EnvNode::perc(&ctx, 20.0, 50.0, 1.0));
        graph.bang(env).unwrap();

        let mut peak = 0.0f32;
        for _ in 0..200 {
            peak = peak.max(graph.render(env)[0]);
        }
        assert!((peak - 1.0).abs() < 1e-3);
        assert!(graph.is_ended(env));
        assert!(graph.cell(env).iter().all(|&x| x == 0.0), "ended envelopes hold silence");
        let events: Vec<_> = graph.drain_events().into_iter().map(|e| e.event).collect();
        assert_eq!(events.iter().filter(|e| **e == NodeEvent::Ended).count(), 1);

        graph.bang(env).unwrap();
        assert!(!graph.is_ended(env));
    }

    #[test]
    fn adsr_sustains_until_released() {
        let ctx = ctx();
        let mut graph = Graph::new(&ctx);
        let env = graph.add(EnvNode::adsr(&ctx, 10.0, 20.0, 0.5, 30.0, 1.0));
        graph.append(env, 1.0).unwrap();
        graph.bang(env).unwrap();
        for _ in 0..500 {
            graph.render(env);
        }
        assert!((graph.cell(env)[0] - 0.5).abs() < 1e-3);
        assert!(!graph.is_ended(env));

        graph.release(env).unwrap();
        for _ in 0..100 {
            graph.render(env);
        }
        assert!(graph.is_ended(env));
        let events: Vec<_> = graph.drain_events().into_iter().map(|e| e.event).collect();
        assert!(events.contains(&NodeEvent::Sustained));
        assert!(events.contains(&NodeEvent::Released));
    }

    #[test]
    fn table_literal() {
        let ctx = ctx();
        let mut env = EnvNode::new(&ctx);
        assert!(env.set_table_str("[0, [1, 100], [0, 100, \"exp\"]]").is_ok());
        assert!(env.set_table_str("[0, [1,").is_err());
    }

    #[test]
    fn param_ramps_from_current_level() {
        let ctx = ctx();
        let mut graph = Graph::new(&ctx);
        let param = graph.add(ParamNode::new(&ctx));
        graph.get_mut::<ParamNode>(param).unwrap().set_value(2.0);
        graph.render(param);
        assert!((graph.cell(param)[0] - 2.0).abs() < 1e-6);

        graph.get_mut::<ParamNode>(param).unwrap().lin_to(4.0, 100.0);
        let mut last = 2.0;
        for _ in 0..100 {
            let x = graph.render(param)[0];
            assert!(x >= last - 1e-6);
            last = x;
        }
        assert!((last - 4.0).abs() < 1e-3);

        graph.get_mut::<ParamNode>(param).unwrap().lin_to(0.0, 100.0);
        graph.render(param);
        graph.render(param);
        graph.get_mut::<ParamNode>(param).unwrap().cancel();
        let held = graph.render(param)[0];
        assert_eq!(graph.render(param)[0], held);
        assert!(held < 4.0 && held > 0.0);
    }

    #[test]
    fn param_set_at_jumps_after_delay() {
        let ctx = ctx();
        let mut graph = Graph::new(&ctx);
        let param = graph.add(ParamNode::new(&ctx));
        graph.get_mut::<ParamNode>(param).unwrap().set_value(1.0);
        graph.render(param);
        graph.get_mut::<ParamNode>(param).unwrap().set_at(3.0, 50.0);
        for _ in 0..30 {
            assert!((graph.render(param)[0] - 1.0).abs() < 1e-6);
        }
        for _ in 0..50 {
            graph.render(param);
        }
        assert!((graph.cell(param)[0] - 3.0).abs() < 1e-6);
    }

    #[test]
    fn preview_leaves_the_live_envelope_alone() {
        let ctx = ctx();
        let mut graph = Graph::new(&ctx);
        let env = graph.add(EnvNode::perc(&ctx, 20.0, 50.0, 1.0));
        graph.bang(env).unwrap();
        for _ in 0..10 {
            graph.render(env);
        }
        let level = graph.get::<EnvNode>(env).unwrap().level();

        let shape = graph.get::<EnvNode>(env).unwrap().preview(64);
        assert_eq!(shape.len(), 64);
        assert!(shape.iter().all(|x| x.is_finite()));
        assert!(shape.iter().any(|&x| x > 0.5), "attack shows up in the preview");
        assert_eq!(graph.get::<EnvNode>(env).unwrap().level(), level);
    }
}
