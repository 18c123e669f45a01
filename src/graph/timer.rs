use crate::context::AudioContext;
use crate::deferred::{deferred, Promise, Resolver};
use crate::error::Cancelled;
use crate::graph::{Capabilities, Node, NodeCore, NodeEvent, NodeId, Param, ProcessCtx};
use crate::impl_node_core;
use crate::sequencing::iterator::Pattern;
use crate::sequencing::timevalue::timevalue;

/*
Timers
======

Timers are control-rate nodes that run from the scheduler's timer list once
started, whether or not anything pulls them. On their schedule they bang
every input, passing a value along where one exists:

  IntervalNode   every `interval` ms after `delay`, with a running count;
                 optionally stops itself after `timeout` ms
  TimeoutNode    once, `timeout` ms after start or bang
  ScheduleNode   a time-ordered queue of nodes to bang
  PatternNode    every `interval` ms, the next value of a pattern

Times are counted in samples, decremented one cell per tick, so timers are
accurate to one cell.

Promises
--------

Interval and Timeout can hand out a `Promise`. It resolves when the timer
ends on its own and is rejected with `Cancelled` when it is stopped first.
Either way the timer is spent afterwards: further start and stop requests
are refused.
*/

/// What a timer promise resolves with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimerResult {
    pub node: NodeId,
    /// Bangs sent before ending.
    pub count: u64,
    pub elapsed_ms: f64,
}

/// Settlement state shared by the promise-carrying timers.
#[derive(Default)]
struct Completion {
    resolver: Option<Resolver<TimerResult, Cancelled>>,
    locked: bool,
    stopping: bool,
}

impl Completion {
    fn promise(&mut self) -> Promise<TimerResult, Cancelled> {
        if let Some(resolver) = &self.resolver {
            return resolver.promise();
        }
        let (resolver, promise) = deferred();
        self.resolver = Some(resolver);
        self.locked = false;
        promise
    }

    /// Resolve and take the timer off the list. Returns false when there was
    /// no promise to settle.
    fn finish(&mut self, ctx: &mut ProcessCtx<'_>, result: TimerResult) -> bool {
        let Some(resolver) = self.resolver.take() else {
            return false;
        };
        ctx.emit(NodeEvent::Ended);
        resolver.resolve(result);
        self.locked = true;
        self.stopping = true;
        ctx.stop_self();
        true
    }

    fn can_start(&self) -> bool {
        !self.locked
    }

    /// Whether a stop request goes through. Rejects a pending promise.
    fn on_stop(&mut self) -> bool {
        if self.stopping {
            self.stopping = false;
            return true;
        }
        if self.locked {
            return false;
        }
        if let Some(resolver) = self.resolver.take() {
            resolver.reject(Cancelled);
            self.locked = true;
        }
        true
    }

    fn cancelled(&self) -> bool {
        self.locked && !self.stopping
    }
}

pub struct IntervalNode {
    core: NodeCore,
    interval: Param,
    delay: f64,
    timeout: f64,
    count: u64,
    current_time: f64,
    delay_samples: i64,
    count_samples: i64,
    ended: bool,
    completion: Completion,
}

impl IntervalNode {
    pub fn new(ctx: &AudioContext) -> Self {
        Self {
            core: NodeCore::control(ctx),
            interval: Param::Value(1000.0),
            delay: 0.0,
            timeout: f64::INFINITY,
            count: 0,
            current_time: 0.0,
            delay_samples: 0,
            count_samples: 0,
            ended: false,
            completion: Completion::default(),
        }
    }

    pub fn interval(mut self, ms: impl Into<Param>) -> Self {
        self.interval = ms.into();
        self
    }

    pub fn delay(mut self, ms: f64) -> Self {
        self.set_delay(ms);
        self
    }

    pub fn timeout(mut self, ms: f64) -> Self {
        self.set_timeout(ms);
        self
    }

    pub fn set_interval(&mut self, ms: impl Into<Param>) {
        self.interval = ms.into();
    }

    /// Interval as a time string ("250ms", "bpm120 l4").
    pub fn set_interval_str(&mut self, text: &str, ctx: &AudioContext) {
        self.interval = Param::time(text, ctx);
    }

    /// Negative delays are ignored.
    pub fn set_delay(&mut self, ms: f64) {
        if ms >= 0.0 {
            self.delay = ms;
        }
    }

    /// Negative timeouts are ignored.
    pub fn set_timeout(&mut self, ms: f64) {
        if ms >= 0.0 {
            self.timeout = ms;
        }
    }

    pub fn set_count(&mut self, count: u64) {
        self.count = count;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn is_locked(&self) -> bool {
        self.completion.locked
    }

    /// Promise settled when the timer times out or is stopped.
    pub fn promise(&mut self) -> Promise<TimerResult, Cancelled> {
        self.completion.promise()
    }

    fn restart(&mut self, ctx: &AudioContext) {
        self.delay_samples = ctx.ms_to_samples(self.delay);
        self.count_samples = 0;
        self.count = 0;
        self.current_time = 0.0;
        self.ended = false;
        self.core.ended = false;
    }
}

impl Node for IntervalNode {
    impl_node_core!();

    fn capabilities(&self) -> Capabilities {
        Capabilities::TIMER | Capabilities::BANG
    }

    fn dependencies(&self) -> Vec<NodeId> {
        self.interval.node().into_iter().collect()
    }

    fn process(&mut self, ctx: &mut ProcessCtx<'_>) {
        if self.ended {
            return;
        }
        let cell = self.core.cell.len() as i64;
        if self.delay_samples > 0 {
            self.delay_samples -= cell;
        }
        let interval = ctx.param(self.interval) as f64;
        if self.delay_samples <= 0 {
            self.count_samples -= cell;
            if self.count_samples <= 0 {
                self.count_samples += ctx.context().ms_to_samples(interval);
                let x = self.count as f32 * self.core.mul + self.core.add;
                self.core.cell.fill(x);
                for &input in &self.core.inputs {
                    ctx.bang(input, Some(self.count as f64));
                }
                self.count += 1;
            }
        }
        self.current_time += ctx.context().cell_ms();
        if self.current_time >= self.timeout {
            ctx.wake_later();
        }
    }

    /// Timed out.
    fn wake(&mut self, ctx: &mut ProcessCtx<'_>) {
        if self.ended {
            return;
        }
        self.ended = true;
        self.core.ended = true;
        let result = TimerResult {
            node: ctx.id(),
            count: self.count,
            elapsed_ms: self.current_time,
        };
        if !self.completion.finish(ctx, result) {
            ctx.stop_self();
            ctx.emit(NodeEvent::Ended);
        }
    }

    fn on_start(&mut self, ctx: &mut ProcessCtx<'_>) -> bool {
        if !self.completion.can_start() {
            return false;
        }
        let audio = *ctx.context();
        self.restart(&audio);
        true
    }

    fn on_stop(&mut self, _ctx: &mut ProcessCtx<'_>) -> bool {
        let accepted = self.completion.on_stop();
        if self.completion.cancelled() {
            self.ended = true;
        }
        accepted
    }

    fn bang(&mut self, ctx: &mut ProcessCtx<'_>, _arg: Option<f64>) {
        let audio = *ctx.context();
        self.restart(&audio);
    }
}

pub struct TimeoutNode {
    core: NodeCore,
    timeout: f64,
    samples_max: i64,
    samples: i64,
    current_time: f64,
    ended: bool,
    completion: Completion,
}

impl TimeoutNode {
    pub fn new(ctx: &AudioContext) -> Self {
        let samples_max = ctx.ms_to_samples(1000.0);
        Self {
            core: NodeCore::control(ctx),
            timeout: 1000.0,
            samples_max,
            samples: samples_max,
            current_time: 0.0,
            ended: false,
            completion: Completion::default(),
        }
    }

    pub fn timeout(mut self, ms: f64, ctx: &AudioContext) -> Self {
        self.set_timeout(ms, ctx);
        self
    }

    /// Negative timeouts are ignored.
    pub fn set_timeout(&mut self, ms: f64, ctx: &AudioContext) {
        if ms >= 0.0 {
            self.timeout = ms;
            self.samples_max = ctx.ms_to_samples(ms);
            self.samples = self.samples_max;
            self.ended = false;
        }
    }

    pub fn set_timeout_str(&mut self, text: &str, ctx: &AudioContext) {
        self.set_timeout(timevalue(text, ctx), ctx);
    }

    pub fn timeout_ms(&self) -> f64 {
        self.timeout
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn promise(&mut self) -> Promise<TimerResult, Cancelled> {
        self.completion.promise()
    }

    fn restart(&mut self) {
        self.samples = self.samples_max;
        self.current_time = 0.0;
        self.ended = false;
        self.core.ended = false;
    }
}

impl Node for TimeoutNode {
    impl_node_core!();

    fn capabilities(&self) -> Capabilities {
        Capabilities::TIMER | Capabilities::BANG
    }

    fn process(&mut self, ctx: &mut ProcessCtx<'_>) {
        if self.ended {
            return;
        }
        if self.samples > 0 {
            self.samples -= self.core.cell.len() as i64;
        }
        if self.samples <= 0 {
            for &input in &self.core.inputs {
                ctx.bang(input, None);
            }
            ctx.wake_later();
        }
        self.current_time += ctx.context().cell_ms();
    }

    fn wake(&mut self, ctx: &mut ProcessCtx<'_>) {
        if self.ended {
            return;
        }
        self.ended = true;
        self.core.ended = true;
        let result = TimerResult {
            node: ctx.id(),
            count: 1,
            elapsed_ms: self.current_time,
        };
        if !self.completion.finish(ctx, result) {
            ctx.emit(NodeEvent::Ended);
        }
    }

    fn on_start(&mut self, _ctx: &mut ProcessCtx<'_>) -> bool {
        if !self.completion.can_start() {
            return false;
        }
        self.restart();
        true
    }

    fn on_stop(&mut self, _ctx: &mut ProcessCtx<'_>) -> bool {
        let accepted = self.completion.on_stop();
        if self.completion.cancelled() {
            self.ended = true;
        }
        accepted
    }

    fn bang(&mut self, _ctx: &mut ProcessCtx<'_>, _arg: Option<f64>) {
        self.restart();
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Scheduled {
    time: f64,
    node: NodeId,
}

/// Bangs nodes at absolute times on its own clock. The clock only runs
/// while the node is started.
pub struct ScheduleNode {
    core: NodeCore,
    queue: Vec<Scheduled>,
    elapse: f64,
    max_remain: usize,
}

impl ScheduleNode {
    pub fn new(ctx: &AudioContext) -> Self {
        Self {
            core: NodeCore::control(ctx),
            queue: Vec::new(),
            elapse: 0.0,
            max_remain: 1000,
        }
    }

    /// Bang `node` `delta` ms from now.
    pub fn sched(&mut self, delta: f64, node: NodeId) -> bool {
        self.sched_abs(self.elapse + delta, node)
    }

    /// Bang `node` when the clock passes `time` ms. Items with equal times
    /// fire in insertion order. Returns false when the queue is full.
    pub fn sched_abs(&mut self, time: f64, node: NodeId) -> bool {
        if self.queue.len() >= self.max_remain {
            return false;
        }
        let at = self.queue.partition_point(|item| item.time <= time);
        self.queue.insert(at, Scheduled { time, node });
        true
    }

    pub fn sched_str(&mut self, delta: &str, node: NodeId, ctx: &AudioContext) -> bool {
        self.sched(timevalue(delta, ctx), node)
    }

    /// Move the clock forward without firing anything on the way.
    pub fn advance(&mut self, delta: f64) {
        self.elapse += delta;
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    pub fn elapse(&self) -> f64 {
        self.elapse
    }

    pub fn remain(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn max_remain(&self) -> usize {
        self.max_remain
    }

    /// Zero is ignored.
    pub fn set_max_remain(&mut self, max: usize) {
        if max > 0 {
            self.max_remain = max;
        }
    }
}

impl Node for ScheduleNode {
    impl_node_core!();

    fn capabilities(&self) -> Capabilities {
        Capabilities::TIMER
    }

    fn dependencies(&self) -> Vec<NodeId> {
        self.queue.iter().map(|item| item.node).collect()
    }

    fn process(&mut self, ctx: &mut ProcessCtx<'_>) {
        let mut event = None;
        let fire = self.queue.partition_point(|item| item.time < self.elapse);
        for item in self.queue.drain(..fire) {
            ctx.bang(item.node, None);
            event = Some(NodeEvent::Scheduled);
        }
        if event.is_some() && self.queue.is_empty() {
            event = Some(NodeEvent::Empty);
        }
        self.elapse += ctx.context().cell_ms();
        if let Some(event) = event {
            ctx.emit(event);
        }
    }
}

/// Bangs its inputs with successive pattern values, one every `interval`
/// ms, and ends when the pattern runs out.
pub struct PatternNode {
    core: NodeCore,
    pattern: Box<dyn Pattern>,
    interval: Param,
    count_samples: i64,
    ended: bool,
}

impl PatternNode {
    pub fn new(ctx: &AudioContext, pattern: Box<dyn Pattern>) -> Self {
        Self {
            core: NodeCore::control(ctx),
            pattern,
            interval: Param::Value(500.0),
            count_samples: 0,
            ended: false,
        }
    }

    pub fn interval(mut self, ms: impl Into<Param>) -> Self {
        self.interval = ms.into();
        self
    }

    pub fn set_interval(&mut self, ms: impl Into<Param>) {
        self.interval = ms.into();
    }

    pub fn set_pattern(&mut self, pattern: Box<dyn Pattern>) {
        self.pattern = pattern;
    }

    fn restart(&mut self) {
        self.pattern.reset();
        self.count_samples = 0;
        self.ended = false;
        self.core.ended = false;
    }
}

impl Node for PatternNode {
    impl_node_core!();

    fn capabilities(&self) -> Capabilities {
        Capabilities::TIMER | Capabilities::BANG
    }

    fn dependencies(&self) -> Vec<NodeId> {
        self.interval.node().into_iter().collect()
    }

    fn process(&mut self, ctx: &mut ProcessCtx<'_>) {
        if self.ended {
            return;
        }
        let interval = ctx.param(self.interval) as f64;
        self.count_samples -= self.core.cell.len() as i64;
        if self.count_samples > 0 {
            return;
        }
        self.count_samples += ctx.context().ms_to_samples(interval);
        match self.pattern.next() {
            Some(value) => {
                let x = value as f32 * self.core.mul + self.core.add;
                self.core.cell.fill(x);
                for &input in &self.core.inputs {
                    ctx.bang(input, Some(value));
                }
            }
            None => {
                self.core.cell.fill(0.0);
                ctx.wake_later();
            }
        }
    }

    fn wake(&mut self, ctx: &mut ProcessCtx<'_>) {
        if self.ended {
            return;
        }
        self.ended = true;
        self.core.ended = true;
        ctx.emit(NodeEvent::Ended);
        ctx.stop_self();
    }

    fn on_start(&mut self, _ctx: &mut ProcessCtx<'_>) -> bool {
        self.restart();
        true
    }

    fn bang(&mut self, _ctx: &mut ProcessCtx<'_>, _arg: Option<f64>) {
        self.restart();
    }
}
