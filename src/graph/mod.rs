//! The node graph and the tick scheduler that pulls it.
//!
//! Nodes live in an arena (`Graph`) and refer to each other by `NodeId`.
//! A node's inputs are ids, never references, so one node can feed any
//! number of consumers. The scheduler advances a tick counter once per cell
//! and asks each sink to process; sinks pull their inputs recursively, and
//! every node runs at most once per tick no matter how many consumers pull
//! it.
//!
//! While a node runs it is taken out of its slot. Reaching a slot that is
//! already out means the graph has a cycle, so the pull yields silence and
//! the cycle is logged once. `append` refuses connections that would close a
//! cycle in the first place.
//!
//! Registration with the scheduler (timers, listeners, output inlets) never
//! happens in the middle of a tick. Requests are queued as `TickTask`s and
//! applied once the tick is done, or immediately when the system is idle.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use tracing::{debug, warn};

use crate::context::AudioContext;
use crate::error::GraphError;
use crate::sequencing::timevalue::timevalue;

/// Snapshot and capture nodes: FFT, IFFT, spectrum, wave, recorder.
pub mod analysis;
/// Sample buffer player.
pub mod buffer;
/// Control mapping nodes: map, midicps, midiratio, zmap, ndict.
pub mod control;
/// Feedback delay effect.
pub mod delay;
/// Gain-staged distortion effect.
pub mod distortion;
/// Envelope and parameter ramp nodes.
pub mod envelope;
/// Typed node events and deferred tick tasks.
pub mod event;
/// Memoized biquad filter node.
pub mod filter;
/// System inlets and channel views.
pub mod inlet;
/// Plus, times and clip.
pub mod math;
/// Core node trait, shared state and helpers.
pub mod node;
/// White, pink, chip noise and plucked strings.
pub mod noise;
/// Wavetable oscillator nodes.
pub mod oscillator;
/// Panner, gate and selector.
pub mod routing;
/// The sound system: stream rendering, command queue, offline recording.
pub mod system;
/// Tape player.
pub mod tape;
/// Interval, timeout, schedule and pattern timers.
pub mod timer;
/// Constant and function nodes.
pub mod value;

pub use analysis::{FftNode, IfftNode, RecNode, SpectrumNode, WaveNode};
pub use buffer::BufferNode;
pub use control::{MapNode, MidiCpsNode, MidiRatioNode, NDictNode, Warp, ZMapNode};
pub use delay::DelayNode;
pub use distortion::DistNode;
pub use envelope::{EnvNode, ParamNode};
pub use event::{GraphEvent, NodeEvent, TickTask};
pub use filter::BiquadNode;
pub use inlet::{Channel, ChannelNode, SystemInlet};
pub use math::{ClipNode, PlusNode, TimesNode};
pub use node::{
    mix_inputs, scale_output_ar, scale_output_kr, sum_inputs_ar, sum_inputs_kr, Capabilities, Node,
    NodeCore, Rate, StereoCells,
};
pub use noise::{FNoiseNode, NoiseNode, PinkNoiseNode, PluckNode};
pub use oscillator::{COscNode, OscNode};
pub use routing::{GateNode, GateOutput, PannerNode, SelectorNode};
pub use system::{CommandReceiver, RecOptions, RecOutlet, SoundSystem, SystemCommand, SystemStatus};
pub use tape::TapeNode;
pub use timer::{IntervalNode, PatternNode, ScheduleNode, TimeoutNode, TimerResult};
pub use value::{FunctionNode, ValueNode};

/// Events held for the driver before the oldest are dropped.
const MAX_PENDING_EVENTS: usize = 4096;

/// Slot index plus the generation of the slot when the node was added. A
/// removed node's id never resolves again, even after its slot is reused.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

impl NodeId {
    pub fn index(self) -> usize {
        self.index
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({}v{})", self.index, self.generation)
    }
}

/// Anything that can be appended as an input. Plain values become
/// `ValueNode`s.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Source {
    Node(NodeId),
    Value(f32),
}

impl From<NodeId> for Source {
    fn from(id: NodeId) -> Self {
        Source::Node(id)
    }
}

impl From<f32> for Source {
    fn from(value: f32) -> Self {
        Source::Value(value)
    }
}

impl From<f64> for Source {
    fn from(value: f64) -> Self {
        Source::Value(value as f32)
    }
}

impl From<i32> for Source {
    fn from(value: i32) -> Self {
        Source::Value(value as f32)
    }
}

impl From<bool> for Source {
    fn from(value: bool) -> Self {
        Source::Value(if value { 1.0 } else { 0.0 })
    }
}

/// A node parameter: a constant, or the first sample of another node's
/// cell read each tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Param {
    Value(f32),
    Node(NodeId),
}

impl Param {
    pub fn node(self) -> Option<NodeId> {
        match self {
            Param::Node(id) => Some(id),
            Param::Value(_) => None,
        }
    }

    /// A time string ("500ms", "bpm120 l8") in milliseconds.
    pub fn time(text: &str, ctx: &AudioContext) -> Param {
        Param::Value(timevalue(text, ctx) as f32)
    }

    /// The frequency whose period is the given time string. `None` for
    /// non-positive times.
    pub fn period(text: &str, ctx: &AudioContext) -> Option<Param> {
        let ms = timevalue(text, ctx);
        (ms > 0.0).then(|| Param::Value((1000.0 / ms) as f32))
    }
}

impl From<f32> for Param {
    fn from(value: f32) -> Self {
        Param::Value(value)
    }
}

impl From<f64> for Param {
    fn from(value: f64) -> Self {
        Param::Value(value as f32)
    }
}

impl From<i32> for Param {
    fn from(value: i32) -> Self {
        Param::Value(value as f32)
    }
}

impl From<NodeId> for Param {
    fn from(id: NodeId) -> Self {
        Param::Node(id)
    }
}

enum Slot {
    Vacant,
    Occupied(Box<dyn Node>),
    /// Taken out while the node runs.
    InFlight,
}

pub struct Graph {
    ctx: AudioContext,
    slots: Vec<Slot>,
    caps: Vec<Capabilities>,
    generations: Vec<u32>,
    free: Vec<usize>,
    silence: Vec<f32>,
    tick: u64,
    current_time: f64,
    pub(crate) timers: Vec<NodeId>,
    pub(crate) listeners: Vec<NodeId>,
    pub(crate) inlets: Vec<NodeId>,
    dacs: HashMap<NodeId, NodeId>,
    tasks: Vec<TickTask>,
    events: VecDeque<GraphEvent>,
    pub(crate) playing: bool,
    busy: bool,
    cycle_reported: bool,
}

impl Graph {
    pub fn new(ctx: &AudioContext) -> Self {
        Self {
            ctx: *ctx,
            slots: Vec::new(),
            caps: Vec::new(),
            generations: Vec::new(),
            free: Vec::new(),
            silence: vec![0.0; ctx.cell_size()],
            tick: 0,
            current_time: 0.0,
            timers: Vec::new(),
            listeners: Vec::new(),
            inlets: Vec::new(),
            dacs: HashMap::new(),
            tasks: Vec::new(),
            events: VecDeque::new(),
            playing: false,
            busy: false,
            cycle_reported: false,
        }
    }

    pub fn context(&self) -> &AudioContext {
        &self.ctx
    }

    /// Last tick evaluated.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Milliseconds of audio rendered so far.
    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| !matches!(s, Slot::Vacant)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: NodeId) -> bool {
        matches!(self.slot(id), Some(Slot::Occupied(_) | Slot::InFlight))
    }

    pub fn add(&mut self, node: impl Node) -> NodeId {
        self.add_boxed(Box::new(node))
    }

    pub fn add_boxed(&mut self, node: Box<dyn Node>) -> NodeId {
        let caps = node.capabilities();
        let id = match self.free.pop() {
            Some(index) => {
                self.slots[index] = Slot::Occupied(node);
                self.caps[index] = caps;
                NodeId {
                    index,
                    generation: self.generations[index],
                }
            }
            None => {
                self.slots.push(Slot::Occupied(node));
                self.caps.push(caps);
                self.generations.push(0);
                NodeId {
                    index: self.slots.len() - 1,
                    generation: 0,
                }
            }
        };
        debug!(node = %id, "node added");
        id
    }

    fn slot(&self, id: NodeId) -> Option<&Slot> {
        if self.generations.get(id.index) != Some(&id.generation) {
            return None;
        }
        self.slots.get(id.index)
    }

    fn slot_mut(&mut self, id: NodeId) -> Option<&mut Slot> {
        if self.generations.get(id.index) != Some(&id.generation) {
            return None;
        }
        self.slots.get_mut(id.index)
    }

    /// Remove a node and every reference to it. Consumers that still pull it
    /// read silence.
    pub fn remove(&mut self, id: NodeId) -> Result<(), GraphError> {
        match self.slot(id) {
            Some(Slot::Occupied(_)) => {}
            Some(Slot::InFlight) => return Err(GraphError::InFlight(id)),
            _ => return Err(GraphError::UnknownNode(id)),
        }
        self.slots[id.index] = Slot::Vacant;
        self.caps[id.index] = Capabilities::default();
        self.generations[id.index] = self.generations[id.index].wrapping_add(1);
        self.free.push(id.index);
        for slot in &mut self.slots {
            if let Slot::Occupied(node) = slot {
                node.core_mut().inputs.retain(|&i| i != id);
            }
        }
        self.timers.retain(|&i| i != id);
        self.listeners.retain(|&i| i != id);
        self.inlets.retain(|&i| i != id);
        self.dacs.retain(|&node, &mut inlet| node != id && inlet != id);
        debug!(node = %id, "node removed");
        Ok(())
    }

    pub fn capabilities(&self, id: NodeId) -> Capabilities {
        match self.slot(id) {
            Some(_) => self.caps[id.index],
            None => Capabilities::default(),
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&dyn Node> {
        match self.slot(id)? {
            Slot::Occupied(node) => Some(node.as_ref()),
            _ => None,
        }
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut dyn Node> {
        match self.slot_mut(id)? {
            Slot::Occupied(node) => Some(node.as_mut()),
            _ => None,
        }
    }

    /// The node as its concrete type.
    pub fn get<T: Node>(&self, id: NodeId) -> Option<&T> {
        self.node(id)?.as_any().downcast_ref()
    }

    pub fn get_mut<T: Node>(&mut self, id: NodeId) -> Option<&mut T> {
        self.node_mut(id)?.as_any_mut().downcast_mut()
    }

    fn core_mut(&mut self, id: NodeId) -> Result<&mut NodeCore, GraphError> {
        match self.slot_mut(id) {
            Some(Slot::Occupied(node)) => Ok(node.core_mut()),
            Some(Slot::InFlight) => Err(GraphError::InFlight(id)),
            _ => Err(GraphError::UnknownNode(id)),
        }
    }

    fn check(&self, id: NodeId) -> Result<(), GraphError> {
        match self.slot(id) {
            Some(Slot::Occupied(_)) => Ok(()),
            Some(Slot::InFlight) => Err(GraphError::InFlight(id)),
            _ => Err(GraphError::UnknownNode(id)),
        }
    }

    /* Topology */

    /// Append an input to `target`. Values are wrapped in a new `ValueNode`.
    /// Returns the id of the appended input.
    pub fn append(&mut self, target: NodeId, source: impl Into<Source>) -> Result<NodeId, GraphError> {
        self.check(target)?;
        let input = match source.into() {
            Source::Node(id) => {
                self.check(id)?;
                if id == target || self.depends_on(id, target) {
                    warn!(from = %id, to = %target, "rejected connection that closes a cycle");
                    return Err(GraphError::Cycle { from: id, to: target });
                }
                id
            }
            Source::Value(value) => {
                let ctx = self.ctx;
                self.add(ValueNode::new(&ctx, value))
            }
        };
        self.core_mut(target)?.inputs.push(input);
        debug!(input = %input, target = %target, "input appended");
        Ok(input)
    }

    pub fn append_all<I, S>(&mut self, target: NodeId, sources: I) -> Result<Vec<NodeId>, GraphError>
    where
        I: IntoIterator<Item = S>,
        S: Into<Source>,
    {
        sources.into_iter().map(|s| self.append(target, s)).collect()
    }

    /// Remove every occurrence of `input` from the inputs of `target`.
    pub fn remove_input(&mut self, target: NodeId, input: NodeId) -> Result<(), GraphError> {
        self.core_mut(target)?.inputs.retain(|&i| i != input);
        Ok(())
    }

    pub fn remove_all_inputs(&mut self, target: NodeId) -> Result<(), GraphError> {
        self.core_mut(target)?.inputs.clear();
        Ok(())
    }

    pub fn inputs(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.core().inputs.as_slice()).unwrap_or(&[])
    }

    /// True when `start` reads `target`, directly or through any chain of
    /// inputs and parameters.
    pub fn depends_on(&self, start: NodeId, target: NodeId) -> bool {
        let mut stack = vec![start];
        let mut seen = vec![false; self.slots.len()];
        while let Some(id) = stack.pop() {
            if id == target {
                return true;
            }
            match seen.get_mut(id.index) {
                Some(flag) if !*flag => *flag = true,
                _ => continue,
            }
            if let Some(node) = self.node(id) {
                stack.extend(node.core().inputs.iter().copied());
                stack.extend(node.dependencies());
            }
        }
        false
    }

    /* Output shaping */

    pub fn set_mul(&mut self, id: NodeId, mul: f32) -> Result<(), GraphError> {
        self.core_mut(id)?.mul = mul;
        Ok(())
    }

    pub fn set_add(&mut self, id: NodeId, add: f32) -> Result<(), GraphError> {
        self.core_mut(id)?.add = add;
        Ok(())
    }

    pub fn set_rate(&mut self, id: NodeId, rate: Rate) -> Result<(), GraphError> {
        self.core_mut(id)?.set_rate(rate);
        Ok(())
    }

    pub fn is_ended(&self, id: NodeId) -> bool {
        self.node(id).is_some_and(|n| n.core().ended)
    }

    /* Cells */

    /// The node's mono cell. Silence for missing or in-flight nodes.
    pub fn cell(&self, id: NodeId) -> &[f32] {
        match self.slot(id) {
            Some(Slot::Occupied(node)) => &node.core().cell,
            _ => &self.silence,
        }
    }

    /// Left and right cells. Mono nodes return their cell twice.
    pub fn stereo_cells(&self, id: NodeId) -> (&[f32], &[f32]) {
        match self.slot(id) {
            Some(Slot::Occupied(node)) => {
                let core = node.core();
                match &core.stereo {
                    Some(stereo) => (&stereo.left, &stereo.right),
                    None => (&core.cell, &core.cell),
                }
            }
            _ => (&self.silence, &self.silence),
        }
    }

    fn take(&mut self, id: NodeId) -> Option<Box<dyn Node>> {
        let slot = self.slot_mut(id)?;
        match std::mem::replace(slot, Slot::InFlight) {
            Slot::Occupied(node) => Some(node),
            other => {
                *slot = other;
                None
            }
        }
    }

    fn restore(&mut self, id: NodeId, node: Box<dyn Node>) {
        if let Some(slot) = self.slot_mut(id) {
            *slot = Slot::Occupied(node);
        }
    }

    /// Run `f` with the node taken out of its slot and a context bound to it.
    fn with_node<R>(&mut self, id: NodeId, f: impl FnOnce(&mut dyn Node, &mut ProcessCtx<'_>) -> R) -> Option<R> {
        let mut node = self.take(id)?;
        let result = {
            let mut ctx = ProcessCtx { graph: self, id };
            f(node.as_mut(), &mut ctx)
        };
        self.restore(id, node);
        Some(result)
    }

    pub(crate) fn pull(&mut self, id: NodeId) {
        let tick = self.tick;
        match self.slot(id) {
            Some(Slot::Occupied(node)) if node.core().tick == Some(tick) => return,
            Some(Slot::Occupied(_)) => {}
            Some(Slot::InFlight) => {
                if !self.cycle_reported {
                    self.cycle_reported = true;
                    warn!(node = %id, tick, "node pulled while in flight, reading silence");
                }
                return;
            }
            _ => return,
        }
        self.with_node(id, |node, ctx| {
            node.core_mut().tick = Some(tick);
            node.process(ctx);
        });
    }

    /* Control */

    pub fn bang(&mut self, id: NodeId) -> Result<(), GraphError> {
        self.bang_with(id, None)
    }

    pub fn bang_with(&mut self, id: NodeId, arg: Option<f64>) -> Result<(), GraphError> {
        self.check(id)?;
        self.control(id, |node, ctx| node.bang(ctx, arg));
        Ok(())
    }

    pub fn release(&mut self, id: NodeId) -> Result<(), GraphError> {
        self.check(id)?;
        if self.capabilities(id).contains(Capabilities::RELEASE) {
            self.control(id, |node, ctx| node.release(ctx));
        }
        Ok(())
    }

    pub fn reset(&mut self, id: NodeId) -> Result<(), GraphError> {
        self.check(id)?;
        if self.capabilities(id).contains(Capabilities::RESET) {
            self.control(id, |node, ctx| node.reset(ctx));
        }
        Ok(())
    }

    /// Run a control call from outside a tick. Tasks it queues are applied
    /// once the node is back in its slot.
    fn control(&mut self, id: NodeId, f: impl FnOnce(&mut dyn Node, &mut ProcessCtx<'_>)) {
        let was_busy = std::mem::replace(&mut self.busy, true);
        self.with_node(id, f);
        self.busy = was_busy;
        if !self.playing && !self.busy {
            self.run_tasks();
        }
    }

    /// Register a timer or listener with the scheduler.
    pub fn start(&mut self, id: NodeId) -> Result<(), GraphError> {
        self.check(id)?;
        let caps = self.capabilities(id);
        if caps.contains(Capabilities::TIMER) {
            self.queue(TickTask::StartTimer(id));
        } else if caps.contains(Capabilities::LISTENER) {
            self.queue(TickTask::Listen(id));
        } else {
            debug!(node = %id, "start ignored, node is neither timer nor listener");
        }
        Ok(())
    }

    pub fn stop(&mut self, id: NodeId) -> Result<(), GraphError> {
        self.check(id)?;
        let caps = self.capabilities(id);
        if caps.contains(Capabilities::TIMER) {
            self.queue(TickTask::StopTimer(id));
        } else if caps.contains(Capabilities::LISTENER) {
            self.queue(TickTask::Unlisten(id));
        }
        Ok(())
    }

    /// Route a node to the output mix through its own system inlet.
    pub fn play(&mut self, id: NodeId) -> Result<(), GraphError> {
        self.check(id)?;
        if self.get::<SystemInlet>(id).is_some() {
            self.queue(TickTask::Play(id));
            return Ok(());
        }
        let inlet = match self.dacs.get(&id) {
            Some(&inlet) if self.contains(inlet) => inlet,
            _ => {
                let ctx = self.ctx;
                let inlet = self.add(SystemInlet::new(&ctx));
                self.dacs.insert(id, inlet);
                inlet
            }
        };
        let core = self.core_mut(inlet)?;
        let added = !core.inputs.contains(&id);
        if added {
            core.inputs.push(id);
        }
        self.queue(TickTask::Play(inlet));
        if added {
            self.push_event(id, NodeEvent::Played);
        }
        Ok(())
    }

    pub fn pause(&mut self, id: NodeId) -> Result<(), GraphError> {
        self.check(id)?;
        if self.get::<SystemInlet>(id).is_some() {
            self.queue(TickTask::Pause(id));
            return Ok(());
        }
        let Some(&inlet) = self.dacs.get(&id) else {
            return Ok(());
        };
        let core = self.core_mut(inlet)?;
        if !core.inputs.contains(&id) {
            return Ok(());
        }
        core.inputs.retain(|&i| i != id);
        if core.inputs.is_empty() {
            self.queue(TickTask::Pause(inlet));
        }
        self.push_event(id, NodeEvent::Paused);
        Ok(())
    }

    pub fn is_playing(&self, id: NodeId) -> bool {
        if self.inlets.contains(&id) {
            return true;
        }
        self.dacs
            .get(&id)
            .is_some_and(|inlet| self.inlets.contains(inlet) && self.inputs(*inlet).contains(&id))
    }

    pub fn timers(&self) -> &[NodeId] {
        &self.timers
    }

    pub fn listeners(&self) -> &[NodeId] {
        &self.listeners
    }

    pub fn inlets(&self) -> &[NodeId] {
        &self.inlets
    }

    /* Events */

    fn push_event(&mut self, node: NodeId, event: NodeEvent) {
        if self.events.len() >= MAX_PENDING_EVENTS {
            self.events.pop_front();
        }
        self.events.push_back(GraphEvent { node, event });
    }

    pub fn drain_events(&mut self) -> Vec<GraphEvent> {
        self.events.drain(..).collect()
    }

    /* Ticks */

    /// Queue a task. Applied right away when the system is idle.
    pub fn queue(&mut self, task: TickTask) {
        self.tasks.push(task);
        if !self.playing && !self.busy {
            self.run_tasks();
        }
    }

    /// Apply queued tasks. While playing only the tasks queued so far run;
    /// anything they queue waits for the next tick.
    pub(crate) fn run_tasks(&mut self) {
        loop {
            let tasks = std::mem::take(&mut self.tasks);
            if tasks.is_empty() {
                break;
            }
            self.busy = true;
            for task in tasks {
                self.apply(task);
            }
            self.busy = false;
            if self.playing {
                break;
            }
        }
    }

    fn apply(&mut self, task: TickTask) {
        match task {
            TickTask::End { node, hold } => {
                self.with_node(node, |n, ctx| {
                    let core = n.core_mut();
                    if let Some(value) = hold {
                        core.fill(value);
                    }
                    core.ended = true;
                    ctx.emit(NodeEvent::Ended);
                    n.on_ended(ctx);
                });
            }
            TickTask::Wake(node) => {
                self.with_node(node, |n, ctx| n.wake(ctx));
            }
            TickTask::StartTimer(node) => {
                if !self.timers.contains(&node) && self.with_node(node, |n, ctx| n.on_start(ctx)) == Some(true) {
                    self.timers.push(node);
                    self.push_event(node, NodeEvent::Started);
                    debug!(node = %node, "timer started");
                }
            }
            TickTask::StopTimer(node) => {
                if self.timers.contains(&node) && self.with_node(node, |n, ctx| n.on_stop(ctx)) != Some(false) {
                    self.timers.retain(|&i| i != node);
                    self.push_event(node, NodeEvent::Stopped);
                    debug!(node = %node, "timer stopped");
                }
            }
            TickTask::Listen(node) => {
                if !self.listeners.contains(&node) && self.with_node(node, |n, ctx| n.on_start(ctx)) == Some(true) {
                    self.listeners.push(node);
                    self.push_event(node, NodeEvent::Started);
                    debug!(node = %node, "listener added");
                }
            }
            TickTask::Unlisten(node) => {
                if self.listeners.contains(&node) && self.with_node(node, |n, ctx| n.on_stop(ctx)) != Some(false) {
                    self.listeners.retain(|&i| i != node);
                    self.push_event(node, NodeEvent::Stopped);
                    debug!(node = %node, "listener removed");
                }
            }
            TickTask::Play(inlet) => {
                if self.contains(inlet) && !self.inlets.contains(&inlet) {
                    self.inlets.push(inlet);
                    self.push_event(inlet, NodeEvent::Played);
                    debug!(inlet = %inlet, "inlet playing");
                }
            }
            TickTask::Pause(inlet) => {
                if self.inlets.contains(&inlet) {
                    self.inlets.retain(|&i| i != inlet);
                    self.push_event(inlet, NodeEvent::Paused);
                    debug!(inlet = %inlet, "inlet paused");
                }
            }
        }
    }

    pub(crate) fn begin_tick(&mut self) -> u64 {
        self.tick += 1;
        self.busy = true;
        self.tick
    }

    pub(crate) fn end_tick(&mut self) {
        self.current_time += self.ctx.cell_ms();
        self.busy = false;
        self.run_tasks();
    }

    pub(crate) fn process_timers(&mut self) {
        for i in 0..self.timers.len() {
            let id = self.timers[i];
            self.pull(id);
        }
    }

    pub(crate) fn process_listeners(&mut self) {
        for i in 0..self.listeners.len() {
            let id = self.listeners[i];
            self.pull(id);
        }
    }

    /// Evaluate one tick with `id` as the only sink (timers and listeners
    /// still run) and return its cell.
    pub fn render(&mut self, id: NodeId) -> &[f32] {
        self.begin_tick();
        self.process_timers();
        self.pull(id);
        self.process_listeners();
        self.end_tick();
        self.cell(id)
    }
}

/// A node's view of the graph while it processes or handles a control call.
pub struct ProcessCtx<'g> {
    graph: &'g mut Graph,
    id: NodeId,
}

impl ProcessCtx<'_> {
    /// The node being run.
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn tick(&self) -> u64 {
        self.graph.tick
    }

    pub fn context(&self) -> &AudioContext {
        &self.graph.ctx
    }

    pub fn current_time(&self) -> f64 {
        self.graph.current_time
    }

    pub fn pull(&mut self, id: NodeId) {
        self.graph.pull(id);
    }

    pub fn cell(&self, id: NodeId) -> &[f32] {
        self.graph.cell(id)
    }

    pub fn pull_cell(&mut self, id: NodeId) -> &[f32] {
        self.graph.pull(id);
        self.graph.cell(id)
    }

    pub fn pull_stereo(&mut self, id: NodeId) -> (&[f32], &[f32]) {
        self.graph.pull(id);
        self.graph.stereo_cells(id)
    }

    /// Pull a node and read its first sample.
    pub fn value(&mut self, id: NodeId) -> f32 {
        self.pull_cell(id).first().copied().unwrap_or(0.0)
    }

    pub fn param(&mut self, param: Param) -> f32 {
        match param {
            Param::Value(value) => value,
            Param::Node(id) => self.value(id),
        }
    }

    pub fn is_ar(&self, id: NodeId) -> bool {
        self.graph.node(id).is_some_and(|n| n.core().is_ar())
    }

    pub fn node<T: Node>(&self, id: NodeId) -> Option<&T> {
        self.graph.get(id)
    }

    pub fn bang(&mut self, id: NodeId, arg: Option<f64>) {
        self.graph.with_node(id, |node, ctx| node.bang(ctx, arg));
    }

    pub fn emit(&mut self, event: NodeEvent) {
        let id = self.id;
        self.graph.push_event(id, event);
    }

    pub fn defer(&mut self, task: TickTask) {
        self.graph.queue(task);
    }

    /// Mark this node ended after the tick.
    pub fn end(&mut self, hold: Option<f32>) {
        let node = self.id;
        self.defer(TickTask::End { node, hold });
    }

    /// Call this node's `wake` after the tick.
    pub fn wake_later(&mut self) {
        let node = self.id;
        self.defer(TickTask::Wake(node));
    }

    pub fn start_self(&mut self) {
        let node = self.id;
        self.defer(TickTask::StartTimer(node));
    }

    pub fn stop_self(&mut self) {
        let node = self.id;
        self.defer(TickTask::StopTimer(node));
    }

    pub fn graph(&self) -> &Graph {
        &*self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impl_node_core;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Emits a constant and counts how often it runs.
    struct Counter {
        core: NodeCore,
        calls: Arc<AtomicUsize>,
    }

    impl Node for Counter {
        impl_node_core!();

        fn process(&mut self, _ctx: &mut ProcessCtx<'_>) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.core.cell.fill(0.25);
        }
    }

    fn ctx() -> AudioContext {
        AudioContext::builder().sample_rate(8000).cell_size(32).build()
    }

    fn counter(ctx: &AudioContext) -> (Counter, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let node = Counter {
            core: NodeCore::new(ctx),
            calls: Arc::clone(&calls),
        };
        (node, calls)
    }

    #[test]
    fn shared_input_runs_once_per_tick() {
        let ctx = ctx();
        let mut graph = Graph::new(&ctx);
        let (node, calls) = counter(&ctx);
        let shared = graph.add(node);
        let a = graph.add(math::PlusNode::new(&ctx));
        let b = graph.add(math::PlusNode::new(&ctx));
        let sink = graph.add(math::PlusNode::new(&ctx));
        graph.append(a, shared).unwrap();
        graph.append(b, shared).unwrap();
        graph.append_all(sink, [a, b]).unwrap();

        let out = graph.render(sink).to_vec();
        assert_eq!(calls.load(Ordering::SeqCst), 1, "diamond must not re-run the shared node");
        assert!(out.iter().all(|&x| x == 0.5));

        graph.render(sink);
        graph.render(sink);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn cycles_are_rejected() {
        let ctx = ctx();
        let mut graph = Graph::new(&ctx);
        let a = graph.add(math::PlusNode::new(&ctx));
        let b = graph.add(math::PlusNode::new(&ctx));
        graph.append(b, a).unwrap();
        assert_eq!(graph.append(a, b), Err(GraphError::Cycle { from: b, to: a }));
        assert_eq!(graph.append(a, a), Err(GraphError::Cycle { from: a, to: a }));
    }

    #[test]
    fn values_are_wrapped() {
        let ctx = ctx();
        let mut graph = Graph::new(&ctx);
        let sum = graph.add(math::PlusNode::new(&ctx));
        graph.append(sum, 0.5).unwrap();
        graph.append(sum, true).unwrap();
        assert_eq!(graph.len(), 3);
        assert!(graph.render(sum).iter().all(|&x| x == 1.5));
    }

    #[test]
    fn removed_nodes_read_as_silence() {
        let ctx = ctx();
        let mut graph = Graph::new(&ctx);
        let sum = graph.add(math::PlusNode::new(&ctx));
        let one = graph.append(sum, 1.0).unwrap();
        graph.remove(one).unwrap();
        assert!(graph.inputs(sum).is_empty());
        assert!(graph.render(sum).iter().all(|&x| x == 0.0));
        assert_eq!(graph.remove(one), Err(GraphError::UnknownNode(one)));
    }

    #[test]
    fn removed_slots_are_reused_without_reviving_old_ids() {
        let ctx = ctx();
        let mut graph = Graph::new(&ctx);
        let sum = graph.add(math::PlusNode::new(&ctx));
        for _ in 0..100 {
            let value = graph.append(sum, 1.0).unwrap();
            graph.remove(value).unwrap();
        }
        assert_eq!(graph.slots.len(), 2, "churn does not grow the arena");
        assert_eq!(graph.len(), 1);

        let old = graph.append(sum, 0.25).unwrap();
        graph.remove(old).unwrap();
        let new = graph.add(ValueNode::new(&ctx, 0.75));
        assert_eq!(new.index(), old.index());
        assert_ne!(new, old);
        assert!(!graph.contains(old));
        assert!(graph.get::<ValueNode>(old).is_none());
        assert_eq!(graph.capabilities(old), Capabilities::default());
        assert_eq!(graph.append(sum, old), Err(GraphError::UnknownNode(old)));

        graph.append(sum, new).unwrap();
        assert!(graph.render(sum).iter().all(|&x| x == 0.75));
    }

    #[test]
    fn play_creates_an_inlet_and_reports_events() {
        let ctx = ctx();
        let mut graph = Graph::new(&ctx);
        let (node, _) = counter(&ctx);
        let id = graph.add(node);
        graph.play(id).unwrap();
        assert!(graph.is_playing(id));
        assert_eq!(graph.inlets().len(), 1);

        graph.pause(id).unwrap();
        assert!(!graph.is_playing(id));
        assert!(graph.inlets().is_empty(), "empty inlet leaves the mix");

        let events: Vec<NodeEvent> = graph.drain_events().into_iter().map(|e| e.event).collect();
        assert!(events.contains(&NodeEvent::Played));
        assert!(events.contains(&NodeEvent::Paused));
    }

    #[test]
    fn downcast_access() {
        let ctx = ctx();
        let mut graph = Graph::new(&ctx);
        let id = graph.add(ValueNode::new(&ctx, 3.0));
        assert!(graph.get::<math::PlusNode>(id).is_none());
        graph.get_mut::<ValueNode>(id).unwrap().set_value(4.0);
        assert_eq!(graph.render(id)[0], 4.0);
    }
}
