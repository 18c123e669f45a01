use std::any::Any;
use std::ops::BitOr;

use crate::context::AudioContext;
use crate::graph::{NodeId, ProcessCtx};

/*
Node Contract
=============

Every node embeds a `NodeCore` and implements `process`. The graph calls
`process` at most once per tick: it records the tick in the core before the
call and skips any later pull in the same tick. Inside `process` a node pulls
the nodes it depends on through the `ProcessCtx`, then writes its own cell.

Rates
-----

  ar   audio rate. Every sample of the cell is meaningful.
  kr   control rate. Only cell[0] is meaningful; it is broadcast to the
       whole cell so audio-rate consumers can read it sample by sample.

Some nodes only make sense at one rate (an oscillator is always ar, a timer
is always kr). Those lock their rate at construction and ignore `set_rate`.

Output shaping
--------------

  ar   cell[i] = cell[i] * mul + add
  kr   cell[i] = cell[0] * mul + add

The free helpers below implement the common "sum the inputs" and "scale
the output" steps so nodes can compose them instead of inheriting them.
*/

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rate {
    #[default]
    Audio,
    Control,
}

#[derive(Debug, Clone)]
pub struct StereoCells {
    pub left: Vec<f32>,
    pub right: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct NodeCore {
    pub cell: Vec<f32>,
    pub stereo: Option<StereoCells>,
    pub inputs: Vec<NodeId>,
    pub mul: f32,
    pub add: f32,
    rate: Rate,
    rate_locked: bool,
    pub(crate) tick: Option<u64>,
    pub ended: bool,
}

impl NodeCore {
    pub fn new(ctx: &AudioContext) -> Self {
        Self {
            cell: vec![0.0; ctx.cell_size()],
            stereo: None,
            inputs: Vec::new(),
            mul: 1.0,
            add: 0.0,
            rate: Rate::Audio,
            rate_locked: false,
            tick: None,
            ended: false,
        }
    }

    /// Locked to audio rate.
    pub fn audio(ctx: &AudioContext) -> Self {
        Self::new(ctx).locked(Rate::Audio)
    }

    /// Locked to control rate.
    pub fn control(ctx: &AudioContext) -> Self {
        Self::new(ctx).locked(Rate::Control)
    }

    fn locked(mut self, rate: Rate) -> Self {
        self.rate = rate;
        self.rate_locked = true;
        self
    }

    /// Adds a left/right cell pair alongside the mono cell.
    pub fn with_stereo(mut self) -> Self {
        let len = self.cell.len();
        self.stereo = Some(StereoCells {
            left: vec![0.0; len],
            right: vec![0.0; len],
        });
        self
    }

    pub fn rate(&self) -> Rate {
        self.rate
    }

    pub fn is_ar(&self) -> bool {
        self.rate == Rate::Audio
    }

    pub fn is_kr(&self) -> bool {
        self.rate == Rate::Control
    }

    /// Ignored for rate-locked nodes.
    pub fn set_rate(&mut self, rate: Rate) {
        if !self.rate_locked {
            self.rate = rate;
        }
    }

    pub fn tick(&self) -> Option<u64> {
        self.tick
    }

    /// Fill every cell the node owns with one value.
    pub fn fill(&mut self, value: f32) {
        self.cell.fill(value);
        if let Some(stereo) = &mut self.stereo {
            stereo.left.fill(value);
            stereo.right.fill(value);
        }
    }
}

/// Optional behaviours, resolved once when the node is inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities(u8);

impl Capabilities {
    pub const NONE: Self = Self(0);
    pub const BANG: Self = Self(1);
    pub const RELEASE: Self = Self(1 << 1);
    pub const RESET: Self = Self(1 << 2);
    /// Runs every tick from the timer list once started.
    pub const TIMER: Self = Self(1 << 3);
    /// Runs every tick from the listener list once started.
    pub const LISTENER: Self = Self(1 << 4);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Capabilities {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

pub trait Node: Any + Send {
    fn core(&self) -> &NodeCore;

    fn core_mut(&mut self) -> &mut NodeCore;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Render this tick's cell.
    fn process(&mut self, ctx: &mut ProcessCtx<'_>);

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE
    }

    /// Nodes read through parameters rather than inputs. Used for cycle
    /// checks.
    fn dependencies(&self) -> Vec<NodeId> {
        Vec::new()
    }

    /// Trigger. `arg` is the value the sender passes along (a counter, a
    /// pattern value), if any.
    fn bang(&mut self, _ctx: &mut ProcessCtx<'_>, _arg: Option<f64>) {}

    fn release(&mut self, _ctx: &mut ProcessCtx<'_>) {}

    fn reset(&mut self, _ctx: &mut ProcessCtx<'_>) {}

    /// Called when the node is registered as a timer or listener. Returning
    /// false keeps it unregistered.
    fn on_start(&mut self, _ctx: &mut ProcessCtx<'_>) -> bool {
        true
    }

    /// Called when the node is unregistered. Returning false keeps it
    /// registered.
    fn on_stop(&mut self, _ctx: &mut ProcessCtx<'_>) -> bool {
        true
    }

    /// Called after the node has been marked ended.
    fn on_ended(&mut self, _ctx: &mut ProcessCtx<'_>) {}

    /// Continuation the node queued for itself with `TickTask::Wake`.
    fn wake(&mut self, _ctx: &mut ProcessCtx<'_>) {}
}

/// Implements the accessor half of `Node` for a struct with a `core` field.
#[macro_export]
macro_rules! impl_node_core {
    () => {
        fn core(&self) -> &$crate::graph::NodeCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut $crate::graph::NodeCore {
            &mut self.core
        }

        fn as_any(&self) -> &dyn ::std::any::Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
            self
        }
    };
}

/// Zero the cell and add every input into it.
pub fn sum_inputs_ar(core: &mut NodeCore, ctx: &mut ProcessCtx<'_>) {
    let NodeCore { cell, inputs, .. } = core;
    cell.fill(0.0);
    for &input in inputs.iter() {
        let src = ctx.pull_cell(input);
        for (dst, &x) in cell.iter_mut().zip(src) {
            *dst += x;
        }
    }
}

/// Sum of the first sample of every input.
pub fn sum_inputs_kr(core: &NodeCore, ctx: &mut ProcessCtx<'_>) -> f32 {
    let mut sum = 0.0;
    for &input in &core.inputs {
        sum += ctx.value(input);
    }
    sum
}

pub fn scale_output_ar(core: &mut NodeCore) {
    let (mul, add) = (core.mul, core.add);
    if mul != 1.0 || add != 0.0 {
        for x in core.cell.iter_mut() {
            *x = *x * mul + add;
        }
    }
}

pub fn scale_output_kr(core: &mut NodeCore) {
    let value = core.cell.first().copied().unwrap_or(0.0) * core.mul + core.add;
    core.cell.fill(value);
}

/// Rate-dependent sum then scale, the behaviour of a plain mixing node.
pub fn mix_inputs(core: &mut NodeCore, ctx: &mut ProcessCtx<'_>) {
    if core.is_ar() {
        sum_inputs_ar(core, ctx);
        scale_output_ar(core);
    } else {
        let value = sum_inputs_kr(core, ctx) * core.mul + core.add;
        core.cell.fill(value);
    }
}
