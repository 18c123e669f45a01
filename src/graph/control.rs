use std::collections::HashMap;

use crate::context::AudioContext;
use crate::graph::{sum_inputs_kr, Capabilities, Node, NodeCore, ProcessCtx};
use crate::impl_node_core;

/*
Control Mapping
===============

Small control-rate converters. Each reads one number per tick (the sum of
its inputs, or a stored value when it has none), maps it, and broadcasts
`mapped * mul + add` over its cell.

  MapNode        any function, re-evaluated only when the input changes
  MidiCpsNode    a4 * 2^((midi - 69) / 12)
  MidiRatioNode  2^(midi / range)
  ZMapNode       range warping: linlin, linexp, explin, expexp
  NDictNode      lookup table keyed by the rounded input
*/

type MapFn = Box<dyn FnMut(f64) -> f64 + Send>;

fn read_input(core: &NodeCore, ctx: &mut ProcessCtx<'_>, fallback: f64) -> f64 {
    if core.inputs.is_empty() {
        fallback
    } else {
        sum_inputs_kr(core, ctx) as f64
    }
}

fn broadcast(core: &mut NodeCore, value: f64) {
    let x = value as f32 * core.mul + core.add;
    core.cell.fill(x);
}

pub struct MapNode {
    core: NodeCore,
    input: f64,
    prev: Option<f64>,
    output: f64,
    map: MapFn,
}

impl MapNode {
    pub fn new<F>(ctx: &AudioContext, map: F) -> Self
    where
        F: FnMut(f64) -> f64 + Send + 'static,
    {
        Self {
            core: NodeCore::new(ctx),
            input: 0.0,
            prev: None,
            output: 0.0,
            map: Box::new(map),
        }
    }

    /// Value used while the node has no inputs.
    pub fn set_input(&mut self, input: f64) {
        self.input = input;
    }

    pub fn set_map<F>(&mut self, map: F)
    where
        F: FnMut(f64) -> f64 + Send + 'static,
    {
        self.map = Box::new(map);
        self.prev = None;
    }

    pub fn at(&mut self, input: f64) -> f64 {
        (self.map)(input)
    }
}

impl Node for MapNode {
    impl_node_core!();

    fn capabilities(&self) -> Capabilities {
        Capabilities::BANG
    }

    fn process(&mut self, ctx: &mut ProcessCtx<'_>) {
        let input = read_input(&self.core, ctx, self.input);
        if self.prev != Some(input) {
            self.prev = Some(input);
            self.output = (self.map)(input);
        }
        broadcast(&mut self.core, self.output);
    }

    /// Forces the map to run again on the next tick.
    fn bang(&mut self, _ctx: &mut ProcessCtx<'_>, _arg: Option<f64>) {
        self.prev = None;
    }
}

pub struct MidiCpsNode {
    core: NodeCore,
    midi: f64,
    a4: f64,
    prev: Option<f64>,
    value: f64,
}

impl MidiCpsNode {
    pub fn new(ctx: &AudioContext) -> Self {
        Self {
            core: NodeCore::new(ctx),
            midi: 0.0,
            a4: 440.0,
            prev: None,
            value: 0.0,
        }
    }

    pub fn set_midi(&mut self, midi: f64) {
        self.midi = midi;
    }

    pub fn set_a4(&mut self, hz: f64) {
        self.a4 = hz;
        self.prev = None;
    }

    pub fn at(&self, midi: f64) -> f64 {
        self.a4 * 2f64.powf((midi - 69.0) / 12.0)
    }
}

impl Node for MidiCpsNode {
    impl_node_core!();

    fn capabilities(&self) -> Capabilities {
        Capabilities::BANG
    }

    fn process(&mut self, ctx: &mut ProcessCtx<'_>) {
        let midi = read_input(&self.core, ctx, self.midi);
        if self.prev != Some(midi) {
            self.prev = Some(midi);
            self.value = self.at(midi);
        }
        broadcast(&mut self.core, self.value);
    }

    fn bang(&mut self, _ctx: &mut ProcessCtx<'_>, _arg: Option<f64>) {
        self.prev = None;
    }
}

pub struct MidiRatioNode {
    core: NodeCore,
    midi: f64,
    range: f64,
    prev: Option<f64>,
    value: f64,
}

impl MidiRatioNode {
    pub fn new(ctx: &AudioContext) -> Self {
        Self {
            core: NodeCore::new(ctx),
            midi: 0.0,
            range: 12.0,
            prev: None,
            value: 0.0,
        }
    }

    pub fn set_midi(&mut self, midi: f64) {
        self.midi = midi;
    }

    /// Steps per octave. Non-positive values are ignored.
    pub fn set_range(&mut self, range: f64) {
        if range > 0.0 {
            self.range = range;
            self.prev = None;
        }
    }

    pub fn at(&self, midi: f64) -> f64 {
        2f64.powf(midi / self.range)
    }
}

impl Node for MidiRatioNode {
    impl_node_core!();

    fn capabilities(&self) -> Capabilities {
        Capabilities::BANG
    }

    fn process(&mut self, ctx: &mut ProcessCtx<'_>) {
        let midi = read_input(&self.core, ctx, self.midi);
        if self.prev != Some(midi) {
            self.prev = Some(midi);
            self.value = self.at(midi);
        }
        broadcast(&mut self.core, self.value);
    }

    fn bang(&mut self, _ctx: &mut ProcessCtx<'_>, _arg: Option<f64>) {
        self.prev = None;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Warp {
    #[default]
    LinLin,
    LinExp,
    ExpLin,
    ExpExp,
}

impl Warp {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "linlin" => Some(Warp::LinLin),
            "linexp" => Some(Warp::LinExp),
            "explin" => Some(Warp::ExpLin),
            "expexp" => Some(Warp::ExpExp),
            _ => None,
        }
    }

    /// Map `x` from `[in_min, in_max]` to `[out_min, out_max]`. Inputs
    /// outside the range pin to the ends; degenerate ranges never divide
    /// by zero.
    pub fn apply(self, x: f64, in_min: f64, in_max: f64, out_min: f64, out_max: f64) -> f64 {
        if x < in_min {
            return out_min;
        }
        if x > in_max {
            return out_max;
        }
        match self {
            Warp::LinLin => {
                if in_max == in_min {
                    return out_min;
                }
                (x - in_min) / (in_max - in_min) * (out_max - out_min) + out_min
            }
            Warp::LinExp => {
                if out_min == 0.0 {
                    return 0.0;
                }
                if in_max == in_min {
                    return out_max;
                }
                (out_max / out_min).powf((x - in_min) / (in_max - in_min)) * out_min
            }
            Warp::ExpLin => {
                if in_min == 0.0 {
                    return out_max;
                }
                (x / in_min).ln() / (in_max / in_min).ln() * (out_max - out_min) + out_min
            }
            Warp::ExpExp => {
                if in_min == 0.0 || out_min == 0.0 {
                    return 0.0;
                }
                (out_max / out_min).powf((x / in_min).ln() / (in_max / in_min).ln()) * out_min
            }
        }
    }
}

pub struct ZMapNode {
    core: NodeCore,
    pub in_min: f64,
    pub in_max: f64,
    pub out_min: f64,
    pub out_max: f64,
    pub warp: Warp,
}

impl ZMapNode {
    pub fn new(ctx: &AudioContext) -> Self {
        Self {
            core: NodeCore::control(ctx),
            in_min: 0.0,
            in_max: 1.0,
            out_min: 0.0,
            out_max: 1.0,
            warp: Warp::LinLin,
        }
    }

    pub fn input_range(mut self, min: f64, max: f64) -> Self {
        self.in_min = min;
        self.in_max = max;
        self
    }

    pub fn output_range(mut self, min: f64, max: f64) -> Self {
        self.out_min = min;
        self.out_max = max;
        self
    }

    /// Unknown names keep the current warp.
    pub fn set_warp(&mut self, name: &str) -> bool {
        match Warp::parse(name) {
            Some(warp) => {
                self.warp = warp;
                true
            }
            None => false,
        }
    }
}

impl Node for ZMapNode {
    impl_node_core!();

    fn process(&mut self, ctx: &mut ProcessCtx<'_>) {
        let x = sum_inputs_kr(&self.core, ctx) as f64;
        let y = self.warp.apply(x, self.in_min, self.in_max, self.out_min, self.out_max);
        broadcast(&mut self.core, y);
    }
}

pub struct NDictNode {
    core: NodeCore,
    dict: HashMap<i64, f64>,
    default_value: f64,
    index: f64,
}

impl NDictNode {
    pub fn new(ctx: &AudioContext) -> Self {
        Self {
            core: NodeCore::control(ctx),
            dict: HashMap::new(),
            default_value: 0.0,
            index: 0.0,
        }
    }

    pub fn with_dict(mut self, dict: HashMap<i64, f64>) -> Self {
        self.dict = dict;
        self
    }

    /// Fill keys 0..128 from a function of the key.
    pub fn from_fn(mut self, f: impl Fn(i64) -> f64) -> Self {
        self.dict = (0..128).map(|i| (i, f(i))).collect();
        self
    }

    pub fn set_default(&mut self, value: f64) {
        self.default_value = value;
    }

    /// Value used while the node has no inputs.
    pub fn set_index(&mut self, index: f64) {
        self.index = index;
    }

    pub fn insert(&mut self, key: i64, value: f64) {
        self.dict.insert(key, value);
    }

    pub fn clear(&mut self) {
        self.dict.clear();
    }

    fn lookup(&self, key: i64) -> f64 {
        self.dict.get(&key).copied().unwrap_or(self.default_value)
    }

    /// Lookup with mul/add applied, keyed by the truncated index.
    pub fn at(&self, index: f64) -> f64 {
        self.lookup(index as i64) * self.core.mul as f64 + self.core.add as f64
    }
}

impl Node for NDictNode {
    impl_node_core!();

    fn process(&mut self, ctx: &mut ProcessCtx<'_>) {
        let index = read_input(&self.core, ctx, self.index);
        // rounds half away from zero
        let key = if index < 0.0 { (index - 0.5) as i64 } else { (index + 0.5) as i64 };
        let value = self.lookup(key);
        broadcast(&mut self.core, value);
    }
}
