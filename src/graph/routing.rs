use std::collections::HashMap;
use std::f32::consts::FRAC_PI_2;

use crate::context::AudioContext;
use crate::error::GraphError;
use crate::graph::{scale_output_ar, sum_inputs_ar, Graph, Node, NodeCore, NodeId, Param, ProcessCtx};
use crate::impl_node_core;

/*
Routing
=======

  PannerNode    mono sum -> equal-power stereo pair
  GateNode      one input, many outputs; only the selected output is live
  SelectorNode  many inputs, one output; only the selected input is heard

Equal-power pan law, with the pan value v in [-1, 1]:

    t = (v * 0.5 + 0.5) * π/2
    L = cos t      R = sin t        L² + R² = 1

Gate outputs are nodes of their own that read the gate. An output copies
the gate's cell while it is the selected one and is silent otherwise.
*/

pub struct PannerNode {
    core: NodeCore,
    value: Param,
    prev: Option<f32>,
    gain_l: f32,
    gain_r: f32,
}

impl PannerNode {
    pub fn new(ctx: &AudioContext) -> Self {
        Self {
            core: NodeCore::audio(ctx).with_stereo(),
            value: Param::Value(0.0),
            prev: None,
            gain_l: 0.0,
            gain_r: 0.0,
        }
    }

    pub fn pan(mut self, value: impl Into<Param>) -> Self {
        self.set_pan(value);
        self
    }

    pub fn set_pan(&mut self, value: impl Into<Param>) {
        self.value = value.into();
    }

    pub fn gains(&self) -> (f32, f32) {
        (self.gain_l, self.gain_r)
    }
}

impl Node for PannerNode {
    impl_node_core!();

    fn dependencies(&self) -> Vec<NodeId> {
        self.value.node().into_iter().collect()
    }

    fn process(&mut self, ctx: &mut ProcessCtx<'_>) {
        let value = ctx.param(self.value);
        if self.prev != Some(value) {
            self.prev = Some(value);
            let t = (value * 0.5 + 0.5) * FRAC_PI_2;
            self.gain_l = t.cos();
            self.gain_r = t.sin();
        }

        sum_inputs_ar(&mut self.core, ctx);
        let (gl, gr) = (self.gain_l, self.gain_r);
        let NodeCore {
            cell, stereo, mul, add, ..
        } = &mut self.core;
        let Some(stereo) = stereo else {
            return;
        };
        for ((x, l), r) in cell.iter_mut().zip(stereo.left.iter_mut()).zip(stereo.right.iter_mut()) {
            *l = *x * gl * *mul + *add;
            *r = *x * gr * *mul + *add;
            *x = (*l + *r) * 0.5;
        }
    }
}

/// Sums its inputs and hands the result to the selected `GateOutput`.
pub struct GateNode {
    core: NodeCore,
    selected: usize,
    outputs: HashMap<usize, NodeId>,
}

impl GateNode {
    pub fn new(ctx: &AudioContext) -> Self {
        Self {
            core: NodeCore::audio(ctx),
            selected: 0,
            outputs: HashMap::new(),
        }
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn select(&mut self, index: usize) {
        self.selected = index;
    }

    /// The output node for `index`, created on first use.
    pub fn output(graph: &mut Graph, gate: NodeId, index: usize) -> Result<NodeId, GraphError> {
        let existing = graph
            .get::<GateNode>(gate)
            .ok_or(GraphError::UnknownNode(gate))?
            .outputs
            .get(&index)
            .copied();
        if let Some(id) = existing.filter(|&id| graph.contains(id)) {
            return Ok(id);
        }
        let ctx = *graph.context();
        let id = graph.add(GateOutput::new(&ctx, gate, index));
        if let Some(node) = graph.get_mut::<GateNode>(gate) {
            node.outputs.insert(index, id);
        }
        Ok(id)
    }
}

impl Node for GateNode {
    impl_node_core!();

    fn process(&mut self, ctx: &mut ProcessCtx<'_>) {
        sum_inputs_ar(&mut self.core, ctx);
        scale_output_ar(&mut self.core);
    }
}

pub struct GateOutput {
    core: NodeCore,
    gate: NodeId,
    index: usize,
}

impl GateOutput {
    fn new(ctx: &AudioContext, gate: NodeId, index: usize) -> Self {
        Self {
            core: NodeCore::audio(ctx),
            gate,
            index,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

impl Node for GateOutput {
    impl_node_core!();

    fn dependencies(&self) -> Vec<NodeId> {
        vec![self.gate]
    }

    fn process(&mut self, ctx: &mut ProcessCtx<'_>) {
        ctx.pull(self.gate);
        let live = ctx.node::<GateNode>(self.gate).is_some_and(|g| g.selected == self.index);
        if live {
            let src = ctx.cell(self.gate);
            let n = self.core.cell.len();
            self.core.cell.copy_from_slice(&src[..n]);
        } else {
            self.core.cell.fill(0.0);
        }
    }
}

/// Passes through one of its inputs. With `background` set the other inputs
/// keep running unheard.
pub struct SelectorNode {
    core: NodeCore,
    selected: usize,
    pub background: bool,
}

impl SelectorNode {
    pub fn new(ctx: &AudioContext) -> Self {
        Self {
            core: NodeCore::new(ctx),
            selected: 0,
            background: false,
        }
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn select(&mut self, index: usize) {
        self.selected = index;
        self.core.cell.fill(0.0);
    }
}

impl Node for SelectorNode {
    impl_node_core!();

    fn process(&mut self, ctx: &mut ProcessCtx<'_>) {
        if self.background {
            for &input in &self.core.inputs {
                ctx.pull(input);
            }
        }
        match self.core.inputs.get(self.selected).copied() {
            Some(input) => {
                let src = ctx.pull_cell(input);
                let n = self.core.cell.len();
                self.core.cell.copy_from_slice(&src[..n]);
            }
            None => self.core.cell.fill(0.0),
        }
        scale_output_ar(&mut self.core);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{SystemInlet, ValueNode};

    fn ctx() -> AudioContext {
        AudioContext::builder().cell_size(32).build()
    }

    #[test]
    fn center_pan_is_equal_power() {
        let ctx = ctx();
        let mut graph = Graph::new(&ctx);
        let pan = graph.add(PannerNode::new(&ctx));
        graph.append(pan, 1.0).unwrap();
        graph.render(pan);

        let (l, r) = graph.stereo_cells(pan);
        let expected = std::f32::consts::FRAC_1_SQRT_2;
        assert!((l[0] - expected).abs() < 1e-6);
        assert!((r[0] - expected).abs() < 1e-6);
        assert!((l[0] * l[0] + r[0] * r[0] - 1.0).abs() < 1e-6);
        assert!((graph.cell(pan)[0] - expected).abs() < 1e-6);
    }

    #[test]
    fn pan_follows_a_control_node() {
        let ctx = ctx();
        let mut graph = Graph::new(&ctx);
        let position = graph.add(ValueNode::new(&ctx, -1.0));
        let pan = graph.add(PannerNode::new(&ctx).pan(position));
        graph.append(pan, 1.0).unwrap();
        graph.render(pan);
        assert!((graph.stereo_cells(pan).0[0] - 1.0).abs() < 1e-6);

        graph.get_mut::<ValueNode>(position).unwrap().set_value(1.0);
        graph.render(pan);
        assert!(graph.stereo_cells(pan).0[0].abs() < 1e-6);
        assert_eq!(graph.append(position, pan), Err(GraphError::Cycle { from: pan, to: position }));
    }

    #[test]
    fn gate_routes_to_selected_output() {
        let ctx = ctx();
        let mut graph = Graph::new(&ctx);
        let gate = graph.add(GateNode::new(&ctx));
        graph.append(gate, 0.5).unwrap();
        let out0 = GateNode::output(&mut graph, gate, 0).unwrap();
        let out1 = GateNode::output(&mut graph, gate, 1).unwrap();
        assert_eq!(GateNode::output(&mut graph, gate, 1).unwrap(), out1, "outputs are reused");

        let sink = graph.add(SystemInlet::new(&ctx));
        graph.append_all(sink, [out0, out1]).unwrap();
        graph.render(sink);
        assert!(graph.cell(out0).iter().all(|&x| x == 0.5));
        assert!(graph.cell(out1).iter().all(|&x| x == 0.0));

        graph.get_mut::<GateNode>(gate).unwrap().select(1);
        graph.render(sink);
        assert!(graph.cell(out0).iter().all(|&x| x == 0.0));
        assert!(graph.cell(out1).iter().all(|&x| x == 0.5));
    }

    #[test]
    fn selector_passes_one_input() {
        let ctx = ctx();
        let mut graph = Graph::new(&ctx);
        let sel = graph.add(SelectorNode::new(&ctx));
        graph.append_all(sel, [0.1, 0.2, 0.3]).unwrap();
        assert_eq!(graph.render(sel)[0], 0.1);

        graph.get_mut::<SelectorNode>(sel).unwrap().select(2);
        assert_eq!(graph.cell(sel)[0], 0.0, "switching clears the cell");
        assert_eq!(graph.render(sel)[0], 0.3);

        graph.get_mut::<SelectorNode>(sel).unwrap().select(7);
        assert_eq!(graph.render(sel)[0], 0.0);
    }
}
