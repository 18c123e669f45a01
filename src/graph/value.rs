use crate::context::AudioContext;
use crate::graph::{Capabilities, Node, NodeCore, ProcessCtx};
use crate::impl_node_core;

/// A constant at control rate. `value * mul + add`, with NaN read as zero.
pub struct ValueNode {
    core: NodeCore,
    value: f32,
}

impl ValueNode {
    pub fn new(ctx: &AudioContext, value: f32) -> Self {
        let mut node = Self {
            core: NodeCore::control(ctx),
            value,
        };
        node.refresh();
        node
    }

    pub fn boolean(ctx: &AudioContext, value: bool) -> Self {
        Self::new(ctx, if value { 1.0 } else { 0.0 })
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn set_value(&mut self, value: f32) {
        self.value = value;
        self.refresh();
    }

    fn refresh(&mut self) {
        let x = self.value * self.core.mul + self.core.add;
        self.core.cell.fill(if x.is_nan() { 0.0 } else { x });
    }
}

impl Node for ValueNode {
    impl_node_core!();

    fn process(&mut self, _ctx: &mut ProcessCtx<'_>) {
        self.refresh();
    }
}

type Callback = Box<dyn FnMut(Option<f64>) -> Option<f64> + Send>;

/// A callback run on every bang. A returned number becomes the node's
/// value, read like a `ValueNode`.
pub struct FunctionNode {
    core: NodeCore,
    func: Callback,
    value: f32,
}

impl FunctionNode {
    pub fn new<F>(ctx: &AudioContext, func: F) -> Self
    where
        F: FnMut(Option<f64>) -> Option<f64> + Send + 'static,
    {
        Self {
            core: NodeCore::control(ctx),
            func: Box::new(func),
            value: 0.0,
        }
    }

    /// A callback with no result.
    pub fn action<F>(ctx: &AudioContext, mut func: F) -> Self
    where
        F: FnMut(Option<f64>) + Send + 'static,
    {
        Self::new(ctx, move |arg| {
            func(arg);
            None
        })
    }

    pub fn value(&self) -> f32 {
        self.value
    }
}

impl Node for FunctionNode {
    impl_node_core!();

    fn capabilities(&self) -> Capabilities {
        Capabilities::BANG
    }

    fn process(&mut self, _ctx: &mut ProcessCtx<'_>) {
        let x = self.value * self.core.mul + self.core.add;
        self.core.cell.fill(if x.is_nan() { 0.0 } else { x });
    }

    fn bang(&mut self, _ctx: &mut ProcessCtx<'_>, arg: Option<f64>) {
        if let Some(result) = (self.func)(arg) {
            self.value = result as f32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn value_applies_mul_add_and_hides_nan() {
        let ctx = AudioContext::default();
        let mut graph = Graph::new(&ctx);
        let id = graph.add(ValueNode::new(&ctx, 2.0));
        graph.set_mul(id, 3.0).unwrap();
        graph.set_add(id, 1.0).unwrap();
        assert!(graph.render(id).iter().all(|&x| x == 7.0));

        graph.get_mut::<ValueNode>(id).unwrap().set_value(f32::NAN);
        assert!(graph.render(id).iter().all(|&x| x == 0.0));
    }

    #[test]
    fn function_runs_on_bang_with_argument() {
        let ctx = AudioContext::default();
        let mut graph = Graph::new(&ctx);
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let id = graph.add(FunctionNode::new(&ctx, move |arg| {
            seen.fetch_add(1, Ordering::SeqCst);
            arg.map(|x| x * 2.0)
        }));

        graph.bang_with(id, Some(4.0)).unwrap();
        assert_eq!(graph.get::<FunctionNode>(id).unwrap().value(), 8.0);

        graph.bang(id).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(graph.render(id)[0], 8.0, "no result keeps the last value");
    }
}
