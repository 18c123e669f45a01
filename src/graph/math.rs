use crate::context::AudioContext;
use crate::graph::{mix_inputs, scale_output_ar, sum_inputs_ar, sum_inputs_kr, Node, NodeCore, ProcessCtx, Rate};
use crate::impl_node_core;

/// Sum of the inputs.
pub struct PlusNode {
    core: NodeCore,
}

impl PlusNode {
    pub fn new(ctx: &AudioContext) -> Self {
        Self {
            core: NodeCore::new(ctx),
        }
    }

    pub fn kr(mut self) -> Self {
        self.core.set_rate(Rate::Control);
        self
    }
}

impl Node for PlusNode {
    impl_node_core!();

    fn process(&mut self, ctx: &mut ProcessCtx<'_>) {
        mix_inputs(&mut self.core, ctx);
    }
}

/// Product of the inputs. No inputs gives 1.
pub struct TimesNode {
    core: NodeCore,
}

impl TimesNode {
    pub fn new(ctx: &AudioContext) -> Self {
        Self {
            core: NodeCore::new(ctx),
        }
    }

    pub fn kr(mut self) -> Self {
        self.core.set_rate(Rate::Control);
        self
    }
}

impl Node for TimesNode {
    impl_node_core!();

    fn process(&mut self, ctx: &mut ProcessCtx<'_>) {
        let ar = self.core.is_ar();
        let NodeCore {
            cell, inputs, mul, add, ..
        } = &mut self.core;

        if ar {
            cell.fill(1.0);
            for &input in inputs.iter() {
                let src = ctx.pull_cell(input);
                for (dst, &x) in cell.iter_mut().zip(src) {
                    *dst *= x;
                }
            }
            if *mul != 1.0 || *add != 0.0 {
                for x in cell.iter_mut() {
                    *x = *x * *mul + *add;
                }
            }
        } else {
            let mut product = 1.0;
            for &input in inputs.iter() {
                product *= ctx.value(input);
            }
            cell.fill(product * *mul + *add);
        }
    }
}

/// Clamp of the summed inputs to `[min, max]`, then mul/add.
pub struct ClipNode {
    core: NodeCore,
    min: f32,
    max: f32,
}

impl ClipNode {
    pub fn new(ctx: &AudioContext) -> Self {
        Self {
            core: NodeCore::new(ctx),
            min: -0.8,
            max: 0.8,
        }
    }

    pub fn kr(mut self) -> Self {
        self.core.set_rate(Rate::Control);
        self
    }

    /// Symmetric range `[-|x|, |x|]`.
    pub fn minmax(mut self, x: f32) -> Self {
        self.set_minmax(x);
        self
    }

    pub fn set_minmax(&mut self, x: f32) {
        self.min = -x.abs();
        self.max = x.abs();
    }

    /// A minimum above the current maximum moves the maximum instead.
    pub fn set_min(&mut self, x: f32) {
        if self.max < x {
            self.max = x;
        } else {
            self.min = x;
        }
    }

    /// A maximum below the current minimum moves the minimum instead.
    pub fn set_max(&mut self, x: f32) {
        if x < self.min {
            self.min = x;
        } else {
            self.max = x;
        }
    }

    pub fn range(&self) -> (f32, f32) {
        (self.min, self.max)
    }
}

impl Node for ClipNode {
    impl_node_core!();

    fn process(&mut self, ctx: &mut ProcessCtx<'_>) {
        let (min, max) = (self.min, self.max);
        if self.core.is_ar() {
            sum_inputs_ar(&mut self.core, ctx);
            for x in self.core.cell.iter_mut() {
                *x = x.clamp(min, max);
            }
            scale_output_ar(&mut self.core);
        } else {
            let x = sum_inputs_kr(&self.core, ctx).clamp(min, max);
            let value = x * self.core.mul + self.core.add;
            self.core.cell.fill(value);
        }
    }
}
