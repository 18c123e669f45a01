use crate::context::AudioContext;
use crate::graph::{Node, NodeCore, NodeId, ProcessCtx};
use crate::impl_node_core;

/// Where a node meets the output mix. Sums its inputs in stereo (mono inputs
/// feed both sides), shapes both sides with mul/add, and keeps the mean of
/// the two in its mono cell.
pub struct SystemInlet {
    core: NodeCore,
}

impl SystemInlet {
    pub fn new(ctx: &AudioContext) -> Self {
        Self {
            core: NodeCore::audio(ctx).with_stereo(),
        }
    }
}

impl Node for SystemInlet {
    impl_node_core!();

    fn process(&mut self, ctx: &mut ProcessCtx<'_>) {
        let NodeCore {
            cell,
            stereo,
            inputs,
            mul,
            add,
            ..
        } = &mut self.core;
        let Some(stereo) = stereo else {
            return;
        };
        stereo.left.fill(0.0);
        stereo.right.fill(0.0);

        for &input in inputs.iter() {
            let (l, r) = ctx.pull_stereo(input);
            for ((dl, dr), (&xl, &xr)) in stereo.left.iter_mut().zip(stereo.right.iter_mut()).zip(l.iter().zip(r)) {
                *dl += xl;
                *dr += xr;
            }
        }

        for ((x, l), r) in cell.iter_mut().zip(stereo.left.iter_mut()).zip(stereo.right.iter_mut()) {
            *l = *l * *mul + *add;
            *r = *r * *mul + *add;
            *x = (*l + *r) * 0.5;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Left,
    Right,
}

/// One side of a stereo node as a mono node of its own.
pub struct ChannelNode {
    core: NodeCore,
    parent: NodeId,
    channel: Channel,
}

impl ChannelNode {
    pub fn new(ctx: &AudioContext, parent: NodeId, channel: Channel) -> Self {
        Self {
            core: NodeCore::audio(ctx),
            parent,
            channel,
        }
    }

    pub fn parent(&self) -> NodeId {
        self.parent
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }
}

impl Node for ChannelNode {
    impl_node_core!();

    fn dependencies(&self) -> Vec<NodeId> {
        vec![self.parent]
    }

    fn process(&mut self, ctx: &mut ProcessCtx<'_>) {
        let (l, r) = ctx.pull_stereo(self.parent);
        let src = match self.channel {
            Channel::Left => l,
            Channel::Right => r,
        };
        let n = self.core.cell.len();
        self.core.cell.copy_from_slice(&src[..n]);
        crate::graph::scale_output_ar(&mut self.core);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::routing::PannerNode;
    use crate::graph::{Graph, ValueNode};

    #[test]
    fn inlet_mixes_mono_to_both_sides() {
        let ctx = AudioContext::builder().cell_size(64).build();
        let mut graph = Graph::new(&ctx);
        let inlet = graph.add(SystemInlet::new(&ctx));
        graph.append(inlet, 0.5).unwrap();
        graph.append(inlet, 0.25).unwrap();
        graph.set_mul(inlet, 2.0).unwrap();
        graph.render(inlet);

        let (l, r) = graph.stereo_cells(inlet);
        assert!(l.iter().all(|&x| x == 1.5));
        assert!(r.iter().all(|&x| x == 1.5));
        assert!(graph.cell(inlet).iter().all(|&x| x == 1.5));
    }

    #[test]
    fn channel_views_follow_the_parent() {
        let ctx = AudioContext::builder().cell_size(64).build();
        let mut graph = Graph::new(&ctx);
        let pan = graph.add(PannerNode::new(&ctx).pan(1.0));
        let src = graph.add(ValueNode::new(&ctx, 1.0));
        graph.append(pan, src).unwrap();
        let left = graph.add(ChannelNode::new(&ctx, pan, Channel::Left));
        let right = graph.add(ChannelNode::new(&ctx, pan, Channel::Right));

        assert!(graph.render(left)[0].abs() < 1e-6, "hard right pan leaves the left side empty");
        assert!((graph.render(right)[0] - 1.0).abs() < 1e-6);
    }
}
