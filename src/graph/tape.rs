use crate::context::AudioContext;
use crate::dsp::tape::{Tape, TapeStream};
use crate::graph::{Capabilities, Node, NodeCore, ProcessCtx};
use crate::impl_node_core;

/// Plays a spliced `Tape`. Fragment pans land in the left and right cells;
/// the mono cell is their mean.
pub struct TapeNode {
    core: NodeCore,
    tape: Tape,
    stream: TapeStream,
    samplerate: u32,
    looped: bool,
}

impl TapeNode {
    pub fn new(ctx: &AudioContext, tape: Tape) -> Self {
        let stream = TapeStream::new(&tape, ctx.sample_rate());
        Self {
            core: NodeCore::audio(ctx).with_stereo(),
            tape,
            stream,
            samplerate: ctx.sample_rate(),
            looped: false,
        }
    }

    pub fn looped(mut self, looped: bool) -> Self {
        self.set_looped(looped);
        self
    }

    pub fn tape(&self) -> &Tape {
        &self.tape
    }

    /// Swap the tape and rewind.
    pub fn set_tape(&mut self, tape: Tape) {
        self.stream = TapeStream::new(&tape, self.samplerate);
        self.stream.looped = self.looped;
        self.tape = tape;
        self.core.ended = false;
    }

    pub fn set_looped(&mut self, looped: bool) {
        self.looped = looped;
        self.stream.looped = looped;
    }

    pub fn is_looped(&self) -> bool {
        self.looped
    }
}

impl Node for TapeNode {
    impl_node_core!();

    fn capabilities(&self) -> Capabilities {
        Capabilities::BANG
    }

    fn process(&mut self, ctx: &mut ProcessCtx<'_>) {
        if self.core.ended {
            return;
        }
        let NodeCore {
            cell, stereo, mul, add, ..
        } = &mut self.core;
        let Some(stereo) = stereo else {
            return;
        };
        self.stream.fetch(&mut stereo.left, &mut stereo.right);
        for ((x, l), r) in cell.iter_mut().zip(stereo.left.iter_mut()).zip(stereo.right.iter_mut()) {
            *l = *l * *mul + *add;
            *r = *r * *mul + *add;
            *x = (*l + *r) * 0.5;
        }
        if self.stream.is_ended() {
            ctx.end(Some(0.0));
        }
    }

    /// Rewind to the start of the tape.
    fn bang(&mut self, _ctx: &mut ProcessCtx<'_>, _arg: Option<f64>) {
        self.stream.reset();
        self.core.ended = false;
    }
}
