#[cfg(feature = "rtrb")]
use rtrb::{Consumer, Producer, RingBuffer};
use tracing::{debug, info, warn};

use crate::context::AudioContext;
use crate::error::{GraphError, TimbreError};
use crate::graph::{Graph, GraphEvent, NodeId};
use crate::io::SoundBuffer;

/*
Sound System
============

Owns the graph and turns it into blocks of output audio.

    commands ──► graph tasks ──► ticks ──► Σ inlets ──► × amp ──► clamp ──► L/R
    (ring)                       (cells)   (stereo)

One stream block is `AudioContext::stream_size` samples, a whole number of
cells. Each cell is one tick:

  1. timers run
  2. every playing inlet is pulled and summed into the block
  3. listeners run
  4. tasks queued during the tick are applied

Control from another thread goes through a ring buffer of `SystemCommand`s
drained at the start of every block, so the audio callback never waits on a
lock.

Offline recording (`rec`) uses the same mix but renders as fast as it can,
block by block, into a buffer.
*/

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemStatus {
    Idle,
    Playing,
    Recording,
}

/// Control messages for a running system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SystemCommand {
    Bang(NodeId, Option<f64>),
    Release(NodeId),
    Reset(NodeId),
    Start(NodeId),
    Stop(NodeId),
    Play(NodeId),
    Pause(NodeId),
    SetMul(NodeId, f32),
    SetAdd(NodeId, f32),
    SetAmp(f32),
}

pub trait CommandReceiver: Send {
    fn pop(&mut self) -> Option<SystemCommand>;
}

#[cfg(feature = "rtrb")]
impl CommandReceiver for Consumer<SystemCommand> {
    fn pop(&mut self) -> Option<SystemCommand> {
        Consumer::pop(self).ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecOptions {
    /// Stop after this many ms. Without it the script must call
    /// `RecOutlet::done`.
    pub timeout: Option<f64>,
    /// Fail rather than record past this many ms.
    pub max_duration: f64,
    /// 1 for a mono mix, 2 for left/right.
    pub channels: usize,
}

impl Default for RecOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            max_duration: 600_000.0,
            channels: 1,
        }
    }
}

impl RecOptions {
    pub fn timeout(mut self, ms: f64) -> Self {
        if ms > 0.0 {
            self.timeout = Some(ms);
        }
        self
    }

    pub fn max_duration(mut self, ms: f64) -> Self {
        if ms > 0.0 {
            self.max_duration = ms;
        }
        self
    }

    pub fn channels(mut self, channels: usize) -> Self {
        match channels {
            1 | 2 => self.channels = channels,
            _ => warn!(channels, "recording channels must be 1 or 2, keeping {}", self.channels),
        }
        self
    }
}

/// What a recording script sees before each block.
pub struct RecOutlet<'a> {
    graph: &'a mut Graph,
    elapsed: f64,
    done: bool,
}

impl RecOutlet<'_> {
    pub fn graph(&self) -> &Graph {
        &*self.graph
    }

    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut *self.graph
    }

    /// Milliseconds recorded so far.
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed
    }

    /// Finish the recording before the next block.
    pub fn done(&mut self) {
        self.done = true;
    }
}

pub struct SoundSystem {
    graph: Graph,
    status: SystemStatus,
    amp: f32,
    left: Vec<f32>,
    right: Vec<f32>,
    commands: Option<Box<dyn CommandReceiver>>,
}

impl SoundSystem {
    pub fn new(ctx: &AudioContext) -> Self {
        let size = ctx.stream_size();
        Self {
            graph: Graph::new(ctx),
            status: SystemStatus::Idle,
            amp: ctx.amp(),
            left: vec![0.0; size],
            right: vec![0.0; size],
            commands: None,
        }
    }

    pub fn context(&self) -> &AudioContext {
        self.graph.context()
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    pub fn status(&self) -> SystemStatus {
        self.status
    }

    pub fn amp(&self) -> f32 {
        self.amp
    }

    pub fn set_amp(&mut self, amp: f32) {
        if amp.is_finite() && amp >= 0.0 {
            self.amp = amp;
        }
    }

    /// Samples per channel in one `process_stream` block.
    pub fn stream_size(&self) -> usize {
        self.left.len()
    }

    pub fn set_command_receiver(&mut self, receiver: Box<dyn CommandReceiver>) {
        self.commands = Some(receiver);
    }

    /// Install a fresh command ring and return its sending half.
    #[cfg(feature = "rtrb")]
    pub fn command_channel(&mut self, capacity: usize) -> Producer<SystemCommand> {
        let (tx, rx) = RingBuffer::new(capacity);
        self.commands = Some(Box::new(rx));
        tx
    }

    pub fn play(&mut self) {
        if self.status == SystemStatus::Idle {
            self.status = SystemStatus::Playing;
            self.graph.playing = true;
            info!(stream_size = self.stream_size(), "sound system playing");
        }
    }

    pub fn pause(&mut self) {
        if self.status == SystemStatus::Playing {
            self.status = SystemStatus::Idle;
            self.graph.playing = false;
            self.graph.run_tasks();
            info!("sound system paused");
        }
    }

    pub fn drain_events(&mut self) -> Vec<GraphEvent> {
        self.graph.drain_events()
    }

    /// Render one stream block. Silence unless playing.
    pub fn process_stream(&mut self) -> (&[f32], &[f32]) {
        self.apply_commands();
        if self.status == SystemStatus::Playing {
            self.graph.run_tasks();
            self.render_block();
        } else {
            self.left.fill(0.0);
            self.right.fill(0.0);
        }
        (&self.left, &self.right)
    }

    /// Render offline until the script calls `done` or the timeout passes.
    /// `script` runs before every block and may edit the graph.
    pub fn rec<F>(&mut self, options: RecOptions, mut script: F) -> Result<SoundBuffer, TimbreError>
    where
        F: FnMut(&mut RecOutlet<'_>),
    {
        if self.status != SystemStatus::Idle {
            return Err(TimbreError::Busy);
        }
        self.status = SystemStatus::Recording;
        self.graph.playing = true;
        info!(timeout = ?options.timeout, max = options.max_duration, "recording started");

        let ctx = *self.graph.context();
        let block_ms = self.stream_size() as f64 * 1000.0 / ctx.sample_rate_f64();
        let mut left = Vec::new();
        let mut right = Vec::new();
        let mut elapsed = 0.0;

        let result = loop {
            let mut outlet = RecOutlet {
                graph: &mut self.graph,
                elapsed,
                done: false,
            };
            script(&mut outlet);
            if outlet.done {
                break Ok(());
            }
            if options.timeout.is_some_and(|t| elapsed >= t) {
                break Ok(());
            }
            if elapsed >= options.max_duration {
                break Err(TimbreError::RecTimeout {
                    max_ms: options.max_duration,
                });
            }
            self.graph.run_tasks();
            self.render_block();
            left.extend_from_slice(&self.left);
            right.extend_from_slice(&self.right);
            elapsed += block_ms;
        };

        self.status = SystemStatus::Idle;
        self.graph.playing = false;
        self.graph.run_tasks();
        result?;

        if let Some(timeout) = options.timeout {
            let len = ctx.ms_to_samples(timeout).max(0) as usize;
            left.truncate(len);
            right.truncate(len);
        }
        info!(samples = left.len(), "recording finished");

        Ok(match options.channels {
            2 => SoundBuffer::from_stereo(left, right, ctx.sample_rate()),
            _ => {
                let mono: Vec<f32> = left.iter().zip(&right).map(|(l, r)| (l + r) * 0.5).collect();
                SoundBuffer::new(mono, ctx.sample_rate())
            }
        })
    }

    fn apply_commands(&mut self) {
        let Some(commands) = &mut self.commands else {
            return;
        };
        while let Some(command) = commands.pop() {
            let graph = &mut self.graph;
            let result: Result<(), GraphError> = match command {
                SystemCommand::Bang(id, arg) => graph.bang_with(id, arg),
                SystemCommand::Release(id) => graph.release(id),
                SystemCommand::Reset(id) => graph.reset(id),
                SystemCommand::Start(id) => graph.start(id),
                SystemCommand::Stop(id) => graph.stop(id),
                SystemCommand::Play(id) => graph.play(id),
                SystemCommand::Pause(id) => graph.pause(id),
                SystemCommand::SetMul(id, mul) => graph.set_mul(id, mul),
                SystemCommand::SetAdd(id, add) => graph.set_add(id, add),
                SystemCommand::SetAmp(amp) => {
                    if amp.is_finite() && amp >= 0.0 {
                        self.amp = amp;
                    }
                    Ok(())
                }
            };
            match result {
                Ok(()) => debug!(?command, "command applied"),
                Err(e) => warn!(?command, error = %e, "command rejected"),
            }
        }
    }

    fn render_block(&mut self) {
        let cell = self.graph.context().cell_size();
        let mono = self.graph.context().channels() == 1;
        self.left.fill(0.0);
        self.right.fill(0.0);

        for offset in (0..self.left.len()).step_by(cell) {
            let end = offset + cell;
            self.graph.begin_tick();
            self.graph.process_timers();
            for i in 0..self.graph.inlets.len() {
                let inlet = self.graph.inlets[i];
                self.graph.pull(inlet);
                let (l, r) = self.graph.stereo_cells(inlet);
                for (dst, &x) in self.left[offset..end].iter_mut().zip(l) {
                    *dst += x;
                }
                for (dst, &x) in self.right[offset..end].iter_mut().zip(r) {
                    *dst += x;
                }
            }
            self.graph.process_listeners();
            self.graph.end_tick();
        }

        let amp = self.amp;
        for (l, r) in self.left.iter_mut().zip(self.right.iter_mut()) {
            if mono {
                let x = (*l + *r) * 0.5;
                *l = x;
                *r = x;
            }
            *l = (*l * amp).clamp(-1.0, 1.0);
            *r = (*r * amp).clamp(-1.0, 1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{OscNode, ValueNode};

    // 256 sample blocks of 32 ms
    fn ctx() -> AudioContext {
        AudioContext::builder().sample_rate(8000).cell_size(32).build()
    }

    #[test]
    fn silent_until_played() {
        let ctx = ctx();
        let mut system = SoundSystem::new(&ctx);
        assert_eq!(system.stream_size(), 256);
        let one = system.graph_mut().add(ValueNode::new(&ctx, 1.0));
        system.graph_mut().play(one).unwrap();

        let (l, _) = system.process_stream();
        assert!(l.iter().all(|&x| x == 0.0));

        system.play();
        let (l, r) = system.process_stream();
        assert!(l.iter().all(|&x| x == 0.8), "default amp");
        assert_eq!(l, r);

        system.pause();
        assert_eq!(system.status(), SystemStatus::Idle);
    }

    #[test]
    fn output_is_clamped() {
        let ctx = ctx();
        let mut system = SoundSystem::new(&ctx);
        let loud = system.graph_mut().add(ValueNode::new(&ctx, 3.0));
        system.graph_mut().play(loud).unwrap();
        system.play();
        let (l, _) = system.process_stream();
        assert!(l.iter().all(|&x| x == 1.0));
    }

    #[cfg(feature = "rtrb")]
    #[test]
    fn commands_arrive_through_the_ring() {
        let ctx = ctx();
        let mut system = SoundSystem::new(&ctx);
        let mut tx = system.command_channel(16);
        let one = system.graph_mut().add(ValueNode::new(&ctx, 1.0));
        system.play();

        tx.push(SystemCommand::Play(one)).unwrap();
        tx.push(SystemCommand::SetAmp(0.5)).unwrap();
        let (l, _) = system.process_stream();
        assert!(l.iter().all(|&x| x == 0.5));

        tx.push(SystemCommand::Pause(one)).unwrap();
        system.process_stream();
        let (l, _) = system.process_stream();
        assert!(l.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn rec_stops_at_the_timeout() {
        let ctx = ctx();
        let mut system = SoundSystem::new(&ctx);
        let one = system.graph_mut().add(ValueNode::new(&ctx, 1.0));
        let buffer = system
            .rec(RecOptions::default().timeout(10.0), |out| {
                if out.elapsed_ms() == 0.0 {
                    out.graph_mut().play(one).unwrap();
                }
            })
            .unwrap();
        assert_eq!(buffer.len(), 80);
        assert!(buffer.samples.iter().all(|&x| x == 0.8));
        assert_eq!(system.status(), SystemStatus::Idle);
    }

    #[test]
    fn rec_until_done_in_stereo() {
        let ctx = ctx();
        let mut system = SoundSystem::new(&ctx);
        let osc = system.graph_mut().add(OscNode::sin(&ctx));
        system.graph_mut().play(osc).unwrap();
        let buffer = system
            .rec(RecOptions::default().channels(2), |out| {
                if out.elapsed_ms() >= 64.0 {
                    out.done();
                }
            })
            .unwrap();
        assert_eq!(buffer.len(), 512);
        assert!(buffer.stereo.is_some());
    }

    #[test]
    fn rec_fails_past_the_maximum() {
        let ctx = ctx();
        let mut system = SoundSystem::new(&ctx);
        let err = system
            .rec(RecOptions::default().max_duration(50.0), |_| {})
            .unwrap_err();
        assert!(matches!(err, TimbreError::RecTimeout { max_ms } if max_ms == 50.0));
        assert_eq!(system.status(), SystemStatus::Idle);

        system.play();
        assert!(matches!(system.rec(RecOptions::default(), |_| {}), Err(TimbreError::Busy)));
    }
}
