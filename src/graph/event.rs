use crate::graph::NodeId;
use crate::io::SoundBuffer;

/// Something a node reports to whoever drives the system. Drained through
/// `Graph::drain_events`.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeEvent {
    /// The node finished (envelope end, buffer end, timeout fired).
    Ended,
    /// A looping source wrapped around.
    Looped,
    /// An envelope reached its release node and is holding.
    Sustained,
    Released,
    /// A timer or listener was registered.
    Started,
    Stopped,
    Played,
    Paused,
    /// A spectrum analyser finished a frame.
    Fft,
    /// A schedule fired at least one item this tick.
    Scheduled,
    /// A schedule fired its last item.
    Empty,
    /// A recording finished.
    Recorded(SoundBuffer),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphEvent {
    pub node: NodeId,
    pub event: NodeEvent,
}

/// Work that must not happen while a tick is being evaluated. Queued during
/// the tick and applied after it, in order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickTask {
    /// Mark the node ended, optionally filling its cells with `hold`.
    End { node: NodeId, hold: Option<f32> },
    /// Call the node's `wake` hook.
    Wake(NodeId),
    StartTimer(NodeId),
    StopTimer(NodeId),
    Listen(NodeId),
    Unlisten(NodeId),
    /// Register a system inlet with the output mix.
    Play(NodeId),
    Pause(NodeId),
}
