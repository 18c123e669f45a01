use std::fmt;

use crate::graph::NodeId;

#[derive(Debug)]
pub enum TimbreError {
    Config(ConfigError),
    Graph(GraphError),
    Tape(TapeError),
    Decode(DecodeError),
    Table(TableError),
    Io(std::io::Error),
    /// An offline recording hit its maximum duration before finishing.
    RecTimeout { max_ms: f64 },
    /// The system is already playing or recording.
    Busy,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    SampleRate(u32),
    CellSize(usize),
    Channels(usize),
    Bpm(f64),
    StreamLength(f64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    UnknownNode(NodeId),
    Cycle { from: NodeId, to: NodeId },
    /// The node is being processed and cannot be borrowed.
    InFlight(NodeId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TapeError {
    EmptyTape,
}

/// Envelope table literal errors. Positions are byte offsets, rows 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    UnexpectedEnd,
    Unexpected(usize),
    Trailing(usize),
    Expected(&'static str, usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Every decoder in the list rejected the data.
    Unsupported,
    /// The decoder list was empty.
    NoDecoders,
}

/// A timer was stopped before it fired. Rejects the timer's promise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl fmt::Display for TimbreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimbreError::Config(e) => write!(f, "config error: {e}"),
            TimbreError::Graph(e) => write!(f, "graph error: {e}"),
            TimbreError::Tape(e) => write!(f, "tape error: {e}"),
            TimbreError::Decode(e) => write!(f, "decode error: {e}"),
            TimbreError::Table(e) => write!(f, "envelope table error: {e}"),
            TimbreError::Io(e) => write!(f, "io error: {e}"),
            TimbreError::RecTimeout { max_ms } => {
                write!(f, "recording exceeded maximum duration of {max_ms} ms")
            }
            TimbreError::Busy => write!(f, "sound system is busy"),
        }
    }
}

impl std::error::Error for TimbreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TimbreError::Config(e) => Some(e),
            TimbreError::Graph(e) => Some(e),
            TimbreError::Tape(e) => Some(e),
            TimbreError::Decode(e) => Some(e),
            TimbreError::Table(e) => Some(e),
            TimbreError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::SampleRate(sr) => write!(f, "unsupported sample rate {sr}"),
            ConfigError::CellSize(n) => write!(f, "unsupported cell size {n}"),
            ConfigError::Channels(n) => write!(f, "unsupported channel count {n}"),
            ConfigError::Bpm(bpm) => write!(f, "bpm {bpm} outside 5..=300"),
            ConfigError::StreamLength(ms) => write!(f, "invalid stream length {ms} ms"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphError::UnknownNode(id) => write!(f, "unknown node {id}"),
            GraphError::Cycle { from, to } => {
                write!(f, "connecting {from} into {to} would create a cycle")
            }
            GraphError::InFlight(id) => write!(f, "node {id} is being processed"),
        }
    }
}

impl std::error::Error for GraphError {}

impl fmt::Display for TapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TapeError::EmptyTape => write!(f, "tape has zero duration"),
        }
    }
}

impl std::error::Error for TapeError {}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableError::UnexpectedEnd => write!(f, "unexpected end of table"),
            TableError::Unexpected(pos) => write!(f, "unexpected input at byte {pos}"),
            TableError::Trailing(pos) => write!(f, "trailing input at byte {pos}"),
            TableError::Expected(what, row) => write!(f, "expected {what} in row {row}"),
        }
    }
}

impl std::error::Error for TableError {}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Unsupported => write!(f, "no decoder accepted the data"),
            DecodeError::NoDecoders => write!(f, "no decoders configured"),
        }
    }
}

impl std::error::Error for DecodeError {}

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer cancelled")
    }
}

impl std::error::Error for Cancelled {}

impl From<ConfigError> for TimbreError {
    fn from(e: ConfigError) -> Self {
        TimbreError::Config(e)
    }
}

impl From<GraphError> for TimbreError {
    fn from(e: GraphError) -> Self {
        TimbreError::Graph(e)
    }
}

impl From<TapeError> for TimbreError {
    fn from(e: TapeError) -> Self {
        TimbreError::Tape(e)
    }
}

impl From<DecodeError> for TimbreError {
    fn from(e: DecodeError) -> Self {
        TimbreError::Decode(e)
    }
}

impl From<TableError> for TimbreError {
    fn from(e: TableError) -> Self {
        TimbreError::Table(e)
    }
}

impl From<std::io::Error> for TimbreError {
    fn from(e: std::io::Error) -> Self {
        TimbreError::Io(e)
    }
}
