pub mod context; // Immutable sample rate, cell size and tempo
pub mod deferred; // Single-shot promises
pub mod dsp;
pub mod error;
pub mod graph; // Node arena and tick scheduler
pub mod io;
pub mod sequencing; // Time strings and pattern iterators

pub use context::AudioContext;
pub use error::TimbreError;
pub use graph::{Graph, NodeId, SoundSystem};
