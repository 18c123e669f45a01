//! Whole-graph benchmarks: voice chains ticked cell by cell and full
//! stream blocks through the sound system.

mod graph;
mod system;

pub use graph::bench_graph;
pub use system::bench_system;
