//! Benchmarks for DSP primitives and whole-graph rendering.
//!
//! Run with: cargo bench
//!
//! Everything renders well inside the audio deadline or the stream glitches.
//! Reference deadlines at 44.1kHz:
//!   - 64 samples   = 1.45ms (one cell)
//!   - 256 samples  = 5.80ms
//!   - 1024 samples = 23.2ms
//!   - 2048 samples = 46.4ms (one default stream block)
//!
//! Benchmark groups:
//!   - dsp/*        Primitives on plain buffers (oscillator, biquad, fft, ...)
//!   - scenarios/*  Graph ticks and full stream blocks through SoundSystem

use criterion::{criterion_group, criterion_main};

mod dsp;
mod scenarios;

pub const SAMPLE_RATE: u32 = 44_100;

/// Buffer sizes from one cell up to one stream block.
pub const BLOCK_SIZES: &[usize] = &[64, 256, 1024, 2048];

criterion_group!(
    benches,
    // Primitives
    dsp::bench_oscillator,
    dsp::bench_biquad,
    dsp::bench_envelope,
    dsp::bench_fft,
    dsp::bench_tape,
    dsp::bench_delay,
    dsp::bench_distortion,
    // Graph
    scenarios::bench_graph,
    scenarios::bench_system,
);
criterion_main!(benches);
