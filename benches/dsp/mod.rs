//! Benchmarks for low-level DSP primitives.

mod biquad;
mod delay;
mod distortion;
mod envelope;
mod fft;
mod oscillator;
mod tape;

pub use biquad::bench_biquad;
pub use delay::bench_delay;
pub use distortion::bench_distortion;
pub use envelope::bench_envelope;
pub use fft::bench_fft;
pub use oscillator::bench_oscillator;
pub use tape::bench_tape;
