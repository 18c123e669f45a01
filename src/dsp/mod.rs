//! Low-level DSP primitives used by the graph nodes.
//!
//! Everything here works on plain sample slices and knows nothing about
//! ticks, inputs or events. Buffers are sized up front so rendering does not
//! allocate, with the exception of the process-wide wavetable and FFT table
//! caches which are filled on first use.

/// Resonant biquad designer and filter state.
pub mod biquad;
/// Feedback delay line.
pub mod delay;
/// Gain-staged hard clipper with optional lowpass.
pub mod distortion;
/// Multi-segment envelope generator, presets and table literals.
pub mod envelope;
/// Radix-2 FFT with cached twiddle tables.
pub mod fft;
/// White, pink and LFSR noise plus the seeded random stream.
pub mod noise;
/// Wavetable phase accumulator.
pub mod oscillator;
/// Karplus-Strong string.
pub mod pluck;
/// Non-destructive buffer splicing and streaming.
pub mod tape;
/// Named single-cycle tables.
pub mod wavetable;
/// FFT analysis windows.
pub mod window;

pub use envelope::{Envelope, EnvelopeEvent, EnvelopeStatus};
