use crate::context::AudioContext;
use crate::dsp::wavetable::{self, Wavetable, TABLE_MASK, TABLE_SIZE};

/*
Wavetable Oscillator
====================

A phase accumulator reading a 1024-entry single-cycle table with linear
interpolation between neighbouring entries.

    phase ∈ [0, 1024)     increment per sample = freq * 1024 / sample_rate

             index    index+1
    table ──●────────●──
               ╰─ delta ─╯     out = (1-delta)*t[index] + delta*t[index+1]

Two modes:

  next()        one value, then advance by `step` samples. Used at control
                rate where a whole cell shares a single value.

  process()     one value per sample for a whole block.

Phase is wrapped back into range at the end of each call, in both
directions, so negative frequencies and increments larger than the table
are fine. Reads inside a block mask the index so they can never leave the
table.
*/

const TABLE_LEN: f64 = TABLE_SIZE as f64;

#[derive(Debug, Clone)]
pub struct Oscillator {
    wave: Wavetable,
    phase: f64,
    coeff: f64,
    pub frequency: f64,
    /// Samples advanced per `next()` call.
    pub step: usize,
}

impl Oscillator {
    pub fn new(ctx: &AudioContext) -> Self {
        Self {
            wave: wavetable::wavetable("sin").unwrap_or_else(|| vec![0.0; TABLE_SIZE].into()),
            phase: 0.0,
            coeff: TABLE_LEN / ctx.sample_rate_f64(),
            frequency: 440.0,
            step: 1,
        }
    }

    /// Switch to a named table. Unknown names leave the current table and
    /// return `false`.
    pub fn set_wave(&mut self, key: &str) -> bool {
        match wavetable::wavetable(key) {
            Some(wave) => {
                self.wave = wave;
                true
            }
            None => false,
        }
    }

    /// Use a custom cycle, resampled to the table length.
    pub fn set_wave_samples(&mut self, samples: &[f32]) {
        self.wave = wavetable::table_from_samples(samples).into();
    }

    pub fn set_wave_fn(&mut self, f: impl Fn(f64) -> f64) {
        self.wave = wavetable::table_from_fn(f).into();
    }

    pub fn wave(&self) -> &[f32] {
        &self.wave
    }

    pub fn phase(&self) -> f64 {
        self.phase
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
    }

    #[inline]
    fn read(&self, phase: f64) -> f32 {
        let floor = phase.floor();
        let delta = (phase - floor) as f32;
        // saturating cast; the mask keeps any index in the table
        let index = floor as i64 as usize;
        let a = self.wave[index & TABLE_MASK];
        let b = self.wave[index.wrapping_add(1) & TABLE_MASK];
        (1.0 - delta) * a + delta * b
    }

    fn wrap(&mut self) {
        if !self.phase.is_finite() {
            self.phase = 0.0;
            return;
        }
        self.phase = self.phase.rem_euclid(TABLE_LEN);
        // a tiny negative phase rounds up to exactly TABLE_LEN
        if self.phase >= TABLE_LEN {
            self.phase = 0.0;
        }
    }

    pub fn next(&mut self) -> f32 {
        let out = self.read(self.phase);
        self.phase += self.frequency * self.coeff * self.step as f64;
        self.wrap();
        out
    }

    /// Fill `out` at the current frequency.
    pub fn process(&mut self, out: &mut [f32]) {
        let dx = self.frequency * self.coeff;
        let mut phase = self.phase;
        for sample in out.iter_mut() {
            *sample = self.read(phase);
            phase += dx;
        }
        self.phase = phase;
        self.wrap();
    }

    /// Fill `out` with a per-sample frequency.
    pub fn process_with_freqs(&mut self, out: &mut [f32], freqs: &[f32]) {
        let mut phase = self.phase;
        for (sample, &freq) in out.iter_mut().zip(freqs) {
            *sample = self.read(phase);
            phase += freq as f64 * self.coeff;
        }
        self.phase = phase;
        self.wrap();
    }
}
