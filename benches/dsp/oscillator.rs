//! Benchmarks for wavetable oscillator rendering.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use timbre_dsp::dsp::oscillator::Oscillator;
use timbre_dsp::AudioContext;

use crate::{BLOCK_SIZES, SAMPLE_RATE};

pub fn bench_oscillator(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/oscillator");
    let ctx = AudioContext::builder().sample_rate(SAMPLE_RATE).build();

    for &size in BLOCK_SIZES {
        let mut buffer = vec![0.0f32; size];

        for wave in ["sin", "saw", "pulse", "fami"] {
            let mut osc = Oscillator::new(&ctx);
            osc.set_wave(wave);
            group.bench_with_input(BenchmarkId::new(wave, size), &size, |b, _| {
                b.iter(|| osc.process(black_box(&mut buffer)))
            });
        }

        // per-sample frequency, as when an oscillator drives another's pitch
        let freqs: Vec<f32> = (0..size).map(|i| 220.0 + (i % 64) as f32).collect();
        let mut osc = Oscillator::new(&ctx);
        group.bench_with_input(BenchmarkId::new("sin_fm", size), &size, |b, _| {
            b.iter(|| osc.process_with_freqs(black_box(&mut buffer), black_box(&freqs)))
        });
    }

    group.finish();
}
