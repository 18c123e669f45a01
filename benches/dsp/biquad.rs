//! Benchmarks for biquad filtering and coefficient design.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use timbre_dsp::dsp::biquad::{Biquad, BiquadType, Coefficients};

use crate::{BLOCK_SIZES, SAMPLE_RATE};

pub fn bench_biquad(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/biquad");
    let sr = SAMPLE_RATE as f64;

    for &size in BLOCK_SIZES {
        let input: Vec<f32> = (0..size).map(|i| (i as f32 * 0.05).sin() * 0.8).collect();
        let mut buffer = input.clone();

        for kind in [BiquadType::LowPass, BiquadType::BandPass, BiquadType::Peaking] {
            let mut filter = Biquad::new(kind, sr);
            filter.set_params(1200.0, 6.0, 3.0);
            group.bench_with_input(BenchmarkId::new(kind.name(), size), &size, |b, _| {
                b.iter(|| {
                    buffer.copy_from_slice(&input);
                    filter.process(black_box(&mut buffer));
                })
            });
        }
    }

    // redesign happens every tick when the cutoff is driven by another node
    group.bench_function("design", |b| {
        let mut freq = 100.0;
        b.iter(|| {
            freq = if freq > 8000.0 { 100.0 } else { freq * 1.01 };
            Coefficients::design(black_box(BiquadType::LowPass), freq, 6.0, 0.0, sr)
        })
    });

    group.finish();
}
