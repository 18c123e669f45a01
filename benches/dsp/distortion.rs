//! Benchmarks for the gain-staged clipper.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use timbre_dsp::dsp::distortion::Distortion;

use crate::{BLOCK_SIZES, SAMPLE_RATE};

pub fn bench_distortion(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/distortion");

    for &size in BLOCK_SIZES {
        let input: Vec<f32> = (0..size).map(|i| (i as f32 * 0.07).sin() * 0.9).collect();
        let mut buffer = input.clone();

        let mut clip = Distortion::new(SAMPLE_RATE);
        clip.set_gains(-6.0, -18.0);
        group.bench_with_input(BenchmarkId::new("clip", size), &size, |b, _| {
            b.iter(|| {
                buffer.copy_from_slice(&input);
                clip.process(black_box(&mut buffer));
            })
        });

        let mut filtered = Distortion::new(SAMPLE_RATE);
        filtered.set_gains(-6.0, -18.0);
        filtered.set_cutoff(2400.0);
        group.bench_with_input(BenchmarkId::new("clip_lowpass", size), &size, |b, _| {
            b.iter(|| {
                buffer.copy_from_slice(&input);
                filtered.process(black_box(&mut buffer));
            })
        });
    }

    group.finish();
}
