//! Benchmarks for tape streaming across fragment boundaries.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use timbre_dsp::dsp::tape::{Tape, TapeStream};

use crate::{BLOCK_SIZES, SAMPLE_RATE};

pub fn bench_tape(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/tape");

    // one second of source material
    let samples: Vec<f32> = (0..SAMPLE_RATE).map(|i| (i as f32 * 0.01).sin()).collect();
    let source = Tape::from_samples(samples.into(), SAMPLE_RATE);

    // a single long fragment against a tape chopped into 64 short ones
    let whole = source.clone();
    let chopped = Tape::join(&source.split(64).iter().rev().map(|t| t.reverse()).collect::<Vec<_>>());
    let pitched = source.pitch(150.0, false).pan(30.0);

    for &size in BLOCK_SIZES {
        let mut left = vec![0.0f32; size];
        let mut right = vec![0.0f32; size];

        for (name, tape) in [("whole", &whole), ("chopped", &chopped), ("pitched", &pitched)] {
            let mut stream = TapeStream::new(tape, SAMPLE_RATE);
            stream.looped = true;
            group.bench_with_input(BenchmarkId::new(name, size), &size, |b, _| {
                b.iter(|| stream.fetch(black_box(&mut left), black_box(&mut right)))
            });
        }
    }

    group.bench_function("splice", |b| {
        b.iter(|| black_box(&source).slice(100.0, 300.0).concat(&source.reverse()).repeat(4))
    });

    group.finish();
}
