//! Benchmarks for the segment envelope.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use timbre_dsp::dsp::envelope::Envelope;
use timbre_dsp::AudioContext;

use crate::SAMPLE_RATE;

/// Envelope steps per run. One step per sample is the worst case.
const STEPS: usize = 1024;

pub fn bench_envelope(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/envelope");
    let ctx = AudioContext::builder().sample_rate(SAMPLE_RATE).build();

    for curve in ["lin", "exp", "sin", "wel", "cub"] {
        // a long attack so every step interpolates
        let mut env = Envelope::adsr(&ctx, 10_000.0, 100.0, 0.5, 100.0, 1.0);
        env.set_curve(curve);
        env.gate();
        group.bench_with_input(BenchmarkId::new("attack", curve), &curve, |b, _| {
            b.iter(|| {
                for _ in 0..STEPS {
                    black_box(env.next());
                }
            })
        });
    }

    let mut env = Envelope::adsr(&ctx, 1.0, 1.0, 0.7, 100.0, 1.0);
    env.gate();
    for _ in 0..200 {
        env.next();
    }
    group.bench_function("sustain", |b| {
        b.iter(|| {
            for _ in 0..STEPS {
                black_box(env.next());
            }
        })
    });

    // restart cost, paid on every note
    let mut env = Envelope::adsr(&ctx, 5.0, 50.0, 0.5, 200.0, 1.0);
    group.bench_function("gate", |b| b.iter(|| env.gate()));

    group.finish();
}
