//! Benchmarks for the feedback delay line.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use timbre_dsp::dsp::delay::DelayLine;

use crate::{BLOCK_SIZES, SAMPLE_RATE};

pub fn bench_delay(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/delay");

    for &size in BLOCK_SIZES {
        let input: Vec<f32> = (0..size).map(|i| (i as f32 * 0.1).sin()).collect();
        let mut buffer = input.clone();

        for ms in [10.0, 250.0, 1000.0] {
            let mut delay = DelayLine::new(SAMPLE_RATE);
            delay.set_time(ms);
            group.bench_with_input(BenchmarkId::new(format!("{ms}ms"), size), &size, |b, _| {
                b.iter(|| {
                    buffer.copy_from_slice(&input);
                    delay.render(black_box(&mut buffer));
                })
            });
        }
    }

    group.finish();
}
