//! Benchmarks for the radix-2 FFT.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use timbre_dsp::dsp::fft::Fft;

pub fn bench_fft(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/fft");

    for size in [256usize, 512, 1024, 2048] {
        let input: Vec<f32> = (0..size).map(|i| (i as f32 * 0.021).sin()).collect();

        let mut fft = Fft::new(size);
        fft.set_window("hann");
        group.bench_with_input(BenchmarkId::new("forward", size), &size, |b, _| {
            b.iter(|| {
                fft.forward(black_box(&input));
            })
        });

        let mut fft = Fft::new(size);
        fft.no_spectrum = true;
        let (re, im) = fft.forward(&input);
        let (re, im) = (re.to_vec(), im.to_vec());
        group.bench_with_input(BenchmarkId::new("inverse", size), &size, |b, _| {
            b.iter(|| {
                fft.inverse(black_box(&re), black_box(&im));
            })
        });
    }

    group.finish();
}
