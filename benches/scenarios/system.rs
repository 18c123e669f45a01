//! Benchmarks for full stream blocks through `SoundSystem`, the work one
//! audio callback does.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use timbre_dsp::graph::{EnvNode, IntervalNode, OscNode, SpectrumNode};
use timbre_dsp::{AudioContext, SoundSystem};

use crate::SAMPLE_RATE;

pub fn bench_system(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios/system");

    for stream_ms in [10.0, 50.0] {
        let ctx = AudioContext::builder()
            .sample_rate(SAMPLE_RATE)
            .stream_ms(stream_ms)
            .build();
        let mut system = SoundSystem::new(&ctx);
        let stream_size = system.stream_size();

        // a note retriggered by a timer, watched by an analyser
        let graph = system.graph_mut();
        let osc = graph.add(OscNode::pulse(&ctx).freq(330.0));
        let env = graph.add(EnvNode::perc(&ctx, 5.0, 120.0, 0.7));
        graph.append(env, osc).ok();
        let metro = graph.add(IntervalNode::new(&ctx).interval(150.0));
        graph.append(metro, env).ok();
        let spectrum = graph.add(SpectrumNode::new(&ctx));
        graph.append(spectrum, env).ok();
        graph.play(env).ok();
        graph.start(metro).ok();
        graph.start(spectrum).ok();
        system.play();

        group.bench_with_input(BenchmarkId::new("metro_note", stream_size), &stream_size, |b, _| {
            b.iter(|| {
                let (l, r) = system.process_stream();
                black_box((l[0], r[0]));
            })
        });
        system.drain_events();
    }

    group.finish();
}
