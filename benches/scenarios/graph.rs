//! Benchmarks for voice chains ticked through the graph.
//!
//! One `render` is one tick: timers, the pull through every dependency,
//! listeners, then the task queue.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use timbre_dsp::graph::{BiquadNode, DelayNode, EnvNode, OscNode, PlusNode, TimesNode};
use timbre_dsp::{AudioContext, Graph, NodeId};

use crate::SAMPLE_RATE;

/// saw → lowpass → adsr, gated and left in its sustain.
fn lead(graph: &mut Graph, ctx: &AudioContext, freq: f64) -> NodeId {
    let osc = graph.add(OscNode::saw(ctx).freq(freq));
    let filter = graph.add(BiquadNode::lowpass(ctx).freq(2500.0));
    let env = graph.add(EnvNode::adsr(ctx, 10.0, 100.0, 0.6, 200.0, 0.5));
    graph.append(filter, osc).ok();
    graph.append(env, filter).ok();
    graph.bang(env).ok();
    env
}

pub fn bench_graph(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios/graph");

    for cell_size in [64usize, 128, 256] {
        let ctx = AudioContext::builder().sample_rate(SAMPLE_RATE).cell_size(cell_size).build();

        let mut graph = Graph::new(&ctx);
        let voice = lead(&mut graph, &ctx, 220.0);
        group.bench_with_input(BenchmarkId::new("lead", cell_size), &cell_size, |b, _| {
            b.iter(|| black_box(graph.render(voice)))
        });

        // cutoff driven by a control-rate LFO, redesigning every tick
        let mut graph = Graph::new(&ctx);
        let osc = graph.add(OscNode::saw(&ctx).freq(55.0));
        let lfo = graph.add(OscNode::lfo_sin(&ctx).freq(2.0).kr());
        graph.set_mul(lfo, 800.0).ok();
        graph.set_add(lfo, 1200.0).ok();
        let filter = graph.add(BiquadNode::lowpass(&ctx).freq(lfo).q(12.0));
        graph.append(filter, osc).ok();
        group.bench_with_input(BenchmarkId::new("acid", cell_size), &cell_size, |b, _| {
            b.iter(|| black_box(graph.render(filter)))
        });

        // eight voices summed into a delay: a typical chord patch
        let mut graph = Graph::new(&ctx);
        let bus = graph.add(PlusNode::new(&ctx));
        for i in 0..8 {
            let voice = lead(&mut graph, &ctx, 110.0 * (1.0 + i as f64 * 0.25));
            graph.append(bus, voice).ok();
        }
        let echo = graph.add(DelayNode::new(&ctx));
        graph.append(echo, bus).ok();
        group.bench_with_input(BenchmarkId::new("chord_8", cell_size), &cell_size, |b, _| {
            b.iter(|| black_box(graph.render(echo)))
        });

        // one shared oscillator read by many consumers: memoized per tick
        let mut graph = Graph::new(&ctx);
        let shared = graph.add(OscNode::sin(&ctx).freq(440.0));
        let sink = graph.add(PlusNode::new(&ctx));
        for _ in 0..32 {
            let tap = graph.add(TimesNode::new(&ctx));
            graph.append(tap, shared).ok();
            graph.append(sink, tap).ok();
        }
        group.bench_with_input(BenchmarkId::new("fan_out_32", cell_size), &cell_size, |b, _| {
            b.iter(|| black_box(graph.render(sink)))
        });
    }

    group.finish();
}
