//! Behavioural guarantees checked through the public API only.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use timbre_dsp::dsp::biquad::{Biquad, BiquadType, Coefficients};
use timbre_dsp::dsp::envelope::{Envelope, EnvelopeStatus, EnvelopeTable};
use timbre_dsp::dsp::fft::Fft;
use timbre_dsp::dsp::oscillator::Oscillator;
use timbre_dsp::dsp::tape::{Tape, TapeStream};
use timbre_dsp::graph::{Node, NodeCore, PlusNode, ProcessCtx};
use timbre_dsp::{impl_node_core, AudioContext, Graph};

const SR: u32 = 8000;

fn ctx() -> AudioContext {
    AudioContext::builder().sample_rate(SR).cell_size(64).build()
}

fn render_tape(tape: &Tape, len: usize) -> (Vec<f32>, Vec<f32>) {
    let mut stream = TapeStream::new(tape, SR);
    let mut left = vec![0.0; len];
    let mut right = vec![0.0; len];
    stream.fetch(&mut left, &mut right);
    (left, right)
}

/// A short percussive tape: 800 samples of a decaying saw.
fn test_tape() -> Tape {
    let samples: Vec<f32> = (0..800)
        .map(|i| ((i % 40) as f32 / 20.0 - 1.0) * (1.0 - i as f32 / 800.0))
        .collect();
    Tape::from_samples(samples.into(), SR)
}

#[test]
fn envelope_runs_are_reproducible() {
    let ctx = ctx();
    let table: EnvelopeTable = r#"[0, [1, 20, "exp"], [0.4, 80, "sin"], [0, 60, "wel"]]"#
        .parse()
        .unwrap();
    let run = || {
        let mut env = Envelope::with_table(&ctx, table.clone());
        env.gate();
        (0..2000).map(|_| env.next()).collect::<Vec<f64>>()
    };
    assert_eq!(run(), run());

    let mut env = Envelope::adsr(&ctx, 15.0, 40.0, 0.5, 30.0, 0.8);
    env.gate();
    let first: Vec<f64> = (0..900).map(|_| env.next()).collect();
    env.reset();
    env.gate();
    let second: Vec<f64> = (0..900).map(|_| env.next()).collect();
    assert_eq!(first, second, "reset must restore the initial state");
}

#[test]
fn linear_segment_lands_exactly_on_its_boundary() {
    // 1 kHz, one sample per call: the 100 ms segment is 100 calls
    let ctx = AudioContext::builder().sample_rate(1000).offline().build();
    assert_eq!(ctx.sample_rate(), 1000);
    let table: EnvelopeTable = r#"[0, [1, 100, "lin"]]"#.parse().unwrap();
    let mut env = Envelope::with_table(&ctx, table);
    assert_eq!(env.step, 1.0);
    env.gate();

    let out: Vec<f64> = (0..100).map(|_| env.next()).collect();
    assert!(out[98] < 1.0);
    assert!((out[99] - 1.0).abs() < 1e-9, "got {}", out[99]);
    assert!(out.windows(2).all(|w| w[1] > w[0]));

    for _ in 0..10 {
        assert!((env.next() - 1.0).abs() < 1e-9, "level holds after the boundary");
    }
    assert_eq!(env.status(), EnvelopeStatus::End);
}

#[test]
fn segment_length_scales_with_step() {
    let ctx = ctx();
    let table: EnvelopeTable = r#"[0, [1, 100, "lin"]]"#.parse().unwrap();
    let mut env = Envelope::with_table(&ctx, table);
    // 100 ms at 8 kHz advanced 8 samples per call: 100 calls
    env.step = 8.0;
    env.gate();

    let out: Vec<f64> = (0..100).map(|_| env.next()).collect();
    assert!(out[98] < 1.0);
    assert!((out[99] - 1.0).abs() < 1e-9, "got {}", out[99]);
    env.next();
    assert_eq!(env.status(), EnvelopeStatus::End);
}

#[test]
fn biquad_above_nyquist_passes_signal_through() {
    let nyquist = SR as f64 / 2.0;
    let mut filter = Biquad::new(BiquadType::LowPass, SR as f64);
    for cutoff in [nyquist, nyquist * 1.5, 1e9] {
        filter.set_params(cutoff, 12.0, 0.0);
        assert_eq!(filter.coefficients(), Coefficients::IDENTITY, "cutoff {cutoff}");
    }
    let mut highpass = Biquad::new(BiquadType::HighPass, SR as f64);
    highpass.set_params(nyquist * 2.0, 1.0, 0.0);
    assert_eq!(highpass.coefficients(), Coefficients::ZERO);

    let mut lowpass = Biquad::new(BiquadType::LowPass, SR as f64);
    lowpass.set_params(nyquist, 1.0, 0.0);
    let input: Vec<f32> = (0..256).map(|i| ((i * 7) % 13) as f32 / 13.0 - 0.5).collect();
    let mut buffer = input.clone();
    lowpass.process(&mut buffer);
    assert_eq!(buffer, input);
}

#[test]
fn fft_round_trip_reproduces_input() {
    for size in [64, 512, 2048] {
        let mut fft = Fft::new(size);
        let input: Vec<f32> = (0..size)
            .map(|i| {
                let t = i as f32 / size as f32;
                (t * 37.0).sin() * 0.7 + (t * 151.0).cos() * 0.2
            })
            .collect();
        let (re, im) = fft.forward(&input);
        let (re, im) = (re.to_vec(), im.to_vec());
        let out = fft.inverse(&re, &im);
        assert_eq!(out.len(), size);
        for (i, (a, b)) in input.iter().zip(out).enumerate() {
            assert!((a - b).abs() <= 1e-5 * a.abs().max(1.0), "size {size} sample {i}: {a} vs {b}");
        }
    }
}

#[test]
fn oscillator_phase_stays_in_table() {
    let ctx = ctx();
    for freq in [440.0, -440.0, SR as f64 * 3.7, -(SR as f64) * 11.3, 0.0] {
        let mut osc = Oscillator::new(&ctx);
        osc.frequency = freq;
        let mut out = vec![0.0; 512];
        for _ in 0..8 {
            osc.process(&mut out);
            let table = osc.wave().len() as f64;
            assert!((0.0..table).contains(&osc.phase()), "{freq} Hz left phase {}", osc.phase());
            assert!(out.iter().all(|x| x.is_finite() && x.abs() <= 1.0 + 1e-6));
        }

        osc.step = 64;
        for _ in 0..100 {
            let x = osc.next();
            assert!(x.is_finite());
            assert!((0.0..osc.wave().len() as f64).contains(&osc.phase()));
        }
    }
}

#[test]
fn tape_slice_and_concat_are_inverse() {
    let tape = test_tape();
    let duration = tape.duration();
    assert!((duration - 100.0).abs() < 1e-9);

    for split in [0.0, 12.5, 37.5, 100.0] {
        let joined = tape.slice(0.0, split).concat(&tape.slice(split, duration - split));
        assert!((joined.duration() - duration).abs() < 1e-9);
        let (l0, r0) = render_tape(&tape, 1024);
        let (l1, r1) = render_tape(&joined, 1024);
        for i in 0..1024 {
            assert!((l0[i] - l1[i]).abs() < 1e-6, "split {split} left {i}");
            assert!((r0[i] - r1[i]).abs() < 1e-6, "split {split} right {i}");
        }
    }
}

#[test]
fn tape_reverse_is_an_involution() {
    let tape = test_tape().slice(10.0, 50.0).concat(&test_tape().pan(80.0));
    let twice = tape.reverse().reverse();
    assert_eq!(render_tape(&tape, 2048), render_tape(&twice, 2048));

    let (once, _) = render_tape(&tape.reverse(), 2048);
    let (orig, _) = render_tape(&tape, 2048);
    assert_ne!(once, orig);
}

/// Fills its cell with a constant and counts its own evaluations.
struct Counter {
    core: NodeCore,
    calls: Arc<AtomicUsize>,
}

impl Node for Counter {
    impl_node_core!();

    fn process(&mut self, _ctx: &mut ProcessCtx<'_>) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.core.cell.fill(0.125);
    }
}

#[test]
fn shared_node_is_evaluated_once_per_tick() {
    let ctx = ctx();
    let mut graph = Graph::new(&ctx);
    let calls = Arc::new(AtomicUsize::new(0));
    let shared = graph.add(Counter {
        core: NodeCore::new(&ctx),
        calls: Arc::clone(&calls),
    });

    // shared feeds four paths that meet again at the sink
    let branches: Vec<_> = (0..4)
        .map(|_| {
            let node = graph.add(PlusNode::new(&ctx));
            graph.append(node, shared).unwrap();
            node
        })
        .collect();
    let mid = graph.add(PlusNode::new(&ctx));
    graph.append_all(mid, branches[..2].iter().copied()).unwrap();
    let sink = graph.add(PlusNode::new(&ctx));
    graph.append_all(sink, [mid, branches[2], branches[3], shared]).unwrap();

    for tick in 1..=10 {
        let out = graph.render(sink).to_vec();
        assert_eq!(calls.load(Ordering::SeqCst), tick);
        assert!(out.iter().all(|&x| (x - 0.625).abs() < 1e-6));
    }
}
