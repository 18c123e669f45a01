use std::path::PathBuf;
use std::time::{Duration, Instant};

use timbre_dsp::graph::{BiquadNode, EnvNode, OscNode, RecOptions};
use timbre_dsp::io::{self, Decoder, SoundBuffer, WavDecoder};
use timbre_dsp::{AudioContext, SoundSystem};

const SR: u32 = 22050;
const LENGTH_MS: f64 = 300.0;

fn ctx() -> AudioContext {
    AudioContext::builder().sample_rate(SR).cell_size(64).channels(1).build()
}

/// Saw through a lowpass under a percussive envelope, 300 ms offline.
fn render_pluck() -> SoundBuffer {
    let ctx = ctx();
    let mut system = SoundSystem::new(&ctx);
    let graph = system.graph_mut();
    let osc = graph.add(OscNode::saw(&ctx).freq(220.0));
    let filter = graph.add(BiquadNode::lowpass(&ctx).freq(1800.0));
    let env = graph.add(EnvNode::perc(&ctx, 5.0, 150.0, 0.9));
    graph.append(filter, osc).unwrap();
    graph.append(env, filter).unwrap();

    system
        .rec(RecOptions::default().timeout(LENGTH_MS), |out| {
            if out.elapsed_ms() == 0.0 {
                let graph = out.graph_mut();
                graph.play(env).unwrap();
                graph.bang(env).unwrap();
            }
        })
        .unwrap()
}

fn temp_wav(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("timbre_{}_{name}.wav", std::process::id()))
}

fn write_wav(path: &PathBuf, buffer: &SoundBuffer) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: buffer.samplerate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for &x in buffer.samples.iter() {
        writer.write_sample((x * i16::MAX as f32).round() as i16).unwrap();
    }
    writer.finalize().unwrap();
}

#[test]
fn offline_render_is_bounded_and_repeatable() {
    let first = render_pluck();
    assert_eq!(first.samplerate, SR);
    assert_eq!(first.len(), ctx().ms_to_samples(LENGTH_MS) as usize);

    let peak = first.samples.iter().fold(0.0f32, |m, x| m.max(x.abs()));
    assert!(peak > 0.05, "note is audible, peak {peak}");
    assert!(peak <= 1.0);

    // the envelope is done well before 200 ms and holds silence
    let tail = ctx().ms_to_samples(200.0) as usize;
    assert!(first.samples[tail..].iter().all(|&x| x == 0.0));

    let second = render_pluck();
    assert_eq!(first.samples, second.samples);
}

#[test]
fn rendered_wav_decodes_back() {
    let rendered = render_pluck();
    let path = temp_wav("decode");
    write_wav(&path, &rendered);

    let bytes = std::fs::read(&path).unwrap();
    let decoded = WavDecoder.decode(&bytes).expect("hound output is valid wav");
    assert_eq!(decoded.samplerate, SR);
    assert_eq!(decoded.len(), rendered.len());
    assert!(decoded.stereo.is_none());

    let tolerance = 1.5 / i16::MAX as f32;
    for (i, (a, b)) in rendered.samples.iter().zip(decoded.samples.iter()).enumerate() {
        assert!((a - b).abs() <= tolerance, "sample {i}: {a} vs {b}");
    }

    let via_list = io::decode(&bytes, &io::default_decoders()).unwrap();
    assert_eq!(via_list, decoded);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn load_resolves_on_a_background_thread() {
    let rendered = render_pluck();
    let path = temp_wav("load");
    write_wav(&path, &rendered);

    let promise = io::load(&path);
    let deadline = Instant::now() + Duration::from_secs(5);
    while promise.is_pending() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(promise.is_resolved());
    let loaded = promise.value().unwrap();
    assert_eq!(loaded.len(), rendered.len());

    let missing = io::load(temp_wav("missing"));
    let deadline = Instant::now() + Duration::from_secs(5);
    while missing.is_pending() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(missing.is_rejected());
    let _ = std::fs::remove_file(&path);
}
