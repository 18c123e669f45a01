//! The demo patch: a filtered saw riff and a noise hi-hat through an echo.
//!
//!   riff ──bang──┬─ note ─ saw ─ lowpass(cutoff) ─ perc ─┐
//!                └─ perc (gate)                          ├─ bus ─ echo ─▶ out
//!   metro ─bang─── noise ─ highpass ─ perc ──────────────┘         │
//!                                                          spectrum ┘

use timbre_dsp::error::GraphError;
use timbre_dsp::graph::{
    BiquadNode, DelayNode, EnvNode, FunctionNode, IntervalNode, NoiseNode, OscNode, Param,
    PatternNode, PlusNode, SpectrumNode, ValueNode,
};
use timbre_dsp::sequencing::{timevalue, ListSequence};
use timbre_dsp::{NodeId, SoundSystem};
use tracing::info;

/// C minor pentatonic, two octaves.
const RIFF: [f64; 8] = [48.0, 55.0, 58.0, 60.0, 63.0, 60.0, 67.0, 58.0];

pub const DEFAULT_CUTOFF: f32 = 1400.0;
pub const SPECTRUM_SIZE: usize = 1024;

/// Time between riff notes at `bpm`.
pub fn note_ms(bpm: f64, ctx: &timbre_dsp::AudioContext) -> f64 {
    timevalue(&format!("bpm{bpm} l8"), ctx)
}

/// Handles the UI needs to steer the patch.
#[derive(Debug, Clone, Copy)]
pub struct Patch {
    pub riff: NodeId,
    /// The lead note's envelope.
    pub lead: NodeId,
    pub metro: NodeId,
    pub cutoff: NodeId,
    pub spectrum: NodeId,
}

fn midicps(midi: f64) -> f64 {
    440.0 * 2f64.powf((midi - 69.0) / 12.0)
}

pub fn build(system: &mut SoundSystem, bpm: f64) -> Result<Patch, GraphError> {
    let ctx = *system.context();
    let eighth = note_ms(bpm, &ctx);
    let sixteenth = timevalue(&format!("bpm{bpm} l16"), &ctx);
    let graph = system.graph_mut();

    let note = graph.add(FunctionNode::new(&ctx, |midi: Option<f64>| midi.map(midicps)));
    let osc = graph.add(OscNode::saw(&ctx).freq(note));
    let cutoff = graph.add(ValueNode::new(&ctx, 1.0));
    graph.set_mul(cutoff, DEFAULT_CUTOFF)?;
    let lowpass = graph.add(BiquadNode::lowpass(&ctx).freq(cutoff).q(8.0));
    graph.append(lowpass, osc)?;
    let lead = graph.add(EnvNode::perc(&ctx, 4.0, eighth * 1.5, 0.5));
    graph.append(lead, lowpass)?;

    let riff = graph.add(
        PatternNode::new(&ctx, Box::new(ListSequence::from_values(&RIFF, usize::MAX)))
            .interval(Param::Value(eighth as f32)),
    );
    graph.append_all(riff, [note, lead])?;

    let noise = graph.add(NoiseNode::new(&ctx));
    let highpass = graph.add(BiquadNode::highpass(&ctx).freq(7000.0));
    graph.append(highpass, noise)?;
    let hat = graph.add(EnvNode::perc(&ctx, 1.0, 35.0, 0.2));
    graph.append(hat, highpass)?;
    let metro = graph.add(IntervalNode::new(&ctx).interval(sixteenth));
    graph.append(metro, hat)?;

    let bus = graph.add(PlusNode::new(&ctx));
    graph.append_all(bus, [lead, hat])?;
    let echo = graph.add(DelayNode::new(&ctx).time(eighth * 1.5).wet(0.3));
    graph.append(echo, bus)?;
    let spectrum = graph.add(SpectrumNode::new(&ctx).size(SPECTRUM_SIZE).interval(50.0));
    graph.append(spectrum, echo)?;

    graph.play(echo)?;
    graph.start(riff)?;
    graph.start(metro)?;
    graph.start(spectrum)?;
    info!(bpm, nodes = graph.len(), "patch built");

    Ok(Patch {
        riff,
        lead,
        metro,
        cutoff,
        spectrum,
    })
}
