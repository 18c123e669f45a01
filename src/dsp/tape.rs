use std::f64::consts::PI;
use std::sync::{Arc, LazyLock};

use crate::error::TapeError;

/*
Tape Splicing
=============

A `Tape` is an ordered list of `Fragment`s. A fragment is a view into a
shared source buffer: where it starts, how long it lasts, and how it is
played back. Editing a tape never touches sample data. Every edit returns a
new tape whose fragments share the same buffers.

    source  ▕▁▂▃▅▆▇▆▅▃▂▁▂▃▅▆▇▆▅▃▂▁▂▃▅▆▇▆▅▃▂▁▏
                  └──── fragment ───┘
                  start      duration

Fragment fields
---------------

  start      offset into the source, seconds
  duration   length of source material, seconds
  reverse    play the region backwards
  pitch      playback speed in percent (100 = original). The audible
             duration is duration * 100 / pitch.
  stretch    set by `stretch()`. Informational, playback is the same
             resampling as `pitch`.
  pan        0 (left) .. 50 (centre) .. 100 (right), equal power

Edits
-----

  slice(s, l)    the audible region [s, s+l), clipped to the tape
  concat(t)      this tape followed by t
  repeat(n)      n copies back to back (alias `times`)
  split(n)       n equal slices
  fill(d)        whole repeats plus a partial slice, exactly d seconds long
  replace(s,l,t) swap [s, s+l) for t, padding with silence if needed
  reverse()      reverses fragment order and flips every fragment
  pitch(p, st)   multiplies each fragment's pitch by p%
  stretch(p)     pitch by 10000/p, marked as stretched
  pan(p)         sets every fragment's pan

Streaming
---------

`TapeStream` is the playhead. For each fragment it steps through the source
at `source_rate / stream_rate * pitch / 100` samples per output sample,
reading the nearest lower sample (no interpolation). At the end of the last
fragment it either rewinds (looped) or ends and outputs silence from then on.
*/

const CENTER: f64 = 50.0;
const SILENCE_LEN: usize = 60;

static SILENCE: LazyLock<Arc<[f32]>> = LazyLock::new(|| vec![0.0; SILENCE_LEN].into());

#[derive(Debug, Clone)]
pub struct Fragment {
    buffer: Arc<[f32]>,
    samplerate: f64,
    start: f64,
    duration: f64,
    reverse: bool,
    pitch: f64,
    stretch: bool,
    pan: f64,
}

impl Fragment {
    pub fn new(buffer: Arc<[f32]>, samplerate: f64, start: f64, duration: f64) -> Self {
        Self {
            buffer,
            samplerate: if samplerate > 0.0 { samplerate } else { 44100.0 },
            start,
            duration,
            reverse: false,
            pitch: 100.0,
            stretch: false,
            pan: CENTER,
        }
    }

    /// Audible duration in seconds.
    pub fn duration(&self) -> f64 {
        self.duration * (100.0 / self.pitch)
    }

    /// Duration of the underlying source region.
    pub fn original_duration(&self) -> f64 {
        self.duration
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn is_reversed(&self) -> bool {
        self.reverse
    }

    pub fn is_stretched(&self) -> bool {
        self.stretch
    }

    pub fn pitch(&self) -> f64 {
        self.pitch
    }

    pub fn pan(&self) -> f64 {
        self.pan
    }

    /// Cut the audible region `[remaining_start, remaining_start +
    /// remaining_length)` out of this fragment.
    ///
    /// Returns the clipped fragment (if any of it lies inside), the start
    /// offset still to skip and the length still to take from the fragments
    /// that follow.
    pub fn create(&self, remaining_start: f64, remaining_length: f64) -> (Option<Fragment>, f64, f64) {
        let duration = self.duration();
        if remaining_start >= duration {
            return (None, remaining_start - duration, remaining_length);
        }

        let (new_length, left) = if remaining_start + remaining_length >= duration {
            let taken = duration - remaining_start;
            (taken, remaining_length - taken)
        } else {
            (remaining_length, 0.0)
        };

        let scale = self.pitch * 0.01;
        let mut fragment = self.clone();
        fragment.duration = new_length * scale;
        fragment.start = if self.reverse {
            // audible time runs from the end of the region
            self.start + self.duration - (remaining_start + new_length) * scale
        } else {
            self.start + remaining_start * scale
        };
        (Some(fragment), 0.0, left)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Tape {
    fragments: Vec<Fragment>,
}

impl Tape {
    pub fn new() -> Self {
        Self::default()
    }

    /// A tape spanning the whole of `samples`.
    pub fn from_samples(samples: Arc<[f32]>, samplerate: u32) -> Self {
        let samplerate = if samplerate > 0 { samplerate as f64 } else { 44100.0 };
        let duration = samples.len() as f64 / samplerate;
        Self {
            fragments: vec![Fragment::new(samples, samplerate, 0.0, duration)],
        }
    }

    pub fn from_fragments(fragments: Vec<Fragment>) -> Self {
        Self { fragments }
    }

    /// `duration` seconds of silence.
    pub fn silence(duration: f64) -> Self {
        let one_second = Self::from_samples(Arc::clone(&SILENCE), 1).slice(0.0, 1.0);
        one_second.fill(duration).unwrap_or_default()
    }

    /// Silence as long as this tape.
    pub fn silence_like(&self) -> Self {
        Self::silence(self.duration())
    }

    pub fn join(tapes: &[Tape]) -> Self {
        Self {
            fragments: tapes.iter().flat_map(|t| t.fragments.iter().cloned()).collect(),
        }
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn duration(&self) -> f64 {
        self.fragments.iter().map(Fragment::duration).sum()
    }

    pub fn slice(&self, start: f64, length: f64) -> Self {
        let duration = self.duration();
        let start = start.max(0.0);
        let length = if start + length > duration {
            duration - start
        } else {
            length
        };
        let mut tape = Tape::new();
        if length <= 0.0 {
            return tape;
        }

        let mut remaining_start = start;
        let mut remaining_length = length;
        for fragment in &self.fragments {
            let (piece, next_start, next_length) = fragment.create(remaining_start, remaining_length);
            remaining_start = next_start;
            remaining_length = next_length;
            if let Some(piece) = piece {
                tape.fragments.push(piece);
            }
            if remaining_length == 0.0 {
                break;
            }
        }
        tape
    }

    pub fn cut(&self, start: f64, length: f64) -> Self {
        self.slice(start, length)
    }

    pub fn concat(&self, other: &Tape) -> Self {
        let mut fragments = self.fragments.clone();
        fragments.extend(other.fragments.iter().cloned());
        Self { fragments }
    }

    pub fn repeat(&self, count: usize) -> Self {
        let mut fragments = Vec::with_capacity(self.fragments.len() * count);
        for _ in 0..count {
            fragments.extend(self.fragments.iter().cloned());
        }
        Self { fragments }
    }

    pub fn times(&self, count: usize) -> Self {
        self.repeat(count)
    }

    pub fn split(&self, count: usize) -> Vec<Tape> {
        if count == 0 {
            return Vec::new();
        }
        let piece = self.duration() / count as f64;
        (0..count)
            .map(|i| self.slice(i as f64 * piece, piece))
            .collect()
    }

    pub fn fill(&self, duration: f64) -> Result<Tape, TapeError> {
        let own = self.duration();
        if own == 0.0 {
            return Err(TapeError::EmptyTape);
        }
        let count = (duration / own).max(0.0) as usize;
        let remain = duration % own;
        Ok(self.repeat(count).concat(&self.slice(0.0, remain)))
    }

    pub fn replace(&self, start: f64, length: f64, replacement: &Tape) -> Self {
        let offset = start + length;
        let mut tape = self.slice(0.0, start);

        let head = tape.duration();
        if head < start {
            tape = tape.concat(&Tape::silence(start - head));
        }
        tape = tape.concat(replacement);

        let duration = self.duration();
        if duration > offset {
            tape = tape.concat(&self.slice(offset, duration - offset));
        }
        tape
    }

    pub fn reverse(&self) -> Self {
        let fragments = self
            .fragments
            .iter()
            .rev()
            .map(|f| {
                let mut f = f.clone();
                f.reverse = !f.reverse;
                f
            })
            .collect();
        Self { fragments }
    }

    /// Scale every fragment's pitch by `percent`. Non-positive values are
    /// ignored.
    pub fn pitch(&self, percent: f64, stretch: bool) -> Self {
        if !(percent.is_finite() && percent > 0.0) {
            return self.clone();
        }
        let fragments = self
            .fragments
            .iter()
            .map(|f| {
                let mut f = f.clone();
                f.pitch *= percent * 0.01;
                f.stretch = stretch;
                f
            })
            .collect();
        Self { fragments }
    }

    /// Change the duration to `percent` of the current one.
    pub fn stretch(&self, percent: f64) -> Self {
        let pitch = 1.0 / (percent * 0.01) * 100.0;
        self.pitch(pitch, true)
    }

    pub fn pan(&self, right_percent: f64) -> Self {
        let fragments = self
            .fragments
            .iter()
            .map(|f| {
                let mut f = f.clone();
                f.pan = right_percent;
                f
            })
            .collect();
        Self { fragments }
    }
}

/// Stateful reader over a tape.
#[derive(Debug, Clone)]
pub struct TapeStream {
    fragments: Vec<Fragment>,
    samplerate: f64,
    pub looped: bool,
    ended: bool,
    buffer: Option<Arc<[f32]>>,
    index: f64,
    incr: f64,
    begin: f64,
    end: f64,
    next_fragment: usize,
    pan_l: f32,
    pan_r: f32,
}

impl TapeStream {
    pub fn new(tape: &Tape, samplerate: u32) -> Self {
        Self {
            fragments: tape.fragments.clone(),
            samplerate: samplerate as f64,
            looped: false,
            ended: false,
            buffer: None,
            index: 0.0,
            incr: 0.0,
            begin: 0.0,
            end: 0.0,
            next_fragment: 0,
            pan_l: std::f32::consts::FRAC_1_SQRT_2,
            pan_r: std::f32::consts::FRAC_1_SQRT_2,
        }
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Rewind to the start. The loop flag is kept.
    pub fn reset(&mut self) {
        self.ended = false;
        self.rewind();
        self.pan_l = std::f32::consts::FRAC_1_SQRT_2;
        self.pan_r = std::f32::consts::FRAC_1_SQRT_2;
    }

    fn rewind(&mut self) {
        self.buffer = None;
        self.index = 0.0;
        self.incr = 0.0;
        self.begin = 0.0;
        self.end = 0.0;
        self.next_fragment = 0;
    }

    fn load(&mut self, which: usize) {
        let fragment = &self.fragments[which];
        let mut incr = fragment.samplerate / (self.samplerate * 100.0) * fragment.pitch;
        self.begin = fragment.start * fragment.samplerate;
        self.end = self.begin + fragment.duration * fragment.samplerate;

        let angle = 0.005 * PI * fragment.pan;
        self.pan_l = angle.cos() as f32;
        self.pan_r = angle.sin() as f32;

        if fragment.reverse {
            incr = -incr;
            self.index = self.end + incr;
        } else {
            self.index = self.begin;
        }
        self.incr = incr;
        self.buffer = Some(Arc::clone(&fragment.buffer));
    }

    fn playable(&self) -> bool {
        self.buffer.is_some() && self.index >= self.begin && self.index < self.end
    }

    /// Render the next `left.len()` samples. Output after the end is silence.
    pub fn fetch(&mut self, left: &mut [f32], right: &mut [f32]) {
        left.fill(0.0);
        right.fill(0.0);
        if self.fragments.is_empty() {
            self.ended = true;
            return;
        }

        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            if self.ended {
                break;
            }
            let mut loaded = 0;
            while !self.playable() {
                if self.next_fragment < self.fragments.len() {
                    self.load(self.next_fragment);
                    self.next_fragment += 1;
                    loaded += 1;
                } else if self.looped && loaded < self.fragments.len() {
                    self.rewind();
                } else {
                    // out of fragments, or a full pass had nothing to play
                    self.ended = true;
                    break;
                }
            }
            if self.ended {
                break;
            }

            let sample = match &self.buffer {
                Some(buffer) if self.index >= 0.0 => buffer.get(self.index as usize).copied().unwrap_or(0.0),
                _ => 0.0,
            };
            *l = sample * self.pan_l;
            *r = sample * self.pan_r;
            self.index += self.incr;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 1024;

    fn ramp(len: usize) -> Tape {
        let samples: Vec<f32> = (0..len).map(|i| i as f32 / len as f32).collect();
        Tape::from_samples(samples.into(), SR)
    }

    fn stream(tape: &Tape, len: usize) -> (Vec<f32>, Vec<f32>) {
        let mut s = TapeStream::new(tape, SR);
        let mut l = vec![0.0; len];
        let mut r = vec![0.0; len];
        s.fetch(&mut l, &mut r);
        (l, r)
    }

    #[test]
    fn duration_follows_pitch() {
        let tape = ramp(1024);
        assert!((tape.duration() - 1.0).abs() < 1e-12);
        assert!((tape.pitch(200.0, false).duration() - 0.5).abs() < 1e-12);
        assert!((tape.stretch(200.0).duration() - 2.0).abs() < 1e-12);
        assert!(tape.stretch(200.0).fragments()[0].is_stretched());
    }

    #[test]
    fn slice_is_clipped_to_tape() {
        let tape = ramp(1024);
        assert!((tape.slice(0.75, 1.0).duration() - 0.25).abs() < 1e-12);
        assert!(tape.slice(2.0, 1.0).fragments().is_empty());
    }

    #[test]
    fn slice_then_concat_streams_like_original() {
        let tape = ramp(512).concat(&ramp(256).reverse());
        let p = 0.625;
        let joined = tape.slice(0.0, p).concat(&tape.slice(p, tape.duration() - p));
        assert!((joined.duration() - tape.duration()).abs() < 1e-12);
        assert_eq!(stream(&joined, 800), stream(&tape, 800));
    }

    #[test]
    fn reverse_twice_is_identity() {
        let tape = ramp(100).concat(&ramp(50).pitch(50.0, false)).pan(20.0);
        assert_eq!(stream(&tape.reverse().reverse(), 400), stream(&tape, 400));
    }

    #[test]
    fn reverse_plays_backwards() {
        let (l, _) = stream(&ramp(100).reverse(), 100);
        assert!(l.windows(2).all(|w| w[0] >= w[1]), "samples should descend");
    }

    #[test]
    fn fill_reaches_exact_duration() {
        let tape = ramp(800);
        let filled = tape.fill(0.25).unwrap();
        assert!((filled.duration() - 0.25).abs() < 1e-9);
        assert_eq!(Tape::new().fill(1.0).unwrap_err(), TapeError::EmptyTape);
    }

    #[test]
    fn replace_pads_with_silence() {
        let tape = ramp(256);
        let replaced = tape.replace(0.5, 0.1, &ramp(64));
        // 0.25 of tape, 0.25 of silence, 0.0625 replacement
        assert!((replaced.duration() - 0.5625).abs() < 1e-9);
    }

    #[test]
    fn split_gives_equal_pieces() {
        let pieces = ramp(1024).split(4);
        assert_eq!(pieces.len(), 4);
        for piece in pieces {
            assert!((piece.duration() - 0.25).abs() < 1e-12);
        }
    }

    #[test]
    fn stream_ends_then_stays_silent() {
        let tape = ramp(10);
        let mut s = TapeStream::new(&tape, SR);
        let mut l = [0.0f32; 16];
        let mut r = [0.0f32; 16];
        s.fetch(&mut l, &mut r);
        assert!(s.is_ended());
        assert!(l[10..].iter().all(|&x| x == 0.0));
        s.fetch(&mut l, &mut r);
        assert!(l.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn looped_stream_rewinds() {
        let tape = ramp(10);
        let mut s = TapeStream::new(&tape, SR);
        s.looped = true;
        let mut l = [0.0f32; 30];
        let mut r = [0.0f32; 30];
        s.fetch(&mut l, &mut r);
        assert!(!s.is_ended());
        assert_eq!(l[0..10], l[10..20]);
    }

    #[test]
    fn hard_left_pan() {
        let (l, r) = stream(&ramp(10).pan(0.0), 10);
        assert!(r.iter().all(|&x| x.abs() < 1e-6));
        assert!((l[5] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn silence_is_silent() {
        let tape = Tape::silence(0.01);
        assert!((tape.duration() - 0.01).abs() < 1e-9);
        let (l, _) = stream(&tape, 80);
        assert!(l.iter().all(|&x| x == 0.0));
    }
}
