use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::context::AudioContext;
use crate::error::TableError;
use crate::sequencing::timevalue::timevalue;

/*
Multi-Segment Envelope
======================

This module implements a breakpoint envelope: a list of target levels, each
reached over a duration along one of eight curve shapes. Attack/decay/sustain
/release is just one table among many.

Vocabulary
----------

  table       The breakpoints. Written as

                  [initial, [level, time, curve?], [level, time, curve?], ...]

              `time` is milliseconds or a time string ("bpm120 l8", "2sec").
              `curve` is a curve name or a number (a Curve shape value).

  segment     One row of the table: move from the current level to `level`
              in `time` ms.

  counter     Segment length in calls to `next()`. One call advances `step`
              samples, so a node that calls `next()` once per cell sets
              `step` to the cell size.

                  counter = round(time * samplerate / 1000 / step), min 1

  release     1-based index of the row where the gate phase stops and waits
  node        for `release()`.

  loop node   1-based index of the row to jump back to when the gate phase
              runs off the end of the table (or reaches the release node).


Status
------

    ┌──────┐  gate   ┌──────┐ release node  ┌─────────┐
    │ Wait │ ──────→ │ Gate │ ────────────→ │ Sustain │
    └──────┘         └──────┘               └─────────┘
                      │   ↑ loop node            │
          end of      │   └──────┘               │ release()
          table       ↓                          ↓
                   ┌─────┐   end of table   ┌─────────┐
                   │ End │ ←──────────────  │ Release │
                   └─────┘                  └─────────┘

`release()` can be called from any status. It zeroes the counter so the very
next call moves on to the row after the current one.

Wait, Sustain and End hold the level. Reaching End reports
`EnvelopeEvent::Ended`, reaching Sustain reports `EnvelopeEvent::Sustained`.


Curves
------

  step   jump to the target on the first sample
  lin    level += (target - level) / counter
  exp    level *= (target / level) ^ (1 / counter)
  sin    half a cosine cycle from level to target
  wel    quarter of a sine cycle (Welch), rising or falling
  curve  exponential lag with a shape value; |shape| < 0.001 is lin
  sqr    linear in sqrt space, squared back
  cub    linear in cube-root space, cubed back

Sine and Welch run a two-pole resonator instead of calling sin() per sample:

    y0 = b1 * y1 - y2        b1 = 2 cos(w)

Levels never settle on exact zero. Zero is replaced by ZERO (1e-6) so that
exponential segments, which divide by the current level, stay finite.
*/

/// Smallest level an envelope produces.
pub const ZERO: f64 = 1e-6;
/// Shortest segment duration in milliseconds.
pub const MIN_SEGMENT_MS: f64 = 10.0;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveKind {
    Step,
    Lin,
    Exp,
    Sin,
    Wel,
    Sqr,
    Cub,
}

impl CurveKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "step" => Some(Self::Step),
            "lin" | "linear" => Some(Self::Lin),
            "exp" | "exponential" => Some(Self::Exp),
            "sin" | "sine" => Some(Self::Sin),
            "wel" | "welch" => Some(Self::Wel),
            "sqr" | "squared" => Some(Self::Sqr),
            "cub" | "cubed" => Some(Self::Cub),
            _ => None,
        }
    }
}

/// A resolved curve: a named shape or an exponential lag shape value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Curve {
    Kind(CurveKind),
    Shape(f64),
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum TimeSpec {
    Ms(f64),
    Text(String),
}

impl From<f64> for TimeSpec {
    fn from(ms: f64) -> Self {
        TimeSpec::Ms(ms)
    }
}

impl From<&str> for TimeSpec {
    fn from(text: &str) -> Self {
        TimeSpec::Text(text.to_string())
    }
}

impl TimeSpec {
    pub fn to_ms(&self, ctx: &AudioContext) -> f64 {
        let ms = match self {
            TimeSpec::Ms(ms) if ms.is_finite() => *ms,
            TimeSpec::Ms(_) => MIN_SEGMENT_MS,
            TimeSpec::Text(text) => timevalue(text, ctx),
        };
        ms.max(MIN_SEGMENT_MS)
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum CurveSpec {
    Name(String),
    Shape(f64),
}

impl From<f64> for CurveSpec {
    fn from(shape: f64) -> Self {
        CurveSpec::Shape(shape)
    }
}

impl From<&str> for CurveSpec {
    fn from(name: &str) -> Self {
        CurveSpec::Name(name.to_string())
    }
}

impl CurveSpec {
    /// Unknown names resolve to `None`.
    pub fn resolve(&self) -> Option<Curve> {
        match self {
            CurveSpec::Name(name) => CurveKind::parse(name).map(Curve::Kind),
            CurveSpec::Shape(v) => Some(Curve::Shape(*v)),
        }
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub level: f64,
    pub time: TimeSpec,
    pub curve: Option<CurveSpec>,
}

impl Segment {
    pub fn new(level: f64, time: impl Into<TimeSpec>) -> Self {
        Self {
            level,
            time: time.into(),
            curve: None,
        }
    }

    pub fn curve(mut self, curve: impl Into<CurveSpec>) -> Self {
        self.curve = Some(curve.into());
        self
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EnvelopeTable {
    pub initial: f64,
    pub segments: Vec<Segment>,
}

impl EnvelopeTable {
    pub fn new(initial: f64) -> Self {
        Self {
            initial,
            segments: Vec::new(),
        }
    }

    pub fn then(mut self, segment: Segment) -> Self {
        self.segments.push(segment);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeStatus {
    Wait,
    Gate,
    Sustain,
    Release,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeEvent {
    Ended,
    Sustained,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvelopeInfo {
    pub total_ms: f64,
    pub loop_begin_ms: Option<f64>,
    pub release_begin_ms: Option<f64>,
    /// Loops without a release node: the gate phase never ends on its own.
    pub endless: bool,
}

#[derive(Debug, Clone, Copy)]
struct Row {
    level: f64,
    time_ms: f64,
    curve: Option<Curve>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Interp {
    Hold,
    Step,
    Lin,
    Exp,
    Sin,
    Wel,
    Shape,
    Sqr,
    Cub,
}

#[derive(Debug, Clone)]
pub struct Envelope {
    ctx: AudioContext,
    table: EnvelopeTable,
    curve: CurveSpec,
    /// Samples advanced per call to `next()`.
    pub step: f64,
    release_node: Option<usize>,
    loop_node: Option<usize>,

    // Resolved table and curve
    rows: Vec<Row>,
    init_level: f64,
    default_curve: Option<Curve>,

    // Runtime state
    status: EnvelopeStatus,
    level: f64,
    end_level: f64,
    interp: Interp,
    index: usize,
    counter: f64, // infinite while holding
    event: Option<EnvelopeEvent>,

    // Interpolator state
    grow: f64,
    a2: f64,
    b1: f64,
    y1: f64,
    y2: f64,
}

impl Envelope {
    pub fn new(ctx: &AudioContext) -> Self {
        Self {
            ctx: *ctx,
            table: EnvelopeTable::default(),
            curve: CurveSpec::Name("lin".into()),
            step: 1.0,
            release_node: None,
            loop_node: None,
            rows: Vec::new(),
            init_level: ZERO,
            default_curve: Some(Curve::Kind(CurveKind::Lin)),
            status: EnvelopeStatus::Wait,
            level: ZERO,
            end_level: ZERO,
            interp: Interp::Step,
            index: 0,
            counter: 0.0,
            event: None,
            grow: 0.0,
            a2: 0.0,
            b1: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    pub fn with_table(ctx: &AudioContext, table: EnvelopeTable) -> Self {
        let mut env = Self::new(ctx);
        env.set_table(table);
        env
    }

    pub fn set_table(&mut self, table: EnvelopeTable) {
        self.init_level = floor_zero(table.initial);
        self.rows = table
            .segments
            .iter()
            .map(|seg| Row {
                level: floor_zero(seg.level),
                time_ms: seg.time.to_ms(&self.ctx),
                curve: seg.curve.as_ref().and_then(CurveSpec::resolve),
            })
            .collect();
        self.table = table;
        self.level = self.init_level;
        self.end_level = self.init_level;
    }

    pub fn table(&self) -> &EnvelopeTable {
        &self.table
    }

    /// Curve used by rows that name none (or name an unknown one).
    /// An unknown default makes those rows hold their level.
    pub fn set_curve(&mut self, curve: impl Into<CurveSpec>) {
        self.curve = curve.into();
        self.default_curve = self.curve.resolve();
    }

    pub fn curve(&self) -> &CurveSpec {
        &self.curve
    }

    /// 1-based; values below 1 are ignored.
    pub fn set_release_node(&mut self, node: i32) {
        if node > 0 {
            self.release_node = Some(node as usize - 1);
        }
    }

    /// 1-based; values below 1 are ignored.
    pub fn set_loop_node(&mut self, node: i32) {
        if node > 0 {
            self.loop_node = Some(node as usize - 1);
        }
    }

    pub fn release_node(&self) -> Option<usize> {
        self.release_node.map(|n| n + 1)
    }

    pub fn loop_node(&self) -> Option<usize> {
        self.loop_node.map(|n| n + 1)
    }

    pub fn status(&self) -> EnvelopeStatus {
        self.status
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    /// Event produced by the most recent `next()`.
    pub fn event(&self) -> Option<EnvelopeEvent> {
        self.event
    }

    pub fn reset(&mut self) {
        self.level = self.init_level;
        self.end_level = self.init_level;
        self.index = 0;
        self.counter = 0.0;
        self.interp = Interp::Step;
        self.grow = 0.0;
        self.status = EnvelopeStatus::Wait;
        self.event = None;
    }

    /// Start the gate phase from the first row.
    pub fn gate(&mut self) {
        self.reset();
        self.status = EnvelopeStatus::Gate;
    }

    pub fn release(&mut self) {
        self.counter = 0.0;
        self.status = EnvelopeStatus::Release;
    }

    /// Freeze at the current level.
    pub fn cancel(&mut self) {
        self.status = EnvelopeStatus::Wait;
        self.interp = Interp::Hold;
        self.end_level = self.level;
    }

    /// Advance `step` samples and return the new level.
    pub fn next(&mut self) -> f64 {
        self.event = None;

        if matches!(
            self.status,
            EnvelopeStatus::Gate | EnvelopeStatus::Release
        ) {
            while self.counter <= 0.0 {
                if self.index >= self.rows.len() {
                    if self.status == EnvelopeStatus::Gate {
                        if let Some(loop_node) = self.loop_node.filter(|&n| n < self.rows.len()) {
                            self.index = loop_node;
                            continue;
                        }
                    }
                    self.hold(EnvelopeStatus::End, EnvelopeEvent::Ended);
                    continue;
                }
                if self.status == EnvelopeStatus::Gate && Some(self.index) == self.release_node {
                    if let Some(loop_node) = self.loop_node.filter(|&n| Some(n) < self.release_node) {
                        self.index = loop_node;
                        continue;
                    }
                    self.hold(EnvelopeStatus::Sustain, EnvelopeEvent::Sustained);
                    continue;
                }
                self.begin_row();
            }
        }

        self.level = match self.interp {
            Interp::Hold => self.level,
            Interp::Step => self.end_level,
            Interp::Lin => self.level + self.grow,
            Interp::Exp => self.level * self.grow,
            Interp::Sin => {
                let y0 = self.b1 * self.y1 - self.y2;
                self.y2 = self.y1;
                self.y1 = y0;
                self.a2 - y0
            }
            Interp::Wel => {
                let y0 = self.b1 * self.y1 - self.y2;
                self.y2 = self.y1;
                self.y1 = y0;
                self.a2 + y0
            }
            Interp::Shape => {
                self.b1 *= self.grow;
                self.a2 - self.b1
            }
            Interp::Sqr => {
                self.y1 += self.grow;
                self.y1 * self.y1
            }
            Interp::Cub => {
                self.y1 += self.grow;
                self.y1 * self.y1 * self.y1
            }
        };
        self.level = floor_zero(self.level);
        self.counter -= 1.0;
        self.level
    }

    fn hold(&mut self, status: EnvelopeStatus, event: EnvelopeEvent) {
        self.status = status;
        self.counter = f64::INFINITY;
        self.interp = Interp::Step;
        self.event = Some(event);
    }

    /// Load the row at `index` and set up its interpolator.
    fn begin_row(&mut self) {
        let row = self.rows[self.index];
        self.index += 1;

        let level = self.level;
        let end = row.level;
        self.end_level = end;

        let mut shape = 0.0;
        self.interp = match row.curve.or(self.default_curve) {
            None => Interp::Hold,
            Some(Curve::Kind(kind)) => match kind {
                CurveKind::Step => Interp::Step,
                CurveKind::Lin => Interp::Lin,
                CurveKind::Exp => Interp::Exp,
                CurveKind::Sin => Interp::Sin,
                CurveKind::Wel => Interp::Wel,
                CurveKind::Sqr => Interp::Sqr,
                CurveKind::Cub => Interp::Cub,
            },
            Some(Curve::Shape(v)) if v.abs() < 0.001 => Interp::Lin,
            Some(Curve::Shape(v)) => {
                shape = v;
                Interp::Shape
            }
        };

        let counter = (row.time_ms * 0.001 * self.ctx.sample_rate_f64() / self.step)
            .round()
            .max(1.0);
        self.counter = counter;

        match self.interp {
            Interp::Hold => {}
            Interp::Step => self.level = end,
            Interp::Lin => self.grow = (end - level) / counter,
            Interp::Exp => self.grow = (end / level).powf(1.0 / counter),
            Interp::Sin => {
                let w = std::f64::consts::PI / counter;
                self.a2 = (end + level) * 0.5;
                self.b1 = 2.0 * w.cos();
                self.y1 = (end - level) * 0.5;
                self.y2 = self.y1 * (std::f64::consts::FRAC_PI_2 - w).sin();
                self.level = self.a2 - self.y1;
            }
            Interp::Wel => {
                let w = std::f64::consts::FRAC_PI_2 / counter;
                self.b1 = 2.0 * w.cos();
                if end >= level {
                    self.a2 = level;
                    self.y1 = 0.0;
                    self.y2 = -w.sin() * (end - level);
                } else {
                    self.a2 = end;
                    self.y1 = level - end;
                    self.y2 = w.cos() * (level - end);
                }
                self.level = self.a2 + self.y1;
            }
            Interp::Shape => {
                let a1 = (end - level) / (1.0 - shape.exp());
                self.a2 = level + a1;
                self.b1 = a1;
                self.grow = (shape / counter).exp();
            }
            Interp::Sqr => {
                self.y1 = level.sqrt();
                self.y2 = end.sqrt();
                self.grow = (self.y2 - self.y1) / counter;
            }
            Interp::Cub => {
                self.y1 = level.powf(0.333_333_33);
                self.y2 = end.powf(0.333_333_33);
                self.grow = (self.y2 - self.y1) / counter;
            }
        }
    }

    /// Durations of the table when the sustain phase lasts `sustain_ms`.
    pub fn info(&self, sustain_ms: f64) -> EnvelopeInfo {
        let mut total = 0.0;
        let mut loop_begin = None;
        let mut release_begin = None;

        for (i, row) in self.rows.iter().enumerate() {
            if self.loop_node == Some(i) {
                loop_begin = Some(total);
            }
            if self.release_node == Some(i) {
                total += sustain_ms;
                release_begin = Some(total);
            }
            total += row.time_ms;
        }

        let endless = loop_begin.is_some() && release_begin.is_none();
        if endless {
            total += sustain_ms;
        }

        EnvelopeInfo {
            total_ms: total,
            loop_begin_ms: loop_begin,
            release_begin_ms: release_begin,
            endless,
        }
    }

    /// Render the whole shape into `points` values without touching `self`.
    /// The sustain phase is drawn one second long.
    pub fn preview(&self, points: usize) -> Vec<f32> {
        let mut env = self.clone();
        env.reset();
        let info = env.info(1000.0);
        if points == 0 {
            return Vec::new();
        }

        let samples = (info.total_ms * 0.001 * self.ctx.sample_rate_f64()).trunc();
        env.step = (samples / points as f64).max(1.0);
        env.status = EnvelopeStatus::Gate;

        let incr = info.total_ms / points as f64;
        let mut elapsed = 0.0;
        let mut released = false;
        let mut data = Vec::with_capacity(points);
        for _ in 0..points {
            data.push(env.next() as f32);
            elapsed += incr;
            if let Some(release_begin) = info.release_begin_ms {
                if !released && elapsed >= release_begin {
                    env.release();
                    released = true;
                }
            }
        }
        data
    }

    /// Percussive: attack then release, no sustain.
    pub fn perc(ctx: &AudioContext, attack_ms: f64, release_ms: f64, level: f64) -> Self {
        let table = EnvelopeTable::new(ZERO)
            .then(Segment::new(level.max(ZERO), attack_ms))
            .then(Segment::new(ZERO, release_ms));
        Self::with_table(ctx, table)
    }

    pub fn adsr(
        ctx: &AudioContext,
        attack_ms: f64,
        decay_ms: f64,
        sustain: f64,
        release_ms: f64,
        level: f64,
    ) -> Self {
        let table = EnvelopeTable::new(ZERO)
            .then(Segment::new(level.max(ZERO), attack_ms))
            .then(Segment::new(sustain.max(ZERO), decay_ms))
            .then(Segment::new(ZERO, release_ms));
        let mut env = Self::with_table(ctx, table);
        env.set_release_node(3);
        env
    }

    pub fn asr(ctx: &AudioContext, attack_ms: f64, sustain: f64, release_ms: f64) -> Self {
        let table = EnvelopeTable::new(ZERO)
            .then(Segment::new(sustain.max(ZERO), attack_ms))
            .then(Segment::new(ZERO, release_ms));
        let mut env = Self::with_table(ctx, table);
        env.set_release_node(2);
        env
    }

    pub fn dadsr(
        ctx: &AudioContext,
        delay_ms: f64,
        attack_ms: f64,
        decay_ms: f64,
        sustain: f64,
        release_ms: f64,
        level: f64,
    ) -> Self {
        let table = EnvelopeTable::new(ZERO)
            .then(Segment::new(ZERO, delay_ms))
            .then(Segment::new(level.max(ZERO), attack_ms))
            .then(Segment::new(sustain.max(ZERO), decay_ms))
            .then(Segment::new(ZERO, release_ms));
        let mut env = Self::with_table(ctx, table);
        env.set_release_node(4);
        env
    }

    /// Attack, hold for `sustain_ms`, release.
    pub fn linen(
        ctx: &AudioContext,
        attack_ms: f64,
        sustain_ms: f64,
        release_ms: f64,
        level: f64,
    ) -> Self {
        let level = level.max(ZERO);
        let table = EnvelopeTable::new(ZERO)
            .then(Segment::new(level, attack_ms))
            .then(Segment::new(level, sustain_ms))
            .then(Segment::new(ZERO, release_ms));
        Self::with_table(ctx, table)
    }

    /// Rise and fall in equal halves of `duration_ms` (at least 20 ms).
    pub fn tri(ctx: &AudioContext, duration_ms: f64, level: f64) -> Self {
        let half = duration_ms.max(20.0) * 0.5;
        let table = EnvelopeTable::new(ZERO)
            .then(Segment::new(level.max(ZERO), half))
            .then(Segment::new(ZERO, half));
        Self::with_table(ctx, table)
    }

    /// Start at `level` and fall to silence.
    pub fn cutoff(ctx: &AudioContext, release_ms: f64, level: f64) -> Self {
        let table = EnvelopeTable::new(level.max(ZERO)).then(Segment::new(ZERO, release_ms));
        Self::with_table(ctx, table)
    }
}

#[inline]
fn floor_zero(x: f64) -> f64 {
    if x == 0.0 || x.is_nan() {
        ZERO
    } else {
        x
    }
}

/*
Table Literals
--------------

    [0, [1, 100, "exp"], [0.5, "bpm120 l8"], [0, 1000, -4]]

Numbers, double-quoted strings, commas and brackets. Whitespace is ignored.
*/

impl FromStr for EnvelopeTable {
    type Err = TableError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut lexer = Lexer::new(text);
        let value = lexer.value()?;
        lexer.skip_ws();
        if lexer.pos < lexer.bytes.len() {
            return Err(TableError::Trailing(lexer.pos));
        }

        let Literal::List(items) = value else {
            return Err(TableError::Expected("table", 0));
        };
        let mut items = items.into_iter();
        let initial = match items.next() {
            Some(Literal::Number(n)) => n,
            Some(_) => return Err(TableError::Expected("initial level", 0)),
            None => return Ok(EnvelopeTable::new(ZERO)),
        };

        let mut table = EnvelopeTable::new(initial);
        for (row, item) in items.enumerate() {
            let Literal::List(fields) = item else {
                return Err(TableError::Expected("segment", row + 1));
            };
            let mut fields = fields.into_iter();
            let level = match fields.next() {
                Some(Literal::Number(n)) => n,
                _ => return Err(TableError::Expected("segment level", row + 1)),
            };
            let time = match fields.next() {
                Some(Literal::Number(n)) => TimeSpec::Ms(n),
                Some(Literal::Text(s)) => TimeSpec::Text(s),
                _ => TimeSpec::Ms(MIN_SEGMENT_MS),
            };
            let curve = match fields.next() {
                Some(Literal::Number(n)) => Some(CurveSpec::Shape(n)),
                Some(Literal::Text(s)) => Some(CurveSpec::Name(s)),
                _ => None,
            };
            table.segments.push(Segment { level, time, curve });
        }
        Ok(table)
    }
}

enum Literal {
    Number(f64),
    Text(String),
    List(Vec<Literal>),
}

struct Lexer<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            bytes: text.as_bytes(),
            pos: 0,
        }
    }

    fn skip_ws(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn value(&mut self) -> Result<Literal, TableError> {
        self.skip_ws();
        match self.bytes.get(self.pos) {
            Some(b'[') => self.list(),
            Some(b'"') => self.text(),
            Some(_) => self.number(),
            None => Err(TableError::UnexpectedEnd),
        }
    }

    fn list(&mut self) -> Result<Literal, TableError> {
        self.pos += 1;
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            match self.bytes.get(self.pos) {
                Some(b']') => {
                    self.pos += 1;
                    return Ok(Literal::List(items));
                }
                Some(b',') if !items.is_empty() => self.pos += 1,
                Some(_) if items.is_empty() => {}
                Some(_) => return Err(TableError::Unexpected(self.pos)),
                None => return Err(TableError::UnexpectedEnd),
            }
            items.push(self.value()?);
        }
    }

    fn text(&mut self) -> Result<Literal, TableError> {
        self.pos += 1;
        let start = self.pos;
        while self.pos < self.bytes.len() && self.bytes[self.pos] != b'"' {
            self.pos += 1;
        }
        if self.pos >= self.bytes.len() {
            return Err(TableError::UnexpectedEnd);
        }
        let text = String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned();
        self.pos += 1;
        Ok(Literal::Text(text))
    }

    fn number(&mut self) -> Result<Literal, TableError> {
        let start = self.pos;
        while self.pos < self.bytes.len()
            && matches!(self.bytes[self.pos], b'0'..=b'9' | b'.' | b'-' | b'+' | b'e' | b'E')
        {
            self.pos += 1;
        }
        std::str::from_utf8(&self.bytes[start..self.pos])
            .ok()
            .and_then(|s| s.parse::<f64>().ok())
            .map(Literal::Number)
            .ok_or(TableError::Unexpected(start))
    }
}
