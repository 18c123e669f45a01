use std::f64::consts::PI;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/*
Biquad Designer
===============

Second-order IIR filter. Five coefficients, two samples of history on each
side of the difference equation:

    y[n] = b0 x[n] + b1 x[n-1] + b2 x[n-2] - a1 y[n-1] - a2 y[n-2]

Coefficients come from the RBJ audio EQ cookbook, normalised by a0.

| type      | aliases   | uses           | f <= 0      | f >= nyquist |
| --------- | --------- | -------------- | ----------- | ------------ |
| lowpass   | lpf       | resonance (dB) | zero        | identity     |
| highpass  | hpf       | resonance (dB) | identity    | zero         |
| bandpass  | bpf       | Q              | zero        | zero         |
| lowshelf  |           | gain (dB)      | identity    | A² gain      |
| highshelf |           | gain (dB)      | A² gain     | identity     |
| peaking   | peak      | Q, gain (dB)   | identity    | identity     |
| notch     | bef, brf  | Q              | identity    | identity     |
| allpass   | apf       | Q              | identity    | identity     |

"identity" is b0 = 1, everything else 0. "zero" is all five zero.
Q <= 0 on the Q-driven types collapses to zero (bandpass, notch), A² gain
(peaking) or an inverter (allpass). No combination of inputs yields NaN.

Low-pass and high-pass do not take Q. Their second argument is a resonance
in decibels, mapped to a damping factor:

    g = 10^(res / 20)
    d = sqrt((4 - sqrt(16 - 16 / g²)) / 2)

Shelves use a fixed slope S = 1 (the steepest slope without overshoot).

The output is hard clipped to [-1, 1]. At the end of every block the most
recent input and output history values are flushed to zero when smaller
than 1e-4 in magnitude, so a decaying tail cannot end in denormals.
*/

const DENORMAL_FLUSH: f64 = 1e-4;
const SHELF_SLOPE: f64 = 1.0;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BiquadType {
    #[default]
    LowPass,
    HighPass,
    BandPass,
    LowShelf,
    HighShelf,
    Peaking,
    Notch,
    AllPass,
}

impl BiquadType {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "lowpass" | "lpf" => Some(Self::LowPass),
            "highpass" | "hpf" => Some(Self::HighPass),
            "bandpass" | "bpf" => Some(Self::BandPass),
            "lowshelf" => Some(Self::LowShelf),
            "highshelf" => Some(Self::HighShelf),
            "peaking" | "peak" => Some(Self::Peaking),
            "notch" | "bef" | "brf" => Some(Self::Notch),
            "allpass" | "apf" => Some(Self::AllPass),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::LowPass => "lowpass",
            Self::HighPass => "highpass",
            Self::BandPass => "bandpass",
            Self::LowShelf => "lowshelf",
            Self::HighShelf => "highshelf",
            Self::Peaking => "peaking",
            Self::Notch => "notch",
            Self::AllPass => "allpass",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coefficients {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl Coefficients {
    pub const IDENTITY: Self = Self::gain(1.0);
    pub const ZERO: Self = Self::gain(0.0);

    pub const fn gain(b0: f64) -> Self {
        Self {
            b0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }

    /// Design coefficients. `q` is a resonance in dB for low/high-pass.
    pub fn design(kind: BiquadType, freq: f64, q: f64, gain_db: f64, sample_rate: f64) -> Self {
        let f = freq / (sample_rate * 0.5);
        match kind {
            BiquadType::LowPass => lowpass(f, q),
            BiquadType::HighPass => highpass(f, q),
            BiquadType::BandPass => bandpass(f, q),
            BiquadType::LowShelf => lowshelf(f, gain_db),
            BiquadType::HighShelf => highshelf(f, gain_db),
            BiquadType::Peaking => peaking(f, q, gain_db),
            BiquadType::Notch => notch(f, q),
            BiquadType::AllPass => allpass(f, q),
        }
    }
}

/// Damping factor and `theta` shared by the resonant low/high-pass pair.
fn resonant(cutoff: f64, resonance: f64) -> (f64, f64) {
    let resonance = resonance.max(0.0);
    let g = 10f64.powf(0.05 * resonance);
    let d = ((4.0 - (16.0 - 16.0 / (g * g)).sqrt()) * 0.5).sqrt();
    let theta = PI * cutoff;
    let sn = 0.5 * d * theta.sin();
    let beta = 0.5 * (1.0 - sn) / (1.0 + sn);
    (beta, theta)
}

fn lowpass(cutoff: f64, resonance: f64) -> Coefficients {
    if cutoff >= 1.0 {
        return Coefficients::IDENTITY;
    }
    if cutoff <= 0.0 {
        return Coefficients::ZERO;
    }
    let (beta, theta) = resonant(cutoff, resonance);
    let gamma = (0.5 + beta) * theta.cos();
    let alpha = 0.25 * (0.5 + beta - gamma);
    Coefficients {
        b0: 2.0 * alpha,
        b1: 4.0 * alpha,
        b2: 2.0 * alpha,
        a1: 2.0 * -gamma,
        a2: 2.0 * beta,
    }
}

fn highpass(cutoff: f64, resonance: f64) -> Coefficients {
    if cutoff >= 1.0 {
        return Coefficients::ZERO;
    }
    if cutoff <= 0.0 {
        return Coefficients::IDENTITY;
    }
    let (beta, theta) = resonant(cutoff, resonance);
    let gamma = (0.5 + beta) * theta.cos();
    let alpha = 0.25 * (0.5 + beta + gamma);
    Coefficients {
        b0: 2.0 * alpha,
        b1: -4.0 * alpha,
        b2: 2.0 * alpha,
        a1: 2.0 * -gamma,
        a2: 2.0 * beta,
    }
}

fn bandpass(f: f64, q: f64) -> Coefficients {
    if !(f > 0.0 && f < 1.0) || q <= 0.0 {
        return Coefficients::ZERO;
    }
    let w0 = PI * f;
    let alpha = w0.sin() / (2.0 * q);
    let k = w0.cos();
    let ia0 = 1.0 / (1.0 + alpha);
    Coefficients {
        b0: alpha * ia0,
        b1: 0.0,
        b2: -alpha * ia0,
        a1: -2.0 * k * ia0,
        a2: (1.0 - alpha) * ia0,
    }
}

/// Common terms of both shelves.
fn shelf(f: f64, a: f64) -> (f64, f64, f64) {
    let w0 = PI * f;
    let alpha = 0.5 * w0.sin() * ((a + 1.0 / a) * (1.0 / SHELF_SLOPE - 1.0) + 2.0).sqrt();
    let k = w0.cos();
    let k2 = 2.0 * a.sqrt() * alpha;
    (k, k2, a)
}

fn lowshelf(f: f64, gain_db: f64) -> Coefficients {
    let a = 10f64.powf(gain_db / 40.0);
    if f >= 1.0 {
        return Coefficients::gain(a * a);
    }
    if f <= 0.0 {
        return Coefficients::IDENTITY;
    }
    let (k, k2, a) = shelf(f, a);
    let ap1 = a + 1.0;
    let am1 = a - 1.0;
    let ia0 = 1.0 / (ap1 + am1 * k + k2);
    Coefficients {
        b0: (a * (ap1 - am1 * k + k2)) * ia0,
        b1: (2.0 * a * (am1 - ap1 * k)) * ia0,
        b2: (a * (ap1 - am1 * k - k2)) * ia0,
        a1: (-2.0 * (am1 + ap1 * k)) * ia0,
        a2: (ap1 + am1 * k - k2) * ia0,
    }
}

fn highshelf(f: f64, gain_db: f64) -> Coefficients {
    let a = 10f64.powf(gain_db / 40.0);
    if f >= 1.0 {
        return Coefficients::IDENTITY;
    }
    if f <= 0.0 {
        return Coefficients::gain(a * a);
    }
    let (k, k2, a) = shelf(f, a);
    let ap1 = a + 1.0;
    let am1 = a - 1.0;
    let ia0 = 1.0 / (ap1 - am1 * k + k2);
    Coefficients {
        b0: (a * (ap1 + am1 * k + k2)) * ia0,
        b1: (-2.0 * a * (am1 + ap1 * k)) * ia0,
        b2: (a * (ap1 + am1 * k - k2)) * ia0,
        a1: (2.0 * (am1 - ap1 * k)) * ia0,
        a2: (ap1 - am1 * k - k2) * ia0,
    }
}

fn peaking(f: f64, q: f64, gain_db: f64) -> Coefficients {
    if !(f > 0.0 && f < 1.0) {
        return Coefficients::IDENTITY;
    }
    let a = 10f64.powf(gain_db / 40.0);
    if q <= 0.0 {
        return Coefficients::gain(a * a);
    }
    let w0 = PI * f;
    let alpha = w0.sin() / (2.0 * q);
    let k = w0.cos();
    let ia0 = 1.0 / (1.0 + alpha / a);
    let b1 = (-2.0 * k) * ia0;
    Coefficients {
        b0: (1.0 + alpha * a) * ia0,
        b1,
        b2: (1.0 - alpha * a) * ia0,
        a1: b1,
        a2: (1.0 - alpha / a) * ia0,
    }
}

fn notch(f: f64, q: f64) -> Coefficients {
    if !(f > 0.0 && f < 1.0) {
        return Coefficients::IDENTITY;
    }
    if q <= 0.0 {
        return Coefficients::ZERO;
    }
    let w0 = PI * f;
    let alpha = w0.sin() / (2.0 * q);
    let k = w0.cos();
    let ia0 = 1.0 / (1.0 + alpha);
    let b1 = (-2.0 * k) * ia0;
    Coefficients {
        b0: ia0,
        b1,
        b2: ia0,
        a1: b1,
        a2: (1.0 - alpha) * ia0,
    }
}

fn allpass(f: f64, q: f64) -> Coefficients {
    if !(f > 0.0 && f < 1.0) {
        return Coefficients::IDENTITY;
    }
    if q <= 0.0 {
        return Coefficients::gain(-1.0);
    }
    let w0 = PI * f;
    let alpha = w0.sin() / (2.0 * q);
    let k = w0.cos();
    let ia0 = 1.0 / (1.0 + alpha);
    let b0 = (1.0 - alpha) * ia0;
    let b1 = (-2.0 * k) * ia0;
    Coefficients {
        b0,
        b1,
        b2: (1.0 + alpha) * ia0,
        a1: b1,
        a2: b0,
    }
}

#[derive(Debug, Clone)]
pub struct Biquad {
    kind: BiquadType,
    sample_rate: f64,
    freq: f64,
    q: f64,
    gain_db: f64,
    coeffs: Coefficients,

    x1: f64, // previous input
    x2: f64,
    y1: f64, // previous output, before clipping
    y2: f64,
}

impl Biquad {
    pub fn new(kind: BiquadType, sample_rate: f64) -> Self {
        let mut biquad = Self {
            kind,
            sample_rate,
            freq: 340.0,
            q: 1.0,
            gain_db: 0.0,
            coeffs: Coefficients::ZERO,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        };
        biquad.redesign();
        biquad
    }

    pub fn kind(&self) -> BiquadType {
        self.kind
    }

    pub fn set_kind(&mut self, kind: BiquadType) {
        if kind != self.kind {
            self.kind = kind;
            self.redesign();
        }
    }

    pub fn set_params(&mut self, freq: f64, q: f64, gain_db: f64) {
        self.freq = freq;
        self.q = q;
        self.gain_db = gain_db;
        self.redesign();
    }

    pub fn params(&self) -> (f64, f64, f64) {
        (self.freq, self.q, self.gain_db)
    }

    pub fn coefficients(&self) -> Coefficients {
        self.coeffs
    }

    fn redesign(&mut self) {
        self.coeffs =
            Coefficients::design(self.kind, self.freq, self.q, self.gain_db, self.sample_rate);
    }

    /// Filter `buffer` in place.
    pub fn process(&mut self, buffer: &mut [f32]) {
        let Coefficients { b0, b1, b2, a1, a2 } = self.coeffs;
        let (mut x1, mut x2, mut y1, mut y2) = (self.x1, self.x2, self.y1, self.y2);

        for sample in buffer.iter_mut() {
            let x0 = *sample as f64;
            let y0 = b0 * x0 + b1 * x1 + b2 * x2 - a1 * y1 - a2 * y2;
            *sample = y0.clamp(-1.0, 1.0) as f32;

            x2 = x1;
            x1 = x0;
            y2 = y1;
            y1 = y0;
        }

        if x1.abs() < DENORMAL_FLUSH {
            x1 = 0.0;
        }
        if y1.abs() < DENORMAL_FLUSH {
            y1 = 0.0;
        }

        self.x1 = x1;
        self.x2 = x2;
        self.y1 = y1;
        self.y2 = y2;
    }

    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }
}
