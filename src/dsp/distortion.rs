//! Gain-Staged Distortion
//!
//! The signal is pushed into a hard clipper by two gains given in dB:
//!
//!   post_scale = 2^(-post_gain / 6)
//!   pre_scale  = 2^(-pre_gain  / 6) * post_scale
//!   limit      = post_scale
//!
//!   y = clamp(x * pre_scale, -limit, limit)
//!
//! With the defaults (pre -60 dB, post 18 dB) the input is boosted by about
//! 42 dB and clipped at 1/8 full scale.
//!
//! # Tone
//!
//! A non-zero `cutoff` runs the scaled signal through a resonant lowpass
//! (resonance 1 dB) before clipping, taming the harsh upper harmonics.
//!
//!   1000 Hz  = dark, woolly
//!   4000 Hz  = crunchy
//!   0        = no filter

use crate::dsp::biquad::{BiquadType, Coefficients};

pub const DEFAULT_PRE_GAIN: f64 = -60.0;
pub const DEFAULT_POST_GAIN: f64 = 18.0;

#[derive(Debug, Clone)]
pub struct Distortion {
    sample_rate: f64,
    gains: Option<(f64, f64)>,
    pre_scale: f64,
    limit: f64,
    cutoff: f64,
    filter_cutoff: f64,
    coeffs: Coefficients,
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

/// Gain in dB to a linear factor, 6 dB per doubling.
#[inline]
fn db_scale(db: f64) -> f64 {
    2f64.powf(-db * 0.166_666_666)
}

impl Distortion {
    pub fn new(sample_rate: u32) -> Self {
        let mut dist = Self {
            sample_rate: sample_rate as f64,
            gains: None,
            pre_scale: 1.0,
            limit: 1.0,
            cutoff: 0.0,
            filter_cutoff: 0.0,
            coeffs: Coefficients::ZERO,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        };
        dist.set_gains(DEFAULT_PRE_GAIN, DEFAULT_POST_GAIN);
        dist
    }

    /// Recomputes the scales only when a gain changed.
    pub fn set_gains(&mut self, pre_gain: f64, post_gain: f64) {
        if self.gains == Some((pre_gain, post_gain)) {
            return;
        }
        self.gains = Some((pre_gain, post_gain));
        let post_scale = db_scale(post_gain);
        self.pre_scale = db_scale(pre_gain) * post_scale;
        self.limit = post_scale;
    }

    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    /// Non-positive values are ignored.
    pub fn set_cutoff(&mut self, hz: f64) {
        if hz > 0.0 {
            self.cutoff = hz;
        }
    }

    pub fn process(&mut self, buffer: &mut [f32]) {
        let (pre, limit) = (self.pre_scale, self.limit);

        if self.cutoff == 0.0 {
            for sample in buffer.iter_mut() {
                *sample = (*sample as f64 * pre).clamp(-limit, limit) as f32;
            }
            return;
        }

        if self.filter_cutoff != self.cutoff {
            self.filter_cutoff = self.cutoff;
            self.coeffs = Coefficients::design(BiquadType::LowPass, self.cutoff, 1.0, 0.0, self.sample_rate);
        }

        let Coefficients { b0, b1, b2, a1, a2 } = self.coeffs;
        let (mut x1, mut x2, mut y1, mut y2) = (self.x1, self.x2, self.y1, self.y2);
        for sample in buffer.iter_mut() {
            let x0 = *sample as f64 * pre;
            let y0 = (b0 * x0 + b1 * x1 + b2 * x2 - a1 * y1 - a2 * y2).clamp(-limit, limit);
            *sample = y0 as f32;
            x2 = x1;
            x1 = x0;
            y2 = y1;
            y1 = y0;
        }
        if x1.abs() < 1e-4 {
            x1 = 0.0;
        }
        if y1.abs() < 1e-4 {
            y1 = 0.0;
        }
        (self.x1, self.x2, self.y1, self.y2) = (x1, x2, y1, y2);
    }
}
