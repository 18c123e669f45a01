use std::collections::HashMap;
use std::f64::consts::PI;
use std::sync::{Arc, LazyLock};

use parking_lot::RwLock;

use crate::dsp::window::{parse_window, WindowKind};

/*
Radix-2 FFT
===========

Iterative decimation-in-time Cooley-Tukey. The input is permuted into
bit-reversed order, then log2(n) butterfly stages combine pairs of
half-size transforms:

    stage k=1       k=2             k=4
    ●─╮╭─●      ●──╮  ╭──●      ●────╮    ╭────●
      ╳            ╲╱   ...           ╲  ╱
    ●─╯╰─●      ●──╯╲╱╰──●      ●──────╳──────●

Per length the bit-reversal permutation and the twiddle (sin/cos) tables
are built once and shared through a process-wide cache.

Forward
-------

  window (optional) → permute → butterflies → magnitude spectrum

The spectrum is n·|X[k]| divided by its own peak so the loudest bin is 1.
It is meant for display, not calibrated measurement. Only the first n/2
bins are kept.

Inverse
-------

  conjugate input → permute → butterflies → real part / n

Sizes are rounded up to the next power of two. The default is 512.
*/

pub const DEFAULT_FFT_SIZE: usize = 512;

#[derive(Debug)]
pub struct FftTables {
    bitrev: Vec<usize>,
    sin: Vec<f32>,
    cos: Vec<f32>,
}

impl FftTables {
    fn build(n: usize) -> Self {
        let mut bitrev = vec![0usize; n];
        let half = n >> 1;
        let mut j = 0usize;
        for (i, slot) in bitrev.iter_mut().enumerate() {
            *slot = j;
            if i + 1 >= n {
                break;
            }
            let mut k = half;
            while k > 0 && k <= j {
                j -= k;
                k >>= 1;
            }
            j += k;
        }

        let len = n.saturating_sub(1).max(1);
        let sin = (0..len)
            .map(|i| (2.0 * PI * (i as f64 / n as f64)).sin() as f32)
            .collect();
        let cos = (0..len)
            .map(|i| (2.0 * PI * (i as f64 / n as f64)).cos() as f32)
            .collect();
        Self { bitrev, sin, cos }
    }
}

static TABLES: LazyLock<RwLock<HashMap<usize, Arc<FftTables>>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

fn tables(n: usize) -> Arc<FftTables> {
    if let Some(t) = TABLES.read().get(&n) {
        return Arc::clone(t);
    }
    let mut cache = TABLES.write();
    Arc::clone(cache.entry(n).or_insert_with(|| Arc::new(FftTables::build(n))))
}

#[derive(Debug, Clone)]
pub struct Fft {
    n: usize,
    tables: Arc<FftTables>,
    buffer: Vec<f32>,
    real: Vec<f32>,
    imag: Vec<f32>,
    inv_real: Vec<f32>,
    inv_imag: Vec<f32>,
    spectrum: Vec<f32>,
    window: Option<Vec<f32>>,
    window_name: Option<String>,
    /// Skip the magnitude spectrum in `forward`.
    pub no_spectrum: bool,
}

impl Fft {
    pub fn new(size: usize) -> Self {
        let n = size.max(2).next_power_of_two();
        Self {
            n,
            tables: tables(n),
            buffer: vec![0.0; n],
            real: vec![0.0; n],
            imag: vec![0.0; n],
            inv_real: vec![0.0; n],
            inv_imag: vec![0.0; n],
            spectrum: vec![0.0; n >> 1],
            window: None,
            window_name: None,
            no_spectrum: false,
        }
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Set the analysis window by key. Unknown keys leave the current
    /// window unchanged and return `false`.
    pub fn set_window(&mut self, key: &str) -> bool {
        let Some((kind, a)) = parse_window(key) else {
            return false;
        };
        self.set_window_kind(kind, a);
        self.window_name = Some(key.to_string());
        true
    }

    pub fn set_window_kind(&mut self, kind: WindowKind, a: f64) {
        let window = self.window.get_or_insert_with(|| vec![0.0; self.n]);
        kind.fill(a.clamp(0.0, 1.0), window);
        self.window_name = Some(format!("{kind:?}").to_ascii_lowercase());
    }

    pub fn window_name(&self) -> Option<&str> {
        self.window_name.as_deref()
    }

    pub fn real(&self) -> &[f32] {
        &self.real
    }

    pub fn imag(&self) -> &[f32] {
        &self.imag
    }

    pub fn spectrum(&self) -> &[f32] {
        &self.spectrum
    }

    /// Forward transform of `input`, zero padded or truncated to the size.
    pub fn forward(&mut self, input: &[f32]) -> (&[f32], &[f32]) {
        let n = self.n;
        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let x = input.get(i).copied().unwrap_or(0.0);
            *slot = match &self.window {
                Some(w) => x * w[i],
                None => x,
            };
        }

        for i in 0..n {
            self.real[i] = self.buffer[self.tables.bitrev[i]];
            self.imag[i] = 0.0;
        }

        butterflies(&self.tables, &mut self.real, &mut self.imag);

        if !self.no_spectrum {
            let mut peak = 0.0f32;
            let half = self.spectrum.len();
            for i in 0..n {
                let (re, im) = (self.real[i] as f64, self.imag[i] as f64);
                let mag = (n as f64 * (re * re + im * im).sqrt()) as f32;
                if i < half {
                    self.spectrum[i] = mag;
                }
                peak = peak.max(mag);
            }
            if peak > 0.0 {
                let scale = 1.0 / peak;
                self.spectrum.iter_mut().for_each(|x| *x *= scale);
            }
        }

        (&self.real, &self.imag)
    }

    /// Inverse transform. Returns the real signal, `n` samples long.
    pub fn inverse(&mut self, real: &[f32], imag: &[f32]) -> &[f32] {
        let n = self.n;
        for i in 0..n {
            let j = self.tables.bitrev[i];
            self.inv_real[i] = real.get(j).copied().unwrap_or(0.0);
            self.inv_imag[i] = -imag.get(j).copied().unwrap_or(0.0);
        }

        butterflies(&self.tables, &mut self.inv_real, &mut self.inv_imag);

        let scale = 1.0 / n as f32;
        for (out, &re) in self.buffer.iter_mut().zip(&self.inv_real) {
            *out = re * scale;
        }
        &self.buffer
    }
}

impl Default for Fft {
    fn default() -> Self {
        Self::new(DEFAULT_FFT_SIZE)
    }
}

fn butterflies(tables: &FftTables, real: &mut [f32], imag: &mut [f32]) {
    let n = real.len();
    let mut k = 1;
    while k < n {
        let k2 = k + k;
        let d = n / k2;
        let mut h = 0;
        for j in 0..k {
            let c = tables.cos[h] as f64;
            let s = tables.sin[h] as f64;
            let mut i = j;
            while i < n {
                let ik = i + k;
                let dx = s * imag[ik] as f64 + c * real[ik] as f64;
                let dy = c * imag[ik] as f64 - s * real[ik] as f64;
                real[ik] = (real[i] as f64 - dx) as f32;
                real[i] = (real[i] as f64 + dx) as f32;
                imag[ik] = (imag[i] as f64 - dy) as f32;
                imag[i] = (imag[i] as f64 + dy) as f32;
                i += k2;
            }
            h += d;
        }
        k = k2;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_rounds_up_to_power_of_two() {
        assert_eq!(Fft::new(100).len(), 128);
        assert_eq!(Fft::new(512).len(), 512);
        assert_eq!(Fft::default().len(), DEFAULT_FFT_SIZE);
    }

    #[test]
    fn bit_reversal_of_eight() {
        let t = FftTables::build(8);
        assert_eq!(t.bitrev, vec![0, 4, 2, 6, 1, 5, 3, 7]);
    }

    #[test]
    fn round_trip_reproduces_input() {
        let mut fft = Fft::new(256);
        let input: Vec<f32> = (0..256)
            .map(|i| ((i as f32 * 0.37).sin() + (i as f32 * 1.3).cos() * 0.5) * 0.6)
            .collect();
        let (re, im) = fft.forward(&input);
        let (re, im) = (re.to_vec(), im.to_vec());
        let out = fft.inverse(&re, &im);
        for (a, b) in input.iter().zip(out) {
            assert!((a - b).abs() < 1e-5, "expected {a}, got {b}");
        }
    }

    #[test]
    fn spectrum_peaks_at_tone_bin() {
        let n = 512;
        let mut fft = Fft::new(n);
        let bin = 16;
        let input: Vec<f32> = (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * bin as f32 * i as f32 / n as f32).sin())
            .collect();
        fft.forward(&input);
        let spectrum = fft.spectrum();
        assert_eq!(spectrum.len(), n / 2);
        let loudest = spectrum
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i);
        assert_eq!(loudest, Some(bin));
        assert!((spectrum[bin] - 1.0).abs() < 1e-6, "peak is normalised to one");
    }

    #[test]
    fn bad_window_keeps_previous() {
        let mut fft = Fft::new(64);
        assert!(fft.set_window("hann"));
        assert!(!fft.set_window("nope"));
        assert_eq!(fft.window_name(), Some("hann"));
    }
}
