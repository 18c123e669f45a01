use std::f64::consts::{E, PI};
use std::sync::LazyLock;

use regex::Regex;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/*
Window Functions
================

Applied to a block before the forward FFT to reduce spectral leakage.
Selected by name with an optional shape parameter in parentheses:

    "hann"    "hamming"    "tukey(0.5)"    "gaussian(0.4)"    "blackman(0.16)"

The parameter defaults to 0.25 and is clamped to [0, 1]. Only Tukey,
Gaussian and Blackman read it. Names are case-insensitive.

With N the window length and n the sample index (0 ≤ n < N):

  rectangular   1
  hann          0.5 (1 - cos(2πn / (N-1)))
  hamming       0.54 - 0.46 cos(2πn / (N-1))
  tukey         cosine tapers over a·(N-1)/2 samples at each edge
  cosine        sin(πn / (N-1))
  lanczos       sinc(2n / (N-1) - 1)
  triangular    2/(N+1) · ((N+1)/2 - |n - (N-1)/2|)
  bartlett      2/(N-1) · ((N-1)/2 - |n - (N-1)/2|)
  gaussian      e^(-½ ((n - (N-1)/2) / (a(N-1)/2))²)
  bartletthann  0.62 - 0.48 |n/(N-1) - ½| - 0.38 cos(2πn / (N-1))
  blackman      (1-a)/2 - ½ cos(2πn / (N-1)) + a/2 cos(4πn / (N-1))
*/

pub const DEFAULT_WINDOW_PARAM: f64 = 0.25;

static WINDOW_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Za-z]+)(?:\(([01]\.?\d*)\))?").expect("valid regex"));

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowKind {
    Rectangular,
    Hann,
    Hamming,
    Tukey,
    Cosine,
    Lanczos,
    Triangular,
    Bartlett,
    Gaussian,
    BartlettHann,
    Blackman,
}

impl WindowKind {
    pub fn parse(name: &str) -> Option<Self> {
        let kind = match name.to_ascii_lowercase().as_str() {
            "rectangular" => WindowKind::Rectangular,
            "hann" => WindowKind::Hann,
            "hamming" => WindowKind::Hamming,
            "tukey" | "tukery" => WindowKind::Tukey,
            "cosine" => WindowKind::Cosine,
            "lanczos" => WindowKind::Lanczos,
            "triangular" => WindowKind::Triangular,
            "bartlett" => WindowKind::Bartlett,
            "gaussian" => WindowKind::Gaussian,
            "bartletthann" => WindowKind::BartlettHann,
            "blackman" => WindowKind::Blackman,
            _ => return None,
        };
        Some(kind)
    }

    /// Window value at index `n` of `len`, with shape parameter `a`.
    pub fn value(self, n: usize, len: usize, a: f64) -> f64 {
        if len < 2 {
            return 1.0;
        }
        let n = n as f64;
        let big = len as f64;
        let m = big - 1.0;
        match self {
            WindowKind::Rectangular => 1.0,
            WindowKind::Hann => 0.5 * (1.0 - (2.0 * PI * n / m).cos()),
            WindowKind::Hamming => 0.54 - 0.46 * (2.0 * PI * n / m).cos(),
            WindowKind::Tukey => {
                if n < a * m / 2.0 {
                    0.5 * (1.0 + (PI * (2.0 * n / (a * m) - 1.0)).cos())
                } else if m * (1.0 - a / 2.0) < n {
                    0.5 * (1.0 + (PI * (2.0 * n / (a * m) - 2.0 / a + 1.0)).cos())
                } else {
                    1.0
                }
            }
            WindowKind::Cosine => (PI * n / m).sin(),
            WindowKind::Lanczos => sinc(2.0 * n / m - 1.0),
            WindowKind::Triangular => (2.0 / (big + 1.0)) * ((big + 1.0) / 2.0 - (n - m / 2.0).abs()),
            WindowKind::Bartlett => (2.0 / m) * (m / 2.0 - (n - m / 2.0).abs()),
            WindowKind::Gaussian => {
                let width = a * m / 2.0;
                if width == 0.0 {
                    return if n == m / 2.0 { 1.0 } else { 0.0 };
                }
                E.powf(-0.5 * ((n - m / 2.0) / width).powi(2))
            }
            WindowKind::BartlettHann => {
                0.62 - 0.48 * (n / m - 0.5).abs() - 0.38 * (2.0 * PI * n / m).cos()
            }
            WindowKind::Blackman => {
                let a0 = (1.0 - a) / 2.0;
                let a2 = a / 2.0;
                a0 - 0.5 * (2.0 * PI * n / m).cos() + a2 * (4.0 * PI * n / m).cos()
            }
        }
    }

    pub fn fill(self, a: f64, out: &mut [f32]) {
        let len = out.len();
        for (n, w) in out.iter_mut().enumerate() {
            *w = self.value(n, len, a) as f32;
        }
    }
}

fn sinc(x: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else {
        (PI * x).sin() / (PI * x)
    }
}

/// Parse a window key such as `"tukey(0.5)"`. The parameter is clamped to
/// [0, 1] and defaults to 0.25.
pub fn parse_window(key: &str) -> Option<(WindowKind, f64)> {
    let m = WINDOW_KEY.captures(key)?;
    let kind = WindowKind::parse(m.get(1)?.as_str())?;
    let a = m
        .get(2)
        .and_then(|p| p.as_str().parse::<f64>().ok())
        .unwrap_or(DEFAULT_WINDOW_PARAM)
        .clamp(0.0, 1.0);
    Some((kind, a))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hann_is_zero_at_edges_and_one_in_the_middle() {
        let mut w = [0.0f32; 9];
        WindowKind::Hann.fill(0.25, &mut w);
        assert!(w[0].abs() < 1e-7 && w[8].abs() < 1e-7);
        assert!((w[4] - 1.0).abs() < 1e-7);
    }

    #[test]
    fn parses_names_and_parameters() {
        assert_eq!(parse_window("hann"), Some((WindowKind::Hann, 0.25)));
        assert_eq!(parse_window("Tukey(0.5)"), Some((WindowKind::Tukey, 0.5)));
        assert_eq!(parse_window("bartlettHann"), Some((WindowKind::BartlettHann, 0.25)));
        assert_eq!(parse_window("blackman(1.9)"), Some((WindowKind::Blackman, 1.0)));
        assert_eq!(parse_window("kaiser"), None);
        assert_eq!(parse_window("123"), None);
    }

    #[test]
    fn every_window_is_finite() {
        let kinds = [
            WindowKind::Rectangular,
            WindowKind::Hann,
            WindowKind::Hamming,
            WindowKind::Tukey,
            WindowKind::Cosine,
            WindowKind::Lanczos,
            WindowKind::Triangular,
            WindowKind::Bartlett,
            WindowKind::Gaussian,
            WindowKind::BartlettHann,
            WindowKind::Blackman,
        ];
        for kind in kinds {
            for a in [0.0, 0.25, 1.0] {
                let mut w = [0.0f32; 64];
                kind.fill(a, &mut w);
                assert!(w.iter().all(|x| x.is_finite()), "{kind:?}({a}) produced non-finite values");
            }
        }
    }
}
