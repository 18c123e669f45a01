use std::collections::HashMap;
use std::f64::consts::PI;
use std::sync::{Arc, LazyLock};

use parking_lot::RwLock;
use regex::Regex;
use tracing::debug;

/*
Wavetables
==========

Every oscillator reads from a 1024-entry table holding one cycle. Tables are
looked up by a text key and cached process-wide the first time they are
built. Nothing is ever evicted.

Built-in names
--------------

  sin  cos  pulse (square)  tri  saw  fami  konami

`fami` and `konami` are 32-step chip-tune waveforms, each step held for 32
table entries.

Waveshaping keys
----------------

    [sign] name [ ( [@shape] [:width] ) ]

    "+sin"          unipolar: x * 0.5 + 0.5
    "-saw"          inverted
    "sin(@1)"       half-wave: second half zeroed
    "sin(@2)"       full-wave: second half rectified
    "sin(@3)"       quarter pulses: 2nd and 4th quarters zeroed, 3rd rectified
    "sin(@4)"       octave up in the first half, silence in the second
    "sin(@5)"       as @4, rectified
    "pulse(25)"     duty-cycle warp: first half of the cycle squeezed into
    "sin(@1:25)"    25% of the table, second half stretched over the rest

            first half         second half
    50   │▔▔▔▔▔▔▔▔▔▔▔▔▔▔▔▔│________________│
    25   │▔▔▔▔▔▔▔▔│________________________│

Byte and colour keys
--------------------

  "wavb(00407f40...)"   2 to 1024 hex bytes (a power of two). Bytes are
                        signed 8-bit: 0x80..0xff are negative (/128), the
                        rest positive (/127). Each byte fills 1024/n entries.

  "wavc(12345678)"      eight harmonic amplitudes. The fundamental is always
                        1, each hex digit from the right gives the next
                        harmonic in sixteenths. Normalised to a peak of 1.
*/

pub const TABLE_SIZE: usize = 1024;
pub const TABLE_MASK: usize = TABLE_SIZE - 1;

pub type Wavetable = Arc<[f32]>;

const FAMI: [f32; 32] = [
    0.000, 0.125, 0.250, 0.375, 0.500, 0.625, 0.750, 0.875, //
    0.875, 0.750, 0.625, 0.500, 0.375, 0.250, 0.125, 0.000, //
    -0.125, -0.250, -0.375, -0.500, -0.625, -0.750, -0.875, -1.000, //
    -1.000, -0.875, -0.750, -0.625, -0.500, -0.375, -0.250, -0.125,
];

const KONAMI: [f32; 32] = [
    -0.625, -0.875, -0.125, 0.750, 0.500, 0.125, 0.500, 0.750, //
    0.250, -0.125, 0.500, 0.875, 0.625, 0.000, 0.250, 0.375, //
    -0.125, -0.750, 0.000, 0.625, 0.125, -0.500, -0.375, -0.125, //
    -0.750, -1.000, -0.625, 0.000, -0.375, -0.875, -0.625, -0.250,
];

static CACHE: LazyLock<RwLock<HashMap<String, Wavetable>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

static SHAPE_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([-+]?)(\w+)(?:\((@[0-7])?:?(\d+)?\))?$").expect("valid regex")
});
static BYTES_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^wavb\(((?:[0-9a-fA-F]{2})+)\)$").expect("valid regex"));
static COLOR_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^wavc\(([0-9a-fA-F]{8})\)$").expect("valid regex"));

/// Source material for `register_wavetable`.
pub enum WaveSource<'a> {
    /// Evaluated at `i / 1024` for every entry.
    Function(&'a dyn Fn(f64) -> f64),
    /// Nearest-sample resampled to 1024 entries.
    Samples(&'a [f32]),
}

pub fn table_from_fn(f: impl Fn(f64) -> f64) -> Vec<f32> {
    (0..TABLE_SIZE)
        .map(|i| f(i as f64 / TABLE_SIZE as f64) as f32)
        .collect()
}

pub fn table_from_samples(samples: &[f32]) -> Vec<f32> {
    if samples.len() == TABLE_SIZE {
        return samples.to_vec();
    }
    if samples.is_empty() {
        return vec![0.0; TABLE_SIZE];
    }
    let dx = samples.len() as f64 / TABLE_SIZE as f64;
    (0..TABLE_SIZE)
        .map(|i| samples[((i as f64 * dx) as usize).min(samples.len() - 1)])
        .collect()
}

/// Register (or replace) a named table.
pub fn register_wavetable(name: &str, source: WaveSource<'_>) {
    let table = match source {
        WaveSource::Function(f) => table_from_fn(f),
        WaveSource::Samples(s) => table_from_samples(s),
    };
    debug!(name, "registered wavetable");
    CACHE.write().insert(name.to_string(), table.into());
}

/// Look up or derive the table for `key`. Unknown keys are `None`.
pub fn wavetable(key: &str) -> Option<Wavetable> {
    if let Some(table) = CACHE.read().get(key) {
        return Some(Arc::clone(table));
    }

    let table: Wavetable = derive(key)?.into();
    CACHE
        .write()
        .entry(key.to_string())
        .or_insert_with(|| Arc::clone(&table));
    Some(table)
}

fn derive(key: &str) -> Option<Vec<f32>> {
    if let Some(table) = builtin(key) {
        return Some(table);
    }

    if let Some(m) = SHAPE_KEY.captures(key) {
        let sign = m.get(1).map_or("", |s| s.as_str());
        let name = m.get(2).map_or("", |s| s.as_str());
        let shape = m.get(3).map(|s| s.as_str());
        let width = m.get(4).and_then(|w| w.as_str().parse::<f64>().ok());
        if let Some(base) = base_table(name) {
            return Some(waveshape(base, sign, shape, width));
        }
    }

    if let Some(m) = BYTES_KEY.captures(key) {
        return Some(wavb(m.get(1).map_or("", |s| s.as_str())));
    }

    if let Some(m) = COLOR_KEY.captures(key) {
        return Some(wavc(m.get(1).map_or("", |s| s.as_str())));
    }

    None
}

fn base_table(name: &str) -> Option<Vec<f32>> {
    if let Some(table) = CACHE.read().get(name) {
        return Some(table.to_vec());
    }
    builtin(name)
}

fn builtin(name: &str) -> Option<Vec<f32>> {
    let n = TABLE_SIZE as f64;
    let table = match name {
        "sin" => table_from_fn(|x| (2.0 * PI * x).sin()),
        "cos" => table_from_fn(|x| (2.0 * PI * x).cos()),
        "pulse" | "square" => (0..TABLE_SIZE)
            .map(|i| if i < TABLE_SIZE / 2 { 1.0 } else { -1.0 })
            .collect(),
        "tri" => (0..TABLE_SIZE)
            .map(|i| {
                let x = i as f64 / n - 0.25;
                (1.0 - 4.0 * (js_round(x) - x).abs()) as f32
            })
            .collect(),
        "saw" => (0..TABLE_SIZE)
            .map(|i| {
                let x = i as f64 / n;
                (2.0 * (x - js_round(x))) as f32
            })
            .collect(),
        "fami" => stepped(&FAMI),
        "konami" => stepped(&KONAMI),
        _ => return None,
    };
    Some(table)
}

/// Round half up, as opposed to `f64::round` which rounds half away from zero.
fn js_round(x: f64) -> f64 {
    (x + 0.5).floor()
}

fn stepped(steps: &[f32]) -> Vec<f32> {
    (0..TABLE_SIZE)
        .map(|i| steps[i * steps.len() / TABLE_SIZE])
        .collect()
}

fn waveshape(mut wave: Vec<f32>, sign: &str, shape: Option<&str>, width: Option<f64>) -> Vec<f32> {
    match shape {
        Some("@1") => wave[512..].fill(0.0),
        Some("@2") => wave[512..].iter_mut().for_each(|x| *x = x.abs()),
        Some("@3") => {
            wave[256..512].fill(0.0);
            wave[512..768].iter_mut().for_each(|x| *x = x.abs());
            wave[768..].fill(0.0);
        }
        Some("@4") => {
            let mut doubled = vec![0.0; TABLE_SIZE];
            for (i, x) in doubled[..512].iter_mut().enumerate() {
                *x = wave[i << 1];
            }
            wave = doubled;
        }
        Some("@5") => {
            let mut doubled = vec![0.0; TABLE_SIZE];
            for (i, x) in doubled[..512].iter_mut().enumerate() {
                *x = wave[i << 1].abs();
            }
            wave = doubled;
        }
        _ => {}
    }

    if let Some(width) = width.filter(|&w| w != 50.0) {
        let width = (width * 0.01).clamp(0.0, 1.0);
        let imax = (TABLE_SIZE as f64 * width) as usize;
        let jmax = TABLE_SIZE - imax;
        let mut warped = vec![0.0; TABLE_SIZE];
        for (i, x) in warped[..imax].iter_mut().enumerate() {
            *x = wave[(i as f64 / imax as f64 * 512.0) as usize];
        }
        for (j, x) in warped[imax..].iter_mut().enumerate() {
            let index = (j as f64 / jmax as f64 * 512.0 + 512.0) as usize;
            *x = wave[index.min(TABLE_MASK)];
        }
        wave = warped;
    }

    match sign {
        "+" => wave.iter_mut().for_each(|x| *x = *x * 0.5 + 0.5),
        "-" => wave.iter_mut().for_each(|x| *x = -*x),
        _ => {}
    }
    wave
}

fn wavb(hex: &str) -> Vec<f32> {
    let mut wave = vec![0.0; TABLE_SIZE];
    let n = hex.len() / 2;
    if !(2..=TABLE_SIZE).contains(&n) || !n.is_power_of_two() {
        return wave;
    }
    let run = TABLE_SIZE / n;
    for (i, chunk) in wave.chunks_mut(run).enumerate() {
        let byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).unwrap_or(0);
        let x = if byte & 0x80 != 0 {
            (byte as f32 - 256.0) / 128.0
        } else {
            byte as f32 / 127.0
        };
        chunk.fill(x);
    }
    wave
}

fn wavc(hex: &str) -> Vec<f32> {
    let mut wave = vec![0.0f32; TABLE_SIZE];
    let Ok(mut color) = u32::from_str_radix(hex, 16) else {
        return wave;
    };

    let mut bars = [0.0f32; 8];
    bars[0] = 1.0;
    for bar in bars[1..].iter_mut() {
        *bar = (color & 0x0f) as f32 * 0.0625;
        color >>= 4;
    }

    for (i, &bar) in bars.iter().enumerate() {
        let dx = (i + 1) as f64 / TABLE_SIZE as f64;
        let mut x = 0.0f64;
        for sample in wave.iter_mut() {
            *sample += ((2.0 * PI * x).sin() as f32) * bar;
            x += dx;
        }
    }

    let peak = wave.iter().fold(0.0f32, |acc, x| acc.max(x.abs()));
    if peak > 0.0 {
        wave.iter_mut().for_each(|x| *x /= peak);
    }
    wave
}
