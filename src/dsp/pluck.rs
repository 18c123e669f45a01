use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Karplus-Strong plucked string.
///
/// `pluck` fills one period (`sample_rate / freq` samples) with white noise.
/// Every output sample averages two neighbours of the ring and writes the
/// result one period ahead, so the noise burst decays into a tone.
#[derive(Debug, Clone)]
pub struct Pluck {
    buffer: Vec<f32>,
    read_pos: usize,
    write_pos: usize,
    rng: StdRng,
}

impl Pluck {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            buffer: Vec::new(),
            read_pos: 0,
            write_pos: 0,
            rng,
        }
    }

    pub fn is_plucked(&self) -> bool {
        !self.buffer.is_empty()
    }

    pub fn pluck(&mut self, freq: f64, sample_rate: u32) {
        let freq = if freq > 0.0 { freq } else { 440.0 };
        let size = ((sample_rate as f64 / freq + 0.5) as usize).max(1);
        self.buffer = vec![0.0; size << 1];
        for sample in &mut self.buffer[..size] {
            *sample = self.rng.gen::<f32>() * 2.0 - 1.0;
        }
        self.read_pos = 0;
        self.write_pos = size;
    }

    /// Silence until the first `pluck`.
    pub fn render(&mut self, out: &mut [f32]) {
        if self.buffer.is_empty() {
            out.fill(0.0);
            return;
        }
        let len = self.buffer.len();
        for sample in out.iter_mut() {
            let x = self.buffer[self.read_pos];
            self.read_pos += 1;
            if self.read_pos >= len {
                self.read_pos = 0;
            }
            let x = (x + self.buffer[self.read_pos]) * 0.5;
            self.buffer[self.write_pos] = x;
            self.write_pos += 1;
            if self.write_pos >= len {
                self.write_pos = 0;
            }
            *sample = x;
        }
    }
}

impl Default for Pluck {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_until_plucked() {
        let mut pluck = Pluck::seeded(1);
        let mut out = [1.0f32; 32];
        pluck.render(&mut out);
        assert!(out.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn pluck_decays() {
        let mut pluck = Pluck::seeded(2);
        pluck.pluck(200.0, 8000);
        let mut early = [0.0f32; 400];
        let mut late = [0.0f32; 400];
        pluck.render(&mut early);
        for _ in 0..20 {
            pluck.render(&mut late);
        }
        let energy = |b: &[f32]| b.iter().map(|x| x * x).sum::<f32>();
        assert!(energy(&late) < energy(&early) * 0.5, "string should lose energy");
        assert!(late.iter().all(|x| x.abs() <= 1.0));
    }
}
