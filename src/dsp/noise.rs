use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/*
Noise Sources
=============

Three generators live here, plus a small seeded random number generator used
by the pattern iterators.

  Random       xorshift128 on 32-bit signed words. Same seed, same stream.
               Reproducible shuffles and random walks are built on it.

  PinkNoise    Voss algorithm. Five white "dice" each re-rolled on a
               different bit of a rolling 5-bit counter. Dice re-rolled
               rarely contribute low frequencies, dice re-rolled often
               contribute high ones. The sum falls off at roughly 3 dB per
               octave.

                 key   00000 → 00001 → 00010 → 00011 → 00100 ...
                 diff  bits that changed pick which dice to re-roll

  Lfsr         The 16-bit linear-feedback shift register of 8-bit console
               sound chips. Long mode taps bits 0 and 1 (a 32767-step
               sequence, hissy). Short mode taps bits 0 and 6 (93 steps,
               metallic). The register is clocked at `freq` Hz and each
               output is held until the next clock.
*/

/// xorshift generator returning values in `(-1, 1]`.
#[derive(Debug, Clone)]
pub struct Random {
    x: i32,
    y: i32,
    z: i32,
    w: i32,
}

impl Random {
    pub fn new(seed: i32) -> Self {
        Self {
            x: seed,
            y: 362_436_069,
            z: 521_288_629,
            w: 88_675_123,
        }
    }

    pub fn next_signed(&mut self) -> f64 {
        let t = self.x ^ self.x.wrapping_shl(11);
        self.x = self.y;
        self.y = self.z;
        self.z = self.w;
        self.w = (self.w ^ (self.w >> 19)) ^ (t ^ (t >> 8));
        self.w as f64 / 2_147_483_647.0
    }

    /// Same stream as `next_signed`, reinterpreted into `[0, 1)`.
    pub fn next_unit(&mut self) -> f64 {
        self.next_signed();
        self.w as u32 as f64 / 4_294_967_296.0
    }
}

/// Source of uniform `[0, 1)` values: seeded xorshift or OS entropy.
#[derive(Debug, Clone)]
pub enum Dice {
    Seeded(Random),
    Entropy(StdRng),
}

impl Dice {
    /// A zero seed means "not seeded".
    pub fn new(seed: i32) -> Self {
        if seed != 0 {
            Dice::Seeded(Random::new(seed))
        } else {
            Dice::Entropy(StdRng::from_entropy())
        }
    }

    pub fn unit(&mut self) -> f64 {
        match self {
            Dice::Seeded(r) => r.next_unit(),
            Dice::Entropy(rng) => rng.gen::<f64>(),
        }
    }
}

const PINK_DICE: usize = 5;
const PINK_MAX_KEY: u32 = 31;

#[derive(Debug, Clone)]
pub struct PinkNoise {
    whites: [u8; PINK_DICE],
    key: u32,
    rng: StdRng,
}

impl PinkNoise {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(mut rng: StdRng) -> Self {
        let mut whites = [0u8; PINK_DICE];
        for w in &mut whites {
            *w = roll(&mut rng);
        }
        Self { whites, key: 0, rng }
    }

    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        let last_key = self.key;
        self.key += 1;
        if self.key > PINK_MAX_KEY {
            self.key = 0;
        }
        let diff = last_key ^ self.key;
        let mut sum = 0u32;
        for (j, white) in self.whites.iter_mut().enumerate() {
            if diff & (1 << j) != 0 {
                *white = roll(&mut self.rng);
            }
            sum += *white as u32;
        }
        (sum as f32 * 0.016_666_66) - 1.0
    }

    pub fn render(&mut self, out: &mut [f32]) {
        for sample in out.iter_mut() {
            *sample = self.next_sample();
        }
    }
}

impl Default for PinkNoise {
    fn default() -> Self {
        Self::new()
    }
}

fn roll(rng: &mut StdRng) -> u8 {
    rng.gen_range(0..25)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LfsrMode {
    #[default]
    Long,
    Short,
}

#[derive(Debug, Clone)]
pub struct Lfsr {
    reg: u32,
    phase: f64,
    last: f32,
    pub mode: LfsrMode,
}

impl Lfsr {
    pub fn new() -> Self {
        Self {
            reg: 0x8000,
            phase: 0.0,
            last: 0.0,
            mode: LfsrMode::Long,
        }
    }

    /// Render one block clocked at `freq / sample_rate` steps per sample.
    pub fn render(&mut self, out: &mut [f32], phase_step: f64) {
        let tap = match self.mode {
            LfsrMode::Long => 1,
            LfsrMode::Short => 6,
        };
        for sample in out.iter_mut() {
            if self.phase >= 1.0 {
                self.reg >>= 1;
                self.reg |= ((self.reg ^ (self.reg >> tap)) & 1) << 15;
                self.last = (self.reg & 1) as f32 - 0.5;
                self.phase -= 1.0;
            }
            *sample = self.last;
            self.phase += phase_step;
        }
    }
}

impl Default for Lfsr {
    fn default() -> Self {
        Self::new()
    }
}
