/// Feedback delay line.
///
/// The ring buffer holds 1.5 seconds rounded up to a power of two so the
/// indices wrap with a mask. Reads trail writes by `time` milliseconds. The
/// delayed signal is fed back inverted:
///
/// ```text
///   in ──┬──────────────── dry ──┐
///        │                        (+)── out
///        └─(+)─▶ [ ring ] ─┬─ wet ┘
///           ▲              │
///           └── -feedback ─┘
/// ```
#[derive(Debug, Clone)]
pub struct DelayLine {
    buffer: Vec<f32>,
    mask: usize,
    sample_rate: f64,
    read_pos: usize,
    write_pos: usize,
    time_ms: f64,
    pub feedback: f32,
    pub wet: f32,
}

pub const DEFAULT_DELAY_MS: f64 = 125.0;
pub const DEFAULT_FEEDBACK: f32 = 0.25;
pub const DEFAULT_WET: f32 = 0.45;

impl DelayLine {
    pub fn new(sample_rate: u32) -> Self {
        let bits = (sample_rate as f64 * 1.5).log2().ceil() as u32;
        let len = 1usize << bits;
        let mut delay = Self {
            buffer: vec![0.0; len],
            mask: len - 1,
            sample_rate: sample_rate as f64,
            read_pos: 0,
            write_pos: 0,
            time_ms: DEFAULT_DELAY_MS,
            feedback: DEFAULT_FEEDBACK,
            wet: DEFAULT_WET,
        };
        delay.set_time(DEFAULT_DELAY_MS);
        delay
    }

    pub fn time(&self) -> f64 {
        self.time_ms
    }

    /// Move the write head `ms` ahead of the read head. Times outside
    /// `(0, buffer length)` are ignored.
    pub fn set_time(&mut self, ms: f64) {
        let offset = (ms * 0.001 * self.sample_rate) as usize;
        if !(ms > 0.0) || offset > self.mask {
            return;
        }
        self.time_ms = ms;
        self.write_pos = (self.read_pos + offset) & self.mask;
    }

    #[inline]
    pub fn next_sample(&mut self, sample: f32) -> f32 {
        let delayed = self.buffer[self.read_pos];
        self.buffer[self.write_pos] = sample - delayed * self.feedback;
        self.read_pos = (self.read_pos + 1) & self.mask;
        self.write_pos = (self.write_pos + 1) & self.mask;
        sample * (1.0 - self.wet) + delayed * self.wet
    }

    pub fn render(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.next_sample(*sample);
        }
    }

    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.read_pos = 0;
        let time = self.time_ms;
        self.set_time(time);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn impulse_comes_back_after_delay_time() {
        let mut delay = DelayLine::new(8000);
        delay.set_time(10.0);
        delay.wet = 1.0;
        delay.feedback = 0.5;

        let mut buffer = vec![0.0f32; 200];
        buffer[0] = 1.0;
        delay.render(&mut buffer);

        // 10 ms at 8 kHz is 80 samples; the echo is inverted by the feedback
        assert_eq!(buffer[0], 0.0);
        assert_eq!(buffer[80], 1.0);
        assert_eq!(buffer[160], -0.5);
    }

    #[test]
    fn dry_signal_passes_with_zero_wet() {
        let mut delay = DelayLine::new(8000);
        delay.wet = 0.0;
        let mut buffer = [0.25f32; 64];
        delay.render(&mut buffer);
        assert!(buffer.iter().all(|&x| x == 0.25));
    }

    #[test]
    fn out_of_range_time_is_ignored() {
        let mut delay = DelayLine::new(8000);
        delay.set_time(-5.0);
        delay.set_time(60_000.0);
        assert_eq!(delay.time(), DEFAULT_DELAY_MS);
    }
}
