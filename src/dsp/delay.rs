use crate::MAX_DELAY_SAMPLES;

pub struct DelayLine {
    buffer: Vec<f32>,
    write_pos: usize,
}

impl DelayLine {
    pub fn new() -> Self {
        Self {
            buffer: vec![0.0; MAX_DELAY_SAMPLES],
            write_pos: 0,
        }
    }

    /// Read `delay_samples` behind the next write, with linear interpolation.
    ///
    /// Meant to be paired with [`DelayLine::write`] in feedback loops: read
    /// first, then write the new input plus feedback.
    #[inline]
    pub fn read_interpolated(&self, delay_samples: f32) -> f32 {
        let delay = delay_samples.clamp(1.0, (MAX_DELAY_SAMPLES - 2) as f32);
        let mut read = self.write_pos as f32 - delay;
        if read < 0.0 {
            read += MAX_DELAY_SAMPLES as f32;
        }
        let index = read as usize % MAX_DELAY_SAMPLES;
        let frac = read - read.floor();
        let a = self.buffer[index];
        let b = self.buffer[(index + 1) % MAX_DELAY_SAMPLES];
        a + (b - a) * frac
    }

    #[inline]
    pub fn write(&mut self, sample: f32) {
        self.buffer[self.write_pos] = sample;
        self.write_pos = (self.write_pos + 1) % MAX_DELAY_SAMPLES;
    }

    /// Feedback echo: returns the delayed signal and feeds it back scaled by
    /// `feedback`.
    #[inline]
    pub fn process_feedback(&mut self, sample: f32, delay_samples: f32, feedback: f32) -> f32 {
        let delayed = self.read_interpolated(delay_samples);
        self.write(sample + delayed * feedback);
        delayed
    }

    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}

impl Default for DelayLine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_delay_without_feedback() {
        let mut line = DelayLine::new();
        let out: Vec<f32> = (0..8)
            .map(|i| line.process_feedback(if i == 0 { 1.0 } else { 0.0 }, 3.0, 0.0))
            .collect();
        assert_eq!(out, vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_feedback_repeats_decay() {
        let mut line = DelayLine::new();
        let out: Vec<f32> = (0..25)
            .map(|i| line.process_feedback(if i == 0 { 1.0 } else { 0.0 }, 10.0, 0.5))
            .collect();
        assert_eq!(out[10], 1.0);
        assert_eq!(out[20], 0.5);
        assert_eq!(out[15], 0.0);
    }

    #[test]
    fn test_fractional_read_interpolates() {
        let mut line = DelayLine::new();
        line.write(0.0);
        line.write(1.0);
        // one sample back is 1.0, two back is 0.0
        assert!((line.read_interpolated(1.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_reset_clears_history() {
        let mut line = DelayLine::new();
        line.write(1.0);
        line.reset();
        assert_eq!(line.read_interpolated(1.0), 0.0);
    }
}
