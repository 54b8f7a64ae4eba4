//! Analyser sitting between the master bus and the output.
//!
//! Keeps the most recent `fft_size` samples of the downmixed signal and turns
//! them into byte-scaled spectrum and waveform snapshots on demand.

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::graph::node::StereoFrame;

pub const DEFAULT_FFT_SIZE: usize = 2048;
pub const DEFAULT_SMOOTHING: f32 = 0.8;
pub const MIN_DECIBELS: f32 = -100.0;
pub const MAX_DECIBELS: f32 = -30.0;

pub struct Analyser {
    fft_size: usize,
    smoothing: f32,
    min_db: f32,
    max_db: f32,
    /// Ring of the latest downmixed samples
    ring: Vec<f32>,
    write_pos: usize,
    /// Blackman window coefficients
    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
    scratch: Vec<Complex<f32>>,
    fft_scratch: Vec<Complex<f32>>,
    /// Smoothed linear magnitude per bin
    smoothed: Vec<f32>,
}

impl Analyser {
    pub const MIN_FFT_SIZE: usize = 32;
    pub const MAX_FFT_SIZE: usize = 32_768;

    /// `fft_size` is rounded up to a power of two within the supported range.
    pub fn new(fft_size: usize, smoothing: f32) -> Self {
        let fft_size = Self::supported_size(fft_size);
        let fft = FftPlanner::new().plan_fft_forward(fft_size);
        let fft_scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        Self {
            fft_size,
            smoothing: smoothing.clamp(0.0, 1.0),
            min_db: MIN_DECIBELS,
            max_db: MAX_DECIBELS,
            ring: vec![0.0; fft_size],
            write_pos: 0,
            window: blackman(fft_size),
            fft,
            scratch: vec![Complex::new(0.0, 0.0); fft_size],
            fft_scratch,
            smoothed: vec![0.0; fft_size / 2],
        }
    }

    fn supported_size(fft_size: usize) -> usize {
        fft_size
            .clamp(Self::MIN_FFT_SIZE, Self::MAX_FFT_SIZE)
            .next_power_of_two()
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }

    pub fn smoothing(&self) -> f32 {
        self.smoothing
    }

    pub fn set_smoothing(&mut self, smoothing: f32) {
        self.smoothing = smoothing.clamp(0.0, 1.0);
    }

    /// Change the transform size. Rounded like [`Analyser::new`]; the
    /// history and smoothed spectrum start over at the new size. Returns the
    /// size in effect.
    pub fn set_fft_size(&mut self, fft_size: usize) -> usize {
        let fft_size = Self::supported_size(fft_size);
        if fft_size == self.fft_size {
            return fft_size;
        }
        self.fft = FftPlanner::new().plan_fft_forward(fft_size);
        self.fft_scratch = vec![Complex::new(0.0, 0.0); self.fft.get_inplace_scratch_len()];
        self.scratch = vec![Complex::new(0.0, 0.0); fft_size];
        self.window = blackman(fft_size);
        self.ring = vec![0.0; fft_size];
        self.smoothed = vec![0.0; fft_size / 2];
        self.write_pos = 0;
        self.fft_size = fft_size;
        fft_size
    }

    /// Set the decibel range mapped onto 0..=255. Ignored unless `min < max`.
    pub fn set_decibel_range(&mut self, min_db: f32, max_db: f32) {
        if min_db < max_db {
            self.min_db = min_db;
            self.max_db = max_db;
        }
    }

    /// Append a block of audio. Called from the render path.
    pub fn write(&mut self, frames: &[StereoFrame]) {
        for frame in frames {
            self.ring[self.write_pos] = frame.to_mono();
            self.write_pos = (self.write_pos + 1) % self.fft_size;
        }
    }

    /// Latest `fft_size` samples, oldest first.
    pub fn float_time_domain_data(&self, out: &mut [f32]) {
        let (newer, older) = self.ring.split_at(self.write_pos);
        for (dst, src) in out.iter_mut().zip(older.iter().chain(newer)) {
            *dst = *src;
        }
    }

    /// Waveform as bytes centred on 128.
    pub fn byte_time_domain_data(&self, out: &mut [u8]) {
        let (newer, older) = self.ring.split_at(self.write_pos);
        for (dst, src) in out.iter_mut().zip(older.iter().chain(newer)) {
            *dst = (128.0 * (1.0 + src)).clamp(0.0, 255.0) as u8;
        }
    }

    /// Smoothed magnitude spectrum in decibels, one value per bin.
    pub fn float_frequency_data(&mut self, out: &mut [f32]) {
        self.analyse();
        for (dst, mag) in out.iter_mut().zip(&self.smoothed) {
            *dst = linear_to_db(*mag);
        }
    }

    /// Spectrum scaled so `min_db` maps to 0 and `max_db` to 255.
    pub fn byte_frequency_data(&mut self, out: &mut [u8]) {
        self.analyse();
        let range = self.max_db - self.min_db;
        for (dst, mag) in out.iter_mut().zip(&self.smoothed) {
            let db = linear_to_db(*mag);
            let scaled = 255.0 * (db - self.min_db) / range;
            *dst = scaled.clamp(0.0, 255.0) as u8;
        }
    }

    fn analyse(&mut self) {
        let (newer, older) = self.ring.split_at(self.write_pos);
        for ((bin, sample), w) in self
            .scratch
            .iter_mut()
            .zip(older.iter().chain(newer))
            .zip(&self.window)
        {
            *bin = Complex::new(*sample * *w, 0.0);
        }

        self.fft
            .process_with_scratch(&mut self.scratch, &mut self.fft_scratch);

        let norm = 1.0 / self.fft_size as f32;
        let tau = self.smoothing;
        for (smoothed, bin) in self.smoothed.iter_mut().zip(&self.scratch) {
            let magnitude = bin.norm() * norm;
            let next = tau * *smoothed + (1.0 - tau) * magnitude;
            *smoothed = if next.is_finite() { next } else { 0.0 };
        }
    }

    pub fn clear(&mut self) {
        self.ring.fill(0.0);
        self.smoothed.fill(0.0);
        self.write_pos = 0;
    }
}

impl Default for Analyser {
    fn default() -> Self {
        Self::new(DEFAULT_FFT_SIZE, DEFAULT_SMOOTHING)
    }
}

fn blackman(len: usize) -> Vec<f32> {
    let (a0, a1, a2) = (0.42, 0.5, 0.08);
    (0..len)
        .map(|i| {
            let x = std::f32::consts::TAU * i as f32 / len as f32;
            a0 - a1 * x.cos() + a2 * (2.0 * x).cos()
        })
        .collect()
}

#[inline]
fn linear_to_db(magnitude: f32) -> f32 {
    if magnitude <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * magnitude.log10()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_block(freq: f32, sample_rate: f32, len: usize) -> Vec<StereoFrame> {
        (0..len)
            .map(|i| {
                let s = (std::f32::consts::TAU * freq * i as f32 / sample_rate).sin();
                StereoFrame::mono(s)
            })
            .collect()
    }

    #[test]
    fn test_fft_size_rounded_to_power_of_two() {
        assert_eq!(Analyser::new(1000, 0.8).fft_size(), 1024);
        assert_eq!(Analyser::new(1, 0.8).fft_size(), Analyser::MIN_FFT_SIZE);
        assert_eq!(Analyser::new(2048, 0.8).frequency_bin_count(), 1024);
    }

    #[test]
    fn test_silence_maps_to_zero_bytes() {
        let mut analyser = Analyser::new(256, 0.0);
        let mut bytes = vec![7u8; analyser.frequency_bin_count()];
        analyser.byte_frequency_data(&mut bytes);
        assert!(bytes.iter().all(|b| *b == 0));

        let mut wave = vec![0u8; 256];
        analyser.byte_time_domain_data(&mut wave);
        assert!(wave.iter().all(|b| *b == 128));
    }

    #[test]
    fn test_sine_peaks_at_its_bin() {
        let sample_rate = 48_000.0;
        let mut analyser = Analyser::new(1024, 0.0);
        // Bin 64 is exactly 3000 Hz at this size
        analyser.write(&sine_block(3000.0, sample_rate, 1024));

        // Bytes saturate across the main lobe, so locate the peak in dB
        let mut db = vec![0.0f32; analyser.frequency_bin_count()];
        analyser.float_frequency_data(&mut db);
        let peak = db
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, 64);

        let mut bytes = vec![0u8; analyser.frequency_bin_count()];
        analyser.byte_frequency_data(&mut bytes);
        assert_eq!(bytes[64], 255);
        assert_eq!(bytes[400], 0);
    }

    #[test]
    fn test_set_fft_size_rebuilds_buffers() {
        let mut analyser = Analyser::new(1024, 0.0);
        analyser.write(&sine_block(3000.0, 48_000.0, 1024));

        assert_eq!(analyser.set_fft_size(300), 512);
        assert_eq!(analyser.fft_size(), 512);
        assert_eq!(analyser.frequency_bin_count(), 256);

        // History starts over
        let mut wave = vec![0.0f32; 512];
        analyser.float_time_domain_data(&mut wave);
        assert!(wave.iter().all(|s| *s == 0.0));

        // 3000 Hz is bin 32 at the new size
        analyser.write(&sine_block(3000.0, 48_000.0, 512));
        let mut db = vec![0.0f32; 256];
        analyser.float_frequency_data(&mut db);
        let peak = db
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, 32);
    }

    #[test]
    fn test_set_fft_size_clamps_to_range() {
        let mut analyser = Analyser::default();
        assert_eq!(analyser.set_fft_size(1 << 20), Analyser::MAX_FFT_SIZE);
        assert_eq!(analyser.set_fft_size(0), Analyser::MIN_FFT_SIZE);
    }

    #[test]
    fn test_set_smoothing_clamps() {
        let mut analyser = Analyser::default();
        analyser.set_smoothing(1.5);
        assert_eq!(analyser.smoothing(), 1.0);
        analyser.set_smoothing(-0.2);
        assert_eq!(analyser.smoothing(), 0.0);
    }

    #[test]
    fn test_time_domain_is_oldest_first() {
        let mut analyser = Analyser::new(32, 0.0);
        let block: Vec<_> = (0..40).map(|i| StereoFrame::mono(i as f32 / 100.0)).collect();
        analyser.write(&block);
        let mut out = vec![0.0; 32];
        analyser.float_time_domain_data(&mut out);
        assert!((out[0] - 0.08).abs() < 1e-6);
        assert!((out[31] - 0.39).abs() < 1e-6);
    }

    #[test]
    fn test_smoothing_decays_gradually() {
        let mut analyser = Analyser::new(256, 0.5);
        analyser.write(&sine_block(1500.0, 48_000.0, 256));
        let mut loud = vec![0.0; 128];
        analyser.float_frequency_data(&mut loud);

        analyser.clear_ring_for_test();
        let mut after = vec![0.0; 128];
        analyser.float_frequency_data(&mut after);
        // Bin 8 is 1500 Hz; half the previous magnitude is about -6 dB
        assert!((after[8] - (loud[8] - 6.02)).abs() < 0.1);
    }

    impl Analyser {
        fn clear_ring_for_test(&mut self) {
            self.ring.fill(0.0);
        }
    }
}
