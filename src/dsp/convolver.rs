//! Uniformly partitioned overlap-save convolution.
//!
//! The impulse response is cut into partitions of `BLOCK` samples, each
//! transformed once at load. Incoming audio is gathered into blocks of the
//! same size; every full block is transformed, pushed onto a frequency-domain
//! delay line and multiplied against the partitions. Output lags the input by
//! one block.

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// Partition size in samples, also the latency of the convolver.
pub const BLOCK: usize = 512;
const FFT_SIZE: usize = BLOCK * 2;

/// Longest impulse response accepted, in seconds. Longer responses are cut.
pub const MAX_IMPULSE_SECONDS: f32 = 10.0;

const GAIN_CALIBRATION: f32 = 0.00125;
const GAIN_CALIBRATION_SAMPLE_RATE: f32 = 44_100.0;
const MIN_POWER: f32 = 0.000125;

/// Scale that brings impulse responses of different energy to a comparable
/// loudness.
pub fn normalization_scale(channels: &[&[f32]], sample_rate: f32) -> f32 {
    let len = channels.first().map(|c| c.len()).unwrap_or(0);
    if len == 0 {
        return 1.0;
    }
    let sum: f32 = channels
        .iter()
        .flat_map(|c| c.iter())
        .map(|s| s * s)
        .sum();
    let mut power = (sum / (channels.len() * len) as f32).sqrt();
    if !power.is_finite() || power < MIN_POWER {
        power = MIN_POWER;
    }
    let mut scale = GAIN_CALIBRATION / power;
    if sample_rate > 0.0 {
        scale *= GAIN_CALIBRATION_SAMPLE_RATE / sample_rate;
    }
    scale
}

pub struct Convolver {
    fft: Arc<dyn Fft<f32>>,
    ifft: Arc<dyn Fft<f32>>,
    /// Spectra of the impulse partitions
    partitions: Vec<Vec<Complex<f32>>>,
    /// Spectra of past input windows, newest at `history_pos`
    history: Vec<Vec<Complex<f32>>>,
    history_pos: usize,
    /// Last two input blocks in the time domain
    window: Vec<f32>,
    input: Vec<f32>,
    output: Vec<f32>,
    fill: usize,
    spectrum: Vec<Complex<f32>>,
    acc: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl Convolver {
    /// Prepare `impulse` scaled by `gain`. An empty impulse convolves to silence.
    pub fn new(impulse: &[f32], gain: f32) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(FFT_SIZE);
        let ifft = planner.plan_fft_inverse(FFT_SIZE);
        let scratch_len = fft
            .get_inplace_scratch_len()
            .max(ifft.get_inplace_scratch_len());
        let mut scratch = vec![Complex::new(0.0, 0.0); scratch_len];

        let impulse: &[f32] = if impulse.is_empty() { &[0.0] } else { impulse };
        let partitions: Vec<Vec<Complex<f32>>> = impulse
            .chunks(BLOCK)
            .map(|chunk| {
                let mut spectrum = vec![Complex::new(0.0, 0.0); FFT_SIZE];
                for (bin, sample) in spectrum.iter_mut().zip(chunk) {
                    bin.re = sample * gain;
                }
                fft.process_with_scratch(&mut spectrum, &mut scratch);
                spectrum
            })
            .collect();
        let history = vec![vec![Complex::new(0.0, 0.0); FFT_SIZE]; partitions.len()];

        Self {
            fft,
            ifft,
            partitions,
            history,
            history_pos: 0,
            window: vec![0.0; FFT_SIZE],
            input: vec![0.0; BLOCK],
            output: vec![0.0; BLOCK],
            fill: 0,
            spectrum: vec![Complex::new(0.0, 0.0); FFT_SIZE],
            acc: vec![Complex::new(0.0, 0.0); FFT_SIZE],
            scratch,
        }
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    #[inline]
    pub fn process(&mut self, sample: f32) -> f32 {
        let out = self.output[self.fill];
        self.input[self.fill] = sample;
        self.fill += 1;
        if self.fill == BLOCK {
            self.convolve_block();
            self.fill = 0;
        }
        out
    }

    fn convolve_block(&mut self) {
        self.window.copy_within(BLOCK.., 0);
        self.window[BLOCK..].copy_from_slice(&self.input);
        for (bin, sample) in self.spectrum.iter_mut().zip(&self.window) {
            *bin = Complex::new(*sample, 0.0);
        }
        self.fft
            .process_with_scratch(&mut self.spectrum, &mut self.scratch);

        let count = self.partitions.len();
        self.history_pos = (self.history_pos + count - 1) % count;
        self.history[self.history_pos].copy_from_slice(&self.spectrum);

        self.acc.fill(Complex::new(0.0, 0.0));
        for (p, partition) in self.partitions.iter().enumerate() {
            let past = &self.history[(self.history_pos + p) % count];
            for ((acc, x), h) in self.acc.iter_mut().zip(past).zip(partition) {
                *acc += x * h;
            }
        }
        self.ifft.process_with_scratch(&mut self.acc, &mut self.scratch);

        let scale = 1.0 / FFT_SIZE as f32;
        for (out, bin) in self.output.iter_mut().zip(&self.acc[BLOCK..]) {
            *out = bin.re * scale;
        }
    }

    pub fn reset(&mut self) {
        for spectrum in &mut self.history {
            spectrum.fill(Complex::new(0.0, 0.0));
        }
        self.window.fill(0.0);
        self.input.fill(0.0);
        self.output.fill(0.0);
        self.fill = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(convolver: &mut Convolver, input: &[f32]) -> Vec<f32> {
        input.iter().map(|s| convolver.process(*s)).collect()
    }

    fn direct(input: &[f32], impulse: &[f32]) -> Vec<f32> {
        (0..input.len())
            .map(|n| {
                impulse
                    .iter()
                    .enumerate()
                    .filter(|(k, _)| *k <= n)
                    .map(|(k, h)| h * input[n - k])
                    .sum()
            })
            .collect()
    }

    #[test]
    fn test_unit_impulse_delays_by_one_block() {
        let mut convolver = Convolver::new(&[1.0], 1.0);
        let mut input = vec![0.0; BLOCK * 3];
        input[5] = 1.0;
        let out = run(&mut convolver, &input);
        assert!((out[BLOCK + 5] - 1.0).abs() < 1e-5);
        assert!(out[..BLOCK].iter().all(|s| s.abs() < 1e-6));
    }

    #[test]
    fn test_matches_direct_convolution_across_partitions() {
        let impulse: Vec<f32> = (0..1300)
            .map(|i| ((i * 7919) % 97) as f32 / 97.0 - 0.5)
            .map(|s| s * 0.1)
            .collect();
        let input: Vec<f32> = (0..BLOCK * 5)
            .map(|i| ((i * 104_729) % 89) as f32 / 89.0 - 0.5)
            .collect();

        let mut convolver = Convolver::new(&impulse, 1.0);
        assert_eq!(convolver.partition_count(), 3);
        let out = run(&mut convolver, &input);
        let expected = direct(&input, &impulse);
        for n in 0..BLOCK * 4 {
            assert!(
                (out[n + BLOCK] - expected[n]).abs() < 1e-3,
                "sample {}: {} vs {}",
                n,
                out[n + BLOCK],
                expected[n]
            );
        }
    }

    #[test]
    fn test_empty_impulse_is_silent() {
        let mut convolver = Convolver::new(&[], 1.0);
        let out = run(&mut convolver, &vec![1.0; BLOCK * 2]);
        assert!(out.iter().all(|s| s.abs() < 1e-6));
    }

    #[test]
    fn test_normalization_evens_out_energy() {
        let quiet = vec![0.01f32; 1000];
        let loud = vec![0.5f32; 1000];
        let quiet_scale = normalization_scale(&[quiet.as_slice()], 44_100.0);
        let loud_scale = normalization_scale(&[loud.as_slice()], 44_100.0);
        assert!((quiet_scale * 0.01 - loud_scale * 0.5).abs() < 1e-6);
        assert_eq!(normalization_scale(&[], 44_100.0), 1.0);
    }
}
