use std::f32::consts::PI;

use crate::graph::node::RenderCtx;

/*
| type     | passes          | rejects       |
| -------- | --------------- | ------------- |
| low-pass | below cutoff    | above cutoff  |
| high-pass| above cutoff    | below cutoff  |
| band-pass| around cutoff   | outside       |
| notch    | outside         | around cutoff |
| peaking  | everything; boosts or cuts around cutoff by `gain_db` |

All five come out of one trapezoidal state-variable core. Q sets the damping
(k = 1/Q); the peaking response rescales it by the shelf amplitude.
*/

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    LowPass,
    HighPass,
    BandPass,
    Notch,
    Peaking,
}

pub struct FilterOutputs {
    pub lowpass: f32,
    pub bandpass: f32,
    pub highpass: f32,
    pub notch: f32,
}

/// Per-block coefficients, computed once from cutoff, Q and gain.
#[derive(Debug, Clone, Copy)]
pub struct Coefficients {
    g: f32,
    k: f32,
    /// Bandpass weight for the peaking response
    bell: f32,
}

pub struct SVFilter {
    ic1eq: f32, // First integrator's memory
    ic2eq: f32, // Second integrator's memory

    pub cutoff_hz: f32,
    pub q: f32,
    pub gain_db: f32,
    filter_type: FilterType,
}

impl SVFilter {
    pub fn new(filter_type: FilterType) -> Self {
        Self {
            ic1eq: 0.0,
            ic2eq: 0.0,
            cutoff_hz: 1000.0,
            q: 1.0,
            gain_db: 0.0,
            filter_type,
        }
    }

    fn with_cutoff(filter_type: FilterType, cutoff_hz: f32) -> Self {
        Self {
            cutoff_hz,
            ..Self::new(filter_type)
        }
    }

    pub fn lowpass(cutoff_hz: f32) -> Self {
        Self::with_cutoff(FilterType::LowPass, cutoff_hz)
    }

    pub fn highpass(cutoff_hz: f32) -> Self {
        Self::with_cutoff(FilterType::HighPass, cutoff_hz)
    }

    pub fn bandpass(cutoff_hz: f32) -> Self {
        Self::with_cutoff(FilterType::BandPass, cutoff_hz)
    }

    pub fn notch(cutoff_hz: f32) -> Self {
        Self::with_cutoff(FilterType::Notch, cutoff_hz)
    }

    pub fn peaking(cutoff_hz: f32, gain_db: f32) -> Self {
        Self {
            gain_db,
            ..Self::with_cutoff(FilterType::Peaking, cutoff_hz)
        }
    }

    pub fn filter_type(&self) -> FilterType {
        self.filter_type
    }

    /// Cutoff is held just under Nyquist, where the prewarp diverges.
    #[inline]
    pub fn coefficients(&self, sample_rate: f32) -> Coefficients {
        let cutoff = self.cutoff_hz.clamp(1.0, sample_rate * 0.49);
        let g = (PI * cutoff / sample_rate).tan();
        let q = self.q.max(1e-4);
        match self.filter_type {
            FilterType::Peaking => {
                let a = 10.0_f32.powf(self.gain_db / 40.0);
                let k = 1.0 / (q * a);
                Coefficients {
                    g,
                    k,
                    bell: k * (a * a - 1.0),
                }
            }
            _ => Coefficients {
                g,
                k: 1.0 / q,
                bell: 0.0,
            },
        }
    }

    pub fn next_sample(&mut self, sample: f32, k: f32, g: f32) -> FilterOutputs {
        let h = 1.0 / (1.0 + g * (g + k));
        let v3 = sample - self.ic2eq;
        let v1 = h * (self.ic1eq + g * v3);
        let v2 = self.ic2eq + g * v1;

        self.ic1eq = 2.0 * v1 - self.ic1eq;
        self.ic2eq = 2.0 * v2 - self.ic2eq;

        FilterOutputs {
            lowpass: v2,
            bandpass: v1,
            highpass: sample - k * v1 - v2,
            notch: sample - k * v1,
        }
    }

    /// Filter one sample with precomputed coefficients.
    #[inline]
    pub fn tick(&mut self, sample: f32, coeffs: &Coefficients) -> f32 {
        let outputs = self.next_sample(sample, coeffs.k, coeffs.g);
        match self.filter_type {
            FilterType::LowPass => outputs.lowpass,
            FilterType::HighPass => outputs.highpass,
            FilterType::BandPass => outputs.bandpass,
            FilterType::Notch => outputs.notch,
            FilterType::Peaking => sample + coeffs.bell * outputs.bandpass,
        }
    }

    pub fn render(&mut self, buffer: &mut [f32], ctx: &RenderCtx) {
        let coeffs = self.coefficients(ctx.sample_rate);
        for sample in buffer.iter_mut() {
            *sample = self.tick(*sample, &coeffs);
        }
    }

    pub fn reset(&mut self) {
        self.ic1eq = 0.0;
        self.ic2eq = 0.0;
    }

    pub fn set_cutoff(&mut self, cutoff: f32) {
        self.cutoff_hz = cutoff;
    }

    pub fn set_q(&mut self, q: f32) {
        self.q = q;
    }

    pub fn set_gain_db(&mut self, gain_db: f32) {
        self.gain_db = gain_db;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::oscillator::{Oscillator, Waveform};

    const SAMPLE_RATE: f32 = 48_000.0;

    fn ctx() -> RenderCtx {
        RenderCtx::new(SAMPLE_RATE, 0.0)
    }

    fn sine(freq: f32, len: usize) -> Vec<f32> {
        let mut osc = Oscillator::new(Waveform::Sine);
        let mut buffer = vec![0.0f32; len];
        osc.render(&mut buffer, freq, SAMPLE_RATE);
        buffer
    }

    /// Peak of the second half, once the filter has settled.
    fn settled_peak(buffer: &[f32]) -> f32 {
        buffer[buffer.len() / 2..]
            .iter()
            .fold(0.0f32, |acc, &x| acc.max(x.abs()))
    }

    #[test]
    fn test_lowpass_passes_dc() {
        let mut filter = SVFilter::lowpass(500.0);
        let mut buffer = vec![1.0; 512];
        filter.render(&mut buffer, &ctx());
        assert!((buffer[511] - 1.0).abs() < 0.01, "got {}", buffer[511]);
    }

    #[test]
    fn test_highpass_blocks_dc() {
        let mut filter = SVFilter::highpass(500.0);
        let mut buffer = vec![1.0; 512];
        filter.render(&mut buffer, &ctx());
        assert!(buffer[511].abs() < 0.01, "got {}", buffer[511]);
    }

    #[test]
    fn test_lowpass_filters_high_freq() {
        let mut filter = SVFilter::lowpass(500.0);
        let mut buffer = sine(5_000.0, 512);
        filter.render(&mut buffer, &ctx());
        let peak = settled_peak(&buffer);
        assert!(peak < 0.05, "expected high freq attenuation, got peak: {}", peak);
    }

    #[test]
    fn test_bandpass_emphasizes_cutoff_frequency() {
        let mut filter = SVFilter::bandpass(1_000.0);
        filter.set_q(2.0);

        let mut pass = sine(1_000.0, 1024);
        filter.render(&mut pass, &ctx());
        filter.reset();
        let mut off = sine(200.0, 1024);
        filter.render(&mut off, &ctx());

        let (pass_peak, off_peak) = (settled_peak(&pass), settled_peak(&off));
        assert!(
            pass_peak > off_peak * 2.0,
            "pass_peak={}, off_peak={}",
            pass_peak,
            off_peak
        );
    }

    #[test]
    fn test_notch_rejects_cutoff_frequency() {
        let mut filter = SVFilter::notch(1_000.0);
        filter.set_q(0.5);

        let mut center = sine(1_000.0, 1024);
        filter.render(&mut center, &ctx());
        filter.reset();
        let mut off = sine(200.0, 1024);
        filter.render(&mut off, &ctx());

        let (center_peak, off_peak) = (settled_peak(&center), settled_peak(&off));
        assert!(
            center_peak * 2.0 < off_peak,
            "center_peak={}, off_peak={}",
            center_peak,
            off_peak
        );
    }

    #[test]
    fn test_set_cutoff_affects_filtering() {
        let mut filter = SVFilter::lowpass(200.0);
        let mut low = sine(1_000.0, 512);
        filter.render(&mut low, &ctx());

        filter.reset();
        filter.set_cutoff(5_000.0);
        let mut high = sine(1_000.0, 512);
        filter.render(&mut high, &ctx());

        assert!(settled_peak(&high) > settled_peak(&low) * 2.0);
    }

    #[test]
    fn test_q_raises_lowpass_peak_at_cutoff() {
        let mut filter = SVFilter::lowpass(1_000.0);
        filter.set_q(0.5);
        let mut damped = sine(1_000.0, 1024);
        filter.render(&mut damped, &ctx());

        filter.reset();
        filter.set_q(4.0);
        let mut resonant = sine(1_000.0, 1024);
        filter.render(&mut resonant, &ctx());

        assert!(settled_peak(&resonant) > settled_peak(&damped) * 1.2);
    }

    #[test]
    fn test_peaking_boosts_and_cuts_center() {
        let mut boost = SVFilter::peaking(1_000.0, 12.0);
        let mut buffer = sine(1_000.0, 2048);
        boost.render(&mut buffer, &ctx());
        let boosted = settled_peak(&buffer);
        assert!((boosted - 3.98).abs() < 0.2, "boosted={}", boosted);

        let mut cut = SVFilter::peaking(1_000.0, -12.0);
        let mut buffer = sine(1_000.0, 2048);
        cut.render(&mut buffer, &ctx());
        let cut_peak = settled_peak(&buffer);
        assert!((cut_peak - 0.25).abs() < 0.05, "cut={}", cut_peak);
    }

    #[test]
    fn test_flat_peaking_is_transparent() {
        let mut filter = SVFilter::peaking(1_000.0, 0.0);
        let input = sine(300.0, 256);
        let mut buffer = input.clone();
        filter.render(&mut buffer, &ctx());
        for (a, b) in input.iter().zip(&buffer) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_cutoff_above_nyquist_stays_finite() {
        let mut filter = SVFilter::lowpass(30_000.0);
        let mut buffer = sine(440.0, 256);
        filter.render(&mut buffer, &ctx());
        assert!(buffer.iter().all(|s| s.is_finite()));
    }
}
