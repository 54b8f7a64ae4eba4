//! Stereo effect nodes wrapping the DSP primitives.
//!
//! Parameter names match the registry schema for each effect kind. Values
//! arrive already clamped by the parameter router.

use std::sync::Arc;

use crate::buffer::SampleBuffer;
use crate::dsp::compressor::{Compressor, CompressorSettings};
use crate::dsp::convolver::{normalization_scale, Convolver, MAX_IMPULSE_SECONDS};
use crate::dsp::delay::DelayLine;
use crate::dsp::distortion::{Oversample, Waveshaper};
use crate::dsp::filter::{FilterType, SVFilter};
use crate::dsp::oscillator::{detuned, Oscillator, Waveform};
use crate::dsp::panner::StereoPanner;
use crate::graph::node::{DspNode, RenderCtx, StereoFrame};
use crate::registry::FilterKind;

pub struct GainNode {
    gain: f32,
}

impl GainNode {
    pub fn new(gain: f32) -> Self {
        Self { gain }
    }
}

impl DspNode for GainNode {
    fn process(&mut self, input: &[StereoFrame], out: &mut [StereoFrame], _ctx: &RenderCtx) {
        for (o, i) in out.iter_mut().zip(input) {
            *o = *i * self.gain;
        }
    }

    fn set_param(&mut self, name: &str, value: f32) -> bool {
        match name {
            "gain" => self.gain = value,
            _ => return false,
        }
        true
    }

    fn param(&self, name: &str) -> Option<f32> {
        (name == "gain").then_some(self.gain)
    }
}

pub struct FilterNode {
    left: SVFilter,
    right: SVFilter,
}

impl FilterNode {
    pub fn new(kind: FilterKind) -> Self {
        let filter_type = match kind {
            FilterKind::Lowpass => FilterType::LowPass,
            FilterKind::Highpass => FilterType::HighPass,
            FilterKind::Bandpass => FilterType::BandPass,
            FilterKind::Notch => FilterType::Notch,
            FilterKind::Peaking => FilterType::Peaking,
        };
        Self {
            left: SVFilter::new(filter_type),
            right: SVFilter::new(filter_type),
        }
    }
}

impl DspNode for FilterNode {
    fn process(&mut self, input: &[StereoFrame], out: &mut [StereoFrame], ctx: &RenderCtx) {
        let coeffs = self.left.coefficients(ctx.sample_rate);
        for (o, i) in out.iter_mut().zip(input) {
            *o = StereoFrame::new(
                self.left.tick(i.left, &coeffs),
                self.right.tick(i.right, &coeffs),
            );
        }
    }

    fn set_param(&mut self, name: &str, value: f32) -> bool {
        let peaking = self.left.filter_type() == FilterType::Peaking;
        for filter in [&mut self.left, &mut self.right] {
            match name {
                "freq" => filter.set_cutoff(value),
                "q" => filter.set_q(value),
                "gain" if peaking => filter.set_gain_db(value),
                _ => return false,
            }
        }
        true
    }

    fn param(&self, name: &str) -> Option<f32> {
        match name {
            "freq" => Some(self.left.cutoff_hz),
            "q" => Some(self.left.q),
            "gain" if self.left.filter_type() == FilterType::Peaking => Some(self.left.gain_db),
            _ => None,
        }
    }

    fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
    }
}

/// Feedback echo. Output is the wet signal only; the dry/wet pair around it
/// does the blending.
pub struct DelayNode {
    left: DelayLine,
    right: DelayLine,
    time: f32,
    feedback: f32,
}

impl DelayNode {
    pub fn new() -> Self {
        Self {
            left: DelayLine::new(),
            right: DelayLine::new(),
            time: 0.3,
            feedback: 0.4,
        }
    }
}

impl Default for DelayNode {
    fn default() -> Self {
        Self::new()
    }
}

impl DspNode for DelayNode {
    fn process(&mut self, input: &[StereoFrame], out: &mut [StereoFrame], ctx: &RenderCtx) {
        let delay = self.time * ctx.sample_rate;
        for (o, i) in out.iter_mut().zip(input) {
            *o = StereoFrame::new(
                self.left.process_feedback(i.left, delay, self.feedback),
                self.right.process_feedback(i.right, delay, self.feedback),
            );
        }
    }

    fn set_param(&mut self, name: &str, value: f32) -> bool {
        match name {
            "time" => self.time = value,
            "feedback" => self.feedback = value,
            _ => return false,
        }
        true
    }

    fn param(&self, name: &str) -> Option<f32> {
        match name {
            "time" => Some(self.time),
            "feedback" => Some(self.feedback),
            _ => None,
        }
    }

    fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
    }
}

pub struct DistortionNode {
    left: Waveshaper,
    right: Waveshaper,
}

impl DistortionNode {
    pub fn new(amount: f32) -> Self {
        Self {
            left: Waveshaper::new(amount),
            right: Waveshaper::new(amount),
        }
    }
}

impl DspNode for DistortionNode {
    fn process(&mut self, input: &[StereoFrame], out: &mut [StereoFrame], _ctx: &RenderCtx) {
        for (o, i) in out.iter_mut().zip(input) {
            *o = StereoFrame::new(self.left.process(i.left), self.right.process(i.right));
        }
    }

    fn set_param(&mut self, name: &str, value: f32) -> bool {
        match name {
            "amount" => {
                self.left.set_amount(value);
                self.right.set_amount(value);
            }
            "oversample" => {
                let oversample = Oversample::from_index(value as usize);
                self.left.set_oversample(oversample);
                self.right.set_oversample(oversample);
            }
            _ => return false,
        }
        true
    }

    fn param(&self, name: &str) -> Option<f32> {
        match name {
            "amount" => Some(self.left.amount()),
            "oversample" => Some(self.left.oversample().index() as f32),
            _ => None,
        }
    }

    fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
    }
}

pub struct CompressorNode {
    compressor: Compressor,
}

impl CompressorNode {
    pub fn new() -> Self {
        Self {
            compressor: Compressor::new(CompressorSettings::default()),
        }
    }
}

impl Default for CompressorNode {
    fn default() -> Self {
        Self::new()
    }
}

impl DspNode for CompressorNode {
    fn process(&mut self, input: &[StereoFrame], out: &mut [StereoFrame], ctx: &RenderCtx) {
        let (attack, release) = self.compressor.coefficients(ctx.sample_rate);
        for (o, i) in out.iter_mut().zip(input) {
            let gain = self.compressor.next_gain(i.peak(), attack, release);
            *o = *i * gain;
        }
    }

    fn set_param(&mut self, name: &str, value: f32) -> bool {
        let settings = &mut self.compressor.settings;
        match name {
            "threshold" => settings.threshold_db = value,
            "knee" => settings.knee_db = value,
            "ratio" => settings.ratio = value,
            "attack" => settings.attack = value,
            "release" => settings.release = value,
            _ => return false,
        }
        true
    }

    /// Besides the settings, `reduction` reads the current gain reduction in dB.
    fn param(&self, name: &str) -> Option<f32> {
        let settings = &self.compressor.settings;
        match name {
            "threshold" => Some(settings.threshold_db),
            "knee" => Some(settings.knee_db),
            "ratio" => Some(settings.ratio),
            "attack" => Some(settings.attack),
            "release" => Some(settings.release),
            "reduction" => Some(self.compressor.reduction_db()),
            _ => None,
        }
    }

    fn reset(&mut self) {
        self.compressor.reset();
    }
}

pub struct PannerNode {
    panner: StereoPanner,
}

impl PannerNode {
    pub fn new() -> Self {
        Self {
            panner: StereoPanner::new(0.0),
        }
    }
}

impl Default for PannerNode {
    fn default() -> Self {
        Self::new()
    }
}

impl DspNode for PannerNode {
    fn process(&mut self, input: &[StereoFrame], out: &mut [StereoFrame], _ctx: &RenderCtx) {
        for (o, i) in out.iter_mut().zip(input) {
            let (left, right) = self.panner.process(i.left, i.right);
            *o = StereoFrame::new(left, right);
        }
    }

    fn set_param(&mut self, name: &str, value: f32) -> bool {
        match name {
            "pan" => self.panner.set_pan(value),
            _ => return false,
        }
        true
    }

    fn param(&self, name: &str) -> Option<f32> {
        (name == "pan").then_some(self.panner.pan())
    }
}

/// Free-running tone generator. Ignores its input.
pub struct OscillatorNode {
    osc: Oscillator,
    freq: f32,
    detune: f32,
}

impl OscillatorNode {
    pub fn new() -> Self {
        Self {
            osc: Oscillator::new(Waveform::Sine),
            freq: 440.0,
            detune: 0.0,
        }
    }
}

impl Default for OscillatorNode {
    fn default() -> Self {
        Self::new()
    }
}

impl DspNode for OscillatorNode {
    fn process(&mut self, _input: &[StereoFrame], out: &mut [StereoFrame], ctx: &RenderCtx) {
        let freq = detuned(self.freq, self.detune);
        for o in out.iter_mut() {
            *o = StereoFrame::mono(self.osc.next_sample(freq, ctx.sample_rate));
        }
    }

    fn set_param(&mut self, name: &str, value: f32) -> bool {
        match name {
            "type" => self
                .osc
                .set_waveform(Waveform::from_index(value.max(0.0) as usize)),
            "freq" => self.freq = value,
            "detune" => self.detune = value,
            _ => return false,
        }
        true
    }

    fn param(&self, name: &str) -> Option<f32> {
        match name {
            "type" => Some(self.osc.waveform().index() as f32),
            "freq" => Some(self.freq),
            "detune" => Some(self.detune),
            _ => None,
        }
    }

    fn reset(&mut self) {
        self.osc.reset();
    }
}

/// Convolution reverb. Without an impulse response it outputs silence.
pub struct ConvolverNode {
    left: Convolver,
    right: Convolver,
    sample_rate: f32,
    impulse_seconds: f32,
}

impl ConvolverNode {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            left: Convolver::new(&[], 1.0),
            right: Convolver::new(&[], 1.0),
            sample_rate,
            impulse_seconds: 0.0,
        }
    }

    /// Load an impulse response, resampled to the node's rate, capped in
    /// length and normalized.
    pub fn load(&mut self, impulse: &SampleBuffer) {
        let impulse = impulse.resampled(self.sample_rate);
        let max_len = (MAX_IMPULSE_SECONDS * self.sample_rate) as usize;
        let len = impulse.len().min(max_len);
        let left = impulse.channel(0).map(|c| &c[..len]).unwrap_or(&[]);
        let right = impulse.channel(1).map(|c| &c[..len]).unwrap_or(left);

        let channels: Vec<&[f32]> = if impulse.channel_count() > 1 {
            vec![left, right]
        } else {
            vec![left]
        };
        let scale = normalization_scale(&channels, self.sample_rate);
        self.left = Convolver::new(left, scale);
        self.right = Convolver::new(right, scale);
        self.impulse_seconds = len as f32 / self.sample_rate;
    }
}

impl DspNode for ConvolverNode {
    fn process(&mut self, input: &[StereoFrame], out: &mut [StereoFrame], _ctx: &RenderCtx) {
        for (o, i) in out.iter_mut().zip(input) {
            *o = StereoFrame::new(self.left.process(i.left), self.right.process(i.right));
        }
    }

    fn set_param(&mut self, _name: &str, _value: f32) -> bool {
        false
    }

    /// `length` reads the loaded impulse duration in seconds.
    fn param(&self, name: &str) -> Option<f32> {
        (name == "length").then_some(self.impulse_seconds)
    }

    fn set_buffer(&mut self, buffer: Arc<SampleBuffer>) -> bool {
        self.load(&buffer);
        true
    }

    fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
    }
}
