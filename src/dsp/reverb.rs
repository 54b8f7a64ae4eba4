//! Schroeder reverb, used offline to synthesize impulse responses for the
//! convolution reverb.
//!
//! ```text
//! Input ──┬──→ [Comb 1] ──┐
//!         ├──→ [Comb 2] ──┤
//!         ├──→ [Comb 3] ──┼──→ (+) ──→ [Allpass 1] ──→ [Allpass 2] ──→ Output
//!         └──→ [Comb 4] ──┘
//! ```
//!
//! Comb delays are mutually prime so the echoes never line up. The right
//! channel runs a second network with slightly longer delays, which keeps the
//! two tails decorrelated.

use serde::Deserialize;

use crate::buffer::SampleBuffer;

const COMB_DELAYS_MS: [f32; 4] = [29.7, 37.1, 41.1, 43.7];
const ALLPASS_DELAYS_MS: [f32; 2] = [5.0, 1.7];
/// Extra delay for the right-channel network, in samples at 44.1kHz
const STEREO_SPREAD: f32 = 23.0;
/// Share of the impulse at the end that is faded to silence
const FADE_SHARE: f32 = 0.1;

/// Feedback comb with one-pole damping in the loop
pub struct CombFilter {
    buffer: Vec<f32>,
    write_pos: usize,
    feedback: f32,
    damp: f32,
    filter_state: f32,
}

impl CombFilter {
    pub fn new(delay_samples: usize) -> Self {
        Self {
            buffer: vec![0.0; delay_samples.max(1)],
            write_pos: 0,
            feedback: 0.5,
            damp: 0.5,
            filter_state: 0.0,
        }
    }

    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback = feedback.clamp(0.0, 0.99);
    }

    pub fn set_damp(&mut self, damp: f32) {
        self.damp = damp.clamp(0.0, 1.0);
    }

    pub fn process(&mut self, input: f32) -> f32 {
        let output = self.buffer[self.write_pos];
        self.filter_state = output * (1.0 - self.damp) + self.filter_state * self.damp;
        self.buffer[self.write_pos] = input + self.filter_state * self.feedback;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
        output
    }

    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.filter_state = 0.0;
        self.write_pos = 0;
    }
}

pub struct AllpassFilter {
    buffer: Vec<f32>,
    write_pos: usize,
    feedback: f32,
}

impl AllpassFilter {
    pub fn new(delay_samples: usize) -> Self {
        Self {
            buffer: vec![0.0; delay_samples.max(1)],
            write_pos: 0,
            feedback: 0.5,
        }
    }

    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback = feedback.clamp(0.0, 0.9);
    }

    pub fn process(&mut self, input: f32) -> f32 {
        let delayed = self.buffer[self.write_pos];
        let output = -self.feedback * input + delayed;
        self.buffer[self.write_pos] = input + self.feedback * output;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
        output
    }

    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}

/// 4 parallel combs into 2 series allpasses
pub struct SchroederReverb {
    combs: [CombFilter; 4],
    allpasses: [AllpassFilter; 2],
}

impl SchroederReverb {
    pub fn new(sample_rate: f32) -> Self {
        Self::with_offset(sample_rate, 0.0)
    }

    /// Network with every delay lengthened by `offset` samples.
    fn with_offset(sample_rate: f32, offset: f32) -> Self {
        let samples = |ms: f32| (ms * sample_rate / 1000.0 + offset) as usize;
        Self {
            combs: COMB_DELAYS_MS.map(|ms| CombFilter::new(samples(ms))),
            allpasses: ALLPASS_DELAYS_MS.map(|ms| AllpassFilter::new(samples(ms))),
        }
    }

    /// Room size maps onto comb feedback between 0.7 and 0.98.
    pub fn set_room_size(&mut self, size: f32) {
        let feedback = 0.7 + size.clamp(0.0, 1.0) * 0.28;
        for comb in &mut self.combs {
            comb.set_feedback(feedback);
        }
    }

    pub fn set_damping(&mut self, damp: f32) {
        for comb in &mut self.combs {
            comb.set_damp(damp);
        }
    }

    pub fn process(&mut self, input: f32) -> f32 {
        let mut output = 0.0;
        for comb in &mut self.combs {
            output += comb.process(input);
        }
        output *= 0.25;

        for allpass in &mut self.allpasses {
            output = allpass.process(output);
        }
        output
    }

    pub fn reset(&mut self) {
        for comb in &mut self.combs {
            comb.reset();
        }
        for allpass in &mut self.allpasses {
            allpass.reset();
        }
    }
}

/// Built-in impulse responses for the convolution reverb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpulsePreset {
    #[default]
    Room,
    Hall,
    Plate,
}

impl ImpulsePreset {
    pub const ALL: [ImpulsePreset; 3] = [ImpulsePreset::Room, ImpulsePreset::Hall, ImpulsePreset::Plate];

    fn room_size(&self) -> f32 {
        match self {
            ImpulsePreset::Room => 0.3,
            ImpulsePreset::Hall => 0.6,
            ImpulsePreset::Plate => 0.85,
        }
    }

    fn damping(&self) -> f32 {
        match self {
            ImpulsePreset::Room => 0.5,
            ImpulsePreset::Hall => 0.4,
            ImpulsePreset::Plate => 0.3,
        }
    }

    /// Length of the rendered response.
    pub fn seconds(&self) -> f32 {
        match self {
            ImpulsePreset::Room => 1.0,
            ImpulsePreset::Hall => 2.0,
            ImpulsePreset::Plate => 2.5,
        }
    }

    /// Render the stereo impulse response at `sample_rate`.
    pub fn render(&self, sample_rate: f32) -> SampleBuffer {
        let len = (self.seconds() * sample_rate) as usize;
        let spread = STEREO_SPREAD * sample_rate / 44_100.0;
        let channels = [0.0, spread].map(|offset| {
            let mut reverb = SchroederReverb::with_offset(sample_rate, offset);
            reverb.set_room_size(self.room_size());
            reverb.set_damping(self.damping());
            let mut out: Vec<f32> = (0..len)
                .map(|i| reverb.process(if i == 0 { 1.0 } else { 0.0 }))
                .collect();
            fade_tail(&mut out);
            out
        });
        SampleBuffer::new(sample_rate, channels.into())
    }
}

/// Linear fade over the last part so truncation does not click.
fn fade_tail(samples: &mut [f32]) {
    let fade = ((samples.len() as f32 * FADE_SHARE) as usize).max(1);
    let start = samples.len().saturating_sub(fade);
    for (i, sample) in samples[start..].iter_mut().enumerate() {
        *sample *= 1.0 - (i + 1) as f32 / fade as f32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comb_filter_creates_echo() {
        let mut comb = CombFilter::new(10);
        comb.set_feedback(0.5);
        comb.set_damp(0.0);

        assert!(comb.process(1.0).abs() < 0.01);
        for _ in 0..9 {
            comb.process(0.0);
        }
        assert!(comb.process(0.0).abs() > 0.4);
    }

    #[test]
    fn test_allpass_preserves_energy() {
        let mut allpass = AllpassFilter::new(5);
        allpass.set_feedback(0.5);

        let mut energy_in = 0.0;
        let mut energy_out = 0.0;
        for i in 0..100 {
            let input = if i < 10 { 1.0 } else { 0.0 };
            let output = allpass.process(input);
            energy_in += input * input;
            energy_out += output * output;
        }
        assert!(energy_out > energy_in * 0.8);
    }

    #[test]
    fn test_reverb_produces_tail() {
        let mut reverb = SchroederReverb::new(48_000.0);
        reverb.set_room_size(0.5);
        reverb.set_damping(0.5);
        let _ = reverb.process(1.0);

        // Longest comb is ~43ms, about 2100 samples
        let has_tail = (0..5000).any(|_| reverb.process(0.0).abs() > 0.001);
        assert!(has_tail, "reverb should ring after an impulse");
    }

    #[test]
    fn test_reverb_stability() {
        let mut reverb = SchroederReverb::new(48_000.0);
        reverb.set_room_size(1.0);
        for _ in 0..10_000 {
            let out = reverb.process(0.1);
            assert!(out.is_finite());
            assert!(out.abs() < 10.0, "reverb output unstable: {}", out);
        }
    }

    #[test]
    fn test_presets_render_decorrelated_stereo() {
        let ir = ImpulsePreset::Room.render(48_000.0);
        assert_eq!(ir.channel_count(), 2);
        assert_eq!(ir.len(), 48_000);
        let left = ir.channel(0).unwrap();
        let right = ir.channel(1).unwrap();
        assert!(left.iter().zip(right).any(|(l, r)| (l - r).abs() > 1e-3));
        assert_eq!(*left.last().unwrap(), 0.0);
    }

    #[test]
    fn test_larger_presets_ring_longer() {
        let energy_after = |preset: ImpulsePreset| {
            let ir = preset.render(24_000.0);
            ir.channel(0).unwrap()[12_000..20_000]
                .iter()
                .map(|s| s * s)
                .sum::<f32>()
        };
        assert!(energy_after(ImpulsePreset::Hall) > energy_after(ImpulsePreset::Room));
    }
}
