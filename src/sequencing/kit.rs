//! Drum samples for the rhythm sequencer.
//!
//! Every kit slot holds an immutable buffer shared by reference with each
//! trigger that plays it. Slots left empty are skipped at schedule time.

use std::sync::Arc;

use crate::buffer::SampleBuffer;
use crate::dsp::filter::SVFilter;
use crate::dsp::oscillator::{Oscillator, Waveform};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Drum {
    Kick,
    Snare,
    Hat,
}

impl Drum {
    pub const ALL: [Drum; 3] = [Drum::Kick, Drum::Snare, Drum::Hat];

    pub fn name(&self) -> &'static str {
        match self {
            Drum::Kick => "kick",
            Drum::Snare => "snare",
            Drum::Hat => "hat",
        }
    }

    /// Fixed playback gain of every trigger of this drum.
    pub fn gain(&self) -> f32 {
        match self {
            Drum::Kick => 1.0,
            Drum::Snare => 0.9,
            Drum::Hat => 0.6,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RhythmKit {
    kick: Option<Arc<SampleBuffer>>,
    snare: Option<Arc<SampleBuffer>>,
    hat: Option<Arc<SampleBuffer>>,
}

impl RhythmKit {
    /// A kit with no samples loaded. Playing it schedules nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Kick, snare and hat rendered from the built-in oscillators and filters.
    pub fn synthesized(sample_rate: f32) -> Self {
        Self {
            kick: Some(Arc::new(kick(sample_rate))),
            snare: Some(Arc::new(snare(sample_rate))),
            hat: Some(Arc::new(hat(sample_rate))),
        }
    }

    pub fn buffer(&self, drum: Drum) -> Option<&Arc<SampleBuffer>> {
        match drum {
            Drum::Kick => self.kick.as_ref(),
            Drum::Snare => self.snare.as_ref(),
            Drum::Hat => self.hat.as_ref(),
        }
    }

    /// Replace (or clear) one slot.
    pub fn set(&mut self, drum: Drum, buffer: Option<Arc<SampleBuffer>>) {
        let slot = match drum {
            Drum::Kick => &mut self.kick,
            Drum::Snare => &mut self.snare,
            Drum::Hat => &mut self.hat,
        };
        *slot = buffer;
    }

    pub fn is_loaded(&self, drum: Drum) -> bool {
        self.buffer(drum).is_some()
    }
}

fn frames(sample_rate: f32, seconds: f32) -> usize {
    (sample_rate * seconds).max(1.0) as usize
}

/// Exponential decay reaching about -60 dB at the end of `len` samples.
fn decay(index: usize, len: usize) -> f32 {
    (-6.9 * index as f32 / len as f32).exp()
}

/// Sine body with a fast downward pitch sweep.
fn kick(sample_rate: f32) -> SampleBuffer {
    let len = frames(sample_rate, 0.4);
    let mut body = Oscillator::sine();
    let mut smooth = SVFilter::lowpass(200.0);
    let coeffs = smooth.coefficients(sample_rate);
    let samples = (0..len)
        .map(|i| {
            let t = i as f32 / sample_rate;
            // 150 Hz falling towards 50 Hz
            let freq = 50.0 + 100.0 * (-t * 30.0).exp();
            let s = body.next_sample(freq, sample_rate) * decay(i, len);
            smooth.tick(s, &coeffs) * 1.4
        })
        .collect();
    SampleBuffer::from_mono(sample_rate, samples)
}

/// Band-passed noise over a short triangle body.
fn snare(sample_rate: f32) -> SampleBuffer {
    let len = frames(sample_rate, 0.25);
    let mut rattle = Oscillator::noise();
    let mut body = Oscillator::new(Waveform::Triangle);
    let mut wires = SVFilter::bandpass(3000.0);
    let coeffs = wires.coefficients(sample_rate);
    let body_len = len / 2;
    let samples = (0..len)
        .map(|i| {
            let noise = wires.tick(rattle.next_sample(0.0, sample_rate), &coeffs) * decay(i, len);
            let tone = if i < body_len {
                body.next_sample(180.0, sample_rate) * decay(i, body_len)
            } else {
                0.0
            };
            0.3 * tone + 0.7 * noise
        })
        .collect();
    SampleBuffer::from_mono(sample_rate, samples)
}

/// High-passed noise, very short.
fn hat(sample_rate: f32) -> SampleBuffer {
    let len = frames(sample_rate, 0.08);
    let mut noise = Oscillator::noise();
    let mut shimmer = SVFilter::highpass(7000.0);
    let coeffs = shimmer.coefficients(sample_rate);
    let samples = (0..len)
        .map(|i| shimmer.tick(noise.next_sample(0.0, sample_rate), &coeffs) * decay(i, len))
        .collect();
    SampleBuffer::from_mono(sample_rate, samples)
}
