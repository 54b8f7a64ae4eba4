//! Immutable decoded audio shared by reference.

use crate::graph::node::StereoFrame;

/// Decoded audio held in memory.
///
/// Rhythm samples and impulse responses are loaded once and shared through
/// `Arc<SampleBuffer>`; nothing ever copies the sample data after decode.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    sample_rate: f32,
    channels: Vec<Vec<f32>>,
}

impl SampleBuffer {
    /// Build a buffer from per-channel samples. Shorter channels are padded
    /// with silence so every channel has the same length.
    pub fn new(sample_rate: f32, mut channels: Vec<Vec<f32>>) -> Self {
        if channels.is_empty() {
            channels.push(Vec::new());
        }
        let len = channels.iter().map(Vec::len).max().unwrap_or(0);
        for channel in &mut channels {
            channel.resize(len, 0.0);
        }
        Self {
            sample_rate,
            channels,
        }
    }

    pub fn from_mono(sample_rate: f32, samples: Vec<f32>) -> Self {
        Self::new(sample_rate, vec![samples])
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.channels[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    pub fn duration(&self) -> f64 {
        if self.sample_rate <= 0.0 {
            return 0.0;
        }
        self.len() as f64 / self.sample_rate as f64
    }

    /// Frame at an integer index. Mono buffers play on both sides.
    #[inline]
    pub fn frame(&self, index: usize) -> StereoFrame {
        let left = self.channels[0].get(index).copied().unwrap_or(0.0);
        let right = match self.channels.get(1) {
            Some(channel) => channel.get(index).copied().unwrap_or(0.0),
            None => left,
        };
        StereoFrame::new(left, right)
    }

    /// Linearly interpolated frame at a fractional position.
    #[inline]
    pub fn frame_at(&self, position: f64) -> StereoFrame {
        if position < 0.0 {
            return StereoFrame::SILENT;
        }
        let index = position as usize;
        let frac = (position - index as f64) as f32;
        let a = self.frame(index);
        if frac == 0.0 {
            return a;
        }
        let b = self.frame(index + 1);
        a + (b - a) * frac
    }

    /// Linearly resampled copy at `sample_rate`.
    pub fn resampled(&self, sample_rate: f32) -> SampleBuffer {
        if sample_rate <= 0.0 || (sample_rate - self.sample_rate).abs() < f32::EPSILON {
            return self.clone();
        }
        let ratio = self.sample_rate as f64 / sample_rate as f64;
        let len = (self.len() as f64 / ratio).round() as usize;
        let channels = self
            .channels
            .iter()
            .map(|channel| {
                (0..len)
                    .map(|i| {
                        let pos = i as f64 * ratio;
                        let index = pos as usize;
                        let frac = (pos - index as f64) as f32;
                        let a = channel.get(index).copied().unwrap_or(0.0);
                        let b = channel.get(index + 1).copied().unwrap_or(a);
                        a + (b - a) * frac
                    })
                    .collect()
            })
            .collect();
        SampleBuffer::new(sample_rate, channels)
    }

    /// Average of all channels.
    pub fn to_mono(&self) -> Vec<f32> {
        let scale = 1.0 / self.channels.len() as f32;
        (0..self.len())
            .map(|i| self.channels.iter().map(|c| c[i]).sum::<f32>() * scale)
            .collect()
    }
}
