use std::ops::{Add, AddAssign, Mul, Sub};
use std::sync::Arc;

use crate::buffer::SampleBuffer;

/// One frame of stereo audio.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StereoFrame {
    pub left: f32,
    pub right: f32,
}

impl StereoFrame {
    pub const SILENT: StereoFrame = StereoFrame {
        left: 0.0,
        right: 0.0,
    };

    #[inline]
    pub const fn new(left: f32, right: f32) -> Self {
        Self { left, right }
    }

    #[inline]
    pub const fn mono(sample: f32) -> Self {
        Self {
            left: sample,
            right: sample,
        }
    }

    #[inline]
    pub fn to_mono(self) -> f32 {
        0.5 * (self.left + self.right)
    }

    #[inline]
    pub fn peak(self) -> f32 {
        self.left.abs().max(self.right.abs())
    }
}

impl Add for StereoFrame {
    type Output = StereoFrame;

    #[inline]
    fn add(self, rhs: StereoFrame) -> StereoFrame {
        StereoFrame::new(self.left + rhs.left, self.right + rhs.right)
    }
}

impl Sub for StereoFrame {
    type Output = StereoFrame;

    #[inline]
    fn sub(self, rhs: StereoFrame) -> StereoFrame {
        StereoFrame::new(self.left - rhs.left, self.right - rhs.right)
    }
}

impl AddAssign for StereoFrame {
    #[inline]
    fn add_assign(&mut self, rhs: StereoFrame) {
        self.left += rhs.left;
        self.right += rhs.right;
    }
}

impl Mul<f32> for StereoFrame {
    type Output = StereoFrame;

    #[inline]
    fn mul(self, gain: f32) -> StereoFrame {
        StereoFrame::new(self.left * gain, self.right * gain)
    }
}

/// Context passed to graph nodes during rendering
///
/// - sample_rate: Audio sample rate (e.g., 48000.0)
/// - time: Context time in seconds at the first frame of the block
#[derive(Debug, Clone, Copy)]
pub struct RenderCtx {
    pub sample_rate: f32,
    pub time: f64,
}

impl RenderCtx {
    pub fn new(sample_rate: f32, time: f64) -> Self {
        Self { sample_rate, time }
    }
}

/// Core trait for processing nodes in the signal graph
///
/// A node reads the summed input of everything connected to it and writes the
/// same number of frames to `out`. Parameters are addressed by the names the
/// effect registry publishes for the node's kind.
pub trait DspNode: Send {
    fn process(&mut self, input: &[StereoFrame], out: &mut [StereoFrame], ctx: &RenderCtx);

    /// Returns false when the node has no parameter with this name.
    fn set_param(&mut self, name: &str, value: f32) -> bool;

    fn param(&self, name: &str) -> Option<f32>;

    /// Hand the node a decoded buffer (impulse responses). Nodes that do not
    /// take buffers ignore it.
    fn set_buffer(&mut self, _buffer: Arc<SampleBuffer>) -> bool {
        false
    }

    /// Clear internal state (delay lines, filter memory).
    fn reset(&mut self) {}
}

impl DspNode for Box<dyn DspNode> {
    #[inline]
    fn process(&mut self, input: &[StereoFrame], out: &mut [StereoFrame], ctx: &RenderCtx) {
        (**self).process(input, out, ctx)
    }

    fn set_param(&mut self, name: &str, value: f32) -> bool {
        (**self).set_param(name, value)
    }

    fn param(&self, name: &str) -> Option<f32> {
        (**self).param(name)
    }

    fn set_buffer(&mut self, buffer: Arc<SampleBuffer>) -> bool {
        (**self).set_buffer(buffer)
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}

/// A playable media element feeding the graph.
///
/// Transport controls default to no-ops so simple test sources only need to
/// implement `render`.
pub trait MediaSource: Send {
    fn render(&mut self, out: &mut [StereoFrame], ctx: &RenderCtx);

    fn play(&mut self) {}

    fn pause(&mut self) {}

    /// Pause and rewind to the start.
    fn stop(&mut self) {
        self.pause();
        self.seek(0.0);
    }

    fn seek(&mut self, _seconds: f64) {}

    fn set_looping(&mut self, _looping: bool) {}

    fn is_looping(&self) -> bool {
        false
    }

    fn is_playing(&self) -> bool {
        true
    }

    /// Playback position in seconds.
    fn position(&self) -> f64 {
        0.0
    }

    fn duration(&self) -> Option<f64> {
        None
    }
}
