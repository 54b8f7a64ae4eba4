//! Decoded-file media source with play/pause/stop and looping.

use std::path::Path;
use std::sync::Arc;

use crate::buffer::SampleBuffer;
use crate::error::ConsoleError;
use crate::graph::node::{MediaSource, RenderCtx, StereoFrame};

/// A fully decoded file, resampled to the context rate at load.
pub struct WavSource {
    name: String,
    buffer: Arc<SampleBuffer>,
    /// Next frame to play
    cursor: usize,
    playing: bool,
    looping: bool,
}

impl WavSource {
    pub fn open(path: &Path, sample_rate: f32) -> Result<Self, ConsoleError> {
        let decoded = super::read_wav(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        log::info!(
            target: "io",
            "loaded {} ({:.2}s, {} Hz)",
            name,
            decoded.duration(),
            decoded.sample_rate()
        );
        Ok(Self::from_buffer(name, decoded, sample_rate))
    }

    pub fn from_buffer(name: impl Into<String>, buffer: SampleBuffer, sample_rate: f32) -> Self {
        Self {
            name: name.into(),
            buffer: Arc::new(buffer.resampled(sample_rate)),
            cursor: 0,
            playing: false,
            looping: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }
}

impl MediaSource for WavSource {
    fn render(&mut self, out: &mut [StereoFrame], _ctx: &RenderCtx) {
        let len = self.buffer.len();
        for frame in out.iter_mut() {
            if !self.playing || len == 0 {
                *frame = StereoFrame::SILENT;
                continue;
            }
            if self.cursor >= len {
                self.cursor = 0;
                if !self.looping {
                    // Ended: rewind so the next play starts over
                    self.playing = false;
                    *frame = StereoFrame::SILENT;
                    continue;
                }
            }
            *frame = self.buffer.frame(self.cursor);
            self.cursor += 1;
        }
    }

    fn play(&mut self) {
        self.playing = true;
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn seek(&mut self, seconds: f64) {
        let frame = (seconds.max(0.0) * self.buffer.sample_rate() as f64) as usize;
        self.cursor = frame.min(self.buffer.len());
    }

    fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    fn is_looping(&self) -> bool {
        self.looping
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn position(&self) -> f64 {
        self.cursor as f64 / self.buffer.sample_rate() as f64
    }

    fn duration(&self) -> Option<f64> {
        Some(self.buffer.duration())
    }
}
