//! Capture of the destination output into WAV files.
//!
//! The graph pushes every rendered frame into a lock-free ring; the recorder
//! is the single consumer. While idle it drains and drops, so the ring never
//! fills up and blocks capture when recording starts.

use std::path::{Path, PathBuf};

use rtrb::Consumer;

use crate::error::ConsoleError;
use crate::graph::node::StereoFrame;

/// Frames per buffered chunk.
const CHUNK_FRAMES: usize = 4096;

const FILE_STEM: &str = "processed-audio";

pub struct Recorder {
    stream: Consumer<StereoFrame>,
    directory: PathBuf,
    sample_rate: u32,
    /// Interleaved stereo chunks of the current take
    chunks: Vec<Vec<f32>>,
    recording: bool,
}

impl Recorder {
    pub fn new(stream: Consumer<StereoFrame>, directory: impl Into<PathBuf>, sample_rate: u32) -> Self {
        Self {
            stream,
            directory: directory.into(),
            sample_rate,
            chunks: Vec::new(),
            recording: false,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Begin a new take. Anything captured before now is discarded.
    pub fn start(&mut self) {
        self.pump();
        self.chunks.clear();
        self.recording = true;
        log::info!(target: "recorder", "recording started");
    }

    /// Move available frames off the ring. Returns how many were read.
    pub fn pump(&mut self) -> usize {
        let mut read = 0;
        while let Ok(frame) = self.stream.pop() {
            read += 1;
            if !self.recording {
                continue;
            }
            if self.chunks.last().map_or(true, |c| c.len() >= CHUNK_FRAMES * 2) {
                self.chunks.push(Vec::with_capacity(CHUNK_FRAMES * 2));
            }
            if let Some(chunk) = self.chunks.last_mut() {
                chunk.push(frame.left);
                chunk.push(frame.right);
            }
        }
        read
    }

    /// Seconds captured in the current take.
    pub fn recorded_seconds(&self) -> f64 {
        let samples: usize = self.chunks.iter().map(Vec::len).sum();
        (samples / 2) as f64 / self.sample_rate as f64
    }

    /// End the take and write it out. Returns the file written, or `None` if
    /// nothing was recording.
    pub fn stop(&mut self) -> Result<Option<PathBuf>, ConsoleError> {
        if !self.recording {
            return Ok(None);
        }
        self.pump();
        self.recording = false;

        let samples: Vec<f32> = self.chunks.drain(..).flatten().collect();
        std::fs::create_dir_all(&self.directory)?;
        let path = next_free_path(&self.directory);
        super::write_wav(&path, self.sample_rate, &samples)?;
        log::info!(
            target: "recorder",
            "wrote {} ({} frames)",
            path.display(),
            samples.len() / 2
        );
        Ok(Some(path))
    }
}

/// `processed-audio.wav`, then `processed-audio-2.wav` and so on.
fn next_free_path(directory: &Path) -> PathBuf {
    let first = directory.join(format!("{}.wav", FILE_STEM));
    if !first.exists() {
        return first;
    }
    (2..)
        .map(|n| directory.join(format!("{}-{}.wav", FILE_STEM, n)))
        .find(|p| !p.exists())
        .unwrap_or(first)
}
