//! Terminal side of the visualization feed: a frame scheduler ticked by the
//! event loop and a surface that holds the last drawn data.

use saavy_fx::viz::{FrameHandle, FrameScheduler, Surface};

/// One outstanding frame request at most, served by the next loop turn.
#[derive(Default)]
pub struct LoopFrames {
    next: FrameHandle,
    requested: Option<FrameHandle>,
}

impl LoopFrames {
    /// Take the pending request, if any, for this loop turn.
    pub fn due(&mut self) -> Option<FrameHandle> {
        self.requested.take()
    }
}

impl FrameScheduler for LoopFrames {
    fn request_frame(&mut self) -> FrameHandle {
        self.next = self.next.wrapping_add(1);
        self.requested = Some(self.next);
        self.next
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        if self.requested == Some(handle) {
            self.requested = None;
        }
    }
}

pub enum ScopeData {
    Blank,
    Spectrum(Vec<u8>),
    Waveform(Vec<u8>),
}

pub struct Scope {
    pub data: ScopeData,
}

impl Scope {
    pub fn new() -> Self {
        Self {
            data: ScopeData::Blank,
        }
    }
}

impl Surface for Scope {
    fn clear(&mut self) {
        self.data = ScopeData::Blank;
    }

    fn draw_spectrum(&mut self, bins: &[u8]) {
        match &mut self.data {
            ScopeData::Spectrum(buf) => {
                buf.clear();
                buf.extend_from_slice(bins);
            }
            _ => self.data = ScopeData::Spectrum(bins.to_vec()),
        }
    }

    fn draw_waveform(&mut self, samples: &[u8]) {
        match &mut self.data {
            ScopeData::Waveform(buf) => {
                buf.clear();
                buf.extend_from_slice(samples);
            }
            _ => self.data = ScopeData::Waveform(samples.to_vec()),
        }
    }
}
