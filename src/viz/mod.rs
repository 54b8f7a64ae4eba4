//! Pull-based rendering of the tap point.
//!
//! The feed owns no thread. The host calls [`VisualizationFeed::on_frame`]
//! from its frame callback; the feed reads the analyser, draws, and asks the
//! scheduler for the next frame. Stopping cancels that request and clears
//! the surface.

use serde::Deserialize;

use crate::analysis::Analyser;

/// Opaque ticket for a requested frame callback.
pub type FrameHandle = u64;

/// "Call me before the next repaint" and its cancellation.
pub trait FrameScheduler {
    fn request_frame(&mut self) -> FrameHandle;
    fn cancel_frame(&mut self, handle: FrameHandle);
}

/// Where the analyser data ends up.
pub trait Surface {
    fn clear(&mut self);
    /// Byte-scaled magnitude per frequency bin.
    fn draw_spectrum(&mut self, bins: &[u8]);
    /// Byte-scaled time-domain samples, 128 is zero.
    fn draw_waveform(&mut self, samples: &[u8]);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VizMode {
    #[default]
    Spectrum,
    Waveform,
}

impl VizMode {
    pub fn toggled(self) -> Self {
        match self {
            VizMode::Spectrum => VizMode::Waveform,
            VizMode::Waveform => VizMode::Spectrum,
        }
    }
}

#[derive(Debug)]
pub struct VisualizationFeed {
    mode: VizMode,
    running: bool,
    pending: Option<FrameHandle>,
    visible: bool,
    playback_active: bool,
    data: Vec<u8>,
}

impl VisualizationFeed {
    pub fn new(mode: VizMode) -> Self {
        Self {
            mode,
            running: false,
            pending: None,
            visible: true,
            playback_active: false,
            data: Vec::new(),
        }
    }

    pub fn mode(&self) -> VizMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: VizMode) {
        self.mode = mode;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn pending_frame(&self) -> Option<FrameHandle> {
        self.pending
    }

    /// Begin the frame loop. Does nothing if it is already running.
    pub fn start(&mut self, scheduler: &mut dyn FrameScheduler) {
        if self.running {
            return;
        }
        self.running = true;
        self.pending = Some(scheduler.request_frame());
        log::debug!(target: "viz", "started ({:?})", self.mode);
    }

    /// End the frame loop, cancel the outstanding request and blank the
    /// surface.
    pub fn stop(&mut self, scheduler: &mut dyn FrameScheduler, surface: &mut dyn Surface) {
        if !self.running {
            return;
        }
        self.running = false;
        if let Some(handle) = self.pending.take() {
            scheduler.cancel_frame(handle);
        }
        surface.clear();
        log::debug!(target: "viz", "stopped");
    }

    /// Frame callback. Draws one frame and schedules the next. Frames that
    /// arrive after `stop` are ignored.
    pub fn on_frame(
        &mut self,
        analyser: &mut Analyser,
        scheduler: &mut dyn FrameScheduler,
        surface: &mut dyn Surface,
    ) {
        if !self.running {
            return;
        }
        self.pending = None;

        surface.clear();
        match self.mode {
            VizMode::Spectrum => {
                self.data.resize(analyser.frequency_bin_count(), 0);
                analyser.byte_frequency_data(&mut self.data);
                surface.draw_spectrum(&self.data);
            }
            VizMode::Waveform => {
                self.data.resize(analyser.fft_size(), 128);
                analyser.byte_time_domain_data(&mut self.data);
                surface.draw_waveform(&self.data);
            }
        }
        self.pending = Some(scheduler.request_frame());
    }

    /// Hidden surfaces stop the loop; it resumes on return if playback is
    /// still going.
    pub fn set_visible(
        &mut self,
        visible: bool,
        scheduler: &mut dyn FrameScheduler,
        surface: &mut dyn Surface,
    ) {
        self.visible = visible;
        if !visible {
            self.stop(scheduler, surface);
        } else if self.playback_active {
            self.start(scheduler);
        }
    }

    /// Playback starting runs the loop (when visible); playback ending stops it.
    pub fn set_playback_active(
        &mut self,
        active: bool,
        scheduler: &mut dyn FrameScheduler,
        surface: &mut dyn Surface,
    ) {
        if self.playback_active == active {
            return;
        }
        self.playback_active = active;
        if active && self.visible {
            self.start(scheduler);
        } else if !active {
            self.stop(scheduler, surface);
        }
    }
}

impl Default for VisualizationFeed {
    fn default() -> Self {
        Self::new(VizMode::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::StereoFrame;

    #[derive(Default)]
    struct Frames {
        next: FrameHandle,
        outstanding: Vec<FrameHandle>,
        cancelled: Vec<FrameHandle>,
    }

    impl FrameScheduler for Frames {
        fn request_frame(&mut self) -> FrameHandle {
            self.next += 1;
            self.outstanding.push(self.next);
            self.next
        }

        fn cancel_frame(&mut self, handle: FrameHandle) {
            self.outstanding.retain(|h| *h != handle);
            self.cancelled.push(handle);
        }
    }

    #[derive(Default)]
    struct Canvas {
        clears: usize,
        spectrum: Vec<u8>,
        waveform: Vec<u8>,
    }

    impl Surface for Canvas {
        fn clear(&mut self) {
            self.clears += 1;
        }

        fn draw_spectrum(&mut self, bins: &[u8]) {
            self.spectrum = bins.to_vec();
        }

        fn draw_waveform(&mut self, samples: &[u8]) {
            self.waveform = samples.to_vec();
        }
    }

    #[test]
    fn test_start_is_idempotent() {
        let mut frames = Frames::default();
        let mut feed = VisualizationFeed::default();
        feed.start(&mut frames);
        feed.start(&mut frames);
        assert!(feed.is_running());
        assert_eq!(frames.outstanding.len(), 1);
    }

    #[test]
    fn test_stop_cancels_and_clears() {
        let mut frames = Frames::default();
        let mut canvas = Canvas::default();
        let mut feed = VisualizationFeed::default();
        feed.start(&mut frames);
        let handle = feed.pending_frame().unwrap();
        feed.stop(&mut frames, &mut canvas);

        assert!(!feed.is_running());
        assert_eq!(frames.cancelled, vec![handle]);
        assert!(frames.outstanding.is_empty());
        assert_eq!(canvas.clears, 1);

        // Stopping twice clears once
        feed.stop(&mut frames, &mut canvas);
        assert_eq!(canvas.clears, 1);
    }

    #[test]
    fn test_frame_draws_and_reschedules() {
        let mut frames = Frames::default();
        let mut canvas = Canvas::default();
        let mut analyser = Analyser::new(64, 0.0);
        analyser.write(&[StereoFrame::mono(0.5); 64]);
        let mut feed = VisualizationFeed::default();
        feed.start(&mut frames);
        feed.on_frame(&mut analyser, &mut frames, &mut canvas);

        assert_eq!(canvas.spectrum.len(), 32);
        assert_eq!(frames.next, 2);
        assert_eq!(feed.pending_frame(), Some(2));

        feed.set_mode(VizMode::Waveform);
        feed.on_frame(&mut analyser, &mut frames, &mut canvas);
        assert_eq!(canvas.waveform.len(), 64);
        assert!(canvas.waveform.iter().all(|&b| b > 128));
    }

    #[test]
    fn test_late_frame_after_stop_is_ignored() {
        let mut frames = Frames::default();
        let mut canvas = Canvas::default();
        let mut analyser = Analyser::new(64, 0.0);
        let mut feed = VisualizationFeed::default();
        feed.start(&mut frames);
        feed.stop(&mut frames, &mut canvas);
        feed.on_frame(&mut analyser, &mut frames, &mut canvas);
        assert!(canvas.spectrum.is_empty());
        assert_eq!(frames.next, 1);
    }

    #[test]
    fn test_visibility_pauses_and_resumes_with_playback() {
        let mut frames = Frames::default();
        let mut canvas = Canvas::default();
        let mut feed = VisualizationFeed::default();

        feed.set_playback_active(true, &mut frames, &mut canvas);
        assert!(feed.is_running());

        feed.set_visible(false, &mut frames, &mut canvas);
        assert!(!feed.is_running());

        feed.set_visible(true, &mut frames, &mut canvas);
        assert!(feed.is_running());

        feed.set_playback_active(false, &mut frames, &mut canvas);
        feed.set_visible(false, &mut frames, &mut canvas);
        feed.set_visible(true, &mut frames, &mut canvas);
        assert!(!feed.is_running());
    }

    #[test]
    fn test_hidden_surface_does_not_start_on_playback() {
        let mut frames = Frames::default();
        let mut canvas = Canvas::default();
        let mut feed = VisualizationFeed::default();
        feed.set_visible(false, &mut frames, &mut canvas);
        feed.set_playback_active(true, &mut frames, &mut canvas);
        assert!(!feed.is_running());
        feed.set_visible(true, &mut frames, &mut canvas);
        assert!(feed.is_running());
    }
}
