//! The process-wide audio context.
//!
//! Owns the signal graph, the node factory and the sample clock. Created once
//! at startup and torn down at shutdown; everything else borrows it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::analysis::Analyser;
use crate::graph::node::{RenderCtx, StereoFrame};
use crate::graph::signal::{Routing, SignalGraph};
use crate::host::NodeFactory;
use crate::MAX_BLOCK_SIZE;

/// Monotonic context time in seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> f64;
}

/// Clock driven by rendered frames. Cheap to clone; clones share the count.
#[derive(Debug, Clone)]
pub struct SampleClock {
    frames: Arc<AtomicU64>,
    sample_rate: f64,
}

impl SampleClock {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            frames: Arc::new(AtomicU64::new(0)),
            sample_rate: sample_rate as f64,
        }
    }

    pub fn advance(&self, frames: usize) {
        self.frames.fetch_add(frames as u64, Ordering::Relaxed);
    }

    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }
}

impl Clock for SampleClock {
    fn now(&self) -> f64 {
        self.frames() as f64 / self.sample_rate
    }
}

/// Clock set by hand, for driving time-dependent logic without audio.
#[derive(Debug, Default)]
pub struct ManualClock {
    bits: AtomicU64,
}

impl ManualClock {
    pub fn new(seconds: f64) -> Self {
        Self {
            bits: AtomicU64::new(seconds.to_bits()),
        }
    }

    pub fn set(&self, seconds: f64) {
        self.bits.store(seconds.to_bits(), Ordering::Relaxed);
    }

    pub fn advance(&self, seconds: f64) {
        self.set(self.now() + seconds);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Running,
    Suspended,
    Closed,
}

/// The platform refused a suspend or resume request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformError(pub String);

impl fmt::Display for PlatformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "platform refused: {}", self.0)
    }
}

impl std::error::Error for PlatformError {}

/// Whatever actually starts and stops the audio device.
pub trait Platform {
    fn suspend(&mut self) -> Result<(), PlatformError>;
    fn resume(&mut self) -> Result<(), PlatformError>;
}

/// A platform with nothing to start or stop.
#[derive(Debug, Default)]
pub struct NullPlatform;

impl Platform for NullPlatform {
    fn suspend(&mut self) -> Result<(), PlatformError> {
        Ok(())
    }

    fn resume(&mut self) -> Result<(), PlatformError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContextSettings {
    pub sample_rate: f32,
    pub routing: Routing,
    pub fft_size: usize,
    pub smoothing: f32,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            sample_rate: 48_000.0,
            routing: Routing::Parallel,
            fft_size: crate::analysis::DEFAULT_FFT_SIZE,
            smoothing: crate::analysis::DEFAULT_SMOOTHING,
        }
    }
}

pub struct AudioContext {
    graph: SignalGraph,
    factory: Box<dyn NodeFactory>,
    clock: SampleClock,
    sample_rate: f32,
    state: ContextState,
    /// State the platform refused to enter; retried on the next action.
    pending: Option<ContextState>,
}

impl AudioContext {
    pub fn init(settings: ContextSettings, factory: Box<dyn NodeFactory>) -> Self {
        let analyser = Analyser::new(settings.fft_size, settings.smoothing);
        log::info!(
            target: "context",
            "audio context up at {} Hz, {:?} routing",
            settings.sample_rate,
            settings.routing
        );
        Self {
            graph: SignalGraph::new(settings.routing, analyser),
            factory,
            clock: SampleClock::new(settings.sample_rate),
            sample_rate: settings.sample_rate,
            state: ContextState::Running,
            pending: None,
        }
    }

    /// Drop the source and every insert. The fixed output chain stays.
    pub fn teardown(&mut self) {
        self.graph.clear_source();
        for kind in self.graph.active_kinds() {
            if let Some(insert) = self.graph.unsplice(kind) {
                self.graph.release(insert.members());
            }
        }
        self.state = ContextState::Closed;
        self.pending = None;
        log::info!(target: "context", "audio context closed");
    }

    pub fn graph(&self) -> &SignalGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut SignalGraph {
        &mut self.graph
    }

    pub fn factory(&self) -> &dyn NodeFactory {
        self.factory.as_ref()
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn clock(&self) -> &SampleClock {
        &self.clock
    }

    pub fn current_time(&self) -> f64 {
        self.clock.now()
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    /// Ask the platform to stop processing. A refusal is logged and retried on
    /// the next call to [`AudioContext::retry_pending`].
    pub fn suspend(&mut self, platform: &mut dyn Platform) -> bool {
        self.transition(ContextState::Suspended, platform)
    }

    pub fn resume(&mut self, platform: &mut dyn Platform) -> bool {
        self.transition(ContextState::Running, platform)
    }

    /// Re-attempt a transition the platform refused earlier.
    pub fn retry_pending(&mut self, platform: &mut dyn Platform) {
        if let Some(target) = self.pending {
            self.transition(target, platform);
        }
    }

    pub fn pending_state(&self) -> Option<ContextState> {
        self.pending
    }

    fn transition(&mut self, target: ContextState, platform: &mut dyn Platform) -> bool {
        if self.state == ContextState::Closed {
            return false;
        }
        if self.state == target {
            self.pending = None;
            return true;
        }
        let result = match target {
            ContextState::Suspended => platform.suspend(),
            _ => platform.resume(),
        };
        match result {
            Ok(()) => {
                log::debug!(target: "context", "{:?} -> {:?}", self.state, target);
                self.state = target;
                self.pending = None;
                true
            }
            Err(err) => {
                log::warn!(target: "context", "could not enter {:?}: {}", target, err);
                self.pending = Some(target);
                false
            }
        }
    }

    /// Render `out` in chunks of at most `MAX_BLOCK_SIZE`. While suspended or
    /// closed the output is silent and the clock stands still.
    ///
    /// `inject` is called once per chunk with the chunk's start time and the
    /// master bus input, for mixing in scheduled one-shots.
    pub fn render<F>(&mut self, out: &mut [StereoFrame], mut inject: F)
    where
        F: FnMut(f64, &mut [StereoFrame]),
    {
        if self.state != ContextState::Running {
            out.fill(StereoFrame::SILENT);
            return;
        }
        for chunk in out.chunks_mut(MAX_BLOCK_SIZE) {
            let time = self.clock.now();
            let ctx = RenderCtx::new(self.sample_rate, time);
            self.graph
                .render(chunk, &ctx, |bus: &mut [StereoFrame]| inject(time, bus));
            self.clock.advance(chunk.len());
        }
    }
}
