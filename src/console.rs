//! The effects console: one audio context, its effect chain, the rhythm
//! sequencer and the tap point, behind a single handle for front-ends.

use std::path::Path;
use std::sync::Arc;

use rtrb::Consumer;

use crate::analysis::Analyser;
use crate::buffer::SampleBuffer;
use crate::chain::{router, ChainController, Enabled, ParamRouter};
use crate::config::Config;
use crate::context::{AudioContext, ContextState, Platform};
use crate::dsp::reverb::ImpulsePreset;
use crate::error::ConsoleError;
use crate::graph::node::{MediaSource, StereoFrame};
use crate::graph::signal::NodeId;
use crate::host::{NodeFactory, SoftwareFactory};
use crate::io::{ImpulseSource, WavSource};
use crate::registry::{EffectKind, ParamSet};
use crate::sequencing::{
    Drum, RhythmKit, RhythmSequencer, SequencerState, StepPattern, TriggerPlayer,
};

/// Seconds of output the capture ring holds before the recorder must drain it.
const CAPTURE_SECONDS: f32 = 2.0;

pub struct Console {
    ctx: AudioContext,
    chain: ChainController,
    sequencer: RhythmSequencer,
    kit: RhythmKit,
    triggers: TriggerPlayer,
    config: Config,
    /// Impulse for the next reverb, when not the factory's preset
    impulse: Option<Arc<SampleBuffer>>,
}

impl Console {
    pub fn new(config: Config, sample_rate: f32) -> Self {
        let impulse = config.impulse();
        let preset = match &impulse {
            ImpulseSource::Preset(preset) => *preset,
            ImpulseSource::File(_) => ImpulsePreset::default(),
        };
        let factory = Box::new(SoftwareFactory::new(preset));
        let mut console = Self::with_factory(config, sample_rate, factory);

        if let ImpulseSource::File(path) = &impulse {
            if let Err(err) = console.set_impulse(&impulse) {
                log::warn!(target: "console", "impulse {}: {}", path.display(), err);
            }
        }
        console
    }

    /// Console over an arbitrary node factory. The drum kit is synthesized,
    /// then configured samples replace individual drums.
    pub fn with_factory(config: Config, sample_rate: f32, factory: Box<dyn NodeFactory>) -> Self {
        let ctx = AudioContext::init(config.context_settings(sample_rate), factory);
        let mut kit = RhythmKit::synthesized(sample_rate);
        for drum in Drum::ALL {
            let Some(path) = config.drum_sample(drum) else {
                continue;
            };
            match crate::io::read_wav(path) {
                Ok(buffer) => kit.set(drum, Some(Arc::new(buffer))),
                Err(err) => {
                    log::warn!(target: "console", "{} sample {}: {}", drum.name(), path.display(), err)
                }
            }
        }
        for name in config.unknown_effects() {
            log::warn!(target: "config", "no effect named {}", name);
        }

        Self {
            ctx,
            chain: ChainController::new(),
            sequencer: RhythmSequencer::with_lead_time(config.lead_time()),
            kit,
            triggers: TriggerPlayer::new(),
            config,
            impulse: None,
        }
    }

    /// Release every node and close the context.
    pub fn teardown(&mut self) {
        self.chain.clear(&mut self.ctx);
        self.triggers.clear();
        self.ctx.teardown();
    }

    pub fn context(&self) -> &AudioContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut AudioContext {
        &mut self.ctx
    }

    pub fn chain(&self) -> &ChainController {
        &self.chain
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sample_rate(&self) -> f32 {
        self.ctx.sample_rate()
    }

    pub fn current_time(&self) -> f64 {
        self.ctx.current_time()
    }

    // Source

    /// Replace the source. Active effects stay and are rewired to it.
    pub fn load_source(&mut self, media: Box<dyn MediaSource>) -> NodeId {
        self.ctx.graph_mut().set_source(media)
    }

    pub fn load_file(&mut self, path: &Path) -> Result<NodeId, ConsoleError> {
        let source = WavSource::open(path, self.sample_rate())?;
        Ok(self.load_source(Box::new(source)))
    }

    pub fn has_source(&self) -> bool {
        self.ctx.graph().source().is_some()
    }

    /// Transport controls of the current source.
    pub fn transport(&mut self) -> Option<&mut (dyn MediaSource + 'static)> {
        self.ctx.graph_mut().source_mut()
    }

    pub fn source(&self) -> Option<&(dyn MediaSource + 'static)> {
        self.ctx.graph().source_ref()
    }

    pub fn is_playing(&self) -> bool {
        self.source().is_some_and(|s| s.is_playing())
    }

    // Chain

    /// Enable `kind` with its configured initial parameters.
    pub fn enable(&mut self, kind: EffectKind) -> Result<Enabled, ConsoleError> {
        let initial = self.config.initial_params(kind);
        self.enable_with(kind, &initial)
    }

    pub fn enable_with(&mut self, kind: EffectKind, initial: &ParamSet) -> Result<Enabled, ConsoleError> {
        let enabled = self.chain.enable(&mut self.ctx, kind, initial)?;
        if enabled == Enabled::Inserted && kind == EffectKind::Reverb {
            if let (Some(impulse), Some(effect)) = (&self.impulse, self.chain.get(kind)) {
                self.ctx.graph_mut().set_buffer(effect.node, Arc::clone(impulse));
            }
        }
        Ok(enabled)
    }

    pub fn disable(&mut self, kind: EffectKind) -> bool {
        self.chain.disable(&mut self.ctx, kind)
    }

    /// Flip `kind`. Returns whether it is active afterwards.
    pub fn toggle(&mut self, kind: EffectKind) -> Result<bool, ConsoleError> {
        if self.chain.is_active(kind) {
            self.disable(kind);
            return Ok(false);
        }
        let enabled = self.enable(kind)?;
        Ok(enabled != Enabled::Unavailable)
    }

    pub fn is_active(&self, kind: EffectKind) -> bool {
        self.chain.is_active(kind)
    }

    pub fn active_kinds(&self) -> Vec<EffectKind> {
        self.chain.active_kinds().collect()
    }

    fn router(&mut self) -> ParamRouter<'_> {
        ParamRouter::new(self.ctx.graph_mut(), &self.chain)
    }

    pub fn set_param(&mut self, kind: EffectKind, name: &str, value: f32) -> bool {
        self.router().set_param(kind, name, value)
    }

    pub fn set_mix(&mut self, kind: EffectKind, wet: f32) -> bool {
        self.router().set_mix(kind, wet)
    }

    /// Pan from a horizontal pointer position in `0..=1`.
    pub fn pan_follow(&mut self, x: f32) -> bool {
        self.router().follow_pointer(x)
    }

    pub fn param(&self, kind: EffectKind, name: &str) -> Option<f32> {
        router::read_param(self.ctx.graph(), self.chain.get(kind)?, name)
    }

    pub fn params(&self, kind: EffectKind) -> Option<ParamSet> {
        Some(router::read_params(self.ctx.graph(), self.chain.get(kind)?))
    }

    /// Swap the reverb's impulse response. Applies to the live reverb, if
    /// any, and to every reverb enabled later.
    pub fn set_impulse(&mut self, source: &ImpulseSource) -> Result<(), ConsoleError> {
        let buffer = Arc::new(source.load(self.sample_rate())?);
        if let Some(effect) = self.chain.get(EffectKind::Reverb) {
            self.ctx.graph_mut().set_buffer(effect.node, Arc::clone(&buffer));
        }
        log::info!(target: "console", "impulse response: {}", source);
        self.impulse = Some(buffer);
        Ok(())
    }

    // Rhythm

    /// Schedule one bar of `pattern`. Ignored while a bar is still in flight.
    pub fn play_rhythm(&mut self, pattern: &StepPattern, bpm: f32) -> bool {
        let Some(events) = self.sequencer.play(pattern, bpm, &self.kit, self.ctx.clock()) else {
            return false;
        };
        self.triggers.schedule(events);
        true
    }

    pub fn rhythm_state(&self) -> SequencerState {
        self.sequencer.state(self.current_time())
    }

    pub fn kit_mut(&mut self) -> &mut RhythmKit {
        &mut self.kit
    }

    // Tap point and capture

    pub fn analyser(&self) -> &Analyser {
        self.ctx.graph().analyser()
    }

    pub fn analyser_mut(&mut self) -> &mut Analyser {
        self.ctx.graph_mut().analyser_mut()
    }

    /// Smoothing time constant of the spectrum, clamped to 0..=1.
    pub fn set_smoothing(&mut self, smoothing: f32) -> f32 {
        let analyser = self.analyser_mut();
        analyser.set_smoothing(smoothing);
        analyser.smoothing()
    }

    /// Returns the size actually in effect after rounding.
    pub fn set_fft_size(&mut self, fft_size: usize) -> usize {
        let size = self.analyser_mut().set_fft_size(fft_size);
        log::debug!("analyser fft size {}", size);
        size
    }

    /// The destination's output stream, for a recorder. There is one; asking
    /// again is refused.
    pub fn output_stream(&mut self) -> Result<Consumer<StereoFrame>, ConsoleError> {
        let capacity = (self.sample_rate() * CAPTURE_SECONDS) as usize;
        self.ctx
            .graph_mut()
            .take_output_stream(capacity)
            .ok_or(ConsoleError::Capability("output capture"))
    }

    // Power and rendering

    /// Whether anything audible is going on: a playing source, a running
    /// generator, or drum hits in flight.
    pub fn should_run(&self) -> bool {
        self.is_playing()
            || self.chain.has_generator()
            || self.rhythm_state() == SequencerState::Scheduling
            || !self.triggers.is_idle()
    }

    /// Suspend or resume the platform to match [`Console::should_run`]. A
    /// refused transition is retried on the next call.
    pub fn update_power(&mut self, platform: &mut dyn Platform) {
        self.ctx.retry_pending(platform);
        match (self.ctx.state(), self.should_run()) {
            (ContextState::Running, false) => {
                self.ctx.suspend(platform);
            }
            (ContextState::Suspended, true) => {
                self.ctx.resume(platform);
            }
            _ => {}
        }
    }

    /// Render the next block of output.
    pub fn render(&mut self, out: &mut [StereoFrame]) {
        let sample_rate = self.ctx.sample_rate();
        let triggers = &mut self.triggers;
        self.ctx
            .render(out, |time, bus| triggers.render_into(bus, time, sample_rate));
        self.sequencer.poll(self.ctx.current_time());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::PlatformError;
    use crate::graph::node::RenderCtx;
    use crate::registry::FilterKind;

    const LOWPASS: EffectKind = EffectKind::Filter(FilterKind::Lowpass);

    struct Dc(f32);

    impl MediaSource for Dc {
        fn render(&mut self, out: &mut [StereoFrame], _ctx: &RenderCtx) {
            out.fill(StereoFrame::mono(self.0));
        }
    }

    #[derive(Default)]
    struct Device {
        suspended: bool,
        refuse: bool,
    }

    impl Platform for Device {
        fn suspend(&mut self) -> Result<(), PlatformError> {
            if self.refuse {
                return Err(PlatformError("busy".into()));
            }
            self.suspended = true;
            Ok(())
        }

        fn resume(&mut self) -> Result<(), PlatformError> {
            if self.refuse {
                return Err(PlatformError("busy".into()));
            }
            self.suspended = false;
            Ok(())
        }
    }

    fn console() -> Console {
        Console::new(Config::embedded(), 8_000.0)
    }

    #[test]
    fn test_enable_uses_configured_params() {
        let mut console = console();
        console.enable(LOWPASS).unwrap();
        assert_eq!(console.param(LOWPASS, "freq"), Some(1000.0));
        assert_eq!(console.param(LOWPASS, "q"), Some(1.0));
    }

    #[test]
    fn test_toggle_flips_state() {
        let mut console = console();
        assert!(console.toggle(EffectKind::Delay).unwrap());
        assert!(console.is_active(EffectKind::Delay));
        assert!(!console.toggle(EffectKind::Delay).unwrap());
        assert!(console.active_kinds().is_empty());
    }

    #[test]
    fn test_capture_stream_is_claimed_once() {
        let mut console = console();
        assert!(console.output_stream().is_ok());
        let err = console.output_stream().unwrap_err();
        assert!(matches!(err, ConsoleError::Capability(_)));
    }

    #[test]
    fn test_rhythm_plays_through_render() {
        let mut console = console();
        assert!(console.play_rhythm(&StepPattern::straight(), 120.0));
        assert!(!console.play_rhythm(&StepPattern::straight(), 120.0));
        assert!(console.should_run());

        // Lead time is 0.1 s; render past the first hit
        let mut out = vec![StereoFrame::SILENT; 1_600];
        console.render(&mut out);
        let peak = out.iter().fold(0.0f32, |m, f| m.max(f.peak()));
        assert!(peak > 0.01);
        assert!(out[..790].iter().all(|f| f.peak() == 0.0));
    }

    #[test]
    fn test_rhythm_window_closes_after_a_bar() {
        let mut console = console();
        console.play_rhythm(&StepPattern::half_time(), 120.0);
        let mut out = vec![StereoFrame::SILENT; 8_000];
        console.render(&mut out);
        assert_eq!(console.rhythm_state(), SequencerState::Scheduling);
        console.render(&mut out);
        assert_eq!(console.rhythm_state(), SequencerState::Idle);
        assert!(console.play_rhythm(&StepPattern::half_time(), 120.0));
    }

    #[test]
    fn test_source_reaches_output_through_chain() {
        let mut console = console();
        console.load_source(Box::new(Dc(0.5)));
        console.enable(EffectKind::Panner).unwrap();
        console.pan_follow(1.0);
        let mut out = vec![StereoFrame::SILENT; 64];
        console.render(&mut out);
        let last = out[63];
        assert!(last.left.abs() < 1e-4);
        assert!(last.right > 0.5);
    }

    #[test]
    fn test_idle_console_suspends_and_wakes() {
        let mut console = console();
        let mut device = Device::default();
        console.update_power(&mut device);
        assert!(device.suspended);
        assert_eq!(console.context().state(), ContextState::Suspended);

        console.enable(EffectKind::Oscillator).unwrap();
        console.update_power(&mut device);
        assert!(!device.suspended);
        assert_eq!(console.context().state(), ContextState::Running);
    }

    #[test]
    fn test_refused_power_change_is_retried() {
        let mut console = console();
        let mut device = Device {
            refuse: true,
            ..Device::default()
        };
        console.update_power(&mut device);
        assert_eq!(console.context().state(), ContextState::Running);
        assert_eq!(console.context().pending_state(), Some(ContextState::Suspended));

        device.refuse = false;
        console.update_power(&mut device);
        assert_eq!(console.context().state(), ContextState::Suspended);
    }

    #[test]
    fn test_impulse_swap_reaches_live_reverb() {
        let mut console = console();
        console.enable(EffectKind::Reverb).unwrap();
        let before = console.param(EffectKind::Reverb, "length").unwrap();
        console
            .set_impulse(&ImpulseSource::Preset(ImpulsePreset::Hall))
            .unwrap();
        let after = console.param(EffectKind::Reverb, "length").unwrap();
        assert!(after > before);

        console.disable(EffectKind::Reverb);
        console.enable(EffectKind::Reverb).unwrap();
        assert_eq!(console.param(EffectKind::Reverb, "length"), Some(after));
    }

    #[test]
    fn test_teardown_releases_everything() {
        let mut console = console();
        console.load_source(Box::new(Dc(0.1)));
        console.enable(EffectKind::Compressor).unwrap();
        console.teardown();
        assert!(console.active_kinds().is_empty());
        assert!(!console.has_source());
        assert_eq!(console.context().state(), ContextState::Closed);
    }

    #[test]
    fn test_analyser_settings_change_live() {
        let mut console = console();
        assert_eq!(console.analyser().fft_size(), 2048);

        assert_eq!(console.set_fft_size(4096), 4096);
        assert_eq!(console.analyser().frequency_bin_count(), 2048);
        assert_eq!(console.set_smoothing(0.3), 0.3);
        assert_eq!(console.set_smoothing(2.0), 1.0);

        // Rendering keeps working at the new size
        console.load_source(Box::new(Dc(0.5)));
        let mut out = vec![StereoFrame::SILENT; 512];
        console.render(&mut out);
        let mut wave = vec![0.0f32; 4096];
        console.analyser().float_time_domain_data(&mut wave);
        assert!((wave[4095] - 0.5).abs() < 1e-6);
    }
}
