//! What the UI reads from the console each frame, copied out under one lock.

use saavy_fx::{
    analysis::Analyser,
    sequencing::SequencerState,
    Console, EffectKind,
};

/// Peak and RMS of the latest tap-point window.
#[derive(Clone, Copy, Debug, Default)]
pub struct AudioStats {
    pub peak: f32,
    pub rms: f32,
}

impl AudioStats {
    pub fn from_buffer(buffer: &[f32]) -> Self {
        if buffer.is_empty() {
            return Self::default();
        }
        let peak = buffer.iter().fold(0.0f32, |acc, &x| acc.max(x.abs()));
        let rms = (buffer.iter().map(|&x| x * x).sum::<f32>() / buffer.len() as f32).sqrt();
        Self { peak, rms }
    }

    fn from_analyser(analyser: &Analyser, scratch: &mut Vec<f32>) -> Self {
        scratch.resize(analyser.fft_size(), 0.0);
        analyser.float_time_domain_data(scratch);
        Self::from_buffer(scratch)
    }
}

#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    pub sample_rate: f32,
    pub time: f64,
    pub has_source: bool,
    pub playing: bool,
    pub looping: bool,
    pub position: f64,
    pub duration: Option<f64>,
    pub active: Vec<EffectKind>,
    pub unsupported: Vec<EffectKind>,
    pub rhythm: Option<SequencerState>,
    pub running: bool,
    pub stats: AudioStats,
}

impl Snapshot {
    pub fn capture(console: &Console, scratch: &mut Vec<f32>) -> Self {
        let source = console.source();
        Self {
            sample_rate: console.sample_rate(),
            time: console.current_time(),
            has_source: source.is_some(),
            playing: source.is_some_and(|s| s.is_playing()),
            looping: source.is_some_and(|s| s.is_looping()),
            position: source.map_or(0.0, |s| s.position()),
            duration: source.and_then(|s| s.duration()),
            active: console.active_kinds(),
            unsupported: EffectKind::ALL
                .into_iter()
                .filter(|k| console.chain().is_unsupported(*k))
                .collect(),
            rhythm: Some(console.rhythm_state()),
            running: console.should_run(),
            stats: AudioStats::from_analyser(console.analyser(), scratch),
        }
    }

    pub fn is_active(&self, kind: EffectKind) -> bool {
        self.active.contains(&kind)
    }

    pub fn is_unsupported(&self, kind: EffectKind) -> bool {
        self.unsupported.contains(&kind)
    }
}
