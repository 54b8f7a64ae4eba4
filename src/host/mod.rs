//! Audio host capabilities: which effect primitives exist and how to build them.

pub mod nodes;

use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};

use crate::buffer::SampleBuffer;
use crate::dsp::reverb::ImpulsePreset;
use crate::error::ConsoleError;
use crate::graph::node::DspNode;
use crate::registry::EffectKind;

use nodes::{
    CompressorNode, ConvolverNode, DelayNode, DistortionNode, FilterNode, GainNode,
    OscillatorNode, PannerNode,
};

/// Builds processing nodes for effect kinds.
///
/// A host that lacks a primitive returns [`ConsoleError::Unsupported`]; the
/// chain controller remembers the refusal and stops asking.
pub trait NodeFactory: Send {
    fn create(&self, kind: EffectKind, sample_rate: f32) -> Result<Box<dyn DspNode>, ConsoleError>;

    fn gain(&self, value: f32) -> Box<dyn DspNode> {
        Box::new(GainNode::new(value))
    }
}

/// Factory backed by the built-in DSP implementations.
pub struct SoftwareFactory {
    missing: BTreeSet<EffectKind>,
    impulse: ImpulsePreset,
    default_impulse: OnceLock<Arc<SampleBuffer>>,
}

impl SoftwareFactory {
    pub fn new(impulse: ImpulsePreset) -> Self {
        Self {
            missing: BTreeSet::new(),
            impulse,
            default_impulse: OnceLock::new(),
        }
    }

    /// Pretend `kind` is not available.
    pub fn without(mut self, kind: EffectKind) -> Self {
        self.missing.insert(kind);
        self
    }

    /// The impulse a fresh reverb starts with, rendered once per factory.
    fn default_impulse(&self, sample_rate: f32) -> Arc<SampleBuffer> {
        let cached = self
            .default_impulse
            .get_or_init(|| Arc::new(self.impulse.render(sample_rate)));
        if cached.sample_rate() == sample_rate {
            Arc::clone(cached)
        } else {
            Arc::new(self.impulse.render(sample_rate))
        }
    }
}

impl Default for SoftwareFactory {
    fn default() -> Self {
        Self::new(ImpulsePreset::default())
    }
}

impl NodeFactory for SoftwareFactory {
    fn create(&self, kind: EffectKind, sample_rate: f32) -> Result<Box<dyn DspNode>, ConsoleError> {
        if self.missing.contains(&kind) {
            return Err(ConsoleError::Unsupported { kind });
        }
        let node: Box<dyn DspNode> = match kind {
            EffectKind::Reverb => {
                let mut reverb = ConvolverNode::new(sample_rate);
                reverb.load(&self.default_impulse(sample_rate));
                Box::new(reverb)
            }
            EffectKind::Compressor => Box::new(CompressorNode::new()),
            EffectKind::Panner => Box::new(PannerNode::new()),
            EffectKind::Delay => Box::new(DelayNode::new()),
            EffectKind::Distortion => Box::new(DistortionNode::new(0.0)),
            EffectKind::Filter(filter) => Box::new(FilterNode::new(filter)),
            EffectKind::Oscillator => Box::new(OscillatorNode::new()),
        };
        Ok(node)
    }
}
