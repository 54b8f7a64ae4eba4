//! Live parameter updates on inserted effects.
//!
//! The router only touches node-local values, never edges. Updates aimed at
//! an effect that is not enabled are dropped, not queued.

use crate::chain::{ActiveEffect, ChainController};
use crate::dsp::panner::pan_from_position;
use crate::graph::signal::{MixPair, SignalGraph};
use crate::registry::{EffectKind, ParamSet, ParamSpec, ParamTarget};

pub struct ParamRouter<'a> {
    graph: &'a mut SignalGraph,
    chain: &'a ChainController,
}

impl<'a> ParamRouter<'a> {
    pub fn new(graph: &'a mut SignalGraph, chain: &'a ChainController) -> Self {
        Self { graph, chain }
    }

    /// Set one parameter, clamped to its schema range. Returns false when the
    /// effect is not enabled or has no such parameter.
    pub fn set_param(&mut self, kind: EffectKind, name: &str, value: f32) -> bool {
        match self.chain.get(kind) {
            Some(effect) => apply_one(self.graph, effect, name, value),
            None => false,
        }
    }

    /// Set the wet share of a mixed effect; dry follows as `1 - wet`.
    pub fn set_mix(&mut self, kind: EffectKind, wet: f32) -> bool {
        match self.chain.get(kind).and_then(|effect| effect.mix) {
            Some(pair) => set_mix_pair(self.graph, pair, wet),
            None => false,
        }
    }

    /// Point the panner at a horizontal position (0 left edge, 1 right edge).
    pub fn follow_pointer(&mut self, x: f32) -> bool {
        self.set_param(EffectKind::Panner, "pan", pan_from_position(x))
    }

    pub fn apply(&mut self, kind: EffectKind, params: &ParamSet) -> bool {
        match self.chain.get(kind) {
            Some(effect) => {
                apply(self.graph, effect, params);
                true
            }
            None => false,
        }
    }

    pub fn param(&self, kind: EffectKind, name: &str) -> Option<f32> {
        read_param(self.graph, self.chain.get(kind)?, name)
    }

    /// Current value of every schema parameter of an enabled effect.
    pub fn params(&self, kind: EffectKind) -> Option<ParamSet> {
        Some(read_params(self.graph, self.chain.get(kind)?))
    }
}

/// Schema parameters read back through their target; other names fall
/// through to read-only node values such as compressor reduction.
pub(crate) fn read_param(graph: &SignalGraph, effect: &ActiveEffect, name: &str) -> Option<f32> {
    match effect.kind.param(name) {
        Some(spec) => read(graph, effect, spec),
        None => graph.param(effect.node, name),
    }
}

pub(crate) fn read_params(graph: &SignalGraph, effect: &ActiveEffect) -> ParamSet {
    effect
        .kind
        .params()
        .iter()
        .filter_map(|spec| read(graph, effect, spec).map(|v| (spec.name, v)))
        .collect()
}

pub(crate) fn apply(graph: &mut SignalGraph, effect: &ActiveEffect, params: &ParamSet) {
    for (name, value) in params.iter() {
        apply_one(graph, effect, name, value);
    }
}

fn apply_one(graph: &mut SignalGraph, effect: &ActiveEffect, name: &str, value: f32) -> bool {
    let Some(spec) = effect.kind.param(name) else {
        log::debug!(target: "router", "{} has no parameter '{}'", effect.kind, name);
        return false;
    };
    let value = spec.clamp(value);
    match spec.target {
        ParamTarget::Node => graph.set_param(effect.node, name, value),
        ParamTarget::Mix => effect
            .mix
            .map(|pair| set_mix_pair(graph, pair, value))
            .unwrap_or(false),
        ParamTarget::Output => effect
            .output
            .map(|out| graph.set_param(out, "gain", value))
            .unwrap_or(false),
    }
}

/// Both gains are written in the same call, so a render never sees a pair
/// that does not sum to one.
fn set_mix_pair(graph: &mut SignalGraph, pair: MixPair, wet: f32) -> bool {
    let wet = if wet.is_finite() { wet.clamp(0.0, 1.0) } else { 0.0 };
    let dry = 1.0 - wet;
    let dry_ok = graph.set_param(pair.dry, "gain", dry);
    let wet_ok = graph.set_param(pair.wet, "gain", wet);
    dry_ok && wet_ok
}

fn read(graph: &SignalGraph, effect: &ActiveEffect, spec: &ParamSpec) -> Option<f32> {
    match spec.target {
        ParamTarget::Node => graph.param(effect.node, spec.name),
        ParamTarget::Mix => graph.param(effect.mix?.wet, "gain"),
        ParamTarget::Output => graph.param(effect.output?, "gain"),
    }
}
