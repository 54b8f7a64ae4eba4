//! Effect enable/disable against the signal graph.
//!
//! The controller owns the only mapping from effect kind to live nodes. Each
//! enable or disable is one splice or unsplice on the graph, so the chain is
//! never observed half rewired.

pub mod router;

use std::collections::{BTreeMap, BTreeSet};

use crate::context::AudioContext;
use crate::error::ConsoleError;
use crate::graph::node::DspNode;
use crate::graph::signal::{Insert, MixPair, NodeId, SignalGraph};
use crate::registry::{EffectKind, ParamSet};

pub use router::ParamRouter;

/// Nodes backing one enabled effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveEffect {
    pub kind: EffectKind,
    /// The effect node itself
    pub node: NodeId,
    pub mix: Option<MixPair>,
    /// Output gain of a generator
    pub output: Option<NodeId>,
    insert: Insert,
}

impl ActiveEffect {
    pub fn members(&self) -> &[NodeId] {
        self.insert.members()
    }
}

/// Outcome of [`ChainController::enable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enabled {
    Inserted,
    AlreadyActive,
    /// The host refused this kind before; nothing was done.
    Unavailable,
}

#[derive(Debug, Default)]
pub struct ChainController {
    active: BTreeMap<EffectKind, ActiveEffect>,
    unsupported: BTreeSet<EffectKind>,
}

impl ChainController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the nodes for `kind`, splice them in and apply schema defaults
    /// overlaid with `initial`.
    ///
    /// Enabling an active kind is a no-op. A kind the host cannot build fails
    /// once with [`ConsoleError::Unsupported`] and is a silent no-op after.
    pub fn enable(
        &mut self,
        ctx: &mut AudioContext,
        kind: EffectKind,
        initial: &ParamSet,
    ) -> Result<Enabled, ConsoleError> {
        if self.active.contains_key(&kind) {
            return Ok(Enabled::AlreadyActive);
        }
        if self.unsupported.contains(&kind) {
            log::debug!(target: "chain", "skipping unavailable {}", kind);
            return Ok(Enabled::Unavailable);
        }

        let factory = ctx.factory();
        let node = match factory.create(kind, ctx.sample_rate()) {
            Ok(node) => node,
            Err(err) => {
                log::warn!(target: "chain", "{}", err);
                self.unsupported.insert(kind);
                return Err(err);
            }
        };
        let mix = kind
            .requires_mix_pair()
            .then(|| (factory.gain(1.0), factory.gain(0.0)));
        let output = kind.is_generator().then(|| factory.gain(0.0));

        let effect = build(ctx.graph_mut(), kind, node, mix, output);
        let graph = ctx.graph_mut();
        graph.splice(effect.insert.clone());

        let params = ParamSet::defaults_for(kind).merged(initial);
        router::apply(graph, &effect, &params);
        log::info!(target: "chain", "enabled {}", kind);
        self.active.insert(kind, effect);
        Ok(Enabled::Inserted)
    }

    /// Unsplice and release the nodes of `kind`. Returns false if it was not
    /// active.
    pub fn disable(&mut self, ctx: &mut AudioContext, kind: EffectKind) -> bool {
        let Some(effect) = self.active.remove(&kind) else {
            return false;
        };
        let graph = ctx.graph_mut();
        graph.unsplice(kind);
        graph.release(effect.members());
        log::info!(target: "chain", "disabled {}", kind);
        true
    }

    /// Disable every active effect.
    pub fn clear(&mut self, ctx: &mut AudioContext) {
        let kinds: Vec<EffectKind> = self.active.keys().copied().collect();
        for kind in kinds {
            self.disable(ctx, kind);
        }
    }

    pub fn get(&self, kind: EffectKind) -> Option<&ActiveEffect> {
        self.active.get(&kind)
    }

    pub fn is_active(&self, kind: EffectKind) -> bool {
        self.active.contains_key(&kind)
    }

    pub fn is_unsupported(&self, kind: EffectKind) -> bool {
        self.unsupported.contains(&kind)
    }

    pub fn active_kinds(&self) -> impl Iterator<Item = EffectKind> + '_ {
        self.active.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn has_generator(&self) -> bool {
        self.active.keys().any(EffectKind::is_generator)
    }
}

/// Allocate the nodes for one effect and wire its internal edge.
fn build(
    graph: &mut SignalGraph,
    kind: EffectKind,
    node: Box<dyn DspNode>,
    mix: Option<(Box<dyn DspNode>, Box<dyn DspNode>)>,
    output: Option<Box<dyn DspNode>>,
) -> ActiveEffect {
    let node = graph.add_node(node);
    let mut effect = ActiveEffect {
        kind,
        node,
        mix: None,
        output: None,
        insert: Insert::single(kind, node),
    };

    if let Some((dry, wet)) = mix {
        let pair = MixPair {
            dry: graph.add_node(dry),
            wet: graph.add_node(wet),
        };
        link(graph, node, pair.wet);
        effect.mix = Some(pair);
        effect.insert = Insert::mixed(kind, node, pair);
    } else if let Some(gain) = output {
        let out = graph.add_node(gain);
        link(graph, node, out);
        effect.output = Some(out);
        effect.insert = Insert::generator(kind, node, out);
    }
    effect
}

fn link(graph: &mut SignalGraph, from: NodeId, to: NodeId) {
    if let Err(err) = graph.connect(from, to) {
        log::warn!(target: "chain", "internal edge dropped: {}", err);
    }
}
