//! Runtime signal graph.
//!
//! Nodes live in an arena addressed by generational [`NodeId`]s. Edges are
//! adjacency lists on the upstream node. Three fixed nodes are created with
//! the graph and never removed:
//!
//! ```text
//! source? ──► inserts ──► sink (master bus) ──► tap (analyser) ──► destination
//! ```
//!
//! Effects are spliced in as [`Insert`]s. Whenever the set of inserts, the
//! source, or the routing mode changes, [`SignalGraph::rewire`] rebuilds the
//! edges between the source, the inserts and the sink from scratch. Edges
//! inside an insert (effect -> wet gain) are left alone.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use rtrb::{Consumer, Producer, RingBuffer};
use serde::Deserialize;

use crate::analysis::Analyser;
use crate::buffer::SampleBuffer;
use crate::graph::node::{DspNode, MediaSource, RenderCtx, StereoFrame};
use crate::registry::EffectKind;
use crate::MAX_BLOCK_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

/// How active inserts are arranged between the source and the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Routing {
    /// Every insert hears the dry source; outputs are summed at the sink.
    #[default]
    Parallel,
    /// Inserts run in sequence, in the order they were enabled.
    Series,
}

/// Dry and wet gain nodes of a mixed effect. Their gains always sum to one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MixPair {
    pub dry: NodeId,
    pub wet: NodeId,
}

/// The nodes one active effect contributes to the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insert {
    kind: EffectKind,
    entries: Vec<NodeId>,
    exits: Vec<NodeId>,
    members: Vec<NodeId>,
}

impl Insert {
    /// A single node that is both entry and exit.
    pub fn single(kind: EffectKind, node: NodeId) -> Self {
        Self {
            kind,
            entries: vec![node],
            exits: vec![node],
            members: vec![node],
        }
    }

    /// Effect node blended through a dry/wet pair. The caller owns the
    /// internal `effect -> wet` edge.
    pub fn mixed(kind: EffectKind, effect: NodeId, pair: MixPair) -> Self {
        Self {
            kind,
            entries: vec![pair.dry, effect],
            exits: vec![pair.dry, pair.wet],
            members: vec![pair.dry, effect, pair.wet],
        }
    }

    /// A generator and its output gain. Generators have no entries.
    pub fn generator(kind: EffectKind, node: NodeId, output: NodeId) -> Self {
        Self {
            kind,
            entries: Vec::new(),
            exits: vec![output],
            members: vec![node, output],
        }
    }

    pub fn kind(&self) -> EffectKind {
        self.kind
    }

    pub fn entries(&self) -> &[NodeId] {
        &self.entries
    }

    pub fn exits(&self) -> &[NodeId] {
        &self.exits
    }

    pub fn members(&self) -> &[NodeId] {
        &self.members
    }

    pub fn is_generator(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    UnknownNode(NodeId),
    /// Nothing may flow into the source.
    IntoSource(NodeId),
    /// The destination is terminal.
    FromDestination(NodeId),
    Cycle { from: NodeId, to: NodeId },
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphError::UnknownNode(id) => write!(f, "node {} does not exist", id),
            GraphError::IntoSource(id) => write!(f, "cannot connect {} into the source", id),
            GraphError::FromDestination(id) => {
                write!(f, "cannot connect the destination to {}", id)
            }
            GraphError::Cycle { from, to } => {
                write!(f, "connecting {} -> {} would create a cycle", from, to)
            }
        }
    }
}

impl std::error::Error for GraphError {}

/// A broken topology invariant, reported by [`SignalGraph::check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    EdgeIntoSource(NodeId),
    /// The source feeds something other than the current routing prescribes.
    SourceFanOut {
        expected: Vec<NodeId>,
        actual: Vec<NodeId>,
    },
    /// The source has no route to the sink.
    SourceUnrouted,
    /// The sink hears a node that is neither the source nor an insert exit.
    StrayIntoSink(NodeId),
    /// A node reaches the sink without being fed by the source or a generator.
    Orphan(NodeId),
}

enum NodeBody {
    Source(Box<dyn MediaSource>),
    Processor(Box<dyn DspNode>),
    Bus,
    Tap,
}

struct NodeData {
    body: NodeBody,
    outputs: Vec<NodeId>,
    input: Vec<StereoFrame>,
    output: Vec<StereoFrame>,
}

impl NodeData {
    fn new(body: NodeBody) -> Self {
        Self {
            body,
            outputs: Vec::new(),
            input: vec![StereoFrame::SILENT; MAX_BLOCK_SIZE],
            output: vec![StereoFrame::SILENT; MAX_BLOCK_SIZE],
        }
    }
}

struct Slot {
    generation: u32,
    node: Option<NodeData>,
}

pub struct SignalGraph {
    slots: Vec<Slot>,
    free: Vec<u32>,
    source: Option<NodeId>,
    sink: NodeId,
    tap: NodeId,
    destination: NodeId,
    analyser: Analyser,
    inserts: Vec<Insert>,
    routing: Routing,
    order: Vec<NodeId>,
    order_dirty: bool,
    capture: Option<Producer<StereoFrame>>,
    capture_claimed: bool,
}

impl SignalGraph {
    pub fn new(routing: Routing, analyser: Analyser) -> Self {
        let placeholder = NodeId {
            index: 0,
            generation: 0,
        };
        let mut graph = Self {
            slots: Vec::new(),
            free: Vec::new(),
            source: None,
            sink: placeholder,
            tap: placeholder,
            destination: placeholder,
            analyser,
            inserts: Vec::new(),
            routing,
            order: Vec::new(),
            order_dirty: true,
            capture: None,
            capture_claimed: false,
        };
        graph.sink = graph.alloc(NodeBody::Bus);
        graph.tap = graph.alloc(NodeBody::Tap);
        graph.destination = graph.alloc(NodeBody::Bus);
        graph.link(graph.sink, graph.tap);
        graph.link(graph.tap, graph.destination);
        graph
    }

    fn alloc(&mut self, body: NodeBody) -> NodeId {
        self.order_dirty = true;
        let data = NodeData::new(body);
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(data);
            return NodeId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            node: Some(data),
        });
        NodeId {
            index,
            generation: 0,
        }
    }

    fn node(&self, id: NodeId) -> Option<&NodeData> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    /// Unchecked edge insert for the fixed output chain.
    fn link(&mut self, from: NodeId, to: NodeId) {
        if let Some(node) = self.node_mut(from) {
            node.outputs.push(to);
        }
    }

    fn live_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.node.as_ref().map(|_| NodeId {
                index: index as u32,
                generation: slot.generation,
            })
        })
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    pub fn node_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.node.is_some()).count()
    }

    pub fn sink(&self) -> NodeId {
        self.sink
    }

    pub fn tap(&self) -> NodeId {
        self.tap
    }

    pub fn destination(&self) -> NodeId {
        self.destination
    }

    pub fn source(&self) -> Option<NodeId> {
        self.source
    }

    pub fn routing(&self) -> Routing {
        self.routing
    }

    pub fn analyser(&self) -> &Analyser {
        &self.analyser
    }

    pub fn analyser_mut(&mut self) -> &mut Analyser {
        &mut self.analyser
    }

    pub fn add_node(&mut self, node: Box<dyn DspNode>) -> NodeId {
        self.alloc(NodeBody::Processor(node))
    }

    /// Remove nodes and every edge touching them. Stale ids are skipped.
    pub fn release(&mut self, ids: &[NodeId]) {
        for &id in ids {
            if id == self.sink || id == self.tap || id == self.destination {
                log::warn!(target: "graph", "refusing to release fixed node {}", id);
                continue;
            }
            if !self.contains(id) {
                continue;
            }
            self.detach(id);
            let slot = &mut self.slots[id.index as usize];
            slot.node = None;
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(id.index);
            if self.source == Some(id) {
                self.source = None;
            }
            self.order_dirty = true;
        }
    }

    /// Add an edge. Connecting an existing edge again is a no-op.
    pub fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), GraphError> {
        if !self.contains(from) {
            return Err(GraphError::UnknownNode(from));
        }
        if !self.contains(to) {
            return Err(GraphError::UnknownNode(to));
        }
        if self.source == Some(to) {
            return Err(GraphError::IntoSource(from));
        }
        if from == self.destination {
            return Err(GraphError::FromDestination(to));
        }
        if self.outputs(from).contains(&to) {
            return Ok(());
        }
        if from == to || self.has_path(to, from) {
            return Err(GraphError::Cycle { from, to });
        }
        self.link(from, to);
        self.order_dirty = true;
        Ok(())
    }

    /// Drop every outbound edge of `id`. Idempotent, and a no-op for stale ids.
    pub fn disconnect(&mut self, id: NodeId) {
        let sink = self.sink;
        let tap = self.tap;
        if id == sink || id == tap {
            return;
        }
        if let Some(node) = self.node_mut(id) {
            if !node.outputs.is_empty() {
                node.outputs.clear();
                self.order_dirty = true;
            }
        }
    }

    /// Drop every edge into or out of `id`.
    fn detach(&mut self, id: NodeId) {
        self.disconnect(id);
        for slot in &mut self.slots {
            if let Some(node) = slot.node.as_mut() {
                node.outputs.retain(|target| *target != id);
            }
        }
        self.order_dirty = true;
    }

    pub fn outputs(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.outputs.as_slice()).unwrap_or(&[])
    }

    pub fn inputs(&self, id: NodeId) -> Vec<NodeId> {
        self.live_ids()
            .filter(|from| self.outputs(*from).contains(&id))
            .collect()
    }

    pub fn has_path(&self, from: NodeId, to: NodeId) -> bool {
        if from == to {
            return self.contains(from);
        }
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([from]);
        while let Some(id) = queue.pop_front() {
            for &next in self.outputs(id) {
                if next == to {
                    return true;
                }
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        false
    }

    /// Install a new media source, replacing any previous one, and route it
    /// through the currently active inserts.
    pub fn set_source(&mut self, media: Box<dyn MediaSource>) -> NodeId {
        if let Some(old) = self.source.take() {
            self.release(&[old]);
        }
        let id = self.alloc(NodeBody::Source(media));
        self.source = Some(id);
        self.rewire();
        id
    }

    pub fn clear_source(&mut self) {
        if let Some(old) = self.source.take() {
            self.release(&[old]);
            self.rewire();
        }
    }

    pub fn source_mut(&mut self) -> Option<&mut (dyn MediaSource + 'static)> {
        let id = self.source?;
        match &mut self.node_mut(id)?.body {
            NodeBody::Source(media) => Some(media.as_mut()),
            _ => None,
        }
    }

    pub fn source_ref(&self) -> Option<&(dyn MediaSource + 'static)> {
        let id = self.source?;
        match &self.node(id)?.body {
            NodeBody::Source(media) => Some(media.as_ref()),
            _ => None,
        }
    }

    /// Add an insert to the chain and rewire. An insert of the same kind must
    /// not already be present.
    pub fn splice(&mut self, insert: Insert) {
        if self.inserts.iter().any(|i| i.kind == insert.kind) {
            log::warn!(target: "graph", "{} is already spliced, ignoring", insert.kind);
            return;
        }
        log::debug!(
            target: "graph",
            "splice {} ({} nodes)",
            insert.kind,
            insert.members.len()
        );
        self.inserts.push(insert);
        self.rewire();
    }

    /// Take an insert out of the chain, cutting every edge into or out of its
    /// nodes, then rewire. The nodes stay allocated until released.
    pub fn unsplice(&mut self, kind: EffectKind) -> Option<Insert> {
        let position = self.inserts.iter().position(|i| i.kind == kind)?;
        let insert = self.inserts.remove(position);
        for &member in &insert.members {
            self.detach(member);
        }
        log::debug!(target: "graph", "unsplice {}", kind);
        self.rewire();
        Some(insert)
    }

    pub fn inserts(&self) -> &[Insert] {
        &self.inserts
    }

    pub fn active_kinds(&self) -> Vec<EffectKind> {
        self.inserts.iter().map(|i| i.kind).collect()
    }

    pub fn set_routing(&mut self, routing: Routing) {
        if self.routing != routing {
            self.routing = routing;
            self.rewire();
        }
    }

    /// Rebuild the edges between the source, the inserts and the sink.
    ///
    /// Runs in two steps: every outbound edge of the source and of every
    /// insert exit is dropped, then the prescribed edges are added. A source
    /// with no inserts goes straight to the sink. Without a source, only
    /// generators reach the sink.
    pub fn rewire(&mut self) {
        if let Some(source) = self.source {
            self.disconnect(source);
        }
        let exits: Vec<NodeId> = self
            .inserts
            .iter()
            .flat_map(|i| i.exits.iter().copied())
            .collect();
        for exit in exits {
            self.disconnect(exit);
        }

        let links = self.planned_links();
        for (from, to) in links {
            if let Err(err) = self.connect(from, to) {
                log::warn!(target: "graph", "rewire dropped an edge: {}", err);
            }
        }
        log::trace!(
            target: "graph",
            "rewired {:?} chain of {} inserts",
            self.routing,
            self.inserts.len()
        );
    }

    fn planned_links(&self) -> Vec<(NodeId, NodeId)> {
        let sink = self.sink;
        let mut links = Vec::new();
        for insert in self.inserts.iter().filter(|i| i.is_generator()) {
            links.extend(insert.exits.iter().map(|&exit| (exit, sink)));
        }

        let chain: Vec<&Insert> = self.inserts.iter().filter(|i| !i.is_generator()).collect();
        let Some(source) = self.source else {
            return links;
        };
        if chain.is_empty() {
            links.push((source, sink));
            return links;
        }

        match self.routing {
            Routing::Parallel => {
                for insert in &chain {
                    links.extend(insert.entries.iter().map(|&entry| (source, entry)));
                    links.extend(insert.exits.iter().map(|&exit| (exit, sink)));
                }
            }
            Routing::Series => {
                let mut upstream = vec![source];
                for insert in &chain {
                    for &from in &upstream {
                        links.extend(insert.entries.iter().map(|&entry| (from, entry)));
                    }
                    upstream = insert.exits.clone();
                }
                links.extend(upstream.into_iter().map(|exit| (exit, sink)));
            }
        }
        links
    }

    /// What the source should feed under the current routing.
    fn expected_source_outputs(&self) -> Vec<NodeId> {
        let mut chain = self.inserts.iter().filter(|i| !i.is_generator());
        let mut expected: Vec<NodeId> = match self.routing {
            Routing::Parallel => chain.flat_map(|i| i.entries.iter().copied()).collect(),
            Routing::Series => chain
                .next()
                .map(|i| i.entries.clone())
                .unwrap_or_default(),
        };
        if expected.is_empty() {
            expected.push(self.sink);
        }
        expected.sort();
        expected
    }

    /// Check the topology invariants. Returns every violation found.
    pub fn check(&self) -> Result<(), Vec<Violation>> {
        let mut violations = Vec::new();

        if let Some(source) = self.source {
            for id in self.inputs(source) {
                violations.push(Violation::EdgeIntoSource(id));
            }
            let expected = self.expected_source_outputs();
            let mut actual = self.outputs(source).to_vec();
            actual.sort();
            if actual != expected {
                violations.push(Violation::SourceFanOut { expected, actual });
            }
            if !self.has_path(source, self.sink) {
                violations.push(Violation::SourceUnrouted);
            }
        }

        let exits: HashSet<NodeId> = self
            .inserts
            .iter()
            .flat_map(|i| i.exits.iter().copied())
            .collect();
        for id in self.inputs(self.sink) {
            if Some(id) != self.source && !exits.contains(&id) {
                violations.push(Violation::StrayIntoSink(id));
            }
        }

        let mut roots: Vec<NodeId> = self.source.into_iter().collect();
        for insert in self.inserts.iter().filter(|i| i.is_generator()) {
            roots.extend(insert.members.iter().copied());
        }
        let mut fed = HashSet::new();
        let mut queue: VecDeque<NodeId> = roots.iter().copied().collect();
        while let Some(id) = queue.pop_front() {
            if fed.insert(id) {
                queue.extend(self.outputs(id).iter().copied());
            }
        }
        for id in self.live_ids() {
            if id == self.sink || id == self.tap || id == self.destination {
                continue;
            }
            if !fed.contains(&id) && self.has_path(id, self.sink) {
                violations.push(Violation::Orphan(id));
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }

    pub fn set_param(&mut self, id: NodeId, name: &str, value: f32) -> bool {
        match self.node_mut(id).map(|n| &mut n.body) {
            Some(NodeBody::Processor(node)) => node.set_param(name, value),
            _ => false,
        }
    }

    pub fn param(&self, id: NodeId, name: &str) -> Option<f32> {
        match self.node(id).map(|n| &n.body) {
            Some(NodeBody::Processor(node)) => node.param(name),
            _ => None,
        }
    }

    pub fn set_buffer(&mut self, id: NodeId, buffer: Arc<SampleBuffer>) -> bool {
        match self.node_mut(id).map(|n| &mut n.body) {
            Some(NodeBody::Processor(node)) => node.set_buffer(buffer),
            _ => false,
        }
    }

    /// Claim the stream of rendered output frames. Only one consumer can be
    /// handed out per graph.
    pub fn take_output_stream(&mut self, capacity: usize) -> Option<Consumer<StereoFrame>> {
        if self.capture_claimed {
            return None;
        }
        let (producer, consumer) = RingBuffer::new(capacity.max(1));
        self.capture = Some(producer);
        self.capture_claimed = true;
        Some(consumer)
    }

    fn topological_order(&self) -> Vec<NodeId> {
        let ids: Vec<NodeId> = self.live_ids().collect();
        let mut indegree = vec![0usize; self.slots.len()];
        for &id in &ids {
            for target in self.outputs(id) {
                indegree[target.index as usize] += 1;
            }
        }
        let mut queue: VecDeque<NodeId> = ids
            .iter()
            .copied()
            .filter(|id| indegree[id.index as usize] == 0)
            .collect();
        let mut order = Vec::with_capacity(ids.len());
        while let Some(id) = queue.pop_front() {
            order.push(id);
            for target in self.outputs(id) {
                let degree = &mut indegree[target.index as usize];
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(*target);
                }
            }
        }
        order
    }

    /// Render one block into `out` (at most `MAX_BLOCK_SIZE` frames).
    ///
    /// `inject` receives the sink's input after it is cleared, so scheduled
    /// one-shots can be mixed straight into the master bus.
    pub fn render<F>(&mut self, out: &mut [StereoFrame], ctx: &RenderCtx, inject: F)
    where
        F: FnOnce(&mut [StereoFrame]),
    {
        let frames = out.len().min(MAX_BLOCK_SIZE);
        if self.order_dirty {
            self.order = self.topological_order();
            self.order_dirty = false;
        }

        let Self {
            slots,
            order,
            analyser,
            sink,
            destination,
            capture,
            ..
        } = self;

        for id in order.iter() {
            if let Some(node) = slots[id.index as usize].node.as_mut() {
                node.input[..frames].fill(StereoFrame::SILENT);
            }
        }
        if let Some(node) = slots[sink.index as usize].node.as_mut() {
            inject(&mut node.input[..frames]);
        }

        for id in order.iter() {
            let Some(node) = slots[id.index as usize].node.as_mut() else {
                continue;
            };
            let mut output = std::mem::take(&mut node.output);
            let block = &mut output[..frames];
            match &mut node.body {
                NodeBody::Source(media) => media.render(block, ctx),
                NodeBody::Processor(dsp) => dsp.process(&node.input[..frames], block, ctx),
                NodeBody::Bus => block.copy_from_slice(&node.input[..frames]),
                NodeBody::Tap => {
                    block.copy_from_slice(&node.input[..frames]);
                    analyser.write(block);
                }
            }
            let targets = std::mem::take(&mut node.outputs);

            for target in &targets {
                let Some(next) = slots
                    .get_mut(target.index as usize)
                    .filter(|slot| slot.generation == target.generation)
                    .and_then(|slot| slot.node.as_mut())
                else {
                    continue;
                };
                for (acc, frame) in next.input[..frames].iter_mut().zip(&output[..frames]) {
                    *acc += *frame;
                }
            }

            if let Some(node) = slots[id.index as usize].node.as_mut() {
                node.outputs = targets;
                node.output = output;
            }
        }

        match slots[destination.index as usize].node.as_ref() {
            Some(node) => out[..frames].copy_from_slice(&node.output[..frames]),
            None => out[..frames].fill(StereoFrame::SILENT),
        }
        if let Some(producer) = capture.as_mut() {
            for frame in &out[..frames] {
                if producer.push(*frame).is_err() {
                    break;
                }
            }
        }
    }
}
