//! Signal graph: media source, effect inserts, master bus, analyser tap.

/// Core traits and frame type shared by all graph nodes.
pub mod node;
/// Arena-backed runtime graph with splice/rewire.
pub mod signal;

pub use node::{DspNode, MediaSource, RenderCtx, StereoFrame};
pub use signal::{GraphError, Insert, MixPair, NodeId, Routing, SignalGraph, Violation};
