//! Console-level scenario benchmarks.
//!
//! These render the full graph (source, inserts, master bus, analyser tap)
//! the way the audio callback does.

mod render;
mod splice;

pub use render::bench_render;
pub use splice::bench_splice;
