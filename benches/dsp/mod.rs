//! Benchmarks for low-level DSP primitives.

mod compressor;
mod convolver;
mod delay;
mod distortion;
mod filter;

pub use compressor::bench_compressor;
pub use convolver::bench_convolver;
pub use delay::bench_delay;
pub use distortion::bench_distortion;
pub use filter::bench_filter;
