//! Low-level DSP primitives used by the effect nodes.
//!
//! These work on plain `f32` samples and know nothing about the graph. The
//! node wrappers in `host` adapt them to stereo frames and named parameters.

pub mod compressor;
/// Partitioned FFT convolution for the reverb.
pub mod convolver;
/// Time-domain delay line with fractional reads.
pub mod delay;
pub mod distortion;
/// State-variable filter with five responses.
pub mod filter;
/// Oscillator waveforms and noise sources.
pub mod oscillator;
pub mod panner;
/// Schroeder network for impulse synthesis.
pub mod reverb;
