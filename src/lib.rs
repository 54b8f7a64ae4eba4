pub mod analysis; // Tap-point spectrum and waveform readers
pub mod buffer;
pub mod chain; // Effect enable/disable and parameter routing
pub mod config;
pub mod console;
pub mod context; // Process-wide audio context and clocks
pub mod dsp;
pub mod error;
pub mod graph; // Source -> inserts -> sink topology
pub mod host;
pub mod io;
pub mod registry; // Catalog of effect kinds and their parameters
pub mod sequencing; // Step-sequenced drum triggers
pub mod viz;

pub use console::Console;
pub use error::ConsoleError;
pub use registry::{EffectKind, FilterKind, ParamSet};

pub const MAX_BLOCK_SIZE: usize = 2048;
/// One second of delay at 192kHz.
pub const MAX_DELAY_SAMPLES: usize = 192_000;
