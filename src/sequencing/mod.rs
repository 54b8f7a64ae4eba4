pub mod kit;
pub mod rhythm;
pub mod trigger;

pub use kit::{Drum, RhythmKit};
pub use rhythm::{RhythmSequencer, SequencerState, Step, StepPattern, STEPS};
pub use trigger::{TriggerEvent, TriggerPlayer};
