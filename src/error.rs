//! Error type surfaced by the console.
//!
//! Topology problems never show up here: the signal graph recovers from those
//! locally. What remains is what a user has to be told about.

use crate::registry::EffectKind;

#[derive(Debug)]
pub enum ConsoleError {
    /// The node factory has no primitive for this effect kind.
    Unsupported { kind: EffectKind },
    /// A host capability (capture, decoding, ...) is missing.
    Capability(&'static str),
    /// Filesystem failure while loading or writing audio.
    Io(std::io::Error),
    /// WAV decode or encode failure.
    Wav(hound::Error),
    /// A configuration value could not be used.
    Config(String),
}

impl std::fmt::Display for ConsoleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsoleError::Unsupported { kind } => {
                write!(f, "{} is not supported by this audio host", kind.label())
            }
            ConsoleError::Capability(what) => write!(f, "{} is not supported on this system", what),
            ConsoleError::Io(err) => write!(f, "i/o error: {}", err),
            ConsoleError::Wav(err) => write!(f, "wav error: {}", err),
            ConsoleError::Config(msg) => write!(f, "invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConsoleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConsoleError::Io(err) => Some(err),
            ConsoleError::Wav(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ConsoleError {
    fn from(err: std::io::Error) -> Self {
        ConsoleError::Io(err)
    }
}

impl From<hound::Error> for ConsoleError {
    fn from(err: hound::Error) -> Self {
        ConsoleError::Wav(err)
    }
}
