//! Where the reverb's impulse response comes from.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;

use crate::buffer::SampleBuffer;
use crate::dsp::reverb::ImpulsePreset;
use crate::error::ConsoleError;

/// A built-in preset or a WAV file on disk.
///
/// Deserializes from a string: a preset name, otherwise a path.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum ImpulseSource {
    Preset(ImpulsePreset),
    File(PathBuf),
}

impl ImpulseSource {
    /// Render or decode the response. Files are returned at their own rate;
    /// the convolver resamples on load.
    pub fn load(&self, sample_rate: f32) -> Result<SampleBuffer, ConsoleError> {
        match self {
            ImpulseSource::Preset(preset) => Ok(preset.render(sample_rate)),
            ImpulseSource::File(path) => {
                let buffer = super::read_wav(path)?;
                if buffer.is_empty() {
                    return Err(ConsoleError::Config(format!(
                        "impulse response {} is empty",
                        path.display()
                    )));
                }
                Ok(buffer)
            }
        }
    }
}

impl Default for ImpulseSource {
    fn default() -> Self {
        ImpulseSource::Preset(ImpulsePreset::default())
    }
}

impl From<String> for ImpulseSource {
    fn from(value: String) -> Self {
        match preset_named(&value) {
            Some(preset) => ImpulseSource::Preset(preset),
            None => ImpulseSource::File(PathBuf::from(value)),
        }
    }
}

impl FromStr for ImpulseSource {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ImpulseSource::from(s.to_string()))
    }
}

impl fmt::Display for ImpulseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImpulseSource::Preset(preset) => f.write_str(preset_name(*preset)),
            ImpulseSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

fn preset_name(preset: ImpulsePreset) -> &'static str {
    match preset {
        ImpulsePreset::Room => "room",
        ImpulsePreset::Hall => "hall",
        ImpulsePreset::Plate => "plate",
    }
}

fn preset_named(name: &str) -> Option<ImpulsePreset> {
    let name = name.trim();
    ImpulsePreset::ALL
        .into_iter()
        .find(|p| preset_name(*p).eq_ignore_ascii_case(name))
}
