//! Layered configuration: embedded defaults, then the user's file on top.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::analysis::{DEFAULT_FFT_SIZE, DEFAULT_SMOOTHING};
use crate::context::ContextSettings;
use crate::error::ConsoleError;
use crate::graph::signal::Routing;
use crate::io::ImpulseSource;
use crate::registry::{EffectKind, ParamSet};
use crate::sequencing::Drum;
use crate::viz::VizMode;

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    analyser: AnalyserConfig,
    #[serde(default)]
    chain: ChainConfig,
    #[serde(default)]
    rhythm: RhythmConfig,
    #[serde(default)]
    recorder: RecorderConfig,
    #[serde(default)]
    params: BTreeMap<String, BTreeMap<String, ParamValue>>,
}

#[derive(Debug, Deserialize, Default)]
struct AnalyserConfig {
    fft_size: Option<usize>,
    smoothing: Option<f32>,
    mode: Option<VizMode>,
}

#[derive(Debug, Deserialize, Default)]
struct ChainConfig {
    routing: Option<Routing>,
    impulse: Option<ImpulseSource>,
}

#[derive(Debug, Deserialize, Default)]
struct RhythmConfig {
    bpm: Option<f32>,
    lead_time: Option<f64>,
    kick: Option<PathBuf>,
    snare: Option<PathBuf>,
    hat: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct RecorderConfig {
    directory: Option<PathBuf>,
}

/// A number, or the label of an enumerated parameter (`type = "square"`).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ParamValue {
    Number(f32),
    Label(String),
}

#[derive(Debug)]
pub struct Config {
    file: ConfigFile,
}

impl Config {
    /// Embedded defaults merged with `<config dir>/saavyfx/config.toml`.
    pub fn load() -> Self {
        Self::load_from(user_config_path().as_deref())
    }

    /// Embedded defaults merged with the file at `path`, if it exists and
    /// parses. A broken file is logged and ignored.
    pub fn load_from(path: Option<&Path>) -> Self {
        let mut config = Self::embedded();
        let Some(path) = path else {
            return config;
        };
        if !path.exists() {
            return config;
        }
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<ConfigFile>(&contents) {
                Ok(user) => config.merge(user),
                Err(e) => {
                    log::warn!(target: "config", "ignoring malformed config {}: {}", path.display(), e)
                }
            },
            Err(e) => {
                log::warn!(target: "config", "could not read config {}: {}", path.display(), e)
            }
        }
        config
    }

    /// The defaults compiled into the binary.
    pub fn embedded() -> Self {
        match toml::from_str(DEFAULT_CONFIG) {
            Ok(file) => Config { file },
            Err(e) => {
                log::warn!(target: "config", "embedded config unusable: {}", e);
                Config {
                    file: ConfigFile::default(),
                }
            }
        }
    }

    /// Embedded defaults overlaid with `text`. Unlike [`Config::load_from`]
    /// a parse failure is returned.
    pub fn from_toml(text: &str) -> Result<Self, ConsoleError> {
        let user: ConfigFile =
            toml::from_str(text).map_err(|e| ConsoleError::Config(e.to_string()))?;
        let mut config = Self::embedded();
        config.merge(user);
        Ok(config)
    }

    fn merge(&mut self, user: ConfigFile) {
        let base = &mut self.file;
        merge_opt(&mut base.analyser.fft_size, user.analyser.fft_size);
        merge_opt(&mut base.analyser.smoothing, user.analyser.smoothing);
        merge_opt(&mut base.analyser.mode, user.analyser.mode);
        merge_opt(&mut base.chain.routing, user.chain.routing);
        merge_opt(&mut base.chain.impulse, user.chain.impulse);
        merge_opt(&mut base.rhythm.bpm, user.rhythm.bpm);
        merge_opt(&mut base.rhythm.lead_time, user.rhythm.lead_time);
        merge_opt(&mut base.rhythm.kick, user.rhythm.kick);
        merge_opt(&mut base.rhythm.snare, user.rhythm.snare);
        merge_opt(&mut base.rhythm.hat, user.rhythm.hat);
        merge_opt(&mut base.recorder.directory, user.recorder.directory);
        for (kind, values) in user.params {
            base.params.entry(kind).or_default().extend(values);
        }
    }

    /// FFT size, rounded to a power of two in the analyser's range.
    pub fn fft_size(&self) -> usize {
        self.file
            .analyser
            .fft_size
            .unwrap_or(DEFAULT_FFT_SIZE)
            .clamp(crate::analysis::Analyser::MIN_FFT_SIZE, crate::analysis::Analyser::MAX_FFT_SIZE)
            .next_power_of_two()
    }

    pub fn smoothing(&self) -> f32 {
        self.file
            .analyser
            .smoothing
            .filter(|s| s.is_finite())
            .unwrap_or(DEFAULT_SMOOTHING)
            .clamp(0.0, 1.0)
    }

    pub fn viz_mode(&self) -> VizMode {
        self.file.analyser.mode.unwrap_or_default()
    }

    pub fn routing(&self) -> Routing {
        self.file.chain.routing.unwrap_or_default()
    }

    pub fn impulse(&self) -> ImpulseSource {
        self.file.chain.impulse.clone().unwrap_or_default()
    }

    pub fn bpm(&self) -> f32 {
        self.file
            .rhythm
            .bpm
            .filter(|b| b.is_finite() && *b > 0.0)
            .unwrap_or(120.0)
    }

    pub fn lead_time(&self) -> f64 {
        self.file
            .rhythm
            .lead_time
            .filter(|t| t.is_finite() && *t >= 0.0)
            .unwrap_or(crate::sequencing::rhythm::DEFAULT_LEAD_TIME)
    }

    /// Sample file replacing the synthesized drum, if configured.
    pub fn drum_sample(&self, drum: Drum) -> Option<&Path> {
        let rhythm = &self.file.rhythm;
        match drum {
            Drum::Kick => rhythm.kick.as_deref(),
            Drum::Snare => rhythm.snare.as_deref(),
            Drum::Hat => rhythm.hat.as_deref(),
        }
    }

    pub fn recorder_directory(&self) -> PathBuf {
        self.file
            .recorder
            .directory
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Initial values for `kind` from `[params.<kind>]`. Names outside the
    /// effect's schema and unknown choice labels are dropped with a warning.
    pub fn initial_params(&self, kind: EffectKind) -> ParamSet {
        let Some(values) = self.file.params.get(kind.name()) else {
            return ParamSet::new();
        };
        let mut params = ParamSet::new();
        for (name, value) in values {
            let Some(spec) = kind.param(name) else {
                log::warn!(target: "config", "{} has no parameter {}", kind, name);
                continue;
            };
            let number = match value {
                ParamValue::Number(n) => Some(*n),
                ParamValue::Label(label) => spec.choice_index(label),
            };
            match number {
                Some(n) => params.set(name.as_str(), spec.clamp(n)),
                None => log::warn!(target: "config", "{}.{}: unusable value {:?}", kind, name, value),
            }
        }
        params
    }

    /// Effect tables in the file that name no known effect.
    pub fn unknown_effects(&self) -> Vec<&str> {
        self.file
            .params
            .keys()
            .filter(|name| name.parse::<EffectKind>().is_err())
            .map(String::as_str)
            .collect()
    }

    pub fn context_settings(&self, sample_rate: f32) -> ContextSettings {
        ContextSettings {
            sample_rate,
            routing: self.routing(),
            fft_size: self.fft_size(),
            smoothing: self.smoothing(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::embedded()
    }
}

/// `<config dir>/saavyfx`, where the user config and the log live.
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("saavyfx"))
}

fn user_config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

fn merge_opt<T>(base: &mut Option<T>, user: Option<T>) {
    if user.is_some() {
        *base = user;
    }
}
