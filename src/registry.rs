//! Catalog of effect kinds, their parameter schemas and defaults.
//!
//! Every other module asks the registry what an effect is: whether it needs a
//! dry/wet pair, whether it is a generator, and which parameters it accepts.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Response of the biquad-style filter family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FilterKind {
    Lowpass,
    Highpass,
    Bandpass,
    Notch,
    Peaking,
}

impl FilterKind {
    pub const ALL: [FilterKind; 5] = [
        FilterKind::Lowpass,
        FilterKind::Highpass,
        FilterKind::Bandpass,
        FilterKind::Notch,
        FilterKind::Peaking,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterKind::Lowpass => "lowpass",
            FilterKind::Highpass => "highpass",
            FilterKind::Bandpass => "bandpass",
            FilterKind::Notch => "notch",
            FilterKind::Peaking => "peaking",
        }
    }
}

impl FromStr for FilterKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FilterKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

/// One entry of the effect catalog. Each filter type is its own kind and is
/// enabled independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EffectKind {
    Reverb,
    Compressor,
    Panner,
    Delay,
    Distortion,
    Filter(FilterKind),
    Oscillator,
}

impl EffectKind {
    pub const ALL: [EffectKind; 11] = [
        EffectKind::Reverb,
        EffectKind::Compressor,
        EffectKind::Panner,
        EffectKind::Delay,
        EffectKind::Distortion,
        EffectKind::Filter(FilterKind::Lowpass),
        EffectKind::Filter(FilterKind::Highpass),
        EffectKind::Filter(FilterKind::Bandpass),
        EffectKind::Filter(FilterKind::Notch),
        EffectKind::Filter(FilterKind::Peaking),
        EffectKind::Oscillator,
    ];

    /// Stable lowercase identifier, used in config files and logs.
    pub fn name(&self) -> &'static str {
        match self {
            EffectKind::Reverb => "reverb",
            EffectKind::Compressor => "compressor",
            EffectKind::Panner => "panner",
            EffectKind::Delay => "delay",
            EffectKind::Distortion => "distortion",
            EffectKind::Filter(filter) => filter.as_str(),
            EffectKind::Oscillator => "oscillator",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EffectKind::Reverb => "Reverb",
            EffectKind::Compressor => "Compressor",
            EffectKind::Panner => "Panner",
            EffectKind::Delay => "Delay",
            EffectKind::Distortion => "Distortion",
            EffectKind::Filter(FilterKind::Lowpass) => "Lowpass",
            EffectKind::Filter(FilterKind::Highpass) => "Highpass",
            EffectKind::Filter(FilterKind::Bandpass) => "Bandpass",
            EffectKind::Filter(FilterKind::Notch) => "Notch",
            EffectKind::Filter(FilterKind::Peaking) => "Peaking EQ",
            EffectKind::Oscillator => "Oscillator",
        }
    }

    /// Effects blended with the untouched signal through a dry/wet gain pair.
    pub fn requires_mix_pair(&self) -> bool {
        matches!(
            self,
            EffectKind::Reverb | EffectKind::Delay | EffectKind::Distortion
        )
    }

    /// Generators produce sound on their own and never take the source as input.
    pub fn is_generator(&self) -> bool {
        matches!(self, EffectKind::Oscillator)
    }

    pub fn params(&self) -> &'static [ParamSpec] {
        match self {
            EffectKind::Reverb => REVERB,
            EffectKind::Compressor => COMPRESSOR,
            EffectKind::Panner => PANNER,
            EffectKind::Delay => DELAY,
            EffectKind::Distortion => DISTORTION,
            EffectKind::Filter(FilterKind::Peaking) => PEAKING,
            EffectKind::Filter(_) => FILTER,
            EffectKind::Oscillator => OSCILLATOR,
        }
    }

    pub fn param(&self, name: &str) -> Option<&'static ParamSpec> {
        self.params().iter().find(|spec| spec.name == name)
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EffectKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EffectKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownKind(pub String);

impl fmt::Display for UnknownKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown effect kind '{}'", self.0)
    }
}

impl std::error::Error for UnknownKind {}

/// Where a parameter value lands once routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamTarget {
    /// A parameter of the effect node itself.
    Node,
    /// The wet level of the dry/wet pair.
    Mix,
    /// The gain stage after a generator.
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub min: f32,
    pub max: f32,
    pub default: f32,
    /// Non-empty for enumerated parameters; the value is an index into it.
    pub choices: &'static [&'static str],
    pub target: ParamTarget,
}

impl ParamSpec {
    const fn range(name: &'static str, min: f32, max: f32, default: f32) -> Self {
        Self {
            name,
            min,
            max,
            default,
            choices: &[],
            target: ParamTarget::Node,
        }
    }

    const fn choice(name: &'static str, choices: &'static [&'static str], last: f32) -> Self {
        Self {
            name,
            min: 0.0,
            max: last,
            default: 0.0,
            choices,
            target: ParamTarget::Node,
        }
    }

    const fn mix(default: f32) -> Self {
        Self {
            name: "mix",
            min: 0.0,
            max: 1.0,
            default,
            choices: &[],
            target: ParamTarget::Mix,
        }
    }

    const fn output(name: &'static str, default: f32) -> Self {
        Self {
            name,
            min: 0.0,
            max: 1.0,
            default,
            choices: &[],
            target: ParamTarget::Output,
        }
    }

    pub fn is_choice(&self) -> bool {
        !self.choices.is_empty()
    }

    /// Clamp into range; enumerated values snap to the nearest index.
    pub fn clamp(&self, value: f32) -> f32 {
        if !value.is_finite() {
            return self.default;
        }
        let value = value.clamp(self.min, self.max);
        if self.is_choice() {
            value.round()
        } else {
            value
        }
    }

    pub fn choice_label(&self, value: f32) -> Option<&'static str> {
        self.choices.get(self.clamp(value) as usize).copied()
    }

    pub fn choice_index(&self, label: &str) -> Option<f32> {
        self.choices
            .iter()
            .position(|c| c.eq_ignore_ascii_case(label))
            .map(|i| i as f32)
    }
}

const REVERB: &[ParamSpec] = &[ParamSpec::mix(0.5)];

const COMPRESSOR: &[ParamSpec] = &[
    ParamSpec::range("threshold", -100.0, 0.0, -24.0),
    ParamSpec::range("knee", 0.0, 40.0, 30.0),
    ParamSpec::range("ratio", 1.0, 20.0, 12.0),
    ParamSpec::range("attack", 0.0, 1.0, 0.003),
    ParamSpec::range("release", 0.0, 1.0, 0.25),
];

const PANNER: &[ParamSpec] = &[ParamSpec::range("pan", -1.0, 1.0, 0.0)];

const DELAY: &[ParamSpec] = &[
    ParamSpec::range("time", 0.0, 1.0, 0.3),
    ParamSpec::range("feedback", 0.0, 0.95, 0.4),
    ParamSpec::mix(0.3),
];

pub const OVERSAMPLE_CHOICES: &[&str] = &["none", "2x", "4x"];

const DISTORTION: &[ParamSpec] = &[
    ParamSpec::range("amount", 0.0, 100.0, 20.0),
    ParamSpec::choice("oversample", OVERSAMPLE_CHOICES, 2.0),
    ParamSpec::mix(0.5),
];

const FILTER: &[ParamSpec] = &[
    ParamSpec::range("freq", 10.0, 22_050.0, 1000.0),
    ParamSpec::range("q", 0.0001, 100.0, 1.0),
];

const PEAKING: &[ParamSpec] = &[
    ParamSpec::range("freq", 10.0, 22_050.0, 1000.0),
    ParamSpec::range("q", 0.0001, 100.0, 1.0),
    ParamSpec::range("gain", -40.0, 40.0, 0.0),
];

pub const WAVEFORM_CHOICES: &[&str] = &["sine", "square", "sawtooth", "triangle"];

const OSCILLATOR: &[ParamSpec] = &[
    ParamSpec::choice("type", WAVEFORM_CHOICES, 3.0),
    ParamSpec::range("freq", 20.0, 20_000.0, 440.0),
    ParamSpec::range("detune", -1200.0, 1200.0, 0.0),
    ParamSpec::output("gain", 0.2),
];

/// Named parameter values for one effect.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamSet {
    values: BTreeMap<String, f32>,
}

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every schema parameter of `kind` at its default.
    pub fn defaults_for(kind: EffectKind) -> Self {
        kind.params()
            .iter()
            .map(|spec| (spec.name, spec.default))
            .collect()
    }

    pub fn with(mut self, name: impl Into<String>, value: f32) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: f32) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<f32> {
        self.values.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Copy of `self` with `overrides` applied on top.
    pub fn merged(&self, overrides: &ParamSet) -> ParamSet {
        let mut out = self.clone();
        for (name, value) in overrides.iter() {
            out.set(name, value);
        }
        out
    }
}

impl<S: Into<String>> FromIterator<(S, f32)> for ParamSet {
    fn from_iter<I: IntoIterator<Item = (S, f32)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}
