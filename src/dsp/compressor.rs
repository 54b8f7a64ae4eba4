//! Feed-forward compressor with a soft knee.
//!
//! The gain computer works in decibels on the louder of the two channels. Gain
//! reduction is smoothed by one-pole attack and release filters, also in dB.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressorSettings {
    pub threshold_db: f32,
    pub knee_db: f32,
    pub ratio: f32,
    /// Seconds to reach about two thirds of a larger reduction
    pub attack: f32,
    /// Seconds to recover about two thirds of the way back
    pub release: f32,
}

impl Default for CompressorSettings {
    fn default() -> Self {
        Self {
            threshold_db: -24.0,
            knee_db: 30.0,
            ratio: 12.0,
            attack: 0.003,
            release: 0.25,
        }
    }
}

pub struct Compressor {
    pub settings: CompressorSettings,
    /// Current gain reduction in dB, always <= 0
    reduction_db: f32,
}

impl Compressor {
    pub fn new(settings: CompressorSettings) -> Self {
        Self {
            settings,
            reduction_db: 0.0,
        }
    }

    pub fn reduction_db(&self) -> f32 {
        self.reduction_db
    }

    /// Static curve: output level in dB for an input level in dB.
    pub fn curve(&self, input_db: f32) -> f32 {
        let CompressorSettings {
            threshold_db,
            knee_db,
            ratio,
            ..
        } = self.settings;
        let ratio = ratio.max(1.0);
        let overshoot = input_db - threshold_db;

        if knee_db > 0.0 && (2.0 * overshoot).abs() <= knee_db {
            let x = overshoot + knee_db * 0.5;
            input_db + (1.0 / ratio - 1.0) * x * x / (2.0 * knee_db)
        } else if 2.0 * overshoot < -knee_db {
            input_db
        } else {
            threshold_db + overshoot / ratio
        }
    }

    #[inline]
    fn coefficient(seconds: f32, sample_rate: f32) -> f32 {
        if seconds <= 0.0 {
            0.0
        } else {
            (-1.0 / (seconds * sample_rate)).exp()
        }
    }

    /// Compute the gain for one frame given its peak level.
    #[inline]
    pub fn next_gain(&mut self, peak: f32, attack_coef: f32, release_coef: f32) -> f32 {
        let input_db = if peak > 1e-6 {
            20.0 * peak.log10()
        } else {
            -120.0
        };
        let target = (self.curve(input_db) - input_db).min(0.0);
        let coef = if target < self.reduction_db {
            attack_coef
        } else {
            release_coef
        };
        self.reduction_db = target + coef * (self.reduction_db - target);
        10.0_f32.powf(self.reduction_db / 20.0)
    }

    /// Compress interleaved left/right slices in place.
    pub fn render(&mut self, left: &mut [f32], right: &mut [f32], sample_rate: f32) {
        let attack = Self::coefficient(self.settings.attack, sample_rate);
        let release = Self::coefficient(self.settings.release, sample_rate);
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let gain = self.next_gain(l.abs().max(r.abs()), attack, release);
            *l *= gain;
            *r *= gain;
        }
    }

    pub fn coefficients(&self, sample_rate: f32) -> (f32, f32) {
        (
            Self::coefficient(self.settings.attack, sample_rate),
            Self::coefficient(self.settings.release, sample_rate),
        )
    }

    pub fn reset(&mut self) {
        self.reduction_db = 0.0;
    }
}
