//! Distortion / Waveshaping
//!
//! A waveshaper applies a transfer function to each sample. This one uses
//!
//! ```text
//! f(x) = (1 + k) * x / (1 + k * |x|)
//! ```
//!
//! with `k` the amount (0..100). At `k = 0` the curve is the identity; as `k`
//! grows it bends toward a hard sign function. Inputs outside -1..1 are held
//! at the curve's end points.
//!
//! Waveshaping creates harmonics above Nyquist. Optional 2x/4x oversampling
//! shapes linearly interpolated sub-samples and averages them back down,
//! which takes the edge off the aliasing.

/// Length of the precomputed transfer curve
pub const CURVE_LEN: usize = 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Oversample {
    #[default]
    None,
    X2,
    X4,
}

impl Oversample {
    pub fn from_index(index: usize) -> Self {
        match index {
            1 => Oversample::X2,
            2 => Oversample::X4,
            _ => Oversample::None,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Oversample::None => 0,
            Oversample::X2 => 1,
            Oversample::X4 => 2,
        }
    }

    pub fn factor(&self) -> usize {
        match self {
            Oversample::None => 1,
            Oversample::X2 => 2,
            Oversample::X4 => 4,
        }
    }
}

#[inline]
pub fn shape(sample: f32, amount: f32) -> f32 {
    let x = sample.clamp(-1.0, 1.0);
    (1.0 + amount) * x / (1.0 + amount * x.abs())
}

/// Sample the transfer function at `len` evenly spaced points over -1..1.
pub fn make_curve(amount: f32, len: usize) -> Vec<f32> {
    let len = len.max(2);
    (0..len)
        .map(|i| {
            let x = i as f32 * 2.0 / (len - 1) as f32 - 1.0;
            shape(x, amount)
        })
        .collect()
}

/// Table-driven waveshaper with optional oversampling.
pub struct Waveshaper {
    amount: f32,
    oversample: Oversample,
    curve: Vec<f32>,
    previous: f32,
}

impl Waveshaper {
    pub fn new(amount: f32) -> Self {
        Self {
            amount,
            oversample: Oversample::None,
            curve: make_curve(amount, CURVE_LEN),
            previous: 0.0,
        }
    }

    pub fn amount(&self) -> f32 {
        self.amount
    }

    /// Rebuilds the curve table; call from the control side.
    pub fn set_amount(&mut self, amount: f32) {
        if amount != self.amount {
            self.amount = amount;
            self.curve = make_curve(amount, CURVE_LEN);
        }
    }

    pub fn oversample(&self) -> Oversample {
        self.oversample
    }

    pub fn set_oversample(&mut self, oversample: Oversample) {
        self.oversample = oversample;
    }

    /// Look up the curve with linear interpolation between table points.
    #[inline]
    fn lookup(&self, sample: f32) -> f32 {
        let last = (self.curve.len() - 1) as f32;
        let pos = (sample.clamp(-1.0, 1.0) + 1.0) * 0.5 * last;
        let index = (pos as usize).min(self.curve.len() - 2);
        let frac = pos - index as f32;
        let a = self.curve[index];
        a + (self.curve[index + 1] - a) * frac
    }

    #[inline]
    pub fn process(&mut self, sample: f32) -> f32 {
        let factor = self.oversample.factor();
        let out = if factor == 1 {
            self.lookup(sample)
        } else {
            let step = 1.0 / factor as f32;
            let mut sum = 0.0;
            for i in 1..=factor {
                let t = i as f32 * step;
                sum += self.lookup(self.previous + (sample - self.previous) * t);
            }
            sum * step
        };
        self.previous = sample;
        out
    }

    pub fn render(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.process(*sample);
        }
    }

    pub fn reset(&mut self) {
        self.previous = 0.0;
    }
}
