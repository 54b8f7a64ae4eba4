use std::f32::consts::TAU;

/// Waveforms a live oscillator can produce. Noise is used for drum synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Square,
    Sawtooth,
    Triangle,
    Noise,
}

impl Waveform {
    /// Index order matches the oscillator's `type` choices.
    pub fn from_index(index: usize) -> Self {
        match index {
            1 => Waveform::Square,
            2 => Waveform::Sawtooth,
            3 => Waveform::Triangle,
            _ => Waveform::Sine,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Waveform::Sine | Waveform::Noise => 0,
            Waveform::Square => 1,
            Waveform::Sawtooth => 2,
            Waveform::Triangle => 3,
        }
    }
}

/// Phase-accumulator oscillator with PolyBLEP band limiting.
pub struct Oscillator {
    waveform: Waveform,
    phase: f32,
    rng: u32,
}

impl Oscillator {
    pub fn new(waveform: Waveform) -> Self {
        Self {
            waveform,
            phase: 0.0,
            rng: 0x9E37_79B9,
        }
    }

    pub fn sine() -> Self {
        Self::new(Waveform::Sine)
    }

    pub fn noise() -> Self {
        Self::new(Waveform::Noise)
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.waveform = waveform;
    }

    #[inline]
    pub fn next_sample(&mut self, freq: f32, sample_rate: f32) -> f32 {
        let dt = (freq / sample_rate).clamp(0.0, 0.5);
        let t = self.phase;
        let out = match self.waveform {
            Waveform::Sine => (TAU * t).sin(),
            Waveform::Sawtooth => 2.0 * t - 1.0 - poly_blep(t, dt),
            Waveform::Square => square(t, dt),
            // Only the slope is discontinuous, aliasing stays low
            Waveform::Triangle => 4.0 * (t - 0.5).abs() - 1.0,
            Waveform::Noise => self.white(),
        };
        self.phase += dt;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        out
    }

    pub fn render(&mut self, destination: &mut [f32], freq: f32, sample_rate: f32) {
        for sample in destination.iter_mut() {
            *sample = self.next_sample(freq, sample_rate);
        }
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
    }

    /// xorshift32 mapped onto -1..1
    #[inline]
    fn white(&mut self) -> f32 {
        let mut x = self.rng;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.rng = x;
        (x as f32 / u32::MAX as f32) * 2.0 - 1.0
    }
}

#[inline]
fn square(t: f32, dt: f32) -> f32 {
    let naive = if t < 0.5 { 1.0 } else { -1.0 };
    let mut falling = t + 0.5;
    if falling >= 1.0 {
        falling -= 1.0;
    }
    naive + poly_blep(t, dt) - poly_blep(falling, dt)
}

#[inline]
fn poly_blep(t: f32, dt: f32) -> f32 {
    if dt <= 0.0 {
        0.0
    } else if t < dt {
        let t = t / dt;
        t + t - t * t - 1.0
    } else if t > 1.0 - dt {
        let t = (t - 1.0) / dt;
        t * t + t + t + 1.0
    } else {
        0.0
    }
}

/// Frequency after detuning by `cents` (100 cents = 1 semitone).
#[inline]
pub fn detuned(freq: f32, cents: f32) -> f32 {
    if cents == 0.0 {
        freq
    } else {
        freq * 2.0_f32.powf(cents / 1200.0)
    }
}
