use std::f32::consts::FRAC_PI_2;

/// Equal-power stereo panner.
///
/// At the centre both channels pass untouched. Panning left folds the right
/// channel into the left with a cos/sin law, and the mirror for the right.
#[derive(Debug, Clone, Copy, Default)]
pub struct StereoPanner {
    pan: f32,
}

impl StereoPanner {
    pub fn new(pan: f32) -> Self {
        Self {
            pan: pan.clamp(-1.0, 1.0),
        }
    }

    pub fn pan(&self) -> f32 {
        self.pan
    }

    pub fn set_pan(&mut self, pan: f32) {
        self.pan = pan.clamp(-1.0, 1.0);
    }

    #[inline]
    pub fn process(&self, left: f32, right: f32) -> (f32, f32) {
        if self.pan <= 0.0 {
            let x = (self.pan + 1.0) * FRAC_PI_2;
            (left + right * x.cos(), right * x.sin())
        } else {
            let x = self.pan * FRAC_PI_2;
            (left * x.cos(), right + left * x.sin())
        }
    }
}

/// Map a horizontal pointer position (0 = left edge, 1 = right edge) to a pan.
pub fn pan_from_position(x: f32) -> f32 {
    (x.clamp(0.0, 1.0) * 2.0 - 1.0).clamp(-1.0, 1.0)
}
