//! Analog stick to cursor motion.

/// Values with magnitude below `deadzone` count as exactly zero.
pub fn apply_deadzone(value: f32, deadzone: f32) -> f32 {
    if value.abs() < deadzone {
        0.0
    } else {
        value
    }
}

/// Integrates velocity into whole pixel steps, carrying the fractional rest
/// from tick to tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MotionAccumulator {
    remainder: f64,
}

impl MotionAccumulator {
    /// Adds `velocity * dt` pixels and returns the whole part.
    pub fn advance(&mut self, velocity: f64, dt: f64) -> i32 {
        self.remainder += velocity * dt;
        let step = self.remainder.trunc();
        self.remainder -= step;
        step as i32
    }

    pub fn reset(&mut self) {
        self.remainder = 0.0;
    }
}
