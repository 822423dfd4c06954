//! Angle to PWM pulse-width conversion shared by both boards.

use crate::utils::Scalable;

/// Pulse width (in µs) matching -90°.
pub const PWM_MIN: u16 = 575;
/// Pulse width (in µs) matching +90°.
pub const PWM_MAX: u16 = 2325;

/// Converts an angle (in degrees, already clamped to its axis range) to a servo pulse width.
pub fn to_pwm(angle: f64) -> u16 {
    angle
        .scale(-90.0, 90.0, f64::from(PWM_MIN), f64::from(PWM_MAX))
        .round() as u16
}
