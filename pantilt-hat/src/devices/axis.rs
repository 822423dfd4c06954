use std::fmt::{Display, Formatter};

use log::debug;
use tokio::time::{Duration, Instant};

use crate::devices::codec::to_pwm;
use crate::devices::{Axis, TICK_PERIOD};
use crate::utils::Range;

/// Delay (in ms) after which an unused servo is de-energized.
pub const AUTO_OFF_DELAY: u64 = 2000;
/// Maximum speed magnitude of a continuous move.
pub const MAX_SPEED: i8 = 15;

/// Snapshot of an axis: where it is, how it moves, whether its servo is energized.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AxisState {
    /// Last commanded angle (in degrees), always within the axis range.
    pub position: f64,
    /// Continuous move speed: the sign gives the direction (0 means no motion).
    pub speed: i8,
    /// Whether the servo currently receives a signal.
    pub powered: bool,
    /// When the servo will be de-energized, if powered.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub power_off_deadline: Option<Instant>,
}

/// Owns the state of one axis and decides what must be sent to its servo.
///
/// The controller never talks to the hardware itself: every operation returns what has to be
/// written, and the [`Gimbal`](crate::devices::Gimbal) does the writing.
#[derive(Clone, Debug)]
pub struct AxisController {
    axis: Axis,
    range: Range<f64>,
    auto_off_delay: Duration,
    state: AxisState,
}

impl AxisController {
    pub fn new(axis: Axis) -> Self {
        Self {
            axis,
            range: axis.get_range(),
            auto_off_delay: Duration::from_millis(AUTO_OFF_DELAY),
            state: AxisState::default(),
        }
    }

    /// Moves to the given angle (clamped to the axis range) and (re)arms the auto-off deadline.
    ///
    /// # Returns
    /// The PWM value the servo must be sent.
    pub fn move_to(&mut self, angle: f64, now: Instant) -> u16 {
        if !angle.is_nan() {
            self.state.position = self.range.clamp(angle);
        }
        self.state.powered = true;
        self.state.power_off_deadline = Some(now + self.auto_off_delay);
        to_pwm(self.state.position)
    }

    /// Sets the continuous move speed (clamped to [-15, 15]): it is consumed by [`Self::tick`].
    pub fn set_velocity(&mut self, speed: i8) {
        self.state.speed = speed.clamp(-MAX_SPEED, MAX_SPEED);
    }

    /// Stops the continuous move. The servo stays powered until its deadline.
    pub fn stop_velocity(&mut self) {
        self.state.speed = 0;
    }

    /// Integrates the speed over `dt` (a tick of 100ms moves by `speed / 10` degrees).
    ///
    /// Reaching a bound of the axis range stops the motion there.
    ///
    /// # Returns
    /// The PWM value to send when the position changed.
    pub fn tick(&mut self, dt: Duration, now: Instant) -> Option<u16> {
        if self.state.speed == 0 {
            return None;
        }

        let steps = dt.as_secs_f64() / TICK_PERIOD.as_secs_f64();
        let mut target = self.state.position + f64::from(self.state.speed) / 10.0 * steps;
        if self.range.is_at_limit(target) {
            target = self.range.clamp(target);
            self.state.speed = 0;
            debug!("{} axis reached its limit at {}", self.axis, target);
        }

        if target == self.state.position {
            return None;
        }
        Some(self.move_to(target, now))
    }

    /// De-energizes the servo once its deadline is reached.
    ///
    /// # Returns
    /// `true` when the power state changed and must be written.
    pub fn auto_off_check(&mut self, now: Instant) -> bool {
        match self.state.power_off_deadline {
            Some(deadline) if self.state.powered && now >= deadline => {
                self.state.powered = false;
                self.state.power_off_deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Stops everything: no motion, no power, no pending deadline.
    pub fn cancel(&mut self) {
        self.state.speed = 0;
        self.state.powered = false;
        self.state.power_off_deadline = None;
    }

    // ########################################
    // Setters and Getters.

    pub fn get_axis(&self) -> Axis {
        self.axis
    }

    /// Returns a copy of the axis state.
    pub fn get_state(&self) -> AxisState {
        self.state
    }

    pub fn get_position(&self) -> f64 {
        self.state.position
    }

    pub fn get_speed(&self) -> i8 {
        self.state.speed
    }

    pub fn is_powered(&self) -> bool {
        self.state.powered
    }

    pub fn get_deadline(&self) -> Option<Instant> {
        self.state.power_off_deadline
    }

    pub fn get_auto_off_delay(&self) -> Duration {
        self.auto_off_delay
    }

    /// Sets the delay before the servo is de-energized. Applies from the next move.
    pub fn set_auto_off_delay(&mut self, delay: Duration) {
        self.auto_off_delay = delay;
    }
}

impl Display for AxisController {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}={} (speed={}, powered={})",
            self.axis, self.state.position, self.state.speed, self.state.powered
        )
    }
}
