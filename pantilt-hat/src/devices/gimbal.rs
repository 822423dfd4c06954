use log::{debug, info};
use tokio::time::{Duration, Instant};

use crate::devices::{Axis, AxisController, AxisState};
use crate::errors::{Error, HardwareError};
use crate::hardware::{Backend, HardwareDriver};

/// The two axes and the board driving them.
///
/// This is the only place where axis state changes are turned into hardware writes. State is
/// always updated first: a failing write never leaves the controllers out of sync with what was
/// requested.
#[derive(Debug)]
pub struct Gimbal {
    pan: AxisController,
    tilt: AxisController,
    driver: Box<dyn HardwareDriver>,
    closed: bool,
    // Set when the last power state write failed: re-sent on the next tick.
    power_dirty: bool,
}

impl Gimbal {
    /// Initialises the board and de-energizes both servos.
    pub fn open(mut driver: Box<dyn HardwareDriver>) -> Result<Self, Error> {
        driver.open()?;
        let mut gimbal = Self {
            pan: AxisController::new(Axis::Pan),
            tilt: AxisController::new(Axis::Tilt),
            driver,
            closed: false,
            power_dirty: false,
        };
        gimbal.write_power_state()?;
        Ok(gimbal)
    }

    /// Moves an axis to an absolute angle (clamped to its range).
    pub fn move_to(&mut self, axis: Axis, angle: f64, now: Instant) -> Result<(), Error> {
        self.check_open()?;
        let pwm = self.axis_mut(axis).move_to(angle, now);
        self.write_move(axis, pwm)
    }

    /// Sets the continuous move speed of an axis.
    pub fn set_velocity(&mut self, axis: Axis, speed: i8) -> Result<(), Error> {
        self.check_open()?;
        self.axis_mut(axis).set_velocity(speed);
        Ok(())
    }

    /// Stops the continuous moves of both axes.
    pub fn stop(&mut self) -> Result<(), Error> {
        self.check_open()?;
        self.pan.stop_velocity();
        self.tilt.stop_velocity();
        Ok(())
    }

    /// Advances the continuous moves of both axes by `dt`.
    ///
    /// A power state that could not be written earlier is re-sent first. Both axes are processed
    /// even if a write fails: the first error is returned.
    pub fn tick(&mut self, dt: Duration, now: Instant) -> Result<(), Error> {
        if self.closed {
            return Ok(());
        }
        let mut result = if self.power_dirty {
            self.write_power_state()
        } else {
            Ok(())
        };
        for axis in Axis::ALL {
            if let Some(pwm) = self.axis_mut(axis).tick(dt, now) {
                result = result.and(self.write_move(axis, pwm));
            }
        }
        result
    }

    /// De-energizes the servos whose deadline is reached.
    pub fn auto_off(&mut self, now: Instant) -> Result<(), Error> {
        if self.closed {
            return Ok(());
        }
        // Non short-circuiting: both axes must be checked.
        let changed = self.pan.auto_off_check(now) | self.tilt.auto_off_check(now);
        if changed {
            debug!("Auto-off: {} {}", self.pan, self.tilt);
            self.write_power_state()?;
        }
        Ok(())
    }

    /// Returns the earliest pending auto-off deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.pan.get_deadline(), self.tilt.get_deadline()) {
            (Some(pan), Some(tilt)) => Some(pan.min(tilt)),
            (pan, tilt) => pan.or(tilt),
        }
    }

    /// Stops everything, de-energizes both servos and releases the board.
    pub fn close(&mut self) -> Result<(), Error> {
        self.check_open()?;
        self.closed = true;
        self.pan.cancel();
        self.tilt.cancel();

        // Release the board even when the last power state could not be written.
        let result = self.write_power_state();
        let closed = self.driver.close();
        info!("{} pan-tilt board closed", self.driver.get_backend());
        result.and(closed)
    }

    // ########################################
    // Setters and Getters.

    pub fn get_backend(&self) -> Backend {
        self.driver.get_backend()
    }

    pub fn get_axis(&self, axis: Axis) -> &AxisController {
        match axis {
            Axis::Pan => &self.pan,
            Axis::Tilt => &self.tilt,
        }
    }

    pub fn get_state(&self, axis: Axis) -> AxisState {
        self.get_axis(axis).get_state()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Checks whether the hardware may not match the power state of the axes.
    pub fn is_power_dirty(&self) -> bool {
        self.power_dirty
    }

    pub fn get_auto_off_delay(&self) -> Duration {
        self.pan.get_auto_off_delay()
    }

    pub fn set_auto_off_delay(&mut self, delay: Duration) {
        self.pan.set_auto_off_delay(delay);
        self.tilt.set_auto_off_delay(delay);
    }

    // ########################################
    // Internals.

    fn axis_mut(&mut self, axis: Axis) -> &mut AxisController {
        match axis {
            Axis::Pan => &mut self.pan,
            Axis::Tilt => &mut self.tilt,
        }
    }

    fn check_open(&self) -> Result<(), Error> {
        if self.closed {
            return Err(HardwareError::DeviceClosed.into());
        }
        Ok(())
    }

    fn write_power_state(&mut self) -> Result<(), Error> {
        let result = self
            .driver
            .write_power_state(self.pan.is_powered(), self.tilt.is_powered());
        self.power_dirty = result.is_err();
        result
    }

    fn write_move(&mut self, axis: Axis, pwm: u16) -> Result<(), Error> {
        self.write_power_state()?;
        self.driver.write_pwm(axis, pwm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::TICK_PERIOD;
    use crate::hardware::PIC16F1503;
    use crate::io::I2cBus;
    use crate::mocks::bus::MockI2cBus;

    fn _setup_gimbal() -> (MockI2cBus, Gimbal) {
        let bus = MockI2cBus::pimoroni();
        let gimbal = Gimbal::open(Box::new(PIC16F1503::new(Box::new(bus.clone())))).unwrap();
        (bus, gimbal)
    }

    #[test]
    fn test_open() {
        let (bus, gimbal) = _setup_gimbal();
        assert!(bus.is_connected());
        assert_eq!(gimbal.get_backend(), Backend::MicrocontrollerDriven);
        assert_eq!(bus.get_writes_to(0x15, 0x00), vec![0x00]);
        assert!(!gimbal.is_closed());
        assert_eq!(gimbal.next_deadline(), None);
    }

    #[test]
    fn test_move_to() {
        let (bus, mut gimbal) = _setup_gimbal();
        let now = Instant::now();
        gimbal.move_to(Axis::Pan, 45.0, now).unwrap();
        gimbal.move_to(Axis::Tilt, -100.0, now).unwrap();
        assert_eq!(bus.get_writes_to(0x15, 0x00), vec![0x00, 0x01, 0x03]);
        assert_eq!(bus.get_register(0x15, 0x01), Some(1888));
        assert_eq!(bus.get_register(0x15, 0x03), Some(672));
        assert_eq!(gimbal.get_state(Axis::Tilt).position, -80.0);
    }

    #[test]
    fn test_move_to_bus_failure() {
        let (bus, mut gimbal) = _setup_gimbal();
        bus.set_fail_writes(true);
        let now = Instant::now();
        assert!(gimbal.move_to(Axis::Pan, 30.0, now).is_err());
        // The state is updated anyway.
        assert_eq!(gimbal.get_state(Axis::Pan).position, 30.0);
        assert_eq!(
            gimbal.next_deadline(),
            Some(now + Duration::from_millis(2000))
        );
    }

    #[test]
    fn test_tick() {
        let (bus, mut gimbal) = _setup_gimbal();
        let now = Instant::now();
        gimbal.set_velocity(Axis::Pan, 10).unwrap();
        gimbal.set_velocity(Axis::Tilt, -5).unwrap();
        gimbal.tick(TICK_PERIOD, now).unwrap();
        assert_eq!(gimbal.get_state(Axis::Pan).position, 1.0);
        assert_eq!(gimbal.get_state(Axis::Tilt).position, -0.5);
        assert_eq!(bus.get_register(0x15, 0x01), Some(1460));
        assert_eq!(bus.get_writes_to(0x15, 0x00), vec![0x00, 0x01, 0x03]);
    }

    #[test]
    fn test_tick_keeps_going_after_failure() {
        let (bus, mut gimbal) = _setup_gimbal();
        gimbal.set_velocity(Axis::Pan, 10).unwrap();
        gimbal.set_velocity(Axis::Tilt, 10).unwrap();
        bus.set_fail_writes(true);
        assert!(gimbal.tick(TICK_PERIOD, Instant::now()).is_err());
        assert_eq!(gimbal.get_state(Axis::Pan).position, 1.0);
        assert_eq!(gimbal.get_state(Axis::Tilt).position, 1.0);
    }

    #[test]
    fn test_auto_off() {
        let (bus, mut gimbal) = _setup_gimbal();
        let now = Instant::now();
        gimbal.move_to(Axis::Pan, 10.0, now).unwrap();
        let later = now + Duration::from_millis(500);
        gimbal.move_to(Axis::Tilt, 10.0, later).unwrap();
        assert_eq!(
            gimbal.next_deadline(),
            Some(now + Duration::from_millis(2000))
        );

        gimbal.auto_off(now + Duration::from_millis(2000)).unwrap();
        assert!(!gimbal.get_state(Axis::Pan).powered);
        assert!(gimbal.get_state(Axis::Tilt).powered);
        assert_eq!(
            gimbal.next_deadline(),
            Some(later + Duration::from_millis(2000))
        );

        // Nothing to do: no write.
        gimbal.auto_off(now + Duration::from_millis(2100)).unwrap();
        gimbal.auto_off(later + Duration::from_millis(2000)).unwrap();
        assert_eq!(
            bus.get_writes_to(0x15, 0x00),
            vec![0x00, 0x01, 0x03, 0x02, 0x00]
        );
        assert_eq!(gimbal.next_deadline(), None);
    }

    #[test]
    fn test_auto_off_retried_after_bus_failure() {
        let (bus, mut gimbal) = _setup_gimbal();
        let now = Instant::now();
        gimbal.move_to(Axis::Pan, 10.0, now).unwrap();

        bus.set_fail_writes(true);
        let deadline = now + Duration::from_millis(2000);
        assert!(gimbal.auto_off(deadline).is_err());
        assert!(!gimbal.get_state(Axis::Pan).powered);
        assert!(gimbal.is_power_dirty());

        // Still failing: kept for the next tick.
        assert!(gimbal.tick(TICK_PERIOD, deadline).is_err());
        assert!(gimbal.is_power_dirty());

        bus.set_fail_writes(false);
        gimbal.tick(TICK_PERIOD, deadline + TICK_PERIOD).unwrap();
        assert!(!gimbal.is_power_dirty());
        assert_eq!(bus.get_writes_to(0x15, 0x00), vec![0x00, 0x01, 0x00]);

        // Nothing left to re-send.
        gimbal.tick(TICK_PERIOD, deadline + TICK_PERIOD * 2).unwrap();
        assert_eq!(bus.get_writes_to(0x15, 0x00), vec![0x00, 0x01, 0x00]);
    }

    #[test]
    fn test_stop() {
        let (bus, mut gimbal) = _setup_gimbal();
        gimbal.set_velocity(Axis::Pan, 3).unwrap();
        bus.clear_writes();
        gimbal.stop().unwrap();
        gimbal.stop().unwrap();
        assert_eq!(gimbal.get_state(Axis::Pan).speed, 0);
        assert!(bus.get_writes().is_empty());
    }

    #[test]
    fn test_close() {
        let (bus, mut gimbal) = _setup_gimbal();
        let now = Instant::now();
        gimbal.move_to(Axis::Pan, 10.0, now).unwrap();
        gimbal.set_velocity(Axis::Tilt, 3).unwrap();
        gimbal.close().unwrap();

        assert!(gimbal.is_closed());
        assert!(!bus.is_connected());
        assert_eq!(bus.get_writes_to(0x15, 0x00), vec![0x00, 0x01, 0x00]);
        assert_eq!(gimbal.next_deadline(), None);
        assert_eq!(gimbal.get_state(Axis::Tilt).speed, 0);

        let err = gimbal.move_to(Axis::Pan, 0.0, now).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Hardware error: The pan-tilt device has been closed."
        );
        assert!(gimbal.set_velocity(Axis::Pan, 1).is_err());
        assert!(gimbal.stop().is_err());
        assert!(gimbal.close().is_err());
        assert!(gimbal.tick(TICK_PERIOD, now).is_ok());
        assert!(gimbal.auto_off(now).is_ok());
    }

    #[test]
    fn test_auto_off_delay() {
        let (_, mut gimbal) = _setup_gimbal();
        gimbal.set_auto_off_delay(Duration::from_millis(300));
        assert_eq!(gimbal.get_auto_off_delay(), Duration::from_millis(300));
        let now = Instant::now();
        gimbal.move_to(Axis::Tilt, 5.0, now).unwrap();
        assert_eq!(
            gimbal.next_deadline(),
            Some(now + Duration::from_millis(300))
        );
    }
}
