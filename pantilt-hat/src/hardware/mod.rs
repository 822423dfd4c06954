//! Defines the boards able to drive the pan-tilt servos, and how to tell them apart.

mod pca9685;
mod pic16f1503;

use std::fmt::{Debug, Display, Formatter};

use log::debug;

use crate::devices::Axis;
use crate::errors::Error;
use crate::io::I2cBus;
pub use pca9685::PCA9685;
pub use pic16f1503::PIC16F1503;

/// Lists the pan-tilt boards this crate knows about.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    /// Pimoroni HAT: a PIC16F1503 microcontroller generates the servo signals.
    MicrocontrollerDriven,
    /// Waveshare HAT: a PCA9685 LED/PWM chip generates the servo signals.
    PwmChipDriven,
}

impl Backend {
    /// Builds the driver matching this backend, on top of the given bus.
    pub fn create_driver(self, bus: Box<dyn I2cBus>) -> Box<dyn HardwareDriver> {
        match self {
            Backend::MicrocontrollerDriven => Box::new(PIC16F1503::new(bus)),
            Backend::PwmChipDriven => Box::new(PCA9685::default(bus)),
        }
    }
}

impl Display for Backend {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::MicrocontrollerDriven => write!(f, "pimoroni"),
            Backend::PwmChipDriven => write!(f, "waveshare"),
        }
    }
}

/// Capabilities every pan-tilt board offers, whatever chip is behind.
pub trait HardwareDriver: Debug + Send + Sync {
    /// Returns the backend implemented by this driver.
    fn get_backend(&self) -> Backend;

    /// Checks whether the chip answers on the bus.
    fn probe(&mut self) -> bool;

    /// Initialises the chip (called once, before any other write).
    fn open(&mut self) -> Result<(), Error>;

    /// Puts the chip at rest and releases the bus.
    fn close(&mut self) -> Result<(), Error>;

    /// Energizes (or not) each servo.
    fn write_power_state(&mut self, pan_on: bool, tilt_on: bool) -> Result<(), Error>;

    /// Sends the pulse width (in µs) the servo of `axis` must hold.
    fn write_pwm(&mut self, axis: Axis, value: u16) -> Result<(), Error>;
}

/// Detects which board is plugged: the Pimoroni one when its microcontroller answers, the
/// Waveshare one otherwise. One-shot: there is no retry.
pub fn detect(bus: &(dyn I2cBus + 'static)) -> Backend {
    let mut microcontroller =
        Backend::MicrocontrollerDriven.create_driver(dyn_clone::clone_box(bus));
    if microcontroller.probe() {
        return Backend::MicrocontrollerDriven;
    }
    debug!("No microcontroller answered: assuming a PCA9685 based board");
    Backend::PwmChipDriven
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::bus::MockI2cBus;

    #[test]
    fn test_detect_microcontroller() {
        let mut bus = MockI2cBus::pimoroni();
        bus.open().unwrap();
        assert_eq!(detect(&bus), Backend::MicrocontrollerDriven);
    }

    #[test]
    fn test_detect_fallback() {
        let mut bus = MockI2cBus::waveshare();
        bus.open().unwrap();
        assert_eq!(detect(&bus), Backend::PwmChipDriven);

        // Nothing at all on the bus, or a bus not even opened: still no error.
        let bus = MockI2cBus::default();
        assert_eq!(detect(&bus), Backend::PwmChipDriven);
    }

    #[test]
    fn test_detect_has_no_side_effect() {
        let mut bus = MockI2cBus::pimoroni();
        bus.open().unwrap();
        detect(&bus);
        assert!(bus.get_writes().is_empty());
        // The probe shares the bus: it is still open.
        assert!(bus.is_connected());
    }

    #[test]
    fn test_create_driver() {
        let bus = MockI2cBus::pimoroni();
        let driver = Backend::MicrocontrollerDriven.create_driver(Box::new(bus.clone()));
        assert_eq!(driver.get_backend(), Backend::MicrocontrollerDriven);
        let driver = Backend::PwmChipDriven.create_driver(Box::new(bus));
        assert_eq!(driver.get_backend(), Backend::PwmChipDriven);
    }

    #[test]
    fn test_backend_display() {
        assert_eq!(Backend::MicrocontrollerDriven.to_string(), "pimoroni");
        assert_eq!(Backend::PwmChipDriven.to_string(), "waveshare");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_backend_serialize() {
        let json = serde_json::to_string(&Backend::PwmChipDriven).unwrap();
        assert_eq!(json, r#""PwmChipDriven""#);
    }
}
