// ***********
// Register map of the Pimoroni Pan-Tilt HAT firmware (PIC16F1503 microcontroller):
// https://github.com/pimoroni/pantilt-hat

use std::fmt::{Display, Formatter};

use log::debug;

use crate::devices::Axis;
use crate::errors::{Error, ProbeError};
use crate::hardware::{Backend, HardwareDriver};
use crate::io::I2cBus;

#[derive(Debug, Clone)]
pub struct PIC16F1503 {
    // Address (fixed 0x15).
    address: u8,
    bus: Box<dyn I2cBus>,
}

impl PIC16F1503 {
    pub const ADDRESS: u8 = 0x15;
    // Registers.
    const CONFIG: u8 = 0x00;
    const SERVO_1: u8 = 0x01;
    const SERVO_2: u8 = 0x03;
    // Config bits.
    const ENABLE_SERVO_1: u8 = 0x01;
    const ENABLE_SERVO_2: u8 = 0x02;

    pub fn new(bus: Box<dyn I2cBus>) -> Self {
        Self {
            address: Self::ADDRESS,
            bus,
        }
    }

    /// Reads both servo registers: any failure means there is no such microcontroller at `address`.
    pub fn probe_bus(bus: &mut dyn I2cBus, address: u8) -> Result<(), ProbeError> {
        for register in [Self::SERVO_1, Self::SERVO_2] {
            bus.read_word(address, register)
                .map_err(|err| ProbeError::NoAnswer {
                    address,
                    info: err.to_string(),
                })?;
        }
        Ok(())
    }

    /// Encodes the config byte: bit0 enables servo 1 (pan), bit1 servo 2 (tilt).
    pub fn config_byte(pan_on: bool, tilt_on: bool) -> u8 {
        let mut config = 0;
        if pan_on {
            config |= Self::ENABLE_SERVO_1;
        }
        if tilt_on {
            config |= Self::ENABLE_SERVO_2;
        }
        config
    }

    fn servo_register(axis: Axis) -> u8 {
        match axis {
            Axis::Pan => Self::SERVO_1,
            Axis::Tilt => Self::SERVO_2,
        }
    }

    /// Returns the chip address.
    pub fn get_address(&self) -> u8 {
        self.address
    }
}

impl HardwareDriver for PIC16F1503 {
    fn get_backend(&self) -> Backend {
        Backend::MicrocontrollerDriven
    }

    fn probe(&mut self) -> bool {
        match Self::probe_bus(self.bus.as_mut(), self.address) {
            Ok(()) => true,
            Err(err) => {
                debug!("{}", err);
                false
            }
        }
    }

    fn open(&mut self) -> Result<(), Error> {
        if !self.bus.is_connected() {
            self.bus.open()?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), Error> {
        self.bus.close()
    }

    fn write_power_state(&mut self, pan_on: bool, tilt_on: bool) -> Result<(), Error> {
        debug!("{} servo config: pan={} tilt={}", self, pan_on, tilt_on);
        let config = Self::config_byte(pan_on, tilt_on);
        self.bus.write_byte(self.address, Self::CONFIG, config)
    }

    fn write_pwm(&mut self, axis: Axis, value: u16) -> Result<(), Error> {
        debug!("{} set {} pwm to {}", self, axis, value);
        self.bus
            .write_word(self.address, Self::servo_register(axis), value)
    }
}

impl Display for PIC16F1503 {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "PIC16F1503 [address=0x{:02X}]", self.address)
    }
}
