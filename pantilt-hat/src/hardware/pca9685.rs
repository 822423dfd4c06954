// ***********
// All information are relative to PCA9685 datasheets:
// https://www.digikey.jp/htmldatasheets/production/2459480/0/0/1/pca9685.html

use std::fmt::{Display, Formatter};

use log::debug;

use crate::devices::Axis;
use crate::errors::{Error, HardwareError, ProbeError};
use crate::hardware::{Backend, HardwareDriver};
use crate::io::I2cBus;
use crate::utils::Scalable;

#[derive(Debug, Clone)]
pub struct PCA9685 {
    // Address (default 0x40).
    address: u8,
    // Frequency in Hz (default 50Hz).
    frequency: u16,
    bus: Box<dyn I2cBus>,
}

impl PCA9685 {
    pub const ADDRESS: u8 = 0x40;
    // Registers.
    const MODE1: u8 = 0x0;
    const PRESCALE: u8 = 0xFE;
    const BASE: u8 = 0x06;
    // Magic bits.
    const SLEEP: u8 = 0x10;
    const RESET: u8 = 0x00;
    const RESTART: u8 = 0x80;
    const AUTO_INCREMENT: u8 = 0x20;
    const FULL_OFF: u16 = 0x1000;
    // PCA9685 physical constraints.
    const MIN_FREQUENCY: u16 = 24; // Minimum frequency in Hz
    const MAX_FREQUENCY: u16 = 1526; // Maximum frequency in Hz
    const OSC_CLOCK: f32 = 25_000_000.0; // PCA9685 clock frequency
    const RESOLUTION: u32 = 4096;
    // Waveshare wiring.
    const PAN_CHANNEL: u8 = 0;
    const TILT_CHANNEL: u8 = 1;

    pub fn default(bus: Box<dyn I2cBus>) -> Self {
        PCA9685::new(bus, Self::ADDRESS)
    }

    pub fn new(bus: Box<dyn I2cBus>, address: u8) -> Self {
        Self {
            address,
            frequency: 50,
            bus,
        }
    }

    /// Returns the chip address.
    pub fn get_address(&self) -> u8 {
        self.address
    }

    /// Returns the PWM frequency (in Hz).
    pub fn get_frequency(&self) -> u16 {
        self.frequency
    }

    /// Sets the PWM frequency (in Hz) shared by all channels: from 24 to 1526 Hz.
    ///
    /// Hobby servos expect a 50Hz signal, the default used by [`HardwareDriver::open`].
    ///
    /// # Errors
    /// * `InvalidFrequency`: the chip cannot generate this frequency.
    pub fn set_frequency(&mut self, frequency: u16) -> Result<&Self, Error> {
        let prescale = Self::prescale(frequency)?;
        self.frequency = frequency;

        // The prescaler is only writable while the oscillator sleeps (datasheet 7.3.5).
        self.write_to_reg(PCA9685::MODE1, PCA9685::RESET)?;
        self.write_to_reg(PCA9685::MODE1, PCA9685::SLEEP)?;
        self.write_to_reg(PCA9685::PRESCALE, prescale)?;
        self.write_to_reg(PCA9685::MODE1, PCA9685::RESET)?;
        self.write_to_reg(PCA9685::MODE1, PCA9685::RESTART | PCA9685::AUTO_INCREMENT)?;

        Ok(self)
    }

    /// Computes the PRE_SCALE value for `frequency`: round(25MHz / (4096 * frequency)) - 1.
    fn prescale(frequency: u16) -> Result<u8, Error> {
        if !(Self::MIN_FREQUENCY..=Self::MAX_FREQUENCY).contains(&frequency) {
            return Err(HardwareError::InvalidFrequency {
                min: Self::MIN_FREQUENCY,
                max: Self::MAX_FREQUENCY,
            }
            .into());
        }
        let ticks_per_second = Self::RESOLUTION as f32 * f32::from(frequency);
        let prescale = (Self::OSC_CLOCK / ticks_per_second).round() - 1.0;
        Ok(prescale.clamp(3.0, 255.0) as u8)
    }

    pub fn write_to_reg(&mut self, register: u8, value: u8) -> Result<(), Error> {
        self.bus.write_byte(self.address, register, value)
    }

    pub fn read_from_reg(&mut self, register: u8) -> Result<u8, Error> {
        self.bus.read_byte(self.address, register)
    }

    /// Converts a pulse width (in µs) into a count of the 4096 steps of one PWM period.
    pub fn pulse_to_ticks(&self, pulse: u16) -> u16 {
        let period = 1_000_000 / u32::from(self.frequency);
        let ticks = u32::from(pulse).scale(0, period, 0, Self::RESOLUTION);
        ticks.min(Self::RESOLUTION - 1) as u16
    }

    fn channel(axis: Axis) -> u8 {
        match axis {
            Axis::Pan => Self::PAN_CHANNEL,
            Axis::Tilt => Self::TILT_CHANNEL,
        }
    }

    // 7.3.3 LED output and PWM control
    // The register corresponding to the channel (0-15) starts at BASE: ON_L, ON_H, OFF_L, OFF_H.
    // Auto-increment lets a word write fill a low/high pair.
    fn write_channel(&mut self, channel: u8, on: u16, off: u16) -> Result<(), Error> {
        let register = PCA9685::BASE + 4 * channel;
        self.bus.write_word(self.address, register, on)?;
        self.bus.write_word(self.address, register + 2, off)
    }
}

impl HardwareDriver for PCA9685 {
    fn get_backend(&self) -> Backend {
        Backend::PwmChipDriven
    }

    fn probe(&mut self) -> bool {
        match self.read_from_reg(PCA9685::MODE1) {
            Ok(_) => true,
            Err(err) => {
                let err = ProbeError::NoAnswer {
                    address: self.address,
                    info: err.to_string(),
                };
                debug!("{}", err);
                false
            }
        }
    }

    fn open(&mut self) -> Result<(), Error> {
        if !self.bus.is_connected() {
            self.bus.open()?;
        }
        self.set_frequency(self.frequency)?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), Error> {
        // Low power mode: the oscillator is off, so are the outputs.
        self.write_to_reg(PCA9685::MODE1, PCA9685::SLEEP)?;
        self.bus.close()
    }

    fn write_power_state(&mut self, pan_on: bool, tilt_on: bool) -> Result<(), Error> {
        debug!("{} servo config: pan={} tilt={}", self, pan_on, tilt_on);
        // Enabled channels get their signal back on the next pwm write.
        for (channel, enabled) in [(Self::PAN_CHANNEL, pan_on), (Self::TILT_CHANNEL, tilt_on)] {
            if !enabled {
                self.write_channel(channel, 0, PCA9685::FULL_OFF)?;
            }
        }
        Ok(())
    }

    fn write_pwm(&mut self, axis: Axis, value: u16) -> Result<(), Error> {
        let off = self.pulse_to_ticks(value);
        debug!("{} set {} pwm to {} ({} ticks)", self, axis, value, off);
        self.write_channel(Self::channel(axis), 0, off)
    }
}

impl Display for PCA9685 {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "PCA9685 [address=0x{:02X}, frequency={}Hz]",
            self.address, self.frequency
        )
    }
}
