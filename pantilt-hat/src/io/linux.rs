use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt::{Debug, Display, Formatter};
use std::path::Path;
use std::sync::Arc;

use i2cdev::core::I2CDevice;
use i2cdev::linux::{LinuxI2CDevice, LinuxI2CError};
use log::trace;
use parking_lot::Mutex;

use crate::errors::Error;
use crate::errors::ProtocolError::{IoException, NotInitialized};
use crate::io::I2cBus;

/// Linux userspace I2C bus (`/dev/i2c-N`).
///
/// One device handle is opened per slave address, the first time that address is used.
#[derive(Clone)]
pub struct LinuxI2c {
    path: String,
    connected: Arc<Mutex<bool>>,
    devices: Arc<Mutex<HashMap<u8, LinuxI2CDevice>>>,
}

impl Default for LinuxI2c {
    /// Default bus of the Raspberry Pi 40-pin header: `/dev/i2c-1`.
    fn default() -> Self {
        Self::new("/dev/i2c-1")
    }
}

impl LinuxI2c {
    pub fn new<P: Into<String>>(path: P) -> Self {
        Self {
            path: path.into(),
            connected: Arc::new(Mutex::new(false)),
            devices: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Returns the bus device path.
    pub fn get_path(&self) -> &str {
        &self.path
    }

    /// Runs `operation` against the device handle bound to `address`.
    fn with_device<T, F>(&self, address: u8, operation: F) -> Result<T, Error>
    where
        F: FnOnce(&mut LinuxI2CDevice) -> Result<T, LinuxI2CError>,
    {
        if !*self.connected.lock() {
            return Err(NotInitialized.into());
        }

        let mut devices = self.devices.lock();
        let device = match devices.entry(address) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let device = LinuxI2CDevice::new(&self.path, u16::from(address))
                    .map_err(to_error)?;
                entry.insert(device)
            }
        };
        operation(device).map_err(to_error)
    }
}

fn to_error(err: LinuxI2CError) -> Error {
    Error::from(IoException {
        info: err.to_string(),
    })
}

impl Debug for LinuxI2c {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut addresses: Vec<u8> = self.devices.lock().keys().copied().collect();
        addresses.sort_unstable();
        f.debug_struct("LinuxI2c")
            .field("path", &self.path)
            .field("connected", &*self.connected.lock())
            .field("addresses", &addresses)
            .finish()
    }
}

impl Display for LinuxI2c {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [path={}]", self.get_name(), self.path)
    }
}

impl I2cBus for LinuxI2c {
    fn open(&mut self) -> Result<(), Error> {
        if !Path::new(&self.path).exists() {
            return Err(std::io::Error::from(std::io::ErrorKind::NotFound).into());
        }
        *self.connected.lock() = true;
        trace!("I2C bus opened: {}", self.path);
        Ok(())
    }

    fn close(&mut self) -> Result<(), Error> {
        // Dropping the handles closes the underlying file descriptors.
        self.devices.lock().clear();
        *self.connected.lock() = false;
        trace!("I2C bus closed: {}", self.path);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        *self.connected.lock()
    }

    fn read_byte(&mut self, address: u8, register: u8) -> Result<u8, Error> {
        self.with_device(address, |device| device.smbus_read_byte_data(register))
    }

    fn read_word(&mut self, address: u8, register: u8) -> Result<u16, Error> {
        self.with_device(address, |device| device.smbus_read_word_data(register))
    }

    fn write_byte(&mut self, address: u8, register: u8, value: u8) -> Result<(), Error> {
        self.with_device(address, |device| {
            device.smbus_write_byte_data(register, value)
        })
    }

    fn write_word(&mut self, address: u8, register: u8, value: u16) -> Result<(), Error> {
        self.with_device(address, |device| {
            device.smbus_write_word_data(register, value)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_path() {
        let bus = LinuxI2c::default();
        assert_eq!(bus.get_path(), "/dev/i2c-1");
        assert!(!bus.is_connected());
    }

    #[test]
    fn test_open_missing_bus() {
        let mut bus = LinuxI2c::new("/dev/i2c-does-not-exist");
        let result = bus.open();
        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().to_string(),
            "Protocol error: I2C bus not found."
        );
        assert!(!bus.is_connected());
    }

    #[test]
    fn test_transfer_requires_open_bus() {
        let mut bus = LinuxI2c::new("/dev/i2c-1");
        let result = bus.read_word(0x15, 0x01);
        assert_eq!(
            result.unwrap_err().to_string(),
            "Protocol error: Bus has not been opened."
        );
    }

    #[test]
    fn test_display() {
        let bus = LinuxI2c::new("/dev/i2c-3");
        assert_eq!(bus.to_string(), "LinuxI2c [path=/dev/i2c-3]");
    }
}
