//! Defines the I2C bus the pan-tilt hardware is connected to.

#[cfg(all(feature = "linux-i2c", target_os = "linux"))]
mod linux;

use std::any::type_name;
use std::fmt::{Debug, Display};

use dyn_clone::DynClone;

use crate::errors::Error;
#[cfg(all(feature = "linux-i2c", target_os = "linux"))]
pub use linux::LinuxI2c;

// Makes a Box<dyn I2cBus> clonable (drivers owning one are Clone).
dyn_clone::clone_trait_object!(I2cBus);

/// Defines the trait all I2C buses must implement.
///
/// Clones of a bus share the same underlying connection: closing one closes them all.
pub trait I2cBus: DynClone + Send + Sync + Debug + Display {
    /// Returns the bus name (used for Display only).
    fn get_name(&self) -> &'static str {
        type_name::<Self>().split("::").last().unwrap_or("I2cBus")
    }

    // ########################################
    // Functions specifically bound to the bus.

    /// Opens the communication (in a blocking way).
    fn open(&mut self) -> Result<(), Error>;
    /// Gracefully shuts down the communication and releases the bus.
    fn close(&mut self) -> Result<(), Error>;
    /// Checks if the communication is opened.
    fn is_connected(&self) -> bool;

    // ########################################
    // SMBus transfers

    /// Reads the byte stored in `register` of the device at `address`.
    fn read_byte(&mut self, address: u8, register: u8) -> Result<u8, Error>;
    /// Reads the (little-endian) word stored at `register` of the device at `address`.
    fn read_word(&mut self, address: u8, register: u8) -> Result<u16, Error>;
    /// Writes `value` to `register` of the device at `address`.
    fn write_byte(&mut self, address: u8, register: u8, value: u8) -> Result<(), Error>;
    /// Writes the (little-endian) word `value` at `register` of the device at `address`.
    fn write_word(&mut self, address: u8, register: u8, value: u16) -> Result<(), Error>;
}
