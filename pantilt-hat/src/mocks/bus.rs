use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::errors::Error;
use crate::errors::ProtocolError::{IoException, NoDevice, NotInitialized};
use crate::io::I2cBus;

/// A single write transfer seen by the [`MockI2cBus`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct I2cWrite {
    pub address: u8,
    pub register: u8,
    pub value: u16,
}

/// Inner (shared) data of the [`MockI2cBus`].
#[derive(Clone, Debug, Default)]
pub struct MockBusData {
    pub connected: bool,
    /// Register maps of the devices answering on the bus, by address.
    pub devices: HashMap<u8, HashMap<u8, u16>>,
    /// All write transfers, in order.
    pub writes: Vec<I2cWrite>,
    /// Simulates a bus failing on every write.
    pub fail_writes: bool,
}

/// Mock implementation of an [`I2cBus`]: an in-memory register map per device.
///
/// Clones share the same data, so a test can keep a clone and inspect what the device wrote.
#[derive(Clone, Debug, Default)]
pub struct MockI2cBus {
    pub data: Arc<RwLock<MockBusData>>,
}

impl MockI2cBus {
    /// A bus with the Pimoroni microcontroller answering at 0x15.
    pub fn pimoroni() -> Self {
        Self::default().with_device(0x15)
    }

    /// A bus with the Waveshare PCA9685 answering at 0x40.
    pub fn waveshare() -> Self {
        Self::default().with_device(0x40)
    }

    /// Adds a device answering at `address`.
    pub fn with_device(self, address: u8) -> Self {
        self.data.write().devices.entry(address).or_default();
        self
    }

    /// Makes all subsequent writes fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.data.write().fail_writes = fail;
    }

    /// Returns all writes made so far.
    pub fn get_writes(&self) -> Vec<I2cWrite> {
        self.data.read().writes.clone()
    }

    /// Returns the successive values written to one register.
    pub fn get_writes_to(&self, address: u8, register: u8) -> Vec<u16> {
        self.data
            .read()
            .writes
            .iter()
            .filter(|write| write.address == address && write.register == register)
            .map(|write| write.value)
            .collect()
    }

    /// Returns the current value of a register.
    pub fn get_register(&self, address: u8, register: u8) -> Option<u16> {
        self.data
            .read()
            .devices
            .get(&address)
            .and_then(|registers| registers.get(&register))
            .copied()
    }

    /// Forgets the writes recorded so far.
    pub fn clear_writes(&self) {
        self.data.write().writes.clear();
    }

    fn read(&self, address: u8, register: u8) -> Result<u16, Error> {
        let data = self.data.read();
        if !data.connected {
            return Err(NotInitialized.into());
        }
        let registers = data.devices.get(&address).ok_or(NoDevice { address })?;
        Ok(registers.get(&register).copied().unwrap_or_default())
    }

    fn write(&mut self, address: u8, register: u8, value: u16) -> Result<(), Error> {
        let mut data = self.data.write();
        if !data.connected {
            return Err(NotInitialized.into());
        }
        if data.fail_writes {
            return Err(IoException {
                info: String::from("Remote I/O error"),
            }
            .into());
        }
        data.devices
            .get_mut(&address)
            .ok_or(NoDevice { address })?
            .insert(register, value);
        data.writes.push(I2cWrite {
            address,
            register,
            value,
        });
        Ok(())
    }
}

impl Display for MockI2cBus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut addresses: Vec<String> = self
            .data
            .read()
            .devices
            .keys()
            .map(|address| format!("0x{:02X}", address))
            .collect();
        addresses.sort();
        write!(f, "{} [devices={}]", self.get_name(), addresses.join(","))
    }
}

impl I2cBus for MockI2cBus {
    fn open(&mut self) -> Result<(), Error> {
        self.data.write().connected = true;
        Ok(())
    }

    fn close(&mut self) -> Result<(), Error> {
        self.data.write().connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.data.read().connected
    }

    fn read_byte(&mut self, address: u8, register: u8) -> Result<u8, Error> {
        Ok(self.read(address, register)? as u8)
    }

    fn read_word(&mut self, address: u8, register: u8) -> Result<u16, Error> {
        self.read(address, register)
    }

    fn write_byte(&mut self, address: u8, register: u8, value: u8) -> Result<(), Error> {
        self.write(address, register, u16::from(value))
    }

    fn write_word(&mut self, address: u8, register: u8, value: u16) -> Result<(), Error> {
        self.write(address, register, value)
    }
}
