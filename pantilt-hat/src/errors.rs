use log::error;
use snafu::Snafu;

pub use crate::errors::Error::*;
use crate::errors::ProtocolError::IoException;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Runtime error: Are you sure your code runs inside a tokio runtime?
    RuntimeError,
    /// Protocol error: {source}.
    ProtocolError { source: ProtocolError },
    /// Hardware error: {source}.
    HardwareError { source: HardwareError },
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        error!("std::io error {:?}", error);
        let info = match error.kind() {
            std::io::ErrorKind::NotFound => String::from("I2C bus not found"),
            std::io::ErrorKind::PermissionDenied => String::from("I2C bus access denied"),
            _ => error.to_string(),
        };
        Self::ProtocolError {
            source: IoException { info },
        }
    }
}

impl From<ProtocolError> for Error {
    fn from(value: ProtocolError) -> Self {
        Self::ProtocolError { source: value }
    }
}

impl From<HardwareError> for Error {
    fn from(value: HardwareError) -> Self {
        Self::HardwareError { source: value }
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProtocolError {
    /// {info}
    IoException { info: String },
    /// Bus has not been opened
    NotInitialized,
    #[snafu(display("No device answered at address 0x{address:02X}"))]
    NoDevice { address: u8 },
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum HardwareError {
    /// The pan-tilt device has been closed
    DeviceClosed,
    /// Frequency must be between {min} and {max} Hz
    InvalidFrequency { min: u16, max: u16 },
}

/// Outcome of a failed backend probe. Never surfaced through the public API: it only steers the
/// backend selection (see [`crate::hardware::detect`]).
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProbeError {
    #[snafu(display("No answer at address 0x{address:02X}: {info}"))]
    NoAnswer { address: u8, info: String },
}
