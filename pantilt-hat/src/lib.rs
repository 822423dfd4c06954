#![doc(html_root_url = "https://docs.rs/pantilt-hat/0.1.0")]

//! <h1 align="center">PANTILT-HAT - Pan-Tilt HAT servo control for Rust</h1>
//! <div style="text-align:center;font-style:italic;">Drive the Pimoroni and Waveshare Pan-Tilt HATs of a Raspberry Pi through one API.</div>
//!
//! # Features
//!
//! **PanTilt-Hat** controls the two servos (pan and tilt) of a Pan-Tilt HAT plugged on the I2C bus
//! of a Raspberry Pi, whichever board it is:
//! - the Pimoroni HAT, where a PIC16F1503 microcontroller generates the servo signals;
//! - the Waveshare HAT, where a PCA9685 PWM chip generates them.
//!
//! The board is detected when the [`PanTiltHat`](devices::PanTiltHat) is created. Then:
//! - absolute positioning moves a servo to a given angle;
//! - continuous moves turn a servo at a given speed until stopped or until a mechanical limit;
//! - an unused servo is de-energized after 2 seconds (no buzz, no heat).
//!
//! # Getting Started
//!
//! - Enable I2C on your Raspberry Pi (`raspi-config`).
//!
//! - Add the following to your `Cargo.toml`:
//! ```toml
//! [dependencies]
//! pantilt-hat = "0.1.0"
//! ```
//!
//! - Start writing your code: see the [demos](https://github.com/pantilt-hat/pantilt-hat/tree/main/pantilt-hat/demos) directory for more.
//!
//! ```no_run
//! use pantilt_hat::devices::PanTiltHat;
//! use pantilt_hat::pause;
//!
//! #[tokio::main]
//! async fn main() {
//!     // Opens /dev/i2c-1 and detects the board.
//!     let hat = PanTiltHat::run().unwrap();
//!
//!     // Absolute move.
//!     hat.pan(80.0).unwrap().tilt(0.0).unwrap();
//!     pause!(3000);
//!
//!     // Continuous move for 10 seconds.
//!     hat.pan_right(5).unwrap().tilt_down(2).unwrap();
//!     pause!(10000);
//!
//!     hat.stop().unwrap();
//!     hat.close().unwrap();
//! }
//! ```
//!
//! # Feature flags
//!
//! - **linux-i2c** -- (enabled by default) Provides the [`LinuxI2c`](io::LinuxI2c) bus (Linux only) using the `i2cdev` crate.
//! - **serde** -- Enables serialize/deserialize capabilities for axes, backends and axis states.
//! - **mocks** -- Provides a mocked I2C bus (useful for tests mostly).

#[cfg(test)]
extern crate self as pantilt_hat;

pub mod devices;
pub mod errors;
pub mod hardware;
pub mod io;
#[cfg(any(test, feature = "mocks"))]
pub mod mocks;
pub mod utils;
