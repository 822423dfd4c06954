use std::fmt::{Display, Formatter};
use std::sync::Arc;

use log::info;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::time::{Duration, Instant};

use crate::devices::axis::MAX_SPEED;
use crate::devices::{Axis, AxisState, Gimbal, MotionScheduler};
use crate::errors::{Error, RuntimeError};
use crate::hardware::{detect, Backend};
use crate::io::I2cBus;

/// Represents a Pan-Tilt HAT: two servos (pan and tilt) driven over I2C by either a Pimoroni board
/// or a Waveshare board, detected at creation.
///
/// Two ways of moving are available:
/// - absolute positioning: [`Self::pan`], [`Self::tilt`] (angles in degrees, pan ∈ [-90, 90],
///   tilt ∈ [-80, 80], out of range values are clamped);
/// - continuous moves: [`Self::pan_left`], [`Self::pan_right`], [`Self::tilt_up`],
///   [`Self::tilt_down`] with a speed from 0 to 15, until [`Self::stop`] or a mechanical limit.
///
/// Each servo is de-energized 2 seconds after its last move.
///
/// The device is cheap to clone: all clones drive the same hardware. The background task stops
/// when [`Self::close`] is called or when the last clone is dropped.
///
/// # Example
/// ```no_run
/// use pantilt_hat::devices::PanTiltHat;
///
/// #[tokio::main]
/// async fn main() {
///     let hat = PanTiltHat::run().unwrap();
///     hat.pan(45.0).unwrap();
///     hat.tilt_down(5).unwrap();
/// }
/// ```
#[derive(Clone, Debug)]
pub struct PanTiltHat {
    backend: Backend,
    gimbal: Arc<Mutex<Gimbal>>,
    scheduler: Arc<Mutex<MotionScheduler>>,
}

impl PanTiltHat {
    /// Creates a Pan-Tilt HAT on the default Raspberry Pi bus (`/dev/i2c-1`).
    ///
    /// # Errors
    /// * `ProtocolError`: the bus cannot be opened or the board does not answer.
    /// * `RuntimeError`: not called from within a tokio runtime.
    #[cfg(all(feature = "linux-i2c", target_os = "linux"))]
    pub fn run() -> Result<Self, Error> {
        Self::new(crate::io::LinuxI2c::default())
    }

    /// Creates a Pan-Tilt HAT on the given bus, detecting which board is plugged.
    ///
    /// # Errors
    /// * `ProtocolError`: the bus cannot be opened or the board does not answer.
    /// * `RuntimeError`: not called from within a tokio runtime.
    pub fn new<B: I2cBus + 'static>(mut bus: B) -> Result<Self, Error> {
        // Nothing touches the bus without a runtime to drive it.
        Handle::try_current().map_err(|_| RuntimeError)?;
        if !bus.is_connected() {
            bus.open()?;
        }
        let backend = detect(&bus);
        info!("Detected {} pan-tilt HAT on {}", backend, bus);
        Self::create(Box::new(bus), backend)
    }

    /// Creates a Pan-Tilt HAT on the given bus, for a known board (no detection).
    ///
    /// # Errors
    /// * `ProtocolError`: the bus cannot be opened or the board does not answer.
    /// * `RuntimeError`: not called from within a tokio runtime.
    pub fn with_backend<B: I2cBus + 'static>(bus: B, backend: Backend) -> Result<Self, Error> {
        Handle::try_current().map_err(|_| RuntimeError)?;
        Self::create(Box::new(bus), backend)
    }

    /// Inner helper.
    fn create(bus: Box<dyn I2cBus>, backend: Backend) -> Result<Self, Error> {
        let gimbal = Arc::new(Mutex::new(Gimbal::open(backend.create_driver(bus))?));
        let mut scheduler = MotionScheduler::default();
        scheduler.start(gimbal.clone())?;
        Ok(Self {
            backend,
            gimbal,
            scheduler: Arc::new(Mutex::new(scheduler)),
        })
    }

    // ########################################
    // Absolute positioning.

    /// Moves the pan servo (servo one) to `angle` degrees, clamped to [-90, 90].
    pub fn pan(&self, angle: f64) -> Result<&Self, Error> {
        self.move_to(Axis::Pan, angle)
    }

    /// Moves the tilt servo (servo two) to `angle` degrees, clamped to [-80, 80].
    pub fn tilt(&self, angle: f64) -> Result<&Self, Error> {
        self.move_to(Axis::Tilt, angle)
    }

    /// Alias of [`Self::pan`].
    pub fn servo_one(&self, angle: f64) -> Result<&Self, Error> {
        self.pan(angle)
    }

    /// Alias of [`Self::tilt`].
    pub fn servo_two(&self, angle: f64) -> Result<&Self, Error> {
        self.tilt(angle)
    }

    /// Centers both servos.
    pub fn goto_home(&self) -> Result<&Self, Error> {
        self.pan(0.0)?.tilt(0.0)
    }

    fn move_to(&self, axis: Axis, angle: f64) -> Result<&Self, Error> {
        let result = self.gimbal.lock().move_to(axis, angle, Instant::now());
        // The deadline moved even if the write failed.
        self.scheduler.lock().rearm();
        result.map(|_| self)
    }

    // ########################################
    // Continuous moves.

    /// Starts panning left at `speed` (0 to 15, 0 stops the pan).
    pub fn pan_left(&self, speed: u8) -> Result<&Self, Error> {
        self.set_velocity(Axis::Pan, Self::to_speed(speed))
    }

    /// Starts panning right at `speed` (0 to 15, 0 stops the pan).
    pub fn pan_right(&self, speed: u8) -> Result<&Self, Error> {
        self.set_velocity(Axis::Pan, -Self::to_speed(speed))
    }

    /// Starts tilting up at `speed` (0 to 15, 0 stops the tilt).
    pub fn tilt_up(&self, speed: u8) -> Result<&Self, Error> {
        self.set_velocity(Axis::Tilt, -Self::to_speed(speed))
    }

    /// Starts tilting down at `speed` (0 to 15, 0 stops the tilt).
    pub fn tilt_down(&self, speed: u8) -> Result<&Self, Error> {
        self.set_velocity(Axis::Tilt, Self::to_speed(speed))
    }

    /// Stops both continuous moves. The servos are still de-energized after their delay.
    pub fn stop(&self) -> Result<&Self, Error> {
        self.gimbal.lock().stop()?;
        Ok(self)
    }

    fn to_speed(speed: u8) -> i8 {
        speed.min(MAX_SPEED as u8) as i8
    }

    fn set_velocity(&self, axis: Axis, speed: i8) -> Result<&Self, Error> {
        self.gimbal.lock().set_velocity(axis, speed)?;
        Ok(self)
    }

    // ########################################
    // Shutdown.

    /// Stops all moves, de-energizes both servos and releases the bus.
    ///
    /// No command is accepted afterward, but the getters keep working.
    ///
    /// # Errors
    /// * `DeviceClosed`: the device was already closed.
    /// * `ProtocolError`: the last writes failed (the device is closed nonetheless).
    pub fn close(&self) -> Result<&Self, Error> {
        let result = self.gimbal.lock().close();
        self.scheduler.lock().cancel();
        result.map(|_| self)
    }

    // ########################################
    // Setters and Getters.

    /// Returns the detected (or forced) board.
    pub fn get_backend(&self) -> Backend {
        self.backend
    }

    /// Returns a snapshot of an axis.
    pub fn get_state(&self, axis: Axis) -> AxisState {
        self.gimbal.lock().get_state(axis)
    }

    /// Returns the last commanded angle of an axis.
    pub fn get_position(&self, axis: Axis) -> f64 {
        self.get_state(axis).position
    }

    pub fn is_closed(&self) -> bool {
        self.gimbal.lock().is_closed()
    }

    /// Returns the delay (in ms) before an unused servo is de-energized.
    pub fn get_auto_off_delay(&self) -> u64 {
        self.gimbal.lock().get_auto_off_delay().as_millis() as u64
    }

    /// Sets the delay (in ms) before an unused servo is de-energized (default: 2000ms).
    pub fn set_auto_off_delay(self, delay: u64) -> Self {
        self.gimbal
            .lock()
            .set_auto_off_delay(Duration::from_millis(delay));
        self
    }
}

impl Display for PanTiltHat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let gimbal = self.gimbal.lock();
        write!(
            f,
            "PAN-TILT HAT (backend={}) [pan={}, tilt={}]",
            self.backend,
            gimbal.get_state(Axis::Pan).position,
            gimbal.get_state(Axis::Tilt).position
        )
    }
}
