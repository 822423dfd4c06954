//! Defines the pan-tilt device: its two axes, the motion they can do, and the facade driving them.

use std::fmt::{Display, Formatter};

pub use crate::devices::axis::{AxisController, AxisState};
pub use crate::devices::gimbal::Gimbal;
pub use crate::devices::pan_tilt::PanTiltHat;
pub use crate::devices::scheduler::{MotionScheduler, TICK_PERIOD};
use crate::utils::Range;

mod axis;
pub mod codec;
mod gimbal;
mod pan_tilt;
mod scheduler;

/// The two degrees of freedom of the mechanism.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Horizontal rotation, driven by servo one.
    Pan,
    /// Vertical rotation, driven by servo two.
    Tilt,
}

impl Axis {
    pub const ALL: [Axis; 2] = [Axis::Pan, Axis::Tilt];

    /// Returns the mechanical range of the axis, in degrees.
    pub fn get_range(&self) -> Range<f64> {
        match self {
            Axis::Pan => Range::from([-90.0, 90.0]),
            Axis::Tilt => Range::from([-80.0, 80.0]),
        }
    }
}

impl Display for Axis {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Axis::Pan => write!(f, "pan"),
            Axis::Tilt => write!(f, "tilt"),
        }
    }
}
