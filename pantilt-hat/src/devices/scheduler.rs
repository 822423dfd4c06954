//! Defines the background task running the continuous moves and the auto-off timers.

use std::sync::Arc;

use log::{error, trace};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::{self, Duration, Instant, MissedTickBehavior};

use crate::devices::Gimbal;
use crate::errors::Error;
use crate::utils::task::{self, TaskHandler};

/// Period of the continuous move integration.
pub const TICK_PERIOD: Duration = Duration::from_millis(100);

/// Owns the task driving a [`Gimbal`] over time.
///
/// Every [`TICK_PERIOD`] the task advances both axes, then checks their auto-off deadlines. In
/// between, it also wakes up exactly at the earliest deadline so that a servo is de-energized on
/// time. The task stops when the scheduler is cancelled or dropped.
#[derive(Debug, Default)]
pub struct MotionScheduler {
    handler: Option<TaskHandler>,
    wakeup: Arc<Notify>,
}

impl MotionScheduler {
    /// Starts (or restarts) the task on the current tokio runtime.
    ///
    /// # Errors
    /// * `RuntimeError`: not called from within a tokio runtime.
    pub fn start(&mut self, gimbal: Arc<Mutex<Gimbal>>) -> Result<(), Error> {
        self.cancel();
        let wakeup = self.wakeup.clone();
        let handler = task::run(async move {
            let mut interval = time::interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                let deadline = {
                    let lock = gimbal.lock();
                    if lock.is_closed() {
                        break;
                    }
                    lock.next_deadline()
                };

                // Ticks win over the deadline when both are due: motion is integrated first.
                tokio::select! {
                    biased;
                    _ = interval.tick() => {
                        let mut lock = gimbal.lock();
                        let now = Instant::now();
                        if let Err(err) = lock.tick(TICK_PERIOD, now) {
                            error!("Continuous move failed: {}", err);
                        }
                        if let Err(err) = lock.auto_off(now) {
                            error!("Auto-off failed: {}", err);
                        }
                    }
                    _ = sleep_until(deadline) => {
                        if let Err(err) = gimbal.lock().auto_off(Instant::now()) {
                            error!("Auto-off failed: {}", err);
                        }
                    }
                    _ = wakeup.notified() => {}
                }
            }
            trace!("Motion scheduler stopped");
        })?;

        trace!("Motion scheduler started");
        self.handler = Some(handler);
        Ok(())
    }

    /// Makes the task reconsider its next deadline (to call after a move).
    pub fn rearm(&self) {
        self.wakeup.notify_one();
    }

    /// Stops the task.
    pub fn cancel(&mut self) {
        if let Some(handler) = self.handler.take() {
            handler.abort();
            trace!("Motion scheduler cancelled");
        }
    }

    pub fn is_running(&self) -> bool {
        self.handler
            .as_ref()
            .is_some_and(|handler| !handler.is_finished())
    }
}

impl Drop for MotionScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::Axis;
    use crate::hardware::PIC16F1503;
    use crate::mocks::bus::MockI2cBus;
    use crate::pause;

    fn _setup_gimbal() -> (MockI2cBus, Arc<Mutex<Gimbal>>) {
        let bus = MockI2cBus::pimoroni();
        let driver = Box::new(PIC16F1503::new(Box::new(bus.clone())));
        let gimbal = Arc::new(Mutex::new(Gimbal::open(driver).unwrap()));
        (bus, gimbal)
    }

    #[test]
    fn test_start_outside_runtime() {
        let (_, gimbal) = _setup_gimbal();
        let mut scheduler = MotionScheduler::default();
        assert!(scheduler.start(gimbal).is_err());
        assert!(!scheduler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks() {
        let (_, gimbal) = _setup_gimbal();
        let mut scheduler = MotionScheduler::default();
        scheduler.start(gimbal.clone()).unwrap();
        assert!(scheduler.is_running());

        gimbal.lock().set_velocity(Axis::Pan, 10).unwrap();
        pause!(50);
        assert_eq!(gimbal.lock().get_state(Axis::Pan).position, 0.0);
        pause!(100);
        assert_eq!(gimbal.lock().get_state(Axis::Pan).position, 1.0);
        pause!(300);
        assert_eq!(gimbal.lock().get_state(Axis::Pan).position, 4.0);
        assert!(gimbal.lock().get_state(Axis::Pan).powered);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_off_between_ticks() {
        let (bus, gimbal) = _setup_gimbal();
        let mut scheduler = MotionScheduler::default();
        scheduler.start(gimbal.clone()).unwrap();

        pause!(50);
        gimbal.lock().move_to(Axis::Tilt, 20.0, Instant::now()).unwrap();
        scheduler.rearm();

        // Deadline at 2050ms: between two ticks.
        pause!(1999);
        assert!(gimbal.lock().get_state(Axis::Tilt).powered);
        pause!(2);
        assert!(!gimbal.lock().get_state(Axis::Tilt).powered);
        assert_eq!(bus.get_writes_to(0x15, 0x00), vec![0x00, 0x02, 0x00]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel() {
        let (_, gimbal) = _setup_gimbal();
        let mut scheduler = MotionScheduler::default();
        scheduler.start(gimbal.clone()).unwrap();
        gimbal.lock().set_velocity(Axis::Pan, 10).unwrap();
        pause!(150);

        scheduler.cancel();
        pause!(1);
        assert!(!scheduler.is_running());
        pause!(500);
        assert_eq!(gimbal.lock().get_state(Axis::Pan).position, 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_task() {
        let (_, gimbal) = _setup_gimbal();
        let mut scheduler = MotionScheduler::default();
        scheduler.start(gimbal.clone()).unwrap();
        gimbal.lock().set_velocity(Axis::Tilt, -10).unwrap();
        drop(scheduler);
        pause!(500);
        assert_eq!(gimbal.lock().get_state(Axis::Tilt).position, 0.0);
        // Only the test still holds the gimbal.
        assert_eq!(Arc::strong_count(&gimbal), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_once_closed() {
        let (_, gimbal) = _setup_gimbal();
        let mut scheduler = MotionScheduler::default();
        scheduler.start(gimbal.clone()).unwrap();
        pause!(10);
        gimbal.lock().close().unwrap();
        scheduler.rearm();
        pause!(10);
        assert!(!scheduler.is_running());
    }
}
