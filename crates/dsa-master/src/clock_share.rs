//! Lock guarding a bus clock shared between the switch and a sensor.
//!
//! On some boards the switch's SPI clock line is shorted to a temperature
//! sensor's clock. Sensor accesses then have to be serialised against
//! switch register traffic; the [`ClockShareLock`] is that serialisation
//! point and carries a flag recording whether the short is present.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use tracing::debug;

/// Delay before a consumer's hold on the bus is released, letting the
/// clock line settle.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(1);

#[derive(Debug)]
pub struct ClockShareLock {
    bus: Mutex<()>,
    shorted: AtomicBool,
    settle: Duration,
}

impl Default for ClockShareLock {
    fn default() -> Self {
        Self::with_settle_delay(DEFAULT_SETTLE_DELAY)
    }
}

impl ClockShareLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settle_delay(settle: Duration) -> Self {
        Self {
            bus: Mutex::new(()),
            shorted: AtomicBool::new(false),
            settle,
        }
    }

    /// Takes the bus. Blocks while another holder has it.
    pub fn lock(&self) -> ClockShareGuard<'_> {
        ClockShareGuard {
            _bus: self.bus.lock(),
            settle: self.settle,
        }
    }

    pub fn try_lock(&self) -> Option<ClockShareGuard<'_>> {
        self.bus.try_lock().map(|bus| ClockShareGuard {
            _bus: bus,
            settle: self.settle,
        })
    }

    pub fn is_locked(&self) -> bool {
        self.bus.is_locked()
    }

    /// Whether the clock short is recorded as present.
    pub fn is_shorted(&self) -> bool {
        self.shorted.load(Ordering::Acquire)
    }

    /// Records the short state, waiting for any current holder first.
    ///
    /// The bus is free again when this returns.
    pub fn set_flag_and_release(&self, shorted: bool) {
        let bus = self.bus.lock();
        self.shorted.store(shorted, Ordering::Release);
        drop(bus);
        debug!(shorted, "Updated clock share flag");
    }
}

/// Hold on the shared clock. Releasing waits out the settle delay first.
pub struct ClockShareGuard<'a> {
    _bus: MutexGuard<'a, ()>,
    settle: Duration,
}

impl Drop for ClockShareGuard<'_> {
    fn drop(&mut self) {
        if !self.settle.is_zero() {
            thread::sleep(self.settle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::sync::Arc;

    #[test]
    fn test_flag_starts_clear() {
        let lock = ClockShareLock::new();
        assert!(!lock.is_shorted());
        lock.set_flag_and_release(true);
        assert!(lock.is_shorted());
        assert!(!lock.is_locked());
        lock.set_flag_and_release(false);
        assert!(!lock.is_shorted());
    }

    #[test]
    fn test_guard_excludes_others() {
        let lock = ClockShareLock::with_settle_delay(Duration::ZERO);
        let guard = lock.lock();
        assert!(lock.try_lock().is_none());
        drop(guard);
        assert!(lock.try_lock().is_some());
    }

    #[test]
    fn test_set_flag_waits_for_holder() {
        let lock = Arc::new(ClockShareLock::with_settle_delay(Duration::from_millis(5)));
        let guard = lock.lock();

        let (tx, rx) = mpsc::channel();
        let writer = {
            let lock = Arc::clone(&lock);
            thread::spawn(move || {
                lock.set_flag_and_release(true);
                tx.send(()).unwrap();
            })
        };

        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        assert!(!lock.is_shorted());
        drop(guard);
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        writer.join().unwrap();
        assert!(lock.is_shorted());
    }
}
