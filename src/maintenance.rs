//! Maintenance slot
//!
//! A reader/writer gate around the workspace. Backups and record writes hold
//! it shared; a restore holds it exclusively, so it never overlaps another
//! backup, restore or write. Waiting is bounded by the configured timeout.
//!
//! Holding an [`ExclusiveSlot`] is also the proof the restore primitives ask
//! for: they take `&ExclusiveSlot` so they cannot be called without it.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::observability::{Event, Logger};

/// Maintenance slot errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MaintenanceError {
    #[error("Maintenance slot busy: gave up after {waited_ms} ms")]
    Busy { waited_ms: u128 },
}

#[derive(Debug, Default)]
struct SlotState {
    readers: usize,
    writer: bool,
}

/// Reader/writer gate with bounded waiting
#[derive(Debug)]
pub struct MaintenanceLock {
    state: Mutex<SlotState>,
    changed: Condvar,
    timeout: Duration,
}

impl MaintenanceLock {
    pub fn new(timeout: Duration) -> Self {
        Self {
            state: Mutex::new(SlotState::default()),
            changed: Condvar::new(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn state(&self) -> MutexGuard<'_, SlotState> {
        // The state is two counters; a panic elsewhere cannot leave it torn.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait_until<F>(&self, mode: &str, mut blocked: F) -> Result<MutexGuard<'_, SlotState>, MaintenanceError>
    where
        F: FnMut(&SlotState) -> bool,
    {
        let started = Instant::now();
        let mut state = self.state();

        while blocked(&state) {
            let waited = started.elapsed();
            if waited >= self.timeout {
                let waited_ms = waited.as_millis();
                Logger::warn(
                    Event::MaintenanceBusy.as_str(),
                    &[("mode", mode), ("waited_ms", waited_ms.to_string().as_str())],
                );
                return Err(MaintenanceError::Busy { waited_ms });
            }
            let (next, _) = self
                .changed
                .wait_timeout(state, self.timeout - waited)
                .unwrap_or_else(PoisonError::into_inner);
            state = next;
        }

        Ok(state)
    }

    /// Take the slot shared; waits while a restore holds it
    pub fn acquire_shared(&self) -> Result<SharedSlot<'_>, MaintenanceError> {
        let mut state = self.wait_until("shared", |s| s.writer)?;
        state.readers += 1;
        Ok(SharedSlot { lock: self })
    }

    /// Take the slot exclusively; waits until nothing else holds it
    pub fn acquire_exclusive(&self) -> Result<ExclusiveSlot<'_>, MaintenanceError> {
        let mut state = self.wait_until("exclusive", |s| s.writer || s.readers > 0)?;
        state.writer = true;
        Ok(ExclusiveSlot { lock: self })
    }
}

/// Shared hold on the maintenance slot
#[derive(Debug)]
pub struct SharedSlot<'a> {
    lock: &'a MaintenanceLock,
}

impl Drop for SharedSlot<'_> {
    fn drop(&mut self) {
        let mut state = self.lock.state();
        state.readers = state.readers.saturating_sub(1);
        self.lock.changed.notify_all();
    }
}

/// Exclusive hold on the maintenance slot
#[derive(Debug)]
pub struct ExclusiveSlot<'a> {
    lock: &'a MaintenanceLock,
}

impl Drop for ExclusiveSlot<'_> {
    fn drop(&mut self) {
        let mut state = self.lock.state();
        state.writer = false;
        self.lock.changed.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn lock(ms: u64) -> MaintenanceLock {
        MaintenanceLock::new(Duration::from_millis(ms))
    }

    #[test]
    fn test_shared_holders_coexist() {
        let lock = lock(50);
        let _a = lock.acquire_shared().unwrap();
        let _b = lock.acquire_shared().unwrap();
    }

    #[test]
    fn test_exclusive_times_out_behind_shared() {
        let lock = lock(30);
        let _reader = lock.acquire_shared().unwrap();

        let err = lock.acquire_exclusive().unwrap_err();
        assert!(matches!(err, MaintenanceError::Busy { .. }));
    }

    #[test]
    fn test_shared_times_out_behind_exclusive() {
        let lock = lock(30);
        let _writer = lock.acquire_exclusive().unwrap();

        assert!(lock.acquire_shared().is_err());
        assert!(lock.acquire_exclusive().is_err());
    }

    #[test]
    fn test_release_admits_next_holder() {
        let lock = lock(50);
        {
            let _writer = lock.acquire_exclusive().unwrap();
        }
        let _reader = lock.acquire_shared().unwrap();
        drop(_reader);
        let _writer = lock.acquire_exclusive().unwrap();
    }

    #[test]
    fn test_waiter_wakes_on_release() {
        let lock = Arc::new(lock(5_000));
        let reader = lock.acquire_shared().unwrap();

        let waiter = {
            let lock = Arc::clone(&lock);
            thread::spawn(move || lock.acquire_exclusive().map(|_| ()))
        };

        thread::sleep(Duration::from_millis(20));
        drop(reader);

        assert!(waiter.join().unwrap().is_ok());
    }
}
