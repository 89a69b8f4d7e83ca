//! Wake-up channel from the audio callback to the disk thread.
//!
//! The mutex guards no data. It exists so that the disk thread can check the
//! ring buffer and go to sleep atomically: a wake-up sent between the check
//! and the wait would otherwise be lost.
//!
//! The audio side never waits for the mutex. [`DiskSignal::try_notify`]
//! attempts a non-blocking lock and silently skips the notification when the
//! disk thread holds it. The disk thread re-checks the ring on every wake and
//! after a bounded idle wait, so a skipped notification costs latency, never
//! progress.

use std::time::Duration;

use parking_lot::{Condvar, Mutex, MutexGuard};

/// Mutex/condvar pair used only to wake the disk thread.
#[derive(Default)]
pub struct DiskSignal {
    lock: Mutex<()>,
    cond: Condvar,
}

/// Proof that the caller holds the signal's mutex.
pub struct SignalGuard<'a> {
    guard: MutexGuard<'a, ()>,
}

impl DiskSignal {
    /// Creates a new signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wakes the disk thread if that can be done without blocking.
    ///
    /// Safe to call from the audio callback: it never waits, never allocates
    /// and never fails loudly. Returns `true` if a notification was sent.
    pub fn try_notify(&self) -> bool {
        match self.lock.try_lock() {
            Some(_guard) => {
                self.cond.notify_one();
                true
            }
            None => false,
        }
    }

    /// Takes the mutex. Only the disk thread and teardown call this.
    pub fn lock(&self) -> SignalGuard<'_> {
        SignalGuard {
            guard: self.lock.lock(),
        }
    }

    /// Releases the mutex while sleeping until notified or `timeout` elapses,
    /// then re-acquires it.
    ///
    /// Returns `true` if the wait timed out.
    pub fn wait(&self, guard: &mut SignalGuard<'_>, timeout: Duration) -> bool {
        self.cond.wait_for(&mut guard.guard, timeout).timed_out()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    #[test]
    fn test_try_notify_uncontended() {
        let signal = DiskSignal::new();
        assert!(signal.try_notify());
    }

    #[test]
    fn test_try_notify_skips_when_held() {
        let signal = DiskSignal::new();
        let _held = signal.lock();
        assert!(!signal.try_notify());
    }

    #[test]
    fn test_wait_times_out() {
        let signal = DiskSignal::new();
        let mut guard = signal.lock();
        let started = Instant::now();
        assert!(signal.wait(&mut guard, Duration::from_millis(20)));
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_notify_wakes_waiter() {
        let signal = Arc::new(DiskSignal::new());
        let ready = Arc::new(AtomicBool::new(false));

        let waiter = {
            let signal = Arc::clone(&signal);
            let ready = Arc::clone(&ready);
            std::thread::spawn(move || {
                let mut guard = signal.lock();
                while !ready.load(Ordering::SeqCst) {
                    signal.wait(&mut guard, Duration::from_secs(5));
                }
            })
        };

        // Retry until the waiter is parked and the notify goes through.
        let started = Instant::now();
        ready.store(true, Ordering::SeqCst);
        while !waiter.is_finished() {
            signal.try_notify();
            std::thread::sleep(Duration::from_millis(1));
        }
        waiter.join().unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
