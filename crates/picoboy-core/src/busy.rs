use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};

/// Set while a queued `DrawLine` has not finished its panel transfer.
///
/// Core A acquires the flag right after filling the shared line slot and
/// before pushing the draw command; core B (or the transfer unit's completion
/// handler) releases it once the last sample has reached the panel. Core A
/// must observe the flag clear before it touches the slot again, so at most
/// one line is ever in flight.
///
/// Waiting parks on a condvar instead of spinning. The mutex guards nothing
/// but the wake-up handshake; the flag itself is the atomic.
pub struct LineBusy {
    busy: AtomicBool,
    lock: Mutex<()>,
    idle: Condvar,
}

impl LineBusy {
    pub fn new() -> Self {
        Self {
            busy: AtomicBool::new(false),
            lock: Mutex::new(()),
            idle: Condvar::new(),
        }
    }

    #[inline]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Mark a transfer as started.
    ///
    /// Returns `false` without changing anything if one is already in flight.
    pub fn acquire(&self) -> bool {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Mark the in-flight transfer as complete and wake any waiter.
    pub fn release(&self) {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.busy.store(false, Ordering::Release);
        self.idle.notify_all();
    }

    /// Block until no transfer is in flight. Unbounded.
    pub fn wait_idle(&self) {
        if !self.is_busy() {
            return;
        }
        let mut guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        while self.is_busy() {
            guard = self
                .idle
                .wait(guard)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

impl Default for LineBusy {
    fn default() -> Self {
        Self::new()
    }
}
