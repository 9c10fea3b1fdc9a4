//! One-shot completion signal shared between workers.
//!
//! Uses `Mutex + Condvar` so waiters can sleep for an interval and still wake
//! as soon as the flag flips.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

#[derive(Default)]
struct Inner {
    // Lock-free fast path for `is_set`
    flag: AtomicBool,
    lock: Mutex<()>,
    cond: Condvar,
}

/// Broadcast flag: unset → set exactly once, never back.
///
/// Cheap to clone; all clones observe the same flag.
#[derive(Clone, Default)]
pub struct Signal {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("set", &self.is_set())
            .finish()
    }
}

impl Signal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag and wake every waiter.
    ///
    /// Returns `true` only for the call that performed the transition.
    pub fn set(&self) -> bool {
        let _guard = self.inner.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let first = !self.inner.flag.swap(true, Ordering::SeqCst);
        self.inner.cond.notify_all();
        first
    }

    /// Non-blocking read
    pub fn is_set(&self) -> bool {
        self.inner.flag.load(Ordering::SeqCst)
    }

    /// Sleep up to `timeout`, returning early once the flag is set.
    ///
    /// Returns whether the flag is set on return.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.inner.lock.lock().unwrap_or_else(PoisonError::into_inner);
        while !self.is_set() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            guard = self
                .inner
                .cond
                .wait_timeout(guard, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        self.is_set()
    }

    /// Guard that sets this signal when dropped, including on unwind.
    pub fn set_on_drop(&self) -> SetOnDrop {
        SetOnDrop(self.clone())
    }
}

/// RAII guard returned by [`Signal::set_on_drop`].
pub struct SetOnDrop(Signal);

impl Drop for SetOnDrop {
    fn drop(&mut self) {
        self.0.set();
    }
}

/// True once every signal in `signals` is set.
pub fn all_set(signals: &[&Signal]) -> bool {
    signals.iter().all(|s| s.is_set())
}
