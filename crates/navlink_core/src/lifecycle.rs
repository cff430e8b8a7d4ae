//! Cooperative worker cancellation.
//!
//! Each worker loop owns a [`LifecycleFlag`] clone and observes it at
//! its polling points (after a socket timeout, after a queue wait).
//! There is no preemptive cancellation: shutdown latency is bounded by
//! the longest configured timeout in the system. The `Stopped` state
//! lets a controller optionally wait for termination; the wait is
//! advisory, not required for correctness.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

/// Worker lifecycle states, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Running,
    StopRequested,
    Stopped,
}

/// Shared tri-state cancellation flag. Cheap to clone; all clones
/// observe the same state.
#[derive(Clone)]
pub struct LifecycleFlag {
    inner: Arc<(Mutex<LifecycleState>, Condvar)>,
}

impl LifecycleFlag {
    pub fn new() -> Self {
        Self {
            inner: Arc::new((Mutex::new(LifecycleState::Running), Condvar::new())),
        }
    }

    pub fn state(&self) -> LifecycleState {
        *self.lock()
    }

    /// True while no stop has been requested. Worker loops poll this.
    pub fn is_running(&self) -> bool {
        *self.lock() == LifecycleState::Running
    }

    pub fn is_stopped(&self) -> bool {
        *self.lock() == LifecycleState::Stopped
    }

    /// Asks the worker to stop at its next polling point. Has no
    /// effect once the worker already stopped.
    pub fn request_stop(&self) {
        let mut state = self.lock();
        if *state == LifecycleState::Running {
            *state = LifecycleState::StopRequested;
            self.inner.1.notify_all();
        }
    }

    /// Marks the worker as terminated. Called by the worker itself on
    /// loop exit.
    pub fn mark_stopped(&self) {
        *self.lock() = LifecycleState::Stopped;
        self.inner.1.notify_all();
    }

    /// Waits until the worker marks itself stopped, up to `timeout`.
    /// Returns whether the stop was observed.
    pub fn wait_stopped(&self, timeout: Duration) -> bool {
        let guard = self.lock();
        let (state, _result) = self
            .inner
            .1
            .wait_timeout_while(guard, timeout, |s| *s != LifecycleState::Stopped)
            .unwrap_or_else(PoisonError::into_inner);
        *state == LifecycleState::Stopped
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LifecycleState> {
        self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for LifecycleFlag {
    fn default() -> Self {
        Self::new()
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
