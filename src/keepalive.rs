//! One-shot liveness timer.
//!
//! A [`KeepaliveTimer`] detects the absence of an expected follow-up event
//! within a deadline. The client arms one per outstanding ping and disarms it
//! when the `pong` arrives; the server re-arms one per connection on every
//! `ping` and evicts the connection if it expires.
//!
//! # Semantics
//!
//! - [`arm`](KeepaliveTimer::arm) is a no-op while already armed, and a
//!   `None` duration leaves the timer disabled.
//! - [`disarm`](KeepaliveTimer::disarm) is idempotent.
//! - Expiry runs the callback exactly once, on the tokio runtime, and leaves
//!   the timer unarmed.
//! - A disarmed or superseded arm cycle never fires, even if its sleep has
//!   already elapsed but its task has not yet run.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::AbortHandle;
use tokio::time::sleep;
use tracing::trace;

// ============================================================================
// Types
// ============================================================================

/// The currently pending expiry.
struct Armed {
    /// Arm cycle this expiry belongs to.
    cycle: u64,
    /// Handle to the sleeping task.
    task: AbortHandle,
}

/// State shared between the timer and its sleeping task.
#[derive(Default)]
struct TimerSlot {
    /// Counter used to tell arm cycles apart.
    next_cycle: u64,
    /// Pending expiry, if armed.
    armed: Option<Armed>,
}

// ============================================================================
// KeepaliveTimer
// ============================================================================

/// Cancellable, re-armable one-shot timer.
///
/// Must be armed from within a tokio runtime.
#[derive(Default)]
pub struct KeepaliveTimer {
    slot: Arc<Mutex<TimerSlot>>,
}

impl fmt::Debug for KeepaliveTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeepaliveTimer")
            .field("armed", &self.is_armed())
            .finish()
    }
}

impl KeepaliveTimer {
    /// Creates an unarmed timer.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the timer to run `on_expire` after `timeout`.
    ///
    /// Returns `true` if a new arm cycle started. Returns `false`, without
    /// touching the pending expiry, if the timer is already armed or
    /// `timeout` is `None`.
    pub fn arm<F>(&self, timeout: Option<Duration>, on_expire: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let Some(delay) = timeout else {
            return false;
        };

        let mut slot = self.slot.lock();
        if slot.armed.is_some() {
            return false;
        }

        let cycle = slot.next_cycle;
        slot.next_cycle = slot.next_cycle.wrapping_add(1);

        // The task cannot observe the slot before `armed` is set below:
        // it has to take the same lock first.
        let shared = Arc::clone(&self.slot);
        let task = tokio::spawn(async move {
            sleep(delay).await;

            let fired = {
                let mut slot = shared.lock();
                let current = slot.armed.as_ref().is_some_and(|armed| armed.cycle == cycle);
                if current {
                    slot.armed = None;
                }
                current
            };

            if fired {
                trace!(cycle, "Keepalive timer expired");
                on_expire();
            }
        });

        slot.armed = Some(Armed {
            cycle,
            task: task.abort_handle(),
        });

        true
    }

    /// Cancels any pending expiry, then arms a fresh cycle.
    pub fn rearm<F>(&self, timeout: Option<Duration>, on_expire: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.disarm();
        self.arm(timeout, on_expire)
    }

    /// Cancels the pending expiry.
    ///
    /// Returns `true` if the timer was armed.
    pub fn disarm(&self) -> bool {
        let armed = self.slot.lock().armed.take();
        match armed {
            Some(armed) => {
                armed.task.abort();
                true
            }
            None => false,
        }
    }

    /// Returns `true` while an expiry is pending.
    #[inline]
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.slot.lock().armed.is_some()
    }
}

impl Drop for KeepaliveTimer {
    fn drop(&mut self) {
        self.disarm();
    }
}

// ============================================================================
// Tests
// ============================================================================
