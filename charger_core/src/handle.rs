//! Cross-thread control surface for a running controller.
//!
//! The controller blocks its own thread for the whole session. Other threads
//! (signal handlers, a UI) hold an `AbortHandle` to request a stop and a
//! `StatusHandle` to read the latest published status.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::status::ChargeStatus;

/// Requests a transition to `Aborted` at the controller's next safe point.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle {
    flag: Arc<AtomicBool>,
}

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Clear a stale request before a new session.
    pub(crate) fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Read side of the status the controller publishes on every transition.
#[derive(Debug, Clone, Default)]
pub struct StatusHandle {
    inner: Arc<Mutex<ChargeStatus>>,
}

impl StatusHandle {
    pub fn status(&self) -> ChargeStatus {
        match self.inner.lock() {
            Ok(g) => g.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub(crate) fn publish(&self, status: ChargeStatus) {
        match self.inner.lock() {
            Ok(mut g) => *g = status,
            Err(poisoned) => *poisoned.into_inner() = status,
        }
    }
}
