//! Shared stop signal for cooperative run cancellation.
//!
//! One signal per run, shared by every worker and the watchdog. Whoever
//! trips it first records the stop reason; later trips are no-ops. The
//! flag check is a single atomic load, cheap enough for workers to poll
//! once per iteration. A worker must not start a new iteration after
//! observing the flag, but an iteration already in flight runs to
//! completion; the underlying query call is never aborted.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use qstorm_types::StopReason;
use tracing::debug;

/// First-writer-wins cancellation token.
#[derive(Debug, Default)]
pub struct StopSignal {
    tripped: AtomicBool,
    reason: Mutex<Option<StopReason>>,
}

impl StopSignal {
    /// A fresh, untripped signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the signal has been tripped. Non-blocking.
    #[inline]
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.tripped.load(Ordering::Acquire)
    }

    /// Trip the signal with `reason`. Only the first caller's reason is
    /// kept; returns whether this call was the one that tripped it.
    pub fn trip(&self, reason: StopReason) -> bool {
        let mut slot = self.reason.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(reason);
        drop(slot);
        self.tripped.store(true, Ordering::Release);
        debug!(%reason, "stop signal tripped");
        true
    }

    /// The recorded stop reason, if the signal was tripped.
    #[must_use]
    pub fn reason(&self) -> Option<StopReason> {
        *self.reason.lock()
    }
}
