//! One-shot completion event.
//!
//! # Responsibilities
//! - Record that a node's own stop work has finished
//! - Wake every thread blocked on the event, and every task awaiting it
//!
//! # Design Decisions
//! - Condvar for blocking waiters, `Notify` for async waiters
//! - Signalling twice is harmless; the event never resets

use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;

/// A one-shot, broadcastable, waitable event.
#[derive(Debug, Default)]
pub struct CompletionSignal {
    fired: Mutex<bool>,
    cond: Condvar,
    notify: Notify,
}

impl CompletionSignal {
    /// Create an event that has not fired yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the event, waking all waiters.
    pub fn signal(&self) {
        let mut fired = self.fired.lock().unwrap_or_else(PoisonError::into_inner);
        if *fired {
            return;
        }
        *fired = true;
        drop(fired);

        self.cond.notify_all();
        self.notify.notify_waiters();
    }

    /// Return true once the event has fired.
    pub fn is_signalled(&self) -> bool {
        *self.fired.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block the calling thread until the event fires.
    pub fn wait(&self) {
        let fired = self.fired.lock().unwrap_or_else(PoisonError::into_inner);
        let _fired = self
            .cond
            .wait_while(fired, |fired| !*fired)
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Block for at most `timeout`.
    ///
    /// Returns true if the event fired before the timeout elapsed.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let fired = self.fired.lock().unwrap_or_else(PoisonError::into_inner);
        let (fired, _) = self
            .cond
            .wait_timeout_while(fired, timeout, |fired| !*fired)
            .unwrap_or_else(PoisonError::into_inner);
        *fired
    }

    /// Resolve once the event has fired, without blocking a runtime worker.
    pub async fn signalled(&self) {
        loop {
            // Register before checking so a concurrent `signal` is not missed.
            let notified = self.notify.notified();
            if self.is_signalled() {
                return;
            }
            notified.await;
        }
    }
}
