//! Tree-wide stopping flag.
//!
//! Owned by the root and handed to every node as `Arc<StopFlag>`, so any
//! component can ask "is the tree shutting down?" without reaching the root.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::Notify;

/// The stopping flag shared by every node of one tree.
#[derive(Debug, Default)]
pub struct StopFlag {
    /// Fast path for readers.
    stopping: AtomicBool,
    /// Guards the transition so waiters cannot miss it.
    lock: Mutex<()>,
    cond: Condvar,
    notify: Notify,
}

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once a stop request has been accepted.
    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }

    /// Set the flag and wake all waiters.
    ///
    /// Returns true only for the call that performed the transition.
    pub(crate) fn request(&self) -> bool {
        let already = {
            let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.stopping.swap(true, Ordering::AcqRel)
        };
        if already {
            return false;
        }

        self.cond.notify_all();
        self.notify.notify_waiters();
        true
    }

    /// Sleep until `deadline` unless the tree starts stopping first.
    ///
    /// Returns the stopping state on wake-up.
    pub fn wait_until(&self, deadline: Instant) -> bool {
        let mut guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if self.is_stopping() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            guard = self
                .cond
                .wait_timeout(guard, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Sleep for at most `timeout` unless the tree starts stopping first.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.wait_until(Instant::now() + timeout)
    }

    /// Resolve once the tree is stopping.
    pub async fn stopping(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_stopping() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_request_only_once() {
        let flag = StopFlag::new();
        assert!(!flag.is_stopping());
        assert!(flag.request());
        assert!(!flag.request());
        assert!(flag.is_stopping());
    }

    #[test]
    fn test_wait_until_deadline_without_stop() {
        let flag = StopFlag::new();
        let start = Instant::now();
        assert!(!flag.wait_timeout(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_request_wakes_sleeper_early() {
        let flag = Arc::new(StopFlag::new());
        let remote = Arc::clone(&flag);

        let sleeper = thread::spawn(move || {
            let start = Instant::now();
            let stopping = remote.wait_timeout(Duration::from_secs(10));
            (stopping, start.elapsed())
        });

        thread::sleep(Duration::from_millis(20));
        assert!(flag.request());

        let (stopping, elapsed) = sleeper.join().unwrap();
        assert!(stopping);
        assert!(elapsed < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_async_stopping_resolves() {
        let flag = Arc::new(StopFlag::new());
        let remote = Arc::clone(&flag);
        let waiter = tokio::spawn(async move { remote.stopping().await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        flag.request();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("stopping future was not woken")
            .unwrap();
    }
}
