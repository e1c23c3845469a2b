//! Per-peer protocol session.
//!
//! # Responsibilities
//! - Run periodic exchanges with one peer on a Tokio task
//! - Bound every exchange by the acknowledgement deadline
//! - Conclude and cancel timers when the tree stops
//!
//! # State Transitions
//! ```text
//! Running → Concluded:      conclude(false)
//! Running → ForceConcluded: conclude(true), done by on_stop
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rand::Rng;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time;
use uuid::Uuid;

use crate::config::OverlayConfig;
use crate::lifecycle::{NodeContext, Stoppable};
use crate::observability::metrics;

/// Session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Running,
    Concluded,
    ForceConcluded,
}

#[derive(Debug)]
struct ExchangeTask {
    handle: JoinHandle<()>,
    cancel: broadcast::Sender<()>,
}

#[derive(Debug, Default)]
struct Counters {
    exchanges: AtomicU64,
    timeouts: AtomicU64,
}

/// A timer-driven session with one peer.
///
/// The session finishes stopping on `runtime`, so the tree's `stop()` must
/// run off that runtime's worker threads (e.g. via `spawn_blocking`); on a
/// current-thread runtime a `stop()` called from the runtime never returns.
#[derive(Debug)]
pub struct PeerSession {
    peer: Uuid,
    config: OverlayConfig,
    runtime: Handle,
    state: Mutex<SessionState>,
    task: Mutex<Option<ExchangeTask>>,
    counters: Arc<Counters>,
}

impl PeerSession {
    pub fn new(peer: Uuid, config: OverlayConfig, runtime: Handle) -> Self {
        Self {
            peer,
            config,
            runtime,
            state: Mutex::new(SessionState::Running),
            task: Mutex::new(None),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn peer(&self) -> Uuid {
        self.peer
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Completed exchanges.
    pub fn exchanges(&self) -> u64 {
        self.counters.exchanges.load(Ordering::Relaxed)
    }

    /// Exchanges whose acknowledgement missed the deadline.
    pub fn timeouts(&self) -> u64 {
        self.counters.timeouts.load(Ordering::Relaxed)
    }

    /// Finish the session. Returns false if it was already concluded.
    pub fn conclude(&self, force: bool) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != SessionState::Running {
            tracing::warn!(peer = %self.peer, state = ?*state, "Session already concluded");
            return false;
        }
        *state = if force {
            SessionState::ForceConcluded
        } else {
            SessionState::Concluded
        };
        tracing::debug!(peer = %self.peer, state = ?*state, "Session concluded");
        true
    }

    fn take_task(&self) -> Option<ExchangeTask> {
        self.task.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

impl Stoppable for PeerSession {
    fn on_start(&self, _ctx: &NodeContext) {
        if self.state() != SessionState::Running {
            tracing::warn!(peer = %self.peer, "Session concluded before start, timers not armed");
            return;
        }

        let (cancel, cancel_rx) = broadcast::channel(1);
        let handle = self.runtime.spawn(exchange_loop(
            self.peer,
            self.config.clone(),
            Arc::clone(&self.counters),
            cancel_rx,
        ));

        *self.task.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(ExchangeTask { handle, cancel });
        tracing::debug!(peer = %self.peer, "Session timers armed");
    }

    fn on_stop(&self, ctx: &NodeContext) {
        if self.state() == SessionState::Running {
            self.conclude(true);
        }

        let Some(task) = self.take_task() else {
            ctx.signal_completion();
            return;
        };

        if task.cancel.send(()).is_err() {
            tracing::debug!(peer = %self.peer, "Exchange loop already exited");
        }
        let ctx = ctx.clone();
        let peer = self.peer;
        self.runtime.spawn(async move {
            // Wait for any in-flight exchange to unwind before reporting.
            if let Err(e) = task.handle.await {
                tracing::error!(peer = %peer, error = %e, "Session task failed");
            }
            tracing::debug!(peer = %peer, "Session stopped");
            ctx.signal_completion();
        });
    }
}

async fn exchange_loop(
    peer: Uuid,
    config: OverlayConfig,
    counters: Arc<Counters>,
    mut cancel: broadcast::Receiver<()>,
) {
    let interval_ms = config.exchange_interval_ms;
    let ack_timeout = Duration::from_millis(config.ack_timeout_ms);

    loop {
        let jitter = rand::thread_rng().gen_range(0..=interval_ms / 10);
        tokio::select! {
            _ = time::sleep(Duration::from_millis(interval_ms + jitter)) => {}
            _ = cancel.recv() => break,
        }

        // Simulated round trip.
        let latency = rand::thread_rng().gen_range(0..=config.response_timeout_ms / 2);
        tokio::select! {
            acked = time::timeout(ack_timeout, time::sleep(Duration::from_millis(latency))) => {
                if acked.is_ok() {
                    counters.exchanges.fetch_add(1, Ordering::Relaxed);
                    tracing::trace!(peer = %peer, latency_ms = latency, "Exchange acknowledged");
                } else {
                    counters.timeouts.fetch_add(1, Ordering::Relaxed);
                    metrics::record_ack_timeout();
                    tracing::warn!(peer = %peer, "Acknowledgement timed out, marking peer visited");
                }
            }
            _ = cancel.recv() => break,
        }
    }

    tracing::debug!(peer = %peer, "Exchange loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> PeerSession {
        PeerSession::new(Uuid::new_v4(), OverlayConfig::default(), Handle::current())
    }

    #[tokio::test]
    async fn test_conclude_once() {
        let session = session();
        assert_eq!(session.state(), SessionState::Running);
        assert!(session.conclude(false));
        assert_eq!(session.state(), SessionState::Concluded);
        assert!(!session.conclude(true));
        assert_eq!(session.state(), SessionState::Concluded);
    }

    #[tokio::test]
    async fn test_stop_after_exchange_loop_exited_still_completes() {
        use crate::lifecycle::{NodeId, StopFlag};

        let session = session();
        let (cancel, cancel_rx) = broadcast::channel(1);
        drop(cancel_rx);
        let handle = tokio::spawn(async {});
        *session.task.lock().unwrap() = Some(ExchangeTask { handle, cancel });

        let ctx = NodeContext::new(NodeId::from(1), "peer", Arc::new(StopFlag::new()));
        session.on_stop(&ctx);

        time::timeout(Duration::from_secs(1), ctx.state().completion.signalled())
            .await
            .expect("session never signalled completion");
        assert_eq!(session.state(), SessionState::ForceConcluded);
    }

    #[tokio::test]
    async fn test_counters_start_at_zero() {
        let session = session();
        assert_eq!(session.exchanges(), 0);
        assert_eq!(session.timeouts(), 0);
    }
}
