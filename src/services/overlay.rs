//! Peer overlay manager.
//!
//! # Responsibilities
//! - Open peer sessions and attach them as children of the overlay node
//! - Track live sessions
//! - Finish stopping only after every session has stopped

use std::sync::Arc;

use dashmap::DashMap;
use tokio::runtime::Handle;
use uuid::Uuid;

use crate::config::OverlayConfig;
use crate::lifecycle::{LifecycleResult, NodeContext, NodeId, RootNode, Stoppable};
use crate::observability::metrics;
use crate::services::session::PeerSession;

/// Owner of the peer sessions of one node.
pub struct OverlayManager {
    config: OverlayConfig,
    runtime: Handle,
    sessions: DashMap<Uuid, Arc<PeerSession>>,
}

impl OverlayManager {
    pub fn new(config: OverlayConfig, runtime: Handle) -> Self {
        Self {
            config,
            runtime,
            sessions: DashMap::new(),
        }
    }

    /// Open a session with a new peer under the overlay node `overlay`.
    ///
    /// Fails once the tree is stopping.
    pub fn add_session(&self, root: &RootNode, overlay: NodeId) -> LifecycleResult<Arc<PeerSession>> {
        let peer = Uuid::new_v4();
        let session = Arc::new(PeerSession::new(peer, self.config.clone(), self.runtime.clone()));

        root.attach(overlay, format!("peer-{}", peer), Arc::clone(&session) as Arc<dyn Stoppable>)?;

        self.sessions.insert(peer, Arc::clone(&session));
        metrics::record_active_sessions(self.sessions.len());
        tracing::info!(peer = %peer, "Peer session opened");
        Ok(session)
    }

    pub fn session(&self, peer: &Uuid) -> Option<Arc<PeerSession>> {
        self.sessions.get(peer).map(|r| Arc::clone(r.value()))
    }

    pub fn sessions(&self) -> Vec<Arc<PeerSession>> {
        self.sessions.iter().map(|r| Arc::clone(r.value())).collect()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

impl Stoppable for OverlayManager {
    fn on_prepare(&self, ctx: &NodeContext) {
        tracing::info!(node = %ctx.name(), sessions = self.sessions.len(), "Overlay prepared");
    }

    fn on_start(&self, ctx: &NodeContext) {
        tracing::info!(node = %ctx.name(), "Overlay started");
    }

    fn on_stop(&self, ctx: &NodeContext) {
        tracing::info!(
            node = %ctx.name(),
            sessions = self.sessions.len(),
            "Overlay closing"
        );
    }

    fn on_children_stopped(&self, ctx: &NodeContext) {
        self.sessions.clear();
        metrics::record_active_sessions(0);
        tracing::info!(node = %ctx.name(), "All peer sessions stopped");
        ctx.signal_completion();
    }
}
