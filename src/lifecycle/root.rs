//! The root node: tree ownership and the prepare/start/stop cascades.
//!
//! # Walk Order
//! ```text
//! prepare:        children (newest first) → self
//! start:          self → children (newest first)
//! stop broadcast: self.on_stop → children (newest first)     non-blocking
//! stop wait:      children (newest first) → on_children_stopped → wait self
//! ```
//!
//! # Design Decisions
//! - Every walk runs synchronously on the calling thread
//! - Callers that lose a phase race block until the winner's walk is done
//! - The arena lock is held only to copy a node's entry, never across a hook
//! - Stop is two passes: every node learns about the stop before any node
//!   is waited on, and a parent is never considered stopped before its children

use std::sync::atomic::Ordering;
use std::sync::{Arc, Once, PoisonError, RwLock};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::lifecycle::error::{LifecycleError, LifecycleResult};
use crate::lifecycle::flag::StopFlag;
use crate::lifecycle::node::{NodeContext, NodeId, Stoppable};
use crate::observability::metrics;

/// Default grace period before a slow node is reported.
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_millis(1000);

/// Default budget for a single `on_stop` hook on the walking thread.
pub const DEFAULT_SLOW_HOOK: Duration = Duration::from_millis(10);

/// Diagnostic thresholds for the stop cascade. Neither aborts anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopTimings {
    /// How long to wait on a node's completion before warning.
    pub grace: Duration,
    /// How long an `on_stop` hook may block the broadcast walk before warning.
    pub slow_hook: Duration,
}

impl Default for StopTimings {
    fn default() -> Self {
        Self {
            grace: DEFAULT_STOP_GRACE,
            slow_hook: DEFAULT_SLOW_HOOK,
        }
    }
}

struct NodeEntry {
    ctx: NodeContext,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    component: Arc<dyn Stoppable>,
}

/// Point-in-time view of one node, for diagnostics.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NodeSnapshot {
    pub id: usize,
    pub name: String,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub started: bool,
    pub stopped: bool,
    pub children_stopped: bool,
}

/// Point-in-time view of a whole tree, in creation order.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TreeSnapshot {
    pub stopping: bool,
    pub nodes: Vec<NodeSnapshot>,
}

/// The distinguished node that owns the tree.
///
/// All operations take `&self` and may be called from several threads; only
/// the first call of each phase has any effect, and `prepare`/`start` return
/// only once that phase's walk has finished.
pub struct RootNode {
    nodes: RwLock<Vec<NodeEntry>>,
    flag: Arc<StopFlag>,
    prepared: Once,
    started: Once,
    timings: StopTimings,
}

impl RootNode {
    /// Create a tree whose root runs `component`.
    pub fn new(name: impl Into<String>, component: Arc<dyn Stoppable>) -> Self {
        Self::with_timings(name, component, StopTimings::default())
    }

    pub fn with_timings(
        name: impl Into<String>,
        component: Arc<dyn Stoppable>,
        timings: StopTimings,
    ) -> Self {
        let name = name.into();
        let flag = Arc::new(StopFlag::new());
        let root = NodeEntry {
            ctx: NodeContext::new(NodeId::ROOT, &name, Arc::clone(&flag)),
            parent: None,
            children: Vec::new(),
            component,
        };

        Self {
            nodes: RwLock::new(vec![root]),
            flag,
            prepared: Once::new(),
            started: Once::new(),
            timings,
        }
    }

    /// Attach `component` as the newest child of `parent`.
    ///
    /// Fails once the tree is stopping.
    pub fn attach(
        &self,
        parent: NodeId,
        name: impl Into<String>,
        component: Arc<dyn Stoppable>,
    ) -> LifecycleResult<NodeContext> {
        let name = name.into();
        let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);

        let Some(parent_entry) = nodes.get(parent.index()) else {
            tracing::error!(parent = %parent, child = %name, "Attach to unknown parent");
            return Err(LifecycleError::UnknownNode(parent));
        };

        // Checked under the write lock: a stop walk cannot be in progress
        // without the flag already being visible here.
        if self.flag.is_stopping() {
            let parent_name = parent_entry.ctx.name().to_string();
            tracing::error!(
                parent = %parent_name,
                child = %name,
                "Precondition violated: attach to a stopping tree"
            );
            return Err(LifecycleError::ParentStopping {
                parent: parent_name,
                child: name,
            });
        }

        let id = NodeId::from(nodes.len());
        let ctx = NodeContext::new(id, &name, Arc::clone(&self.flag));
        nodes.push(NodeEntry {
            ctx: ctx.clone(),
            parent: Some(parent),
            children: Vec::new(),
            component,
        });
        nodes[parent.index()].children.push(id);

        tracing::debug!(node = %name, id = %id, parent = %parent, "Node attached");
        Ok(ctx)
    }

    /// Run the prepare walk once.
    pub fn prepare(&self) {
        self.prepared.call_once(|| {
            self.run_phase("prepare", || self.prepare_recursive(NodeId::ROOT));
        });
    }

    /// Prepare if needed, then run the start walk once.
    pub fn start(&self) {
        self.prepare();

        self.started.call_once(|| {
            self.run_phase("start", || self.start_recursive(NodeId::ROOT));
        });
    }

    /// Request a stop and run the broadcast walk, without waiting.
    ///
    /// Returns true only for the call that initiated the stop. Later calls
    /// log a warning and do nothing else.
    pub fn stop_async(&self) -> bool {
        if !self.flag.request() {
            tracing::warn!(root = %self.name(), "Stop requested again");
            metrics::record_duplicate_stop();
            return false;
        }

        self.run_phase("stop_broadcast", || {
            self.stop_async_recursive(NodeId::ROOT)
        });
        true
    }

    /// Stop the whole tree and block until every node has stopped.
    ///
    /// Requires a completed `start()`; a start walk still in progress on
    /// another thread does not count.
    ///
    /// Must not be called from a hook of this tree. If another call already
    /// initiated the stop, this returns immediately without waiting.
    pub fn stop(&self) -> LifecycleResult<()> {
        if !self.started.is_completed() {
            tracing::error!(root = %self.name(), "Precondition violated: stop() before start()");
            return Err(LifecycleError::NotStarted(self.name()));
        }

        if self.stop_async() {
            self.run_phase("stop_wait", || self.stop_recursive(NodeId::ROOT));
        }
        Ok(())
    }

    pub fn is_stopping(&self) -> bool {
        self.flag.is_stopping()
    }

    /// Sleep for at most `timeout`, waking early once the tree is stopping.
    ///
    /// Returns the stopping state.
    pub fn wait_for_stop(&self, timeout: Duration) -> bool {
        self.flag.wait_timeout(timeout)
    }

    /// The tree-wide stopping flag.
    pub fn stop_flag(&self) -> Arc<StopFlag> {
        Arc::clone(&self.flag)
    }

    /// The root's own context.
    pub fn context(&self) -> NodeContext {
        self.read()[NodeId::ROOT.index()].ctx.clone()
    }

    /// Context of any node in the tree.
    pub fn node(&self, id: NodeId) -> Option<NodeContext> {
        self.read().get(id.index()).map(|entry| entry.ctx.clone())
    }

    pub fn name(&self) -> String {
        self.read()[NodeId::ROOT.index()].ctx.name().to_string()
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Always false: the root is itself a node of the tree.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn snapshot(&self) -> TreeSnapshot {
        let nodes = self.read();
        TreeSnapshot {
            stopping: self.flag.is_stopping(),
            nodes: nodes
                .iter()
                .map(|entry| NodeSnapshot {
                    id: entry.ctx.id().index(),
                    name: entry.ctx.name().to_string(),
                    parent: entry.parent.map(NodeId::index),
                    children: entry.children.iter().map(|c| c.index()).collect(),
                    started: entry.ctx.is_started(),
                    stopped: entry.ctx.is_stopped(),
                    children_stopped: entry.ctx.are_children_stopped(),
                })
                .collect(),
        }
    }

    // --- Walks ---

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<NodeEntry>> {
        self.nodes.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy out what a walk needs, children newest first.
    fn visit(&self, id: NodeId) -> (NodeContext, Arc<dyn Stoppable>, Vec<NodeId>) {
        let nodes = self.read();
        let entry = &nodes[id.index()];
        (
            entry.ctx.clone(),
            Arc::clone(&entry.component),
            entry.children.iter().rev().copied().collect(),
        )
    }

    fn run_phase(&self, phase: &'static str, walk: impl FnOnce()) {
        let start = Instant::now();
        tracing::info!(root = %self.name(), phase, "Lifecycle phase begin");
        walk();
        let elapsed = start.elapsed();
        metrics::record_phase(phase, elapsed);
        tracing::info!(
            root = %self.name(),
            phase,
            elapsed_ms = elapsed.as_millis() as u64,
            "Lifecycle phase complete"
        );
    }

    fn prepare_recursive(&self, id: NodeId) {
        let (ctx, component, children) = self.visit(id);
        for child in children {
            self.prepare_recursive(child);
        }
        tracing::debug!(node = %ctx.name(), "on_prepare");
        component.on_prepare(&ctx);
    }

    fn start_recursive(&self, id: NodeId) {
        let (ctx, component, children) = self.visit(id);
        ctx.state().started.store(true, Ordering::Release);
        tracing::debug!(node = %ctx.name(), "on_start");
        component.on_start(&ctx);
        for child in children {
            self.start_recursive(child);
        }
    }

    fn stop_async_recursive(&self, id: NodeId) {
        let (ctx, component, children) = self.visit(id);

        let start = Instant::now();
        tracing::debug!(node = %ctx.name(), "on_stop");
        component.on_stop(&ctx);
        let elapsed = start.elapsed();
        if elapsed >= self.timings.slow_hook {
            tracing::warn!(
                node = %ctx.name(),
                elapsed_ms = elapsed.as_millis() as u64,
                "on_stop blocked the stop broadcast"
            );
        }

        for child in children {
            self.stop_async_recursive(child);
        }
    }

    fn stop_recursive(&self, id: NodeId) {
        let (ctx, component, children) = self.visit(id);

        let start = Instant::now();
        for child in children {
            self.stop_recursive(child);
        }

        ctx.state().children_stopped.store(true, Ordering::Release);
        tracing::debug!(node = %ctx.name(), "on_children_stopped");
        component.on_children_stopped(&ctx);

        let completion = &ctx.state().completion;
        if !completion.wait_timeout(self.timings.grace) {
            tracing::warn!(
                node = %ctx.name(),
                grace_ms = self.timings.grace.as_millis() as u64,
                "Waiting for node to stop"
            );
            metrics::record_slow_stop(ctx.name());
            completion.wait();
        }

        ctx.state().stopped.store(true, Ordering::Release);
        metrics::record_node_stopped(ctx.name(), start.elapsed());
        tracing::debug!(node = %ctx.name(), "Node stopped");
    }
}

impl Drop for RootNode {
    fn drop(&mut self) {
        let nodes = self.nodes.get_mut().unwrap_or_else(PoisonError::into_inner);
        let root = &nodes[NodeId::ROOT.index()].ctx;
        if self.started.is_completed() && !root.are_children_stopped() {
            tracing::error!(
                root = %root.name(),
                "Precondition violated: tree dropped while started and not stopped"
            );
            if cfg!(debug_assertions) && !std::thread::panicking() {
                panic!("tree '{}' dropped while started and not stopped", root.name());
            }
        }
    }
}

impl std::fmt::Debug for RootNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RootNode")
            .field("name", &self.name())
            .field("nodes", &self.len())
            .field("stopping", &self.is_stopping())
            .field("timings", &self.timings)
            .finish()
    }
}
