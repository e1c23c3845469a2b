//! Per-node state, handles and the hook trait.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::lifecycle::flag::StopFlag;
use crate::lifecycle::signal::CompletionSignal;

/// Handle to a node inside its root's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// The root is always the first node created.
    pub const ROOT: NodeId = NodeId(0);

    pub(crate) fn index(self) -> usize {
        self.0
    }
}

impl From<usize> for NodeId {
    fn from(index: usize) -> Self {
        Self(index)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Progress flags of one node. Each flag only ever goes false → true.
#[derive(Debug, Default)]
pub(crate) struct NodeState {
    pub(crate) started: AtomicBool,
    pub(crate) stopped: AtomicBool,
    pub(crate) children_stopped: AtomicBool,
    pub(crate) completion: CompletionSignal,
}

/// A node's view of itself and of its tree.
///
/// Hooks receive a reference; components that finish stopping on another
/// thread clone it and call [`NodeContext::signal_completion`] from there.
#[derive(Debug, Clone)]
pub struct NodeContext {
    id: NodeId,
    name: Arc<str>,
    state: Arc<NodeState>,
    flag: Arc<StopFlag>,
}

impl NodeContext {
    pub(crate) fn new(id: NodeId, name: &str, flag: Arc<StopFlag>) -> Self {
        Self {
            id,
            name: Arc::from(name),
            state: Arc::new(NodeState::default()),
            flag,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// True once the root accepted a stop request, regardless of this
    /// node's own progress.
    pub fn is_stopping(&self) -> bool {
        self.flag.is_stopping()
    }

    pub fn is_started(&self) -> bool {
        self.state.started.load(Ordering::Acquire)
    }

    /// True once this node's completion fired and the wait phase observed it.
    pub fn is_stopped(&self) -> bool {
        self.state.stopped.load(Ordering::Acquire)
    }

    pub fn are_children_stopped(&self) -> bool {
        self.state.children_stopped.load(Ordering::Acquire)
    }

    /// Declare this node's own shutdown work finished.
    ///
    /// Safe to call from any thread; calling it again has no effect.
    pub fn signal_completion(&self) {
        self.state.completion.signal();
    }

    /// The tree-wide stopping flag.
    pub fn stop_flag(&self) -> &Arc<StopFlag> {
        &self.flag
    }

    pub(crate) fn state(&self) -> &NodeState {
        &self.state
    }
}

/// Lifecycle hooks of a component attached to the tree.
///
/// Every hook is optional. The default `on_stop` completes immediately, so a
/// component with synchronous shutdown overrides `on_stop` and does its work
/// there, while an asynchronous one hands the context to whatever finishes
/// the work and signals completion later, exactly once.
pub trait Stoppable: Send + Sync {
    /// Called once, after every child has been prepared.
    fn on_prepare(&self, _ctx: &NodeContext) {}

    /// Called once, before any child is started.
    fn on_start(&self, _ctx: &NodeContext) {}

    /// Begin shutting down. Runs before any child's `on_stop` and must not
    /// block on children: they have not been told to stop yet.
    fn on_stop(&self, ctx: &NodeContext) {
        ctx.signal_completion();
    }

    /// Called once every direct child has fully stopped, before the
    /// coordinator waits on this node's own completion.
    fn on_children_stopped(&self, _ctx: &NodeContext) {}
}

/// A component with no lifecycle work of its own, for grouping nodes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passive;

impl Stoppable for Passive {}
