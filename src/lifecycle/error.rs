//! Lifecycle precondition errors.

use thiserror::Error;

use crate::lifecycle::node::NodeId;

/// Caller or assembly errors detected by the coordinator.
///
/// Each variant is a programming error: the tree's ordering guarantees would
/// be broken if the operation went ahead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// A child was attached after the tree began stopping.
    #[error("cannot attach '{child}' to '{parent}': tree is already stopping")]
    ParentStopping { parent: String, child: String },

    /// The parent handle does not belong to this tree.
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    /// `stop()` was called before `start()`.
    #[error("stop() called on '{0}' before start()")]
    NotStarted(String),
}

/// Result type for lifecycle operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;
