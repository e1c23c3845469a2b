//! Lifecycle coordination subsystem.
//!
//! # Data Flow
//! ```text
//! Assembly:
//!     RootNode::new → attach(parent, name, component) ... → tree of NodeIds
//!
//! prepare():  leaves first      (a parent may rely on prepared children)
//! start():    root first        (a parent is ready before its children run)
//! stop():     on_stop root first, then wait for completions leaves first
//! ```
//!
//! # Design Decisions
//! - The root owns every node; parents and children are plain `NodeId`s
//! - The stopping flag is injected into every node as `Arc<StopFlag>`
//! - Each phase runs at most once, guarded by an atomic swap
//! - No hard stop timeout: a node that never completes blocks `stop()`

pub mod error;
pub mod flag;
pub mod node;
pub mod root;
pub mod signal;

pub use error::{LifecycleError, LifecycleResult};
pub use flag::StopFlag;
pub use node::{NodeContext, NodeId, Passive, Stoppable};
pub use root::{NodeSnapshot, RootNode, StopTimings, TreeSnapshot};
pub use signal::CompletionSignal;
