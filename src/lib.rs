//! Lifecycle coordination for a peer-to-peer node.
//!
//! Components attach to a [`RootNode`] as a tree. The root prepares them
//! leaves first, starts them root first, and stops them in two passes: every
//! component is told to stop root first, then each one is awaited leaves first.

pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod services;

pub use config::NodeConfig;
pub use lifecycle::{NodeContext, NodeId, RootNode, Stoppable};
