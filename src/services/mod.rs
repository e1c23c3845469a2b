//! Services that run under the lifecycle tree.
//!
//! # Data Flow
//! ```text
//! RootNode
//!     └── overlay.rs (OverlayManager: session registry)
//!             ├── session.rs (PeerSession: timer-driven exchanges)
//!             └── ...
//! ```
//!
//! # Design Decisions
//! - Sessions run their timers as Tokio tasks and finish stopping there
//! - The overlay completes only after every session has stopped

pub mod overlay;
pub mod session;

pub use overlay::OverlayManager;
pub use session::{PeerSession, SessionState};
