//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! lifecycle walks and services produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (phase timings, slow and duplicate stops)
//!
//! Consumers:
//!     → stdout (fmt layer, filtered by RUST_LOG or config)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Diagnostics never influence control flow
//! - Metrics go through the `metrics` facade; without an installed
//!   recorder every call is a no-op

pub mod logging;
pub mod metrics;
