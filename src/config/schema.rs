//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::lifecycle::StopTimings;

/// Root configuration for a node.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct NodeConfig {
    /// Stop-cascade diagnostics.
    pub lifecycle: LifecycleConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,

    /// Peer overlay settings.
    pub overlay: OverlayConfig,
}

/// Lifecycle coordinator settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Grace period before a node still stopping is reported, in milliseconds.
    pub stop_grace_ms: u64,

    /// Time an `on_stop` hook may block the broadcast walk, in milliseconds.
    pub slow_hook_ms: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            stop_grace_ms: 1000,
            slow_hook_ms: 10,
        }
    }
}

impl LifecycleConfig {
    pub fn timings(&self) -> StopTimings {
        StopTimings {
            grace: Duration::from_millis(self.stop_grace_ms),
            slow_hook: Duration::from_millis(self.slow_hook_ms),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Peer overlay and session timer settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct OverlayConfig {
    /// Number of peer sessions to open at startup.
    pub peers: usize,

    /// Interval between exchanges with a peer, in milliseconds.
    pub exchange_interval_ms: u64,

    /// Time to wait for an acknowledgement, in milliseconds.
    pub ack_timeout_ms: u64,

    /// Time to wait for a full response, in milliseconds.
    pub response_timeout_ms: u64,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            peers: 3,
            exchange_interval_ms: 500,
            ack_timeout_ms: 250,
            response_timeout_ms: 1000,
        }
    }
}
