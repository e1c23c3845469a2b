//! Configuration validation.
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: NodeConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::NodeConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("overlay.ack_timeout_ms ({ack_ms}) must be below overlay.response_timeout_ms ({response_ms})")]
    AckAfterResponse { ack_ms: u64, response_ms: u64 },

    #[error("invalid metrics address '{0}'")]
    MetricsAddress(String),

    #[error("unknown log level '{0}'")]
    LogLevel(String),
}

/// Check a parsed configuration.
pub fn validate_config(config: &NodeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let positive = [
        ("lifecycle.stop_grace_ms", config.lifecycle.stop_grace_ms),
        ("overlay.exchange_interval_ms", config.overlay.exchange_interval_ms),
        ("overlay.ack_timeout_ms", config.overlay.ack_timeout_ms),
        ("overlay.response_timeout_ms", config.overlay.response_timeout_ms),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    let overlay = &config.overlay;
    if overlay.ack_timeout_ms >= overlay.response_timeout_ms {
        errors.push(ValidationError::AckAfterResponse {
            ack_ms: overlay.ack_timeout_ms,
            response_ms: overlay.response_timeout_ms,
        });
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            observability.metrics_address.clone(),
        ));
    }

    if observability.log_level.parse::<tracing::Level>().is_err() {
        errors.push(ValidationError::LogLevel(observability.log_level.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
