//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (window > 0, capacity > 0, limits > 0)
//! - Refuse to start without an API key
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ProxyConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("auth.api_key must be set (X_API_KEY)")]
    MissingApiKey,

    #[error("rate_limit.window_secs must be greater than zero")]
    ZeroWindow,

    #[error("rate_limit.max_requests must be greater than zero")]
    ZeroCapacity,

    #[error("rate_limit.purge_interval_secs must be greater than zero")]
    ZeroPurgeInterval,

    #[error("forward.max_body_bytes must be greater than zero")]
    ZeroBodyLimit,

    #[error("forward.max_response_bytes must be greater than zero")]
    ZeroResponseLimit,

    #[error("observability.metrics_address is not a socket address: {0}")]
    MetricsAddress(String),
}

/// Check every semantic rule and collect all failures.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.auth.api_key.is_empty() {
        errors.push(ValidationError::MissingApiKey);
    }

    if config.rate_limit.enabled {
        if config.rate_limit.window_secs == 0 {
            errors.push(ValidationError::ZeroWindow);
        }
        if config.rate_limit.max_requests == 0 {
            errors.push(ValidationError::ZeroCapacity);
        }
        if config.rate_limit.purge_interval_secs == 0 {
            errors.push(ValidationError::ZeroPurgeInterval);
        }
    }

    if config.forward.max_body_bytes == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }
    if config.forward.max_response_bytes == 0 {
        errors.push(ValidationError::ZeroResponseLimit);
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
