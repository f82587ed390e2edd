//! Configuration validation.
//!
//! Serde handles syntax; this module checks values. All problems are
//! reported at once rather than stopping at the first.

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::AppConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field}: must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field}: must not be empty")]
    Empty { field: &'static str },
}

/// Validate a configuration, collecting every error found.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(
        &mut errors,
        "listener.bind_address",
        &config.listener.bind_address,
    );
    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if config.database.retry_interval_ms == 0 {
        errors.push(ValidationError::Zero {
            field: "database.retry_interval_ms",
        });
    }
    if config.database.connect_timeout_secs == 0 {
        errors.push(ValidationError::Zero {
            field: "database.connect_timeout_secs",
        });
    }
    if config.http.request_timeout_secs == 0 {
        errors.push(ValidationError::Zero {
            field: "http.request_timeout_secs",
        });
    }
    if config.database.url.as_deref().is_some_and(str::is_empty) {
        errors.push(ValidationError::Empty {
            field: "database.url",
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}
