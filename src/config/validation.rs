//! Configuration validation.
//!
//! Serde handles syntax; this checks values. All problems are collected
//! rather than stopping at the first.

use std::net::SocketAddr;

use http::StatusCode;
use thiserror::Error;

use crate::config::schema::ServerConfig;
use crate::http::headers::Headers;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("fallback.status: {0} is not a valid HTTP status code")]
    InvalidStatus(u16),

    #[error("fallback.content_type: {0}")]
    InvalidContentType(String),
}

pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::Zero { field: "listener.max_connections" });
    }
    if config.listener.max_head_bytes == 0 {
        errors.push(ValidationError::Zero { field: "listener.max_head_bytes" });
    }
    if config.timeouts.exchange_secs == 0 {
        errors.push(ValidationError::Zero { field: "timeouts.exchange_secs" });
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }
    if StatusCode::from_u16(config.fallback.status).is_err() {
        errors.push(ValidationError::InvalidStatus(config.fallback.status));
    }
    let headers: Headers = [("Content-Type", config.fallback.content_type.as_str())]
        .into_iter()
        .collect();
    if let Err(e) = headers.validate() {
        errors.push(ValidationError::InvalidContentType(e.to_string()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(validate_config(&ServerConfig::default()), Ok(()));
    }

    #[test]
    fn collects_every_error() {
        let mut config = ServerConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.listener.max_connections = 0;
        config.fallback.status = 42;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ValidationError::InvalidStatus(42)));
        assert!(errors.contains(&ValidationError::Zero { field: "listener.max_connections" }));
    }

    #[test]
    fn metrics_address_checked_only_when_enabled() {
        let mut config = ServerConfig::default();
        config.observability.metrics_address = "nope".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn content_type_must_be_single_line() {
        let mut config = ServerConfig::default();
        config.fallback.content_type = "text/plain\r\nX-Injected: 1".into();
        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(errors[0], ValidationError::InvalidContentType(_)));
    }
}
