//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate bind addresses and that the two listeners do not collide
//! - Validate value ranges (limits > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: HostConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::HostConfig;

/// One semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field}: '{value}' is not a socket address")]
    InvalidAddress { field: &'static str, value: String },

    #[error("http and rpc listeners share the address {0}")]
    AddressConflict(String),

    #[error("{0} must be greater than zero")]
    ZeroLimit(&'static str),

    #[error("{0} must not be empty")]
    EmptyPath(&'static str),
}

/// Check `config`, collecting every problem.
pub fn validate_config(config: &HostConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let http = parse_address("http.bind_address", &config.http.bind_address, &mut errors);
    let rpc = parse_address("rpc.bind_address", &config.rpc.bind_address, &mut errors);
    if let Some(metrics) = config
        .observability
        .metrics_enabled
        .then_some(&config.observability.metrics_address)
    {
        parse_address("observability.metrics_address", metrics, &mut errors);
    }

    // Port 0 asks the OS for a fresh port, so identical ephemeral addresses never collide.
    if let (Some(http), Some(rpc)) = (http, rpc) {
        if http == rpc && http.port() != 0 {
            errors.push(ValidationError::AddressConflict(http.to_string()));
        }
    }

    let limits = [
        ("http.request_timeout_secs", config.http.request_timeout_secs as usize),
        ("http.max_body_bytes", config.http.max_body_bytes),
        ("http.max_concurrent_requests", config.http.max_concurrent_requests),
        ("rpc.max_message_bytes", config.rpc.max_message_bytes),
        ("rpc.max_concurrent_requests", config.rpc.max_concurrent_requests),
    ];
    errors.extend(
        limits
            .into_iter()
            .filter(|(_, value)| *value == 0)
            .map(|(field, _)| ValidationError::ZeroLimit(field)),
    );

    if let Some(tls) = &config.http.tls {
        if tls.cert_path.trim().is_empty() {
            errors.push(ValidationError::EmptyPath("http.tls.cert_path"));
        }
        if tls.key_path.trim().is_empty() {
            errors.push(ValidationError::EmptyPath("http.tls.key_path"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn parse_address(field: &'static str, value: &str, errors: &mut Vec<ValidationError>) -> Option<SocketAddr> {
    match value.parse() {
        Ok(addr) => Some(addr),
        Err(_) => {
            errors.push(ValidationError::InvalidAddress {
                field,
                value: value.to_string(),
            });
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::TlsConfig;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(validate_config(&HostConfig::default()), Ok(()));
    }

    #[test]
    fn listeners_must_not_share_an_address() {
        let mut config = HostConfig::default();
        config.rpc.bind_address = config.http.bind_address.clone();
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::AddressConflict("0.0.0.0:8080".into())])
        );

        config.http.bind_address = "127.0.0.1:0".into();
        config.rpc.bind_address = "127.0.0.1:0".into();
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn zero_limits_and_empty_tls_paths_are_reported_together() {
        let mut config = HostConfig::default();
        config.http.max_concurrent_requests = 0;
        config.rpc.max_message_bytes = 0;
        config.http.tls = Some(TlsConfig {
            cert_path: " ".into(),
            key_path: "key.pem".into(),
        });

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::ZeroLimit("http.max_concurrent_requests"),
                ValidationError::ZeroLimit("rpc.max_message_bytes"),
                ValidationError::EmptyPath("http.tls.cert_path"),
            ]
        );
    }

    #[test]
    fn metrics_address_checked_only_when_enabled() {
        let mut config = HostConfig::default();
        config.observability.metrics_address = "bogus".into();
        assert_eq!(validate_config(&config), Ok(()));

        config.observability.metrics_enabled = true;
        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(
            errors[0],
            ValidationError::InvalidAddress {
                field: "observability.metrics_address",
                ..
            }
        ));
    }
}
