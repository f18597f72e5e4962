//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Enabled sections must carry what they need
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ServerConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("{0} must not be empty when enabled")]
    Empty(&'static str),

    #[error("observability.metrics_path must start with '/', got {0:?}")]
    MetricsPath(String),
}

/// Check a parsed configuration, collecting every problem.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero("timeouts.request_secs"));
    }

    if config.mimic.enabled {
        if config.mimic.path.trim().is_empty() {
            errors.push(ValidationError::Empty("mimic.path"));
        }
        if config.mimic.max_form_bytes == 0 {
            errors.push(ValidationError::Zero("mimic.max_form_bytes"));
        }
    }

    if config.cors.enabled && config.cors.origins.iter().all(|o| o.trim().is_empty()) {
        errors.push(ValidationError::Empty("cors.origins"));
    }

    if config.host.enabled && config.host.allowed.iter().all(|h| h.trim().is_empty()) {
        errors.push(ValidationError::Empty("host.allowed"));
    }

    if config.rate_limit.enabled && config.rate_limit.requests_per_second == 0 {
        errors.push(ValidationError::Zero("rate_limit.requests_per_second"));
    }

    if config.limits.max_open_files == Some(0) {
        errors.push(ValidationError::Zero("limits.max_open_files"));
    }

    if config.observability.metrics_enabled && !config.observability.metrics_path.starts_with('/') {
        errors.push(ValidationError::MetricsPath(
            config.observability.metrics_path.clone(),
        ));
    }

    if config.profiling.enabled {
        check_address(&mut errors, "profiling.bind_address", &config.profiling.bind_address);
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&ServerConfig::default()), Ok(()));
    }

    #[test]
    fn test_all_errors_are_reported() {
        let mut config = ServerConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.timeouts.request_secs = 0;
        config.cors.enabled = true;
        config.host.enabled = true;
        config.host.allowed = vec!["  ".into()];
        config.rate_limit.enabled = true;
        config.rate_limit.requests_per_second = 0;
        config.limits.max_open_files = Some(0);
        config.observability.metrics_path = "metrics".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 7);
        assert!(errors.contains(&ValidationError::Empty("cors.origins")));
        assert!(errors.contains(&ValidationError::Zero("rate_limit.requests_per_second")));
    }

    #[test]
    fn test_disabled_sections_are_not_checked() {
        let mut config = ServerConfig::default();
        config.rate_limit.requests_per_second = 0;
        config.profiling.bind_address = "bogus".into();
        config.mimic.path = String::new();
        assert!(validate_config(&config).is_ok());

        config.mimic.enabled = true;
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::Empty("mimic.path")])
        );
    }
}
