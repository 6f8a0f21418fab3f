//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check server ids are usable as definition keys
//! - Validate value ranges (delays > 0, timeouts > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: SynthConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use thiserror::Error;

use crate::config::schema::SynthConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("servers.enabled must list at least one server")]
    NoServers,

    #[error("server id `{0}` is listed more than once")]
    DuplicateServer(String),

    #[error("server id `{0:?}` must be non-empty and must not contain ':'")]
    InvalidServerId(String),

    #[error("{0} must not be empty")]
    EmptyPath(&'static str),

    #[error("retry.delay_secs must be greater than zero")]
    ZeroRetryDelay,

    #[error("probe.timeout_ms must be greater than zero")]
    ZeroProbeTimeout,

    #[error("discovery.definition_prefix must not be empty")]
    EmptyDefinitionPrefix,

    #[error("discovery.definition_prefix `{definition}` must start with discovery.declared_prefix `{declared}`")]
    PrefixMismatch { declared: String, definition: String },
}

/// Validate a parsed configuration, collecting every error found.
pub fn validate_config(config: &SynthConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.servers.enabled.is_empty() {
        errors.push(ValidationError::NoServers);
    }

    let mut seen = HashSet::new();
    for id in &config.servers.enabled {
        if id.is_empty() || id.contains(':') {
            errors.push(ValidationError::InvalidServerId(id.clone()));
        } else if !seen.insert(id.as_str()) {
            errors.push(ValidationError::DuplicateServer(id.clone()));
        }
    }

    if config.templates.server_dir.as_os_str().is_empty() {
        errors.push(ValidationError::EmptyPath("templates.server_dir"));
    }
    if config.templates.location_dir.as_os_str().is_empty() {
        errors.push(ValidationError::EmptyPath("templates.location_dir"));
    }
    if config.output.path.as_os_str().is_empty() {
        errors.push(ValidationError::EmptyPath("output.path"));
    }

    if config.retry.delay_secs == 0 {
        errors.push(ValidationError::ZeroRetryDelay);
    }
    if config.probe.timeout_ms == 0 {
        errors.push(ValidationError::ZeroProbeTimeout);
    }

    let discovery = &config.discovery;
    if discovery.definition_prefix.is_empty() {
        errors.push(ValidationError::EmptyDefinitionPrefix);
    } else if !discovery.definition_prefix.starts_with(&discovery.declared_prefix) {
        errors.push(ValidationError::PrefixMismatch {
            declared: discovery.declared_prefix.clone(),
            definition: discovery.definition_prefix.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
