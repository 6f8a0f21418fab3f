//! Service definition grammar.
//!
//! `serverId:locationId:matchPattern:backendTarget`
//!
//! The value is split into at most four fields, so the backend target keeps
//! its own colons (`http://web:8080`). Fewer than four fields is invalid.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("expected 4 ':'-separated fields, found {found}")]
    FieldCount { found: usize },

    #[error("field `{0}` must not be empty")]
    EmptyField(&'static str),
}

/// One routing rule declared on a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDefinition {
    pub server_id: String,
    pub location_id: String,
    /// May be empty.
    pub match_pattern: String,
    pub backend_target: String,
}

impl ServiceDefinition {
    pub fn parse(raw: &str) -> Result<Self, DefinitionError> {
        let fields: Vec<&str> = raw.splitn(4, ':').collect();
        let [server_id, location_id, match_pattern, backend_target] = fields[..] else {
            return Err(DefinitionError::FieldCount { found: fields.len() });
        };

        if server_id.is_empty() {
            return Err(DefinitionError::EmptyField("serverId"));
        }
        if location_id.is_empty() {
            return Err(DefinitionError::EmptyField("locationId"));
        }
        if backend_target.is_empty() {
            return Err(DefinitionError::EmptyField("backendTarget"));
        }

        Ok(Self {
            server_id: server_id.to_string(),
            location_id: location_id.to_string(),
            match_pattern: match_pattern.to_string(),
            backend_target: backend_target.to_string(),
        })
    }
}

impl fmt::Display for ServiceDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.server_id, self.location_id, self.match_pattern, self.backend_target
        )
    }
}
