//! Server → location configuration tree.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::discovery::ServiceRecord;
use crate::synthesis::definition::ServiceDefinition;
use crate::template::{TemplateDir, TemplateError};

/// A routing entry built from one service definition during one pass.
#[derive(Debug, Clone)]
pub struct LocationNode {
    /// The raw definition string; unique within a server.
    pub id: String,
    pub definition: ServiceDefinition,
    pub template_text: String,
    /// Full orchestrator name of the declaring service.
    pub service_name: String,
    /// The declaring service, shared with the pass snapshot.
    pub service: Arc<ServiceRecord>,
}

/// One enabled reverse-proxy server. Its locations are rebuilt on every pass.
#[derive(Debug, Clone)]
pub struct ServerNode {
    pub id: String,
    pub template_text: String,
    pub locations: BTreeMap<String, LocationNode>,
}

impl ServerNode {
    /// Create a server with its template loaded from `templates`.
    pub fn load(id: &str, templates: &TemplateDir) -> Result<Self, TemplateError> {
        Ok(Self {
            id: id.to_string(),
            template_text: templates.load(id)?,
            locations: BTreeMap::new(),
        })
    }
}
