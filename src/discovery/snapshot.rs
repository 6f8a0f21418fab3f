//! Proxy-relevant service snapshots.
//!
//! # Responsibilities
//! - Filter orchestrator services by deployment stack
//! - Extract declared variables from service environments
//! - Keep only services carrying at least one service definition

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::config::DiscoveryConfig;
use crate::discovery::{DiscoveryError, OrchestratorClient, RawService, ServiceRecord};

/// Builds filtered service snapshots from an orchestrator client.
pub struct SnapshotProvider {
    client: Arc<dyn OrchestratorClient>,
    stacks: BTreeSet<String>,
    stack_label: String,
    declared_prefix: String,
    definition_prefix: String,
}

impl SnapshotProvider {
    pub fn new(client: Arc<dyn OrchestratorClient>, config: &DiscoveryConfig) -> Self {
        Self {
            client,
            stacks: config.stacks.iter().cloned().collect(),
            stack_label: config.stack_label.clone(),
            declared_prefix: config.declared_prefix.clone(),
            definition_prefix: config.definition_prefix.clone(),
        }
    }

    pub fn definition_prefix(&self) -> &str {
        &self.definition_prefix
    }

    /// Current proxy-relevant services keyed by full service name.
    pub async fn list_services(&self) -> Result<BTreeMap<String, ServiceRecord>, DiscoveryError> {
        let services = self.client.list_services().await?;
        let total = services.len();

        let records: BTreeMap<String, ServiceRecord> = services
            .into_iter()
            .filter_map(|service| {
                let record = self.to_record(&service)?;
                Some((service.name, record))
            })
            .collect();

        tracing::debug!(total, selected = records.len(), "Service snapshot built");
        Ok(records)
    }

    fn to_record(&self, service: &RawService) -> Option<ServiceRecord> {
        let stack_name = service
            .labels
            .get(&self.stack_label)
            .cloned()
            .unwrap_or_default();

        if !self.stacks.is_empty() && !self.stacks.contains(&stack_name) {
            return None;
        }

        let declared_vars: BTreeMap<String, String> = service
            .env
            .iter()
            .filter_map(|entry| entry.split_once('='))
            .filter(|(key, _)| key.starts_with(&self.declared_prefix))
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();

        if !declared_vars
            .keys()
            .any(|key| key.starts_with(&self.definition_prefix))
        {
            return None;
        }

        let short_name = strip_stack(&service.name, &stack_name).to_string();

        Some(ServiceRecord {
            stack_name,
            short_name,
            declared_vars,
        })
    }
}

fn strip_stack<'a>(name: &'a str, stack: &str) -> &'a str {
    if stack.is_empty() {
        return name;
    }
    name.strip_prefix(stack)
        .and_then(|rest| rest.strip_prefix('_'))
        .unwrap_or(name)
}
