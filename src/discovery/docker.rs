//! Docker Swarm orchestrator client.

use async_trait::async_trait;
use bollard::models::{EventMessage, EventMessageTypeEnum, Service};
use bollard::service::ListServicesOptions;
use bollard::system::EventsOptions;
use bollard::{Docker, API_DEFAULT_VERSION};
use futures_util::stream::{BoxStream, StreamExt};
use std::collections::HashMap;

use crate::config::DockerConfig;
use crate::discovery::{ChangeAction, DiscoveryError, OrchestratorClient, RawService, ServiceChange};

const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// [`OrchestratorClient`] backed by the Docker Engine API.
#[derive(Debug, Clone)]
pub struct DockerClient {
    docker: Docker,
}

impl DockerClient {
    /// Connect using `config.host`, or the local socket when unset.
    pub fn connect(config: &DockerConfig) -> Result<Self, DiscoveryError> {
        let timeout = config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        let docker = match config.host.as_deref() {
            None => Docker::connect_with_local_defaults(),
            Some(host) if host.starts_with("unix://") => {
                Docker::connect_with_unix(host, timeout, API_DEFAULT_VERSION)
            }
            Some(host) => Docker::connect_with_http(host, timeout, API_DEFAULT_VERSION),
        }
        .map_err(|e| DiscoveryError::Connect(e.to_string()))?;

        Ok(Self { docker })
    }

    /// Fail fast at startup when the daemon is unreachable.
    pub async fn ping(&self) -> Result<(), DiscoveryError> {
        self.docker
            .ping()
            .await
            .map(|_| ())
            .map_err(|e| DiscoveryError::Connect(e.to_string()))
    }
}

#[async_trait]
impl OrchestratorClient for DockerClient {
    async fn list_services(&self) -> Result<Vec<RawService>, DiscoveryError> {
        let services = self
            .docker
            .list_services(None::<ListServicesOptions<String>>)
            .await
            .map_err(|e| DiscoveryError::Query(e.to_string()))?;

        Ok(services.into_iter().filter_map(raw_service).collect())
    }

    async fn change_feed(
        &self,
    ) -> Result<BoxStream<'static, Result<ServiceChange, DiscoveryError>>, DiscoveryError> {
        let mut filters = HashMap::new();
        filters.insert("type".to_string(), vec!["service".to_string()]);

        let stream = self
            .docker
            .events(Some(EventsOptions::<String> {
                filters,
                ..Default::default()
            }))
            .filter_map(|message| async move {
                match message {
                    Ok(message) => service_change(message).map(Ok),
                    Err(e) => Some(Err(DiscoveryError::Feed(e.to_string()))),
                }
            });

        Ok(stream.boxed())
    }
}

fn raw_service(service: Service) -> Option<RawService> {
    let id = service.id.unwrap_or_default();
    let spec = service.spec?;
    let name = spec.name.unwrap_or_else(|| id.clone());
    let env = spec
        .task_template
        .and_then(|task| task.container_spec)
        .and_then(|container| container.env)
        .unwrap_or_default();

    Some(RawService {
        id,
        name,
        labels: spec.labels.unwrap_or_default(),
        env,
    })
}

fn service_change(message: EventMessage) -> Option<ServiceChange> {
    if message.typ != Some(EventMessageTypeEnum::SERVICE) {
        return None;
    }

    let action = match message.action.as_deref()? {
        "create" | "update" => ChangeAction::Modified,
        "remove" => ChangeAction::Removed,
        other => {
            tracing::trace!(action = other, "Ignoring service event");
            return None;
        }
    };

    let actor = message.actor.unwrap_or_default();
    let service_name = actor
        .attributes
        .as_ref()
        .and_then(|attributes| attributes.get("name"))
        .cloned();

    Some(ServiceChange {
        action,
        service_id: actor.id.unwrap_or_default(),
        service_name,
    })
}
