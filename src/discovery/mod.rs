//! Service discovery subsystem.
//!
//! # Data Flow
//! ```text
//! Snapshot (snapshot.rs):
//!     OrchestratorClient::list_services()
//!     → stack filter
//!     → keep declared variables, drop services without definitions
//!     → BTreeMap<name, ServiceRecord>
//!
//! Change feed (listener.rs):
//!     OrchestratorClient::change_feed()
//!     → ServiceChange
//!     → Event { ServiceModified | ServiceRemoved } on the event bus
//! ```
//!
//! # Design Decisions
//! - The orchestrator sits behind a trait; docker.rs is the only bollard user
//! - Snapshots are rebuilt from scratch on every request
//! - A failed listing is one error for the whole call, never a partial map

pub mod docker;
pub mod listener;
pub mod snapshot;

pub use docker::DockerClient;
pub use listener::ChangeListener;
pub use snapshot::SnapshotProvider;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// Errors talking to the orchestrator.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to connect to orchestrator: {0}")]
    Connect(String),

    #[error("service query failed: {0}")]
    Query(String),

    #[error("change feed failed: {0}")]
    Feed(String),
}

/// A service as reported by the orchestrator, before filtering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawService {
    pub id: String,
    pub name: String,
    pub labels: HashMap<String, String>,
    /// Environment entries in `KEY=VALUE` form.
    pub env: Vec<String>,
}

/// Lifecycle action carried by a change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeAction {
    Modified,
    Removed,
}

/// One entry of the orchestrator change feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceChange {
    pub action: ChangeAction,
    pub service_id: String,
    pub service_name: Option<String>,
}

/// One proxy-relevant service. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRecord {
    /// Deployment stack, empty when the service is not part of one.
    pub stack_name: String,
    /// Service name with the `<stack>_` prefix removed.
    pub short_name: String,
    /// Variables carrying the declared prefix.
    pub declared_vars: BTreeMap<String, String>,
}

impl ServiceRecord {
    /// Declared variables whose key starts with `prefix`, in key order.
    pub fn definitions<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.declared_vars
            .iter()
            .filter(move |(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

/// Access to the container orchestrator.
#[async_trait]
pub trait OrchestratorClient: Send + Sync {
    /// All services currently known to the orchestrator.
    async fn list_services(&self) -> Result<Vec<RawService>, DiscoveryError>;

    /// A stream of service lifecycle changes.
    async fn change_feed(&self)
        -> Result<BoxStream<'static, Result<ServiceChange, DiscoveryError>>, DiscoveryError>;
}
