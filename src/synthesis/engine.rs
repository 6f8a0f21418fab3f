//! The regeneration pass.
//!
//! # Responsibilities
//! - Own the server tree and serialize every pass over it
//! - Rebuild each server's locations from a fresh service snapshot
//! - Gate locations on backend reachability and schedule follow-ups
//! - Render, persist and reload
//!
//! # Design Decisions
//! - One async mutex covers the whole tree for the whole pass
//! - A bad definition skips that entry only; the pass carries on
//! - Snapshot, render and persist failures abort the pass before the write
//! - Reload failure is logged; the written file stays

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tracing::Instrument;

use crate::config::SynthConfig;
use crate::discovery::{DiscoveryError, ServiceRecord, SnapshotProvider};
use crate::events::Event;
use crate::observability::metrics;
use crate::synthesis::definition::ServiceDefinition;
use crate::synthesis::persist::{persist_atomic, PersistError};
use crate::synthesis::probe::{ProbeError, ReachabilityProbe};
use crate::synthesis::reload::Reloader;
use crate::synthesis::retry::{RetryScheduler, RetryTicks};
use crate::synthesis::tree::{LocationNode, ServerNode};
use crate::template::{TemplateDir, TemplateError, TemplateRenderer};

/// Startup failures.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to load template for server `{server_id}`: {source}")]
    ServerTemplate {
        server_id: String,
        #[source]
        source: TemplateError,
    },
}

/// Failures that abort a whole pass.
#[derive(Debug, Error)]
pub enum PassError {
    #[error("service snapshot failed: {0}")]
    Snapshot(#[from] DiscoveryError),

    #[error(transparent)]
    Render(#[from] TemplateError),

    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// Outcome of a completed pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Locations rendered into the output.
    pub locations: usize,
    /// Definitions skipped for any reason, unreachable ones included.
    pub skipped: usize,
    /// Definitions skipped because their backend did not answer.
    pub unreachable: usize,
    /// Whether a follow-up pass was requested.
    pub retry_scheduled: bool,
    /// Whether the reload command succeeded.
    pub reloaded: bool,
}

/// Collaborators injected into the engine.
pub struct EngineParts {
    pub snapshot: SnapshotProvider,
    pub prober: Arc<dyn ReachabilityProbe>,
    pub reloader: Arc<dyn Reloader>,
    pub retry: RetryScheduler,
}

/// Owns the server tree and performs regeneration passes.
pub struct SynthesisEngine {
    servers: Mutex<BTreeMap<String, ServerNode>>,
    snapshot: SnapshotProvider,
    location_templates: TemplateDir,
    renderer: TemplateRenderer,
    prober: Arc<dyn ReachabilityProbe>,
    reloader: Arc<dyn Reloader>,
    retry: RetryScheduler,
    output: PathBuf,
    passes: AtomicU64,
}

impl SynthesisEngine {
    /// Load every enabled server's template. Any failure is fatal.
    pub fn new(config: &SynthConfig, parts: EngineParts) -> Result<Self, EngineError> {
        let server_templates = TemplateDir::new(&config.templates.server_dir);

        let mut servers = BTreeMap::new();
        for id in &config.servers.enabled {
            let node = ServerNode::load(id, &server_templates).map_err(|source| {
                EngineError::ServerTemplate {
                    server_id: id.clone(),
                    source,
                }
            })?;
            servers.insert(id.clone(), node);
        }

        tracing::info!(
            servers = servers.len(),
            server_dir = %server_templates.path().display(),
            location_dir = %config.templates.location_dir.display(),
            output = %config.output.path.display(),
            "Synthesis engine initialized"
        );

        Ok(Self {
            servers: Mutex::new(servers),
            snapshot: parts.snapshot,
            location_templates: TemplateDir::new(&config.templates.location_dir),
            renderer: TemplateRenderer::new(),
            prober: parts.prober,
            reloader: parts.reloader,
            retry: parts.retry,
            output: config.output.path.clone(),
            passes: AtomicU64::new(0),
        })
    }

    pub fn output_path(&self) -> &Path {
        &self.output
    }

    /// Run one regeneration pass. Concurrent callers queue on the tree lock.
    pub async fn generate(&self, trigger: Option<&Event>) -> Result<PassReport, PassError> {
        let pass = self.passes.fetch_add(1, Ordering::Relaxed) + 1;
        let trigger = trigger.map_or("none", |event| event.name.as_str());
        let span = tracing::info_span!("generate", pass, trigger);

        let result = self.run_pass().instrument(span.clone()).await;

        span.in_scope(|| match &result {
            Ok(report) => {
                metrics::record_pass("completed");
                metrics::record_locations(report.locations);
                tracing::info!(
                    locations = report.locations,
                    skipped = report.skipped,
                    unreachable = report.unreachable,
                    reloaded = report.reloaded,
                    "Regeneration pass completed"
                );
            }
            Err(e) => {
                metrics::record_pass("failed");
                tracing::error!(error = %e, "Regeneration pass aborted");
            }
        });
        result
    }

    /// Drive follow-up passes until shutdown.
    pub async fn run_retries(
        self: Arc<Self>,
        mut ticks: RetryTicks,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                tick = ticks.next() => {
                    if tick.is_none() {
                        return;
                    }
                    let _ = self.generate(None).await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Retry worker received shutdown signal, exiting loop");
                    return;
                }
            }
        }
    }

    async fn run_pass(&self) -> Result<PassReport, PassError> {
        let mut servers = self.servers.lock().await;

        let services = self.snapshot.list_services().await?;

        for server in servers.values_mut() {
            server.locations.clear();
        }

        let mut report = PassReport::default();
        for (service_name, record) in services {
            let record = Arc::new(record);
            for (key, raw) in record.definitions(self.snapshot.definition_prefix()) {
                match self
                    .build_location(&servers, &service_name, &record, raw)
                    .await
                {
                    Ok(location) => {
                        let Some(server) = servers.get_mut(&location.definition.server_id) else {
                            continue;
                        };
                        if server.locations.contains_key(&location.id) {
                            tracing::warn!(
                                definition = raw,
                                service = %service_name,
                                "Duplicate definition, keeping the later service's entry"
                            );
                        }
                        server.locations.insert(location.id.clone(), location);
                    }
                    Err(skip) => {
                        report.skipped += 1;
                        metrics::record_skipped_entry(skip.reason());
                        if matches!(skip, Skip::Unreachable) {
                            report.unreachable += 1;
                        }
                        tracing::debug!(
                            variable = key,
                            definition = raw,
                            reason = skip.reason(),
                            "Definition skipped"
                        );
                    }
                }
            }
        }

        if report.unreachable > 0 {
            report.retry_scheduled = self.retry.schedule();
        }

        let mut rendered = String::new();
        for server in servers.values() {
            rendered.push_str(&self.renderer.render_server(server)?);
        }
        report.locations = servers.values().map(|server| server.locations.len()).sum();

        persist_atomic(&self.output, rendered.as_bytes())?;
        tracing::debug!(
            path = %self.output.display(),
            bytes = rendered.len(),
            "Configuration written"
        );

        match self.reloader.reload().await {
            Ok(()) => report.reloaded = true,
            Err(e) => {
                metrics::record_reload_failure();
                tracing::error!(error = %e, "Reload failed; configuration file was still updated");
            }
        }

        Ok(report)
    }

    /// Validate one definition and build its location. Logs why it is skipped.
    async fn build_location(
        &self,
        servers: &BTreeMap<String, ServerNode>,
        service_name: &str,
        record: &Arc<ServiceRecord>,
        raw: &str,
    ) -> Result<LocationNode, Skip> {
        let definition = ServiceDefinition::parse(raw).map_err(|e| {
            tracing::warn!(
                definition = raw,
                service = service_name,
                error = %e,
                "Malformed service definition"
            );
            Skip::Malformed
        })?;

        if !servers.contains_key(&definition.server_id) {
            tracing::warn!(
                definition = raw,
                service = service_name,
                server_id = %definition.server_id,
                "Definition references a server that is not enabled"
            );
            return Err(Skip::UnknownServer);
        }

        if let Err(e) = self.prober.probe(&definition.backend_target).await {
            // An unparseable target never heals, so it must not trigger retries.
            if let ProbeError::InvalidTarget { .. } = e {
                tracing::warn!(
                    definition = raw,
                    service = service_name,
                    error = %e,
                    "Backend target cannot be parsed"
                );
                return Err(Skip::Malformed);
            }
            tracing::warn!(
                definition = raw,
                service = service_name,
                error = %e,
                "Backend unreachable, excluding until a later pass"
            );
            return Err(Skip::Unreachable);
        }

        let template_text = self
            .location_templates
            .load(&definition.location_id)
            .map_err(|e| {
                tracing::warn!(
                    definition = raw,
                    location_id = %definition.location_id,
                    error = %e,
                    "Location template unavailable"
                );
                Skip::MissingTemplate
            })?;

        Ok(LocationNode {
            id: raw.to_string(),
            definition,
            template_text,
            service_name: service_name.to_string(),
            service: record.clone(),
        })
    }
}

/// Why a definition did not make it into the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Skip {
    Malformed,
    UnknownServer,
    Unreachable,
    MissingTemplate,
}

impl Skip {
    fn reason(self) -> &'static str {
        match self {
            Skip::Malformed => "malformed",
            Skip::UnknownServer => "unknown_server",
            Skip::Unreachable => "unreachable",
            Skip::MissingTemplate => "missing_template",
        }
    }
}
