//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the synthesis engine from configuration and collaborators
//! - Run the initial pass before reacting to any change
//! - Wire the event bus, change listener, template watcher and retry worker
//! - Block until shutdown, then stop background tasks
//!
//! # Design Decisions
//! - Fail fast: orchestrator and server template errors are fatal
//! - A failed pass after startup is logged, never fatal

use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

use crate::config::SynthConfig;
use crate::discovery::{
    ChangeListener, DiscoveryError, DockerClient, OrchestratorClient, SnapshotProvider,
};
use crate::events::{Event, EventBusBuilder, EventName};
use crate::lifecycle::Shutdown;
use crate::synthesis::{
    CommandReloader, EngineError, EngineParts, PassError, PassReport, ReachabilityProbe, Reloader,
    RetryScheduler, RetryTicks, SynthesisEngine, TcpProbe,
};
use crate::template::TemplateWatcher;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("regeneration failed: {0}")]
    Pass(#[from] PassError),

    #[error("failed to watch templates: {0}")]
    Watch(#[from] notify::Error),
}

/// External systems the engine talks to.
pub struct Collaborators {
    pub client: Arc<dyn OrchestratorClient>,
    pub prober: Arc<dyn ReachabilityProbe>,
    pub reloader: Arc<dyn Reloader>,
}

impl Collaborators {
    /// Production collaborators: Docker, TCP probes and the reload command.
    pub async fn connect(config: &SynthConfig) -> Result<Self, StartupError> {
        let docker = DockerClient::connect(&config.docker)?;
        docker.ping().await?;
        tracing::info!("Connected to orchestrator");

        Ok(Self {
            client: Arc::new(docker),
            prober: Arc::new(TcpProbe::new(config.probe.timeout())),
            reloader: Arc::new(CommandReloader::new(config.reload.command.clone())),
        })
    }
}

fn build_engine(
    config: &SynthConfig,
    collaborators: &Collaborators,
) -> Result<(Arc<SynthesisEngine>, RetryTicks), StartupError> {
    let (retry, ticks) = RetryScheduler::new(config.retry.delay());
    let parts = EngineParts {
        snapshot: SnapshotProvider::new(collaborators.client.clone(), &config.discovery),
        prober: collaborators.prober.clone(),
        reloader: collaborators.reloader.clone(),
        retry,
    };
    let engine = SynthesisEngine::new(config, parts)?;
    Ok((Arc::new(engine), ticks))
}

/// Perform exactly one pass and return its report.
pub async fn run_once(
    config: &SynthConfig,
    collaborators: Collaborators,
) -> Result<PassReport, StartupError> {
    let (engine, _ticks) = build_engine(config, &collaborators)?;
    Ok(engine.generate(None).await?)
}

/// Run until `signal` resolves.
pub async fn run<S>(
    config: &SynthConfig,
    collaborators: Collaborators,
    signal: S,
) -> Result<(), StartupError>
where
    S: Future<Output = ()>,
{
    let (engine, ticks) = build_engine(config, &collaborators)?;

    // The file must exist before we start waiting on changes.
    let _ = engine.generate(None).await;

    let mut shutdown = Shutdown::new();
    {
        let engine = engine.clone();
        shutdown.spawn("retry-worker", move |rx| engine.run_retries(ticks, rx));
    }

    let mut builder = EventBusBuilder::new();
    for name in [
        EventName::ServiceModified,
        EventName::ServiceRemoved,
        EventName::TemplateChanged,
    ] {
        let engine = engine.clone();
        builder.subscribe(name, move |event: Event| {
            let engine = engine.clone();
            async move {
                let _ = engine.generate(Some(&event)).await;
            }
        });
    }
    let bus = builder.start();

    let listener = ChangeListener::new(
        collaborators.client.clone(),
        bus.publisher(),
        config.retry.delay(),
    );
    shutdown.spawn("change-listener", move |rx| listener.run(rx));

    let _template_watcher = if config.watch.templates {
        Some(TemplateWatcher::new(&config.templates.location_dir, bus.publisher()).run()?)
    } else {
        None
    };

    tracing::info!("Waiting for service changes");
    bus.wait(signal).await;
    shutdown.stop().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
