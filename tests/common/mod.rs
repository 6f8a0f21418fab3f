//! Shared fakes and fixtures for integration testing.
#![allow(dead_code)]

use async_trait::async_trait;
use futures_util::stream::{BoxStream, StreamExt};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

use proxy_synth::config::SynthConfig;
use proxy_synth::discovery::{
    DiscoveryError, OrchestratorClient, RawService, ServiceChange, SnapshotProvider,
};
use proxy_synth::lifecycle::Collaborators;
use proxy_synth::synthesis::probe::backend_address;
use proxy_synth::synthesis::{
    EngineParts, ProbeError, ReachabilityProbe, ReloadError, Reloader, RetryScheduler, RetryTicks,
    SynthesisEngine,
};

pub const SERVER_TEMPLATE: &str =
    "server {{ id }} {\n{% for location in locations %}{{ location.render() }}{% endfor %}}\n";
pub const LOCATION_TEMPLATE: &str =
    "    location {{ match_pattern }} { proxy_pass {{ backend_target }}; }\n";

/// Build a raw orchestrator service.
pub fn service(name: &str, stack: Option<&str>, env: &[&str]) -> RawService {
    let mut labels = HashMap::new();
    if let Some(stack) = stack {
        labels.insert("com.docker.stack.namespace".to_string(), stack.to_string());
    }
    RawService {
        id: format!("id-{name}"),
        name: name.to_string(),
        labels,
        env: env.iter().map(|s| s.to_string()).collect(),
    }
}

/// In-memory orchestrator. Listing can be scripted to fail or to cycle
/// through several snapshots.
pub struct FakeOrchestrator {
    snapshots: Mutex<Vec<Vec<RawService>>>,
    cursor: AtomicUsize,
    failing: AtomicBool,
    feed_tx: mpsc::UnboundedSender<Result<ServiceChange, DiscoveryError>>,
    feed_rx: Mutex<Option<mpsc::UnboundedReceiver<Result<ServiceChange, DiscoveryError>>>>,
    feed_opens: AtomicUsize,
}

impl FakeOrchestrator {
    pub fn new(services: Vec<RawService>) -> Arc<Self> {
        Self::cycling(vec![services])
    }

    /// Each listing returns the next snapshot, wrapping around.
    pub fn cycling(snapshots: Vec<Vec<RawService>>) -> Arc<Self> {
        let (feed_tx, feed_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            snapshots: Mutex::new(snapshots),
            cursor: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            feed_tx,
            feed_rx: Mutex::new(Some(feed_rx)),
            feed_opens: AtomicUsize::new(0),
        })
    }

    pub fn set_services(&self, services: Vec<RawService>) {
        *self.snapshots.lock().unwrap() = vec![services];
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn push_change(&self, change: ServiceChange) {
        self.feed_tx.send(Ok(change)).unwrap();
    }

    /// Fail the first change feed. Later feeds stay open and silent.
    pub fn break_feed(&self) {
        self.feed_tx
            .send(Err(DiscoveryError::Feed("connection reset".into())))
            .unwrap();
    }

    pub fn feed_opens(&self) -> usize {
        self.feed_opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrchestratorClient for FakeOrchestrator {
    async fn list_services(&self) -> Result<Vec<RawService>, DiscoveryError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DiscoveryError::Query("orchestrator unavailable".into()));
        }
        let snapshots = self.snapshots.lock().unwrap();
        let index = self.cursor.fetch_add(1, Ordering::SeqCst) % snapshots.len();
        Ok(snapshots[index].clone())
    }

    async fn change_feed(
        &self,
    ) -> Result<BoxStream<'static, Result<ServiceChange, DiscoveryError>>, DiscoveryError> {
        self.feed_opens.fetch_add(1, Ordering::SeqCst);
        match self.feed_rx.lock().unwrap().take() {
            Some(rx) => Ok(futures_util::stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|change| (change, rx))
            })
            .boxed()),
            None => Ok(futures_util::stream::pending().boxed()),
        }
    }
}

/// Probe whose answers are controlled by the test.
#[derive(Default)]
pub struct SwitchProbe {
    reachable: Mutex<HashSet<String>>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

impl SwitchProbe {
    pub fn reachable(targets: &[&str]) -> Arc<Self> {
        let probe = Self::default();
        probe.set_reachable(targets);
        Arc::new(probe)
    }

    /// Every probe sleeps for `delay` before answering.
    pub fn slow(targets: &[&str], delay: Duration) -> Arc<Self> {
        let probe = Self {
            delay: Some(delay),
            ..Self::default()
        };
        probe.set_reachable(targets);
        Arc::new(probe)
    }

    pub fn set_reachable(&self, targets: &[&str]) {
        *self.reachable.lock().unwrap() = targets.iter().map(|t| t.to_string()).collect();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReachabilityProbe for SwitchProbe {
    async fn probe(&self, target: &str) -> Result<(), ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        backend_address(target)?;
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.reachable.lock().unwrap().contains(target) {
            Ok(())
        } else {
            Err(ProbeError::Connect {
                addr: target.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
            })
        }
    }
}

/// Reloader that counts invocations.
#[derive(Default)]
pub struct RecordingReloader {
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl RecordingReloader {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let reloader = Self::default();
        reloader.failing.store(true, Ordering::SeqCst);
        Arc::new(reloader)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Reloader for RecordingReloader {
    async fn reload(&self) -> Result<(), ReloadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(ReloadError::Spawn {
                program: "nginx".into(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not installed"),
            });
        }
        Ok(())
    }
}

/// Template directories and config rooted in a scratch directory.
pub struct Fixture {
    pub dir: TempDir,
    pub config: SynthConfig,
}

impl Fixture {
    /// Servers get [`SERVER_TEMPLATE`]; locations `root` and `api` get
    /// [`LOCATION_TEMPLATE`].
    pub fn new(servers: &[&str]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let server_dir = dir.path().join("servers");
        let location_dir = dir.path().join("locations");
        fs::create_dir_all(&server_dir).unwrap();
        fs::create_dir_all(&location_dir).unwrap();

        for id in servers {
            fs::write(server_dir.join(format!("{id}.conf")), SERVER_TEMPLATE).unwrap();
        }
        for id in ["root", "api"] {
            fs::write(location_dir.join(format!("{id}.conf")), LOCATION_TEMPLATE).unwrap();
        }

        let mut config = SynthConfig::default();
        config.servers.enabled = servers.iter().map(|s| s.to_string()).collect();
        config.templates.server_dir = server_dir;
        config.templates.location_dir = location_dir;
        config.output.path = dir.path().join("out/nginx/services.conf");
        config.reload.command = Vec::new();
        config.watch.templates = false;

        Self { dir, config }
    }

    pub fn location_template(&self, id: &str, text: &str) {
        fs::write(self.config.templates.location_dir.join(format!("{id}.conf")), text).unwrap();
    }

    pub fn output_path(&self) -> PathBuf {
        self.config.output.path.clone()
    }

    pub fn output(&self) -> String {
        fs::read_to_string(&self.config.output.path).unwrap()
    }

    pub fn engine(
        &self,
        client: Arc<dyn OrchestratorClient>,
        prober: Arc<dyn ReachabilityProbe>,
        reloader: Arc<dyn Reloader>,
    ) -> (Arc<SynthesisEngine>, RetryTicks) {
        let (retry, ticks) = RetryScheduler::new(self.config.retry.delay());
        let parts = EngineParts {
            snapshot: SnapshotProvider::new(client, &self.config.discovery),
            prober,
            reloader,
            retry,
        };
        let engine = SynthesisEngine::new(&self.config, parts).unwrap();
        (Arc::new(engine), ticks)
    }

    pub fn collaborators(
        &self,
        client: Arc<dyn OrchestratorClient>,
        prober: Arc<dyn ReachabilityProbe>,
        reloader: Arc<dyn Reloader>,
    ) -> Collaborators {
        Collaborators {
            client,
            prober,
            reloader,
        }
    }
}

/// Poll `check` until it holds or `timeout` elapses.
pub async fn eventually<F>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    check()
}
