//! Orchestrator change feed → event bus.

use futures_util::StreamExt;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use crate::discovery::{ChangeAction, OrchestratorClient, ServiceChange};
use crate::events::{Event, EventName, Publisher};

/// Forwards service lifecycle changes onto the event bus.
pub struct ChangeListener {
    client: Arc<dyn OrchestratorClient>,
    publisher: Publisher,
    reconnect_delay: Duration,
}

impl ChangeListener {
    pub fn new(
        client: Arc<dyn OrchestratorClient>,
        publisher: Publisher,
        reconnect_delay: Duration,
    ) -> Self {
        Self {
            client,
            publisher,
            reconnect_delay,
        }
    }

    /// Consume the change feed until shutdown, re-opening it after failures.
    ///
    /// Changes made while the feed was down are never replayed, so every
    /// reopened feed starts with a resync event.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!("Change listener starting");

        let mut resync = false;
        loop {
            tokio::select! {
                _ = self.listen(resync) => {}
                _ = shutdown.recv() => {
                    tracing::info!("Change listener received shutdown signal, exiting loop");
                    return;
                }
            }

            tracing::warn!(
                delay_secs = self.reconnect_delay.as_secs(),
                "Change feed closed, reconnecting"
            );

            tokio::select! {
                _ = tokio::time::sleep(self.reconnect_delay) => {}
                _ = shutdown.recv() => return,
            }
            resync = true;
        }
    }

    /// Forward changes until the feed ends or fails.
    async fn listen(&self, resync: bool) {
        let mut feed = match self.client.change_feed().await {
            Ok(feed) => feed,
            Err(e) => {
                tracing::error!(error = %e, "Failed to open change feed");
                return;
            }
        };

        if resync {
            tracing::info!("Change feed reopened, requesting a full resync");
            if !self.publisher.publish(resync_event()) {
                return;
            }
        }

        while let Some(change) = feed.next().await {
            match change {
                Ok(change) => {
                    if !self.publisher.publish(to_event(&change)) {
                        return;
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Change feed error");
                    return;
                }
            }
        }
    }
}

fn resync_event() -> Event {
    Event::new(EventName::ServiceModified, json!({ "resync": true }))
}

fn to_event(change: &ServiceChange) -> Event {
    let name = match change.action {
        ChangeAction::Modified => EventName::ServiceModified,
        ChangeAction::Removed => EventName::ServiceRemoved,
    };
    tracing::debug!(
        event = %name,
        service_id = %change.service_id,
        service_name = change.service_name.as_deref().unwrap_or(""),
        "Service change observed"
    );
    Event::new(
        name,
        json!({
            "id": change.service_id,
            "name": change.service_name,
        }),
    )
}
