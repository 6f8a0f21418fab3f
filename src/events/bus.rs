//! Publish/subscribe event bus with a single dispatcher.
//!
//! # Responsibilities
//! - Register handlers per event name before dispatch begins
//! - Queue published events in FIFO order
//! - Run handlers sequentially on one dispatcher task
//! - Block the caller until the process is asked to stop
//!
//! Publishing never blocks, so a handler may publish events of another name
//! without stalling the dispatcher. A handler must not republish its own event
//! to re-run itself; follow-up work goes through the retry scheduler.

use futures_util::future::BoxFuture;
use std::collections::HashMap;
use std::future::Future;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::events::{Event, EventName};
use crate::observability::metrics;

type Handler = Box<dyn Fn(Event) -> BoxFuture<'static, ()> + Send + Sync>;

/// Collects subscriptions, then starts the dispatcher.
#[derive(Default)]
pub struct EventBusBuilder {
    handlers: HashMap<EventName, Vec<Handler>>,
}

impl EventBusBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `name`. Handlers run in registration order.
    pub fn subscribe<F, Fut>(&mut self, name: EventName, handler: F) -> &mut Self
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.handlers
            .entry(name)
            .or_default()
            .push(Box::new(move |event| Box::pin(handler(event))));
        self
    }

    /// Spawn the dispatcher task. Must be called within a Tokio runtime.
    pub fn start(self) -> EventBus {
        let (tx, rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = oneshot::channel();

        tracing::debug!(
            subscriptions = self.handlers.values().map(Vec::len).sum::<usize>(),
            "Event dispatcher starting"
        );
        let dispatcher = tokio::spawn(dispatch(self.handlers, rx, stop_rx));

        EventBus {
            publisher: Publisher { tx },
            stop: stop_tx,
            dispatcher,
        }
    }
}

/// Cloneable handle for publishing events onto the bus.
#[derive(Debug, Clone)]
pub struct Publisher {
    tx: mpsc::UnboundedSender<Event>,
}

impl Publisher {
    /// Queue an event for dispatch. Returns false once the bus has stopped.
    pub fn publish(&self, event: Event) -> bool {
        let name = event.name;
        if self.tx.send(event).is_err() {
            tracing::warn!(event = %name, "Event bus stopped, dropping event");
            return false;
        }
        true
    }
}

/// A running event bus.
pub struct EventBus {
    publisher: Publisher,
    stop: oneshot::Sender<()>,
    dispatcher: JoinHandle<()>,
}

impl EventBus {
    pub fn publisher(&self) -> Publisher {
        self.publisher.clone()
    }

    /// Block until `signal` resolves, then stop the dispatcher.
    ///
    /// An event whose handlers are already running is allowed to finish.
    pub async fn wait<S>(self, signal: S)
    where
        S: Future<Output = ()>,
    {
        signal.await;
        tracing::info!("Stopping event dispatcher");

        let _ = self.stop.send(());
        if let Err(e) = self.dispatcher.await {
            tracing::error!(error = %e, "Event dispatcher terminated abnormally");
        }
    }
}

async fn dispatch(
    handlers: HashMap<EventName, Vec<Handler>>,
    mut rx: mpsc::UnboundedReceiver<Event>,
    mut stop: oneshot::Receiver<()>,
) {
    loop {
        let event = tokio::select! {
            _ = &mut stop => break,
            event = rx.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        metrics::record_event(event.name);

        match handlers.get(&event.name) {
            Some(list) => {
                for handler in list {
                    handler(event.clone()).await;
                }
            }
            None => {
                tracing::debug!(event = %event.name, "No handlers registered, dropping event");
            }
        }
    }

    tracing::debug!("Event dispatcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex, OnceLock};
    use std::time::Duration;

    fn event(name: EventName, n: u64) -> Event {
        Event::new(name, json!({ "n": n }))
    }

    #[tokio::test]
    async fn test_handlers_run_in_publish_and_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut builder = EventBusBuilder::new();

        for tag in ["first", "second"] {
            let log = log.clone();
            builder.subscribe(EventName::ServiceModified, move |e: Event| {
                let log = log.clone();
                async move {
                    // Slow handler must not let the next event overtake it.
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    log.lock().unwrap().push(format!("{tag}:{}", e.payload["n"]));
                }
            });
        }

        let bus = builder.start();
        let publisher = bus.publisher();
        for n in 0..3 {
            assert!(publisher.publish(event(EventName::ServiceModified, n)));
        }

        bus.wait(tokio::time::sleep(Duration::from_millis(200))).await;

        assert_eq!(
            *log.lock().unwrap(),
            vec!["first:0", "second:0", "first:1", "second:1", "first:2", "second:2"]
        );
    }

    #[tokio::test]
    async fn test_unhandled_event_does_not_stop_dispatch() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut builder = EventBusBuilder::new();
        let s = seen.clone();
        builder.subscribe(EventName::ServiceRemoved, move |e: Event| {
            let s = s.clone();
            async move {
                s.lock().unwrap().push(e.payload["n"].as_u64().unwrap_or_default());
            }
        });

        let bus = builder.start();
        let publisher = bus.publisher();
        publisher.publish(event(EventName::ServiceModified, 1));
        publisher.publish(event(EventName::TemplateChanged, 2));
        publisher.publish(event(EventName::ServiceRemoved, 3));

        bus.wait(tokio::time::sleep(Duration::from_millis(100))).await;

        assert_eq!(*seen.lock().unwrap(), vec![3]);
    }

    #[tokio::test]
    async fn test_handler_may_publish_other_event() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let slot: Arc<OnceLock<Publisher>> = Arc::new(OnceLock::new());

        let mut builder = EventBusBuilder::new();
        let s = slot.clone();
        builder.subscribe(EventName::TemplateChanged, move |_e: Event| {
            let s = s.clone();
            async move {
                if let Some(p) = s.get() {
                    p.publish(Event::new(EventName::ServiceModified, json!({ "n": 7 })));
                }
            }
        });
        let s = seen.clone();
        builder.subscribe(EventName::ServiceModified, move |e: Event| {
            let s = s.clone();
            async move {
                s.lock().unwrap().push(e.payload["n"].as_u64().unwrap_or_default());
            }
        });

        let bus = builder.start();
        let publisher = bus.publisher();
        slot.set(publisher.clone()).unwrap();
        publisher.publish(event(EventName::TemplateChanged, 0));

        bus.wait(tokio::time::sleep(Duration::from_millis(100))).await;

        assert_eq!(*seen.lock().unwrap(), vec![7]);
    }

    #[tokio::test]
    async fn test_publish_after_stop_returns_false() {
        let bus = EventBusBuilder::new().start();
        let publisher = bus.publisher();
        bus.wait(async {}).await;

        assert!(!publisher.publish(event(EventName::ServiceModified, 0)));
    }
}
