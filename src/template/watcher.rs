//! Location template directory watcher.

use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::events::{Event, EventName, Publisher};

/// Publishes `TemplateChanged` when a location template is added, edited or removed.
pub struct TemplateWatcher {
    dir: PathBuf,
    publisher: Publisher,
}

impl TemplateWatcher {
    pub fn new(dir: &Path, publisher: Publisher) -> Self {
        Self {
            dir: dir.to_path_buf(),
            publisher,
        }
    }

    /// Start watching. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let publisher = self.publisher.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<notify::Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() || event.kind.is_remove() {
                        tracing::info!(paths = ?event.paths, "Location template change detected");
                        publisher.publish(Event::new(
                            EventName::TemplateChanged,
                            json!({ "paths": event.paths }),
                        ));
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.dir, "Template watcher started");
        Ok(watcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use crate::events::EventBusBuilder;

    #[tokio::test]
    async fn test_new_template_publishes_event() {
        let dir = tempfile::tempdir().unwrap();
        let seen = Arc::new(Mutex::new(0usize));

        let mut builder = EventBusBuilder::new();
        let s = seen.clone();
        builder.subscribe(EventName::TemplateChanged, move |_event: Event| {
            let s = s.clone();
            async move {
                *s.lock().unwrap() += 1;
            }
        });
        let bus = builder.start();

        let _watcher = TemplateWatcher::new(dir.path(), bus.publisher()).run().unwrap();
        std::fs::write(dir.path().join("root.conf"), "location {}").unwrap();

        for _ in 0..50 {
            if *seen.lock().unwrap() > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        bus.wait(async {}).await;

        assert!(*seen.lock().unwrap() > 0);
    }
}
