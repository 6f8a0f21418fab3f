//! Delayed follow-up regeneration.
//!
//! A pass that skipped an unreachable backend asks for another pass later.
//! The request is a timer task that sends a tick once the delay elapses; the
//! engine's retry worker turns ticks into passes. At most one follow-up is
//! pending at a time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::observability::metrics;

/// Schedules follow-up passes.
#[derive(Debug)]
pub struct RetryScheduler {
    delay: Duration,
    pending: Arc<AtomicBool>,
    tx: mpsc::UnboundedSender<()>,
}

/// Receiving end of [`RetryScheduler`].
#[derive(Debug)]
pub struct RetryTicks {
    pending: Arc<AtomicBool>,
    rx: mpsc::UnboundedReceiver<()>,
}

impl RetryScheduler {
    pub fn new(delay: Duration) -> (Self, RetryTicks) {
        let (tx, rx) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicBool::new(false));

        (
            Self {
                delay,
                pending: pending.clone(),
                tx,
            },
            RetryTicks { pending, rx },
        )
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Request a pass after the delay. Returns false if one is already pending.
    pub fn schedule(&self) -> bool {
        if self.pending.swap(true, Ordering::SeqCst) {
            tracing::debug!("Follow-up regeneration already pending");
            return false;
        }

        metrics::record_retry_scheduled();
        tracing::info!(delay_secs = self.delay.as_secs_f64(), "Scheduling follow-up regeneration");

        let tx = self.tx.clone();
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(());
        });
        true
    }
}

impl RetryTicks {
    /// Wait for the next due follow-up. Clears the pending flag.
    pub async fn next(&mut self) -> Option<()> {
        self.rx.recv().await?;
        self.pending.store(false, Ordering::SeqCst);
        Some(())
    }
}
