//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_synth_passes_total` (counter): regeneration passes by outcome
//! - `proxy_synth_skipped_entries_total` (counter): skipped definitions by reason
//! - `proxy_synth_locations` (gauge): locations rendered by the last completed pass
//! - `proxy_synth_reload_failures_total` (counter)
//! - `proxy_synth_retries_scheduled_total` (counter)
//! - `proxy_synth_events_total` (counter): dispatched events by name

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

use crate::events::EventName;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(
            address = %addr,
            error = %e,
            "Failed to install metrics exporter"
        ),
    }
}

pub fn record_pass(outcome: &'static str) {
    metrics::counter!("proxy_synth_passes_total", "outcome" => outcome).increment(1);
}

pub fn record_skipped_entry(reason: &'static str) {
    metrics::counter!("proxy_synth_skipped_entries_total", "reason" => reason).increment(1);
}

pub fn record_locations(count: usize) {
    metrics::gauge!("proxy_synth_locations").set(count as f64);
}

pub fn record_reload_failure() {
    metrics::counter!("proxy_synth_reload_failures_total").increment(1);
}

pub fn record_retry_scheduled() {
    metrics::counter!("proxy_synth_retries_scheduled_total").increment(1);
}

pub fn record_event(name: EventName) {
    metrics::counter!("proxy_synth_events_total", "name" => name.as_str()).increment(1);
}
