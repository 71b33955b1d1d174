//! Metrics collection and exposition.
//!
//! # Metrics
//! - `router_dispatch_total` (counter): dispatches by outcome
//! - `router_dispatch_duration_seconds` (histogram): dispatch latency
//! - `router_config_reloads_total` (counter): reloads by result
//! - `router_handlers` (gauge): handlers in the active tree
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade and is a no-op until an
//!   exporter is installed
//! - Per-handler counters for the admin API live in `DispatchStats`

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use dashmap::DashMap;
use metrics_exporter_prometheus::PrometheusBuilder;
use serde::Serialize;

/// Install the Prometheus exporter with its own HTTP listener.
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install Prometheus exporter"),
    }
}

/// Record one dispatch. `outcome` is `handled`, `unhandled` or an error kind.
pub fn record_dispatch(outcome: &'static str, status: u16, start: Instant) {
    metrics::counter!(
        "router_dispatch_total",
        "outcome" => outcome,
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("router_dispatch_duration_seconds", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_config_reload(success: bool) {
    let result = if success { "success" } else { "failure" };
    metrics::counter!("router_config_reloads_total", "result" => result).increment(1);
}

pub fn record_handler_count(count: usize) {
    metrics::gauge!("router_handlers").set(count as f64);
}

/// Outcome counters of the handlers that finished a dispatch.
#[derive(Debug, Default)]
pub struct DispatchStats {
    total: AtomicU64,
    by_handler: DashMap<String, HandlerStats>,
}

#[derive(Debug, Default, Clone, Serialize, PartialEq, Eq)]
pub struct HandlerStats {
    pub handled: u64,
    pub unhandled: u64,
    pub errors: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub total: u64,
    pub handlers: std::collections::BTreeMap<String, HandlerStats>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Handled,
    Unhandled,
    Error,
}

impl DispatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count an outcome against the last handler the request reached.
    pub fn record(&self, handler: &str, outcome: Outcome) {
        self.total.fetch_add(1, Ordering::Relaxed);
        let mut entry = self.by_handler.entry(handler.to_string()).or_default();
        match outcome {
            Outcome::Handled => entry.handled += 1,
            Outcome::Unhandled => entry.unhandled += 1,
            Outcome::Error => entry.errors += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total: self.total(),
            handlers: self
                .by_handler
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().clone()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_per_handler() {
        let stats = DispatchStats::new();
        stats.record("blog", Outcome::Handled);
        stats.record("blog", Outcome::Error);
        stats.record("app", Outcome::Unhandled);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total, 3);
        assert_eq!(
            snapshot.handlers["blog"],
            HandlerStats {
                handled: 1,
                unhandled: 0,
                errors: 1
            }
        );
        assert_eq!(snapshot.handlers["app"].unhandled, 1);
    }

    #[test]
    fn test_recording_without_exporter_is_noop() {
        record_dispatch("handled", 200, Instant::now());
        record_config_reload(true);
        record_handler_count(3);
    }
}
