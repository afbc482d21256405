//! Prometheus Metrics Module
//!
//! Provides application-wide metrics collection using Prometheus.
//!
//! # Metrics Collected
//! - Active WebSocket connections held by the hub registry
//! - Inbound message outcomes (delivered, dropped and why)
//! - Hub evictions by reason
//! - Persist/resolve pipeline latency

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Connections currently reachable from the hub registry
pub static WEBSOCKET_CONNECTIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::with_opts(
        Opts::new(
            "websocket_connections_active",
            "Number of connections registered with the hub",
        )
        .namespace("chat_realtime"),
    )
    .expect("Failed to create WEBSOCKET_CONNECTIONS_ACTIVE metric")
});

/// Inbound message counter by outcome
pub static HUB_MESSAGES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("hub_messages_total", "Inbound chat messages by outcome")
            .namespace("chat_realtime"),
        &["outcome"],
    )
    .expect("Failed to create HUB_MESSAGES_TOTAL metric")
});

/// Registry eviction counter by reason
pub static HUB_EVICTIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("hub_evictions_total", "Connections removed from the hub by the hub itself")
            .namespace("chat_realtime"),
        &["reason"],
    )
    .expect("Failed to create HUB_EVICTIONS_TOTAL metric")
});

/// Persist + resolve pipeline latency
pub static HUB_PIPELINE_DURATION_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    let buckets = vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0];
    Histogram::with_opts(
        HistogramOpts::new(
            "hub_pipeline_duration_seconds",
            "Time from decode to fan-out handoff in seconds",
        )
        .namespace("chat_realtime")
        .buckets(buckets),
    )
    .expect("Failed to create HUB_PIPELINE_DURATION_SECONDS metric")
});

/// Register all metrics with the registry
fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(WEBSOCKET_CONNECTIONS_ACTIVE.clone()))
        .expect("Failed to register WEBSOCKET_CONNECTIONS_ACTIVE");
    registry
        .register(Box::new(HUB_MESSAGES_TOTAL.clone()))
        .expect("Failed to register HUB_MESSAGES_TOTAL");
    registry
        .register(Box::new(HUB_EVICTIONS_TOTAL.clone()))
        .expect("Failed to register HUB_EVICTIONS_TOTAL");
    registry
        .register(Box::new(HUB_PIPELINE_DURATION_SECONDS.clone()))
        .expect("Failed to register HUB_PIPELINE_DURATION_SECONDS");
}

/// Collect and encode all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Helper to record the outcome of one inbound message
pub fn record_message(outcome: &str) {
    HUB_MESSAGES_TOTAL.with_label_values(&[outcome]).inc();
}

/// Helper to record a hub-initiated eviction
pub fn record_eviction(reason: &str) {
    HUB_EVICTIONS_TOTAL.with_label_values(&[reason]).inc();
}

/// Helper to update the registered connection count
pub fn set_active_connections(count: usize) {
    WEBSOCKET_CONNECTIONS_ACTIVE.set(count as i64);
}

/// Helper to record pipeline latency
pub fn observe_pipeline(duration_secs: f64) {
    HUB_PIPELINE_DURATION_SECONDS.observe(duration_secs);
}
