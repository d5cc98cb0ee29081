// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Prometheus collectors for the gateway

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use tracing::error;

static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

static REQUESTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "guardrail_requests_total",
        "Total number of LLM requests received by the proxy",
    )
    .expect("create requests counter");
    register(counter.clone());
    counter
});

static DECISION_COUNT: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "guardrail_decision_count",
            "Number of policy decisions made by the rule engine",
        ),
        &["decision"],
    )
    .expect("create decision counter");
    register(counter.clone());
    counter
});

static INTENT_TYPE: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new("guardrail_intent_type", "Classification of user intent"),
        &["intent"],
    )
    .expect("create intent counter");
    register(counter.clone());
    counter
});

static SIGNAL_DETECTED: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "guardrail_signal_detected",
            "Number of times a specific signal (PII, toxicity, injection) was detected",
        ),
        &["signal"],
    )
    .expect("create signal counter");
    register(counter.clone());
    counter
});

static LATENCY_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    let histogram = Histogram::with_opts(HistogramOpts::new(
        "guardrail_latency_seconds",
        "Request processing latency in seconds",
    ))
    .expect("create latency histogram");
    register(histogram.clone());
    histogram
});

fn register<C: prometheus::core::Collector + 'static>(collector: C) {
    if let Err(e) = REGISTRY.register(Box::new(collector)) {
        error!(error = %e, "failed to register metrics collector");
    }
}

pub fn record_request() {
    REQUESTS_TOTAL.inc();
}

pub fn record_decision(decision: &str) {
    DECISION_COUNT.with_label_values(&[decision]).inc();
}

pub fn record_intent(intent: &str) {
    INTENT_TYPE.with_label_values(&[intent]).inc();
}

pub fn record_signal(signal: &str) {
    SIGNAL_DETECTED.with_label_values(&[signal]).inc();
}

pub fn observe_latency(seconds: f64) {
    LATENCY_SECONDS.observe(seconds);
}

/// Render the registry in the Prometheus text exposition format.
pub fn render() -> String {
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&metric_families, &mut buffer) {
        error!(error = %e, "failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
