//! Prometheus metrics for kb-service.
//!
//! Provides HTTP, workflow, and upstream-call metrics for observability.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::OnceLock;

// Global registry
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

// HTTP metrics
pub static HTTP_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static HTTP_REQUEST_DURATION_SECONDS: OnceLock<HistogramVec> = OnceLock::new();

// Workflow metrics
pub static ROUTER_DECISIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static DECISION_PARSE_FAILURES_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static WORKFLOW_FALLBACKS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

// LLM provider metrics
pub static LLM_TOKENS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static LLM_LATENCY_SECONDS: OnceLock<HistogramVec> = OnceLock::new();
pub static LLM_ERRORS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

// Content fetch metrics
pub static FETCH_DURATION_SECONDS: OnceLock<HistogramVec> = OnceLock::new();
pub static FETCH_ERRORS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

// Session store metrics
pub static STORE_ERRORS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Initialize all metrics. Safe to call more than once; only the first call registers.
pub fn init_metrics() {
    if REGISTRY.get().is_some() {
        return;
    }

    let registry = Registry::new();

    let http_requests_total = IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests"),
        &["method", "path", "status"],
    )
    .expect("Failed to create http_requests_total metric");

    let http_request_duration = HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
        &["method", "path"],
    )
    .expect("Failed to create http_request_duration_seconds metric");

    let router_decisions = IntCounterVec::new(
        Opts::new("kb_router_decisions_total", "Router decisions by route"),
        &["route"],
    )
    .expect("Failed to create kb_router_decisions_total metric");

    let parse_failures = IntCounterVec::new(
        Opts::new(
            "kb_decision_parse_failures_total",
            "Model outputs that could not be parsed into a decision",
        ),
        &["stage"], // stage: router, retrieval
    )
    .expect("Failed to create kb_decision_parse_failures_total metric");

    let fallbacks = IntCounterVec::new(
        Opts::new("kb_workflow_fallbacks_total", "Canned fallback answers served"),
        &["reason"],
    )
    .expect("Failed to create kb_workflow_fallbacks_total metric");

    let llm_tokens = IntCounterVec::new(
        Opts::new("kb_llm_tokens_total", "Total tokens processed"),
        &["provider", "model", "type"], // type: input, output
    )
    .expect("Failed to create kb_llm_tokens_total metric");

    let llm_latency = HistogramVec::new(
        HistogramOpts::new("kb_llm_latency_seconds", "LLM provider latency in seconds")
            .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
        &["provider", "model"],
    )
    .expect("Failed to create kb_llm_latency_seconds metric");

    let llm_errors = IntCounterVec::new(
        Opts::new("kb_llm_errors_total", "Total LLM provider errors"),
        &["provider", "error_type"],
    )
    .expect("Failed to create kb_llm_errors_total metric");

    let fetch_duration = HistogramVec::new(
        HistogramOpts::new(
            "kb_fetch_duration_seconds",
            "Content fetch duration in seconds",
        )
        .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["fetcher"],
    )
    .expect("Failed to create kb_fetch_duration_seconds metric");

    let fetch_errors = IntCounterVec::new(
        Opts::new("kb_fetch_errors_total", "Total content fetch errors"),
        &["error_type"],
    )
    .expect("Failed to create kb_fetch_errors_total metric");

    let store_errors = IntCounterVec::new(
        Opts::new("kb_session_store_errors_total", "Total session store errors"),
        &["operation"],
    )
    .expect("Failed to create kb_session_store_errors_total metric");

    // Register all metrics
    registry
        .register(Box::new(http_requests_total.clone()))
        .expect("Failed to register http_requests_total");
    registry
        .register(Box::new(http_request_duration.clone()))
        .expect("Failed to register http_request_duration_seconds");
    registry
        .register(Box::new(router_decisions.clone()))
        .expect("Failed to register kb_router_decisions_total");
    registry
        .register(Box::new(parse_failures.clone()))
        .expect("Failed to register kb_decision_parse_failures_total");
    registry
        .register(Box::new(fallbacks.clone()))
        .expect("Failed to register kb_workflow_fallbacks_total");
    registry
        .register(Box::new(llm_tokens.clone()))
        .expect("Failed to register kb_llm_tokens_total");
    registry
        .register(Box::new(llm_latency.clone()))
        .expect("Failed to register kb_llm_latency_seconds");
    registry
        .register(Box::new(llm_errors.clone()))
        .expect("Failed to register kb_llm_errors_total");
    registry
        .register(Box::new(fetch_duration.clone()))
        .expect("Failed to register kb_fetch_duration_seconds");
    registry
        .register(Box::new(fetch_errors.clone()))
        .expect("Failed to register kb_fetch_errors_total");
    registry
        .register(Box::new(store_errors.clone()))
        .expect("Failed to register kb_session_store_errors_total");

    // Initialize globals
    if REGISTRY.set(registry).is_err() {
        // Lost a race with a concurrent initializer; its handles are already in place.
        return;
    }
    let _ = HTTP_REQUESTS_TOTAL.set(http_requests_total);
    let _ = HTTP_REQUEST_DURATION_SECONDS.set(http_request_duration);
    let _ = ROUTER_DECISIONS_TOTAL.set(router_decisions);
    let _ = DECISION_PARSE_FAILURES_TOTAL.set(parse_failures);
    let _ = WORKFLOW_FALLBACKS_TOTAL.set(fallbacks);
    let _ = LLM_TOKENS_TOTAL.set(llm_tokens);
    let _ = LLM_LATENCY_SECONDS.set(llm_latency);
    let _ = LLM_ERRORS_TOTAL.set(llm_errors);
    let _ = FETCH_DURATION_SECONDS.set(fetch_duration);
    let _ = FETCH_ERRORS_TOTAL.set(fetch_errors);
    let _ = STORE_ERRORS_TOTAL.set(store_errors);

    tracing::info!("Prometheus metrics initialized");
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();

    let registry = match REGISTRY.get() {
        Some(r) => r,
        None => {
            tracing::error!("Metrics registry not initialized");
            return "# Metrics registry not initialized\n".to_string();
        }
    };

    let metric_families = registry.gather();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return format!("# Failed to encode metrics: {}\n", e);
    }

    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Failed to convert metrics to UTF-8");
            format!("# Failed to convert metrics to UTF-8: {}\n", e)
        }
    }
}

// Helper functions for recording metrics

/// Record a completed HTTP request.
pub fn record_http_request(method: &str, path: &str, status: &str, duration_secs: f64) {
    if let Some(counter) = HTTP_REQUESTS_TOTAL.get() {
        counter.with_label_values(&[method, path, status]).inc();
    }
    if let Some(histogram) = HTTP_REQUEST_DURATION_SECONDS.get() {
        histogram
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }
}

/// Record the route the router picked.
pub fn record_router_decision(route: &str) {
    if let Some(counter) = ROUTER_DECISIONS_TOTAL.get() {
        counter.with_label_values(&[route]).inc();
    }
}

/// Record a model output that could not be parsed.
pub fn record_decision_parse_failure(stage: &str) {
    if let Some(counter) = DECISION_PARSE_FAILURES_TOTAL.get() {
        counter.with_label_values(&[stage]).inc();
    }
}

/// Record a canned fallback answer.
pub fn record_fallback(reason: &str) {
    if let Some(counter) = WORKFLOW_FALLBACKS_TOTAL.get() {
        counter.with_label_values(&[reason]).inc();
    }
}

/// Record token usage.
pub fn record_tokens(provider: &str, model: &str, input_tokens: i32, output_tokens: i32) {
    if let Some(counter) = LLM_TOKENS_TOTAL.get() {
        counter
            .with_label_values(&[provider, model, "input"])
            .inc_by(input_tokens.max(0) as u64);
        counter
            .with_label_values(&[provider, model, "output"])
            .inc_by(output_tokens.max(0) as u64);
    }
}

/// Record provider latency.
pub fn record_llm_latency(provider: &str, model: &str, duration_secs: f64) {
    if let Some(histogram) = LLM_LATENCY_SECONDS.get() {
        histogram
            .with_label_values(&[provider, model])
            .observe(duration_secs);
    }
}

/// Record a provider error.
pub fn record_llm_error(provider: &str, error_type: &str) {
    if let Some(counter) = LLM_ERRORS_TOTAL.get() {
        counter.with_label_values(&[provider, error_type]).inc();
    }
}

/// Record content fetch duration.
pub fn record_fetch(fetcher: &str, duration_secs: f64) {
    if let Some(histogram) = FETCH_DURATION_SECONDS.get() {
        histogram
            .with_label_values(&[fetcher])
            .observe(duration_secs);
    }
}

/// Record a content fetch error.
pub fn record_fetch_error(error_type: &str) {
    if let Some(counter) = FETCH_ERRORS_TOTAL.get() {
        counter.with_label_values(&[error_type]).inc();
    }
}

/// Record a session store error.
pub fn record_store_error(operation: &str) {
    if let Some(counter) = STORE_ERRORS_TOTAL.get() {
        counter.with_label_values(&[operation]).inc();
    }
}
