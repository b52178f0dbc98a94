//! Prometheus metrics for sentence-service.
//!
//! Recording helpers are no-ops until [`init_metrics`] has run, so library
//! code and tests can call them unconditionally.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::OnceLock;

// Global registry
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

// HTTP metrics
pub static HTTP_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static HTTP_REQUEST_DURATION_SECONDS: OnceLock<HistogramVec> = OnceLock::new();

// Model metrics
pub static MODEL_INVOCATIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static MODEL_INVOCATION_DURATION_SECONDS: OnceLock<HistogramVec> = OnceLock::new();
pub static MODEL_PROVIDER_ERRORS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

// Selection metrics
pub static SENTENCE_SELECTIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Initialize all metrics. Safe to call more than once; only the first call registers.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    if REGISTRY.get().is_some() {
        return Ok(());
    }

    let registry = Registry::new();

    let http_requests_total = IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests"),
        &["method", "path", "status"],
    )?;

    let http_request_duration = HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["method", "path"],
    )?;

    // outcome: sentence, too_short, word_missing, no_output, failed
    let model_invocations = IntCounterVec::new(
        Opts::new("model_invocations_total", "Total model invocations by outcome"),
        &["model", "outcome"],
    )?;

    let model_latency = HistogramVec::new(
        HistogramOpts::new(
            "model_invocation_duration_seconds",
            "Model invocation latency in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
        &["model"],
    )?;

    let provider_errors = IntCounterVec::new(
        Opts::new(
            "model_provider_errors_total",
            "Total backend errors by error kind",
        ),
        &["model", "error_kind"],
    )?;

    // source: generated, fallback, timeout, error
    let selections = IntCounterVec::new(
        Opts::new("sentence_selections_total", "Total sentence selections by source"),
        &["source"],
    )?;

    registry.register(Box::new(http_requests_total.clone()))?;
    registry.register(Box::new(http_request_duration.clone()))?;
    registry.register(Box::new(model_invocations.clone()))?;
    registry.register(Box::new(model_latency.clone()))?;
    registry.register(Box::new(provider_errors.clone()))?;
    registry.register(Box::new(selections.clone()))?;

    // Initialize globals
    let _ = REGISTRY.set(registry);
    let _ = HTTP_REQUESTS_TOTAL.set(http_requests_total);
    let _ = HTTP_REQUEST_DURATION_SECONDS.set(http_request_duration);
    let _ = MODEL_INVOCATIONS_TOTAL.set(model_invocations);
    let _ = MODEL_INVOCATION_DURATION_SECONDS.set(model_latency);
    let _ = MODEL_PROVIDER_ERRORS_TOTAL.set(provider_errors);
    let _ = SENTENCE_SELECTIONS_TOTAL.set(selections);

    tracing::info!("Prometheus metrics initialized");
    Ok(())
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

/// Record one model invocation and its latency.
pub fn record_model_invocation(model: &str, outcome: &str, duration_secs: f64) {
    if let Some(counter) = MODEL_INVOCATIONS_TOTAL.get() {
        counter.with_label_values(&[model, outcome]).inc();
    }
    if let Some(histogram) = MODEL_INVOCATION_DURATION_SECONDS.get() {
        histogram.with_label_values(&[model]).observe(duration_secs);
    }
}

/// Record a backend error.
pub fn record_provider_error(model: &str, error_kind: &str) {
    if let Some(counter) = MODEL_PROVIDER_ERRORS_TOTAL.get() {
        counter.with_label_values(&[model, error_kind]).inc();
    }
}

/// Record how a request's sentence was produced.
pub fn record_selection(source: &str) {
    if let Some(counter) = SENTENCE_SELECTIONS_TOTAL.get() {
        counter.with_label_values(&[source]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent_and_exports_families() {
        init_metrics().unwrap();
        init_metrics().unwrap();

        record_selection("fallback");
        record_model_invocation("m1", "sentence", 0.2);

        let text = get_metrics();
        assert!(text.contains("sentence_selections_total"));
        assert!(text.contains("model_invocations_total"));
    }
}
