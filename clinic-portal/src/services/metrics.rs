use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

// Global registry
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

// Metrics
pub static HTTP_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static HTTP_REQUEST_DURATION_SECONDS: OnceLock<HistogramVec> = OnceLock::new();
pub static GATE_VERDICTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static GATE_FAIL_OPEN_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Register all collectors. Safe to call more than once; later calls are ignored.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    if REGISTRY.get().is_some() {
        return Ok(());
    }

    let registry = Registry::new();

    let requests_total = IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests"),
        &["method", "path", "status"],
    )?;

    let request_duration = HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds",
        ),
        &["method", "path", "status"],
    )?;

    let gate_verdicts = IntCounterVec::new(
        Opts::new("auth_gate_verdicts_total", "Session gate verdicts"),
        &["verdict"],
    )?;

    let gate_fail_open = IntCounterVec::new(
        Opts::new(
            "auth_gate_fail_open_total",
            "Requests passed through because the session gate failed",
        ),
        &["reason"],
    )?;

    registry.register(Box::new(requests_total.clone()))?;
    registry.register(Box::new(request_duration.clone()))?;
    registry.register(Box::new(gate_verdicts.clone()))?;
    registry.register(Box::new(gate_fail_open.clone()))?;

    let _ = REGISTRY.set(registry);
    let _ = HTTP_REQUESTS_TOTAL.set(requests_total);
    let _ = HTTP_REQUEST_DURATION_SECONDS.set(request_duration);
    let _ = GATE_VERDICTS_TOTAL.set(gate_verdicts);
    let _ = GATE_FAIL_OPEN_TOTAL.set(gate_fail_open);

    Ok(())
}

pub fn record_http_request(method: &str, path: &str, status: &str, seconds: f64) {
    if let Some(counter) = HTTP_REQUESTS_TOTAL.get() {
        counter.with_label_values(&[method, path, status]).inc();
    }
    if let Some(histogram) = HTTP_REQUEST_DURATION_SECONDS.get() {
        histogram
            .with_label_values(&[method, path, status])
            .observe(seconds);
    }
}

pub fn record_gate_verdict(verdict: &str) {
    if let Some(counter) = GATE_VERDICTS_TOTAL.get() {
        counter.with_label_values(&[verdict]).inc();
    }
}

pub fn record_gate_fail_open(reason: &str) {
    if let Some(counter) = GATE_FAIL_OPEN_TOTAL.get() {
        counter.with_label_values(&[reason]).inc();
    }
}

/// Text exposition of every registered metric; empty before [`init_metrics`].
pub fn get_metrics() -> Result<String, prometheus::Error> {
    let Some(registry) = REGISTRY.get() else {
        return Ok(String::new());
    };

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
