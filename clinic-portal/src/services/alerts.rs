//! Reporting for requests the session gate let through unchecked.

use super::backend::BackendError;
use super::metrics::record_gate_fail_open;

/// Why the gate could not reach a verdict.
#[derive(Debug, thiserror::Error)]
pub enum GateFailure {
    #[error("session resolution failed: {0}")]
    Backend(#[from] BackendError),

    #[error("session gate panicked: {0}")]
    Panic(String),
}

impl GateFailure {
    pub fn reason(&self) -> &'static str {
        match self {
            GateFailure::Backend(_) => "backend",
            GateFailure::Panic(_) => "panic",
        }
    }
}

/// Receives every fail-open event. Access control is off for that request, so
/// implementations should make it loud.
pub trait GateFailureReporter: Send + Sync {
    fn report(&self, path: &str, failure: &GateFailure);
}

/// Error log plus the `auth_gate_fail_open_total` counter.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl GateFailureReporter for LogReporter {
    fn report(&self, path: &str, failure: &GateFailure) {
        record_gate_fail_open(failure.reason());
        tracing::error!(
            path = %path,
            reason = failure.reason(),
            error = %failure,
            "Session gate failed open; request passed through without authorization"
        );
    }
}
