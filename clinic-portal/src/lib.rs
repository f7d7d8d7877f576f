pub mod authz;
pub mod config;
pub mod guard;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
pub mod utils;

use authz::PathPolicy;
use config::SessionSettings;
use services::{AuthBackend, GateFailureReporter};
use std::sync::Arc;

/// Shared application state.
///
/// Holds nothing user-specific: per-request auth context lives in a
/// `SessionScope` built from each request's cookies.
#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn AuthBackend>,
    pub policy: Arc<PathPolicy>,
    pub session: Arc<SessionSettings>,
    pub reporter: Arc<dyn GateFailureReporter>,
}

impl AppState {
    pub fn new(
        backend: Arc<dyn AuthBackend>,
        policy: PathPolicy,
        session: SessionSettings,
        reporter: Arc<dyn GateFailureReporter>,
    ) -> Self {
        Self {
            backend,
            policy: Arc::new(policy),
            session: Arc::new(session),
            reporter,
        }
    }
}
