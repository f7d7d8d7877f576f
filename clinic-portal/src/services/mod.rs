pub mod alerts;
pub mod backend;
pub mod metrics;
pub mod session;

pub use alerts::{GateFailure, GateFailureReporter, LogReporter};
pub use backend::{AuthBackend, BackendError, HostedBackend};
pub use session::{Authorization, CookieUpdate, SessionScope};
