pub mod gate;
pub mod metrics;

pub use gate::{is_gate_exempt, session_gate};
pub use metrics::metrics_middleware;
