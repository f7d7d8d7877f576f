use clinic_portal::config::get_configuration;
use clinic_portal::services::{HostedBackend, LogReporter};
use clinic_portal::startup::build_router;
use clinic_portal::AppState;
use dotenvy::dotenv;
use service_core::observability::{init_tracing, TracingSettings};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let configuration = get_configuration().map_err(|e| {
        eprintln!("Failed to read configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    init_tracing(TracingSettings {
        service_name: "clinic-portal",
        log_level: &configuration.server.log_level,
        otlp_endpoint: configuration.server.otlp_endpoint.as_deref(),
    })?;

    clinic_portal::services::metrics::init_metrics()
        .map_err(|e| anyhow::anyhow!("Failed to register metrics: {}", e))?;

    let policy = configuration
        .path_policy()
        .map_err(|e| anyhow::anyhow!("Invalid access policy: {}", e))?;

    let backend = HostedBackend::new(&configuration.backend)
        .map_err(|e| anyhow::anyhow!("Failed to create backend client: {}", e))?;

    if matches!(
        configuration.session.unresolved_role,
        clinic_portal::config::UnresolvedRolePolicy::LowestPrivilege
    ) {
        info!("Users without a resolvable role are treated as patients");
    }

    let state = AppState::new(
        Arc::new(backend),
        policy,
        configuration.session.clone(),
        Arc::new(LogReporter),
    );

    let app = build_router(state);

    let address = format!(
        "{}:{}",
        configuration.server.host, configuration.server.port
    );
    let listener = tokio::net::TcpListener::bind(&address).await.map_err(|e| {
        tracing::error!("Failed to bind TCP listener to {}: {}", address, e);
        anyhow::anyhow!("Failed to bind to address {}: {}", address, e)
    })?;

    info!("Starting clinic-portal on {}", address);
    axum::serve(listener, app).await.map_err(|e| {
        tracing::error!("Server error: {}", e);
        anyhow::anyhow!("Server error: {}", e)
    })?;

    Ok(())
}
