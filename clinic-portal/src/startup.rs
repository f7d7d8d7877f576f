use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use service_core::middleware::{
    request_id::{request_id_middleware, REQUEST_ID_HEADER},
    security_headers::security_headers_middleware,
};
use std::path::PathBuf;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    app::{health_check, index, unauthorized_page},
    auth::{login_handler, login_page, logout_handler},
    dashboard::dashboard_handler,
    guard::guard_handler,
    metrics::metrics,
};
use crate::middleware::{metrics_middleware, session_gate};
use crate::models::Role;
use crate::AppState;

fn static_dir() -> PathBuf {
    match std::env::current_dir() {
        Ok(dir) if dir.ends_with("clinic-portal") => dir.join("static"),
        _ => PathBuf::from("clinic-portal").join("static"),
    }
}

pub fn build_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/login", get(login_page).post(login_handler))
        .route("/logout", post(logout_handler))
        .route("/unauthorized", get(unauthorized_page))
        .route("/api/guard", get(guard_handler));

    for role in Role::ALL {
        let home = role.home_path();
        router = router
            .route(home, get(dashboard_handler))
            .route(&format!("{home}/*rest"), get(dashboard_handler));
    }

    router
        .nest_service("/static", ServeDir::new(static_dir()))
        // Runs before every handler; static assets are exempted inside.
        .layer(from_fn_with_state(state.clone(), session_gate))
        .layer(from_fn(metrics_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri().path(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}
