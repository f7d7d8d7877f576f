use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Deserialize;
use service_core::error::AppError;

use crate::guard::RouteGuard;
use crate::models::ResolvedSession;
use crate::services::session::cookie_jar_for;
use crate::services::SessionScope;
use crate::AppState;

#[derive(Deserialize)]
pub struct GuardQuery {
    pub path: String,
}

/// One route-guard mount for the caller's page.
///
/// Reuses tokens the session gate already refreshed for this request so a
/// rotated refresh token is never spent twice.
pub async fn guard_handler(
    State(state): State<AppState>,
    Query(query): Query<GuardQuery>,
    headers: HeaderMap,
    gate_session: Option<Extension<ResolvedSession>>,
) -> Result<Response, AppError> {
    if !query.path.starts_with('/') {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "path must be an absolute path"
        )));
    }

    let mut scope = match gate_session {
        Some(Extension(session)) => {
            SessionScope::new(state.backend.clone(), session.tokens, &state.session)
        }
        None => SessionScope::from_headers(state.backend.clone(), &headers, &state.session),
    };

    let mut guard = RouteGuard::mount(query.path);
    let guard_state = guard.resolve(&mut scope, &state.policy).await.clone();

    let mut response = match cookie_jar_for(&scope.cookie_update(), &state.session) {
        Some(jar) => (jar, Json(guard_state)).into_response(),
        None => Json(guard_state).into_response(),
    };
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));

    Ok(response)
}
