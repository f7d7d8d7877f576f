//! Session and role gate run in front of every page.
//!
//! The gate resolves the caller's session (refreshing tokens on the way),
//! decides whether the path may be served, and forwards refreshed cookies on
//! whatever response goes out. If the gate itself fails, the request passes
//! through untouched and the failure goes to the configured reporter.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;

use crate::services::metrics::record_gate_verdict;
use crate::services::session::cookie_jar_for;
use crate::services::{Authorization, BackendError, GateFailure, SessionScope};
use crate::AppState;

const EXEMPT_PREFIXES: &[&str] = &["/static/", "/_next/static", "/_next/image"];
const EXEMPT_FILES: &[&str] = &["/favicon.ico"];
const IMAGE_EXTENSIONS: &[&str] = &["svg", "png", "jpg", "jpeg", "gif", "webp", "ico"];

/// Static assets and images never reach the gate.
pub fn is_gate_exempt(path: &str) -> bool {
    if EXEMPT_PREFIXES.iter().any(|prefix| path.starts_with(prefix)) {
        return true;
    }
    if EXEMPT_FILES.contains(&path) {
        return true;
    }

    let file_name = path.rsplit('/').next().unwrap_or_default();
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => IMAGE_EXTENSIONS
            .iter()
            .any(|image| ext.eq_ignore_ascii_case(image)),
        _ => false,
    }
}

struct GateOutcome {
    authorization: Authorization,
    cookies: Option<CookieJar>,
}

async fn evaluate(
    state: &AppState,
    headers: &HeaderMap,
    path: &str,
) -> Result<GateOutcome, BackendError> {
    let mut scope = SessionScope::from_headers(state.backend.clone(), headers, &state.session);
    let authorization = scope.authorize(&state.policy, path).await?;
    let cookies = cookie_jar_for(&scope.cookie_update(), &state.session);

    Ok(GateOutcome {
        authorization,
        cookies,
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

pub async fn session_gate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if is_gate_exempt(&path) {
        return next.run(request).await;
    }

    let evaluation = AssertUnwindSafe(evaluate(&state, request.headers(), &path))
        .catch_unwind()
        .await;

    let outcome = match evaluation {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => {
            state.reporter.report(&path, &GateFailure::Backend(e));
            return next.run(request).await;
        }
        Err(payload) => {
            state
                .reporter
                .report(&path, &GateFailure::Panic(panic_message(payload.as_ref())));
            return next.run(request).await;
        }
    };

    let GateOutcome {
        authorization,
        cookies,
    } = outcome;
    let verdict = authorization.verdict;
    record_gate_verdict(verdict.label());

    let response = match verdict.location() {
        None => {
            if let Some(session) = authorization.session {
                request.extensions_mut().insert(session);
            }
            next.run(request).await
        }
        Some(location) => {
            tracing::debug!(path = %path, verdict = verdict.label(), location = %location, "Request redirected by session gate");
            Redirect::to(&location).into_response()
        }
    };

    match cookies {
        Some(jar) => (jar, response).into_response(),
        None => response,
    }
}
