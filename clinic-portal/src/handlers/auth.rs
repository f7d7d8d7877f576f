use askama::Template;
use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use service_core::error::AppError;
use validator::Validate;

use crate::models::{Role, SessionTokens};
use crate::services::session::{clear_session_cookies, read_session_cookies, set_session_cookies};
use crate::services::SessionScope;
use crate::AppState;

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub next: Option<String>,
    pub error: Option<&'static str>,
}

#[derive(Deserialize)]
pub struct LoginQuery {
    pub next: Option<String>,
}

#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
    pub next: Option<String>,
}

/// `next` if it stays on this site, so the login form can't be used as an open redirect.
pub fn safe_next(next: Option<&str>) -> Option<&str> {
    next.filter(|n| n.starts_with('/') && !n.starts_with("//") && !n.contains('\\'))
}

pub async fn login_page(Query(query): Query<LoginQuery>) -> impl IntoResponse {
    LoginTemplate {
        next: safe_next(query.next.as_deref()).map(str::to_string),
        error: None,
    }
}

pub async fn login_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(payload): Form<LoginRequest>,
) -> Result<Response, AppError> {
    let next = safe_next(payload.next.as_deref()).map(str::to_string);

    if payload.validate().is_err() {
        let page = LoginTemplate {
            next,
            error: Some("Enter a valid email address and password."),
        };
        return Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response());
    }

    let tokens = match state.backend.sign_in(&payload.email, &payload.password).await {
        Ok(tokens) => tokens,
        Err(e) if e.is_rejection() => {
            tracing::info!("Sign-in rejected");
            let page = LoginTemplate {
                next,
                error: Some("Invalid email or password."),
            };
            return Ok((StatusCode::UNAUTHORIZED, page).into_response());
        }
        Err(e) => {
            tracing::error!(error = %e, "Sign-in failed");
            return Err(e.into());
        }
    };

    // Same resolution the gate will run on the next request, so the landing
    // page matches what the user is actually allowed to see.
    let mut scope = SessionScope::new(state.backend.clone(), tokens, &state.session);
    let Some(session) = scope.resolve().await? else {
        tracing::warn!("Backend issued tokens it then refused");
        let page = LoginTemplate {
            next,
            error: Some("Your session could not be started. Please try again."),
        };
        return Ok((StatusCode::UNAUTHORIZED, page).into_response());
    };
    let role = session.role;
    tracing::info!(user_id = %session.identity.id, role = ?role, "User signed in");

    let target = match (next, role) {
        (Some(next), _) => next,
        (None, Some(role)) => role.home_path().to_string(),
        (None, None) => Role::LOWEST_PRIVILEGE.home_path().to_string(),
    };

    let jar = set_session_cookies(jar, &session.tokens, &state.session);
    Ok((jar, Redirect::to(&target)).into_response())
}

pub async fn logout_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> impl IntoResponse {
    let SessionTokens { access_token, .. } = read_session_cookies(&headers, &state.session);

    if let Some(access_token) = access_token {
        // Cookies are cleared even if the backend can't be told.
        match state.backend.sign_out(&access_token).await {
            Ok(()) => tracing::info!("Session revoked"),
            Err(e) => tracing::error!(error = %e, "Failed to revoke session during logout"),
        }
    }

    (clear_session_cookies(jar, &state.session), Redirect::to("/"))
}
