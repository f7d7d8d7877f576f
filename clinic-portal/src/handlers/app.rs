use askama::Template;
use axum::{http::StatusCode, response::IntoResponse};

use crate::models::AuthUser;

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub user_name: Option<String>,
    pub home_path: Option<&'static str>,
}

pub async fn index(user: Option<AuthUser>) -> impl IntoResponse {
    IndexTemplate {
        user_name: user.as_ref().map(|u| u.identity.display_name()),
        home_path: user.and_then(|u| u.role).map(|role| role.home_path()),
    }
}

pub async fn health_check() -> &'static str {
    "OK"
}

#[derive(Template)]
#[template(path = "unauthorized.html")]
pub struct UnauthorizedTemplate {
    pub home_path: Option<&'static str>,
}

pub async fn unauthorized_page(user: Option<AuthUser>) -> impl IntoResponse {
    let template = UnauthorizedTemplate {
        home_path: user.and_then(|u| u.role).map(|role| role.home_path()),
    };
    (StatusCode::FORBIDDEN, template)
}
