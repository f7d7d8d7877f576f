use axum::{
    extract::Query,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use clinic_portal::config::BackendSettings;
use clinic_portal::models::{Identity, SessionTokens};
use clinic_portal::services::{AuthBackend, BackendError, HostedBackend};
use secrecy::Secret;
use serde_json::{json, Value};
use std::collections::HashMap;

const ANON_KEY: &str = "anon-key";

fn has_apikey(headers: &HeaderMap) -> bool {
    headers.get("apikey").and_then(|v| v.to_str().ok()) == Some(ANON_KEY)
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

async fn token(
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !has_apikey(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let granted = match query.get("grant_type").map(String::as_str) {
        Some("password") => {
            body["email"] == "doctor@clinic.test" && body["password"] == "correct horse"
        }
        Some("refresh_token") => body["refresh_token"] == "refresh-1",
        _ => false,
    };

    if granted {
        Json(json!({
            "access_token": "access-2",
            "refresh_token": "refresh-2",
            "token_type": "bearer",
            "expires_in": 3600
        }))
        .into_response()
    } else {
        (StatusCode::BAD_REQUEST, Json(json!({ "error": "invalid_grant" }))).into_response()
    }
}

async fn user(headers: HeaderMap) -> Response {
    match bearer(&headers) {
        Some("access-2") => Json(json!({
            "id": "u-1",
            "email": "doctor@clinic.test",
            "aud": "authenticated"
        }))
        .into_response(),
        Some("explode") => (StatusCode::INTERNAL_SERVER_ERROR, "database down").into_response(),
        Some("garbled") => "not json".into_response(),
        _ => StatusCode::UNAUTHORIZED.into_response(),
    }
}

async fn profiles(Query(query): Query<HashMap<String, String>>, headers: HeaderMap) -> Response {
    if bearer(&headers).is_none() || query.get("select").map(String::as_str) != Some("role") {
        return StatusCode::BAD_REQUEST.into_response();
    }
    match query.get("id").map(String::as_str) {
        Some("eq.u-1") => Json(json!([{ "role": "doctor" }])).into_response(),
        Some("eq.u-null") => Json(json!([{ "role": null }])).into_response(),
        _ => Json(json!([])).into_response(),
    }
}

async fn logout(headers: HeaderMap) -> StatusCode {
    match bearer(&headers) {
        Some("access-2") => StatusCode::NO_CONTENT,
        Some("expired") => StatusCode::UNAUTHORIZED,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Serve a stand-in for the hosted backend on an ephemeral port.
async fn spawn_backend() -> String {
    let app = Router::new()
        .route("/auth/v1/token", post(token))
        .route("/auth/v1/user", get(user))
        .route("/auth/v1/logout", post(logout))
        .route("/rest/v1/profiles", get(profiles));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{addr}/")
}

fn client(url: String) -> HostedBackend {
    HostedBackend::new(&BackendSettings {
        url,
        anon_key: Secret::new(ANON_KEY.to_string()),
        timeout_secs: 2,
    })
    .unwrap()
}

fn identity(id: &str) -> Identity {
    Identity {
        id: id.to_string(),
        email: None,
    }
}

#[tokio::test]
async fn password_sign_in_returns_token_pair() {
    let backend = client(spawn_backend().await);

    let tokens = backend
        .sign_in("doctor@clinic.test", "correct horse")
        .await
        .unwrap();
    assert_eq!(tokens, SessionTokens::new("access-2", "refresh-2"));

    let err = backend
        .sign_in("doctor@clinic.test", "wrong")
        .await
        .unwrap_err();
    assert!(err.is_rejection(), "{err}");
}

#[tokio::test]
async fn refresh_rotates_tokens_and_rejects_unknown_ones() {
    let backend = client(spawn_backend().await);

    let tokens = backend.refresh_session("refresh-1").await.unwrap();
    assert_eq!(tokens.refresh_token.as_deref(), Some("refresh-2"));

    let err = backend.refresh_session("stale").await.unwrap_err();
    assert!(matches!(err, BackendError::Rejected { status: 400 }));
}

#[tokio::test]
async fn get_user_maps_statuses() {
    let backend = client(spawn_backend().await);

    let user = backend.get_user("access-2").await.unwrap();
    assert_eq!(user.id, "u-1");
    assert_eq!(user.email.as_deref(), Some("doctor@clinic.test"));

    assert!(matches!(
        backend.get_user("revoked").await,
        Err(BackendError::Rejected { status: 401 })
    ));
    assert!(matches!(
        backend.get_user("explode").await,
        Err(BackendError::Unexpected { status: 500, .. })
    ));
    assert!(matches!(
        backend.get_user("garbled").await,
        Err(BackendError::Malformed(_))
    ));
}

#[tokio::test]
async fn profile_role_reads_first_row() {
    let backend = client(spawn_backend().await);

    let role = backend
        .get_profile_role(&identity("u-1"), "access-2")
        .await
        .unwrap();
    assert_eq!(role.as_deref(), Some("doctor"));

    let none = backend
        .get_profile_role(&identity("u-2"), "access-2")
        .await
        .unwrap();
    assert_eq!(none, None);

    let null = backend
        .get_profile_role(&identity("u-null"), "access-2")
        .await
        .unwrap();
    assert_eq!(null, None);
}

#[tokio::test]
async fn sign_out_tolerates_already_invalid_tokens() {
    let backend = client(spawn_backend().await);

    backend.sign_out("access-2").await.unwrap();
    backend.sign_out("expired").await.unwrap();
    assert!(matches!(
        backend.sign_out("other").await,
        Err(BackendError::Unexpected { status: 500, .. })
    ));
}

#[tokio::test]
async fn unreachable_backend_is_a_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let backend = client(format!("http://{addr}"));
    let err = backend.get_user("access-2").await.unwrap_err();

    assert!(matches!(err, BackendError::Transport(_)), "{err}");
    assert!(!err.is_rejection());
}
