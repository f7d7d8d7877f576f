#![allow(dead_code)]

use async_trait::async_trait;
use axum::{body::Body, http::Response};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use clinic_portal::authz::PathPolicy;
use clinic_portal::config::{SessionSettings, UnresolvedRolePolicy};
use clinic_portal::models::{Identity, SessionTokens};
use clinic_portal::services::{AuthBackend, BackendError, GateFailure, GateFailureReporter};
use clinic_portal::AppState;
use http_body_util::BodyExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// 2100-01-01T00:00:00Z
pub const FAR_FUTURE: i64 = 4_102_444_800;

pub fn jwt(sub: &str, exp: i64) -> String {
    let payload = serde_json::json!({ "sub": sub, "exp": exp }).to_string();
    format!(
        "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.{}.sig",
        URL_SAFE_NO_PAD.encode(payload)
    )
}

/// Long-lived access token for `user_id`.
pub fn access_token(user_id: &str) -> String {
    jwt(user_id, FAR_FUTURE)
}

/// Access token handed out by a refresh; distinct from [`access_token`].
pub fn refreshed_access_token(user_id: &str) -> String {
    jwt(user_id, FAR_FUTURE + 1)
}

pub fn expired_token(user_id: &str) -> String {
    jwt(user_id, 1)
}

pub fn refresh_token(user_id: &str) -> String {
    format!("refresh-{user_id}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outage {
    /// Backend answers 503.
    Unavailable,
    /// Backend client code panics.
    Panic,
}

#[derive(Debug, Clone, Copy)]
pub enum RoleRow {
    Role(&'static str),
    Missing,
    Fails,
}

/// In-memory stand-in for the hosted backend.
#[derive(Default)]
pub struct FakeBackend {
    users: HashMap<String, Identity>,
    roles: HashMap<String, RoleRow>,
    refresh: HashMap<String, SessionTokens>,
    passwords: HashMap<String, (String, String)>,
    outage: Option<Outage>,
    pub calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub signed_out: Mutex<Vec<String>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `user_id` with a valid access token, a working refresh token and `role`.
    pub fn with_user(mut self, user_id: &str, role: RoleRow) -> Self {
        let identity = Identity {
            id: user_id.to_string(),
            email: Some(format!("{user_id}@clinic.test")),
        };
        self.users.insert(access_token(user_id), identity.clone());
        self.users
            .insert(refreshed_access_token(user_id), identity);
        self.roles.insert(user_id.to_string(), role);
        self.refresh.insert(
            refresh_token(user_id),
            SessionTokens::new(
                refreshed_access_token(user_id),
                format!("rotated-{user_id}"),
            ),
        );
        self
    }

    /// Accept `token` as an access token for an already registered `user_id`.
    pub fn with_access_token(mut self, token: String, user_id: &str) -> Self {
        let identity = Identity {
            id: user_id.to_string(),
            email: Some(format!("{user_id}@clinic.test")),
        };
        self.users.insert(token, identity);
        self
    }

    pub fn with_password(mut self, email: &str, password: &str, user_id: &str) -> Self {
        self.passwords
            .insert(email.to_string(), (password.to_string(), user_id.to_string()));
        self
    }

    pub fn failing(mut self, outage: Outage) -> Self {
        self.outage = Some(outage);
        self
    }

    pub fn total_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn check_outage(&self) -> Result<(), BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.outage {
            None => Ok(()),
            Some(Outage::Unavailable) => Err(BackendError::Unexpected {
                status: 503,
                body: "upstream connect error".to_string(),
            }),
            Some(Outage::Panic) => panic!("backend client bug"),
        }
    }
}

#[async_trait]
impl AuthBackend for FakeBackend {
    async fn sign_in(&self, email: &str, password: &str) -> Result<SessionTokens, BackendError> {
        self.check_outage()?;
        match self.passwords.get(email) {
            Some((expected, user_id)) if expected == password => Ok(SessionTokens::new(
                access_token(user_id),
                refresh_token(user_id),
            )),
            _ => Err(BackendError::Rejected { status: 400 }),
        }
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<SessionTokens, BackendError> {
        self.check_outage()?;
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.refresh
            .get(refresh_token)
            .cloned()
            .ok_or(BackendError::Rejected { status: 400 })
    }

    async fn get_user(&self, access_token: &str) -> Result<Identity, BackendError> {
        self.check_outage()?;
        self.users
            .get(access_token)
            .cloned()
            .ok_or(BackendError::Rejected { status: 401 })
    }

    async fn get_profile_role(
        &self,
        identity: &Identity,
        _access_token: &str,
    ) -> Result<Option<String>, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.roles.get(&identity.id) {
            Some(RoleRow::Role(role)) => Ok(Some(role.to_string())),
            Some(RoleRow::Missing) | None => Ok(None),
            Some(RoleRow::Fails) => Err(BackendError::Malformed("profiles: bad json".to_string())),
        }
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError> {
        self.check_outage()?;
        self.signed_out
            .lock()
            .unwrap()
            .push(access_token.to_string());
        Ok(())
    }
}

/// Records fail-open events instead of logging them.
#[derive(Default)]
pub struct RecordingReporter {
    pub events: Mutex<Vec<(String, &'static str)>>,
}

impl RecordingReporter {
    pub fn events(&self) -> Vec<(String, &'static str)> {
        self.events.lock().unwrap().clone()
    }
}

impl GateFailureReporter for RecordingReporter {
    fn report(&self, path: &str, failure: &GateFailure) {
        self.events
            .lock()
            .unwrap()
            .push((path.to_string(), failure.reason()));
    }
}

pub fn test_session_settings() -> SessionSettings {
    SessionSettings {
        secure_cookies: false,
        ..SessionSettings::default()
    }
}

pub struct TestContext {
    pub state: AppState,
    pub backend: Arc<FakeBackend>,
    pub reporter: Arc<RecordingReporter>,
}

pub fn context(backend: FakeBackend) -> TestContext {
    context_with(backend, UnresolvedRolePolicy::LowestPrivilege)
}

pub fn context_with(backend: FakeBackend, unresolved_role: UnresolvedRolePolicy) -> TestContext {
    context_with_settings(
        backend,
        SessionSettings {
            unresolved_role,
            ..test_session_settings()
        },
    )
}

pub fn context_with_settings(backend: FakeBackend, settings: SessionSettings) -> TestContext {
    let backend = Arc::new(backend);
    let reporter = Arc::new(RecordingReporter::default());

    let state = AppState::new(
        backend.clone(),
        PathPolicy::clinic_default(),
        settings,
        reporter.clone(),
    );

    TestContext {
        state,
        backend,
        reporter,
    }
}

/// Backend with one user per role, named after the role.
pub fn clinic_backend() -> FakeBackend {
    FakeBackend::new()
        .with_user("patient", RoleRow::Role("patient"))
        .with_user("doctor", RoleRow::Role("doctor"))
        .with_user("staff", RoleRow::Role("staff"))
        .with_user("admin", RoleRow::Role("admin"))
}

pub fn session_cookie(access: Option<&str>, refresh: Option<&str>) -> String {
    let mut parts = Vec::new();
    if let Some(access) = access {
        parts.push(format!("sb-access-token={access}"));
    }
    if let Some(refresh) = refresh {
        parts.push(format!("sb-refresh-token={refresh}"));
    }
    parts.join("; ")
}

/// Cookie header for a signed-in user with a long-lived access token.
pub fn signed_in(user_id: &str) -> String {
    session_cookie(Some(&access_token(user_id)), Some(&refresh_token(user_id)))
}

pub fn location(response: &Response<Body>) -> Option<&str> {
    response
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
}

pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok().map(str::to_string))
        .collect()
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}
