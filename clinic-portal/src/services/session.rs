//! Request-scoped session resolution.
//!
//! A [`SessionScope`] is built fresh for every request (or guard mount) from
//! that request's cookies and dropped with it, so auth context never leaks
//! between requests. Only the backend's connection pool is shared.

use axum::http::HeaderMap;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;
use std::sync::Arc;

use super::backend::{AuthBackend, BackendError};
use crate::authz::{decide, PathPolicy, Verdict};
use crate::config::{SessionSettings, UnresolvedRolePolicy};
use crate::models::{Identity, ResolvedSession, Role, SessionTokens};
use crate::utils::jwt::expires_within;

/// Cookie changes a response must carry after resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookieUpdate {
    Keep,
    Set(SessionTokens),
    /// The cookies held tokens the backend refused.
    Clear,
}

/// Verdict plus the session it was computed from.
#[derive(Debug, Clone)]
pub struct Authorization {
    pub verdict: Verdict,
    pub session: Option<ResolvedSession>,
}

pub struct SessionScope {
    backend: Arc<dyn AuthBackend>,
    tokens: SessionTokens,
    refreshed: Option<SessionTokens>,
    refresh_attempted: bool,
    rejected: bool,
    unresolved_role: UnresolvedRolePolicy,
    refresh_leeway: chrono::Duration,
}

impl SessionScope {
    pub fn new(
        backend: Arc<dyn AuthBackend>,
        tokens: SessionTokens,
        settings: &SessionSettings,
    ) -> Self {
        Self {
            backend,
            tokens,
            refreshed: None,
            refresh_attempted: false,
            rejected: false,
            unresolved_role: settings.unresolved_role,
            refresh_leeway: chrono::Duration::seconds(i64::from(settings.refresh_leeway_secs)),
        }
    }

    /// Scope for the tokens carried in a request's `Cookie` headers.
    pub fn from_headers(
        backend: Arc<dyn AuthBackend>,
        headers: &HeaderMap,
        settings: &SessionSettings,
    ) -> Self {
        Self::new(backend, read_session_cookies(headers, settings), settings)
    }

    fn current(&self) -> &SessionTokens {
        self.refreshed.as_ref().unwrap_or(&self.tokens)
    }

    pub fn cookie_update(&self) -> CookieUpdate {
        match (&self.refreshed, self.rejected) {
            (Some(tokens), _) => CookieUpdate::Set(tokens.clone()),
            (None, true) => CookieUpdate::Clear,
            (None, false) => CookieUpdate::Keep,
        }
    }

    /// Resolve the session and decide whether `path` may be served.
    pub async fn authorize(
        &mut self,
        policy: &PathPolicy,
        path: &str,
    ) -> Result<Authorization, BackendError> {
        let session = self.resolve().await?;
        let verdict = decide(
            policy,
            session.is_some(),
            session.as_ref().and_then(|s| s.role),
            path,
        );
        Ok(Authorization { verdict, session })
    }

    /// Current identity and role, refreshing an expiring access token first.
    ///
    /// `Ok(None)` means there is no usable session. Errors are transport-level
    /// backend failures only; a failed role lookup falls back to the configured
    /// unresolved-role policy instead.
    pub async fn resolve(&mut self) -> Result<Option<ResolvedSession>, BackendError> {
        if self.tokens.is_empty() {
            return Ok(None);
        }

        let needs_refresh = match &self.tokens.access_token {
            Some(token) => expires_within(token, self.refresh_leeway, Utc::now()),
            None => true,
        };
        if needs_refresh {
            self.try_refresh().await?;
            // The backend ended this session, even if the old access token
            // still works for a few more seconds.
            if self.rejected {
                return Ok(None);
            }
        }

        let Some(identity) = self.fetch_identity().await? else {
            self.rejected = true;
            self.refreshed = None;
            return Ok(None);
        };

        let access_token = self.current().access_token.clone().unwrap_or_default();
        let role = self.lookup_role(&identity, &access_token).await;

        Ok(Some(ResolvedSession {
            identity,
            role,
            tokens: self.current().clone(),
        }))
    }

    async fn fetch_identity(&mut self) -> Result<Option<Identity>, BackendError> {
        for _ in 0..2 {
            let Some(access_token) = self.current().access_token.clone() else {
                return Ok(None);
            };

            match self.backend.get_user(&access_token).await {
                Ok(identity) => return Ok(Some(identity)),
                Err(e) if e.is_rejection() => {
                    tracing::debug!("Access token rejected by backend");
                    if !self.try_refresh().await? {
                        return Ok(None);
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    /// One refresh per scope. Returns whether fresh tokens are now in force.
    async fn try_refresh(&mut self) -> Result<bool, BackendError> {
        if self.refresh_attempted {
            return Ok(false);
        }
        self.refresh_attempted = true;

        let Some(refresh_token) = self.tokens.refresh_token.clone() else {
            return Ok(false);
        };

        match self.backend.refresh_session(&refresh_token).await {
            Ok(tokens) => {
                tracing::debug!("Session refreshed");
                self.refreshed = Some(tokens);
                Ok(true)
            }
            Err(e) if e.is_rejection() => {
                tracing::info!("Refresh token rejected, session has ended");
                self.rejected = true;
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn lookup_role(&self, identity: &Identity, access_token: &str) -> Option<Role> {
        let fallback = self.unresolved_role.fallback_role();

        match self.backend.get_profile_role(identity, access_token).await {
            Ok(Some(raw)) => match raw.parse::<Role>() {
                Ok(role) => Some(role),
                Err(e) => {
                    tracing::warn!(user_id = %identity.id, error = %e, fallback = ?fallback, "Unrecognized profile role");
                    fallback
                }
            },
            Ok(None) => {
                tracing::warn!(user_id = %identity.id, fallback = ?fallback, "Profile has no role");
                fallback
            }
            Err(e) => {
                tracing::warn!(user_id = %identity.id, error = %e, fallback = ?fallback, "Role lookup failed");
                fallback
            }
        }
    }
}

pub fn read_session_cookies(headers: &HeaderMap, settings: &SessionSettings) -> SessionTokens {
    let jar = CookieJar::from_headers(headers);
    let value = |name: &str| {
        jar.get(name)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
    };

    SessionTokens {
        access_token: value(&settings.access_cookie),
        refresh_token: value(&settings.refresh_cookie),
    }
}

fn session_cookie(name: &str, value: String, settings: &SessionSettings) -> Cookie<'static> {
    Cookie::build((name.to_string(), value))
        .path("/")
        .http_only(true)
        .secure(settings.secure_cookies)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(30))
        .build()
}

/// Write `tokens` into the session cookies.
pub fn set_session_cookies(
    mut jar: CookieJar,
    tokens: &SessionTokens,
    settings: &SessionSettings,
) -> CookieJar {
    if let Some(access) = &tokens.access_token {
        jar = jar.add(session_cookie(&settings.access_cookie, access.clone(), settings));
    }
    if let Some(refresh) = &tokens.refresh_token {
        jar = jar.add(session_cookie(&settings.refresh_cookie, refresh.clone(), settings));
    }
    jar
}

/// Expire both session cookies, whether or not the request carried them.
pub fn clear_session_cookies(jar: CookieJar, settings: &SessionSettings) -> CookieJar {
    [&settings.access_cookie, &settings.refresh_cookie]
        .into_iter()
        .fold(jar, |jar, name| {
            let mut removal = Cookie::build((name.to_string(), "")).path("/").build();
            removal.make_removal();
            jar.add(removal)
        })
}

/// Cookie jar carrying `update`, or `None` when nothing changes.
pub fn cookie_jar_for(update: &CookieUpdate, settings: &SessionSettings) -> Option<CookieJar> {
    match update {
        CookieUpdate::Keep => None,
        CookieUpdate::Set(tokens) => Some(set_session_cookies(CookieJar::new(), tokens, settings)),
        CookieUpdate::Clear => Some(clear_session_cookies(CookieJar::new(), settings)),
    }
}
