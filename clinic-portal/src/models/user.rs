use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};

use super::Role;
use crate::authz::login_location;

/// The authenticated principal as reported by the hosted backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl Identity {
    pub fn display_name(&self) -> String {
        self.email
            .as_deref()
            .and_then(|email| email.split('@').next())
            .filter(|name| !name.is_empty())
            .unwrap_or("User")
            .to_string()
    }
}

/// Access and refresh token pair carried in the session cookies.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionTokens {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl SessionTokens {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            refresh_token: Some(refresh_token.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }
}

/// Outcome of session resolution for one request or guard mount.
#[derive(Debug, Clone)]
pub struct ResolvedSession {
    pub identity: Identity,
    /// Effective role after the unresolved-role policy was applied.
    /// `None` only under the `deny` policy.
    pub role: Option<Role>,
    /// Tokens in force for the rest of the request, refreshed or not.
    pub tokens: SessionTokens,
}

/// Authenticated user placed in request extensions by the session gate.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub identity: Identity,
    pub role: Option<Role>,
}

impl From<ResolvedSession> for AuthUser {
    fn from(session: ResolvedSession) -> Self {
        Self {
            identity: session.identity,
            role: session.role,
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<ResolvedSession>() {
            Some(session) => Ok(AuthUser::from(session.clone())),
            None => Err(Redirect::to(&login_location(parts.uri.path())).into_response()),
        }
    }
}
