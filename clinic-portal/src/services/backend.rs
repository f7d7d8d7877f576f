//! Client for the hosted auth/database backend.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use service_core::observability::TracedClientExt;
use std::time::Duration;
use thiserror::Error;

use crate::config::BackendSettings;
use crate::models::{Identity, SessionTokens};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    /// Credentials or tokens refused (400/401/403).
    #[error("backend rejected the request ({status})")]
    Rejected { status: u16 },

    #[error("backend returned {status}: {body}")]
    Unexpected { status: u16, body: String },

    #[error("malformed backend response: {0}")]
    Malformed(String),

    #[error("failed to build backend client: {0}")]
    Client(String),
}

impl BackendError {
    pub fn is_rejection(&self) -> bool {
        matches!(self, BackendError::Rejected { .. })
    }
}

impl From<BackendError> for service_core::error::AppError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Rejected { .. } => {
                service_core::error::AppError::Unauthorized(anyhow::anyhow!(err.to_string()))
            }
            other => service_core::error::AppError::BadGateway(other.to_string()),
        }
    }
}

/// Operations the portal needs from the hosted backend.
///
/// Implementations hold no per-user state: every call carries the tokens it
/// acts on, so one instance can serve all requests.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<SessionTokens, BackendError>;

    /// Exchange a refresh token for a new token pair.
    async fn refresh_session(&self, refresh_token: &str) -> Result<SessionTokens, BackendError>;

    /// Identity behind `access_token`. Expired or revoked tokens are `Rejected`.
    async fn get_user(&self, access_token: &str) -> Result<Identity, BackendError>;

    /// Raw role attribute of the identity's profile row, `None` if there is no row.
    async fn get_profile_role(
        &self,
        identity: &Identity,
        access_token: &str,
    ) -> Result<Option<String>, BackendError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError>;
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
}

#[derive(Deserialize)]
struct ProfileRow {
    role: Option<String>,
}

/// Supabase-compatible REST backend.
pub struct HostedBackend {
    client: Client,
    base_url: String,
    anon_key: Secret<String>,
}

impl HostedBackend {
    pub fn new(settings: &BackendSettings) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| BackendError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base_url: settings.url.trim_end_matches('/').to_string(),
            anon_key: settings.anon_key.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn apikey(&self) -> &str {
        self.anon_key.expose_secret()
    }

    async fn token_grant(
        &self,
        grant_type: &str,
        body: serde_json::Value,
    ) -> Result<SessionTokens, BackendError> {
        let url = self.url("/auth/v1/token");
        let response = self
            .client
            .traced_post(&url)
            .query(&[("grant_type", grant_type)])
            .header("apikey", self.apikey())
            .json(&body)
            .send()
            .await?;

        let tokens: TokenResponse = read_json(response).await?;
        Ok(SessionTokens::new(tokens.access_token, tokens.refresh_token))
    }
}

/// Map non-success statuses to errors and decode the body.
async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, BackendError> {
    let status = response.status();
    if matches!(
        status,
        StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
    ) {
        return Err(BackendError::Rejected {
            status: status.as_u16(),
        });
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(BackendError::Unexpected {
            status: status.as_u16(),
            body,
        });
    }

    response
        .json::<T>()
        .await
        .map_err(|e| BackendError::Malformed(e.to_string()))
}

#[async_trait]
impl AuthBackend for HostedBackend {
    async fn sign_in(&self, email: &str, password: &str) -> Result<SessionTokens, BackendError> {
        self.token_grant(
            "password",
            serde_json::json!({ "email": email, "password": password }),
        )
        .await
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<SessionTokens, BackendError> {
        self.token_grant(
            "refresh_token",
            serde_json::json!({ "refresh_token": refresh_token }),
        )
        .await
    }

    async fn get_user(&self, access_token: &str) -> Result<Identity, BackendError> {
        let url = self.url("/auth/v1/user");
        let response = self
            .client
            .traced_get(&url)
            .header("apikey", self.apikey())
            .bearer_auth(access_token)
            .send()
            .await?;

        read_json(response).await
    }

    async fn get_profile_role(
        &self,
        identity: &Identity,
        access_token: &str,
    ) -> Result<Option<String>, BackendError> {
        let url = self.url("/rest/v1/profiles");
        let id_filter = format!("eq.{}", identity.id);
        let response = self
            .client
            .traced_get(&url)
            .query(&[("select", "role"), ("id", id_filter.as_str())])
            .header("apikey", self.apikey())
            .bearer_auth(access_token)
            .send()
            .await?;

        let rows: Vec<ProfileRow> = read_json(response).await?;
        Ok(rows.into_iter().next().and_then(|row| row.role))
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError> {
        let url = self.url("/auth/v1/logout");
        let response = self
            .client
            .traced_post(&url)
            .header("apikey", self.apikey())
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() || status == StatusCode::UNAUTHORIZED {
            // An already-invalid token is as signed out as it gets.
            Ok(())
        } else {
            Err(BackendError::Unexpected {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            })
        }
    }
}
