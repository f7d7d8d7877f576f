use anyhow::Result;
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

/// The subset of access-token claims the portal reads.
#[derive(Debug, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    pub exp: i64,
}

impl JwtClaims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

/// Decode JWT claims without validation.
///
/// The hosted backend verifies every token on each call, so the portal only
/// peeks at `exp` to decide when to refresh. Nothing here is an authorization
/// decision.
pub fn decode_jwt_claims(token: &str) -> Result<JwtClaims> {
    let parts: Vec<&str> = token.split('.').collect();

    if parts.len() != 3 {
        return Err(anyhow::anyhow!("Invalid JWT format"));
    }

    let payload = general_purpose::URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .map_err(|e| anyhow::anyhow!("Failed to decode JWT payload: {}", e))?;

    let claims: JwtClaims = serde_json::from_slice(&payload)
        .map_err(|e| anyhow::anyhow!("Failed to parse JWT claims: {}", e))?;

    Ok(claims)
}

/// Whether `token` expires within `leeway` of `now`.
///
/// Undecodable tokens count as expiring so the caller refreshes them.
pub fn expires_within(token: &str, leeway: Duration, now: DateTime<Utc>) -> bool {
    decode_jwt_claims(token)
        .ok()
        .and_then(|c| c.expires_at())
        .and_then(|expires_at| expires_at.checked_sub_signed(leeway))
        .is_none_or(|refresh_at| refresh_at <= now)
}
