use secrecy::Secret;
use serde::Deserialize;

use crate::authz::{PathPolicy, PolicyEntry, PolicyError};
use crate::models::Role;

#[derive(Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub backend: BackendSettings,
    #[serde(default)]
    pub session: SessionSettings,
    /// Replaces the built-in role/path table when present.
    #[serde(default)]
    pub policy: Option<Vec<PolicyEntry>>,
}

impl Settings {
    pub fn path_policy(&self) -> Result<PathPolicy, PolicyError> {
        match &self.policy {
            Some(entries) => PathPolicy::new(entries.clone()),
            None => Ok(PathPolicy::clinic_default()),
        }
    }
}

#[derive(Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// OTLP collector for span export; logs only when unset.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Hosted auth/database backend (Supabase-compatible REST API).
#[derive(Deserialize, Clone)]
pub struct BackendSettings {
    /// Project URL, e.g. https://xyz.supabase.co
    pub url: String,
    /// Public anon key sent as the `apikey` header on every call.
    pub anon_key: Secret<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    5
}

/// What to do when an authenticated user's role cannot be determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedRolePolicy {
    /// Treat the user as a patient, the least privileged role.
    #[default]
    LowestPrivilege,
    /// Leave the role empty so every protected path is refused.
    Deny,
}

impl UnresolvedRolePolicy {
    pub fn fallback_role(&self) -> Option<Role> {
        match self {
            UnresolvedRolePolicy::LowestPrivilege => Some(Role::LOWEST_PRIVILEGE),
            UnresolvedRolePolicy::Deny => None,
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct SessionSettings {
    #[serde(default = "default_access_cookie")]
    pub access_cookie: String,
    #[serde(default = "default_refresh_cookie")]
    pub refresh_cookie: String,
    /// Mark cookies `Secure`. Disable only for plain-HTTP local development.
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,
    /// Refresh access tokens that expire within this many seconds.
    /// At most [`MAX_REFRESH_LEEWAY_SECS`].
    #[serde(default = "default_refresh_leeway_secs")]
    pub refresh_leeway_secs: u32,
    #[serde(default)]
    pub unresolved_role: UnresolvedRolePolicy,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            access_cookie: default_access_cookie(),
            refresh_cookie: default_refresh_cookie(),
            secure_cookies: default_secure_cookies(),
            refresh_leeway_secs: default_refresh_leeway_secs(),
            unresolved_role: UnresolvedRolePolicy::default(),
        }
    }
}

fn default_access_cookie() -> String {
    "sb-access-token".to_string()
}

fn default_refresh_cookie() -> String {
    "sb-refresh-token".to_string()
}

fn default_secure_cookies() -> bool {
    true
}

fn default_refresh_leeway_secs() -> u32 {
    60
}

/// One day. Access tokens never live that long, so a larger leeway would
/// refresh on every request.
pub const MAX_REFRESH_LEEWAY_SECS: u32 = 86_400;

impl SessionSettings {
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.refresh_leeway_secs > MAX_REFRESH_LEEWAY_SECS {
            return Err(config::ConfigError::Message(format!(
                "session.refresh_leeway_secs must be at most {MAX_REFRESH_LEEWAY_SECS}, got {}",
                self.refresh_leeway_secs
            )));
        }
        Ok(())
    }
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir().map_err(|e| {
        config::ConfigError::Message(format!("Failed to determine the current directory: {}", e))
    })?;

    // Works both from the workspace root and from inside clinic-portal/
    let configuration_directory = if base_path.ends_with("clinic-portal") {
        base_path.join("config")
    } else {
        base_path.join("clinic-portal").join("config")
    };

    let settings = config::Config::builder()
        .add_source(config::File::from(configuration_directory.join("base.yaml")).required(true))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    let settings = settings.try_deserialize::<Settings>()?;
    settings.session.validate()?;

    Ok(settings)
}
