use super::PathPolicy;
use crate::models::Role;

pub const LOGIN_PATH: &str = "/login";
pub const UNAUTHORIZED_PATH: &str = "/unauthorized";

/// Outcome of authorizing one request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    /// `next` is the exact path that was requested.
    RedirectToLogin { next: String },
    RedirectToUnauthorized,
}

impl Verdict {
    /// Where the caller should be sent, or `None` to proceed.
    pub fn location(&self) -> Option<String> {
        match self {
            Verdict::Allow => None,
            Verdict::RedirectToLogin { next } => Some(login_location(next)),
            Verdict::RedirectToUnauthorized => Some(UNAUTHORIZED_PATH.to_string()),
        }
    }

    /// Metric label.
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Allow => "allow",
            Verdict::RedirectToLogin { .. } => "login",
            Verdict::RedirectToUnauthorized => "unauthorized",
        }
    }
}

/// `/login?next=<path>`, with the path query-encoded.
pub fn login_location(next: &str) -> String {
    match serde_urlencoded::to_string(&[("next", next)]) {
        Ok(query) => format!("{LOGIN_PATH}?{query}"),
        Err(_) => LOGIN_PATH.to_string(),
    }
}

/// Decide whether a request for `path` may proceed.
///
/// Pure: the same inputs always give the same verdict, whether evaluated by the
/// server-side gate or by a route guard mount.
pub fn decide(policy: &PathPolicy, session_present: bool, role: Option<Role>, path: &str) -> Verdict {
    let Some(entry) = policy.matching_entry(path) else {
        return Verdict::Allow;
    };

    if !session_present {
        return Verdict::RedirectToLogin {
            next: path.to_string(),
        };
    }

    match role {
        Some(role) if entry.allows(role) => Verdict::Allow,
        _ => Verdict::RedirectToUnauthorized,
    }
}
