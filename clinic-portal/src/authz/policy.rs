//! Ordered mapping from URL path prefix to the roles allowed under it.

use crate::models::Role;
use serde::Deserialize;

/// One protected prefix and the roles that may reach it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PolicyEntry {
    pub prefix: String,
    pub roles: Vec<Role>,
}

impl PolicyEntry {
    pub fn new(prefix: impl Into<String>, roles: &[Role]) -> Self {
        Self {
            prefix: prefix.into(),
            roles: roles.to_vec(),
        }
    }

    pub fn allows(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    #[error("policy prefix must start with '/': {0:?}")]
    InvalidPrefix(String),

    #[error("policy prefix {0:?} allows no roles")]
    EmptyRoles(String),
}

/// Protected prefixes, checked in declared order.
///
/// The first entry whose prefix is a string prefix of the path decides; a path
/// no entry matches is public.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPolicy {
    entries: Vec<PolicyEntry>,
}

impl PathPolicy {
    pub fn new(entries: Vec<PolicyEntry>) -> Result<Self, PolicyError> {
        for entry in &entries {
            if entry.prefix.len() < 2 || !entry.prefix.starts_with('/') {
                return Err(PolicyError::InvalidPrefix(entry.prefix.clone()));
            }
            if entry.roles.is_empty() {
                return Err(PolicyError::EmptyRoles(entry.prefix.clone()));
            }
        }
        Ok(Self { entries })
    }

    /// The clinic's role dashboards. Admins reach every area.
    pub fn clinic_default() -> Self {
        Self {
            entries: vec![
                PolicyEntry::new("/admin", &[Role::Admin]),
                PolicyEntry::new("/doctor", &[Role::Doctor, Role::Admin]),
                PolicyEntry::new("/staff", &[Role::Staff, Role::Admin]),
                PolicyEntry::new("/patient", &[Role::Patient, Role::Admin]),
            ],
        }
    }

    pub fn entries(&self) -> &[PolicyEntry] {
        &self.entries
    }

    /// The entry governing `path`, if the path is protected.
    pub fn matching_entry(&self, path: &str) -> Option<&PolicyEntry> {
        self.entries
            .iter()
            .find(|entry| path.starts_with(entry.prefix.as_str()))
    }

    pub fn is_protected(&self, path: &str) -> bool {
        self.matching_entry(path).is_some()
    }

    /// Whether `role` may access `path`. Public paths admit everyone, including
    /// callers without a role.
    pub fn permits(&self, path: &str, role: Option<Role>) -> bool {
        match self.matching_entry(path) {
            None => true,
            Some(entry) => role.is_some_and(|role| entry.allows(role)),
        }
    }
}

impl Default for PathPolicy {
    fn default() -> Self {
        Self::clinic_default()
    }
}
