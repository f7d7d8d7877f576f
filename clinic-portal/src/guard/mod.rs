//! Per-mount route guard.
//!
//! A page shell mounts a [`RouteGuard`], shows a loading state, and re-runs the
//! same session resolution and decision as the server gate exactly once. The
//! result is terminal for that mount. If the page unmounted before resolution
//! finished, the late result is dropped.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::authz::{decide, PathPolicy, Verdict};
use crate::services::SessionScope;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GuardState {
    Loading,
    Authorized,
    /// Navigation to `location` has been issued.
    Redirecting { location: String },
}

impl GuardState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, GuardState::Loading)
    }
}

/// What the guarded shell shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardView<T> {
    LoadingIndicator,
    Content(T),
    Blank,
}

/// Shared flag flipped when the page shell goes away.
#[derive(Debug, Clone)]
pub struct MountHandle {
    mounted: Arc<AtomicBool>,
}

impl MountHandle {
    pub fn unmount(&self) {
        self.mounted.store(false, Ordering::Release);
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
pub struct RouteGuard {
    path: String,
    state: GuardState,
    mount: MountHandle,
}

impl RouteGuard {
    pub fn mount(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            state: GuardState::Loading,
            mount: MountHandle {
                mounted: Arc::new(AtomicBool::new(true)),
            },
        }
    }

    pub fn state(&self) -> &GuardState {
        &self.state
    }

    pub fn handle(&self) -> MountHandle {
        self.mount.clone()
    }

    /// Run the single resolution pass for this mount.
    ///
    /// Backend failures count as "no session", so a guard never reveals content
    /// it could not verify. Calling this again after a terminal state is a no-op.
    pub async fn resolve(&mut self, scope: &mut SessionScope, policy: &PathPolicy) -> &GuardState {
        if self.state.is_terminal() {
            return &self.state;
        }

        let verdict = match scope.authorize(policy, &self.path).await {
            Ok(authorization) => authorization.verdict,
            Err(e) => {
                tracing::warn!(path = %self.path, error = %e, "Route guard could not resolve session");
                decide(policy, false, None, &self.path)
            }
        };

        if !self.mount.is_mounted() {
            tracing::debug!(path = %self.path, "Route guard resolved after unmount; result dropped");
            return &self.state;
        }

        self.state = GuardState::from(&verdict);
        &self.state
    }

    pub fn render<T>(&self, children: T) -> GuardView<T> {
        match self.state {
            GuardState::Loading => GuardView::LoadingIndicator,
            GuardState::Authorized => GuardView::Content(children),
            GuardState::Redirecting { .. } => GuardView::Blank,
        }
    }
}

impl From<&Verdict> for GuardState {
    fn from(verdict: &Verdict) -> Self {
        match verdict.location() {
            None => GuardState::Authorized,
            Some(location) => GuardState::Redirecting { location },
        }
    }
}
