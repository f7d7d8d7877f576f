use askama::Template;
use axum::{
    extract::State,
    http::Uri,
    response::{IntoResponse, Redirect, Response},
};

use crate::authz::decide;
use crate::models::{AuthUser, Role};
use crate::AppState;

/// One link on a role dashboard.
pub struct Section {
    pub label: &'static str,
    pub href: &'static str,
}

const fn section(label: &'static str, href: &'static str) -> Section {
    Section { label, href }
}

fn sections(area: Role) -> &'static [Section] {
    const PATIENT: &[Section] = &[
        section("My appointments", "/patient/appointments"),
        section("Medical records", "/patient/records"),
        section("Profile", "/patient/profile"),
    ];
    const DOCTOR: &[Section] = &[
        section("Today's schedule", "/doctor/schedule"),
        section("Patients", "/doctor/patients"),
        section("Appointments", "/doctor/appointments"),
    ];
    const STAFF: &[Section] = &[
        section("Appointments", "/staff/appointments"),
        section("Check-in", "/staff/check-in"),
        section("Patients", "/staff/patients"),
    ];
    const ADMIN: &[Section] = &[
        section("Users", "/admin/users"),
        section("Appointments", "/admin/appointments"),
        section("Activity log", "/admin/activity"),
        section("Doctor area", "/doctor"),
        section("Staff area", "/staff"),
        section("Patient area", "/patient"),
    ];

    match area {
        Role::Patient => PATIENT,
        Role::Doctor => DOCTOR,
        Role::Staff => STAFF,
        Role::Admin => ADMIN,
    }
}

/// The role area a dashboard path belongs to (`/doctor/patients` -> doctor).
pub fn area_for(path: &str) -> Option<Role> {
    path.trim_start_matches('/')
        .split('/')
        .next()
        .and_then(|segment| segment.parse().ok())
}

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub title: &'static str,
    pub path: String,
    pub user_name: String,
    pub sections: &'static [Section],
}

/// Page shell for every role area.
///
/// The shell renders in its loading state; `static/guard.js` mounts the route
/// guard and reveals the content only once `/api/guard` confirms access.
/// Paths the gate skips (image names) still land here, so the handler makes
/// the same decision itself before rendering anything.
pub async fn dashboard_handler(
    State(state): State<AppState>,
    uri: Uri,
    user: AuthUser,
) -> Response {
    let path = uri.path().to_string();
    if let Some(location) = decide(&state.policy, true, user.role, &path).location() {
        return Redirect::to(&location).into_response();
    }

    let area = area_for(&path).unwrap_or(Role::LOWEST_PRIVILEGE);
    DashboardTemplate {
        title: area.title(),
        user_name: user.identity.display_name(),
        sections: sections(area),
        path,
    }
    .into_response()
}
