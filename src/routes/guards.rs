//! Route guards over session state.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every navigation runs through one of these before a view renders. They
//! read a `SessionState` snapshot and nothing else.
//!
//! ORDERING
//! ========
//! Boot completion is checked first, authentication second, role last.
//! Deciding before boot completes would bounce a signed-in user to the login
//! page while their stored session is still being verified.

#[cfg(test)]
#[path = "guards_test.rs"]
mod tests;

use super::{
    ADMIN_DASHBOARD_PATH, ADMIN_LOGIN_PATH, FORGOT_PASSWORD_PATH, HOME_PATH, LOGIN_PATH, MEMBER_DASHBOARD_PATH,
    REGISTER_PATH, RESET_PASSWORD_PATH,
};
use crate::state::session::SessionState;

/// A requested location: path plus optional query string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Location {
    pub path: String,
    pub query: Option<String>,
}

impl Location {
    /// Split `"/claims?page=2"` into path and query.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let (path, query) = match raw.split_once('?') {
            Some((path, query)) => (path, Some(query.to_owned()).filter(|q| !q.is_empty())),
            None => (raw, None),
        };
        let path = if path.is_empty() { HOME_PATH.to_owned() } else { path.to_owned() };
        Self { path, query }
    }

    #[must_use]
    pub fn href(&self) -> String {
        match &self.query {
            Some(query) => format!("{}?{query}", self.path),
            None => self.path.clone(),
        }
    }
}

/// What the router should do with a navigation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardDecision {
    /// Boot has not finished; show a placeholder.
    Pending,
    Render,
    /// Navigate to `to`; `from` is the location to return to after login.
    Redirect { to: String, from: Option<Location> },
}

impl GuardDecision {
    fn redirect(to: &str, from: Option<&Location>) -> Self {
        Self::Redirect { to: to.to_owned(), from: from.cloned() }
    }
}

#[must_use]
pub fn role_dashboard(is_admin: bool) -> &'static str {
    if is_admin { ADMIN_DASHBOARD_PATH } else { MEMBER_DASHBOARD_PATH }
}

/// Login, registration and password pages.
#[must_use]
pub fn is_public_auth_path(path: &str) -> bool {
    let path = normalize(path);
    [LOGIN_PATH, REGISTER_PATH, FORGOT_PASSWORD_PATH, ADMIN_LOGIN_PATH].contains(&path)
        || path == RESET_PASSWORD_PATH
        || path.starts_with(&format!("{RESET_PASSWORD_PATH}/"))
}

fn normalize(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() { HOME_PATH } else { trimmed }
}

/// Member-area guard. With `admin_only`, signed-in non-admins go to the member
/// dashboard rather than the login page.
#[must_use]
pub fn protected(state: &SessionState, location: &Location, admin_only: bool) -> GuardDecision {
    if !state.auth_check_complete {
        return GuardDecision::Pending;
    }
    if !state.is_authenticated {
        return GuardDecision::redirect(LOGIN_PATH, Some(location));
    }
    if admin_only && !state.is_admin {
        return GuardDecision::redirect(MEMBER_DASHBOARD_PATH, None);
    }
    GuardDecision::Render
}

/// Admin-area guard; unauthenticated visitors go to the admin login page.
#[must_use]
pub fn admin(state: &SessionState, location: &Location) -> GuardDecision {
    if !state.auth_check_complete {
        return GuardDecision::Pending;
    }
    if !state.is_authenticated {
        return GuardDecision::redirect(ADMIN_LOGIN_PATH, Some(location));
    }
    if !state.is_admin {
        return GuardDecision::redirect(MEMBER_DASHBOARD_PATH, None);
    }
    GuardDecision::Render
}

/// Guard for public auth pages: signed-in users are sent to their dashboard.
/// Pages outside the auth set, the home page included, always render.
#[must_use]
pub fn auth_redirect(state: &SessionState, location: &Location) -> GuardDecision {
    if !is_public_auth_path(&location.path) {
        return GuardDecision::Render;
    }
    if !state.auth_check_complete {
        return GuardDecision::Pending;
    }
    if state.is_authenticated {
        return GuardDecision::redirect(role_dashboard(state.is_admin), None);
    }
    GuardDecision::Render
}

/// Where to land after a successful login.
///
/// Returns the captured location unless it is itself an auth page or an admin
/// page the user cannot open; otherwise the role dashboard.
#[must_use]
pub fn post_login_target(captured: Option<&Location>, is_admin: bool) -> String {
    let usable = captured.filter(|loc| {
        let path = normalize(&loc.path);
        !is_public_auth_path(path) && path != HOME_PATH && (is_admin || !is_admin_path(path))
    });
    usable.map_or_else(|| role_dashboard(is_admin).to_owned(), Location::href)
}

fn is_admin_path(path: &str) -> bool {
    path == "/admin" || path.starts_with("/admin/")
}
