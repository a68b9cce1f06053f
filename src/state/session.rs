//! Process-wide session state and the actions that mutate it.
//!
//! SYSTEM CONTEXT
//! ==============
//! One `SessionContext` is built at startup and handed to every consumer.
//! Route guards and views read `SessionState` snapshots or subscribe to
//! changes; only the context's own actions write to it.
//!
//! DESIGN
//! ======
//! State lives in a `tokio::sync::watch` channel so observers always see a
//! whole snapshot, never a half-applied transition. Each action raises
//! `loading` through a guard that lowers it again on every exit path,
//! including when the action's future is dropped mid-flight.
//!
//! Boot runs once per context. Concurrent `initialize` callers wait on the
//! same run; later callers get the settled state without new requests.
//! A boot issues at most one refresh: its profile checks bypass the HTTP
//! client's own refresh-on-401.

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{OnceCell, watch};

use crate::error::AuthError;
use crate::net::types::{LoginOutcome, RegistrationRequest, SessionUser};
use crate::services::auth::AuthApi;

/// Snapshot of the current session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionState {
    pub user: Option<SessionUser>,
    pub is_authenticated: bool,
    pub is_admin: bool,
    /// True while an auth action is in flight.
    pub loading: bool,
    /// Message of the last failed action, for inline display.
    pub error: Option<String>,
    /// Set once the boot check has finished, whatever its outcome.
    pub auth_check_complete: bool,
}

impl SessionState {
    /// State before boot: loading, nothing decided yet.
    #[must_use]
    pub fn initial() -> Self {
        Self {
            user: None,
            is_authenticated: false,
            is_admin: false,
            loading: true,
            error: None,
            auth_check_complete: false,
        }
    }

    fn sign_in(&mut self, user: SessionUser, force_admin: bool) {
        self.is_admin = force_admin || user.is_admin();
        self.is_authenticated = true;
        self.user = Some(user);
    }

    fn sign_out(&mut self) {
        self.user = None;
        self.is_authenticated = false;
        self.is_admin = false;
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::initial()
    }
}

/// Lowers `loading` when dropped.
struct LoadingGuard<'a> {
    state: &'a watch::Sender<SessionState>,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.state
            .send_if_modified(|s| std::mem::replace(&mut s.loading, false));
    }
}

/// Owner of the session state.
pub struct SessionContext {
    auth: Arc<dyn AuthApi>,
    state: watch::Sender<SessionState>,
    boot: OnceCell<()>,
}

impl SessionContext {
    #[must_use]
    pub fn new(auth: Arc<dyn AuthApi>) -> Self {
        let (state, _) = watch::channel(SessionState::initial());
        Self { auth, state, boot: OnceCell::new() }
    }

    /// The auth operations backing this context, for flows that do not touch
    /// session state (forgot/reset password).
    #[must_use]
    pub fn auth(&self) -> &Arc<dyn AuthApi> {
        &self.auth
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    // =========================================================================
    // BOOT
    // =========================================================================

    /// Resolve the stored session, once per context.
    ///
    /// Never fails: an unusable stored session demotes to logged out silently.
    pub async fn initialize(&self) -> SessionState {
        self.boot.get_or_init(|| self.boot_sequence()).await;
        self.snapshot()
    }

    async fn boot_sequence(&self) {
        self.state.send_modify(|s| {
            s.loading = true;
            s.auth_check_complete = false;
        });
        let _loading = LoadingGuard { state: &self.state };

        let user = if self.auth.has_credentials() { self.resolve_stored_session().await } else { None };

        self.state.send_modify(|s| {
            match user {
                Some(user) => s.sign_in(user, false),
                None => s.sign_out(),
            }
            s.loading = false;
            s.auth_check_complete = true;
        });
    }

    async fn resolve_stored_session(&self) -> Option<SessionUser> {
        match self.auth.verify_profile().await {
            Ok(user) => return Some(user),
            Err(e) => tracing::debug!(error = %e, "stored session rejected; attempting refresh"),
        }

        if let Err(e) = self.auth.refresh().await {
            tracing::info!(error = %e, "stored session expired");
            self.auth.clear_credentials();
            return None;
        }

        match self.auth.verify_profile().await {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::info!(error = %e, "profile unavailable after refresh");
                self.auth.clear_credentials();
                None
            }
        }
    }

    // =========================================================================
    // ACTIONS
    // =========================================================================

    /// Member login.
    ///
    /// # Errors
    ///
    /// Returns the normalized auth error; it is also recorded in `error`.
    pub async fn login(&self, identifier: &str, password: &str, remember_me: bool) -> Result<SessionUser, AuthError> {
        let _loading = self.start_action();
        let outcome = self.auth.login(identifier, password, remember_me).await;
        let result = self.resolve_login(outcome).await;
        self.finish_login(result, false)
    }

    /// Admin login. A successful admin login always yields an admin session.
    ///
    /// # Errors
    ///
    /// Returns the normalized auth error; it is also recorded in `error`.
    pub async fn admin_login(&self, email: &str, password: &str, remember_me: bool) -> Result<SessionUser, AuthError> {
        let _loading = self.start_action();
        let outcome = self.auth.admin_login(email, password, remember_me).await;
        let result = self.resolve_login(outcome).await;
        self.finish_login(result, true)
    }

    /// Log out locally, whatever the server says.
    pub async fn logout(&self) {
        self.state.send_modify(|s| s.loading = true);
        let _loading = LoadingGuard { state: &self.state };

        self.auth.logout().await;
        self.state.send_modify(SessionState::sign_out);
    }

    /// Register a member without signing in.
    ///
    /// # Errors
    ///
    /// Returns the normalized auth error; it is also recorded in `error`.
    pub async fn register(&self, data: RegistrationRequest) -> Result<Value, AuthError> {
        let _loading = self.start_action();
        self.auth.register(data).await.inspect_err(|e| {
            let message = e.message().to_owned();
            self.state.send_modify(|s| s.error = Some(message));
        })
    }

    pub fn clear_error(&self) {
        self.state.send_if_modified(|s| s.error.take().is_some());
    }

    fn start_action(&self) -> LoadingGuard<'_> {
        self.state.send_modify(|s| {
            s.loading = true;
            s.error = None;
        });
        LoadingGuard { state: &self.state }
    }

    async fn resolve_login(&self, outcome: Result<LoginOutcome, AuthError>) -> Result<SessionUser, AuthError> {
        match outcome? {
            LoginOutcome::Authenticated { user, .. } => Ok(user),
            LoginOutcome::MissingUser { .. } => {
                tracing::debug!("login response had no user; fetching profile");
                self.auth.get_profile().await.inspect_err(|_| self.auth.clear_credentials())
            }
        }
    }

    fn finish_login(&self, result: Result<SessionUser, AuthError>, force_admin: bool) -> Result<SessionUser, AuthError> {
        self.state.send_modify(|s| {
            match &result {
                Ok(user) => s.sign_in(user.clone(), force_admin),
                Err(e) => {
                    s.sign_out();
                    s.error = Some(e.message().to_owned());
                }
            }
            s.loading = false;
        });
        result
    }
}
