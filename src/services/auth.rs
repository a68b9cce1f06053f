//! Credential lifecycle operations against the portal auth API.
//!
//! SYSTEM CONTEXT
//! ==============
//! The session context drives these operations through the `AuthApi` trait.
//! `AuthService` is the only writer of the token store besides the HTTP
//! wrapper's own refresh path.
//!
//! ERROR HANDLING
//! ==============
//! Every failure leaves here as an `AuthError`. Nothing is swallowed except
//! the server half of logout, which is best-effort by contract.

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::config::PortalConfig;
use crate::error::AuthError;
use crate::net::client::{
    ADMIN_LOGIN_PATH, ApiClient, ApiRequest, ApiResponse, FORGOT_PASSWORD_PATH, LOGIN_PATH, LOGOUT_PATH,
    PROFILE_PATH, REGISTER_PATH, RESET_PASSWORD_PATH,
};
use crate::net::types::{
    AdminLoginRequest, ForgotPasswordRequest, LoginOutcome, LoginRequest, RefreshTokenRequest, RegistrationRequest,
    ResetPasswordRequest, SessionUser, parse_profile,
};
use crate::storage::{StorageScope, TokenStore};

/// Auth operations the session context depends on.
///
/// Implemented by [`AuthService`]; tests substitute an in-memory mock.
#[async_trait::async_trait]
pub trait AuthApi: Send + Sync {
    /// Register a member. Not an implicit login.
    async fn register(&self, data: RegistrationRequest) -> Result<Value, AuthError>;

    /// Member login; stores the token pair in the scope picked by `remember_me`.
    async fn login(&self, identifier: &str, password: &str, remember_me: bool) -> Result<LoginOutcome, AuthError>;

    /// Admin login through the admin endpoint; same storage rules as `login`.
    async fn admin_login(&self, email: &str, password: &str, remember_me: bool) -> Result<LoginOutcome, AuthError>;

    /// Best-effort server logout followed by an unconditional local wipe.
    async fn logout(&self);

    /// Renew the access token; wipes credentials on failure.
    async fn refresh(&self) -> Result<String, AuthError>;

    async fn get_profile(&self) -> Result<SessionUser, AuthError>;

    /// Fetch the profile with the stored access token as-is.
    ///
    /// Used by boot, which drives its own single refresh. Implementations
    /// backed by the refreshing client must skip that client's retry.
    async fn verify_profile(&self) -> Result<SessionUser, AuthError> {
        self.get_profile().await
    }

    async fn forgot_password(&self, identifier: &str) -> Result<Value, AuthError>;

    async fn reset_password(&self, token: &str, new_password: &str) -> Result<Value, AuthError>;

    /// Whether a complete credential pair is stored.
    fn has_credentials(&self) -> bool;

    fn clear_credentials(&self);
}

/// [`AuthApi`] over HTTP.
#[derive(Clone)]
pub struct AuthService {
    client: ApiClient,
}

impl AuthService {
    #[must_use]
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Build the HTTP client and service in one step.
    ///
    /// # Errors
    ///
    /// Returns a client error if the HTTP client cannot be constructed.
    pub fn from_config(config: &PortalConfig, tokens: Arc<TokenStore>) -> Result<Self, AuthError> {
        let client = ApiClient::new(config, tokens).map_err(|e| AuthError::client(e.to_string()))?;
        Ok(Self::new(client))
    }

    #[must_use]
    pub fn tokens(&self) -> &Arc<TokenStore> {
        self.client.tokens()
    }

    async fn post(&self, path: &str, body: &impl Serialize) -> Result<ApiResponse, AuthError> {
        let body = serde_json::to_value(body).map_err(|e| AuthError::client(e.to_string()))?;
        Ok(self.client.send(&ApiRequest::post(path, body)).await?)
    }

    async fn login_at(&self, path: &str, body: &impl Serialize, remember_me: bool) -> Result<LoginOutcome, AuthError> {
        let resp = self.post(path, body).await?;
        let outcome = LoginOutcome::parse(&resp.body)?;
        let scope = StorageScope::for_remember_me(remember_me);
        self.tokens().save(outcome.tokens(), scope)?;
        tracing::info!(path, ?scope, user_inline = matches!(outcome, LoginOutcome::Authenticated { .. }), "login succeeded");
        Ok(outcome)
    }
}

#[async_trait::async_trait]
impl AuthApi for AuthService {
    async fn register(&self, data: RegistrationRequest) -> Result<Value, AuthError> {
        let resp = self.post(REGISTER_PATH, &data.normalized()).await?;
        Ok(resp.body)
    }

    async fn login(&self, identifier: &str, password: &str, remember_me: bool) -> Result<LoginOutcome, AuthError> {
        self.login_at(LOGIN_PATH, &LoginRequest { identifier, password }, remember_me)
            .await
    }

    async fn admin_login(&self, email: &str, password: &str, remember_me: bool) -> Result<LoginOutcome, AuthError> {
        self.login_at(ADMIN_LOGIN_PATH, &AdminLoginRequest { email, password }, remember_me)
            .await
    }

    async fn logout(&self) {
        if let Some(refresh_token) = self.tokens().refresh_token() {
            let body = RefreshTokenRequest { refresh_token: &refresh_token };
            if let Err(e) = self.post(LOGOUT_PATH, &body).await {
                tracing::warn!(error = %e, "logout request failed; clearing local session anyway");
            }
        }
        self.tokens().clear();
    }

    async fn refresh(&self) -> Result<String, AuthError> {
        let Some(refresh_token) = self.tokens().refresh_token() else {
            self.tokens().clear();
            return Err(AuthError::client("No refresh token available"));
        };
        Ok(self.client.refresh_access_token(&refresh_token).await?)
    }

    async fn get_profile(&self) -> Result<SessionUser, AuthError> {
        let resp = self.client.send(&ApiRequest::get(PROFILE_PATH)).await?;
        parse_profile(&resp.body)
    }

    async fn verify_profile(&self) -> Result<SessionUser, AuthError> {
        let resp = self.client.send_once(&ApiRequest::get(PROFILE_PATH)).await?;
        parse_profile(&resp.body)
    }

    async fn forgot_password(&self, identifier: &str) -> Result<Value, AuthError> {
        let resp = self
            .post(FORGOT_PASSWORD_PATH, &ForgotPasswordRequest::for_identifier(identifier))
            .await?;
        Ok(resp.body)
    }

    async fn reset_password(&self, token: &str, new_password: &str) -> Result<Value, AuthError> {
        let path = format!("{RESET_PASSWORD_PATH}/{}", urlencoding::encode(token));
        let resp = self.post(&path, &ResetPasswordRequest { password: new_password }).await?;
        Ok(resp.body)
    }

    fn has_credentials(&self) -> bool {
        self.tokens().read().is_some()
    }

    fn clear_credentials(&self) {
        self.tokens().clear();
    }
}
