//! Outbound request gateway for the portal API.
//!
//! ARCHITECTURE
//! ============
//! Every API call goes through `ApiClient::send`. The client attaches the
//! stored access token as a bearer header and, when a protected endpoint
//! answers 401, renews the access token once and replays the request.
//!
//! Requests are described by an owned `ApiRequest` so a replay rebuilds the
//! HTTP request from scratch. The retry count travels as a plain argument;
//! nothing on the request itself records that a retry happened.
//!
//! INVARIANTS
//! ==========
//! - Login, admin login, registration and the refresh endpoint never trigger a
//!   refresh: a 401 there is a real credential failure.
//! - At most one refresh per `send` call, regardless of the replay's outcome.
//! - A failed refresh wipes the token store and surfaces the refresh error.

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;

use std::sync::Arc;

use reqwest::Method;
use serde_json::Value;

use super::types::{RefreshTokenRequest, parse_refreshed_token};
use crate::config::PortalConfig;
use crate::error::RequestError;
use crate::storage::TokenStore;

pub const LOGIN_PATH: &str = "/auth/login";
pub const ADMIN_LOGIN_PATH: &str = "/auth/admin-login";
pub const REGISTER_PATH: &str = "/auth/register";
pub const REFRESH_PATH: &str = "/auth/refresh-token";
pub const LOGOUT_PATH: &str = "/auth/logout";
pub const PROFILE_PATH: &str = "/auth/profile";
pub const FORGOT_PASSWORD_PATH: &str = "/auth/forgot-password";
pub const RESET_PASSWORD_PATH: &str = "/auth/reset-password";

/// Endpoints whose 401 responses are returned as-is.
pub const REFRESH_EXEMPT_PATHS: [&str; 4] = [LOGIN_PATH, ADMIN_LOGIN_PATH, REGISTER_PATH, REFRESH_PATH];

const MAX_AUTH_RETRIES: u8 = 1;

/// A replayable API request. `path` is relative to the configured base URL.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self { method: Method::GET, path: path.into(), body: None }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self { method: Method::POST, path: path.into(), body: Some(body) }
    }

    /// Whether a 401 from this request may trigger a token refresh.
    #[must_use]
    pub fn allows_refresh(&self) -> bool {
        !is_refresh_exempt(&self.path)
    }
}

/// A successful (2xx) response.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// Parsed JSON body; `Value::Null` for empty bodies.
    pub body: Value,
}

/// Whether a failed request on its `retry`-th replay should refresh and replay.
#[must_use]
pub fn should_refresh(err: &RequestError, request: &ApiRequest, retry: u8) -> bool {
    err.is_unauthorized() && retry < MAX_AUTH_RETRIES && request.allows_refresh()
}

#[must_use]
pub fn is_refresh_exempt(path: &str) -> bool {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let path = path.trim_end_matches('/');
    REFRESH_EXEMPT_PATHS.contains(&path)
}

// =============================================================================
// CLIENT
// =============================================================================

/// HTTP client bound to one token store.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    config: Arc<PortalConfig>,
    tokens: Arc<TokenStore>,
}

impl ApiClient {
    /// Build a client with the configured request and connect timeouts.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(config: &PortalConfig, tokens: Arc<TokenStore>) -> Result<Self, RequestError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeouts.request())
            .connect_timeout(config.timeouts.connect())
            .build()?;
        Ok(Self { http, config: Arc::new(config.clone()), tokens })
    }

    #[must_use]
    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    #[must_use]
    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    /// Send a request, refreshing the access token once on 401.
    ///
    /// # Errors
    ///
    /// Returns `RequestError::Status` for non-2xx responses, the refresh error
    /// if a refresh was attempted and failed, or a transport error.
    pub async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, RequestError> {
        self.send_from(request, 0).await
    }

    /// Send a request without the refresh-on-401 step.
    ///
    /// For callers that run their own refresh sequence.
    ///
    /// # Errors
    ///
    /// Returns `RequestError::Status` for non-2xx responses or a transport error.
    pub async fn send_once(&self, request: &ApiRequest) -> Result<ApiResponse, RequestError> {
        self.send_from(request, MAX_AUTH_RETRIES).await
    }

    async fn send_from(&self, request: &ApiRequest, mut retry: u8) -> Result<ApiResponse, RequestError> {
        loop {
            let access_token = self.tokens.access_token();
            let err = match self.dispatch(request, access_token.as_deref()).await {
                Ok(resp) => return Ok(resp),
                Err(err) => err,
            };

            if !should_refresh(&err, request, retry) {
                return Err(err);
            }
            let Some(refresh_token) = self.tokens.refresh_token() else {
                return Err(err);
            };

            tracing::debug!(path = %request.path, "access token rejected; refreshing");
            self.refresh_access_token(&refresh_token).await?;
            retry += 1;
        }
    }

    /// Exchange `refresh_token` for a new access token and store it in the
    /// scope holding the refresh token. Any failure wipes the token store.
    pub(crate) async fn refresh_access_token(&self, refresh_token: &str) -> Result<String, RequestError> {
        match self.request_new_access_token(refresh_token).await {
            Ok(token) => {
                tracing::info!("access token refreshed");
                Ok(token)
            }
            Err(e) => {
                tracing::warn!(error = %e, "token refresh failed; clearing credentials");
                self.tokens.clear();
                Err(e)
            }
        }
    }

    async fn request_new_access_token(&self, refresh_token: &str) -> Result<String, RequestError> {
        let body = serde_json::to_value(RefreshTokenRequest { refresh_token })
            .map_err(|e| RequestError::Decode(e.to_string()))?;
        let resp = self.dispatch(&ApiRequest::post(REFRESH_PATH, body), None).await?;
        let token = parse_refreshed_token(&resp.body).map_err(|e| RequestError::Decode(e.to_string()))?;
        if !self.tokens.replace_access_token(&token)? {
            return Err(RequestError::Decode("credentials were cleared during refresh".to_owned()));
        }
        Ok(token)
    }

    async fn dispatch(&self, request: &ApiRequest, access_token: Option<&str>) -> Result<ApiResponse, RequestError> {
        let url = self.config.endpoint(&request.path);
        let mut builder = self.http.request(request.method.clone(), url);
        if let Some(token) = access_token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let resp = builder.send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            let body = parse_body(&text).unwrap_or(Value::String(text));
            tracing::debug!(path = %request.path, status = status.as_u16(), "api request failed");
            return Err(RequestError::Status { status: status.as_u16(), body });
        }
        let body = parse_body(&text).map_err(|e| RequestError::Decode(e.to_string()))?;
        Ok(ApiResponse { status: status.as_u16(), body })
    }
}

fn parse_body(text: &str) -> Result<Value, serde_json::Error> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(text)
}
