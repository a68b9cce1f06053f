//! Wire DTOs for the portal auth API.
//!
//! DESIGN
//! ======
//! Every success body is wrapped in `{ "data": ... }`. Login responses are
//! parsed into `LoginOutcome` so the "tokens but no user" case is a variant
//! the session layer must handle, not an optional field it might forget.

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::AuthError;
use crate::storage::CredentialPair;

// =============================================================================
// USER
// =============================================================================

/// Portal role. Unrecognized role strings are kept as `Unknown` and never
/// grant admin access.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
    Superadmin,
    Unknown,
}

impl Role {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "user" => Self::User,
            "admin" => Self::Admin,
            "superadmin" => Self::Superadmin,
            _ => Self::Unknown,
        }
    }

    #[must_use]
    pub fn is_admin(self) -> bool {
        matches!(self, Self::Admin | Self::Superadmin)
    }
}

/// The signed-in user as returned by login and profile endpoints.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    /// User identifier; numeric ids are kept as their decimal string.
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default, deserialize_with = "deserialize_string_or_null")]
    pub first_name: String,
    #[serde(default, deserialize_with = "deserialize_string_or_null")]
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default, deserialize_with = "deserialize_role")]
    pub role: Role,
}

impl SessionUser {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    #[must_use]
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.email.clone().or_else(|| self.phone_number.clone()).unwrap_or_else(|| self.id.clone())
        } else {
            full.to_owned()
        }
    }
}

fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) if !s.is_empty() => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(D::Error::custom("expected non-empty string or number id")),
    }
}

fn deserialize_string_or_null<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn deserialize_role<'de, D>(deserializer: D) -> Result<Role, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map_or(Role::User, |raw| Role::parse(&raw)))
}

// =============================================================================
// REQUEST BODIES
// =============================================================================

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub identifier: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub struct AdminLoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest<'a> {
    pub refresh_token: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ResetPasswordRequest<'a> {
    pub password: &'a str,
}

/// Forgot-password payload, shaped by the kind of identifier supplied.
#[derive(Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ForgotPasswordRequest {
    Email {
        email: String,
    },
    Phone {
        #[serde(rename = "phoneNumber")]
        phone_number: String,
    },
}

impl ForgotPasswordRequest {
    /// Identifiers containing `@` are treated as email addresses.
    #[must_use]
    pub fn for_identifier(identifier: &str) -> Self {
        let identifier = identifier.trim().to_owned();
        if identifier.contains('@') {
            Self::Email { email: identifier }
        } else {
            Self::Phone { phone_number: identifier }
        }
    }
}

/// Member registration form.
///
/// `email` and `other_names` are optional on the wire: absent values are sent
/// as `null`, never as `""`.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    pub first_name: String,
    pub last_name: String,
    pub other_names: Option<String>,
    pub email: Option<String>,
    pub phone_number: String,
    pub password: String,
    /// Additional portal fields (membership number, employer, ...) passed through as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RegistrationRequest {
    /// Replace blank optional fields with `None`.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.other_names = blank_to_none(self.other_names);
        self.email = blank_to_none(self.email);
        self
    }
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// =============================================================================
// RESPONSE PARSING
// =============================================================================

/// Result of parsing a login response body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Tokens and the user object were both present.
    Authenticated { tokens: CredentialPair, user: SessionUser },
    /// Tokens were present but the user must be fetched from the profile endpoint.
    MissingUser { tokens: CredentialPair },
}

impl LoginOutcome {
    /// Parse `{ data: { token, refreshToken, user? } }`.
    ///
    /// # Errors
    ///
    /// Returns a client error if either token is missing or not a string.
    pub fn parse(body: &Value) -> Result<Self, AuthError> {
        let data = body
            .get("data")
            .ok_or_else(|| AuthError::client("unexpected login response: missing data"))?;
        let access_token = non_empty_str(data, "token")
            .ok_or_else(|| AuthError::client("unexpected login response: missing token"))?;
        let refresh_token = non_empty_str(data, "refreshToken")
            .ok_or_else(|| AuthError::client("unexpected login response: missing refresh token"))?;
        let tokens = CredentialPair::new(access_token, refresh_token);

        match data.get("user").filter(|u| !u.is_null()) {
            None => Ok(Self::MissingUser { tokens }),
            Some(raw) => match SessionUser::deserialize(raw) {
                Ok(user) => Ok(Self::Authenticated { tokens, user }),
                Err(e) => {
                    tracing::debug!(error = %e, "login response user unreadable; will fetch profile");
                    Ok(Self::MissingUser { tokens })
                }
            },
        }
    }

    #[must_use]
    pub fn tokens(&self) -> &CredentialPair {
        match self {
            Self::Authenticated { tokens, .. } | Self::MissingUser { tokens } => tokens,
        }
    }
}

/// Parse `{ data: { token } }` from the refresh endpoint.
///
/// # Errors
///
/// Returns a client error if the new access token is missing.
pub fn parse_refreshed_token(body: &Value) -> Result<String, AuthError> {
    body.get("data")
        .and_then(|data| non_empty_str(data, "token"))
        .map(str::to_owned)
        .ok_or_else(|| AuthError::client("unexpected refresh response: missing token"))
}

/// Parse the profile body, accepting both `{ data: user }` and `{ data: { user } }`.
///
/// # Errors
///
/// Returns a client error if no user object can be read.
pub fn parse_profile(body: &Value) -> Result<SessionUser, AuthError> {
    let data = body
        .get("data")
        .ok_or_else(|| AuthError::client("unexpected profile response: missing data"))?;
    let raw = data.get("user").filter(|u| u.is_object()).unwrap_or(data);
    SessionUser::deserialize(raw).map_err(|e| AuthError::client(format!("unexpected profile response: {e}")))
}

fn non_empty_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}
