//! Credential pair persistence across two mutually exclusive scopes.
//!
//! SYSTEM CONTEXT
//! ==============
//! The HTTP wrapper reads the access token for every request and the auth
//! service writes pairs on login/refresh. Nothing else touches credentials.
//!
//! INVARIANTS
//! ==========
//! - A pair lives in exactly one scope, or nowhere.
//! - A scope holding only one of the two keys is corrupt: it is wiped on read.
//! - Every public operation holds the store lock, so callers never observe a
//!   pair half-written or present in both scopes.

#[cfg(test)]
#[path = "token_store_test.rs"]
mod tests;

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{KeyValueStorage, MemoryStorage, StorageError};

pub const ACCESS_TOKEN_KEY: &str = "token";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// An access token and the refresh token that can renew it.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self { access_token: access_token.into(), refresh_token: refresh_token.into() }
    }
}

// Tokens are bearer secrets; keep them out of logs and panic messages.
impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Where a credential pair is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageScope {
    /// Survives restarts ("remember me").
    Persistent,
    /// Cleared when the session ends.
    Ephemeral,
}

impl StorageScope {
    #[must_use]
    pub fn for_remember_me(remember_me: bool) -> Self {
        if remember_me { Self::Persistent } else { Self::Ephemeral }
    }

    #[must_use]
    pub fn other(self) -> Self {
        match self {
            Self::Persistent => Self::Ephemeral,
            Self::Ephemeral => Self::Persistent,
        }
    }
}

/// Dual-scope credential store.
pub struct TokenStore {
    persistent: Arc<dyn KeyValueStorage>,
    ephemeral: Arc<dyn KeyValueStorage>,
    lock: Mutex<()>,
}

impl TokenStore {
    pub fn new(persistent: Arc<dyn KeyValueStorage>, ephemeral: Arc<dyn KeyValueStorage>) -> Self {
        Self { persistent, ephemeral, lock: Mutex::new(()) }
    }

    /// Both scopes in memory. Used by tests and short-lived tools.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()), Arc::new(MemoryStorage::new()))
    }

    /// Write `pair` into `scope` and wipe the other scope.
    ///
    /// # Errors
    ///
    /// Returns the backend error if either key cannot be written. The target
    /// scope is wiped in that case so no partial pair is left behind.
    pub fn save(&self, pair: &CredentialPair, scope: StorageScope) -> Result<(), StorageError> {
        let _guard = self.guard();
        self.save_locked(pair, scope)
    }

    /// First complete pair, persistent scope first.
    #[must_use]
    pub fn read(&self) -> Option<CredentialPair> {
        self.read_with_scope().map(|(pair, _)| pair)
    }

    /// First complete pair along with the scope holding it.
    #[must_use]
    pub fn read_with_scope(&self) -> Option<(CredentialPair, StorageScope)> {
        let _guard = self.guard();
        self.read_locked()
    }

    #[must_use]
    pub fn active_scope(&self) -> Option<StorageScope> {
        self.read_with_scope().map(|(_, scope)| scope)
    }

    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.read().map(|pair| pair.access_token)
    }

    #[must_use]
    pub fn refresh_token(&self) -> Option<String> {
        self.read().map(|pair| pair.refresh_token)
    }

    /// Swap in a new access token, keeping the refresh token and its scope.
    ///
    /// Returns `false` when no pair is stored.
    ///
    /// # Errors
    ///
    /// Returns the backend error if the write fails.
    pub fn replace_access_token(&self, access_token: &str) -> Result<bool, StorageError> {
        let _guard = self.guard();
        let Some((pair, scope)) = self.read_locked() else {
            return Ok(false);
        };
        let renewed = CredentialPair { access_token: access_token.to_owned(), refresh_token: pair.refresh_token };
        self.save_locked(&renewed, scope)?;
        Ok(true)
    }

    /// Remove both tokens from both scopes.
    pub fn clear(&self) {
        let _guard = self.guard();
        self.clear_scope(StorageScope::Persistent);
        self.clear_scope(StorageScope::Ephemeral);
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn backend(&self, scope: StorageScope) -> &dyn KeyValueStorage {
        match scope {
            StorageScope::Persistent => self.persistent.as_ref(),
            StorageScope::Ephemeral => self.ephemeral.as_ref(),
        }
    }

    fn save_locked(&self, pair: &CredentialPair, scope: StorageScope) -> Result<(), StorageError> {
        self.clear_scope(scope.other());

        let target = self.backend(scope);
        let written = target
            .set(ACCESS_TOKEN_KEY, &pair.access_token)
            .and_then(|()| target.set(REFRESH_TOKEN_KEY, &pair.refresh_token));
        if let Err(e) = written {
            tracing::warn!(?scope, error = %e, "token save failed; wiping scope");
            self.clear_scope(scope);
            return Err(e);
        }
        Ok(())
    }

    fn read_locked(&self) -> Option<(CredentialPair, StorageScope)> {
        [StorageScope::Persistent, StorageScope::Ephemeral]
            .into_iter()
            .find_map(|scope| self.read_scope(scope).map(|pair| (pair, scope)))
    }

    fn read_scope(&self, scope: StorageScope) -> Option<CredentialPair> {
        let backend = self.backend(scope);
        let access = backend.get(ACCESS_TOKEN_KEY).filter(|t| !t.is_empty());
        let refresh = backend.get(REFRESH_TOKEN_KEY).filter(|t| !t.is_empty());
        match (access, refresh) {
            (Some(access_token), Some(refresh_token)) => Some(CredentialPair { access_token, refresh_token }),
            (None, None) => None,
            _ => {
                tracing::warn!(?scope, "incomplete credential pair in storage; clearing scope");
                self.clear_scope(scope);
                None
            }
        }
    }

    fn clear_scope(&self, scope: StorageScope) {
        let backend = self.backend(scope);
        backend.remove(ACCESS_TOKEN_KEY);
        backend.remove(REFRESH_TOKEN_KEY);
    }
}
