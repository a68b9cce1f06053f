//! Authentication and session core for the member and admin portals.
//!
//! ARCHITECTURE
//! ============
//! Leaf to root: `storage` keeps the token pair in one of two scopes,
//! `net::client` sends every request and renews expired access tokens,
//! `services::auth` implements the credential lifecycle, `state::session`
//! owns the reactive session state, and `routes::guards` turns that state
//! into navigation decisions.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use portal_auth::config::PortalConfig;
//! use portal_auth::services::auth::AuthService;
//! use portal_auth::state::session::SessionContext;
//! use portal_auth::storage::TokenStore;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PortalConfig::from_env()?;
//! let auth = AuthService::from_config(&config, Arc::new(TokenStore::in_memory()))?;
//! let session = SessionContext::new(Arc::new(auth));
//! let state = session.initialize().await;
//! assert!(state.auth_check_complete);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod net;
pub mod routes;
pub mod services;
pub mod state;
pub mod storage;

pub use config::PortalConfig;
pub use error::AuthError;
pub use services::auth::{AuthApi, AuthService};
pub use state::session::{SessionContext, SessionState};
pub use storage::{CredentialPair, StorageScope, TokenStore};
