//! Domain services used by the session context and the CLI.
//!
//! ARCHITECTURE
//! ============
//! Service modules own the credential lifecycle so the session layer stays
//! focused on state transitions.

pub mod auth;
