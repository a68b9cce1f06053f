//! Networking for the portal auth API.
//!
//! SYSTEM CONTEXT
//! ==============
//! `client` is the single outbound gateway (bearer header, refresh-on-401),
//! and `types` defines the wire schema and response parsing.

pub mod client;
pub mod types;
