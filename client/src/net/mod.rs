//! Networking modules for the auth backend.
//!
//! SYSTEM CONTEXT
//! ==============
//! `api` handles REST calls and token attachment, and `types` defines the
//! shared wire schema.

pub mod api;
pub mod types;
