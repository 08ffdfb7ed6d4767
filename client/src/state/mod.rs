//! Client state containers.
//!
//! SYSTEM CONTEXT
//! ==============
//! State here is plain data: the session manager owns and mutates it, and
//! callers read snapshots.

pub mod auth;
