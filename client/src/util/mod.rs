//! Utility helpers shared across client modules.
//!
//! SYSTEM CONTEXT
//! ==============
//! Utility modules isolate routing rules from the session manager so they
//! stay pure and testable.

pub mod auth;
