//! Navigation seam between the session manager and whatever hosts it.
//!
//! The manager only ever asks "where am I" and "go there"; a browser shell
//! maps these onto its router, the CLI and tests use [`HistoryNavigator`].

#[cfg(test)]
#[path = "nav_test.rs"]
mod nav_test;

use std::sync::{Mutex, PoisonError};

pub trait Navigator: Send + Sync {
    fn current_path(&self) -> String;
    fn navigate(&self, path: &str);
}

/// In-memory navigation history.
pub struct HistoryNavigator {
    entries: Mutex<Vec<String>>,
}

impl HistoryNavigator {
    #[must_use]
    pub fn new(start: &str) -> Self {
        Self { entries: Mutex::new(vec![start.to_owned()]) }
    }

    /// Every path visited so far, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of navigations performed after the start path.
    #[must_use]
    pub fn navigation_count(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len().saturating_sub(1)
    }
}

impl Navigator for HistoryNavigator {
    fn current_path(&self) -> String {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
            .unwrap_or_else(|| "/".to_owned())
    }

    fn navigate(&self, path: &str) {
        tracing::debug!(path, "navigate");
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).push(path.to_owned());
    }
}
