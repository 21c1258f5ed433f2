//! Navigation side effect
//!
//! When a session cannot be recovered the client sends the user back to the
//! unauthenticated entry point. What "navigate" means is up to the host: a
//! browser router, a terminal prompt, or a recording fake in tests.

use std::sync::{Mutex, PoisonError};
use tracing::info;

/// Route the user lands on after an irrecoverable authentication failure
pub const LOGIN_ROUTE: &str = "/login";

/// Route authenticated users land on
pub const HOME_ROUTE: &str = "/dashboard";

/// Receives navigation requests from the client
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: &str);
}

/// Navigator that only logs the request
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn navigate(&self, route: &str) {
        info!(route, "Navigation requested");
    }
}

/// Navigator that remembers every route it was sent to
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    routes: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes in the order they were requested
    pub fn routes(&self) -> Vec<String> {
        self.routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Most recent route
    pub fn last(&self) -> Option<String> {
        self.routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: &str) {
        self.routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(route.to_string());
    }
}
