//! Failure Injection for the Mock Server
//!
//! Supports configurable failure injection for testing error paths.

use std::collections::HashMap;
use std::time::Duration;

/// Routes of the mock API, used as injection keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    ListApplications,
    GetApplication,
    Deploy,
    Action,
    Delete,
    Processes,
    Provisions,
    ProvisionReload,
    Output,
}

/// How an injected failure manifests
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureMode {
    /// Respond with `status` and an `{error}` payload
    Status { status: u16, message: String },
    /// Fail before any response, like a refused connection
    Unreachable,
    /// Respond 200 with this raw body
    RawBody(String),
}

/// Failure configuration for a route
#[derive(Debug, Clone)]
pub struct FailureConfig {
    /// What to return (None = respond normally, e.g. delay only)
    pub mode: Option<FailureMode>,
    /// Delay to add before responding
    pub delay: Option<Duration>,
    /// Number of times to fail before succeeding (None = always fail)
    pub fail_count: Option<u32>,
}

impl FailureConfig {
    /// Create a config that returns an error status
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self {
            mode: Some(FailureMode::Status {
                status,
                message: message.into(),
            }),
            delay: None,
            fail_count: None,
        }
    }

    /// Create a config that drops the request without a response
    pub fn unreachable() -> Self {
        Self {
            mode: Some(FailureMode::Unreachable),
            delay: None,
            fail_count: None,
        }
    }

    /// Create a config that answers 200 with a fixed raw body
    pub fn raw_body(body: impl Into<String>) -> Self {
        Self {
            mode: Some(FailureMode::RawBody(body.into())),
            delay: None,
            fail_count: None,
        }
    }

    /// Create a config that just adds delay
    pub fn delay(duration: Duration) -> Self {
        Self {
            mode: None,
            delay: Some(duration),
            fail_count: None,
        }
    }

    /// Set the number of times to fail before succeeding
    pub fn with_fail_count(mut self, count: u32) -> Self {
        self.fail_count = Some(count);
        self
    }
}

/// Failure injector for the mock server
#[derive(Debug, Default)]
pub struct FailureInjector {
    configs: HashMap<Route, FailureConfig>,
    /// Call counts per route (for fail_count tracking)
    call_counts: HashMap<Route, u32>,
}

impl FailureInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject a failure for a route, replacing any previous one
    pub fn inject(&mut self, route: Route, config: FailureConfig) {
        self.configs.insert(route, config);
        self.call_counts.insert(route, 0);
    }

    pub fn clear(&mut self) {
        self.configs.clear();
        self.call_counts.clear();
    }

    pub fn clear_route(&mut self, route: Route) {
        self.configs.remove(&route);
        self.call_counts.remove(&route);
    }

    /// Check whether a call to `route` should fail.
    /// Returns the failure config if one applies, None otherwise
    pub fn check(&mut self, route: Route) -> Option<FailureConfig> {
        let config = self.configs.get(&route)?;
        let count = self.call_counts.entry(route).or_insert(0);
        *count += 1;

        match config.fail_count {
            Some(limit) if *count > limit => None,
            _ => Some(config.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fail_count_exhausts() {
        let mut injector = FailureInjector::new();
        injector.inject(
            Route::Output,
            FailureConfig::status(503, "busy").with_fail_count(2),
        );

        assert!(injector.check(Route::Output).is_some());
        assert!(injector.check(Route::Output).is_some());
        assert!(injector.check(Route::Output).is_none());
        assert!(injector.check(Route::GetApplication).is_none());
    }

    #[test]
    fn test_unlimited_failure_and_clear() {
        let mut injector = FailureInjector::new();
        injector.inject(Route::Deploy, FailureConfig::unreachable());
        for _ in 0..5 {
            assert_eq!(
                injector.check(Route::Deploy).unwrap().mode,
                Some(FailureMode::Unreachable)
            );
        }
        injector.clear_route(Route::Deploy);
        assert!(injector.check(Route::Deploy).is_none());
    }
}
