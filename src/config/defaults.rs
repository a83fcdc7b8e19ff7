//! Built-in dashboard defaults (layer 1)
//!
//! Typed form of the merged configuration, with the hardcoded defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::host::HttpConfig;

/// Dashboard configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashConfig {
    /// Base URL of the kerfuffle API (default: http://localhost:8080)
    pub base_url: String,

    /// Connection timeout in seconds (default: 10)
    pub connect_timeout_seconds: u64,

    /// Per-request timeout in seconds (default: 30)
    pub request_timeout_seconds: u64,

    /// Delay between log fetches in milliseconds (default: 1000)
    pub log_poll_interval_ms: u64,

    /// Delay between status refreshes in milliseconds (default: 5000)
    pub status_poll_interval_ms: u64,
}

impl Default for DashConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            connect_timeout_seconds: 10,
            request_timeout_seconds: 30,
            log_poll_interval_ms: 1000,
            status_poll_interval_ms: 5000,
        }
    }
}

impl DashConfig {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "base_url": self.base_url,
            "connect_timeout_seconds": self.connect_timeout_seconds,
            "request_timeout_seconds": self.request_timeout_seconds,
            "log_poll_interval_ms": self.log_poll_interval_ms,
            "status_poll_interval_ms": self.status_poll_interval_ms,
        })
    }

    pub fn http_config(&self) -> HttpConfig {
        HttpConfig {
            connect_timeout: Duration::from_secs(self.connect_timeout_seconds),
            request_timeout: Duration::from_secs(self.request_timeout_seconds),
        }
    }

    pub fn log_poll_interval(&self) -> Duration {
        Duration::from_millis(self.log_poll_interval_ms)
    }

    pub fn status_poll_interval(&self) -> Duration {
        Duration::from_millis(self.status_poll_interval_ms)
    }
}
