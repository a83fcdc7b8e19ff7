//! Application documents.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::null_as_default;

/// Where an application comes from. Also the body of a deploy request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallConfiguration {
    #[serde(default)]
    pub repository: String,
    #[serde(default)]
    pub branch: String,
    /// Path of the bootstrap TOML inside the repository.
    #[serde(default)]
    pub bootstrap: String,
}

impl InstallConfiguration {
    pub fn new(
        repository: impl Into<String>,
        branch: impl Into<String>,
        bootstrap: impl Into<String>,
    ) -> Self {
        Self {
            repository: repository.into(),
            branch: branch.into(),
            bootstrap: bootstrap.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    #[serde(default)]
    pub name: String,
}

/// Lifecycle flag recorded in an application's status log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFlag {
    Booting,
    Running,
    Failed,
    Crashed,
    Shutdown,
    #[serde(other)]
    Unknown,
}

impl StatusFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusFlag::Booting => "booting",
            StatusFlag::Running => "running",
            StatusFlag::Failed => "failed",
            StatusFlag::Crashed => "crashed",
            StatusFlag::Shutdown => "shutdown",
            StatusFlag::Unknown => "unknown",
        }
    }

    /// Whether the flag describes an application that stopped abnormally.
    pub fn is_failure(&self) -> bool {
        matches!(self, StatusFlag::Failed | StatusFlag::Crashed)
    }
}

impl fmt::Display for StatusFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppStatus {
    pub flag: StatusFlag,
    #[serde(default)]
    pub reason: String,
    pub at: DateTime<Utc>,
}

/// Summary of a managed application, as listed by `GET /application`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: String,
    #[serde(default)]
    pub install_configuration: Option<InstallConfiguration>,
    #[serde(default)]
    pub meta: Option<Meta>,
    /// Newest entry first.
    #[serde(default, rename = "status_log", deserialize_with = "null_as_default")]
    pub statuses: Vec<AppStatus>,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub maintenance_mode: bool,
    #[serde(default)]
    pub root_path: String,
}

impl Application {
    /// Most recent status entry, if any.
    pub fn latest_status(&self) -> Option<&AppStatus> {
        self.statuses.first()
    }

    /// Display name from the bootstrap meta block, falling back to the id.
    pub fn display_name(&self) -> &str {
        match &self.meta {
            Some(meta) if !meta.name.is_empty() => &meta.name,
            _ => &self.id,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provision {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub health_endpoint: String,
    #[serde(default)]
    pub event_url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub run: Vec<Vec<String>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub environment_variables: Vec<String>,
    #[serde(default)]
    pub base_directory: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proxy {
    #[serde(default, deserialize_with = "null_as_default")]
    pub host: Vec<String>,
    #[serde(default)]
    pub bind_port: String,
    #[serde(default)]
    pub static_dir: String,
    #[serde(default)]
    pub hold: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cloudflare {
    #[serde(default, deserialize_with = "null_as_default")]
    pub host: Vec<String>,
    #[serde(default)]
    pub zone: String,
    #[serde(default)]
    pub proxied: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessState {
    pub alive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Full application view served by `GET /application/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationDocument {
    pub application: Application,
    #[serde(default, deserialize_with = "null_as_default")]
    pub provisions: BTreeMap<String, Provision>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub proxies: BTreeMap<String, Proxy>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cfs: BTreeMap<String, Cloudflare>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub processes: BTreeMap<String, ProcessState>,
    #[serde(default)]
    pub last_commit: String,
}

impl ApplicationDocument {
    /// Provision ids with a live process.
    pub fn alive_processes(&self) -> Vec<&str> {
        self.processes
            .iter()
            .filter(|(_, state)| state.alive)
            .map(|(id, _)| id.as_str())
            .collect()
    }
}
