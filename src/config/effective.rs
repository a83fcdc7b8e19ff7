//! Effective configuration with provenance
//!
//! Merges built-in defaults, the host file, the environment and CLI flags,
//! recording which sources contributed.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use tracing::debug;

use super::defaults::DashConfig;
use super::merge::merge_layers;

/// Environment variable overriding the API base URL
pub const URL_ENV_VAR: &str = "KERFUFFLE_URL";

/// Host config location relative to the user's config directory
pub const HOST_CONFIG_RELATIVE: &str = "kerfuffle/dash.toml";

/// Origin of a configuration source
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    Host,
    Env,
    Cli,
}

/// A contributing config source with provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSource {
    pub origin: ConfigOrigin,

    /// File path (host layer only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 of the raw file bytes (host layer only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

impl ConfigSource {
    fn inline(origin: ConfigOrigin) -> Self {
        Self {
            origin,
            path: None,
            digest: None,
        }
    }
}

/// Command-line overrides; unset fields leave lower layers alone
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub base_url: Option<String>,
    pub connect_timeout_seconds: Option<u64>,
    pub request_timeout_seconds: Option<u64>,
}

impl CliOverrides {
    /// JSON layer holding only the fields that were set
    pub fn to_value(&self) -> Option<Value> {
        let mut map = Map::new();
        if let Some(url) = &self.base_url {
            map.insert("base_url".into(), json!(url));
        }
        if let Some(secs) = self.connect_timeout_seconds {
            map.insert("connect_timeout_seconds".into(), json!(secs));
        }
        if let Some(secs) = self.request_timeout_seconds {
            map.insert("request_timeout_seconds".into(), json!(secs));
        }
        (!map.is_empty()).then_some(Value::Object(map))
    }
}

/// Effective configuration with provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    /// When this config was computed
    pub created_at: DateTime<Utc>,

    pub config: DashConfig,

    /// Contributing sources in precedence order
    pub sources: Vec<ConfigSource>,
}

impl EffectiveConfig {
    /// Build the effective config from the process environment and the
    /// default host file (or `host_path` when given).
    pub fn load(host_path: Option<&Path>, cli: &CliOverrides) -> Result<Self, ConfigError> {
        let default_path = default_host_config_path();
        let host_path = host_path.or(default_path.as_deref());
        let env_url = std::env::var(URL_ENV_VAR).ok();
        Self::build(host_path, env_url.as_deref(), cli.to_value())
    }

    /// Build the effective config from explicit layers.
    ///
    /// A host path that does not exist is skipped; one that exists but
    /// cannot be read or parsed is an error.
    pub fn build(
        host_config_path: Option<&Path>,
        env_url: Option<&str>,
        cli_overrides: Option<Value>,
    ) -> Result<Self, ConfigError> {
        let mut layers = vec![DashConfig::default().to_value()];
        let mut sources = vec![ConfigSource::inline(ConfigOrigin::Builtin)];

        if let Some(path) = host_config_path.filter(|p| p.exists()) {
            let (value, digest) = load_toml_file(path)?;
            debug!(path = %path.display(), %digest, "loaded host config");
            layers.push(value);
            sources.push(ConfigSource {
                origin: ConfigOrigin::Host,
                path: Some(path.to_string_lossy().to_string()),
                digest: Some(digest),
            });
        }

        if let Some(url) = env_url.filter(|u| !u.trim().is_empty()) {
            layers.push(json!({ "base_url": url.trim() }));
            sources.push(ConfigSource::inline(ConfigOrigin::Env));
        }

        if let Some(cli) = cli_overrides {
            layers.push(cli);
            sources.push(ConfigSource::inline(ConfigOrigin::Cli));
        }

        let merged = merge_layers(layers);
        let mut config: DashConfig = serde_json::from_value(merged)
            .map_err(|e| ConfigError::ParseError(format!("invalid config value: {e}")))?;
        // Paths are appended as `/segment`; a trailing slash would double it.
        config.base_url = config.base_url.trim().trim_end_matches('/').to_string();
        validate_config(&config)?;

        Ok(Self {
            created_at: Utc::now(),
            config,
            sources,
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn origins(&self) -> Vec<ConfigOrigin> {
        self.sources.iter().map(|s| s.origin).collect()
    }
}

/// `$XDG_CONFIG_HOME/kerfuffle/dash.toml` or the platform equivalent
pub fn default_host_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(HOST_CONFIG_RELATIVE))
}

/// Load and parse a TOML file, returning the value and digest
fn load_toml_file(path: &Path) -> Result<(Value, String), ConfigError> {
    let bytes = fs::read(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
    let digest = hex::encode(Sha256::digest(&bytes));

    let contents = String::from_utf8(bytes)
        .map_err(|e| ConfigError::ParseError(format!("Invalid UTF-8: {}", e)))?;
    let table: toml::Table = toml::from_str(&contents)
        .map_err(|e| ConfigError::ParseError(format!("TOML parse error: {}", e)))?;

    Ok((toml_to_json(toml::Value::Table(table)), digest))
}

fn toml_to_json(toml: toml::Value) -> Value {
    match toml {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Number(i.into()),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(arr) => Value::Array(arr.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}

fn validate_config(config: &DashConfig) -> Result<(), ConfigError> {
    let url = config.base_url.trim();
    let host = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"));
    if !matches!(host, Some(h) if !h.is_empty() && !h.starts_with('/')) {
        return Err(ConfigError::ValidationError(format!(
            "base_url must be an http:// or https:// URL, got {:?}",
            config.base_url
        )));
    }

    let positive = [
        ("connect_timeout_seconds", config.connect_timeout_seconds),
        ("request_timeout_seconds", config.request_timeout_seconds),
        ("log_poll_interval_ms", config.log_poll_interval_ms),
        ("status_poll_interval_ms", config.status_poll_interval_ms),
    ];
    for (name, value) in positive {
        if value == 0 {
            return Err(ConfigError::ValidationError(format!(
                "{name} must be greater than 0"
            )));
        }
    }

    Ok(())
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}
