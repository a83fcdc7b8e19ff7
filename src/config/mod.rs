//! Layered dashboard configuration
//!
//! Layers, lowest precedence first:
//! 1. Built-in defaults
//! 2. Host/user config (`$XDG_CONFIG_HOME/kerfuffle/dash.toml`)
//! 3. Environment (`KERFUFFLE_URL`)
//! 4. CLI flags

mod defaults;
mod effective;
mod merge;

pub use defaults::DashConfig;
pub use effective::{
    default_host_config_path, CliOverrides, ConfigError, ConfigOrigin, ConfigSource,
    EffectiveConfig, HOST_CONFIG_RELATIVE, URL_ENV_VAR,
};
pub use merge::{deep_merge, merge_layers};
