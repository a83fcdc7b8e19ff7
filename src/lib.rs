//! kerfuffle dashboard core
//!
//! Client-side building blocks for operating applications on a kerfuffle
//! deployment server: REST path construction, a resource client for the
//! application lifecycle, and cursor-based tailing of provision output.

pub mod config;
pub mod host;
pub mod logging;
pub mod mock;
pub mod path;
pub mod poll;
pub mod signal;
pub mod tail;
pub mod watch;

pub use config::{CliOverrides, ConfigError, DashConfig, EffectiveConfig};
pub use host::{ClientError, ErrorKind, FailureKind, HttpTransport, ResourceClient, Transport};
pub use path::{Access, ApiPaths, LifecycleAction, ParamAccessor, PathNode};
pub use tail::{LogTailCursor, LogTailer, LogTarget, TailError};
pub use watch::{StatusSnapshot, StatusWatcher};

pub use kerfuffle_protocol as protocol;
