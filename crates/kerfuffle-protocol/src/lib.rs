//! Kerfuffle REST Protocol Types
//!
//! JSON documents exchanged with the kerfuffle deployment manager's
//! `/api/v1` surface.

pub mod application;
pub mod error;
pub mod output;

pub use application::{
    AppStatus, Application, ApplicationDocument, Cloudflare, InstallConfiguration, Meta,
    ProcessState, Provision, Proxy, StatusFlag,
};
pub use error::{ApiErrorBody, ErrorMeta};
pub use output::{OutputChunk, StreamType};

/// Literal segments of the versioned API root, in order.
pub const API_ROOT_SEGMENTS: [&str; 2] = ["api", "v1"];

/// Collection segment under which applications live.
pub const APPLICATION_SEGMENT: &str = "application";

/// Default bootstrap file path inside a deployed repository.
pub const DEFAULT_BOOTSTRAP: &str = ".kerfuffle";

/// Default branch deployed when none is given.
pub const DEFAULT_BRANCH: &str = "main";

/// The backend serialises empty Go maps and nil pointers as `null`; treat
/// those the same as a missing field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + serde::Deserialize<'de>,
{
    use serde::Deserialize;
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
