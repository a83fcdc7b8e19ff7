//! Error payloads returned on non-2xx responses.

use serde::{Deserialize, Serialize};

/// Extra context the backend attaches to some errors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMeta {
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
}

/// `{ "error": "...", "meta": {...} }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<ErrorMeta>,
}

impl ApiErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            meta: None,
        }
    }

    /// Try to read an error payload out of a raw response body.
    ///
    /// Returns `None` for bodies that are not JSON objects with a string
    /// `error` field.
    pub fn parse(body: &str) -> Option<Self> {
        serde_json::from_str::<Self>(body)
            .ok()
            .filter(|parsed| !parsed.error.is_empty())
    }
}
