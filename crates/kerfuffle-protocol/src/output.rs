//! Provision output streams.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Named output stream of a provision's process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamType {
    /// Standard output.
    #[serde(rename = "log")]
    Stdout,
    /// Standard error.
    #[serde(rename = "err")]
    Stderr,
}

impl StreamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamType::Stdout => "log",
            StreamType::Stderr => "err",
        }
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StreamType {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_lowercase().as_str() {
            "log" | "stdout" | "out" => Ok(StreamType::Stdout),
            "err" | "stderr" => Ok(StreamType::Stderr),
            other => Err(format!("Unknown stream type: {other}")),
        }
    }
}

/// One chunk of a provision's output starting at the requested offset.
///
/// `next` is the offset to resume from; a response without it is rejected at
/// decode time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputChunk {
    pub next: u64,
    #[serde(default)]
    pub content: String,
}

impl OutputChunk {
    pub fn new(next: u64, content: impl Into<String>) -> Self {
        Self {
            next,
            content: content.into(),
        }
    }
}
