//! Named resources of the `/api/v1` surface.

use std::fmt;
use std::str::FromStr;

use kerfuffle_protocol::{StreamType, API_ROOT_SEGMENTS, APPLICATION_SEGMENT};

use super::PathNode;

/// State transitions addressed as `application/{id}/{action}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    /// Toggle maintenance mode.
    Hold,
    Reload,
    Shutdown,
    Startup,
}

impl LifecycleAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleAction::Hold => "hold",
            LifecycleAction::Reload => "reload",
            LifecycleAction::Shutdown => "shutdown",
            LifecycleAction::Startup => "startup",
        }
    }

    pub fn all() -> [LifecycleAction; 4] {
        [
            LifecycleAction::Hold,
            LifecycleAction::Reload,
            LifecycleAction::Shutdown,
            LifecycleAction::Startup,
        ]
    }
}

impl fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifecycleAction {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_lowercase().as_str() {
            "hold" => Ok(LifecycleAction::Hold),
            "reload" => Ok(LifecycleAction::Reload),
            "shutdown" => Ok(LifecycleAction::Shutdown),
            "startup" => Ok(LifecycleAction::Startup),
            other => Err(format!("Unknown action: {other}")),
        }
    }
}

/// Path factory rooted at `{base}/api/v1`. Every call starts from the root.
#[derive(Debug, Clone)]
pub struct ApiPaths {
    v1: PathNode,
}

impl ApiPaths {
    pub fn new(base_url: impl AsRef<str>) -> Self {
        let v1 = API_ROOT_SEGMENTS
            .iter()
            .fold(PathNode::root(base_url), |node, segment| node.field(*segment));
        Self { v1 }
    }

    /// The `{base}/api/v1` node itself.
    pub fn root(&self) -> &PathNode {
        &self.v1
    }

    pub fn applications(&self) -> PathNode {
        self.v1.field(APPLICATION_SEGMENT)
    }

    pub fn application(&self, id: &str) -> PathNode {
        self.v1.param(APPLICATION_SEGMENT, id)
    }

    pub fn action(&self, id: &str, action: LifecycleAction) -> PathNode {
        self.application(id).field(action.as_str())
    }

    pub fn processes(&self, id: &str) -> PathNode {
        self.application(id).field("processes")
    }

    pub fn provisions(&self, id: &str) -> PathNode {
        self.application(id).field("provisions")
    }

    pub fn provision_reload(&self, id: &str, provision: &str) -> PathNode {
        self.application(id).param("provision", provision).field("reload")
    }

    pub fn output(&self, id: &str, provision: &str, stream: StreamType) -> PathNode {
        self.application(id)
            .param("provision", provision)
            .param("output", stream.as_str())
    }
}
