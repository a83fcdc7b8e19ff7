//! Resource path builder
//!
//! Builds REST resource paths by chaining symbolic accesses instead of
//! concatenating strings:
//!
//! ```
//! use kerfuffle_dash::path::PathNode;
//!
//! let v1 = PathNode::root("http://localhost:8080").field("api").field("v1");
//! let out = v1.param("application", "demo").param("provision", "backend").param("output", "log");
//! assert_eq!(
//!     out.to_string(),
//!     "http://localhost:8080/api/v1/application/demo/provision/backend/output/log"
//! );
//! ```
//!
//! Nodes are immutable. Deriving a child never changes its parent, and
//! children share the parent's prefix through reference-counted links.
//! Segment values are inserted verbatim: callers supply URL-safe ids.

mod api;

use std::fmt;
use std::sync::Arc;

pub use api::{ApiPaths, LifecycleAction};

/// Prefix marking a parameterized accessor in [`PathNode::access`].
pub const PARAM_MARKER: char = '$';

#[derive(Debug)]
struct Segment {
    value: String,
    parent: Option<Arc<Segment>>,
}

/// An immutable resource path: a base URL plus an ordered list of segments.
#[derive(Debug, Clone)]
pub struct PathNode {
    base: Arc<str>,
    tail: Option<Arc<Segment>>,
    depth: usize,
}

/// Result of a symbolic access on a [`PathNode`].
#[derive(Debug, Clone)]
pub enum Access {
    /// A plain name, already appended.
    Node(PathNode),
    /// A marker-prefixed name awaiting its single argument.
    Param(ParamAccessor),
}

/// One-argument accessor produced by a `$name` access.
#[derive(Debug, Clone)]
pub struct ParamAccessor {
    node: PathNode,
    name: String,
}

impl ParamAccessor {
    /// Name of the accessed segment, without the marker.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Supply the parameter: appends the name and then `value`.
    pub fn with(&self, value: impl Into<String>) -> PathNode {
        self.node.param(self.name.as_str(), value)
    }
}

impl PathNode {
    /// Seed a path with no segments under `base_url`, kept verbatim.
    pub fn root(base_url: impl AsRef<str>) -> Self {
        Self {
            base: Arc::from(base_url.as_ref()),
            tail: None,
            depth: 0,
        }
    }

    /// Append `name` as a literal segment.
    pub fn field(&self, name: impl Into<String>) -> Self {
        Self {
            base: Arc::clone(&self.base),
            tail: Some(Arc::new(Segment {
                value: name.into(),
                parent: self.tail.clone(),
            })),
            depth: self.depth + 1,
        }
    }

    /// Append `name` followed by `value`.
    pub fn param(&self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.field(name).field(value)
    }

    /// Symbolic access by name. `$name` yields a one-argument accessor,
    /// anything else a node with `name` appended.
    pub fn access(&self, name: &str) -> Access {
        match name.strip_prefix(PARAM_MARKER) {
            Some(stripped) => Access::Param(ParamAccessor {
                node: self.clone(),
                name: stripped.to_string(),
            }),
            None => Access::Node(self.field(name)),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Number of segments after the base.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Segments in order, root first.
    pub fn segments(&self) -> Vec<&str> {
        let mut out = Vec::with_capacity(self.depth);
        let mut cursor = self.tail.as_deref();
        while let Some(segment) = cursor {
            out.push(segment.value.as_str());
            cursor = segment.parent.as_deref();
        }
        out.reverse();
        out
    }
}

impl fmt::Display for PathNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base)?;
        for segment in self.segments() {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

impl PartialEq for PathNode {
    fn eq(&self, other: &Self) -> bool {
        self.base == other.base && self.segments() == other.segments()
    }
}

impl Eq for PathNode {}
