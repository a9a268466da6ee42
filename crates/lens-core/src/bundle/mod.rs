//! Semantic graph bundles: the versioned export a store is loaded from.
//!
//! A bundle goes through three stages before it touches a store:
//! 1. JSON parsing (failure aborts with `PARSE_ERROR`)
//! 2. Shape validation by a [`BundleValidator`] (failure aborts with `VALIDATION_ERROR`)
//! 3. Typed decoding into [`Bundle`]
//!
//! [`BundleLoader`] then ingests nodes and edges leniently: duplicates and
//! dangling edges are skipped and counted, never fatal.

mod loader;
mod validate;

pub use loader::{BundleLoader, LoadSummary};
pub use validate::{BundleValidator, SchemaValidator};

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::graph::{Edge, Node};

/// A decoded bundle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    pub version: String,
    #[serde(default)]
    pub generated_at: Option<String>,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    /// Carried through, not interpreted.
    #[serde(default)]
    pub annotations: Vec<Value>,
    /// Raw pattern definitions, parsed by the pattern catalog.
    #[serde(default)]
    pub patterns: Vec<Value>,
}

impl Bundle {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            ..Default::default()
        }
    }

    pub fn with_node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn with_edge(mut self, edge: Edge) -> Self {
        self.edges.push(edge);
        self
    }
}

/// One problem found by a validator, located by a JSON pointer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Verdict returned by a [`BundleValidator`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    #[serde(default)]
    pub errors: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn valid() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    /// Valid exactly when `errors` is empty.
    pub fn from_issues(errors: Vec<ValidationIssue>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}
