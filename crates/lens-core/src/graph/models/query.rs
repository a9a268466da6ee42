//! Query filters and result types shared by every store backend.

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{Edge, Node, NodeKind};
use crate::error::{LensError, Result};

/// Result of inserting a node or edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The record was stored.
    Inserted,
    /// A record with the same id already exists; nothing was written.
    DuplicateId,
    /// The edge references a node that is not stored; nothing was written.
    MissingEndpoint,
}

/// Node filter. Every populated field must match (AND).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeQuery {
    pub kind: Option<NodeKind>,
    pub kinds: Option<Vec<NodeKind>>,
    pub file: Option<String>,
    pub file_prefix: Option<String>,
    pub route: Option<String>,
    pub name: Option<String>,
    /// Regular expression searched in the node name.
    pub name_pattern: Option<String>,
    pub language: Option<String>,
    pub parent: Option<String>,
}

impl NodeQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: NodeKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn kinds(mut self, kinds: impl IntoIterator<Item = NodeKind>) -> Self {
        self.kinds = Some(kinds.into_iter().collect());
        self
    }

    pub fn file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.file_prefix = Some(prefix.into());
        self
    }

    pub fn route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.name_pattern = Some(pattern.into());
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Compile `name_pattern`, if any.
    pub fn compiled_pattern(&self) -> Result<Option<Regex>> {
        self.name_pattern
            .as_deref()
            .map(|p| {
                Regex::new(p)
                    .map_err(|e| LensError::Config(format!("invalid name_pattern '{}': {}", p, e)))
            })
            .transpose()
    }

    /// Check every filter except `name_pattern`, which needs the compiled regex.
    pub fn matches_attributes(&self, node: &Node) -> bool {
        if self.kind.is_some_and(|k| k != node.kind) {
            return false;
        }
        if let Some(kinds) = &self.kinds {
            if !kinds.contains(&node.kind) {
                return false;
            }
        }
        if self.file.as_ref().is_some_and(|f| *f != node.file) {
            return false;
        }
        if self
            .file_prefix
            .as_ref()
            .is_some_and(|p| !node.file.starts_with(p.as_str()))
        {
            return false;
        }
        if self.route.is_some() && self.route != node.route {
            return false;
        }
        if self.name.as_ref().is_some_and(|n| *n != node.name) {
            return false;
        }
        if self.language.as_ref().is_some_and(|l| *l != node.language) {
            return false;
        }
        if self.parent.is_some() && self.parent != node.parent {
            return false;
        }
        true
    }

    /// Full match, given the result of [`NodeQuery::compiled_pattern`].
    pub fn matches(&self, node: &Node, pattern: Option<&Regex>) -> bool {
        self.matches_attributes(node) && pattern.map_or(true, |re| re.is_match(&node.name))
    }
}

/// Edge filter. Every populated field must match (AND).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeQuery {
    pub kind: Option<String>,
    pub kinds: Option<Vec<String>>,
    pub src: Option<String>,
    pub dst: Option<String>,
    /// Either endpoint equals this id.
    pub touching: Option<String>,
    pub min_confidence: Option<f64>,
}

impl EdgeQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn kinds<S: Into<String>>(mut self, kinds: impl IntoIterator<Item = S>) -> Self {
        self.kinds = Some(kinds.into_iter().map(Into::into).collect());
        self
    }

    pub fn src(mut self, src: impl Into<String>) -> Self {
        self.src = Some(src.into());
        self
    }

    pub fn dst(mut self, dst: impl Into<String>) -> Self {
        self.dst = Some(dst.into());
        self
    }

    pub fn touching(mut self, node_id: impl Into<String>) -> Self {
        self.touching = Some(node_id.into());
        self
    }

    pub fn min_confidence(mut self, min: f64) -> Self {
        self.min_confidence = Some(min);
        self
    }

    pub fn matches(&self, edge: &Edge) -> bool {
        if self.kind.as_ref().is_some_and(|k| *k != edge.kind) {
            return false;
        }
        if let Some(kinds) = &self.kinds {
            if !kinds.iter().any(|k| *k == edge.kind) {
                return false;
            }
        }
        if self.src.as_ref().is_some_and(|s| *s != edge.src) {
            return false;
        }
        if self.dst.as_ref().is_some_and(|d| *d != edge.dst) {
            return false;
        }
        if self
            .touching
            .as_ref()
            .is_some_and(|t| *t != edge.src && *t != edge.dst)
        {
            return false;
        }
        if self.min_confidence.is_some_and(|m| edge.confidence < m) {
            return false;
        }
        true
    }
}

/// A set of nodes with the edges between them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subgraph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Subgraph {
    pub fn node_ids(&self) -> Vec<String> {
        self.nodes.iter().map(|n| n.node_id.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Store-wide counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub nodes_by_kind: BTreeMap<String, usize>,
    pub edges_by_kind: BTreeMap<String, usize>,
}
