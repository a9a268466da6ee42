//! Node types for the semantic graph.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LensError;

/// Closed set of node kinds a bundle may declare.
///
/// Parsed at the ingestion boundary; raw kind strings never reach the
/// matcher or projection code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Module,
    Class,
    Interface,
    Trait,
    Function,
    Method,
    Field,
    Property,
}

impl NodeKind {
    /// Every kind, in declaration order.
    pub const ALL: [NodeKind; 8] = [
        NodeKind::Module,
        NodeKind::Class,
        NodeKind::Interface,
        NodeKind::Trait,
        NodeKind::Function,
        NodeKind::Method,
        NodeKind::Field,
        NodeKind::Property,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::Class => "class",
            Self::Interface => "interface",
            Self::Trait => "trait",
            Self::Function => "function",
            Self::Method => "method",
            Self::Field => "field",
            Self::Property => "property",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = LensError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodeKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| LensError::Parse(format!("unknown node kind '{}'", s)))
    }
}

/// Start/end offset pair, serialized as `[start, end]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span(pub u64, pub u64);

impl Span {
    pub fn new(start: u64, end: u64) -> Self {
        Self(start, end)
    }

    pub fn start(&self) -> u64 {
        self.0
    }

    pub fn end(&self) -> u64 {
        self.1
    }
}

/// A code entity in the semantic graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique key within a store.
    pub node_id: String,
    /// Entity kind.
    pub kind: NodeKind,
    /// Display name.
    pub name: String,
    /// Source language.
    #[serde(default)]
    pub language: String,
    /// Source file path.
    #[serde(default)]
    pub file: String,
    /// Offsets of the entity in its file.
    #[serde(default)]
    pub span: Span,
    /// Owning node id (e.g. the class of a method).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// HTTP route or similar entry point annotation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
}

impl Node {
    /// Create a node with empty location data.
    pub fn new(node_id: impl Into<String>, kind: NodeKind, name: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            kind,
            name: name.into(),
            language: String::new(),
            file: String::new(),
            span: Span::default(),
            parent: None,
            route: None,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = file.into();
        self
    }

    pub fn with_span(mut self, start: u64, end: u64) -> Self {
        self.span = Span(start, end);
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }
}
