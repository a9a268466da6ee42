//! Edge types for the semantic graph.

use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_CALL_KINDS, DEFAULT_INHERITANCE_KINDS};

/// Confidence assigned when a bundle omits it.
pub const DEFAULT_CONFIDENCE: f64 = 1.0;

fn default_confidence() -> f64 {
    DEFAULT_CONFIDENCE
}

/// A directed, typed, confidence-weighted relation between two nodes.
///
/// The graph is a multigraph: several edges may join the same ordered pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Unique key within a store.
    pub edge_id: String,
    /// Relation name (open set, e.g. "calls", "inherits").
    pub kind: String,
    /// Source node id.
    pub src: String,
    /// Destination node id.
    pub dst: String,
    /// Confidence in [0, 1].
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    /// Provenance tags, e.g. "static_analysis".
    #[serde(default)]
    pub evidence: Vec<String>,
}

impl Edge {
    pub fn new(
        edge_id: impl Into<String>,
        kind: impl Into<String>,
        src: impl Into<String>,
        dst: impl Into<String>,
    ) -> Self {
        Self {
            edge_id: edge_id.into(),
            kind: kind.into(),
            src: src.into(),
            dst: dst.into(),
            confidence: DEFAULT_CONFIDENCE,
            evidence: Vec::new(),
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_evidence(mut self, tag: impl Into<String>) -> Self {
        self.evidence.push(tag.into());
        self
    }

    /// The other endpoint, seen from `node_id`.
    pub fn opposite(&self, node_id: &str) -> &str {
        if self.src == node_id {
            &self.dst
        } else {
            &self.src
        }
    }
}

/// Groups of edge kinds that queries and views treat alike.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeFamilies {
    pub call: Vec<String>,
    pub inheritance: Vec<String>,
}

impl Default for EdgeFamilies {
    fn default() -> Self {
        let owned = |kinds: &[&str]| kinds.iter().map(|s| s.to_string()).collect();
        Self {
            call: owned(DEFAULT_CALL_KINDS),
            inheritance: owned(DEFAULT_INHERITANCE_KINDS),
        }
    }
}

