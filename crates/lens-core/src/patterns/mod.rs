//! Architectural pattern detection.
//!
//! A pattern declares roles and constraints between them; the matcher
//! searches a graph for role bindings that satisfy every required constraint
//! and the scorer turns each binding into a confidence and an explanation.
//!
//! # Components
//!
//! - [`PatternCatalog`] - validated pattern definitions (JSON, YAML or bundle)
//! - [`PatternMatcher`] - candidate generation and backtracking search
//! - [`Scorer`] - deterministic confidence and explain text

mod definition;
mod matcher;
mod scorer;

pub use definition::{
    Constraint, EdgeConstraint, GroupConstraint, PatternCatalog, PatternDefinition, Role, Scoring,
};
pub use matcher::PatternMatcher;
pub use scorer::{ConstraintResult, Score, Scorer};

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// What a role is bound to in a match.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Binding {
    Single(String),
    /// Members sorted by id.
    Group(Vec<String>),
}

impl Binding {
    pub fn node_ids(&self) -> &[String] {
        match self {
            Self::Single(id) => std::slice::from_ref(id),
            Self::Group(ids) => ids,
        }
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.node_ids().iter().any(|id| id == node_id)
    }
}

/// Role name to binding, ordered by role name.
pub type RoleBindings = BTreeMap<String, Binding>;

/// One detected occurrence of a pattern.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternMatch {
    pub pattern: String,
    pub bindings: RoleBindings,
    pub confidence: f64,
    pub evidence: Vec<String>,
    pub explain: String,
}

impl PatternMatch {
    /// Every bound node id, sorted and deduplicated.
    pub fn node_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .bindings
            .values()
            .flat_map(|b| b.node_ids().iter().cloned())
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    fn binding_key(&self) -> Vec<(&str, &[String])> {
        self.bindings
            .iter()
            .map(|(role, binding)| (role.as_str(), binding.node_ids()))
            .collect()
    }

    /// Confidence descending, then pattern id, then bindings.
    pub fn rank_order(&self, other: &Self) -> Ordering {
        other
            .confidence
            .total_cmp(&self.confidence)
            .then_with(|| self.pattern.cmp(&other.pattern))
            .then_with(|| self.binding_key().cmp(&other.binding_key()))
    }
}

/// Sort matches into their reporting order.
pub fn sort_matches(matches: &mut [PatternMatch]) {
    matches.sort_by(PatternMatch::rank_order);
}
