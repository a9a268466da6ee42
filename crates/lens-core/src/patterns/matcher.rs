//! Role-binding search.
//!
//! Each pattern is matched in three steps:
//! 1. candidate sets per role (declared kinds plus the edges required
//!    constraints imply for the role)
//! 2. backtracking over single roles in declaration order, checking every
//!    required constraint as soon as all of its roles are bound
//! 3. group roles resolved against the bound single roles, then every
//!    constraint evaluated and scored

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, warn};

use super::definition::{Constraint, EdgeConstraint, PatternCatalog, PatternDefinition};
use super::scorer::{ConstraintResult, Scorer};
use super::{sort_matches, Binding, PatternMatch, RoleBindings};
use crate::config::MatchingConfig;
use crate::error::Result;
use crate::graph::{GraphSnapshot, GraphStore};

/// Runs a pattern catalog against graphs.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    catalog: Arc<PatternCatalog>,
    max_matches: usize,
    parallel: bool,
}

impl PatternMatcher {
    pub fn new(catalog: Arc<PatternCatalog>) -> Self {
        Self::with_config(catalog, &MatchingConfig::default())
    }

    pub fn with_config(catalog: Arc<PatternCatalog>, config: &MatchingConfig) -> Self {
        Self {
            catalog,
            max_matches: config.max_matches_per_pattern.max(1),
            parallel: config.parallel,
        }
    }

    /// Match every catalog pattern; results in reporting order.
    pub fn match_all(&self, graph: &GraphSnapshot) -> Vec<PatternMatch> {
        let patterns = self.catalog.patterns();
        let mut matches: Vec<PatternMatch> = if self.parallel {
            patterns
                .par_iter()
                .flat_map_iter(|p| self.match_pattern(p, graph))
                .collect()
        } else {
            patterns
                .iter()
                .flat_map(|p| self.match_pattern(p, graph))
                .collect()
        };
        sort_matches(&mut matches);
        matches
    }

    /// Match one pattern. An unsatisfiable pattern yields no matches.
    pub fn match_pattern(&self, pattern: &PatternDefinition, graph: &GraphSnapshot) -> Vec<PatternMatch> {
        let mut search = Search::new(pattern, graph, self.max_matches);
        search.run();

        if search.truncated {
            warn!(
                pattern = %pattern.id,
                limit = self.max_matches,
                "Pattern match limit reached, results truncated"
            );
        }
        debug!(pattern = %pattern.id, matches = search.matches.len(), "Matched pattern");
        search.matches
    }

    /// Match the catalog against the whole store.
    pub async fn detect(&self, store: &dyn GraphStore) -> Result<Vec<PatternMatch>> {
        let graph = GraphSnapshot::capture(store).await?;
        Ok(self.match_all(&graph))
    }

    /// Match the catalog against the subgraph induced by `node_ids`.
    pub async fn detect_within(
        &self,
        store: &dyn GraphStore,
        node_ids: &[String],
    ) -> Result<Vec<PatternMatch>> {
        let graph = GraphSnapshot::capture_scoped(store, node_ids).await?;
        Ok(self.match_all(&graph))
    }
}

/// Edge constraint that is required (not wrapped in `optional`).
fn required_edges(pattern: &PatternDefinition) -> impl Iterator<Item = &EdgeConstraint> {
    pattern.constraints.iter().filter_map(|c| match c {
        Constraint::Edge(edge) => Some(edge),
        _ => None,
    })
}

/// Search state for one pattern.
struct Search<'a> {
    pattern: &'a PatternDefinition,
    graph: &'a GraphSnapshot,
    /// Single roles in declaration order.
    singles: Vec<&'a str>,
    slot: HashMap<&'a str, usize>,
    /// Candidate node ids per single role, sorted.
    single_candidates: Vec<Vec<&'a str>>,
    /// Required constraints to check once `singles[i]` is bound.
    checks: Vec<Vec<&'a EdgeConstraint>>,
    /// Group roles in declaration order with their candidates.
    groups: Vec<(&'a str, Vec<&'a str>)>,
    bound: Vec<Option<&'a str>>,
    limit: usize,
    matches: Vec<PatternMatch>,
    truncated: bool,
}

impl<'a> Search<'a> {
    fn new(pattern: &'a PatternDefinition, graph: &'a GraphSnapshot, limit: usize) -> Self {
        let group_roles = pattern.group_roles();

        let singles: Vec<&str> = pattern
            .roles
            .iter()
            .map(|r| r.name.as_str())
            .filter(|name| !group_roles.contains(name))
            .collect();
        let slot: HashMap<&str, usize> = singles.iter().enumerate().map(|(i, r)| (*r, i)).collect();

        let single_candidates = singles
            .iter()
            .map(|role| Self::candidates(pattern, graph, role, true))
            .collect();

        let mut checks: Vec<Vec<&EdgeConstraint>> = vec![Vec::new(); singles.len()];
        for edge in required_edges(pattern) {
            let positions: Option<Vec<usize>> = std::iter::once(&edge.from)
                .chain(edge.to.iter())
                .map(|role| slot.get(role.as_str()).copied())
                .collect();
            if let Some(last) = positions.and_then(|p| p.into_iter().max()) {
                checks[last].push(edge);
            }
        }

        let groups = pattern
            .roles
            .iter()
            .map(|r| r.name.as_str())
            .filter(|name| group_roles.contains(name))
            .map(|role| (role, Self::candidates(pattern, graph, role, false)))
            .collect();

        let bound = vec![None; singles.len()];
        Self {
            pattern,
            graph,
            singles,
            slot,
            single_candidates,
            checks,
            groups,
            bound,
            limit,
            matches: Vec::new(),
            truncated: false,
        }
    }

    /// Nodes of an accepted kind; single roles must also carry the edges
    /// required constraints demand of them.
    fn candidates(
        pattern: &PatternDefinition,
        graph: &'a GraphSnapshot,
        role: &str,
        with_edge_predicates: bool,
    ) -> Vec<&'a str> {
        let Some(declared) = pattern.role(role) else {
            return Vec::new();
        };
        graph
            .nodes()
            .iter()
            .filter(|node| declared.accepts(node.kind))
            .filter(|node| {
                !with_edge_predicates
                    || required_edges(pattern).all(|edge| {
                        let id = node.node_id.as_str();
                        (edge.from != role || graph.has_out_edge(id, &edge.kind, edge.min_confidence))
                            && (edge.sole_target() != Some(role)
                                || graph.has_in_edge(id, &edge.kind, edge.min_confidence))
                    })
            })
            .map(|node| node.node_id.as_str())
            .collect()
    }

    fn run(&mut self) {
        self.extend(0);
        self.keep_best();
    }

    /// Keep the `limit` best matches in reporting order. The search is
    /// exhaustive; only the retained set is bounded.
    fn keep_best(&mut self) {
        sort_matches(&mut self.matches);
        if self.matches.len() > self.limit {
            self.matches.truncate(self.limit);
            self.truncated = true;
        }
    }

    fn bound_node(&self, role: &str) -> Option<&'a str> {
        self.slot.get(role).and_then(|&i| self.bound[i])
    }

    /// Edge check over single roles only.
    fn edge_holds(&self, edge: &EdgeConstraint) -> bool {
        let Some(from) = self.bound_node(&edge.from) else {
            return false;
        };
        let targets: Vec<&str> = edge.to.iter().filter_map(|r| self.bound_node(r)).collect();
        self.graph.out_edges(from).any(|e| {
            e.kind == edge.kind
                && e.confidence >= edge.min_confidence
                && targets.contains(&e.dst.as_str())
        })
    }

    fn extend(&mut self, depth: usize) {
        if depth == self.singles.len() {
            self.complete();
            return;
        }

        for i in 0..self.single_candidates[depth].len() {
            let node = self.single_candidates[depth][i];
            if self.bound[..depth].contains(&Some(node)) {
                continue;
            }

            self.bound[depth] = Some(node);
            if self.checks[depth].iter().all(|edge| self.edge_holds(edge)) {
                self.extend(depth + 1);
            }
            self.bound[depth] = None;
        }
    }

    /// Members of `role` consistent with the bound single roles.
    fn resolve_group(&self, role: &str, candidates: &[&'a str]) -> Vec<String> {
        let taken: HashSet<&str> = self.bound.iter().flatten().copied().collect();

        candidates
            .iter()
            .copied()
            .filter(|node| !taken.contains(node))
            .filter(|node| {
                required_edges(self.pattern).all(|edge| {
                    if edge.from == role {
                        let targets: Option<Vec<&str>> =
                            edge.to.iter().map(|r| self.bound_node(r)).collect();
                        match targets {
                            Some(targets) => self.graph.out_edges(node).any(|e| {
                                e.kind == edge.kind
                                    && e.confidence >= edge.min_confidence
                                    && targets.contains(&e.dst.as_str())
                            }),
                            None => true,
                        }
                    } else if edge.sole_target() == Some(role) {
                        match self.bound_node(&edge.from) {
                            Some(from) => {
                                self.graph.has_edge(from, node, &edge.kind, edge.min_confidence)
                            }
                            None => true,
                        }
                    } else {
                        true
                    }
                })
            })
            .map(str::to_string)
            .collect()
    }

    fn complete(&mut self) {
        let mut bindings = RoleBindings::new();
        for (role, node) in self.singles.iter().zip(&self.bound) {
            if let Some(node) = node {
                bindings.insert(role.to_string(), Binding::Single(node.to_string()));
            }
        }
        for (role, candidates) in &self.groups {
            let members = self.resolve_group(role, candidates);
            bindings.insert(role.to_string(), Binding::Group(members));
        }

        let results: Vec<ConstraintResult> = self
            .pattern
            .constraints
            .iter()
            .map(|c| evaluate(self.graph, c, &bindings))
            .collect();
        if results.iter().any(|r| !r.optional && !r.satisfied) {
            return;
        }

        let score = Scorer.score(self.pattern, &bindings, &results);
        self.matches.push(PatternMatch {
            pattern: self.pattern.id.clone(),
            bindings,
            confidence: score.confidence,
            evidence: score.evidence,
            explain: score.explain,
        });
        if self.matches.len() >= self.limit.saturating_mul(2) {
            self.keep_best();
        }
    }
}

fn bound_ids<'b>(bindings: &'b RoleBindings, role: &str) -> &'b [String] {
    bindings.get(role).map(Binding::node_ids).unwrap_or(&[])
}

/// Evaluate one constraint against complete bindings.
///
/// Edges use set semantics: a group side holds when any member qualifies.
pub(crate) fn evaluate(
    graph: &GraphSnapshot,
    constraint: &Constraint,
    bindings: &RoleBindings,
) -> ConstraintResult {
    let nodes_of = |role: &str| bound_ids(bindings, role);

    let (satisfied, detail) = match constraint.inner() {
        Constraint::Edge(edge) => {
            let targets: HashSet<&str> = edge
                .to
                .iter()
                .flat_map(|r| nodes_of(r))
                .map(String::as_str)
                .collect();
            let witness = nodes_of(&edge.from).iter().find_map(|src| {
                graph.out_edges(src).find(|e| {
                    e.kind == edge.kind
                        && e.confidence >= edge.min_confidence
                        && targets.contains(e.dst.as_str())
                })
            });
            match witness {
                Some(e) => (
                    true,
                    Some(format!("{} --{}--> {} ({:.2})", e.src, e.kind, e.dst, e.confidence)),
                ),
                None => (false, None),
            }
        }
        Constraint::Group(group) => {
            let size = nodes_of(&group.role).len();
            (
                size >= group.min_size,
                Some(format!("{} has {} members", group.role, size)),
            )
        }
        Constraint::Optional { .. } => (false, None),
    };

    ConstraintResult::new(constraint, satisfied, detail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, Node, NodeKind};
    use serde_json::json;

    fn graph() -> GraphSnapshot {
        GraphSnapshot::new(
            vec![
                Node::new("base", NodeKind::Class, "Base"),
                Node::new("child-1", NodeKind::Class, "Child1"),
                Node::new("child-2", NodeKind::Class, "Child2"),
                Node::new("loner", NodeKind::Class, "Loner"),
                Node::new("fn", NodeKind::Function, "helper"),
            ],
            vec![
                Edge::new("e1", "inherits", "child-1", "base"),
                Edge::new("e2", "inherits", "child-2", "base").with_confidence(0.5),
                Edge::new("e3", "calls", "fn", "child-1"),
            ],
        )
    }

    fn matcher(pattern: serde_json::Value) -> PatternMatcher {
        let catalog = PatternCatalog::from_values(vec![pattern]).unwrap();
        PatternMatcher::new(Arc::new(catalog))
    }

    #[test]
    fn test_required_edge_excludes_non_matching() {
        let matcher = matcher(json!({
            "id": "inherit",
            "roles": [{"name": "child", "kinds": ["class"]}, "parent"],
            "constraints": [
                {"type": "edge", "from": "child", "to": "parent", "kind": "inherits", "weight": 0.5},
                {"type": "optional", "constraint":
                    {"type": "edge", "from": "child", "to": "parent", "kind": "inherits", "min_confidence": 0.9},
                 "weight": 0.2}
            ],
            "scoring": {"base": 0.2}
        }));

        let matches = matcher.match_all(&graph());
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].bindings["child"], Binding::Single("child-1".into()));
        assert!((matches[0].confidence - 0.9).abs() < 1e-9);
        assert_eq!(matches[1].bindings["child"], Binding::Single("child-2".into()));
        assert!((matches[1].confidence - 0.7).abs() < 1e-9);
        assert!(matches[1].explain.contains("[FAIL] (optional)"));
    }

    #[test]
    fn test_group_role_collects_members() {
        let matcher = matcher(json!({
            "id": "hierarchy",
            "roles": ["parent", {"name": "children", "kinds": ["class"]}],
            "constraints": [
                {"type": "edge", "from": "children", "to": "parent", "kind": "inherits", "weight": 0.3},
                {"type": "group", "role": "children", "min_size": 2, "weight": 0.3}
            ]
        }));

        let matches = matcher.match_all(&graph());
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].bindings["parent"], Binding::Single("base".into()));
        assert_eq!(
            matches[0].bindings["children"],
            Binding::Group(vec!["child-1".into(), "child-2".into()])
        );
    }

    #[test]
    fn test_unsatisfiable_pattern_is_silent() {
        let matcher = matcher(json!({
            "id": "nothing",
            "roles": ["a", "b"],
            "constraints": [{"type": "edge", "from": "a", "to": "b", "kind": "overrides"}]
        }));
        assert!(matcher.match_all(&graph()).is_empty());
    }

    #[test]
    fn test_limit_truncates() {
        let catalog = PatternCatalog::from_values(vec![json!({"id": "any", "roles": ["x"]})]).unwrap();
        let config = MatchingConfig {
            max_matches_per_pattern: 2,
            parallel: false,
        };
        let matcher = PatternMatcher::with_config(Arc::new(catalog), &config);
        assert_eq!(matcher.match_all(&graph()).len(), 2);
    }

    #[test]
    fn test_limit_keeps_highest_confidence() {
        let graph = GraphSnapshot::new(
            vec![
                Node::new("a-low", NodeKind::Class, "Low"),
                Node::new("dep", NodeKind::Class, "Dep"),
                Node::new("z-high", NodeKind::Class, "High"),
            ],
            vec![Edge::new("e1", "uses", "z-high", "dep")],
        );
        let catalog = PatternCatalog::from_values(vec![json!({
            "id": "user",
            "roles": [{"name": "child", "kinds": ["class"]}, "target"],
            "constraints": [
                {"type": "optional", "constraint":
                    {"type": "edge", "from": "child", "to": "target", "kind": "uses"},
                 "weight": 0.5}
            ],
            "scoring": {"base": 0.3}
        })])
        .unwrap();

        let unlimited = PatternMatcher::new(Arc::new(catalog.clone())).match_all(&graph);
        assert_eq!(unlimited.len(), 6);
        assert_eq!(unlimited[0].bindings["child"], Binding::Single("z-high".into()));
        assert!((unlimited[0].confidence - 0.8).abs() < 1e-9);

        let config = MatchingConfig {
            max_matches_per_pattern: 1,
            parallel: false,
        };
        let limited = PatternMatcher::with_config(Arc::new(catalog), &config).match_all(&graph);
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0], unlimited[0]);
    }
}
