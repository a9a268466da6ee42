//! The pruned search must find exactly what exhaustive enumeration finds,
//! and a match limit must keep exactly the best of the full result.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use lens_core::config::MatchingConfig;
use lens_core::graph::GraphSnapshot;
use lens_core::patterns::{sort_matches, Binding, Constraint, EdgeConstraint, PatternDefinition};
use lens_core::{Edge, Node, NodeKind, PatternCatalog, PatternMatcher};
use proptest::prelude::*;
use serde_json::json;

const KINDS: [NodeKind; 3] = [NodeKind::Class, NodeKind::Function, NodeKind::Method];
const EDGE_KINDS: [&str; 2] = ["calls", "inherits"];
const CONFIDENCES: [f64; 3] = [0.3, 0.6, 1.0];

fn catalog() -> PatternCatalog {
    PatternCatalog::from_values(vec![
        json!({
            "id": "chain",
            "roles": [{"name": "a", "kinds": ["class"]}, "b", "c"],
            "constraints": [
                {"type": "edge", "from": "a", "to": "b", "kind": "inherits", "weight": 0.2},
                {"type": "edge", "from": "b", "to": "c", "kind": "calls", "weight": 0.1},
                {"type": "optional", "weight": 0.3,
                 "constraint": {"type": "edge", "from": "a", "to": "c", "kind": "calls"}}
            ],
            "scoring": {"base": 0.4}
        }),
        json!({
            "id": "fan",
            "roles": ["x", {"name": "y", "kinds": ["function", "method"]}, "z"],
            "constraints": [
                {"type": "edge", "from": "x", "to": ["y", "z"], "kind": "calls",
                 "min_confidence": 0.5, "weight": 0.25},
                {"type": "optional", "constraint":
                    {"type": "edge", "from": "y", "to": "z", "kind": "inherits", "weight": 0.5}}
            ]
        }),
        json!({
            "id": "family",
            "roles": [{"name": "parent", "kinds": ["class"]}, "children",
                      {"name": "callers", "kinds": ["function", "method"]}],
            "constraints": [
                {"type": "edge", "from": "children", "to": "parent", "kind": "inherits", "weight": 0.2},
                {"type": "group", "role": "children", "min_size": 2, "weight": 0.2},
                {"type": "optional", "weight": 0.1,
                 "constraint": {"type": "group", "role": "callers", "min_size": 1}},
                {"type": "optional", "weight": 0.3,
                 "constraint": {"type": "edge", "from": "callers", "to": "parent", "kind": "calls",
                                "min_confidence": 0.5}}
            ],
            "scoring": {"base": 0.3}
        }),
        json!({
            "id": "hub",
            "roles": ["hub", {"name": "spokes", "kinds": ["function", "method"]}, "peer"],
            "constraints": [
                {"type": "edge", "from": "hub", "to": "spokes", "kind": "calls", "weight": 0.2},
                {"type": "group", "role": "spokes", "min_size": 1, "weight": 0.1},
                {"type": "optional", "weight": 0.4,
                 "constraint": {"type": "edge", "from": "spokes", "to": "peer", "kind": "inherits"}}
            ],
            "scoring": {"base": 0.2}
        }),
    ])
    .unwrap()
}

type Assignment<'g> = HashMap<&'g str, Vec<&'g str>>;

fn members<'g>(assign: &Assignment<'g>, role: &str) -> Vec<&'g str> {
    assign.get(role).cloned().unwrap_or_default()
}

/// Set semantics: any source member reaching any member of any target role.
fn edge_holds(graph: &GraphSnapshot, edge: &EdgeConstraint, assign: &Assignment<'_>) -> bool {
    let sources = members(assign, &edge.from);
    let targets: Vec<&str> = edge.to.iter().flat_map(|r| members(assign, r)).collect();
    graph.edges().iter().any(|e| {
        sources.contains(&e.src.as_str())
            && targets.contains(&e.dst.as_str())
            && e.kind == edge.kind
            && e.confidence >= edge.min_confidence
    })
}

fn has_edge(graph: &GraphSnapshot, src: &str, dst: &str, edge: &EdgeConstraint) -> bool {
    graph.edges().iter().any(|e| {
        e.src == src && e.dst == dst && e.kind == edge.kind && e.confidence >= edge.min_confidence
    })
}

/// Every node of an accepted kind outside the single bindings that carries
/// the required edges linking it to bound single roles.
fn group_members<'g>(
    pattern: &PatternDefinition,
    graph: &'g GraphSnapshot,
    role: &str,
    singles: &HashMap<&str, &'g str>,
) -> Vec<&'g str> {
    let declared = pattern.role(role).unwrap();
    graph
        .nodes()
        .iter()
        .filter(|n| declared.accepts(n.kind))
        .map(|n| n.node_id.as_str())
        .filter(|id| !singles.values().any(|bound| bound == id))
        .filter(|id| {
            pattern.constraints.iter().all(|c| {
                let Constraint::Edge(edge) = c else {
                    return true;
                };
                if edge.from == role {
                    let targets: Option<Vec<&str>> =
                        edge.to.iter().map(|r| singles.get(r.as_str()).copied()).collect();
                    targets.map_or(true, |t| t.iter().any(|dst| has_edge(graph, id, dst, edge)))
                } else if edge.to.len() == 1 && edge.to[0] == role {
                    singles
                        .get(edge.from.as_str())
                        .map_or(true, |src| has_edge(graph, src, id, edge))
                } else {
                    true
                }
            })
        })
        .collect()
}

/// Every injective assignment of nodes to single roles, groups resolved per
/// assignment, filtered by the constraints.
fn brute_force(pattern: &PatternDefinition, graph: &GraphSnapshot) -> BTreeSet<(Vec<String>, u64)> {
    let groups = pattern.group_roles();
    let singles: Vec<&str> = pattern
        .roles
        .iter()
        .map(|r| r.name.as_str())
        .filter(|r| !groups.contains(r))
        .collect();
    let ids: Vec<&str> = graph.nodes().iter().map(|n| n.node_id.as_str()).collect();
    let mut found = BTreeSet::new();

    let mut stack: Vec<Vec<&str>> = vec![Vec::new()];
    while let Some(partial) = stack.pop() {
        if partial.len() == singles.len() {
            let bound: HashMap<&str, &str> = singles.iter().copied().zip(partial.iter().copied()).collect();
            let mut assign: Assignment<'_> = bound.iter().map(|(r, n)| (*r, vec![*n])).collect();
            for role in &pattern.roles {
                if groups.contains(role.name.as_str()) {
                    let resolved = group_members(pattern, graph, &role.name, &bound);
                    assign.insert(role.name.as_str(), resolved);
                }
            }

            let mut confidence = pattern.scoring.base;
            let mut ok = true;
            for constraint in &pattern.constraints {
                let holds = match constraint.inner() {
                    Constraint::Edge(edge) => edge_holds(graph, edge, &assign),
                    Constraint::Group(group) => members(&assign, &group.role).len() >= group.min_size,
                    Constraint::Optional { .. } => false,
                };
                if holds {
                    confidence += constraint.weight();
                } else if !constraint.is_optional() {
                    ok = false;
                }
            }
            if ok {
                let key = pattern
                    .roles
                    .iter()
                    .map(|r| members(&assign, &r.name).join(","))
                    .collect();
                found.insert((key, (confidence.clamp(0.0, 1.0) * 1000.0).round() as u64));
            }
            continue;
        }
        let role = pattern.role(singles[partial.len()]).unwrap();
        for &id in &ids {
            let node = graph.node(id).unwrap();
            if partial.contains(&id) || !role.accepts(node.kind) {
                continue;
            }
            let mut next = partial.clone();
            next.push(id);
            stack.push(next);
        }
    }
    found
}

fn graphs() -> impl Strategy<Value = GraphSnapshot> {
    (1usize..11)
        .prop_flat_map(|n| {
            (
                proptest::collection::vec(0usize..KINDS.len(), n),
                proptest::collection::vec((0..n, 0..n, 0usize..2, 0usize..3), 0..24),
            )
        })
        .prop_map(|(kinds, edges)| {
            let nodes = kinds
                .iter()
                .enumerate()
                .map(|(i, k)| Node::new(format!("n{}", i), KINDS[*k], format!("N{}", i)))
                .collect();
            let edges = edges
                .iter()
                .enumerate()
                .map(|(i, (src, dst, kind, conf))| {
                    Edge::new(
                        format!("e{}", i),
                        EDGE_KINDS[*kind],
                        format!("n{}", src),
                        format!("n{}", dst),
                    )
                    .with_confidence(CONFIDENCES[*conf])
                })
                .collect();
            GraphSnapshot::new(nodes, edges)
        })
}

fn unlimited() -> MatchingConfig {
    MatchingConfig { max_matches_per_pattern: 100_000, parallel: false }
}

proptest! {
    #[test]
    fn pruned_search_matches_brute_force(graph in graphs()) {
        let catalog = catalog();
        let matcher = PatternMatcher::with_config(Arc::new(catalog.clone()), &unlimited());

        for pattern in catalog.patterns() {
            let expected = brute_force(pattern, &graph);
            let actual: BTreeSet<(Vec<String>, u64)> = matcher
                .match_pattern(pattern, &graph)
                .into_iter()
                .map(|m| {
                    let ids = pattern
                        .roles
                        .iter()
                        .map(|r| match &m.bindings[&r.name] {
                            Binding::Single(id) => id.clone(),
                            Binding::Group(ids) => ids.join(","),
                        })
                        .collect();
                    (ids, (m.confidence * 1000.0).round() as u64)
                })
                .collect();
            prop_assert_eq!(actual, expected, "pattern {}", pattern.id);
        }
    }

    #[test]
    fn limit_keeps_prefix_of_full_ranking(graph in graphs(), limit in 1usize..6) {
        for pattern in catalog().patterns() {
            let single = Arc::new(PatternCatalog::from_definitions(vec![pattern.clone()]).unwrap());

            let mut full = PatternMatcher::with_config(single.clone(), &unlimited()).match_all(&graph);
            sort_matches(&mut full);
            full.truncate(limit);

            let bounded = MatchingConfig { max_matches_per_pattern: limit, parallel: false };
            let limited = PatternMatcher::with_config(single, &bounded).match_all(&graph);
            prop_assert_eq!(limited, full, "pattern {} limit {}", pattern.id, limit);
        }
    }

    #[test]
    fn confidence_stays_in_bounds(graph in graphs()) {
        let matcher = PatternMatcher::new(Arc::new(catalog()));
        for m in matcher.match_all(&graph) {
            prop_assert!((0.0..=1.0).contains(&m.confidence));
        }
    }
}
