//! View projection.
//!
//! A [`ViewConfig`] selects a task-specific subgraph (call graph, inheritance
//! tree, module dependencies, the full graph or a neighborhood). Projections
//! are deterministic: nodes and edges come back sorted by id, so identical
//! store contents and configurations give identical results.
//!
//! [`ViewService`] adds caching, layout and formatting on top.

mod cache;
mod fingerprint;
mod service;

pub use cache::{CacheStats, ViewCache};
pub use fingerprint::{canonicalize, ViewFingerprint};
pub use service::{Formatter, Layout, Position, ViewResponse, ViewService, ViewStats};

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::{DEFAULT_NEIGHBORHOOD_DEPTH, MODULE_DEPENDENCY_KIND};
use crate::error::{LensError, Result};
use crate::graph::{
    Edge, EdgeFamilies, EdgeQuery, GraphStore, Node, NodeKind, NodeQuery,
};
use crate::patterns::PatternMatcher;
use crate::query::QueryEngine;

/// Supported view types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewType {
    CallGraph,
    Inheritance,
    ModuleDeps,
    Full,
    Neighborhood,
}

impl ViewType {
    pub const ALL: [ViewType; 5] = [
        Self::CallGraph,
        Self::Inheritance,
        Self::ModuleDeps,
        Self::Full,
        Self::Neighborhood,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CallGraph => "call_graph",
            Self::Inheritance => "inheritance",
            Self::ModuleDeps => "module_deps",
            Self::Full => "full",
            Self::Neighborhood => "neighborhood",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::CallGraph => "Nodes connected by call edges",
            Self::Inheritance => "Type hierarchy from inheritance edges",
            Self::ModuleDeps => "Dependencies aggregated between modules",
            Self::Full => "Every node and edge",
            Self::Neighborhood => "Nodes within max_depth hops of root_ids",
        }
    }
}

impl fmt::Display for ViewType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViewType {
    type Err = LensError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| LensError::Config(format!("unknown view type: {}", s)))
    }
}

/// What to project. Unknown fields are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ViewConfig {
    pub view_type: ViewType,

    /// Keep only nodes of these kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kinds: Option<Vec<NodeKind>>,

    /// Keep only nodes whose file starts with this prefix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_prefix: Option<String>,

    /// Drop edges below this confidence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_confidence: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_ids: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,

    /// Overlay pattern matches found in the projected subgraph.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub include_patterns: bool,
}

impl ViewConfig {
    pub fn new(view_type: ViewType) -> Self {
        Self {
            view_type,
            kinds: None,
            file_prefix: None,
            min_confidence: None,
            root_ids: None,
            max_depth: None,
            include_patterns: false,
        }
    }

    pub fn with_kinds(mut self, kinds: impl IntoIterator<Item = NodeKind>) -> Self {
        self.kinds = Some(kinds.into_iter().collect());
        self
    }

    pub fn with_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.file_prefix = Some(prefix.into());
        self
    }

    pub fn with_min_confidence(mut self, min: f64) -> Self {
        self.min_confidence = Some(min);
        self
    }

    pub fn with_roots(mut self, roots: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.root_ids = Some(roots.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_patterns(mut self) -> Self {
        self.include_patterns = true;
        self
    }

    /// Decode a JSON document; malformed input is a `CONFIG_ERROR`.
    pub fn from_value(value: Value) -> Result<Self> {
        let config: Self = serde_json::from_value(value)
            .map_err(|e| LensError::Config(format!("view config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| LensError::Config(format!("view config: {}", e)))?;
        Self::from_value(value)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(min) = self.min_confidence {
            if !(0.0..=1.0).contains(&min) {
                return Err(LensError::Config(format!(
                    "min_confidence must be within [0, 1], got {}",
                    min
                )));
            }
        }
        if self.view_type == ViewType::Neighborhood
            && self.root_ids.as_ref().map_or(true, Vec::is_empty)
        {
            return Err(LensError::Config(
                "neighborhood view requires root_ids".to_string(),
            ));
        }
        Ok(())
    }

    /// Cache key for this configuration.
    pub fn fingerprint(&self) -> Result<ViewFingerprint> {
        ViewFingerprint::of(self)
    }

    fn keeps_node(&self, node: &Node) -> bool {
        if let Some(kinds) = &self.kinds {
            if !kinds.contains(&node.kind) {
                return false;
            }
        }
        if let Some(prefix) = &self.file_prefix {
            if !node.file.starts_with(prefix.as_str()) {
                return false;
            }
        }
        true
    }
}

/// A pattern match drawn over a projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternOverlay {
    /// `<pattern>#<rank>`, rank counted from 1 in reporting order.
    pub match_id: String,
    pub pattern: String,
    pub confidence: f64,
    pub node_ids: Vec<String>,
}

/// Projected subgraph, nodes and edges sorted by id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patterns: Option<Vec<PatternOverlay>>,
}

impl Projection {
    pub fn node_ids(&self) -> Vec<String> {
        self.nodes.iter().map(|n| n.node_id.clone()).collect()
    }
}

/// Builds projections from a store.
#[derive(Clone)]
pub struct ProjectionEngine {
    store: Arc<dyn GraphStore>,
    query: QueryEngine,
    matcher: PatternMatcher,
}

impl ProjectionEngine {
    pub fn new(store: Arc<dyn GraphStore>, families: EdgeFamilies, matcher: PatternMatcher) -> Self {
        let query = QueryEngine::with_families(store.clone(), families);
        Self {
            store,
            query,
            matcher,
        }
    }

    fn families(&self) -> &EdgeFamilies {
        self.query.families()
    }

    pub async fn project(&self, config: &ViewConfig) -> Result<Projection> {
        config.validate()?;

        let (nodes, edges) = match config.view_type {
            ViewType::Full => self.full().await?,
            ViewType::CallGraph => self.call_graph(config).await?,
            ViewType::Inheritance => self.inheritance().await?,
            ViewType::ModuleDeps => self.module_deps().await?,
            ViewType::Neighborhood => self.neighborhood(config).await?,
        };

        let mut nodes: Vec<Node> = nodes.into_iter().filter(|n| config.keeps_node(n)).collect();
        nodes.sort_by(|a, b| a.node_id.cmp(&b.node_id));
        nodes.dedup_by(|a, b| a.node_id == b.node_id);

        let selected: HashSet<&str> = nodes.iter().map(|n| n.node_id.as_str()).collect();
        let min_confidence = config.min_confidence.unwrap_or(0.0);
        let mut edges: Vec<Edge> = edges
            .into_iter()
            .filter(|e| selected.contains(e.src.as_str()) && selected.contains(e.dst.as_str()))
            .filter(|e| e.confidence >= min_confidence)
            .collect();
        edges.sort_by(|a, b| a.edge_id.cmp(&b.edge_id));

        debug!(
            view = %config.view_type,
            nodes = nodes.len(),
            edges = edges.len(),
            "Projected view"
        );

        let patterns = if config.include_patterns {
            let ids: Vec<String> = nodes.iter().map(|n| n.node_id.clone()).collect();
            Some(self.overlays(&ids).await?)
        } else {
            None
        };

        Ok(Projection {
            nodes,
            edges,
            patterns,
        })
    }

    /// Matches over the store subgraph induced by the selected nodes, so
    /// edges the view itself hides still count.
    async fn overlays(&self, node_ids: &[String]) -> Result<Vec<PatternOverlay>> {
        let matches = self.matcher.detect_within(self.store.as_ref(), node_ids).await?;
        Ok(matches
            .into_iter()
            .enumerate()
            .map(|(i, m)| PatternOverlay {
                match_id: format!("{}#{}", m.pattern, i + 1),
                node_ids: m.node_ids(),
                pattern: m.pattern,
                confidence: m.confidence,
            })
            .collect())
    }

    async fn full(&self) -> Result<(Vec<Node>, Vec<Edge>)> {
        let nodes = self.store.get_nodes_by_query(&NodeQuery::default()).await?;
        let edges = self.store.get_edges_by_query(&EdgeQuery::default()).await?;
        Ok((nodes, edges))
    }

    async fn call_graph(&self, config: &ViewConfig) -> Result<(Vec<Node>, Vec<Edge>)> {
        let roots = config.root_ids.as_deref().filter(|r| !r.is_empty());
        let subgraph = self.query.get_call_graph(roots, config.max_depth).await?;
        Ok((subgraph.nodes, subgraph.edges))
    }

    async fn inheritance(&self) -> Result<(Vec<Node>, Vec<Edge>)> {
        let edges = self
            .store
            .get_edges_by_query(&EdgeQuery::new().kinds(self.families().inheritance.clone()))
            .await?;
        let nodes = self.endpoints(&edges).await?;
        Ok((nodes, edges))
    }

    async fn endpoints(&self, edges: &[Edge]) -> Result<Vec<Node>> {
        let ids: BTreeSet<&str> = edges
            .iter()
            .flat_map(|e| [e.src.as_str(), e.dst.as_str()])
            .collect();
        let mut nodes = Vec::with_capacity(ids.len());
        for id in ids {
            nodes.push(self.store.get_node(id).await?);
        }
        Ok(nodes)
    }

    async fn module_deps(&self) -> Result<(Vec<Node>, Vec<Edge>)> {
        let nodes = self.store.get_nodes_by_query(&NodeQuery::default()).await?;
        let edges = self.store.get_edges_by_query(&EdgeQuery::default()).await?;

        let aggregated = aggregate_module_edges(&module_owners(&nodes), &edges);
        let modules: Vec<Node> = nodes
            .into_iter()
            .filter(|n| n.kind == NodeKind::Module)
            .collect();
        Ok((modules, aggregated))
    }

    async fn neighborhood(&self, config: &ViewConfig) -> Result<(Vec<Node>, Vec<Edge>)> {
        let depth = config.max_depth.unwrap_or(DEFAULT_NEIGHBORHOOD_DEPTH);
        let mut ids: BTreeSet<String> = BTreeSet::new();
        for root in config.root_ids.iter().flatten() {
            for (node, _) in self.query.find_connected_nodes(root, Some(depth)).await? {
                ids.insert(node.node_id);
            }
        }
        let ids: Vec<String> = ids.into_iter().collect();
        let subgraph = self.store.get_subgraph(&ids).await?;
        Ok((subgraph.nodes, subgraph.edges))
    }
}

/// Nearest module ancestor of every node, following `parent` links.
/// A module owns itself; nodes outside any module are absent.
fn module_owners(nodes: &[Node]) -> HashMap<&str, &str> {
    let by_id: HashMap<&str, &Node> = nodes.iter().map(|n| (n.node_id.as_str(), n)).collect();
    let mut owners = HashMap::new();

    for node in nodes {
        let mut current = node;
        let mut seen: HashSet<&str> = HashSet::new();
        loop {
            if current.kind == NodeKind::Module {
                owners.insert(node.node_id.as_str(), current.node_id.as_str());
                break;
            }
            if !seen.insert(current.node_id.as_str()) {
                break;
            }
            match current.parent.as_deref().and_then(|p| by_id.get(p)) {
                Some(parent) => current = parent,
                None => break,
            }
        }
    }
    owners
}

/// One `depends_on` edge per ordered pair of distinct owning modules.
fn aggregate_module_edges(owners: &HashMap<&str, &str>, edges: &[Edge]) -> Vec<Edge> {
    // (src module, dst module) -> (max confidence, contributing kinds)
    let mut pairs: BTreeMap<(&str, &str), (f64, BTreeSet<&str>)> = BTreeMap::new();

    for edge in edges {
        let (Some(&src), Some(&dst)) = (owners.get(edge.src.as_str()), owners.get(edge.dst.as_str()))
        else {
            continue;
        };
        if src == dst {
            continue;
        }
        let entry = pairs.entry((src, dst)).or_insert((0.0, BTreeSet::new()));
        entry.0 = entry.0.max(edge.confidence);
        entry.1.insert(edge.kind.as_str());
    }

    pairs
        .into_iter()
        .map(|((src, dst), (confidence, kinds))| Edge {
            edge_id: format!("module_deps:{}->{}", src, dst),
            kind: MODULE_DEPENDENCY_KIND.to_string(),
            src: src.to_string(),
            dst: dst.to_string(),
            confidence,
            evidence: kinds.into_iter().map(str::to_string).collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_view_config_rejects_unknown_fields() {
        let err = ViewConfig::from_value(json!({"view_type": "full", "colour": "red"})).unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::ConfigError);

        let err = ViewConfig::from_value(json!({"view_type": "sideways"})).unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::ConfigError);
    }

    #[test]
    fn test_neighborhood_requires_roots() {
        let err = ViewConfig::new(ViewType::Neighborhood).validate().unwrap_err();
        assert!(err.to_string().contains("root_ids"));
        assert!(ViewConfig::new(ViewType::Neighborhood)
            .with_roots(["a"])
            .validate()
            .is_ok());
    }

    #[test]
    fn test_fingerprint_ignores_absent_options() {
        let a = ViewConfig::new(ViewType::Full);
        let b = ViewConfig::from_value(json!({"view_type": "full", "kinds": null})).unwrap();
        assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());

        let c = ViewConfig::new(ViewType::Full).with_min_confidence(0.5);
        assert_ne!(a.fingerprint().unwrap(), c.fingerprint().unwrap());
    }

    #[test]
    fn test_module_ownership_and_aggregation() {
        let nodes = vec![
            Node::new("m1", NodeKind::Module, "m1"),
            Node::new("m2", NodeKind::Module, "m2"),
            Node::new("c1", NodeKind::Class, "C1").with_parent("m1"),
            Node::new("f1", NodeKind::Method, "f1").with_parent("c1"),
            Node::new("c2", NodeKind::Class, "C2").with_parent("m2"),
            Node::new("loose", NodeKind::Function, "loose"),
        ];
        let edges = vec![
            Edge::new("e1", "calls", "f1", "c2").with_confidence(0.6),
            Edge::new("e2", "imports", "m1", "m2").with_confidence(0.9),
            Edge::new("e3", "calls", "f1", "c1"),
            Edge::new("e4", "calls", "loose", "c2"),
        ];

        let owners = module_owners(&nodes);
        assert_eq!(owners.get("f1"), Some(&"m1"));
        assert_eq!(owners.get("m2"), Some(&"m2"));
        assert_eq!(owners.get("loose"), None);

        let deps = aggregate_module_edges(&owners, &edges);
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].edge_id, "module_deps:m1->m2");
        assert_eq!(deps[0].confidence, 0.9);
        assert_eq!(deps[0].evidence, ["calls", "imports"]);
    }

    #[test]
    fn test_parent_cycle_terminates() {
        let nodes = vec![
            Node::new("a", NodeKind::Class, "a").with_parent("b"),
            Node::new("b", NodeKind::Class, "b").with_parent("a"),
        ];
        assert!(module_owners(&nodes).is_empty());
    }
}
