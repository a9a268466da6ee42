//! Read-only, indexed copy of a graph for synchronous algorithms.

use std::collections::HashMap;

use super::models::{Edge, EdgeQuery, Node, NodeQuery, Subgraph};
use super::GraphStore;
use crate::error::Result;

/// Nodes sorted by id plus out/in adjacency in edge insertion order.
///
/// Captured once from a store so CPU-bound work (pattern matching) can run
/// without awaiting the backend per lookup.
#[derive(Debug, Clone, Default)]
pub struct GraphSnapshot {
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
    edges: Vec<Edge>,
    outgoing: HashMap<String, Vec<usize>>,
    incoming: HashMap<String, Vec<usize>>,
}

impl GraphSnapshot {
    /// Build from raw records. Edges with an endpoint outside `nodes` are dropped.
    pub fn new(mut nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        nodes.sort_by(|a, b| a.node_id.cmp(&b.node_id));
        nodes.dedup_by(|a, b| a.node_id == b.node_id);

        let index: HashMap<String, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.node_id.clone(), i))
            .collect();

        let edges: Vec<Edge> = edges
            .into_iter()
            .filter(|e| index.contains_key(&e.src) && index.contains_key(&e.dst))
            .collect();

        let mut outgoing: HashMap<String, Vec<usize>> = HashMap::new();
        let mut incoming: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, edge) in edges.iter().enumerate() {
            outgoing.entry(edge.src.clone()).or_default().push(i);
            incoming.entry(edge.dst.clone()).or_default().push(i);
        }

        Self {
            nodes,
            index,
            edges,
            outgoing,
            incoming,
        }
    }

    pub fn from_subgraph(subgraph: Subgraph) -> Self {
        Self::new(subgraph.nodes, subgraph.edges)
    }

    /// Copy the whole store.
    pub async fn capture(store: &dyn GraphStore) -> Result<Self> {
        let nodes = store.get_nodes_by_query(&NodeQuery::default()).await?;
        let edges = store.get_edges_by_query(&EdgeQuery::default()).await?;
        Ok(Self::new(nodes, edges))
    }

    /// Copy the induced subgraph over `node_ids`.
    pub async fn capture_scoped(store: &dyn GraphStore, node_ids: &[String]) -> Result<Self> {
        Ok(Self::from_subgraph(store.get_subgraph(node_ids).await?))
    }

    /// Nodes sorted by id.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Edges in insertion order.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, node_id: &str) -> Option<&Node> {
        self.index.get(node_id).map(|&i| &self.nodes[i])
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.index.contains_key(node_id)
    }

    pub fn out_edges<'a>(&'a self, node_id: &str) -> impl Iterator<Item = &'a Edge> + 'a {
        Self::adjacent(&self.outgoing, &self.edges, node_id)
    }

    pub fn in_edges<'a>(&'a self, node_id: &str) -> impl Iterator<Item = &'a Edge> + 'a {
        Self::adjacent(&self.incoming, &self.edges, node_id)
    }

    fn adjacent<'a>(
        map: &'a HashMap<String, Vec<usize>>,
        edges: &'a [Edge],
        node_id: &str,
    ) -> impl Iterator<Item = &'a Edge> + 'a {
        map.get(node_id)
            .into_iter()
            .flatten()
            .map(move |&i| &edges[i])
    }

    /// Whether some `kind` edge with enough confidence leads from `src` to `dst`.
    pub fn has_edge(&self, src: &str, dst: &str, kind: &str, min_confidence: f64) -> bool {
        self.out_edges(src)
            .any(|e| e.dst == dst && e.kind == kind && e.confidence >= min_confidence)
    }

    pub fn has_out_edge(&self, src: &str, kind: &str, min_confidence: f64) -> bool {
        self.out_edges(src)
            .any(|e| e.kind == kind && e.confidence >= min_confidence)
    }

    pub fn has_in_edge(&self, dst: &str, kind: &str, min_confidence: f64) -> bool {
        self.in_edges(dst)
            .any(|e| e.kind == kind && e.confidence >= min_confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeKind;

    #[test]
    fn test_snapshot_sorts_and_drops_dangling() {
        let snapshot = GraphSnapshot::new(
            vec![
                Node::new("b", NodeKind::Class, "B"),
                Node::new("a", NodeKind::Class, "A"),
            ],
            vec![
                Edge::new("e1", "inherits", "a", "b"),
                Edge::new("e2", "inherits", "a", "ghost"),
            ],
        );
        let ids: Vec<_> = snapshot.nodes().iter().map(|n| n.node_id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        assert_eq!(snapshot.edges().len(), 1);
        assert!(snapshot.has_edge("a", "b", "inherits", 1.0));
        assert!(snapshot.has_in_edge("b", "inherits", 0.0));
        assert!(!snapshot.has_out_edge("b", "inherits", 0.0));
    }
}
