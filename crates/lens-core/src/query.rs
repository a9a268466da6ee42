//! Structural queries over a [`GraphStore`].
//!
//! Every operation is read-only and goes through the store contract, so the
//! same code runs against any backend.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use serde::Serialize;

use crate::error::Result;
use crate::graph::{
    Edge, EdgeFamilies, EdgeQuery, GraphStore, Node, NodeKind, NodeQuery, Subgraph,
};

/// Traversal direction for [`QueryEngine::get_path`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Follow edges from `src` to `dst` only.
    #[default]
    Directed,
    /// Follow edges either way.
    Undirected,
}

/// One element of a path: nodes and edges alternate, starting and ending with a node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum PathStep {
    Node(Node),
    Edge(Edge),
}

impl PathStep {
    pub fn id(&self) -> &str {
        match self {
            Self::Node(n) => &n.node_id,
            Self::Edge(e) => &e.edge_id,
        }
    }
}

/// Query engine bound to a store and a set of edge families.
#[derive(Clone)]
pub struct QueryEngine {
    store: Arc<dyn GraphStore>,
    families: EdgeFamilies,
}

impl QueryEngine {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self::with_families(store, EdgeFamilies::default())
    }

    pub fn with_families(store: Arc<dyn GraphStore>, families: EdgeFamilies) -> Self {
        Self { store, families }
    }

    pub fn families(&self) -> &EdgeFamilies {
        &self.families
    }

    /// Edges leaving (and, undirected, entering) `node_id`, in insertion order,
    /// paired with the neighbor they lead to.
    async fn neighbors(&self, node_id: &str, direction: Direction) -> Result<Vec<(Edge, String)>> {
        let query = match direction {
            Direction::Directed => EdgeQuery::new().src(node_id),
            Direction::Undirected => EdgeQuery::new().touching(node_id),
        };
        let edges = self.store.get_edges_by_query(&query).await?;
        Ok(edges
            .into_iter()
            .map(|e| {
                let next = e.opposite(node_id).to_string();
                (e, next)
            })
            .collect())
    }

    /// Shortest path from `from` to `to` by breadth-first search.
    ///
    /// Neighbors are explored in edge insertion order, so ties between equally
    /// short paths always resolve the same way. Returns `None` when `to` is
    /// unreachable.
    pub async fn get_path(
        &self,
        from: &str,
        to: &str,
        direction: Direction,
    ) -> Result<Option<Vec<PathStep>>> {
        let start = self.store.get_node(from).await?;
        let goal = self.store.get_node(to).await?;
        if from == to {
            return Ok(Some(vec![PathStep::Node(start)]));
        }

        // node -> (edge used to reach it, predecessor)
        let mut came_from: HashMap<String, (Edge, String)> = HashMap::new();
        let mut visited: HashSet<String> = HashSet::from([from.to_string()]);
        let mut queue = VecDeque::from([from.to_string()]);

        'search: while let Some(current) = queue.pop_front() {
            for (edge, next) in self.neighbors(&current, direction).await? {
                if !visited.insert(next.clone()) {
                    continue;
                }
                came_from.insert(next.clone(), (edge, current.clone()));
                if next == to {
                    break 'search;
                }
                queue.push_back(next);
            }
        }

        if !came_from.contains_key(to) {
            return Ok(None);
        }

        let mut reversed = vec![PathStep::Node(goal)];
        let mut cursor = to.to_string();
        while let Some((edge, prev)) = came_from.remove(&cursor) {
            reversed.push(PathStep::Edge(edge));
            let node = if prev == from {
                start.clone()
            } else {
                self.store.get_node(&prev).await?
            };
            reversed.push(PathStep::Node(node));
            cursor = prev;
        }
        reversed.reverse();
        Ok(Some(reversed))
    }

    /// Every node reachable from `node_id` ignoring direction, sorted by id.
    pub async fn get_connected_component(&self, node_id: &str) -> Result<Vec<Node>> {
        let reached = self.find_connected_nodes(node_id, None).await?;
        let mut nodes: Vec<Node> = reached.into_iter().map(|(n, _)| n).collect();
        nodes.sort_by(|a, b| a.node_id.cmp(&b.node_id));
        Ok(nodes)
    }

    pub async fn find_by_route(&self, route: &str) -> Result<Vec<Node>> {
        self.store
            .get_nodes_by_query(&NodeQuery::new().route(route))
            .await
    }

    pub async fn find_by_file(&self, file: &str) -> Result<Vec<Node>> {
        self.store
            .get_nodes_by_query(&NodeQuery::new().file(file))
            .await
    }

    pub async fn find_by_kind(&self, kind: NodeKind) -> Result<Vec<Node>> {
        self.store
            .get_nodes_by_query(&NodeQuery::new().kind(kind))
            .await
    }

    /// Nodes with a call-family edge into `node_id`.
    pub async fn get_callers(&self, node_id: &str) -> Result<Vec<Node>> {
        self.store.get_node(node_id).await?;
        let edges = self
            .store
            .get_edges_by_query(&EdgeQuery::new().dst(node_id).kinds(self.families.call.clone()))
            .await?;
        self.unique_nodes(edges.iter().map(|e| e.src.as_str())).await
    }

    /// Nodes `node_id` reaches through a call-family edge.
    pub async fn get_callees(&self, node_id: &str) -> Result<Vec<Node>> {
        self.store.get_node(node_id).await?;
        let edges = self
            .store
            .get_edges_by_query(&EdgeQuery::new().src(node_id).kinds(self.families.call.clone()))
            .await?;
        self.unique_nodes(edges.iter().map(|e| e.dst.as_str())).await
    }

    async fn unique_nodes<'a>(&self, ids: impl Iterator<Item = &'a str>) -> Result<Vec<Node>> {
        let mut seen = HashSet::new();
        let ordered: Vec<String> = ids
            .filter(|id| seen.insert(*id))
            .map(str::to_string)
            .collect();
        let mut nodes = Vec::with_capacity(ordered.len());
        for id in ordered {
            nodes.push(self.store.get_node(&id).await?);
        }
        Ok(nodes)
    }

    /// Call-only subgraph.
    ///
    /// Without roots: every node touched by a call edge, in order of first
    /// appearance (scanning call edges, source before destination), with every
    /// call edge. With roots: breadth-first along outgoing call edges up to
    /// `max_depth` hops, nodes in visit order, call edges induced on them.
    pub async fn get_call_graph(
        &self,
        root_ids: Option<&[String]>,
        max_depth: Option<usize>,
    ) -> Result<Subgraph> {
        let call_edges = self
            .store
            .get_edges_by_query(&EdgeQuery::new().kinds(self.families.call.clone()))
            .await?;

        let order: Vec<String> = match root_ids {
            None => {
                let mut seen = HashSet::new();
                call_edges
                    .iter()
                    .flat_map(|e| [e.src.as_str(), e.dst.as_str()])
                    .filter(|id| seen.insert(*id))
                    .map(str::to_string)
                    .collect()
            }
            Some(roots) => {
                let mut outgoing: HashMap<&str, Vec<&str>> = HashMap::new();
                for edge in &call_edges {
                    outgoing.entry(edge.src.as_str()).or_default().push(edge.dst.as_str());
                }

                let mut visited: HashSet<String> = HashSet::new();
                let mut order = Vec::new();
                let mut queue = VecDeque::new();
                for root in roots {
                    self.store.get_node(root).await?;
                    if visited.insert(root.clone()) {
                        order.push(root.clone());
                        queue.push_back((root.clone(), 0usize));
                    }
                }

                while let Some((current, depth)) = queue.pop_front() {
                    if max_depth.is_some_and(|max| depth >= max) {
                        continue;
                    }
                    for next in outgoing.get(current.as_str()).into_iter().flatten() {
                        if visited.insert(next.to_string()) {
                            order.push(next.to_string());
                            queue.push_back((next.to_string(), depth + 1));
                        }
                    }
                }
                order
            }
        };

        let members: HashSet<&str> = order.iter().map(String::as_str).collect();
        let edges: Vec<Edge> = call_edges
            .iter()
            .filter(|e| members.contains(e.src.as_str()) && members.contains(e.dst.as_str()))
            .cloned()
            .collect();

        let mut nodes = Vec::with_capacity(order.len());
        for id in &order {
            nodes.push(self.store.get_node(id).await?);
        }
        Ok(Subgraph { nodes, edges })
    }

    /// Nodes without any incident edge, in insertion order.
    pub async fn find_orphan_nodes(&self) -> Result<Vec<Node>> {
        let nodes = self.store.get_nodes_by_query(&NodeQuery::default()).await?;
        let edges = self.store.get_edges_by_query(&EdgeQuery::default()).await?;
        let connected: HashSet<&str> = edges
            .iter()
            .flat_map(|e| [e.src.as_str(), e.dst.as_str()])
            .collect();
        Ok(nodes
            .into_iter()
            .filter(|n| !connected.contains(n.node_id.as_str()))
            .collect())
    }

    /// Nodes within `max_hops` undirected hops of `node_id` (unbounded when
    /// `None`), in breadth-first order with their distance. The start node is
    /// included at distance 0.
    pub async fn find_connected_nodes(
        &self,
        node_id: &str,
        max_hops: Option<usize>,
    ) -> Result<Vec<(Node, usize)>> {
        let start = self.store.get_node(node_id).await?;

        let mut visited: HashSet<String> = HashSet::from([node_id.to_string()]);
        let mut queue = VecDeque::from([(node_id.to_string(), 0usize)]);
        let mut reached = vec![(start, 0usize)];

        while let Some((current, depth)) = queue.pop_front() {
            if max_hops.is_some_and(|max| depth >= max) {
                continue;
            }
            for (_, next) in self.neighbors(&current, Direction::Undirected).await? {
                if visited.insert(next.clone()) {
                    reached.push((self.store.get_node(&next).await?, depth + 1));
                    queue.push_back((next, depth + 1));
                }
            }
        }
        Ok(reached)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::MemoryStore;

    async fn chain() -> QueryEngine {
        let store = Arc::new(MemoryStore::new());
        for id in ["a", "b", "c", "d"] {
            store.add_node(Node::new(id, NodeKind::Function, id)).await.unwrap();
        }
        store.add_edge(Edge::new("ab", "calls", "a", "b")).await.unwrap();
        store.add_edge(Edge::new("bc", "calls", "b", "c")).await.unwrap();
        store.add_edge(Edge::new("ac", "uses", "a", "c")).await.unwrap();
        QueryEngine::new(store)
    }

    #[tokio::test]
    async fn test_path_prefers_shortest() {
        let engine = chain().await;
        let path = engine.get_path("a", "c", Direction::Directed).await.unwrap().unwrap();
        let ids: Vec<_> = path.iter().map(PathStep::id).collect();
        assert_eq!(ids, ["a", "ac", "c"]);
    }

    #[tokio::test]
    async fn test_path_respects_direction() {
        let engine = chain().await;
        assert!(engine.get_path("c", "a", Direction::Directed).await.unwrap().is_none());
        assert!(engine.get_path("c", "a", Direction::Undirected).await.unwrap().is_some());
        assert!(engine.get_path("a", "d", Direction::Undirected).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_call_graph_depth_bound() {
        let engine = chain().await;
        let roots = vec!["a".to_string()];
        let graph = engine.get_call_graph(Some(roots.as_slice()), Some(1)).await.unwrap();
        assert_eq!(graph.node_ids(), ["a", "b"]);
        assert_eq!(graph.edges.len(), 1);
    }
}
