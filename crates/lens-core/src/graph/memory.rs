//! In-process graph store.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use super::models::{Edge, EdgeQuery, InsertOutcome, Node, NodeQuery, StoreStats, Subgraph};
use super::GraphStore;
use crate::error::{LensError, Result};

#[derive(Debug, Default)]
struct GraphData {
    nodes: Vec<Node>,
    node_index: HashMap<String, usize>,
    edges: Vec<Edge>,
    edge_ids: HashSet<String>,
    /// node id -> indices into `edges`, ascending.
    outgoing: HashMap<String, Vec<usize>>,
    incoming: HashMap<String, Vec<usize>>,
}

impl GraphData {
    /// Edge indices a query can be answered from, ascending.
    fn edge_candidates(&self, query: &EdgeQuery) -> Vec<usize> {
        let lookup = |map: &HashMap<String, Vec<usize>>, id: &str| {
            map.get(id).cloned().unwrap_or_default()
        };

        if let Some(src) = &query.src {
            lookup(&self.outgoing, src)
        } else if let Some(dst) = &query.dst {
            lookup(&self.incoming, dst)
        } else if let Some(node) = &query.touching {
            let mut indices = lookup(&self.outgoing, node);
            indices.extend(lookup(&self.incoming, node));
            indices.sort_unstable();
            indices.dedup();
            indices
        } else {
            (0..self.edges.len()).collect()
        }
    }
}

/// Embedded store backed by vectors and adjacency lists.
///
/// Always usable; `connect` and `close` do nothing.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<GraphData>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GraphStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn connect(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    async fn add_node(&self, node: Node) -> Result<InsertOutcome> {
        let mut data = self.data.write();
        if data.node_index.contains_key(&node.node_id) {
            debug!(node_id = %node.node_id, "Node already stored");
            return Ok(InsertOutcome::DuplicateId);
        }
        let idx = data.nodes.len();
        data.node_index.insert(node.node_id.clone(), idx);
        data.nodes.push(node);
        Ok(InsertOutcome::Inserted)
    }

    async fn add_edge(&self, edge: Edge) -> Result<InsertOutcome> {
        let mut data = self.data.write();
        if data.edge_ids.contains(&edge.edge_id) {
            return Ok(InsertOutcome::DuplicateId);
        }
        if !data.node_index.contains_key(&edge.src) || !data.node_index.contains_key(&edge.dst) {
            return Ok(InsertOutcome::MissingEndpoint);
        }

        let idx = data.edges.len();
        data.edge_ids.insert(edge.edge_id.clone());
        data.outgoing.entry(edge.src.clone()).or_default().push(idx);
        data.incoming.entry(edge.dst.clone()).or_default().push(idx);
        data.edges.push(edge);
        Ok(InsertOutcome::Inserted)
    }

    async fn get_node(&self, node_id: &str) -> Result<Node> {
        let data = self.data.read();
        data.node_index
            .get(node_id)
            .map(|&idx| data.nodes[idx].clone())
            .ok_or_else(|| LensError::node_not_found(node_id))
    }

    async fn get_nodes_by_query(&self, query: &NodeQuery) -> Result<Vec<Node>> {
        let pattern = query.compiled_pattern()?;
        let data = self.data.read();
        Ok(data
            .nodes
            .iter()
            .filter(|n| query.matches(n, pattern.as_ref()))
            .cloned()
            .collect())
    }

    async fn get_edges_by_query(&self, query: &EdgeQuery) -> Result<Vec<Edge>> {
        let data = self.data.read();
        Ok(data
            .edge_candidates(query)
            .into_iter()
            .map(|idx| &data.edges[idx])
            .filter(|e| query.matches(e))
            .cloned()
            .collect())
    }

    async fn get_subgraph(&self, node_ids: &[String]) -> Result<Subgraph> {
        let data = self.data.read();

        let mut node_indices: Vec<usize> = node_ids
            .iter()
            .filter_map(|id| data.node_index.get(id).copied())
            .collect();
        node_indices.sort_unstable();
        node_indices.dedup();

        let members: HashSet<&str> = node_indices
            .iter()
            .map(|&idx| data.nodes[idx].node_id.as_str())
            .collect();

        let mut edge_indices: Vec<usize> = members
            .iter()
            .filter_map(|id| data.outgoing.get(*id))
            .flatten()
            .copied()
            .filter(|&idx| members.contains(data.edges[idx].dst.as_str()))
            .collect();
        edge_indices.sort_unstable();

        Ok(Subgraph {
            nodes: node_indices.iter().map(|&i| data.nodes[i].clone()).collect(),
            edges: edge_indices.iter().map(|&i| data.edges[i].clone()).collect(),
        })
    }

    async fn stats(&self) -> Result<StoreStats> {
        let data = self.data.read();
        let mut nodes_by_kind = BTreeMap::new();
        for node in &data.nodes {
            *nodes_by_kind.entry(node.kind.to_string()).or_insert(0) += 1;
        }
        let mut edges_by_kind = BTreeMap::new();
        for edge in &data.edges {
            *edges_by_kind.entry(edge.kind.clone()).or_insert(0) += 1;
        }
        Ok(StoreStats {
            node_count: data.nodes.len(),
            edge_count: data.edges.len(),
            nodes_by_kind,
            edges_by_kind,
        })
    }

    async fn clear(&self) -> Result<()> {
        *self.data.write() = GraphData::default();
        Ok(())
    }
}
