//! Graph store for semantic code graphs.
//!
//! Nodes are code entities (modules, classes, methods, ...), edges are typed,
//! confidence-weighted relations between them. Every consumer reads and writes
//! through the [`GraphStore`] trait, so the backend is chosen once, at
//! construction:
//!
//! - [`MemoryStore`] - in-process vectors with an id index and adjacency lists
//! - [`SurrealStore`] - SurrealDB via `surrealdb::engine::any` (`ws://`, `mem://`, ...)
//!
//! # Example
//!
//! ```ignore
//! use lens_core::config::StoreConfig;
//! use lens_core::graph::{open_store, Node, NodeKind};
//!
//! let store = open_store(&StoreConfig::default());
//! store.connect().await?;
//! store.add_node(Node::new("class-a", NodeKind::Class, "A")).await?;
//! ```

mod memory;
pub mod models;
mod snapshot;
mod surreal;

pub use memory::MemoryStore;
pub use models::{
    Edge, EdgeFamilies, EdgeQuery, InsertOutcome, Node, NodeKind, NodeQuery, Span, StoreStats,
    Subgraph, DEFAULT_CONFIDENCE,
};
pub use snapshot::GraphSnapshot;
pub use surreal::SurrealStore;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{StoreBackend, StoreConfig};
use crate::error::{LensError, Result};

/// Storage contract shared by every backend.
///
/// List results are always returned in insertion order.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Short backend name for logs.
    fn backend(&self) -> &'static str;

    /// Open the backend. A no-op for in-process stores.
    async fn connect(&self) -> Result<()>;

    /// Release the backend. Safe to call repeatedly or before `connect`.
    async fn close(&self) -> Result<()>;

    /// Insert a node unless its id is already stored.
    async fn add_node(&self, node: Node) -> Result<InsertOutcome>;

    /// Insert an edge unless its id is taken or an endpoint is missing.
    async fn add_edge(&self, edge: Edge) -> Result<InsertOutcome>;

    /// Fetch a node by id.
    async fn get_node(&self, node_id: &str) -> Result<Node>;

    /// Nodes matching every populated filter.
    async fn get_nodes_by_query(&self, query: &NodeQuery) -> Result<Vec<Node>>;

    /// Edges matching every populated filter.
    async fn get_edges_by_query(&self, query: &EdgeQuery) -> Result<Vec<Edge>>;

    /// Induced subgraph over `node_ids`; unknown ids are ignored.
    async fn get_subgraph(&self, node_ids: &[String]) -> Result<Subgraph>;

    /// Node and edge counts.
    async fn stats(&self) -> Result<StoreStats>;

    /// Remove every node and edge.
    async fn clear(&self) -> Result<()>;

    /// Whether a node with this id is stored.
    async fn has_node(&self, node_id: &str) -> Result<bool> {
        match self.get_node(node_id).await {
            Ok(_) => Ok(true),
            Err(LensError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Construct the backend selected by `config`. The store is not connected yet.
pub fn open_store(config: &StoreConfig) -> Arc<dyn GraphStore> {
    match config.backend {
        StoreBackend::Embedded => Arc::new(MemoryStore::new()),
        StoreBackend::Remote => Arc::new(SurrealStore::new(config.clone())),
    }
}
