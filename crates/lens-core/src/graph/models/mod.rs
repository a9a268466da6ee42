//! Data models for the graph store.

mod edge;
mod node;
mod query;

pub use edge::{Edge, EdgeFamilies, DEFAULT_CONFIDENCE};
pub use node::{Node, NodeKind, Span};
pub use query::{EdgeQuery, InsertOutcome, NodeQuery, StoreStats, Subgraph};
