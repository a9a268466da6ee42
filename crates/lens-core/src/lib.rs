pub mod bundle;
pub mod config;
pub mod error;
pub mod graph;
pub mod patterns;
pub mod projection;
pub mod query;

pub use bundle::{Bundle, BundleLoader, LoadSummary};
pub use config::LensConfig;
pub use error::{ErrorCode, LensError, Result};
pub use graph::{open_store, Edge, GraphStore, Node, NodeKind};
pub use patterns::{PatternCatalog, PatternMatch, PatternMatcher};
pub use projection::{ProjectionEngine, ViewConfig, ViewService, ViewType};
pub use query::{Direction, QueryEngine};
