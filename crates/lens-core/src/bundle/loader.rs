//! Bundle ingestion.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use super::{Bundle, BundleValidator, SchemaValidator};
use crate::error::{LensError, Result};
use crate::graph::{GraphStore, InsertOutcome};

/// Counts reported after a load.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadSummary {
    pub nodes_loaded: usize,
    pub nodes_skipped: usize,
    pub edges_loaded: usize,
    pub edges_skipped: usize,
    pub loaded_at: DateTime<Utc>,
}

/// Parses, validates and ingests bundles into a store.
pub struct BundleLoader {
    store: Arc<dyn GraphStore>,
    validator: Arc<dyn BundleValidator>,
}

impl BundleLoader {
    /// Loader using [`SchemaValidator`].
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self::with_validator(store, Arc::new(SchemaValidator))
    }

    pub fn with_validator(store: Arc<dyn GraphStore>, validator: Arc<dyn BundleValidator>) -> Self {
        Self { store, validator }
    }

    /// Parse JSON text, validate it and decode it.
    pub fn parse_str(&self, text: &str) -> Result<Bundle> {
        let document: Value =
            serde_json::from_str(text).map_err(|e| LensError::Parse(format!("bundle JSON: {}", e)))?;
        self.decode(document)
    }

    /// Validate an already parsed document and decode it.
    pub fn decode(&self, document: Value) -> Result<Bundle> {
        let report = self.validator.validate(&document);
        if !report.valid {
            return Err(LensError::Validation(report.errors));
        }
        serde_json::from_value(document).map_err(|e| LensError::Parse(format!("bundle: {}", e)))
    }

    /// Read and parse a bundle file.
    pub async fn read_file(&self, path: impl AsRef<Path>) -> Result<Bundle> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| LensError::io(path, e))?;
        self.parse_str(&text)
    }

    pub async fn load_str(&self, text: &str) -> Result<LoadSummary> {
        let bundle = self.parse_str(text)?;
        self.load(&bundle).await
    }

    pub async fn load_file(&self, path: impl AsRef<Path>) -> Result<LoadSummary> {
        let bundle = self.read_file(path).await?;
        self.load(&bundle).await
    }

    /// Insert nodes, then edges, in bundle order.
    ///
    /// Duplicate ids and edges with a missing endpoint are skipped and counted.
    pub async fn load(&self, bundle: &Bundle) -> Result<LoadSummary> {
        let mut nodes_loaded = 0;
        let mut nodes_skipped = 0;
        for node in &bundle.nodes {
            match self.store.add_node(node.clone()).await? {
                InsertOutcome::Inserted => nodes_loaded += 1,
                outcome => {
                    debug!(node_id = %node.node_id, ?outcome, "Skipped node");
                    nodes_skipped += 1;
                }
            }
        }

        let mut edges_loaded = 0;
        let mut edges_skipped = 0;
        for edge in &bundle.edges {
            match self.store.add_edge(edge.clone()).await? {
                InsertOutcome::Inserted => edges_loaded += 1,
                outcome => {
                    debug!(
                        edge_id = %edge.edge_id,
                        src = %edge.src,
                        dst = %edge.dst,
                        ?outcome,
                        "Skipped edge"
                    );
                    edges_skipped += 1;
                }
            }
        }

        let summary = LoadSummary {
            nodes_loaded,
            nodes_skipped,
            edges_loaded,
            edges_skipped,
            loaded_at: Utc::now(),
        };
        info!(
            backend = self.store.backend(),
            version = %bundle.version,
            nodes_loaded,
            nodes_skipped,
            edges_loaded,
            edges_skipped,
            "Loaded bundle"
        );
        Ok(summary)
    }
}
