//! Store + projection + cache + layout + formatter.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::cache::{CacheStats, ViewCache};
use super::{PatternOverlay, ProjectionEngine, ViewConfig, ViewType};
use crate::bundle::{Bundle, BundleLoader, LoadSummary};
use crate::config::{LensConfig, MatchingConfig};
use crate::error::Result;
use crate::graph::{Edge, EdgeFamilies, GraphStore, Node};
use crate::patterns::{PatternCatalog, PatternMatch, PatternMatcher};

/// 2D node position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Assigns positions to projected nodes.
pub trait Layout: Send + Sync {
    fn layout(&self, nodes: &[Node], edges: &[Edge]) -> BTreeMap<String, Position>;
}

/// Turns a positioned projection into render elements.
///
/// An element that cannot be encoded fails the whole view.
pub trait Formatter: Send + Sync {
    fn format(
        &self,
        nodes: &[Node],
        edges: &[Edge],
        positions: &BTreeMap<String, Position>,
        patterns: Option<&[PatternOverlay]>,
    ) -> Result<Vec<Value>>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub layout_time_ms: u64,
    /// Served from the view cache.
    pub cached: bool,
}

/// A computed view, ready for a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewResponse {
    pub elements: Vec<Value>,
    pub positions: BTreeMap<String, Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patterns: Option<Vec<PatternOverlay>>,
    pub stats: ViewStats,
}

/// Entry point used by the CLI and HTTP transport.
pub struct ViewService {
    store: Arc<dyn GraphStore>,
    loader: BundleLoader,
    families: EdgeFamilies,
    matching: MatchingConfig,
    catalog: RwLock<Arc<PatternCatalog>>,
    cache: Mutex<ViewCache<ViewResponse>>,
    layout: Arc<dyn Layout>,
    formatter: Arc<dyn Formatter>,
}

impl ViewService {
    pub fn new(
        store: Arc<dyn GraphStore>,
        config: &LensConfig,
        layout: Arc<dyn Layout>,
        formatter: Arc<dyn Formatter>,
    ) -> Self {
        Self {
            loader: BundleLoader::new(store.clone()),
            store,
            families: config.graph.edge_families(),
            matching: config.matching.clone(),
            catalog: RwLock::new(Arc::new(PatternCatalog::new())),
            cache: Mutex::new(ViewCache::from_config(&config.cache)),
            layout,
            formatter,
        }
    }

    /// Replace the pattern catalog. Cached views are dropped.
    pub fn with_catalog(self, catalog: PatternCatalog) -> Self {
        *self.catalog.write() = Arc::new(catalog);
        self.cache.lock().clear();
        self
    }

    pub fn store(&self) -> &Arc<dyn GraphStore> {
        &self.store
    }

    pub fn catalog(&self) -> Arc<PatternCatalog> {
        self.catalog.read().clone()
    }

    fn matcher(&self) -> PatternMatcher {
        PatternMatcher::with_config(self.catalog(), &self.matching)
    }

    pub fn projection(&self) -> ProjectionEngine {
        ProjectionEngine::new(self.store.clone(), self.families.clone(), self.matcher())
    }

    pub fn view_types(&self) -> &'static [ViewType] {
        &ViewType::ALL
    }

    /// Project, lay out and format a view, serving repeats from the cache.
    pub async fn compute_view(&self, config: &ViewConfig) -> Result<ViewResponse> {
        config.validate()?;
        let fingerprint = config.fingerprint()?;
        let key = fingerprint.digest();

        if let Some(mut hit) = self.cache.lock().get(key) {
            debug!(view = %config.view_type, key, "View cache hit");
            hit.stats.cached = true;
            return Ok(hit);
        }
        debug!(view = %config.view_type, config = fingerprint.canonical(), "View cache miss");

        let projection = self.projection().project(config).await?;

        let started = Instant::now();
        let positions = self.layout.layout(&projection.nodes, &projection.edges);
        let layout_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let elements = self.formatter.format(
            &projection.nodes,
            &projection.edges,
            &positions,
            projection.patterns.as_deref(),
        )?;

        let response = ViewResponse {
            elements,
            positions,
            stats: ViewStats {
                node_count: projection.nodes.len(),
                edge_count: projection.edges.len(),
                layout_time_ms,
                cached: false,
            },
            patterns: projection.patterns,
        };

        self.cache.lock().set(key, response.clone(), None);
        Ok(response)
    }

    /// Positions for an arbitrary node and edge list.
    pub fn layout(&self, nodes: &[Node], edges: &[Edge]) -> BTreeMap<String, Position> {
        self.layout.layout(nodes, edges)
    }

    /// Ingest a bundle, merge its patterns into the catalog and drop cached views.
    pub async fn load_bundle(&self, bundle: &Bundle) -> Result<LoadSummary> {
        let bundled = PatternCatalog::from_bundle(bundle)?;
        let summary = self.loader.load(bundle).await?;

        if !bundled.is_empty() {
            let mut catalog = self.catalog.write();
            let mut merged = (**catalog).clone();
            merged.merge(bundled);
            info!(patterns = merged.len(), "Pattern catalog updated from bundle");
            *catalog = Arc::new(merged);
        }

        self.cache.lock().clear();
        Ok(summary)
    }

    /// Read, validate and load a bundle file.
    pub async fn load_bundle_file(&self, path: impl AsRef<Path>) -> Result<LoadSummary> {
        let bundle = self.loader.read_file(path).await?;
        self.load_bundle(&bundle).await
    }

    /// Run the catalog against the whole store.
    pub async fn detect_patterns(&self) -> Result<Vec<PatternMatch>> {
        self.matcher().detect(self.store.as_ref()).await
    }

    /// Run the catalog against the subgraph induced by `node_ids`.
    pub async fn detect_patterns_within(&self, node_ids: &[String]) -> Result<Vec<PatternMatch>> {
        self.matcher()
            .detect_within(self.store.as_ref(), node_ids)
            .await
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.lock().stats()
    }

    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }
}
