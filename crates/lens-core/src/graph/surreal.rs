//! SurrealDB-backed graph store.
//!
//! Connects through `surrealdb::engine::any`, so the same type serves a remote
//! server (`ws://`, `http://`), an embedded RocksDB file (`rocksdb://`) or a
//! throwaway in-memory engine (`mem://`).

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use surrealdb::engine::any::{self, Any};
use surrealdb::opt::auth::Root;
use surrealdb::Surreal;
use tracing::{debug, info};

use super::models::{
    Edge, EdgeQuery, InsertOutcome, Node, NodeKind, NodeQuery, Span, StoreStats, Subgraph,
};
use super::GraphStore;
use crate::config::StoreConfig;
use crate::error::{LensError, Result};

const NODE_FIELDS: &str = "node_id, kind, name, language, file, span_start, span_end, parent, route, seq";
const EDGE_FIELDS: &str = "edge_id, kind, src, dst, confidence, evidence, seq";

/// Node row as stored. Kind and span are flattened to plain columns.
#[derive(Debug, Serialize, Deserialize)]
struct StoredNode {
    node_id: String,
    kind: String,
    name: String,
    language: String,
    file: String,
    span_start: u64,
    span_end: u64,
    parent: Option<String>,
    route: Option<String>,
    seq: u64,
}

impl StoredNode {
    fn from_node(node: Node, seq: u64) -> Self {
        Self {
            node_id: node.node_id,
            kind: node.kind.as_str().to_string(),
            name: node.name,
            language: node.language,
            file: node.file,
            span_start: node.span.start(),
            span_end: node.span.end(),
            parent: node.parent,
            route: node.route,
            seq,
        }
    }

    fn into_node(self) -> Result<Node> {
        let kind: NodeKind = self.kind.parse().map_err(|_| {
            LensError::Database(format!(
                "stored node '{}' has unknown kind '{}'",
                self.node_id, self.kind
            ))
        })?;
        Ok(Node {
            node_id: self.node_id,
            kind,
            name: self.name,
            language: self.language,
            file: self.file,
            span: Span(self.span_start, self.span_end),
            parent: self.parent,
            route: self.route,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredEdge {
    edge_id: String,
    kind: String,
    src: String,
    dst: String,
    confidence: f64,
    evidence: Vec<String>,
    seq: u64,
}

impl StoredEdge {
    fn from_edge(edge: Edge, seq: u64) -> Self {
        Self {
            edge_id: edge.edge_id,
            kind: edge.kind,
            src: edge.src,
            dst: edge.dst,
            confidence: edge.confidence,
            evidence: edge.evidence,
            seq,
        }
    }

    fn into_edge(self) -> Edge {
        Edge {
            edge_id: self.edge_id,
            kind: self.kind,
            src: self.src,
            dst: self.dst,
            confidence: self.confidence,
            evidence: self.evidence,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SeqRow {
    seq: u64,
}

#[derive(Debug, Deserialize)]
struct CountRow {
    count: usize,
}

#[derive(Debug, Deserialize)]
struct KindCountRow {
    kind: String,
    count: usize,
}

/// Bind parameter value.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
enum BindValue {
    Text(String),
    List(Vec<String>),
    Number(f64),
}

/// WHERE clause builder collecting named binds alongside the conditions.
#[derive(Debug, Default)]
struct Filter {
    conditions: Vec<&'static str>,
    binds: Vec<(&'static str, BindValue)>,
}

impl Filter {
    fn push(&mut self, condition: &'static str, name: &'static str, value: BindValue) {
        self.conditions.push(condition);
        self.binds.push((name, value));
    }

    fn text(&mut self, condition: &'static str, name: &'static str, value: &Option<String>) {
        if let Some(v) = value {
            self.push(condition, name, BindValue::Text(v.clone()));
        }
    }

    fn where_clause(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        }
    }

    fn for_nodes(query: &NodeQuery) -> Self {
        let mut filter = Self::default();
        if let Some(kind) = query.kind {
            filter.push("kind = $kind", "kind", BindValue::Text(kind.as_str().to_string()));
        }
        if let Some(kinds) = &query.kinds {
            let kinds = kinds.iter().map(|k| k.as_str().to_string()).collect();
            filter.push("kind IN $kinds", "kinds", BindValue::List(kinds));
        }
        filter.text("file = $file", "file", &query.file);
        filter.text(
            "string::starts_with(file, $file_prefix)",
            "file_prefix",
            &query.file_prefix,
        );
        filter.text("route = $route", "route", &query.route);
        filter.text("name = $name", "name", &query.name);
        filter.text("language = $language", "language", &query.language);
        filter.text("parent = $parent", "parent", &query.parent);
        filter
    }

    fn for_edges(query: &EdgeQuery) -> Self {
        let mut filter = Self::default();
        filter.text("kind = $kind", "kind", &query.kind);
        if let Some(kinds) = &query.kinds {
            filter.push("kind IN $kinds", "kinds", BindValue::List(kinds.clone()));
        }
        filter.text("src = $src", "src", &query.src);
        filter.text("dst = $dst", "dst", &query.dst);
        filter.text(
            "(src = $touching OR dst = $touching)",
            "touching",
            &query.touching,
        );
        if let Some(min) = query.min_confidence {
            filter.push(
                "confidence >= $min_confidence",
                "min_confidence",
                BindValue::Number(min),
            );
        }
        filter
    }
}

/// Graph store persisted in SurrealDB.
///
/// Every operation before a successful [`GraphStore::connect`] fails with a
/// connection error.
pub struct SurrealStore {
    config: StoreConfig,
    db: RwLock<Option<Surreal<Any>>>,
    node_seq: AtomicU64,
    edge_seq: AtomicU64,
}

impl SurrealStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            db: RwLock::new(None),
            node_seq: AtomicU64::new(0),
            edge_seq: AtomicU64::new(0),
        }
    }

    /// Store over a private in-memory engine.
    pub fn in_memory() -> Self {
        Self::new(StoreConfig::remote("mem://"))
    }

    pub fn is_connected(&self) -> bool {
        self.db.read().is_some()
    }

    fn db(&self) -> Result<Surreal<Any>> {
        self.db.read().clone().ok_or_else(|| {
            LensError::Connection(format!("not connected to {}", self.config.endpoint))
        })
    }

    async fn open(&self) -> std::result::Result<Surreal<Any>, surrealdb::Error> {
        let db = any::connect(self.config.endpoint.as_str()).await?;

        if let (Some(username), Some(password)) = (&self.config.username, &self.config.password)
        {
            db.signin(Root {
                username: username.as_str(),
                password: password.as_str(),
            })
            .await?;
        }

        db.use_ns(self.config.namespace.as_str())
            .use_db(self.config.database.as_str())
            .await?;

        Ok(db)
    }

    async fn initialize_schema(db: &Surreal<Any>) -> Result<()> {
        db.query(
            r#"
            DEFINE TABLE IF NOT EXISTS lens_node SCHEMALESS;
            DEFINE INDEX IF NOT EXISTS lens_node_id ON lens_node FIELDS node_id UNIQUE;
            DEFINE INDEX IF NOT EXISTS lens_node_kind ON lens_node FIELDS kind;
            DEFINE INDEX IF NOT EXISTS lens_node_file ON lens_node FIELDS file;
            DEFINE INDEX IF NOT EXISTS lens_node_seq ON lens_node FIELDS seq;

            DEFINE TABLE IF NOT EXISTS lens_edge SCHEMALESS;
            DEFINE INDEX IF NOT EXISTS lens_edge_id ON lens_edge FIELDS edge_id UNIQUE;
            DEFINE INDEX IF NOT EXISTS lens_edge_src ON lens_edge FIELDS src;
            DEFINE INDEX IF NOT EXISTS lens_edge_dst ON lens_edge FIELDS dst;
            DEFINE INDEX IF NOT EXISTS lens_edge_seq ON lens_edge FIELDS seq;
            "#,
        )
        .await?
        .check()?;
        Ok(())
    }

    /// Continue insertion counters after the highest stored `seq`.
    async fn restore_sequences(&self, db: &Surreal<Any>) -> Result<()> {
        let mut response = db
            .query("SELECT seq FROM lens_node ORDER BY seq DESC LIMIT 1")
            .query("SELECT seq FROM lens_edge ORDER BY seq DESC LIMIT 1")
            .await?;
        let last_node: Option<SeqRow> = response.take(0)?;
        let last_edge: Option<SeqRow> = response.take(1)?;

        self.node_seq
            .store(last_node.map_or(0, |r| r.seq + 1), Ordering::SeqCst);
        self.edge_seq
            .store(last_edge.map_or(0, |r| r.seq + 1), Ordering::SeqCst);
        Ok(())
    }

    async fn node_exists(db: &Surreal<Any>, node_id: &str) -> Result<bool> {
        let found: Option<String> = db
            .query("SELECT VALUE node_id FROM lens_node WHERE node_id = $id LIMIT 1")
            .bind(("id", node_id.to_string()))
            .await?
            .take(0)?;
        Ok(found.is_some())
    }

    async fn select_nodes(&self, sql: String, filter: Filter) -> Result<Vec<Node>> {
        let db = self.db()?;
        let mut query = db.query(sql);
        for (name, value) in filter.binds {
            query = query.bind((name, value));
        }
        let rows: Vec<StoredNode> = query.await?.take(0)?;
        rows.into_iter().map(StoredNode::into_node).collect()
    }

    async fn select_edges(&self, sql: String, filter: Filter) -> Result<Vec<Edge>> {
        let db = self.db()?;
        let mut query = db.query(sql);
        for (name, value) in filter.binds {
            query = query.bind((name, value));
        }
        let rows: Vec<StoredEdge> = query.await?.take(0)?;
        Ok(rows.into_iter().map(StoredEdge::into_edge).collect())
    }
}

#[async_trait]
impl GraphStore for SurrealStore {
    fn backend(&self) -> &'static str {
        "surrealdb"
    }

    async fn connect(&self) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }

        let endpoint = &self.config.endpoint;
        let db = match tokio::time::timeout(self.config.connect_timeout(), self.open()).await {
            Ok(Ok(db)) => db,
            Ok(Err(e)) => {
                return Err(LensError::Connection(format!("{}: {}", endpoint, e)));
            }
            Err(_) => {
                return Err(LensError::Connection(format!(
                    "timed out after {}ms connecting to {}",
                    self.config.connect_timeout_ms, endpoint
                )));
            }
        };

        Self::initialize_schema(&db).await?;
        self.restore_sequences(&db).await?;
        *self.db.write() = Some(db);

        info!(
            endpoint = %endpoint,
            namespace = %self.config.namespace,
            database = %self.config.database,
            "Connected to SurrealDB"
        );
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if self.db.write().take().is_some() {
            info!(endpoint = %self.config.endpoint, "Closed SurrealDB connection");
        }
        Ok(())
    }

    async fn add_node(&self, node: Node) -> Result<InsertOutcome> {
        let db = self.db()?;
        if Self::node_exists(&db, &node.node_id).await? {
            debug!(node_id = %node.node_id, "Node already stored");
            return Ok(InsertOutcome::DuplicateId);
        }

        let seq = self.node_seq.fetch_add(1, Ordering::SeqCst);
        db.query("CREATE lens_node CONTENT $record")
            .bind(("record", StoredNode::from_node(node, seq)))
            .await?
            .check()?;
        Ok(InsertOutcome::Inserted)
    }

    async fn add_edge(&self, edge: Edge) -> Result<InsertOutcome> {
        let db = self.db()?;

        let taken: Option<String> = db
            .query("SELECT VALUE edge_id FROM lens_edge WHERE edge_id = $id LIMIT 1")
            .bind(("id", edge.edge_id.clone()))
            .await?
            .take(0)?;
        if taken.is_some() {
            return Ok(InsertOutcome::DuplicateId);
        }

        if !Self::node_exists(&db, &edge.src).await? || !Self::node_exists(&db, &edge.dst).await? {
            return Ok(InsertOutcome::MissingEndpoint);
        }

        let seq = self.edge_seq.fetch_add(1, Ordering::SeqCst);
        db.query("CREATE lens_edge CONTENT $record")
            .bind(("record", StoredEdge::from_edge(edge, seq)))
            .await?
            .check()?;
        Ok(InsertOutcome::Inserted)
    }

    async fn get_node(&self, node_id: &str) -> Result<Node> {
        let db = self.db()?;
        let row: Option<StoredNode> = db
            .query(format!(
                "SELECT {NODE_FIELDS} FROM lens_node WHERE node_id = $id LIMIT 1"
            ))
            .bind(("id", node_id.to_string()))
            .await?
            .take(0)?;
        row.ok_or_else(|| LensError::node_not_found(node_id))?
            .into_node()
    }

    async fn get_nodes_by_query(&self, query: &NodeQuery) -> Result<Vec<Node>> {
        let pattern = query.compiled_pattern()?;
        let filter = Filter::for_nodes(query);
        let sql = format!(
            "SELECT {NODE_FIELDS} FROM lens_node{} ORDER BY seq ASC",
            filter.where_clause()
        );
        let nodes = self.select_nodes(sql, filter).await?;

        // Regex filtering happens client-side.
        Ok(match pattern {
            Some(re) => nodes.into_iter().filter(|n| re.is_match(&n.name)).collect(),
            None => nodes,
        })
    }

    async fn get_edges_by_query(&self, query: &EdgeQuery) -> Result<Vec<Edge>> {
        let filter = Filter::for_edges(query);
        let sql = format!(
            "SELECT {EDGE_FIELDS} FROM lens_edge{} ORDER BY seq ASC",
            filter.where_clause()
        );
        self.select_edges(sql, filter).await
    }

    async fn get_subgraph(&self, node_ids: &[String]) -> Result<Subgraph> {
        let mut nodes_filter = Filter::default();
        nodes_filter.push("node_id IN $ids", "ids", BindValue::List(node_ids.to_vec()));
        let nodes = self
            .select_nodes(
                format!(
                    "SELECT {NODE_FIELDS} FROM lens_node{} ORDER BY seq ASC",
                    nodes_filter.where_clause()
                ),
                nodes_filter,
            )
            .await?;

        let present: Vec<String> = nodes.iter().map(|n| n.node_id.clone()).collect();
        let mut edges_filter = Filter::default();
        edges_filter.push("src IN $ids", "ids", BindValue::List(present));
        edges_filter.conditions.push("dst IN $ids");
        let edges = self
            .select_edges(
                format!(
                    "SELECT {EDGE_FIELDS} FROM lens_edge{} ORDER BY seq ASC",
                    edges_filter.where_clause()
                ),
                edges_filter,
            )
            .await?;

        Ok(Subgraph { nodes, edges })
    }

    async fn stats(&self) -> Result<StoreStats> {
        let db = self.db()?;
        let mut response = db
            .query("SELECT count() AS count FROM lens_node GROUP ALL")
            .query("SELECT count() AS count FROM lens_edge GROUP ALL")
            .query("SELECT kind, count() AS count FROM lens_node GROUP BY kind")
            .query("SELECT kind, count() AS count FROM lens_edge GROUP BY kind")
            .await?;

        let nodes: Option<CountRow> = response.take(0)?;
        let edges: Option<CountRow> = response.take(1)?;
        let node_kinds: Vec<KindCountRow> = response.take(2)?;
        let edge_kinds: Vec<KindCountRow> = response.take(3)?;

        let by_kind = |rows: Vec<KindCountRow>| -> BTreeMap<String, usize> {
            rows.into_iter().map(|r| (r.kind, r.count)).collect()
        };

        Ok(StoreStats {
            node_count: nodes.map_or(0, |c| c.count),
            edge_count: edges.map_or(0, |c| c.count),
            nodes_by_kind: by_kind(node_kinds),
            edges_by_kind: by_kind(edge_kinds),
        })
    }

    async fn clear(&self) -> Result<()> {
        let db = self.db()?;
        db.query("DELETE lens_edge; DELETE lens_node;").await?.check()?;
        self.node_seq.store(0, Ordering::SeqCst);
        self.edge_seq.store(0, Ordering::SeqCst);
        debug!(endpoint = %self.config.endpoint, "Cleared graph tables");
        Ok(())
    }
}
