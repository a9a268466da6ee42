//! API request/response models for the view server.
//!
//! These are Data Transfer Objects (DTOs) that define the shape of
//! JSON bodies exchanged with the frontend.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use lens_core::patterns::PatternMatch;
use lens_core::projection::{CacheStats, Position};
use lens_core::{Edge, Node, ViewType};

// =============================================================================
// Sigma.js / Graphology elements
// =============================================================================

/// A node element.
#[derive(Debug, Serialize)]
pub struct GraphNode {
    pub key: String,
    pub attributes: NodeAttributes,
}

/// Node attributes for rendering and display.
#[derive(Debug, Serialize)]
pub struct NodeAttributes {
    pub label: String,
    /// Node kind. Not Sigma's render type.
    pub category: String,
    pub color: String,
    pub size: u32,
    pub x: f64,
    pub y: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Ids of pattern matches this node takes part in.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub patterns: Vec<String>,
}

/// An edge element.
#[derive(Debug, Serialize)]
pub struct GraphEdge {
    pub key: String,
    pub source: String,
    pub target: String,
    pub attributes: EdgeAttributes,
}

/// Edge attributes for rendering.
///
/// "relationship" rather than "type", which Sigma reserves for edge programs.
#[derive(Debug, Serialize)]
pub struct EdgeAttributes {
    pub relationship: String,
    pub confidence: f64,
    pub size: f64,
}

// =============================================================================
// Endpoints
// =============================================================================

/// Entry of `GET /api/views`.
#[derive(Debug, Serialize)]
pub struct ViewTypeInfo {
    pub id: ViewType,
    pub description: &'static str,
}

/// Body of `POST /api/layout`.
#[derive(Debug, Deserialize)]
pub struct LayoutRequest {
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

#[derive(Debug, Serialize)]
pub struct LayoutResponse {
    pub positions: BTreeMap<String, Position>,
}

/// Body of `POST /api/patterns`. Without `node_ids` the whole store is searched.
#[derive(Debug, Default, Deserialize)]
pub struct PatternsRequest {
    #[serde(default)]
    pub node_ids: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct PatternsResponse {
    pub count: usize,
    pub matches: Vec<PatternMatch>,
}

/// `GET /api/health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub backend: &'static str,
    pub node_count: usize,
    pub edge_count: usize,
    pub patterns: usize,
    pub cache: CacheStats,
}

/// Error body; `code` is the stable error code.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}
