//! Default layout and render-element formatter.
//!
//! Converts projected nodes and edges to the element format expected by
//! Sigma.js/Graphology.

use std::collections::{BTreeMap, HashMap};
use std::f64::consts::TAU;

use serde_json::Value;

use lens_core::projection::{Formatter, Layout, PatternOverlay, Position};
use lens_core::{Edge, Node, NodeKind, Result};

use super::models::{EdgeAttributes, GraphEdge, GraphNode, NodeAttributes};

// =============================================================================
// Node Styling
// =============================================================================

/// Hex color per node kind.
fn kind_color(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Function | NodeKind::Method => "#0969da",  // Blue
        NodeKind::Class => "#1a7f37",                         // Green
        NodeKind::Interface | NodeKind::Trait => "#9a6700",   // Yellow/Orange
        NodeKind::Module => "#8250df",                        // Purple
        NodeKind::Field | NodeKind::Property => "#57606a",    // Gray
    }
}

fn kind_size(kind: NodeKind) -> u32 {
    match kind {
        NodeKind::Module => 14,
        NodeKind::Class | NodeKind::Interface | NodeKind::Trait => 12,
        NodeKind::Function | NodeKind::Method => 8,
        NodeKind::Field | NodeKind::Property => 6,
    }
}

// =============================================================================
// Circle Layout
// =============================================================================

/// Places nodes on a circle in the order given.
#[derive(Debug, Clone, Copy)]
pub struct CircleLayout {
    /// Arc length between neighbours.
    pub spacing: f64,
    pub min_radius: f64,
}

impl Default for CircleLayout {
    fn default() -> Self {
        Self {
            spacing: 40.0,
            min_radius: 100.0,
        }
    }
}

impl Layout for CircleLayout {
    fn layout(&self, nodes: &[Node], _edges: &[Edge]) -> BTreeMap<String, Position> {
        if let [only] = nodes {
            return BTreeMap::from([(only.node_id.clone(), Position::new(0.0, 0.0))]);
        }

        let count = nodes.len() as f64;
        let radius = (self.spacing * count / TAU).max(self.min_radius);
        nodes
            .iter()
            .enumerate()
            .map(|(i, node)| {
                let angle = TAU * i as f64 / count;
                let position = Position::new(round(radius * angle.cos()), round(radius * angle.sin()));
                (node.node_id.clone(), position)
            })
            .collect()
    }
}

/// Two decimals, so repeated layouts serialize identically.
fn round(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// =============================================================================
// Sigma Formatter
// =============================================================================

/// Emits Graphology node and edge entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct SigmaFormatter;

impl Formatter for SigmaFormatter {
    fn format(
        &self,
        nodes: &[Node],
        edges: &[Edge],
        positions: &BTreeMap<String, Position>,
        patterns: Option<&[PatternOverlay]>,
    ) -> Result<Vec<Value>> {
        let mut memberships: HashMap<&str, Vec<String>> = HashMap::new();
        for overlay in patterns.unwrap_or_default() {
            for node_id in &overlay.node_ids {
                memberships
                    .entry(node_id.as_str())
                    .or_default()
                    .push(overlay.match_id.clone());
            }
        }

        let node_elements = nodes.iter().map(|node| {
            let position = positions
                .get(&node.node_id)
                .copied()
                .unwrap_or(Position::new(0.0, 0.0));
            let element = GraphNode {
                key: node.node_id.clone(),
                attributes: NodeAttributes {
                    label: node.name.clone(),
                    category: node.kind.to_string(),
                    color: kind_color(node.kind).to_string(),
                    size: kind_size(node.kind),
                    x: position.x,
                    y: position.y,
                    file: (!node.file.is_empty()).then(|| node.file.clone()),
                    patterns: memberships.remove(node.node_id.as_str()).unwrap_or_default(),
                },
            };
            serde_json::to_value(element)
        });

        let edge_elements = edges.iter().map(|edge| {
            serde_json::to_value(GraphEdge {
                key: edge.edge_id.clone(),
                source: edge.src.clone(),
                target: edge.dst.clone(),
                attributes: EdgeAttributes {
                    relationship: edge.kind.clone(),
                    confidence: edge.confidence,
                    size: 1.0 + 2.0 * edge.confidence,
                },
            })
        });

        let elements = node_elements
            .chain(edge_elements)
            .collect::<serde_json::Result<Vec<Value>>>()?;
        Ok(elements)
    }
}
