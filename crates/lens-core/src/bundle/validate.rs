//! Bundle shape validation.

use serde_json::{Map, Value};

use super::{ValidationIssue, ValidationReport};
use crate::graph::NodeKind;

/// Decides whether a parsed document has bundle shape.
///
/// Implementations only judge structure; referential integrity is enforced
/// by the loader regardless of the verdict.
pub trait BundleValidator: Send + Sync {
    fn validate(&self, document: &Value) -> ValidationReport;
}

/// Structural checks for the bundle format.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaValidator;

impl BundleValidator for SchemaValidator {
    fn validate(&self, document: &Value) -> ValidationReport {
        let mut issues = Vec::new();

        let Some(root) = document.as_object() else {
            issues.push(ValidationIssue::new("", "bundle must be a JSON object"));
            return ValidationReport::from_issues(issues);
        };

        match root.get("version") {
            Some(Value::String(_)) => {}
            Some(_) => issues.push(ValidationIssue::new("/version", "must be a string")),
            None => issues.push(ValidationIssue::new("/version", "is required")),
        }
        if let Some(generated) = root.get("generated_at") {
            if !generated.is_string() && !generated.is_null() {
                issues.push(ValidationIssue::new("/generated_at", "must be a string"));
            }
        }

        match root.get("nodes") {
            Some(Value::Array(nodes)) => {
                for (i, node) in nodes.iter().enumerate() {
                    check_node(&format!("/nodes/{}", i), node, &mut issues);
                }
            }
            Some(_) => issues.push(ValidationIssue::new("/nodes", "must be an array")),
            None => issues.push(ValidationIssue::new("/nodes", "is required")),
        }

        match root.get("edges") {
            Some(Value::Array(edges)) => {
                for (i, edge) in edges.iter().enumerate() {
                    check_edge(&format!("/edges/{}", i), edge, &mut issues);
                }
            }
            Some(_) => issues.push(ValidationIssue::new("/edges", "must be an array")),
            None => issues.push(ValidationIssue::new("/edges", "is required")),
        }

        for optional in ["annotations", "patterns"] {
            if root.get(optional).is_some_and(|v| !v.is_array()) {
                issues.push(ValidationIssue::new(format!("/{}", optional), "must be an array"));
            }
        }

        ValidationReport::from_issues(issues)
    }
}

fn require_string(
    obj: &Map<String, Value>,
    path: &str,
    field: &str,
    issues: &mut Vec<ValidationIssue>,
) {
    let location = format!("{}/{}", path, field);
    match obj.get(field) {
        Some(Value::String(_)) => {}
        Some(_) => issues.push(ValidationIssue::new(location, "must be a string")),
        None => issues.push(ValidationIssue::new(location, "is required")),
    }
}

fn optional_string(
    obj: &Map<String, Value>,
    path: &str,
    field: &str,
    nullable: bool,
    issues: &mut Vec<ValidationIssue>,
) {
    if let Some(value) = obj.get(field) {
        if !value.is_string() && !(nullable && value.is_null()) {
            issues.push(ValidationIssue::new(format!("{}/{}", path, field), "must be a string"));
        }
    }
}

fn check_node(path: &str, node: &Value, issues: &mut Vec<ValidationIssue>) {
    let Some(obj) = node.as_object() else {
        issues.push(ValidationIssue::new(path, "node must be an object"));
        return;
    };

    require_string(obj, path, "node_id", issues);
    require_string(obj, path, "name", issues);
    for field in ["language", "file"] {
        optional_string(obj, path, field, false, issues);
    }
    for field in ["parent", "route"] {
        optional_string(obj, path, field, true, issues);
    }

    match obj.get("kind") {
        Some(Value::String(kind)) => {
            if kind.parse::<NodeKind>().is_err() {
                let allowed: Vec<&str> = NodeKind::ALL.iter().map(NodeKind::as_str).collect();
                issues.push(ValidationIssue::new(
                    format!("{}/kind", path),
                    format!("unknown kind '{}', expected one of {}", kind, allowed.join(", ")),
                ));
            }
        }
        Some(_) => issues.push(ValidationIssue::new(format!("{}/kind", path), "must be a string")),
        None => issues.push(ValidationIssue::new(format!("{}/kind", path), "is required")),
    }

    if let Some(span) = obj.get("span") {
        let well_formed = span
            .as_array()
            .is_some_and(|pair| pair.len() == 2 && pair.iter().all(|v| v.as_u64().is_some()));
        if !well_formed {
            issues.push(ValidationIssue::new(
                format!("{}/span", path),
                "must be [start, end] with non-negative integers",
            ));
        }
    }
}

fn check_edge(path: &str, edge: &Value, issues: &mut Vec<ValidationIssue>) {
    let Some(obj) = edge.as_object() else {
        issues.push(ValidationIssue::new(path, "edge must be an object"));
        return;
    };

    for field in ["edge_id", "kind", "src", "dst"] {
        require_string(obj, path, field, issues);
    }

    if let Some(confidence) = obj.get("confidence") {
        match confidence.as_f64() {
            Some(c) if (0.0..=1.0).contains(&c) => {}
            Some(_) => issues.push(ValidationIssue::new(
                format!("{}/confidence", path),
                "must be within [0, 1]",
            )),
            None => issues.push(ValidationIssue::new(
                format!("{}/confidence", path),
                "must be a number",
            )),
        }
    }

    if let Some(evidence) = obj.get("evidence") {
        let strings = evidence
            .as_array()
            .is_some_and(|tags| tags.iter().all(Value::is_string));
        if !strings {
            issues.push(ValidationIssue::new(
                format!("{}/evidence", path),
                "must be an array of strings",
            ));
        }
    }
}
