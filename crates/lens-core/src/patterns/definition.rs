//! Pattern definitions and the catalog that validates them.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::bundle::Bundle;
use crate::error::{LensError, Result};
use crate::graph::NodeKind;

/// A named slot a match binds to one node (or a set of nodes for group roles).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RoleSpec")]
pub struct Role {
    pub name: String,
    /// Allowed node kinds; empty means any kind.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kinds: Vec<NodeKind>,
}

impl Role {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kinds: Vec::new(),
        }
    }

    pub fn with_kinds(mut self, kinds: impl IntoIterator<Item = NodeKind>) -> Self {
        self.kinds = kinds.into_iter().collect();
        self
    }

    pub fn accepts(&self, kind: NodeKind) -> bool {
        self.kinds.is_empty() || self.kinds.contains(&kind)
    }
}

/// Roles are written either as a bare name or as `{name, kinds}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RoleSpec {
    Name(String),
    Full {
        name: String,
        #[serde(default)]
        kinds: Vec<NodeKind>,
    },
}

impl From<RoleSpec> for Role {
    fn from(spec: RoleSpec) -> Self {
        match spec {
            RoleSpec::Name(name) => Role::new(name),
            RoleSpec::Full { name, kinds } => Role { name, kinds },
        }
    }
}

fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(role) => vec![role],
        OneOrMany::Many(roles) => roles,
    })
}

/// `from` must reach one of the `to` roles through an edge of `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeConstraint {
    pub from: String,
    #[serde(deserialize_with = "one_or_many")]
    pub to: Vec<String>,
    pub kind: String,
    #[serde(default)]
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
    #[serde(default)]
    pub min_confidence: f64,
}

impl EdgeConstraint {
    /// The single `to` role, when there is exactly one.
    pub fn sole_target(&self) -> Option<&str> {
        match self.to.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }
}

/// `role` binds to at least `min_size` nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupConstraint {
    pub role: String,
    pub min_size: usize,
    #[serde(default)]
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
}

/// A predicate over role bindings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Constraint {
    Edge(EdgeConstraint),
    Group(GroupConstraint),
    /// Failure does not disqualify a match.
    Optional {
        constraint: Box<Constraint>,
        /// Overrides the wrapped constraint's weight when present.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        weight: Option<f64>,
    },
}

impl Constraint {
    pub fn is_optional(&self) -> bool {
        matches!(self, Self::Optional { .. })
    }

    /// The constraint with any `optional` wrapper removed.
    pub fn inner(&self) -> &Constraint {
        match self {
            Self::Optional { constraint, .. } => constraint.inner(),
            other => other,
        }
    }

    /// Weight added when satisfied.
    pub fn weight(&self) -> f64 {
        match self {
            Self::Edge(c) => c.weight,
            Self::Group(c) => c.weight,
            Self::Optional { constraint, weight } => weight.unwrap_or_else(|| constraint.weight()),
        }
    }

    /// Custom evidence text, if the definition supplies one.
    pub fn evidence(&self) -> Option<&str> {
        match self.inner() {
            Self::Edge(c) => c.evidence.as_deref(),
            Self::Group(c) => c.evidence.as_deref(),
            Self::Optional { .. } => None,
        }
    }

    /// Every role name the constraint mentions.
    pub fn roles(&self) -> Vec<&str> {
        match self.inner() {
            Self::Edge(c) => std::iter::once(c.from.as_str())
                .chain(c.to.iter().map(String::as_str))
                .collect(),
            Self::Group(c) => vec![c.role.as_str()],
            Self::Optional { .. } => Vec::new(),
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Edge(c) => {
                let target = match c.sole_target() {
                    Some(role) => role.to_string(),
                    None => format!("{{{}}}", c.to.join("|")),
                };
                write!(f, "{} --{}--> {}", c.from, c.kind, target)?;
                if c.min_confidence > 0.0 {
                    write!(f, " (confidence >= {:.2})", c.min_confidence)?;
                }
                Ok(())
            }
            Self::Group(c) => write!(f, "group {} has at least {} members", c.role, c.min_size),
            Self::Optional { constraint, .. } => constraint.fmt(f),
        }
    }
}

/// Base score for a pattern.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Scoring {
    #[serde(default)]
    pub base: f64,
}

/// A named architectural motif.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternDefinition {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub roles: Vec<Role>,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    #[serde(default)]
    pub scoring: Scoring,
}

impl PatternDefinition {
    pub fn role(&self, name: &str) -> Option<&Role> {
        self.roles.iter().find(|r| r.name == name)
    }

    /// Roles named by a group constraint (wrapped or not); they bind node sets.
    pub fn group_roles(&self) -> HashSet<&str> {
        self.constraints
            .iter()
            .filter_map(|c| match c.inner() {
                Constraint::Group(g) => Some(g.role.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Reject definitions the matcher cannot interpret.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(LensError::Config(format!("pattern '{}': {}", self.id, msg)));

        if self.id.trim().is_empty() {
            return Err(LensError::Config("pattern id must not be empty".into()));
        }
        if self.roles.is_empty() {
            return fail("declares no roles".into());
        }

        let mut declared = HashSet::new();
        for role in &self.roles {
            if !declared.insert(role.name.as_str()) {
                return fail(format!("role '{}' declared twice", role.name));
            }
        }

        for (i, constraint) in self.constraints.iter().enumerate() {
            if let Constraint::Optional { constraint: inner, .. } = constraint {
                if inner.is_optional() {
                    return fail(format!("constraint {} nests optional inside optional", i));
                }
            }
            match constraint.inner() {
                Constraint::Edge(edge) if edge.to.is_empty() => {
                    return fail(format!("constraint {} has an empty 'to' list", i));
                }
                Constraint::Edge(edge) if !(0.0..=1.0).contains(&edge.min_confidence) => {
                    return fail(format!("constraint {} min_confidence must be within [0, 1]", i));
                }
                Constraint::Group(group) if group.min_size == 0 => {
                    return fail(format!("constraint {} has min_size 0", i));
                }
                _ => {}
            }
            for role in constraint.roles() {
                if !declared.contains(role) {
                    return fail(format!("constraint {} references undeclared role '{}'", i, role));
                }
            }
        }
        Ok(())
    }
}

/// Validated set of pattern definitions with unique ids.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatternCatalog {
    patterns: Vec<PatternDefinition>,
}

impl PatternCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from already typed definitions.
    pub fn from_definitions(patterns: Vec<PatternDefinition>) -> Result<Self> {
        let mut seen = BTreeSet::new();
        for pattern in &patterns {
            pattern.validate()?;
            if !seen.insert(pattern.id.clone()) {
                return Err(LensError::Config(format!(
                    "pattern '{}' defined twice",
                    pattern.id
                )));
            }
        }
        Ok(Self { patterns })
    }

    /// Decode raw definitions, failing on the first malformed one.
    pub fn from_values(values: Vec<Value>) -> Result<Self> {
        let mut patterns = Vec::with_capacity(values.len());
        for (i, value) in values.into_iter().enumerate() {
            let id = value
                .get("id")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| LensError::Config(format!("pattern #{} has no string 'id'", i)))?;
            let pattern: PatternDefinition = serde_json::from_value(value)
                .map_err(|e| LensError::Config(format!("pattern '{}': {}", id, e)))?;
            patterns.push(pattern);
        }
        Self::from_definitions(patterns)
    }

    /// Parse a JSON catalog: a list of definitions or `{"patterns": [...]}`.
    pub fn from_json(text: &str) -> Result<Self> {
        let document: Value = serde_json::from_str(text)?;
        Self::from_document(document)
    }

    /// Parse a YAML catalog with the same layout as the JSON form.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let document: Value = serde_yaml::from_str(text)?;
        Self::from_document(document)
    }

    /// Read a catalog file, choosing the format by extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| LensError::io(path, e))?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&text),
            _ => Self::from_json(&text),
        }
    }

    pub fn from_bundle(bundle: &Bundle) -> Result<Self> {
        Self::from_values(bundle.patterns.clone())
    }

    fn from_document(document: Value) -> Result<Self> {
        match document {
            Value::Array(values) => Self::from_values(values),
            Value::Object(mut map) => match map.remove("patterns") {
                Some(Value::Array(values)) => Self::from_values(values),
                _ => Err(LensError::Config(
                    "catalog must be a list or an object with a 'patterns' list".into(),
                )),
            },
            _ => Err(LensError::Config(
                "catalog must be a list or an object with a 'patterns' list".into(),
            )),
        }
    }

    /// Add `other`'s patterns, replacing any with the same id.
    pub fn merge(&mut self, other: PatternCatalog) {
        for pattern in other.patterns {
            match self.patterns.iter_mut().find(|p| p.id == pattern.id) {
                Some(existing) => *existing = pattern,
                None => self.patterns.push(pattern),
            }
        }
    }

    pub fn patterns(&self) -> &[PatternDefinition] {
        &self.patterns
    }

    pub fn get(&self, id: &str) -> Option<&PatternDefinition> {
        self.patterns.iter().find(|p| p.id == id)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
