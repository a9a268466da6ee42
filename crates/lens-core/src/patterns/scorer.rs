//! Confidence scoring and explanations for pattern matches.

use serde::Serialize;

use super::definition::{Constraint, PatternDefinition};
use super::{Binding, RoleBindings};

/// Outcome of evaluating one constraint against a binding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConstraintResult {
    pub constraint: Constraint,
    pub satisfied: bool,
    /// Weight contributed when satisfied.
    pub weight: f64,
    /// Evidence line for a satisfied constraint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
    pub optional: bool,
}

impl ConstraintResult {
    /// Result for `constraint`; `detail` describes what satisfied it.
    ///
    /// A custom evidence string on the definition takes precedence over `detail`.
    pub fn new(constraint: &Constraint, satisfied: bool, detail: Option<String>) -> Self {
        let evidence = if satisfied {
            constraint
                .evidence()
                .map(str::to_string)
                .or(detail)
                .or_else(|| Some(constraint.to_string()))
        } else {
            None
        };
        Self {
            constraint: constraint.clone(),
            satisfied,
            weight: constraint.weight(),
            evidence,
            optional: constraint.is_optional(),
        }
    }

    /// Weight actually added to the score.
    pub fn contribution(&self) -> f64 {
        if self.satisfied {
            self.weight
        } else {
            0.0
        }
    }
}

/// Scored match data.
#[derive(Debug, Clone, PartialEq)]
pub struct Score {
    pub confidence: f64,
    pub evidence: Vec<String>,
    pub explain: String,
}

const LABEL_WIDTH: usize = 48;

/// `confidence = clamp(base + sum of satisfied weights, 0, 1)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scorer;

impl Scorer {
    pub fn confidence(base: f64, results: &[ConstraintResult]) -> f64 {
        let raw = base + results.iter().map(ConstraintResult::contribution).sum::<f64>();
        raw.clamp(0.0, 1.0)
    }

    pub fn score(
        &self,
        pattern: &PatternDefinition,
        bindings: &RoleBindings,
        results: &[ConstraintResult],
    ) -> Score {
        let base = pattern.scoring.base;
        let evidence = results
            .iter()
            .filter(|r| r.satisfied)
            .filter_map(|r| r.evidence.clone())
            .collect();

        Score {
            confidence: Self::confidence(base, results),
            evidence,
            explain: Self::explain(pattern, bindings, results),
        }
    }

    /// Multi-section report. Identical inputs give byte-identical text.
    pub fn explain(
        pattern: &PatternDefinition,
        bindings: &RoleBindings,
        results: &[ConstraintResult],
    ) -> String {
        let mut lines = Vec::with_capacity(results.len() * 2 + bindings.len() + 6);

        lines.push(match &pattern.name {
            Some(name) => format!("Pattern: {} ({})", pattern.id, name),
            None => format!("Pattern: {}", pattern.id),
        });

        lines.push("Bindings:".to_string());
        for (role, binding) in bindings {
            lines.push(match binding {
                Binding::Single(node) => format!("  {} = {}", role, node),
                Binding::Group(nodes) => format!("  {} = {{{}}}", role, nodes.join(", ")),
            });
        }

        lines.push("Constraints:".to_string());
        for result in results {
            let status = if result.satisfied { "[PASS]" } else { "[FAIL]" };
            let label = if result.optional {
                format!("{} (optional) {}", status, result.constraint)
            } else {
                format!("{} {}", status, result.constraint)
            };
            lines.push(format!(
                "  {:<width$} weight {:+.2}",
                label,
                result.contribution(),
                width = LABEL_WIDTH
            ));
        }

        lines.push("Score:".to_string());
        let mut running = pattern.scoring.base;
        lines.push(format!("  {:<width$} {:.2}", "base", running, width = LABEL_WIDTH));
        for result in results.iter().filter(|r| r.satisfied) {
            running += result.weight;
            let label = format!("+ {}", result.constraint);
            lines.push(format!("  {:<width$} {:.2}", label, running, width = LABEL_WIDTH));
        }
        lines.push(format!(
            "  {:<width$} {:.2}",
            "total (clamped)",
            running.clamp(0.0, 1.0),
            width = LABEL_WIDTH
        ));

        lines.join("\n")
    }
}
