// SPDX-License-Identifier: PMPL-1.0-or-later

//! Per-target outcomes of a fanned-out command and their display form

use crate::types::{ScopeKind, Target};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum TargetResult {
    Succeeded(Vec<String>),
    /// Clean exit with nothing listed; counts as a success
    NoResults,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetOutcome {
    pub target: Target,
    pub result: TargetResult,
}

impl TargetOutcome {
    pub fn succeeded(&self) -> bool {
        !matches!(self.result, TargetResult::Failed(_))
    }
}

/// Output of one command across every target in scope, in target order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregatedOutput {
    pub kind: ScopeKind,
    pub outcomes: Vec<TargetOutcome>,
}

impl AggregatedOutput {
    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded()).count()
    }

    pub fn failures(&self) -> Vec<(&Target, &str)> {
        self.outcomes
            .iter()
            .filter_map(|o| match &o.result {
                TargetResult::Failed(reason) => Some((&o.target, reason.as_str())),
                _ => None,
            })
            .collect()
    }

    /// Output lines with target provenance.
    ///
    /// Organization scope prefixes each line with `<tag><delimiter>`; a single
    /// project's lines pass through untouched.
    pub fn raw_lines(&self, delimiter: &str) -> Vec<String> {
        let mut lines = Vec::new();
        for outcome in &self.outcomes {
            if let TargetResult::Succeeded(found) = &outcome.result {
                for line in found {
                    match self.kind {
                        ScopeKind::Organization => {
                            lines.push(format!("{}{}{}", outcome.target.tag, delimiter, line))
                        }
                        ScopeKind::Single => lines.push(line.clone()),
                    }
                }
            }
        }
        lines
    }

    /// Human-readable lines, see [`aggregate`]
    pub fn formatted(&self, delimiter: &str) -> Vec<String> {
        aggregate(&self.raw_lines(delimiter), delimiter, self.kind)
    }

    pub fn has_findings(&self) -> bool {
        self.outcomes
            .iter()
            .any(|o| matches!(&o.result, TargetResult::Succeeded(lines) if !lines.is_empty()))
    }
}

/// Rewrite raw lines into `Target: X | Resource: Y` (organization) or
/// `Resource: Y` (single project).
///
/// An organization line without the delimiter is shown as a bare resource.
pub fn aggregate(raw: &[String], delimiter: &str, kind: ScopeKind) -> Vec<String> {
    raw.iter()
        .map(|line| match kind {
            ScopeKind::Organization if !delimiter.is_empty() => match line.split_once(delimiter) {
                Some((target, resource)) => {
                    format!("Target: {} | Resource: {}", target, resource)
                }
                None => format!("Resource: {}", line),
            },
            _ => format!("Resource: {}", line),
        })
        .collect()
}
