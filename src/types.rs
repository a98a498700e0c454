// SPDX-License-Identifier: PMPL-1.0-or-later

//! Core type definitions for pci-assess
//!
//! Shared by the scope resolver, the permission gate and the report builder.
//! Nothing in here performs I/O.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether an assessment covers one project or every project under an organization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeKind {
    Single,
    Organization,
}

/// One addressable unit within scope (a cloud project)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Target {
    pub id: String,
    /// Prefix used on aggregated output lines when the scope is an organization
    pub tag: String,
}

impl Target {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            tag: id.clone(),
            id,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Outcome of a single check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Fail,
    Warning,
    Info,
}

impl CheckStatus {
    /// Bracketed tag written into report markup (`[PASS]`, `[WARN]`, ...)
    pub fn tag(&self) -> &'static str {
        match self {
            CheckStatus::Pass => "[PASS]",
            CheckStatus::Fail => "[FAIL]",
            CheckStatus::Warning => "[WARN]",
            CheckStatus::Info => "[INFO]",
        }
    }

    pub fn css_class(&self) -> &'static str {
        match self {
            CheckStatus::Pass => "pass",
            CheckStatus::Fail => "fail",
            CheckStatus::Warning => "warning",
            CheckStatus::Info => "info",
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckStatus::Pass => write!(f, "PASS"),
            CheckStatus::Fail => write!(f, "FAIL"),
            CheckStatus::Warning => write!(f, "WARN"),
            CheckStatus::Info => write!(f, "INFO"),
        }
    }
}

/// A typed finding appended to the currently open report section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub status: CheckStatus,
    pub title: String,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
}

impl CheckResult {
    pub fn new(status: CheckStatus, title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            status,
            title: title.into(),
            detail: detail.into(),
            recommendation: None,
        }
    }

    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendation = Some(recommendation.into());
        self
    }
}

/// Running Pass/Fail/Warning counters for one report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub passed: usize,
    pub failed: usize,
    pub warnings: usize,
    pub info: usize,
}

impl Tally {
    pub fn record(&mut self, status: CheckStatus) {
        match status {
            CheckStatus::Pass => self.passed += 1,
            CheckStatus::Fail => self.failed += 1,
            CheckStatus::Warning => self.warnings += 1,
            CheckStatus::Info => self.info += 1,
        }
    }

    /// Checks that feed the summary; informational results are excluded.
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.warnings
    }
}

/// Why a permission was classified as missing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingReason {
    /// The CLI answered with an explicit authorization denial
    Denied,
    /// Timeout, spawn failure or an unrecognised error (fail-closed)
    Inconclusive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionStatus {
    Available,
    Missing(MissingReason),
}

impl PermissionStatus {
    pub fn is_available(&self) -> bool {
        matches!(self, PermissionStatus::Available)
    }
}

/// Verdict of the permission gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateDecision {
    Proceed,
    ProceedDegraded,
    Abort,
}

impl fmt::Display for GateDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateDecision::Proceed => write!(f, "proceed"),
            GateDecision::ProceedDegraded => write!(f, "proceed (degraded)"),
            GateDecision::Abort => write!(f, "abort"),
        }
    }
}

/// Qualitative label attached to a compliance percentage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceLabel {
    Compliant,
    PartiallyCompliant,
    NonCompliant,
    NoAssessableChecks,
}

impl ComplianceLabel {
    pub fn from_percent(percent: Option<f64>) -> Self {
        match percent {
            None => ComplianceLabel::NoAssessableChecks,
            Some(p) if p >= 90.0 => ComplianceLabel::Compliant,
            Some(p) if p >= 70.0 => ComplianceLabel::PartiallyCompliant,
            Some(_) => ComplianceLabel::NonCompliant,
        }
    }

    pub fn css_class(&self) -> &'static str {
        match self {
            ComplianceLabel::Compliant => "compliant",
            ComplianceLabel::PartiallyCompliant => "partial",
            ComplianceLabel::NonCompliant => "non-compliant",
            ComplianceLabel::NoAssessableChecks => "not-applicable",
        }
    }
}

impl fmt::Display for ComplianceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComplianceLabel::Compliant => write!(f, "Compliant"),
            ComplianceLabel::PartiallyCompliant => write!(f, "Partially Compliant"),
            ComplianceLabel::NonCompliant => write!(f, "Non-Compliant"),
            ComplianceLabel::NoAssessableChecks => write!(f, "No Assessable Checks"),
        }
    }
}

/// Compliance figures computed once at the end of a run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryMetrics {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub warnings: usize,
    /// `passed * 100 / (passed + failed)`; `None` when nothing was assessable
    pub compliance_percent: Option<f64>,
    pub label: ComplianceLabel,
}

impl SummaryMetrics {
    pub fn compute(total: usize, passed: usize, failed: usize, warnings: usize) -> Self {
        let assessable = passed + failed;
        let compliance_percent = if assessable == 0 {
            None
        } else {
            Some(passed as f64 * 100.0 / assessable as f64)
        };
        Self {
            total,
            passed,
            failed,
            warnings,
            compliance_percent,
            label: ComplianceLabel::from_percent(compliance_percent),
        }
    }

    pub fn from_tally(tally: &Tally) -> Self {
        Self::compute(tally.total(), tally.passed, tally.failed, tally.warnings)
    }

    pub fn percent_display(&self) -> String {
        match self.compliance_percent {
            Some(p) => format!("{:.1}%", p),
            None => "n/a".to_string(),
        }
    }
}
