// SPDX-License-Identifier: PMPL-1.0-or-later

//! Report generation module

pub mod builder;
pub mod cleanup;
pub mod consolidate;
pub mod html;

use crate::types::SummaryMetrics;
use colored::*;

pub use builder::{CoverageNote, ReportBuilder, ReportHeader, SectionRecord};
pub use consolidate::{ConsolidateOptions, ConsolidatedSummary};

/// Print a compliance summary to the console
pub fn print_summary(metrics: &SummaryMetrics, coverage: Option<&CoverageNote>) {
    println!("\n{}", "COMPLIANCE SUMMARY".bold().yellow());
    println!("  Total checks: {}", metrics.total);
    println!("  Passed:       {}", metrics.passed.to_string().green());
    println!("  Failed:       {}", metrics.failed.to_string().red());
    println!("  Warnings:     {}", metrics.warnings.to_string().yellow());

    let label = metrics.label.to_string();
    let label = match metrics.label {
        crate::types::ComplianceLabel::Compliant => label.green(),
        crate::types::ComplianceLabel::PartiallyCompliant => label.yellow(),
        crate::types::ComplianceLabel::NonCompliant => label.red(),
        crate::types::ComplianceLabel::NoAssessableChecks => label.normal(),
    };
    println!("  Compliance:   {} ({})", metrics.percent_display().bold(), label.bold());

    if let Some(coverage) = coverage.filter(|c| c.is_degraded()) {
        println!(
            "  {} permission coverage {}% (missing: {})",
            "DEGRADED:".red().bold(),
            coverage.percent,
            coverage.missing.join(", ")
        );
    }
}
