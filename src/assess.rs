// SPDX-License-Identifier: PMPL-1.0-or-later

//! Plan-driven assessment run
//!
//! Validates the scope, gates the run on permission coverage, fans every
//! check out across the targets in scope and streams the results into one
//! HTML report. Results are written from this thread only, after each
//! fan-out has completed.

use crate::cloud::{CloudCli, CommandTemplate};
use crate::error::ScopeError;
use crate::gate::{Confirm, PermissionGate, PermissionRequirement, PermissionResult};
use crate::plan::{CheckPlan, Expectation, RequirementPlan, SectionPlan};
use crate::report::{CoverageNote, ReportBuilder, ReportHeader};
use crate::scope::{AggregatedOutput, AssessmentScope, ScopeDecl, ScopeResolver};
use crate::types::{CheckResult, CheckStatus, GateDecision, SummaryMetrics};
use anyhow::{Context, Result};
use colored::*;
use std::path::{Path, PathBuf};

/// What one requirement run produced
#[derive(Debug, Clone)]
pub struct AssessmentOutcome {
    pub requirement: String,
    pub decision: GateDecision,
    pub coverage: u8,
    pub missing: Vec<String>,
    /// `None` when the gate aborted before a report was started
    pub metrics: Option<SummaryMetrics>,
    pub report_path: Option<PathBuf>,
}

impl AssessmentOutcome {
    pub fn aborted(&self) -> bool {
        self.decision == GateDecision::Abort
    }
}

/// Gate the plan's permissions only, without running any check
pub fn probe_permissions(
    cli: &CloudCli,
    plan: &RequirementPlan,
    scope: &ScopeDecl,
) -> Result<PermissionResult> {
    let resolver = ScopeResolver::new(cli);
    let scope = resolver.resolve(scope)?;
    let mut gate = PermissionGate::new(cli);
    gate.scope_to(resolver.list_targets(&scope)?.first().cloned());
    gate.register(plan.requirement.clone(), requirements(cli, plan)?);
    let result = gate.probe()?.clone();
    gate.print_summary();
    Ok(result)
}

/// Run one requirement plan end to end
pub fn run(
    cli: &CloudCli,
    plan: &RequirementPlan,
    scope: &ScopeDecl,
    destination: &Path,
    confirm: &mut dyn Confirm,
) -> Result<AssessmentOutcome> {
    let templates = compile_checks(cli, plan)?;
    let resolver = ScopeResolver::new(cli);
    let scope = resolver
        .resolve(scope)
        .with_context(|| format!("requirement {}: scope could not be resolved", plan.requirement))?;
    let targets = resolver
        .list_targets(&scope)
        .with_context(|| format!("requirement {}: no targets to assess", plan.requirement))?;

    println!(
        "{}",
        format!("Requirement {}: {}", plan.requirement, plan.title)
            .bold()
            .cyan()
    );

    // Probes are qualified with the first project in scope.
    let mut gate = PermissionGate::new(cli);
    gate.scope_to(targets.first().cloned());
    gate.register(plan.requirement.clone(), requirements(cli, plan)?);
    gate.probe()?;
    gate.print_summary();
    let decision = gate.decide(cli.profile().low_water_mark, confirm)?;
    let coverage = gate.coverage()?;
    let missing = gate.missing_list()?;

    if decision == GateDecision::Abort {
        println!(
            "{} requirement {} aborted at {}% permission coverage",
            "ABORT:".red().bold(),
            plan.requirement,
            coverage
        );
        return Ok(AssessmentOutcome {
            requirement: plan.requirement.clone(),
            decision,
            coverage,
            missing,
            metrics: None,
            report_path: None,
        });
    }

    let mut header = ReportHeader::new(
        format!("PCI DSS Requirement {}: {}", plan.requirement, plan.title),
        resolver.describe(&scope),
    );
    header.requirement = Some(plan.requirement.clone());
    if let Some(principal) = cli.active_principal() {
        header.principal = principal;
    }
    let note = CoverageNote {
        percent: coverage,
        missing: missing.clone(),
    };
    header.coverage = Some(note.clone());

    let mut report = ReportBuilder::initialize(destination, header)?;
    let mut run = SectionRun {
        resolver: &resolver,
        scope: &scope,
        templates: templates.iter(),
        report: &mut report,
    };
    for section in &plan.sections {
        run.section(section)
            .with_context(|| format!("requirement {}", plan.requirement))?;
    }

    let metrics = report.summarize_tallies()?;
    let report_path = report.finalize()?;
    crate::report::print_summary(&metrics, Some(&note));
    println!("  Report: {}", report_path.display().to_string().bold());

    Ok(AssessmentOutcome {
        requirement: plan.requirement.clone(),
        decision,
        coverage,
        missing,
        metrics: Some(metrics),
        report_path: Some(report_path),
    })
}

/// Gate requirements for the plan, parsing explicit probe commands
fn requirements(cli: &CloudCli, plan: &RequirementPlan) -> Result<Vec<PermissionRequirement>> {
    plan.permissions
        .iter()
        .map(|permission| {
            let requirement = PermissionRequirement::new(permission.id());
            match permission.probe() {
                Some(text) => {
                    let probe = cli
                        .parse_template(text)
                        .with_context(|| format!("probe for permission {}", permission.id()))?;
                    Ok(requirement.with_probe(probe))
                }
                None => Ok(requirement),
            }
        })
        .collect()
}

/// Parse every check command up front so a bad plan fails before any call.
/// Templates come back in document order.
fn compile_checks(cli: &CloudCli, plan: &RequirementPlan) -> Result<Vec<CommandTemplate>> {
    plan.checks()
        .into_iter()
        .map(|(section, check)| {
            cli.parse_template(&check.command)
                .with_context(|| format!("section '{}', check '{}'", section, check.title))
        })
        .collect()
}

/// Walks the section tree in the same order as [`RequirementPlan::checks`]
struct SectionRun<'r, 'a> {
    resolver: &'r ScopeResolver<'a>,
    scope: &'r AssessmentScope,
    templates: std::slice::Iter<'r, CommandTemplate>,
    report: &'r mut ReportBuilder,
}

impl SectionRun<'_, '_> {
    fn section(&mut self, section: &SectionPlan) -> Result<()> {
        println!("\n{}", section.title.bold());
        self.report
            .open_section(&section.id, &section.title, section.expanded)?;
        for check in &section.checks {
            let result = self
                .check(check)
                .with_context(|| format!("section '{}', check '{}'", section.id, check.title))?;
            self.report.add_result(result)?;
        }
        for nested in &section.sections {
            self.section(nested)?;
        }
        self.report.close_section()?;
        Ok(())
    }

    fn check(&mut self, check: &CheckPlan) -> Result<CheckResult> {
        let template = self.templates.next().context("check was not compiled")?;
        println!("  {}", check.title);

        let output = match self.resolver.run_across_targets(self.scope, template) {
            Ok(output) => output,
            Err(ScopeError::AllTargetsFailed { attempted, failures }) => {
                tracing::warn!(check = %check.title, attempted, "check failed on every target");
                let detail = failures
                    .iter()
                    .map(|(target, reason)| format!("{}: {}", target, reason))
                    .collect::<Vec<_>>()
                    .join("\n");
                let mut result = CheckResult::new(
                    CheckStatus::Warning,
                    format!("{} (not evaluated)", check.title),
                    format!(
                        "The command failed on all {} target(s), so this check could not be evaluated.\n{}",
                        attempted, detail
                    ),
                );
                if let Some(recommendation) = &check.recommendation {
                    result = result.with_recommendation(recommendation.clone());
                }
                return Ok(result);
            }
            Err(err) => return Err(err.into()),
        };
        Ok(interpret(check, &output))
    }
}

/// Turn aggregated output into a result according to the check's expectation
pub fn interpret(check: &CheckPlan, output: &AggregatedOutput) -> CheckResult {
    let lines = output.formatted(&check.delimiter);
    let violated = match check.expect {
        Expectation::Empty => !lines.is_empty(),
        Expectation::NonEmpty => lines.is_empty(),
    };

    let mut detail = match (check.expect, lines.is_empty()) {
        (_, true) => "No resources found.".to_string(),
        (Expectation::Empty, false) => format!("{} finding(s):\n{}", lines.len(), lines.join("\n")),
        (Expectation::NonEmpty, false) => format!("Found:\n{}", lines.join("\n")),
    };
    let failures = output.failures();
    if !failures.is_empty() {
        detail.push_str("\nNot evaluated on:");
        for (target, reason) in failures {
            detail.push_str(&format!("\n{}: {}", target.id, reason));
        }
    }

    if violated {
        let mut result = CheckResult::new(check.on_violation.status(), check.title.clone(), detail);
        if let Some(recommendation) = &check.recommendation {
            result = result.with_recommendation(recommendation.clone());
        }
        result
    } else {
        CheckResult::new(CheckStatus::Pass, check.title.clone(), detail)
    }
}
