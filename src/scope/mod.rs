// SPDX-License-Identifier: PMPL-1.0-or-later

//! Scope resolution: from a scope declaration to a cached list of projects,
//! and fan-out of a command template across them.

pub mod aggregate;

pub use aggregate::{aggregate, AggregatedOutput, TargetOutcome, TargetResult};

use crate::cloud::{CliCommand, CloudCli, CommandTemplate};
use crate::error::ScopeError;
use crate::types::{ScopeKind, Target};
use colored::*;
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

/// What the caller asked to assess
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeDecl {
    /// One project; `None` falls back to the CLI's configured default
    Single { target: Option<String> },
    Organization { id: String },
}

/// A validated scope. Organization targets are enumerated at most once.
#[derive(Debug)]
pub struct AssessmentScope {
    kind: ScopeKind,
    root: String,
    targets: OnceLock<Vec<Target>>,
    enumerations: AtomicUsize,
}

impl AssessmentScope {
    fn single(target: Target) -> Self {
        let root = target.id.clone();
        let targets = OnceLock::new();
        let _ = targets.set(vec![target]);
        Self {
            kind: ScopeKind::Single,
            root,
            targets,
            enumerations: AtomicUsize::new(0),
        }
    }

    fn organization(id: String) -> Self {
        Self {
            kind: ScopeKind::Organization,
            root: id,
            targets: OnceLock::new(),
            enumerations: AtomicUsize::new(0),
        }
    }

    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    /// Project id for a single scope, organization id otherwise
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Targets known so far, without triggering enumeration
    pub fn cached_targets(&self) -> Option<&[Target]> {
        self.targets.get().map(Vec::as_slice)
    }

    /// How many enumeration calls this scope has issued
    pub fn enumeration_count(&self) -> usize {
        self.enumerations.load(Ordering::SeqCst)
    }
}

pub struct ScopeResolver<'a> {
    cli: &'a CloudCli,
}

impl<'a> ScopeResolver<'a> {
    pub fn new(cli: &'a CloudCli) -> Self {
        Self { cli }
    }

    pub fn resolve(&self, decl: &ScopeDecl) -> Result<AssessmentScope, ScopeError> {
        match decl {
            ScopeDecl::Single { target } => {
                let target = match target {
                    Some(id) => Target::new(validate_id("project", id)?),
                    None => self.cli.default_target().ok_or(ScopeError::ScopeUndetermined)?,
                };
                let probe = self
                    .cli
                    .describe_target(&target.id)
                    .map_err(|e| cli_unavailable(self.cli, e))?;
                if !probe.success() {
                    return Err(ScopeError::ScopeAccessDenied {
                        kind: "project",
                        id: target.id,
                        reason: probe.failure_reason(),
                    });
                }
                Ok(AssessmentScope::single(target))
            }
            ScopeDecl::Organization { id } => {
                let id = validate_id("organization", id)?;
                let probe = self
                    .cli
                    .describe_organization(&id)
                    .map_err(|e| cli_unavailable(self.cli, e))?;
                if !probe.success() {
                    return Err(ScopeError::ScopeAccessDenied {
                        kind: "organization",
                        id,
                        reason: probe.failure_reason(),
                    });
                }
                Ok(AssessmentScope::organization(id))
            }
        }
    }

    /// Targets in scope. The first call on an organization scope enumerates
    /// its projects; later calls return the cached list.
    pub fn list_targets<'s>(&self, scope: &'s AssessmentScope) -> Result<&'s [Target], ScopeError> {
        if let Some(targets) = scope.targets.get() {
            return Ok(targets.as_slice());
        }

        scope.enumerations.fetch_add(1, Ordering::SeqCst);
        let organization = scope.root.clone();
        let output = self
            .cli
            .list_targets(&organization)
            .map_err(|e| ScopeError::EnumerationFailed {
                organization: organization.clone(),
                reason: e.to_string(),
            })?;
        if !output.success() {
            return Err(ScopeError::EnumerationFailed {
                organization,
                reason: output.failure_reason(),
            });
        }

        let mut targets: Vec<Target> = Vec::new();
        for id in output.lines() {
            if !targets.iter().any(|t| t.id == id) {
                targets.push(Target::new(id));
            }
        }
        if targets.is_empty() {
            return Err(ScopeError::NoTargetsFound { organization });
        }
        tracing::debug!(organization = %scope.root, count = targets.len(), "enumerated projects");
        Ok(scope.targets.get_or_init(|| targets).as_slice())
    }

    /// Insert the target-scoping flag right after the CLI program token
    pub fn build_command(&self, template: &CommandTemplate, target: &Target) -> CliCommand {
        template.for_target(target, self.cli.target_flag())
    }

    /// Run `template` once per target. Failures stay isolated per target;
    /// the call fails only when no target succeeded.
    pub fn run_across_targets(
        &self,
        scope: &AssessmentScope,
        template: &CommandTemplate,
    ) -> Result<AggregatedOutput, ScopeError> {
        let targets = self.list_targets(scope)?;
        let total = targets.len();
        let workers = self.cli.profile().workers.max(1);

        let run_one = |(index, target): (usize, &Target)| -> TargetOutcome {
            let outcome = self.run_on_target(template, target);
            print_progress(index + 1, total, &outcome);
            outcome
        };

        let outcomes: Vec<TargetOutcome> = if workers == 1 || total == 1 {
            targets.iter().enumerate().map(run_one).collect()
        } else {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(workers.min(total))
                .build()
            {
                Ok(pool) => pool.install(|| {
                    targets
                        .par_iter()
                        .enumerate()
                        .map(run_one)
                        .collect::<Vec<_>>()
                }),
                Err(err) => {
                    tracing::warn!(error = %err, "worker pool unavailable, running sequentially");
                    targets.iter().enumerate().map(run_one).collect()
                }
            }
        };

        let output = AggregatedOutput {
            kind: scope.kind,
            outcomes,
        };
        if output.success_count() == 0 {
            return Err(ScopeError::AllTargetsFailed {
                attempted: total,
                failures: output
                    .failures()
                    .into_iter()
                    .map(|(target, reason)| (target.id.clone(), reason.to_string()))
                    .collect(),
            });
        }
        Ok(output)
    }

    fn run_on_target(&self, template: &CommandTemplate, target: &Target) -> TargetOutcome {
        let command = self.build_command(template, target);
        let result = match self.cli.run(&command) {
            Err(err) => TargetResult::Failed(format!("could not run {}: {}", command.program, err)),
            Ok(output) if output.success() => {
                let lines = output.lines();
                if lines.is_empty() || self.cli.is_empty_result(&output) {
                    TargetResult::NoResults
                } else {
                    TargetResult::Succeeded(lines)
                }
            }
            Ok(output) if !output.timed_out && self.cli.is_empty_result(&output) => {
                TargetResult::NoResults
            }
            Ok(output) => TargetResult::Failed(output.failure_reason()),
        };
        TargetOutcome {
            target: target.clone(),
            result,
        }
    }

    /// One-line description of the scope for report headers
    pub fn describe(&self, scope: &AssessmentScope) -> String {
        match scope.kind {
            ScopeKind::Single => format!("Project: {}", scope.root),
            ScopeKind::Organization => match scope.cached_targets() {
                Some(targets) => format!(
                    "Organization: {} ({} projects)",
                    scope.root,
                    targets.len()
                ),
                None => format!("Organization: {}", scope.root),
            },
        }
    }
}

fn validate_id(kind: &str, id: &str) -> Result<String, ScopeError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(ScopeError::ScopeInvalid(format!("empty {} id", kind)));
    }
    if id.starts_with('-') || id.contains(char::is_whitespace) {
        return Err(ScopeError::ScopeInvalid(format!(
            "'{}' is not a valid {} id",
            id, kind
        )));
    }
    Ok(id.to_string())
}

fn cli_unavailable(cli: &CloudCli, err: std::io::Error) -> ScopeError {
    ScopeError::ScopeInvalid(format!(
        "could not run '{}': {}",
        cli.profile().cli.program,
        err
    ))
}

fn print_progress(index: usize, total: usize, outcome: &TargetOutcome) {
    let status = match &outcome.result {
        TargetResult::Succeeded(lines) => format!("{} line(s)", lines.len()).green(),
        TargetResult::NoResults => "no results".normal(),
        TargetResult::Failed(reason) => format!("failed: {}", reason).red(),
    };
    println!("  [{}/{}] {} ... {}", index, total, outcome.target.id, status);
}
