// SPDX-License-Identifier: PMPL-1.0-or-later

//! Permission gate
//!
//! Registers the capabilities one requirement needs, probes them against
//! the active principal and decides whether the assessment may proceed.
//!
//! State machine: `Unregistered -> Registered -> Probed -> Decided`.
//! Registering again starts over; probing again clears any decision.

pub mod confirm;
pub mod probe;

pub use confirm::{AssumeNo, AssumeYes, Confirm, TerminalConfirm};

use crate::cloud::{CloudCli, CommandTemplate};
use crate::error::GateError;
use crate::types::{GateDecision, PermissionStatus, Target};
use colored::*;
use serde::{Deserialize, Serialize};

/// One capability a requirement depends on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRequirement {
    pub id: String,
    /// Explicit probe; derived from `id` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probe: Option<CommandTemplate>,
}

impl PermissionRequirement {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            probe: None,
        }
    }

    pub fn with_probe(mut self, probe: CommandTemplate) -> Self {
        self.probe = Some(probe);
        self
    }
}

impl From<&str> for PermissionRequirement {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for PermissionRequirement {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionEntry {
    pub id: String,
    pub status: PermissionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Probe results in registration order. Duplicate ids are kept and counted
/// once per registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PermissionResult {
    pub entries: Vec<PermissionEntry>,
}

impl PermissionResult {
    pub fn total(&self) -> usize {
        self.entries.len()
    }

    pub fn available_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.status.is_available())
            .count()
    }

    pub fn missing_count(&self) -> usize {
        self.total() - self.available_count()
    }

    /// `round(available / total * 100)`, 100 when nothing is registered
    pub fn coverage_percent(&self) -> u8 {
        coverage_percent(self.available_count(), self.total())
    }

    pub fn missing(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| !e.status.is_available())
            .map(|e| e.id.clone())
            .collect()
    }

    pub fn status_of(&self, id: &str) -> Option<PermissionStatus> {
        self.entries.iter().find(|e| e.id == id).map(|e| e.status)
    }
}

pub fn coverage_percent(available: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    (available as f64 / total as f64 * 100.0).round() as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Unregistered,
    Registered,
    Probed,
    Decided(GateDecision),
}

pub struct PermissionGate<'a> {
    cli: &'a CloudCli,
    requirement: Option<String>,
    permissions: Vec<PermissionRequirement>,
    target: Option<Target>,
    result: Option<PermissionResult>,
    decision: Option<GateDecision>,
}

impl<'a> PermissionGate<'a> {
    pub fn new(cli: &'a CloudCli) -> Self {
        Self {
            cli,
            requirement: None,
            permissions: Vec::new(),
            target: None,
            result: None,
            decision: None,
        }
    }

    /// Qualify probes with a project (the first target in scope, typically)
    pub fn scope_to(&mut self, target: Option<Target>) {
        self.target = target;
    }

    /// Replace the active requirement and its permission list
    pub fn register<I, P>(&mut self, requirement_id: impl Into<String>, permissions: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<PermissionRequirement>,
    {
        self.requirement = Some(requirement_id.into());
        self.permissions = permissions.into_iter().map(Into::into).collect();
        self.result = None;
        self.decision = None;
    }

    pub fn requirement(&self) -> Option<&str> {
        self.requirement.as_deref()
    }

    pub fn permissions(&self) -> &[PermissionRequirement] {
        &self.permissions
    }

    pub fn state(&self) -> GateState {
        match (&self.requirement, &self.result, self.decision) {
            (None, _, _) => GateState::Unregistered,
            (Some(_), None, _) => GateState::Registered,
            (Some(_), Some(_), None) => GateState::Probed,
            (Some(_), Some(_), Some(decision)) => GateState::Decided(decision),
        }
    }

    /// Check every registered permission against the active principal
    pub fn probe(&mut self) -> Result<&PermissionResult, GateError> {
        if self.requirement.is_none() {
            return Err(GateError::Unregistered);
        }
        let mut entries = Vec::with_capacity(self.permissions.len());
        for permission in &self.permissions {
            let derived;
            let template = match &permission.probe {
                Some(explicit) => Some(explicit),
                None => {
                    derived = probe::derive_probe(self.cli, &permission.id);
                    derived.as_ref()
                }
            };
            let (status, detail) =
                probe::probe_with_policy(self.cli, template, &permission.id, self.target.as_ref());
            entries.push(PermissionEntry {
                id: permission.id.clone(),
                status,
                detail,
            });
        }
        self.decision = None;
        let result = self.result.insert(PermissionResult { entries });
        Ok(&*result)
    }

    /// Decide whether the run may go ahead.
    ///
    /// Full coverage proceeds silently. Coverage at or above `low_water_mark`
    /// asks `confirm`; below it the run aborts without asking.
    pub fn decide(
        &mut self,
        low_water_mark: u8,
        confirm: &mut dyn Confirm,
    ) -> Result<GateDecision, GateError> {
        let requirement = self.requirement.clone().ok_or(GateError::Unregistered)?;
        let result = self
            .result
            .as_ref()
            .ok_or(GateError::NotProbed { requirement: requirement.clone() })?;
        let coverage = result.coverage_percent();

        let decision = if coverage >= 100 {
            GateDecision::Proceed
        } else if coverage >= low_water_mark {
            let question = format!(
                "Requirement {}: only {}% of required permissions are available ({} missing). Continue with incomplete results?",
                requirement,
                coverage,
                result.missing_count()
            );
            if confirm.confirm(&question) {
                GateDecision::ProceedDegraded
            } else {
                GateDecision::Abort
            }
        } else {
            GateDecision::Abort
        };
        self.decision = Some(decision);
        Ok(decision)
    }

    pub fn result(&self) -> Option<&PermissionResult> {
        self.result.as_ref()
    }

    pub fn decision(&self) -> Option<GateDecision> {
        self.decision
    }

    pub fn coverage(&self) -> Result<u8, GateError> {
        Ok(self.probed()?.coverage_percent())
    }

    pub fn missing_list(&self) -> Result<Vec<String>, GateError> {
        Ok(self.probed()?.missing())
    }

    fn probed(&self) -> Result<&PermissionResult, GateError> {
        let requirement = self.requirement.as_ref().ok_or(GateError::Unregistered)?;
        self.result.as_ref().ok_or_else(|| GateError::NotProbed {
            requirement: requirement.clone(),
        })
    }

    /// Print the probe table to the terminal
    pub fn print_summary(&self) {
        let (Some(requirement), Some(result)) = (&self.requirement, &self.result) else {
            return;
        };
        println!(
            "{}",
            format!("PERMISSIONS FOR REQUIREMENT {}", requirement)
                .bold()
                .yellow()
        );
        for entry in &result.entries {
            let status = match entry.status {
                PermissionStatus::Available => "available".green(),
                PermissionStatus::Missing(_) => "missing".red(),
            };
            match &entry.detail {
                Some(detail) => println!("  {:<45} {} ({})", entry.id, status, detail.dimmed()),
                None => println!("  {:<45} {}", entry.id, status),
            }
        }
        let coverage = result.coverage_percent();
        let colored_coverage = if coverage >= 100 {
            format!("{}%", coverage).green()
        } else if coverage >= self.cli.profile().low_water_mark {
            format!("{}%", coverage).yellow()
        } else {
            format!("{}%", coverage).red()
        };
        println!(
            "  Coverage: {} ({}/{} available)",
            colored_coverage.bold(),
            result.available_count(),
            result.total()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::coverage_percent;

    #[test]
    fn coverage_rounds_half_up() {
        assert_eq!(coverage_percent(6, 8), 75);
        assert_eq!(coverage_percent(1, 3), 33);
        assert_eq!(coverage_percent(2, 3), 67);
        assert_eq!(coverage_percent(1, 8), 13);
        assert_eq!(coverage_percent(0, 0), 100);
    }
}
