// SPDX-License-Identifier: PMPL-1.0-or-later

//! Assessment profile: cloud CLI command shapes and engine tunables.
//!
//! Every field has a default aimed at `gcloud`, so an empty profile file (or
//! no file at all) yields a working configuration.

use crate::error::ProfileError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Placeholder replaced by a project id in target command shapes
pub const ID_PLACEHOLDER: &str = "{id}";
/// Placeholder replaced by an organization id in enumeration command shapes
pub const ORGANIZATION_PLACEHOLDER: &str = "{organization}";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssessmentProfile {
    pub cli: CliProfile,
    /// Upper bound for any single CLI invocation
    pub command_timeout_secs: u64,
    /// Worker threads used when running a command across targets
    pub workers: usize,
    /// Coverage percent below which the gate aborts without asking
    pub low_water_mark: u8,
    /// Extra attempts for inconclusive permission probes
    pub probe_retries: u32,
    /// Case-insensitive phrases that mark an authorization denial
    pub denial_markers: Vec<String>,
    /// Case-insensitive phrases that mark an explicit "no resources" answer
    pub empty_markers: Vec<String>,
}

/// Argument vectors for the handful of CLI calls the engine itself makes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliProfile {
    pub program: String,
    pub target_flag: String,
    pub describe_target: Vec<String>,
    pub describe_organization: Vec<String>,
    pub list_targets: Vec<String>,
    pub default_target: Vec<String>,
    pub active_principal: Vec<String>,
}

impl Default for CliProfile {
    fn default() -> Self {
        Self {
            program: "gcloud".to_string(),
            target_flag: "--project".to_string(),
            describe_target: args(&["projects", "describe", "{id}", "--format=value(projectId)"]),
            describe_organization: args(&[
                "organizations",
                "describe",
                "{id}",
                "--format=value(name)",
            ]),
            list_targets: args(&[
                "projects",
                "list",
                "--filter=parent.id={organization}",
                "--format=value(projectId)",
            ]),
            default_target: args(&["config", "get-value", "project"]),
            active_principal: args(&["config", "get-value", "account"]),
        }
    }
}

impl Default for AssessmentProfile {
    fn default() -> Self {
        Self {
            cli: CliProfile::default(),
            command_timeout_secs: 30,
            workers: 4,
            low_water_mark: 50,
            probe_retries: 0,
            denial_markers: args(&[
                "PERMISSION_DENIED",
                "does not have permission",
                "permission denied",
                "AccessDenied",
                "not authorized",
                "403 Forbidden",
            ]),
            empty_markers: args(&["Listed 0 items"]),
        }
    }
}

fn args(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl AssessmentProfile {
    pub fn load(path: &Path) -> Result<Self, ProfileError> {
        let content = fs::read_to_string(path).map_err(|source| ProfileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let parse_error = |reason: String| ProfileError::Parse {
            path: path.to_path_buf(),
            reason,
        };
        let profile: Self = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&content).map_err(|e| parse_error(e.to_string()))?,
            Some("yaml") | Some("yml") => {
                serde_yaml::from_str(&content).map_err(|e| parse_error(e.to_string()))?
            }
            _ => return Err(ProfileError::UnsupportedExtension(path.to_path_buf())),
        };
        profile.validate()?;
        Ok(profile)
    }

    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.cli.program.trim().is_empty() {
            return Err(ProfileError::Invalid {
                field: "cli.program",
                reason: "must not be empty".to_string(),
            });
        }
        if !self.cli.target_flag.starts_with('-') {
            return Err(ProfileError::Invalid {
                field: "cli.target_flag",
                reason: format!("'{}' is not a flag", self.cli.target_flag),
            });
        }
        if self.workers == 0 {
            return Err(ProfileError::Invalid {
                field: "workers",
                reason: "at least one worker is required".to_string(),
            });
        }
        if self.low_water_mark > 100 {
            return Err(ProfileError::Invalid {
                field: "low_water_mark",
                reason: format!("{} is not a percentage", self.low_water_mark),
            });
        }
        if self.command_timeout_secs == 0 {
            return Err(ProfileError::Invalid {
                field: "command_timeout_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

/// Substitute `placeholder` in every argument of a command shape
pub fn fill(shape: &[String], placeholder: &str, value: &str) -> Vec<String> {
    shape
        .iter()
        .map(|arg| arg.replace(placeholder, value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_replaces_placeholder_in_every_argument() {
        let shape = args(&["projects", "describe", "{id}", "--filter=id={id}"]);
        assert_eq!(
            fill(&shape, ID_PLACEHOLDER, "p1"),
            args(&["projects", "describe", "p1", "--filter=id=p1"])
        );
    }

    #[test]
    fn defaults_are_valid() {
        AssessmentProfile::default()
            .validate()
            .expect("default profile should validate");
    }
}
