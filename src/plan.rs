// SPDX-License-Identifier: PMPL-1.0-or-later

//! Requirement plans
//!
//! A plan describes one requirement assessment: the permissions it needs
//! and a tree of sections, each holding checks. A check is a CLI command
//! template plus what its output is expected to look like. Plans carry no
//! compliance rules of their own; they only say which command to run and
//! how to read an empty or non-empty answer.

use crate::error::ProfileError;
use crate::report::html;
use crate::types::CheckStatus;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementPlan {
    pub requirement: String,
    pub title: String,
    #[serde(default)]
    pub permissions: Vec<PermissionPlan>,
    #[serde(default)]
    pub sections: Vec<SectionPlan>,
}

/// A permission id, optionally with an explicit probe command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PermissionPlan {
    Id(String),
    Probed { id: String, probe: Option<String> },
}

impl PermissionPlan {
    pub fn id(&self) -> &str {
        match self {
            PermissionPlan::Id(id) => id,
            PermissionPlan::Probed { id, .. } => id,
        }
    }

    pub fn probe(&self) -> Option<&str> {
        match self {
            PermissionPlan::Id(_) => None,
            PermissionPlan::Probed { probe, .. } => probe.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionPlan {
    pub id: String,
    pub title: String,
    /// Sections start collapsed unless asked otherwise
    #[serde(default)]
    pub expanded: bool,
    #[serde(default)]
    pub checks: Vec<CheckPlan>,
    #[serde(default)]
    pub sections: Vec<SectionPlan>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckPlan {
    pub title: String,
    /// CLI command text; the target flag is inserted per project
    pub command: String,
    #[serde(default)]
    pub expect: Expectation,
    #[serde(default)]
    pub on_violation: Violation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
    /// Separator between project tag and resource in aggregated lines
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

fn default_delimiter() -> String {
    "/".to_string()
}

/// How the command's output is interpreted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expectation {
    /// Every listed resource is a violation
    #[default]
    Empty,
    /// At least one resource must be listed
    NonEmpty,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Violation {
    #[default]
    Fail,
    Warning,
}

impl Violation {
    pub fn status(self) -> CheckStatus {
        match self {
            Violation::Fail => CheckStatus::Fail,
            Violation::Warning => CheckStatus::Warning,
        }
    }
}

impl RequirementPlan {
    /// Load a plan from a JSON or YAML file
    pub fn load(path: &Path) -> Result<Self, ProfileError> {
        let content = fs::read_to_string(path).map_err(|source| ProfileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let parse_error = |reason: String| ProfileError::Parse {
            path: path.to_path_buf(),
            reason,
        };
        let plan: Self = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&content).map_err(|e| parse_error(e.to_string()))?,
            Some("yaml") | Some("yml") => {
                serde_yaml::from_str(&content).map_err(|e| parse_error(e.to_string()))?
            }
            _ => return Err(ProfileError::UnsupportedExtension(path.to_path_buf())),
        };
        plan.validate()?;
        Ok(plan)
    }

    /// Section ids must be unique across the whole tree and safe to embed
    /// in the report markup
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.requirement.trim().is_empty() {
            return Err(ProfileError::Invalid {
                field: "requirement",
                reason: "must not be empty".to_string(),
            });
        }
        let mut seen = HashSet::new();
        let mut stack: Vec<&SectionPlan> = self.sections.iter().collect();
        while let Some(section) = stack.pop() {
            if section.id.trim().is_empty() {
                return Err(ProfileError::Invalid {
                    field: "sections.id",
                    reason: format!("section '{}' has an empty id", section.title),
                });
            }
            if !html::is_section_id(&section.id) {
                return Err(ProfileError::Invalid {
                    field: "sections.id",
                    reason: format!(
                        "section id '{}' may only contain letters, digits, '_', '.' and '-'",
                        section.id
                    ),
                });
            }
            if !seen.insert(section.id.as_str()) {
                return Err(ProfileError::Invalid {
                    field: "sections.id",
                    reason: format!("duplicate section id '{}'", section.id),
                });
            }
            if let Some(check) = section.checks.iter().find(|c| c.delimiter.is_empty()) {
                return Err(ProfileError::Invalid {
                    field: "checks.delimiter",
                    reason: format!("check '{}' has an empty delimiter", check.title),
                });
            }
            stack.extend(section.sections.iter());
        }
        Ok(())
    }

    /// Permission ids in declaration order, without probe overrides
    pub fn permission_ids(&self) -> Vec<String> {
        self.permissions.iter().map(|p| p.id().to_string()).collect()
    }

    /// Every check in document order, paired with its section id
    pub fn checks(&self) -> Vec<(&str, &CheckPlan)> {
        fn walk<'p>(sections: &'p [SectionPlan], out: &mut Vec<(&'p str, &'p CheckPlan)>) {
            for section in sections {
                out.extend(section.checks.iter().map(|c| (section.id.as_str(), c)));
                walk(&section.sections, out);
            }
        }
        let mut out = Vec::new();
        walk(&self.sections, &mut out);
        out
    }
}
