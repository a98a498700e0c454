// SPDX-License-Identifier: PMPL-1.0-or-later

//! Error taxonomy for the assessment engine
//!
//! Scope and report errors are fatal to the requirement being assessed and
//! carry the identifier that failed. Gate errors only signal misuse: probe
//! failures never surface here, they degrade coverage instead.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScopeError {
    #[error("invalid scope declaration: {0}")]
    ScopeInvalid(String),

    #[error("access denied to {kind} '{id}': {reason}")]
    ScopeAccessDenied {
        kind: &'static str,
        id: String,
        reason: String,
    },

    #[error("no target given and the cloud CLI has no default project configured")]
    ScopeUndetermined,

    #[error("enumerating projects of organization '{organization}' failed: {reason}")]
    EnumerationFailed {
        organization: String,
        reason: String,
    },

    #[error("organization '{organization}' contains no reachable projects")]
    NoTargetsFound { organization: String },

    #[error("invalid command template '{template}': {reason}")]
    InvalidTemplate { template: String, reason: String },

    #[error("command failed on all {attempted} target(s): {}", format_failures(.failures))]
    AllTargetsFailed {
        attempted: usize,
        failures: Vec<(String, String)>,
    },
}

fn format_failures(failures: &[(String, String)]) -> String {
    failures
        .iter()
        .map(|(target, reason)| format!("{}: {}", target, reason))
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GateError {
    #[error("permission gate used before any requirement was registered")]
    Unregistered,

    #[error("permission gate for requirement {requirement} has not been probed")]
    NotProbed { requirement: String },
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("cannot write report to {}: {source}", .path.display())]
    CannotWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("section id '{0}' may only contain letters, digits, '_', '.' and '-'")]
    InvalidSectionId(String),

    #[error("section id '{0}' is already used in this report")]
    DuplicateSectionId(String),

    #[error("no report section is open")]
    NoOpenSection,

    #[error("cannot finalize report with open section(s): {}", .open.join(", "))]
    UnclosedSections { open: Vec<String> },

    #[error("report has already been finalized")]
    Finalized,
}

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("reading {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing {}: {reason}", .path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("unsupported file extension for {} (expected .json, .yaml or .yml)", .0.display())]
    UnsupportedExtension(PathBuf),

    #[error("invalid setting '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}
