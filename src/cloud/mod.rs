// SPDX-License-Identifier: PMPL-1.0-or-later

//! Cloud CLI access
//!
//! The engine never talks to a cloud API directly. Everything goes through
//! a [`CommandRunner`], which lets tests script the CLI's answers.

pub mod command;
pub mod runner;

pub use command::{CliCommand, CommandTemplate};
pub use runner::{CommandOutput, CommandRunner, ProcessRunner};

use crate::error::ScopeError;
use crate::profile::{fill, AssessmentProfile, ID_PLACEHOLDER, ORGANIZATION_PLACEHOLDER};
use crate::types::Target;
use std::io;

/// Values `gcloud config get-value` prints when nothing is configured
const UNSET_VALUES: &[&str] = &["(unset)", "unset", "none"];

pub struct CloudCli {
    profile: AssessmentProfile,
    runner: Box<dyn CommandRunner>,
}

impl CloudCli {
    pub fn new(profile: AssessmentProfile, runner: impl CommandRunner + 'static) -> Self {
        Self {
            profile,
            runner: Box::new(runner),
        }
    }

    /// CLI backed by real child processes, bounded by the profile's timeout
    pub fn from_profile(profile: AssessmentProfile) -> Self {
        let runner = ProcessRunner::new(profile.command_timeout());
        Self::new(profile, runner)
    }

    pub fn profile(&self) -> &AssessmentProfile {
        &self.profile
    }

    pub fn target_flag(&self) -> &str {
        &self.profile.cli.target_flag
    }

    pub fn run(&self, command: &CliCommand) -> io::Result<CommandOutput> {
        self.runner.run(command)
    }

    /// Template for `<program> <args..>` using the configured program
    pub fn template<I, S>(&self, args: I) -> CommandTemplate
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandTemplate::new(self.profile.cli.program.clone(), args)
    }

    pub fn parse_template(&self, text: &str) -> Result<CommandTemplate, ScopeError> {
        CommandTemplate::parse(text, &self.profile.cli.program)
    }

    /// Existence probe for one project
    pub fn describe_target(&self, id: &str) -> io::Result<CommandOutput> {
        let args = fill(&self.profile.cli.describe_target, ID_PLACEHOLDER, id);
        self.run(&self.template(args).unscoped())
    }

    /// Existence probe for an organization
    pub fn describe_organization(&self, id: &str) -> io::Result<CommandOutput> {
        let args = fill(&self.profile.cli.describe_organization, ID_PLACEHOLDER, id);
        self.run(&self.template(args).unscoped())
    }

    /// Enumeration probe: one project id per stdout line
    pub fn list_targets(&self, organization: &str) -> io::Result<CommandOutput> {
        let args = fill(
            &self.profile.cli.list_targets,
            ORGANIZATION_PLACEHOLDER,
            organization,
        );
        self.run(&self.template(args).unscoped())
    }

    /// The CLI's configured default project, if any
    pub fn default_target(&self) -> Option<Target> {
        self.config_value(&self.profile.cli.default_target)
            .map(Target::new)
    }

    /// Identity the CLI is currently authenticated as
    pub fn active_principal(&self) -> Option<String> {
        self.config_value(&self.profile.cli.active_principal)
    }

    fn config_value(&self, shape: &[String]) -> Option<String> {
        let output = match self.run(&self.template(shape.to_vec()).unscoped()) {
            Ok(output) => output,
            Err(err) => {
                tracing::warn!(error = %err, "reading CLI configuration failed");
                return None;
            }
        };
        if !output.success() {
            return None;
        }
        let value = output.stdout.trim();
        if value.is_empty() || UNSET_VALUES.contains(&value.to_lowercase().as_str()) {
            None
        } else {
            Some(value.to_string())
        }
    }

    pub fn is_denied(&self, output: &CommandOutput) -> bool {
        !output.success() && output.mentions_any(&self.profile.denial_markers)
    }

    pub fn is_empty_result(&self, output: &CommandOutput) -> bool {
        output.mentions_any(&self.profile.empty_markers)
    }
}
