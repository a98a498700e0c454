// SPDX-License-Identifier: PMPL-1.0-or-later

//! Scripted cloud CLI shared by the integration tests

#![allow(dead_code)]

use pci_assess::cloud::{CliCommand, CloudCli, CommandOutput, CommandRunner};
use pci_assess::profile::AssessmentProfile;
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

enum Response {
    Output(CommandOutput),
    SpawnError,
}

struct Rule {
    pattern: String,
    responses: VecDeque<Response>,
}

#[derive(Default)]
struct State {
    rules: Vec<Rule>,
    calls: Vec<String>,
}

/// Answers commands by substring match on the rendered command line.
/// Later rules win over earlier ones; unmatched commands exit 1.
#[derive(Clone, Default)]
pub struct FakeCli {
    state: Arc<Mutex<State>>,
}

impl FakeCli {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, pattern: &str, output: CommandOutput) -> &Self {
        self.push(pattern, vec![Response::Output(output)]);
        self
    }

    /// Answers in order; the last answer repeats
    pub fn on_sequence(&self, pattern: &str, outputs: Vec<CommandOutput>) -> &Self {
        self.push(pattern, outputs.into_iter().map(Response::Output).collect());
        self
    }

    pub fn on_spawn_error(&self, pattern: &str) -> &Self {
        self.push(pattern, vec![Response::SpawnError]);
        self
    }

    fn push(&self, pattern: &str, responses: Vec<Response>) {
        self.state.lock().unwrap().rules.push(Rule {
            pattern: pattern.to_string(),
            responses: responses.into(),
        });
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn calls_matching(&self, pattern: &str) -> usize {
        self.calls().iter().filter(|c| c.contains(pattern)).count()
    }

    pub fn cli(&self) -> CloudCli {
        self.cli_with(AssessmentProfile::default())
    }

    pub fn cli_with(&self, profile: AssessmentProfile) -> CloudCli {
        CloudCli::new(profile, self.clone())
    }
}

impl CommandRunner for FakeCli {
    fn run(&self, command: &CliCommand) -> io::Result<CommandOutput> {
        let line = command.to_string();
        let mut state = self.state.lock().unwrap();
        state.calls.push(line.clone());
        let rule = state
            .rules
            .iter_mut()
            .rev()
            .find(|rule| line.contains(&rule.pattern));
        let Some(rule) = rule else {
            return Ok(fail(1, &format!("ERROR: unexpected command: {}", line)));
        };
        let response = if rule.responses.len() > 1 {
            rule.responses.pop_front()
        } else {
            rule.responses.front().map(|r| match r {
                Response::Output(output) => Response::Output(output.clone()),
                Response::SpawnError => Response::SpawnError,
            })
        };
        match response {
            Some(Response::Output(output)) => Ok(output),
            Some(Response::SpawnError) => Err(io::Error::new(io::ErrorKind::NotFound, "gcloud: not found")),
            None => Ok(fail(1, "no scripted response")),
        }
    }
}

pub fn ok(stdout: &str) -> CommandOutput {
    CommandOutput {
        exit_code: Some(0),
        stdout: stdout.to_string(),
        ..Default::default()
    }
}

pub fn fail(code: i32, stderr: &str) -> CommandOutput {
    CommandOutput {
        exit_code: Some(code),
        stderr: stderr.to_string(),
        ..Default::default()
    }
}

pub fn denied() -> CommandOutput {
    fail(
        1,
        "ERROR: (gcloud.compute.firewalls.list) PERMISSION_DENIED: Required permission was not granted",
    )
}

pub fn timed_out() -> CommandOutput {
    CommandOutput {
        timed_out: true,
        ..Default::default()
    }
}

/// A CLI whose default project `p1` exists
pub fn single_project(fake: &FakeCli) {
    fake.on("config get-value project", ok("p1\n"));
    fake.on("config get-value account", ok("auditor@example.com\n"));
    fake.on("projects describe p1", ok("p1\n"));
}

/// Organization `org1` holding the given projects
pub fn organization(fake: &FakeCli, projects: &[&str]) {
    fake.on("config get-value account", ok("auditor@example.com\n"));
    fake.on("organizations describe org1", ok("organizations/org1\n"));
    fake.on("projects list", ok(&format!("{}\n", projects.join("\n"))));
}
