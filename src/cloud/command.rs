// SPDX-License-Identifier: PMPL-1.0-or-later

//! Structured cloud CLI invocations
//!
//! A template is a program token plus arguments without any target
//! qualifier. The target flag is added by [`CommandTemplate::for_target`],
//! never spliced into text.

use crate::error::ScopeError;
use crate::types::Target;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandTemplate {
    program: String,
    args: Vec<String>,
}

impl CommandTemplate {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a textual template such as
    /// `gcloud compute firewall-rules list --format="value(name)"`.
    ///
    /// The first token must be the configured CLI program (a path ending in
    /// it is accepted too). Quotes group words and are removed.
    pub fn parse(text: &str, program: &str) -> Result<Self, ScopeError> {
        let invalid = |reason: String| ScopeError::InvalidTemplate {
            template: text.to_string(),
            reason,
        };

        let mut tokens = tokenize(text).map_err(invalid)?;
        if tokens.is_empty() {
            return Err(invalid("template is empty".to_string()));
        }
        let head = tokens.remove(0);
        let recognised = head == program || head.ends_with(&format!("/{}", program));
        if !recognised {
            return Err(invalid(format!(
                "expected the command to start with '{}', found '{}'",
                program, head
            )));
        }
        if tokens.is_empty() {
            return Err(invalid(format!("'{}' has no verb", head)));
        }
        Ok(Self {
            program: head,
            args: tokens,
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Build the invocation for one target: `<program> <flag>=<target> <args..>`
    pub fn for_target(&self, target: &Target, flag: &str) -> CliCommand {
        let mut args = Vec::with_capacity(self.args.len() + 1);
        args.push(format!("{}={}", flag, target.id));
        args.extend(self.args.iter().cloned());
        CliCommand {
            program: self.program.clone(),
            args,
            target: Some(target.id.clone()),
        }
    }

    /// Build the invocation without a target qualifier
    pub fn unscoped(&self) -> CliCommand {
        CliCommand {
            program: self.program.clone(),
            args: self.args.clone(),
            target: None,
        }
    }
}

impl fmt::Display for CommandTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", render(&self.program, &self.args))
    }
}

/// A fully built invocation, ready for a [`super::CommandRunner`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliCommand {
    pub program: String,
    pub args: Vec<String>,
    pub target: Option<String>,
}

impl fmt::Display for CliCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", render(&self.program, &self.args))
    }
}

fn render(program: &str, args: &[String]) -> String {
    let mut out = program.to_string();
    for arg in args {
        out.push(' ');
        if arg.is_empty() || arg.contains(char::is_whitespace) {
            out.push('\'');
            out.push_str(&arg.replace('\'', "'\\''"));
            out.push('\'');
        } else {
            out.push_str(arg);
        }
    }
    out
}

fn tokenize(text: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) if c == q => quote = None,
            Some('"') if c == '\\' => match chars.next() {
                Some(escaped) => current.push(escaped),
                None => return Err("trailing backslash".to_string()),
            },
            Some(_) => current.push(c),
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    in_token = true;
                }
                '\\' => match chars.next() {
                    Some(escaped) => {
                        current.push(escaped);
                        in_token = true;
                    }
                    None => return Err("trailing backslash".to_string()),
                },
                c if c.is_whitespace() => {
                    if in_token {
                        tokens.push(std::mem::take(&mut current));
                        in_token = false;
                    }
                }
                c => {
                    current.push(c);
                    in_token = true;
                }
            },
        }
    }

    if let Some(q) = quote {
        return Err(format!("unterminated {} quote", q));
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}
