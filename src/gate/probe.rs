// SPDX-License-Identifier: PMPL-1.0-or-later

//! Side-effect-free capability probes
//!
//! A permission is probed with a list-with-limit-1 call. Explicit denials
//! are final; anything ambiguous is retried up to the profile's
//! `probe_retries` and then treated as missing.

use crate::cloud::{CloudCli, CommandTemplate};
use crate::types::{MissingReason, PermissionStatus, Target};

/// Classification of a single probe attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Available,
    Denied(String),
    Inconclusive(String),
}

/// Derive a probe from a dotted permission id:
/// `compute.firewalls.list` becomes `<cli> compute firewalls list --limit=1`.
/// CamelCase resource segments are rewritten to kebab-case.
pub fn derive_probe(cli: &CloudCli, permission: &str) -> Option<CommandTemplate> {
    let parts: Vec<&str> = permission.split('.').filter(|p| !p.is_empty()).collect();
    let resources: &[&str] = match parts.len() {
        0 | 1 => return None,
        2 => &parts[1..],
        n => &parts[1..n - 1],
    };
    let mut args = vec![parts[0].to_lowercase()];
    args.extend(resources.iter().map(|r| kebab_case(r)));
    args.push("list".to_string());
    args.push("--limit=1".to_string());
    Some(cli.template(args))
}

fn kebab_case(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len() + 4);
    for (i, c) in segment.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('-');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

pub fn probe_once(cli: &CloudCli, template: &CommandTemplate, target: Option<&Target>) -> ProbeOutcome {
    let command = match target {
        Some(target) => template.for_target(target, cli.target_flag()),
        None => template.unscoped(),
    };
    match cli.run(&command) {
        Err(err) => ProbeOutcome::Inconclusive(format!("could not run probe: {}", err)),
        Ok(output) if output.success() => ProbeOutcome::Available,
        Ok(output) if output.timed_out => ProbeOutcome::Inconclusive(output.failure_reason()),
        Ok(output) if cli.is_empty_result(&output) => ProbeOutcome::Available,
        Ok(output) if cli.is_denied(&output) => ProbeOutcome::Denied(output.failure_reason()),
        Ok(output) => ProbeOutcome::Inconclusive(output.failure_reason()),
    }
}

/// Probe with the retry policy applied; returns the final status and, for
/// missing permissions, the reason shown in reports.
pub fn probe_with_policy(
    cli: &CloudCli,
    template: Option<&CommandTemplate>,
    permission: &str,
    target: Option<&Target>,
) -> (PermissionStatus, Option<String>) {
    let Some(template) = template else {
        return (
            PermissionStatus::Missing(MissingReason::Inconclusive),
            Some(format!("no probe available for '{}'", permission)),
        );
    };

    let attempts = cli.profile().probe_retries + 1;
    let mut last_reason = String::new();
    for attempt in 1..=attempts {
        match probe_once(cli, template, target) {
            ProbeOutcome::Available => return (PermissionStatus::Available, None),
            ProbeOutcome::Denied(reason) => {
                return (PermissionStatus::Missing(MissingReason::Denied), Some(reason))
            }
            ProbeOutcome::Inconclusive(reason) => {
                tracing::warn!(permission, attempt, attempts, reason = %reason, "inconclusive probe");
                last_reason = reason;
            }
        }
    }
    (
        PermissionStatus::Missing(MissingReason::Inconclusive),
        Some(last_reason),
    )
}

#[cfg(test)]
mod tests {
    use super::kebab_case;

    #[test]
    fn kebab_case_splits_camel_case() {
        assert_eq!(kebab_case("serviceAccounts"), "service-accounts");
        assert_eq!(kebab_case("firewalls"), "firewalls");
    }
}
