// SPDX-License-Identifier: PMPL-1.0-or-later

//! End-to-end requirement runs against a scripted CLI

mod common;

use common::{denied, fail, ok, organization, single_project, FakeCli};
use pci_assess::assess;
use pci_assess::gate::{AssumeNo, AssumeYes};
use pci_assess::plan::RequirementPlan;
use pci_assess::scope::ScopeDecl;
use pci_assess::types::{ComplianceLabel, GateDecision};
use std::fs;
use tempfile::TempDir;

const PLAN: &str = r#"
requirement: "1"
title: Network Security Controls
permissions:
  - compute.firewalls.list
  - compute.networks.list
sections:
  - id: firewalls
    title: Firewall rules
    checks:
      - title: No rules open to the internet
        command: gcloud compute firewalls list --format="value(name)"
        recommendation: Restrict source ranges to known networks
    sections:
      - id: networks
        title: Networks
        checks:
          - title: A VPC network is defined
            command: gcloud compute networks list --format="value(name)"
            expect: non_empty
"#;

fn plan() -> RequirementPlan {
    let plan: RequirementPlan = serde_yaml::from_str(PLAN).unwrap();
    plan.validate().unwrap();
    plan
}

fn this_project() -> ScopeDecl {
    ScopeDecl::Single { target: None }
}

#[test]
fn test_full_run_writes_report() {
    let fake = FakeCli::new();
    single_project(&fake);
    fake.on("--limit=1", ok(""));
    fake.on("compute firewalls list --format", ok("allow-ssh-world\n"));
    fake.on("compute networks list --format", ok("default\n"));
    let cli = fake.cli();
    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("pci_req1.html");

    let outcome = assess::run(&cli, &plan(), &this_project(), &destination, &mut AssumeNo).unwrap();

    assert_eq!(outcome.decision, GateDecision::Proceed);
    assert_eq!(outcome.coverage, 100);
    let metrics = outcome.metrics.expect("a report should be summarized");
    assert_eq!((metrics.passed, metrics.failed), (1, 1));
    assert_eq!(metrics.label, ComplianceLabel::NonCompliant);
    assert_eq!(outcome.report_path.as_deref(), Some(destination.as_path()));

    let html = fs::read_to_string(&destination).unwrap();
    assert!(html.contains("Resource: allow-ssh-world"));
    assert!(html.contains("Restrict source ranges to known networks"));
    assert!(html.contains("auditor@example.com"));
    assert!(html.contains("id=\"section-networks\""));
    assert!(html.find("section-firewalls").unwrap() < html.find("section-networks").unwrap());
    assert!(fake
        .calls()
        .contains(&"gcloud --project=p1 compute firewalls list --format=value(name)".to_string()));
}

#[test]
fn test_gate_abort_writes_nothing() {
    let fake = FakeCli::new();
    single_project(&fake);
    fake.on("--limit=1", denied());
    let cli = fake.cli();
    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("pci_req1.html");

    let outcome = assess::run(&cli, &plan(), &this_project(), &destination, &mut AssumeYes).unwrap();

    assert!(outcome.aborted());
    assert_eq!(outcome.coverage, 0);
    assert_eq!(outcome.missing.len(), 2);
    assert!(outcome.metrics.is_none());
    assert!(!destination.exists());
    assert_eq!(fake.calls_matching("--format=value(name)"), 0, "no check should run");
}

#[test]
fn test_degraded_run_is_marked() {
    let fake = FakeCli::new();
    single_project(&fake);
    fake.on("compute firewalls list --limit=1", ok(""));
    fake.on("compute networks list --limit=1", denied());
    fake.on("compute firewalls list --format", ok(""));
    fake.on("compute networks list --format", ok("default\n"));
    let cli = fake.cli();
    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("pci_req1.html");

    let declined = assess::run(&cli, &plan(), &this_project(), &destination, &mut AssumeNo).unwrap();
    assert_eq!(declined.decision, GateDecision::Abort);
    assert!(!destination.exists());

    let outcome = assess::run(&cli, &plan(), &this_project(), &destination, &mut AssumeYes).unwrap();
    assert_eq!(outcome.decision, GateDecision::ProceedDegraded);
    assert_eq!(outcome.coverage, 50);
    assert_eq!(outcome.missing, vec!["compute.networks.list"]);

    let html = fs::read_to_string(&destination).unwrap();
    assert!(html.contains("Incomplete coverage"));
    assert!(html.contains("compute.networks.list"));
}

#[test]
fn test_check_failing_everywhere_is_recorded_not_fatal() {
    let fake = FakeCli::new();
    single_project(&fake);
    fake.on("--limit=1", ok(""));
    fake.on("compute firewalls list --format", fail(1, "ERROR: backend unavailable"));
    fake.on("compute networks list --format", ok("default\n"));
    let cli = fake.cli();
    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("pci_req1.html");

    let outcome = assess::run(&cli, &plan(), &this_project(), &destination, &mut AssumeNo).unwrap();
    let metrics = outcome.metrics.unwrap();
    assert_eq!((metrics.passed, metrics.failed, metrics.warnings), (1, 0, 1));

    let html = fs::read_to_string(&destination).unwrap();
    assert!(html.contains("(not evaluated)"));
    assert!(html.contains("backend unavailable"));
}

#[test]
fn test_organization_run_tags_findings_by_project() {
    let fake = FakeCli::new();
    organization(&fake, &["alpha", "bravo"]);
    fake.on("--limit=1", ok(""));
    fake.on("--project=alpha compute firewalls list --format", ok("fw-a\n"));
    fake.on("--project=bravo compute firewalls list --format", ok(""));
    fake.on("compute networks list --format", ok("default\n"));
    let cli = fake.cli();
    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("pci_req1.html");
    let scope = ScopeDecl::Organization {
        id: "org1".to_string(),
    };

    let outcome = assess::run(&cli, &plan(), &scope, &destination, &mut AssumeNo).unwrap();
    assert_eq!(outcome.metrics.unwrap().failed, 1);

    let html = fs::read_to_string(&destination).unwrap();
    assert!(html.contains("Target: alpha | Resource: fw-a"));
    assert!(html.contains("Organization: org1 (2 projects)"));
    assert_eq!(fake.calls_matching("projects list"), 1);
    assert_eq!(fake.calls_matching("--project=alpha compute firewalls list --limit=1"), 1);
}

#[test]
fn test_invalid_check_command_fails_before_any_call() {
    let fake = FakeCli::new();
    single_project(&fake);
    let cli = fake.cli();
    let mut plan = plan();
    plan.sections[0].checks[0].command = "aws ec2 describe-security-groups".to_string();
    let dir = TempDir::new().unwrap();

    let err = assess::run(
        &cli,
        &plan,
        &this_project(),
        &dir.path().join("r.html"),
        &mut AssumeYes,
    )
    .unwrap_err();
    assert!(format!("{:#}", err).contains("No rules open to the internet"));
    assert!(fake.calls().is_empty());
}

#[test]
fn test_probe_only_reports_coverage() {
    let fake = FakeCli::new();
    single_project(&fake);
    fake.on("compute firewalls list --limit=1", ok(""));
    let cli = fake.cli();

    let result = assess::probe_permissions(&cli, &plan(), &this_project()).unwrap();
    assert_eq!(result.coverage_percent(), 50);
    assert_eq!(fake.calls_matching("--format=value(name)"), 0);
}
