// SPDX-License-Identifier: PMPL-1.0-or-later

//! Report builder: nesting discipline, summary arithmetic and file handling

use pci_assess::error::ReportError;
use pci_assess::report::{CoverageNote, ReportBuilder, ReportHeader};
use pci_assess::types::{CheckResult, CheckStatus, ComplianceLabel};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn header() -> ReportHeader {
    let mut header = ReportHeader::new("PCI DSS Requirement 1: Network Security Controls", "Project: p1");
    header.requirement = Some("1".to_string());
    header.principal = "auditor@example.com".to_string();
    header
}

fn result(status: CheckStatus, title: &str) -> CheckResult {
    CheckResult::new(status, title, format!("detail for {}", title))
}

fn partial(path: &Path) -> std::path::PathBuf {
    path.with_file_name(format!(
        "{}.partial",
        path.file_name().unwrap().to_string_lossy()
    ))
}

#[test]
fn test_result_without_open_section_is_rejected() {
    let dir = TempDir::new().unwrap();
    let mut report = ReportBuilder::initialize(dir.path().join("r.html"), header()).unwrap();

    let err = report.add_result(result(CheckStatus::Pass, "orphan")).unwrap_err();
    assert!(matches!(err, ReportError::NoOpenSection));
    assert_eq!(report.tally().total(), 0, "rejected results should not be counted");
}

#[test]
fn test_close_without_open_section_is_rejected() {
    let dir = TempDir::new().unwrap();
    let mut report = ReportBuilder::initialize(dir.path().join("r.html"), header()).unwrap();
    assert!(matches!(report.close_section(), Err(ReportError::NoOpenSection)));
}

#[test]
fn test_sections_nest_and_close_in_lifo_order() {
    let dir = TempDir::new().unwrap();
    let mut report = ReportBuilder::initialize(dir.path().join("r.html"), header()).unwrap();

    report.open_section("firewalls", "Firewall rules", true).unwrap();
    report.add_result(result(CheckStatus::Pass, "outer")).unwrap();
    report.open_section("egress", "Egress", false).unwrap();
    assert_eq!(report.depth(), 2);
    assert_eq!(report.open_sections(), vec!["firewalls", "egress"]);
    report.add_result(result(CheckStatus::Fail, "inner")).unwrap();

    assert_eq!(report.close_section().unwrap(), "egress");
    report.add_result(result(CheckStatus::Warning, "outer again")).unwrap();
    assert_eq!(report.close_section().unwrap(), "firewalls");
    assert_eq!(report.depth(), 0);

    let outline = report.outline();
    assert_eq!(outline.len(), 2);
    assert_eq!(outline[0].results.len(), 2);
    assert_eq!(outline[1].parent.as_deref(), Some("firewalls"));
    assert_eq!(outline[1].depth, 1);
    assert_eq!(outline[1].results[0].title, "inner");
}

#[test]
fn test_duplicate_section_id_is_rejected() {
    let dir = TempDir::new().unwrap();
    let mut report = ReportBuilder::initialize(dir.path().join("r.html"), header()).unwrap();

    report.open_section("s1", "First", true).unwrap();
    report.close_section().unwrap();
    let err = report.open_section("s1", "Again", true).unwrap_err();
    assert!(matches!(err, ReportError::DuplicateSectionId(id) if id == "s1"));
}

#[test]
fn test_section_id_that_breaks_markup_is_rejected() {
    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("r.html");
    let mut report = ReportBuilder::initialize(&destination, header()).unwrap();

    let err = report.open_section("x');alert(1);//", "Quoted", true).unwrap_err();
    assert!(matches!(err, ReportError::InvalidSectionId(_)));
    assert_eq!(report.depth(), 0);

    report.open_section("x", "Plain", true).unwrap();
    report.close_section().unwrap();
    let html = fs::read_to_string(report.finalize().unwrap()).unwrap();
    assert!(!html.contains("alert(1)"));
}

#[test]
fn test_finalize_with_open_sections_is_rejected() {
    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("r.html");
    let mut report = ReportBuilder::initialize(&destination, header()).unwrap();
    report.open_section("outer", "Outer", true).unwrap();
    report.open_section("inner", "Inner", true).unwrap();

    match report.finalize().unwrap_err() {
        ReportError::UnclosedSections { open } => assert_eq!(open, vec!["outer", "inner"]),
        other => panic!("expected UnclosedSections, got {:?}", other),
    }
    assert!(!destination.exists(), "a rejected report must not look complete");

    assert_eq!(report.close_all().unwrap(), vec!["inner", "outer"]);
    report.finalize().expect("finalize should succeed once sections are closed");
    assert!(destination.exists());
}

#[test]
fn test_summary_follows_last_section() {
    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("reports").join("pci_req1.html");
    let mut report = ReportBuilder::initialize(&destination, header()).unwrap();

    report.open_section("s1", "Section one", true).unwrap();
    for i in 0..7 {
        report.add_result(result(CheckStatus::Pass, &format!("pass {}", i))).unwrap();
    }
    report.add_result(result(CheckStatus::Fail, "fail 1")).unwrap();
    report.add_result(result(CheckStatus::Fail, "fail 2")).unwrap();
    report.add_result(result(CheckStatus::Warning, "warn")).unwrap();
    report.add_result(result(CheckStatus::Info, "note")).unwrap();

    // Summary requested while the section is still open
    let metrics = report.summarize_tallies().unwrap();
    report.close_section().unwrap();
    let path = report.finalize().unwrap();

    assert_eq!(metrics.total, 10);
    assert_eq!(metrics.passed, 7);
    let percent = metrics.compliance_percent.unwrap();
    assert!((percent - 77.777).abs() < 0.01);
    assert_eq!(metrics.label, ComplianceLabel::PartiallyCompliant);

    let html = fs::read_to_string(&path).unwrap();
    let summary_at = html.find("id=\"compliance-summary\"").unwrap();
    let last_item = html.rfind("class=\"check-item").unwrap();
    assert!(summary_at > last_item, "summary should come after every result");
    assert!(html.contains("Partially Compliant"));
    assert!(html.contains("77.8%"));
    assert!(html.contains("auditor@example.com"));
    assert!(!partial(&destination).exists());
}

#[test]
fn test_warnings_only_is_not_assessable() {
    let dir = TempDir::new().unwrap();
    let mut report = ReportBuilder::initialize(dir.path().join("r.html"), header()).unwrap();

    let metrics = report.summarize(3, 0, 0, 3).unwrap();
    assert_eq!(metrics.compliance_percent, None);
    assert_eq!(metrics.label, ComplianceLabel::NoAssessableChecks);

    let metrics = report.summarize(0, 0, 0, 0).unwrap();
    assert_eq!(metrics.label, ComplianceLabel::NoAssessableChecks);
}

#[test]
fn test_compliance_thresholds() {
    let dir = TempDir::new().unwrap();
    let mut report = ReportBuilder::initialize(dir.path().join("r.html"), header()).unwrap();

    assert_eq!(report.summarize(10, 9, 1, 0).unwrap().label, ComplianceLabel::Compliant);
    assert_eq!(report.summarize(10, 7, 3, 0).unwrap().label, ComplianceLabel::PartiallyCompliant);
    assert_eq!(report.summarize(10, 6, 4, 0).unwrap().label, ComplianceLabel::NonCompliant);
    // Warnings do not dilute the percentage
    assert_eq!(report.summarize(20, 9, 1, 10).unwrap().compliance_percent, Some(90.0));
}

#[test]
fn test_degraded_coverage_is_visible() {
    let dir = TempDir::new().unwrap();
    let mut head = header();
    head.coverage = Some(CoverageNote {
        percent: 75,
        missing: vec!["compute.routes.list".to_string(), "compute.networks.list".to_string()],
    });
    let mut report = ReportBuilder::initialize(dir.path().join("r.html"), head).unwrap();
    report.open_section("s1", "Only", true).unwrap();
    report.add_result(result(CheckStatus::Pass, "ok")).unwrap();
    report.close_section().unwrap();
    let path = report.finalize().unwrap();

    let html = fs::read_to_string(path).unwrap();
    assert!(html.contains("Incomplete coverage"));
    let summary = &html[html.find("id=\"compliance-summary\"").unwrap()..];
    assert!(summary.contains("75%"), "summary should repeat the coverage");
    assert!(summary.contains("compute.routes.list"));
}

#[test]
fn test_markup_in_results_is_escaped() {
    let dir = TempDir::new().unwrap();
    let mut report = ReportBuilder::initialize(dir.path().join("r.html"), header()).unwrap();
    report.open_section("s1", "Only", true).unwrap();
    report
        .add_result(CheckResult::new(CheckStatus::Fail, "<script>x</script>", "a & b"))
        .unwrap();
    report.close_section().unwrap();
    let path = report.finalize().unwrap();

    let html = fs::read_to_string(path).unwrap();
    assert!(html.contains("&lt;script&gt;x&lt;/script&gt;"));
    assert!(html.contains("a &amp; b"));
}

#[test]
fn test_partial_file_removed_on_drop() {
    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("r.html");
    {
        let mut report = ReportBuilder::initialize(&destination, header()).unwrap();
        report.open_section("s1", "Interrupted", true).unwrap();
        assert!(partial(&destination).exists());
    }
    assert!(!partial(&destination).exists());
    assert!(!destination.exists());
}

#[test]
fn test_operations_after_finalize_are_rejected() {
    let dir = TempDir::new().unwrap();
    let mut report = ReportBuilder::initialize(dir.path().join("r.html"), header()).unwrap();
    report.finalize().unwrap();

    assert!(report.is_finalized());
    assert!(matches!(report.open_section("late", "Late", true), Err(ReportError::Finalized)));
    assert!(matches!(report.finalize(), Err(ReportError::Finalized)));
}

#[test]
fn test_unwritable_destination() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, "not a directory").unwrap();

    let err = ReportBuilder::initialize(blocker.join("r.html"), header())
        .err()
        .expect("initialize should fail under a regular file");
    assert!(matches!(err, ReportError::CannotWrite { .. }));
}
