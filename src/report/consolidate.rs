// SPDX-License-Identifier: PMPL-1.0-or-later

//! Consolidated summary across per-requirement reports
//!
//! Reads every `pci_req<N>.html` (also `pci_r<N>` and `pci_requirement<N>`)
//! under a directory, extracts counts and failed findings from the report
//! markup, and renders one card per requirement plus an overall verdict.

use crate::report::html;
use crate::types::SummaryMetrics;
use anyhow::{Context, Result};
use chrono::Utc;
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub title: String,
    pub detail: String,
    pub recommendation: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequirementSummary {
    pub number: u32,
    pub title: String,
    pub source: PathBuf,
    /// SHA-256 of the report file, hex encoded
    pub fingerprint: String,
    pub metrics: SummaryMetrics,
    pub findings: Vec<Finding>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CriticalFinding {
    pub requirement: u32,
    #[serde(flatten)]
    pub finding: Finding,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConsolidatedSummary {
    pub generated_at: String,
    pub directory: PathBuf,
    pub requirements: Vec<RequirementSummary>,
    pub overall: SummaryMetrics,
    pub critical_findings: Vec<CriticalFinding>,
}

#[derive(Debug, Clone)]
pub struct ConsolidateOptions {
    /// Drop findings that only say the principal lacked access
    pub strip_access_denied: bool,
    pub critical_per_requirement: usize,
}

impl Default for ConsolidateOptions {
    fn default() -> Self {
        Self {
            strip_access_denied: false,
            critical_per_requirement: 3,
        }
    }
}

struct Patterns {
    file_name: Regex,
    title: Regex,
    tag_pass: Regex,
    tag_fail: Regex,
    tag_warn: Regex,
    class_pass: Regex,
    class_fail: Regex,
    class_warn: Regex,
    fail_item: Regex,
    item_title: Regex,
    item_detail: Regex,
    item_recommendation: Regex,
    markup: Regex,
    access_denied: Regex,
}

impl Patterns {
    fn new() -> Result<Self, regex::Error> {
        let ci = |pattern: &str| RegexBuilder::new(pattern).case_insensitive(true).build();
        Ok(Self {
            file_name: Regex::new(r"pci_(?:requirement|req|r)(\d+)")?,
            title: Regex::new(r"(?s)<h1[^>]*>(.*?)</h1>")?,
            tag_pass: ci(r"\[PASS\]")?,
            tag_fail: ci(r"\[FAIL\]")?,
            tag_warn: ci(r"\[WARN\]")?,
            class_pass: ci(r#"<div class="check-item pass""#)?,
            class_fail: ci(r#"<div class="check-item fail""#)?,
            class_warn: ci(r#"<div class="check-item warning""#)?,
            fail_item: Regex::new(r#"(?s)<div class="check-item fail">(.*?)\n</div>"#)?,
            item_title: Regex::new(r"(?s)<h3[^>]*>(.*?)</h3>")?,
            item_detail: Regex::new(r#"(?s)<div class="detail">(.*?)</div>"#)?,
            item_recommendation: Regex::new(
                r#"(?s)<div class="recommendation"><strong>Recommendation:</strong>\s*(.*?)</div>"#,
            )?,
            markup: Regex::new(r"<[^>]+>")?,
            access_denied: ci(r"access denied|permission denied|not authorized")?,
        })
    }

    /// Compiled once per process
    fn shared() -> Result<&'static Self, regex::Error> {
        static PATTERNS: OnceLock<Result<Patterns, regex::Error>> = OnceLock::new();
        PATTERNS.get_or_init(Patterns::new).as_ref().map_err(Clone::clone)
    }

    fn strip_markup(&self, text: &str) -> String {
        let text = text.replace("<br>\n", "\n").replace("<br>", "\n");
        html::unescape(&self.markup.replace_all(&text, ""))
            .trim()
            .to_string()
    }
}

/// Requirement number encoded in a report file name
pub fn requirement_number(file_name: &str) -> Option<u32> {
    let patterns = Patterns::shared().ok()?;
    extract_number(patterns, file_name)
}

fn extract_number(patterns: &Patterns, file_name: &str) -> Option<u32> {
    patterns
        .file_name
        .captures(file_name)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Summarize one report's content
pub fn parse_report(number: u32, source: &Path, content: &str, options: &ConsolidateOptions) -> Result<RequirementSummary> {
    let patterns = Patterns::shared()?;
    Ok(parse_with(patterns, number, source, content, options))
}

fn parse_with(
    patterns: &Patterns,
    number: u32,
    source: &Path,
    content: &str,
    options: &ConsolidateOptions,
) -> RequirementSummary {
    let title = patterns
        .title
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| patterns.strip_markup(m.as_str()))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| format!("Requirement {}", number));

    // Older reports carry only tags or only classes; take whichever is larger.
    let count = |tag: &Regex, class: &Regex| tag.find_iter(content).count().max(class.find_iter(content).count());
    let passed = count(&patterns.tag_pass, &patterns.class_pass);
    let failed = count(&patterns.tag_fail, &patterns.class_fail);
    let warnings = count(&patterns.tag_warn, &patterns.class_warn);
    let metrics = SummaryMetrics::compute(passed + failed + warnings, passed, failed, warnings);

    let mut findings = Vec::new();
    for block in patterns.fail_item.captures_iter(content) {
        let Some(body) = block.get(1).map(|m| m.as_str()) else {
            continue;
        };
        let field = |re: &Regex| {
            re.captures(body)
                .and_then(|caps| caps.get(1))
                .map(|m| patterns.strip_markup(m.as_str()))
        };
        let title = field(&patterns.item_title)
            .map(|t| t.trim_start_matches("[FAIL]").trim().to_string())
            .unwrap_or_else(|| "Failed check".to_string());
        findings.push(Finding {
            title,
            detail: field(&patterns.item_detail).unwrap_or_else(|| "No details available".to_string()),
            recommendation: field(&patterns.item_recommendation)
                .unwrap_or_else(|| "No specific recommendation provided.".to_string()),
        });
    }

    if options.strip_access_denied {
        let before = findings.len();
        findings.retain(|f| {
            !patterns.access_denied.is_match(&f.title) && !patterns.access_denied.is_match(&f.detail)
        });
        let stripped = before - findings.len();
        if stripped > 0 {
            tracing::info!(requirement = number, stripped, "dropped access-denied findings");
        }
    }

    RequirementSummary {
        number,
        title,
        source: source.to_path_buf(),
        fingerprint: hex::encode(Sha256::digest(content.as_bytes())),
        metrics,
        findings,
    }
}

/// Walk `directory` and summarize every requirement report found
pub fn collect(directory: &Path, options: &ConsolidateOptions) -> Result<ConsolidatedSummary> {
    if !directory.is_dir() {
        anyhow::bail!("Not a directory: {}", directory.display());
    }
    let patterns = Patterns::shared()?;
    let mut requirements = Vec::new();

    for entry in WalkDir::new(directory).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walking {}", directory.display()))?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().and_then(|e| e.to_str()) != Some("html") {
            continue;
        }
        let Some(number) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|name| extract_number(patterns, name))
        else {
            continue;
        };
        println!("Processing {} (requirement {})", path.display(), number);
        match fs::read_to_string(path) {
            Ok(content) => requirements.push(parse_with(patterns, number, path, &content, options)),
            Err(err) => {
                // An unreadable report still shows up, as a failure.
                tracing::warn!(path = %path.display(), error = %err, "could not read report");
                requirements.push(RequirementSummary {
                    number,
                    title: format!("Requirement {}", number),
                    source: path.to_path_buf(),
                    fingerprint: String::new(),
                    metrics: SummaryMetrics::compute(1, 0, 1, 0),
                    findings: vec![Finding {
                        title: "Error processing report".to_string(),
                        detail: format!("An error occurred while reading this report: {}", err),
                        recommendation: "Check the original report file for details.".to_string(),
                    }],
                });
            }
        }
    }

    if requirements.is_empty() {
        anyhow::bail!("no requirement reports found in {}", directory.display());
    }
    requirements.sort_by(|a, b| a.number.cmp(&b.number).then_with(|| a.source.cmp(&b.source)));

    let (mut passed, mut failed, mut warnings) = (0, 0, 0);
    let mut critical_findings = Vec::new();
    for requirement in &requirements {
        passed += requirement.metrics.passed;
        failed += requirement.metrics.failed;
        warnings += requirement.metrics.warnings;
        critical_findings.extend(
            requirement
                .findings
                .iter()
                .take(options.critical_per_requirement)
                .map(|finding| CriticalFinding {
                    requirement: requirement.number,
                    finding: finding.clone(),
                }),
        );
    }

    Ok(ConsolidatedSummary {
        generated_at: Utc::now().to_rfc3339(),
        directory: directory.to_path_buf(),
        requirements,
        overall: SummaryMetrics::compute(passed + failed + warnings, passed, failed, warnings),
        critical_findings,
    })
}

/// Card-based HTML document for a consolidated summary
pub fn render(summary: &ConsolidatedSummary) -> String {
    let mut out = html::document_open("PCI DSS Compliance Summary");
    out.push_str("<h1>PCI DSS Compliance Summary</h1>\n<div class=\"metadata\">\n");
    out.push_str(&format!(
        "<p><strong>Generated:</strong> {}</p>\n<p><strong>Source:</strong> {}</p>\n<p><strong>Requirements assessed:</strong> {}</p>\n</div>\n",
        html::escape(&summary.generated_at),
        html::escape(&summary.directory.display().to_string()),
        summary.requirements.len()
    ));

    out.push_str("<div class=\"req-cards\">\n");
    for requirement in &summary.requirements {
        out.push_str(&requirement_card(requirement));
    }
    out.push_str("</div>\n");

    if !summary.critical_findings.is_empty() {
        out.push_str(&html::section_open("critical-findings", "Critical Findings", true, false));
        for critical in &summary.critical_findings {
            out.push_str(&format!(
                "<div class=\"finding\"><h3><span class=\"req-number\">Req {}</span> {}</h3>\n<div>{}</div>\n<div class=\"recommendation\"><strong>Recommendation:</strong> {}</div>\n</div>\n",
                critical.requirement,
                html::escape(&critical.finding.title),
                html::escape_multiline(&critical.finding.detail),
                html::escape_multiline(&critical.finding.recommendation)
            ));
        }
        out.push_str(html::section_close());
    }

    out.push_str(&html::summary_block(&summary.overall, None));
    out.push_str(&html::document_close(&summary.generated_at));
    out
}

fn requirement_card(requirement: &RequirementSummary) -> String {
    let metrics = &requirement.metrics;
    let section_id = format!("req-{}-findings", requirement.number);
    let mut card = format!(
        "<div class=\"req-card\">\n<div class=\"req-card-header\"><div class=\"req-number\">REQ {}</div><div class=\"req-title\">{}</div></div>\n<div class=\"req-card-body\">\n<div class=\"req-stats\">\n<div class=\"req-stat\"><div class=\"stat-label\">Status</div><div class=\"stat-value {}\">{}</div></div>\n<div class=\"req-stat\"><div class=\"stat-label\">Compliance</div><div class=\"stat-value\">{}</div></div>\n<div class=\"req-stat\"><div class=\"stat-label\">Passed/Failed</div><div class=\"stat-value\">{}/{}</div></div>\n</div>\n",
        requirement.number,
        html::escape(&requirement.title),
        metrics.label.css_class(),
        metrics.label,
        metrics.percent_display(),
        metrics.passed,
        metrics.failed
    );

    let heading = format!("View Findings ({})", requirement.findings.len());
    card.push_str(&html::section_open(&section_id, &heading, false, true));
    if requirement.findings.is_empty() {
        card.push_str("<p>No failed checks recorded for this requirement.</p>\n");
    }
    for finding in &requirement.findings {
        card.push_str(&format!(
            "<div class=\"finding\"><h4>{}</h4>\n<div>{}</div>\n<div class=\"recommendation\"><strong>Recommendation:</strong> {}</div>\n</div>\n",
            html::escape(&finding.title),
            html::escape_multiline(&finding.detail),
            html::escape_multiline(&finding.recommendation)
        ));
    }
    card.push_str(html::section_close());
    if !requirement.fingerprint.is_empty() {
        card.push_str(&format!(
            "<div class=\"fingerprint\">{} sha256:{}</div>\n",
            html::escape(&requirement.source.display().to_string()),
            requirement.fingerprint
        ));
    }
    card.push_str("</div>\n</div>\n");
    card
}

/// Write the HTML summary, plus a JSON export when `json` is given
pub fn write(summary: &ConsolidatedSummary, path: &Path, json: Option<&Path>) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, render(summary)).with_context(|| format!("writing {}", path.display()))?;
    if let Some(json_path) = json {
        let payload = serde_json::to_string_pretty(summary)?;
        fs::write(json_path, payload).with_context(|| format!("writing {}", json_path.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patterns_are_compiled_once() {
        let first = Patterns::shared().expect("patterns should compile");
        assert_eq!(requirement_number("pci_req12_report.html"), Some(12));
        let second = Patterns::shared().expect("patterns should compile");
        assert!(std::ptr::eq(first, second));
    }
}
