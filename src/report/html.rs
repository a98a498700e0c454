// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTML fragments shared by the requirement report and the consolidated summary

use crate::types::{CheckResult, SummaryMetrics};

pub const STYLE: &str = r#"<style>
body { font-family: -apple-system, "Segoe UI", Roboto, Helvetica, Arial, sans-serif; margin: 0; padding: 24px; background: #f5f7fa; color: #222; }
h1 { margin-top: 0; color: #1a365d; }
.metadata { background: #fff; border: 1px solid #dde3ea; border-radius: 6px; padding: 12px 16px; margin-bottom: 16px; }
.metadata p { margin: 4px 0; }
.banner { border-radius: 6px; padding: 12px 16px; margin-bottom: 16px; }
.banner.degraded { background: #fff4e5; border: 1px solid #f0b429; }
.section { background: #fff; border: 1px solid #dde3ea; border-radius: 6px; margin: 10px 0; }
.section.nested { margin: 8px 12px; border-color: #e8edf2; }
.section-header { cursor: pointer; padding: 10px 14px; font-weight: 600; background: #edf2f7; border-radius: 6px 6px 0 0; }
.section-content { padding: 8px 14px; }
.toggle-icon { display: inline-block; width: 1em; font-family: monospace; }
.check-item { border-left: 4px solid #a0aec0; padding: 6px 12px; margin: 8px 0; background: #fafbfc; }
.check-item h3 { font-size: 1em; margin: 0 0 4px 0; }
.check-item.pass { border-color: #38a169; }
.check-item.fail { border-color: #e53e3e; }
.check-item.warning { border-color: #dd6b20; }
.check-item.info { border-color: #3182ce; }
.tag { font-family: monospace; margin-right: 6px; }
.pass .tag { color: #38a169; } .fail .tag { color: #e53e3e; } .warning .tag { color: #dd6b20; } .info .tag { color: #3182ce; }
.recommendation { margin-top: 4px; color: #2c5282; }
.summary { background: #fff; border: 2px solid #1a365d; border-radius: 6px; padding: 12px 16px; margin-top: 20px; }
.summary-label { font-size: 1.3em; font-weight: 700; margin: 6px 0; }
.compliant { color: #38a169; } .partial { color: #dd6b20; } .non-compliant { color: #e53e3e; } .not-applicable { color: #718096; }
.progress { background: #e2e8f0; border-radius: 4px; height: 14px; overflow: hidden; margin: 8px 0; }
.progress-bar { height: 100%; background: #38a169; }
.progress-bar.partial { background: #dd6b20; } .progress-bar.non-compliant { background: #e53e3e; }
table.counts td { padding: 2px 12px 2px 0; }
.req-cards { display: flex; flex-direction: column; gap: 12px; }
.req-card { background: #fff; border: 1px solid #dde3ea; border-radius: 6px; }
.req-card-header { display: flex; gap: 12px; padding: 10px 14px; background: #edf2f7; border-radius: 6px 6px 0 0; }
.req-number { font-weight: 700; color: #1a365d; }
.req-card-body { padding: 10px 14px; }
.req-stats { display: flex; gap: 24px; margin-bottom: 8px; }
.stat-label { font-size: 0.8em; color: #718096; }
.stat-value { font-weight: 600; }
.fingerprint { font-family: monospace; font-size: 0.75em; color: #718096; }
footer { margin-top: 24px; font-size: 0.85em; color: #718096; }
</style>"#;

pub const SCRIPT: &str = r#"<script>
function toggleSection(id) {
  var content = document.getElementById(id);
  if (!content) { return; }
  var hidden = content.style.display === "none";
  content.style.display = hidden ? "block" : "none";
  var header = content.previousElementSibling;
  if (header) {
    var icon = header.querySelector(".toggle-icon");
    if (icon) { icon.textContent = hidden ? "-" : "+"; }
  }
}
</script>"#;

/// Escape text for element content and double-quoted attributes
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape and keep line breaks visible
pub fn escape_multiline(text: &str) -> String {
    text.lines().map(escape).collect::<Vec<_>>().join("<br>\n")
}

/// Inverse of [`escape_multiline`], used when reading reports back
pub fn unescape(text: &str) -> String {
    text.replace("<br>\n", "\n")
        .replace("<br>", "\n")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

pub fn document_open(title: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n{}\n{}\n</head>\n<body>\n",
        escape(title),
        STYLE,
        SCRIPT
    )
}

pub fn document_close(completed_at: &str) -> String {
    format!(
        "<footer>Report completed: {}</footer>\n</body>\n</html>\n",
        escape(completed_at)
    )
}

/// Section ids end up inside an inline script string and an element id,
/// so only `[A-Za-z0-9_.-]` is allowed.
pub fn is_section_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

pub fn section_open(id: &str, title: &str, expanded: bool, nested: bool) -> String {
    let class = if nested { "section nested" } else { "section" };
    let (icon, display) = if expanded { ("-", "block") } else { ("+", "none") };
    format!(
        "<div class=\"{class}\" id=\"section-{id}\">\n<div class=\"section-header\" onclick=\"toggleSection('{id}')\"><span class=\"toggle-icon\">{icon}</span> {title}</div>\n<div class=\"section-content\" id=\"{id}\" style=\"display: {display}\">\n",
        class = class,
        id = escape(id),
        icon = icon,
        title = escape(title),
        display = display
    )
}

pub fn section_close() -> &'static str {
    "</div>\n</div>\n"
}

pub fn check_item(result: &CheckResult) -> String {
    let mut html = format!(
        "<div class=\"check-item {}\">\n<h3><span class=\"tag\">{}</span> {}</h3>\n<div class=\"detail\">{}</div>\n",
        result.status.css_class(),
        result.status.tag(),
        escape(&result.title),
        escape_multiline(&result.detail)
    );
    if let Some(recommendation) = &result.recommendation {
        html.push_str(&format!(
            "<div class=\"recommendation\"><strong>Recommendation:</strong> {}</div>\n",
            escape_multiline(recommendation)
        ));
    }
    html.push_str("</div>\n");
    html
}

/// Non-collapsible summary block with progress bar and qualitative label
pub fn summary_block(metrics: &SummaryMetrics, coverage: Option<(u8, &[String])>) -> String {
    let css = metrics.label.css_class();
    let width = metrics.compliance_percent.unwrap_or(0.0).clamp(0.0, 100.0);
    let mut html = format!(
        "<div class=\"summary\" id=\"compliance-summary\">\n<h2>Compliance Summary</h2>\n<div class=\"summary-label {css}\">{label}</div>\n<div class=\"progress\"><div class=\"progress-bar {css}\" style=\"width: {width:.1}%\"></div></div>\n",
        css = css,
        label = metrics.label,
        width = width
    );
    html.push_str(&format!(
        "<table class=\"counts\">\n<tr><td>Total checks</td><td>{}</td></tr>\n<tr><td>Passed</td><td>{}</td></tr>\n<tr><td>Failed</td><td>{}</td></tr>\n<tr><td>Warnings</td><td>{}</td></tr>\n<tr><td>Compliance</td><td>{}</td></tr>\n</table>\n",
        metrics.total,
        metrics.passed,
        metrics.failed,
        metrics.warnings,
        metrics.percent_display()
    ));
    if let Some((percent, missing)) = coverage {
        html.push_str(&coverage_line(percent, missing));
    }
    html.push_str("</div>\n");
    html
}

pub fn coverage_line(percent: u8, missing: &[String]) -> String {
    if missing.is_empty() {
        format!("<p class=\"coverage\"><strong>Permission coverage:</strong> {}%</p>\n", percent)
    } else {
        format!(
            "<p class=\"coverage degraded\"><strong>Permission coverage:</strong> {}% (missing: {})</p>\n",
            percent,
            escape(&missing.join(", "))
        )
    }
}
