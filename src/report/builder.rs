// SPDX-License-Identifier: PMPL-1.0-or-later

//! Streaming HTML report with a strictly nested section stack
//!
//! The document is written to `<destination>.partial` as the run goes and
//! renamed onto the destination by [`ReportBuilder::finalize`]. Dropping an
//! unfinished builder deletes the partial file; until then the file is
//! tracked in [`cleanup`] for interrupt handlers.

use crate::error::ReportError;
use crate::report::{cleanup, html};
use crate::types::{CheckResult, SummaryMetrics, Tally};
use chrono::Utc;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Metadata written at the top of the report
#[derive(Debug, Clone, Default)]
pub struct ReportHeader {
    pub title: String,
    pub scope: String,
    pub principal: String,
    pub requirement: Option<String>,
    pub coverage: Option<CoverageNote>,
}

impl ReportHeader {
    pub fn new(title: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            scope: scope.into(),
            principal: "unknown".to_string(),
            ..Default::default()
        }
    }
}

/// Permission coverage carried into the header and the summary block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageNote {
    pub percent: u8,
    pub missing: Vec<String>,
}

impl CoverageNote {
    pub fn is_degraded(&self) -> bool {
        self.percent < 100
    }
}

/// A section as recorded in the report outline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionRecord {
    pub id: String,
    pub title: String,
    pub expanded: bool,
    pub depth: usize,
    pub parent: Option<String>,
    pub results: Vec<CheckResult>,
}

pub struct ReportBuilder {
    destination: PathBuf,
    partial: PathBuf,
    writer: Option<BufWriter<File>>,
    outline: Vec<SectionRecord>,
    stack: Vec<usize>,
    section_ids: HashSet<String>,
    tally: Tally,
    summary: Option<SummaryMetrics>,
    coverage: Option<CoverageNote>,
    finalized: bool,
}

impl ReportBuilder {
    /// Create the report and write its metadata header
    pub fn initialize(destination: impl AsRef<Path>, header: ReportHeader) -> Result<Self, ReportError> {
        let destination = destination.as_ref().to_path_buf();
        let partial = partial_path(&destination);
        let cannot_write = |source| ReportError::CannotWrite {
            path: destination.clone(),
            source,
        };

        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(cannot_write)?;
        }
        let file = File::create(&partial).map_err(cannot_write)?;
        cleanup::track(&partial);

        let mut builder = Self {
            destination: destination.clone(),
            partial,
            writer: Some(BufWriter::new(file)),
            outline: Vec::new(),
            stack: Vec::new(),
            section_ids: HashSet::new(),
            tally: Tally::default(),
            summary: None,
            coverage: header.coverage.clone(),
            finalized: false,
        };
        builder.write(&html::document_open(&header.title))?;
        builder.write(&header_block(&header))?;
        Ok(builder)
    }

    /// Push a section; results added next belong to it
    pub fn open_section(&mut self, id: &str, title: &str, expanded: bool) -> Result<(), ReportError> {
        self.ensure_open()?;
        if !html::is_section_id(id) {
            return Err(ReportError::InvalidSectionId(id.to_string()));
        }
        if self.section_ids.contains(id) {
            return Err(ReportError::DuplicateSectionId(id.to_string()));
        }
        let parent = self.stack.last().map(|&i| self.outline[i].id.clone());
        let depth = self.stack.len();
        self.write(&html::section_open(id, title, expanded, depth > 0))?;

        self.section_ids.insert(id.to_string());
        self.outline.push(SectionRecord {
            id: id.to_string(),
            title: title.to_string(),
            expanded,
            depth,
            parent,
            results: Vec::new(),
        });
        self.stack.push(self.outline.len() - 1);
        Ok(())
    }

    /// Append a result to the innermost open section
    pub fn add_result(&mut self, result: CheckResult) -> Result<(), ReportError> {
        self.ensure_open()?;
        let &index = self.stack.last().ok_or(ReportError::NoOpenSection)?;
        self.write(&html::check_item(&result))?;
        self.tally.record(result.status);
        self.outline[index].results.push(result);
        Ok(())
    }

    /// Pop the innermost section, returning its id
    pub fn close_section(&mut self) -> Result<String, ReportError> {
        self.ensure_open()?;
        let index = self.stack.pop().ok_or(ReportError::NoOpenSection)?;
        self.write(html::section_close())?;
        Ok(self.outline[index].id.clone())
    }

    /// Close every open section, innermost first
    pub fn close_all(&mut self) -> Result<Vec<String>, ReportError> {
        let mut closed = Vec::new();
        while !self.stack.is_empty() {
            let id = self.close_section()?;
            tracing::warn!(section = %id, "closing section left open");
            closed.push(id);
        }
        Ok(closed)
    }

    /// Compute the compliance summary from explicit counts. The block is
    /// rendered after the last section when the report is finalized.
    pub fn summarize(
        &mut self,
        total: usize,
        passed: usize,
        failed: usize,
        warnings: usize,
    ) -> Result<SummaryMetrics, ReportError> {
        self.ensure_open()?;
        let metrics = SummaryMetrics::compute(total, passed, failed, warnings);
        self.summary = Some(metrics);
        Ok(metrics)
    }

    /// Summarize from the counters accumulated by [`Self::add_result`]
    pub fn summarize_tallies(&mut self) -> Result<SummaryMetrics, ReportError> {
        let tally = self.tally;
        self.summarize(tally.total(), tally.passed, tally.failed, tally.warnings)
    }

    /// Write the summary and footer, then move the report into place.
    ///
    /// Rejected while sections are open. Without a prior `summarize` call
    /// the running counters are used.
    pub fn finalize(&mut self) -> Result<PathBuf, ReportError> {
        self.ensure_open()?;
        if !self.stack.is_empty() {
            return Err(ReportError::UnclosedSections {
                open: self.open_sections(),
            });
        }

        let metrics = match self.summary {
            Some(metrics) => metrics,
            None => self.summarize_tallies()?,
        };
        let coverage = self
            .coverage
            .as_ref()
            .map(|c| (c.percent, c.missing.as_slice()));
        let block = html::summary_block(&metrics, coverage);
        self.write(&block)?;
        let completed_at = Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();
        self.write(&html::document_close(&completed_at))?;

        if let Some(mut writer) = self.writer.take() {
            writer.flush().map_err(|source| self.cannot_write(source))?;
        }
        fs::rename(&self.partial, &self.destination).map_err(|source| self.cannot_write(source))?;
        cleanup::untrack(&self.partial);
        self.finalized = true;
        Ok(self.destination.clone())
    }

    pub fn tally(&self) -> Tally {
        self.tally
    }

    pub fn summary(&self) -> Option<&SummaryMetrics> {
        self.summary.as_ref()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Ids of the open sections, outermost first
    pub fn open_sections(&self) -> Vec<String> {
        self.stack
            .iter()
            .map(|&i| self.outline[i].id.clone())
            .collect()
    }

    pub fn outline(&self) -> &[SectionRecord] {
        &self.outline
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    fn ensure_open(&self) -> Result<(), ReportError> {
        if self.finalized {
            Err(ReportError::Finalized)
        } else {
            Ok(())
        }
    }

    fn write(&mut self, fragment: &str) -> Result<(), ReportError> {
        let result = match self.writer.as_mut() {
            Some(writer) => writer.write_all(fragment.as_bytes()),
            None => return Err(ReportError::Finalized),
        };
        result.map_err(|source| self.cannot_write(source))
    }

    fn cannot_write(&self, source: std::io::Error) -> ReportError {
        ReportError::CannotWrite {
            path: self.partial.clone(),
            source,
        }
    }
}

impl Drop for ReportBuilder {
    fn drop(&mut self) {
        if self.finalized {
            return;
        }
        drop(self.writer.take());
        if self.partial.exists() {
            if let Err(err) = fs::remove_file(&self.partial) {
                tracing::warn!(path = %self.partial.display(), error = %err, "could not remove partial report");
            }
        }
        cleanup::untrack(&self.partial);
    }
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "report.html".into());
    name.push(".partial");
    destination.with_file_name(name)
}

fn header_block(header: &ReportHeader) -> String {
    let captured_at = Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();
    let mut html = format!("<h1>{}</h1>\n<div class=\"metadata\">\n", html::escape(&header.title));
    if let Some(requirement) = &header.requirement {
        html.push_str(&format!(
            "<p><strong>Requirement:</strong> {}</p>\n",
            html::escape(requirement)
        ));
    }
    html.push_str(&format!("<p><strong>Generated:</strong> {}</p>\n", captured_at));
    html.push_str(&format!(
        "<p><strong>Principal:</strong> {}</p>\n",
        html::escape(&header.principal)
    ));
    html.push_str(&format!(
        "<p><strong>Scope:</strong> {}</p>\n",
        html::escape(&header.scope)
    ));
    if let Some(coverage) = &header.coverage {
        html.push_str(&html::coverage_line(coverage.percent, &coverage.missing));
    }
    html.push_str("</div>\n");

    if let Some(coverage) = header.coverage.as_ref().filter(|c| c.is_degraded()) {
        html.push_str(&format!(
            "<div class=\"banner degraded\"><strong>Incomplete coverage:</strong> only {}% of the permissions this requirement needs were available. Checks depending on {} may be missing or inaccurate.</div>\n",
            coverage.percent,
            html::escape(&coverage.missing.join(", "))
        ));
    }
    html
}
