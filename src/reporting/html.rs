//! # HTML Reporting Module / HTML 报告模块
//!
//! Renders a finished run as a standalone HTML page: summary counters, one
//! table row per unit of work, and the failure details of failing units.
//!
//! 将已完成的运行渲染为独立的 HTML 页面：摘要计数、每个工作单元一行表格，
//! 以及失败单元的失败详情。

use anyhow::{Context, Result};
use maud::{DOCTYPE, Markup, PreEscaped, html};
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::models::{ExecutedUnitOfWork, FailureKind};
use crate::core::notifier::{Notifier, RunInfo};
use crate::infra::t;
use crate::reporting::report::{ReportBuilder, RunReport, UnitReport};

/// Embedded CSS styles for HTML reports / HTML 报告的嵌入式 CSS 样式
const HTML_STYLE: &str = r#"
body { font-family: -apple-system, "Segoe UI", sans-serif; margin: 2rem; color: #222; }
h1 { font-size: 1.6rem; }
.summary-container { display: flex; gap: 1.5rem; margin: 1rem 0 2rem; }
.summary-item { display: flex; flex-direction: column; align-items: center; }
.count { font-size: 1.8rem; font-weight: bold; }
.passed-text { color: #2e7d32; }
.failed-text { color: #c62828; }
table { border-collapse: collapse; width: 100%; }
th, td { border-bottom: 1px solid #ddd; padding: 0.4rem 0.6rem; text-align: left; vertical-align: top; }
.id-cell { font-family: monospace; color: #777; }
.duration-cell { text-align: right; white-space: nowrap; }
.status-cell { font-weight: bold; }
.status-passed { color: #2e7d32; }
.status-assertion { color: #c62828; }
.status-code_exception { color: #ef6c00; }
pre.output-content { background: #f6f6f6; padding: 0.6rem; white-space: pre-wrap; margin: 0.3rem 0; }
"#;

pub struct HtmlNotifier {
    path: PathBuf,
    locale: String,
    builder: ReportBuilder,
}

impl HtmlNotifier {
    /// Renders in the current locale.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_locale(path, &rust_i18n::locale())
    }

    pub fn with_locale(path: impl Into<PathBuf>, locale: &str) -> Self {
        Self {
            path: path.into(),
            locale: locale.to_string(),
            builder: ReportBuilder::default(),
        }
    }
}

/// Renders `report` as a complete HTML document.
///
/// 将 `report` 渲染为完整的 HTML 文档。
pub fn render_html_report(report: &RunReport, locale: &str) -> Markup {
    let summary = report.summary;
    html! {
        (DOCTYPE)
        html {
            head {
                meta charset="utf-8";
                title { (t!("html_report.title", locale = locale)) }
                style { (PreEscaped(HTML_STYLE)) }
            }
            body {
                h1 { (t!("html_report.main_header", locale = locale)) }
                p {
                    (t!(
                        "html_report.started",
                        locale = locale,
                        time = report.started_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                        scheduler = report.scheduler.as_str(),
                        workers = report.workers
                    ))
                }
                div class="summary-container" {
                    div class="summary-item" {
                        span class="count" { (summary.total) }
                        span class="label" { (t!("html_report.summary.total", locale = locale)) }
                    }
                    div class="summary-item" {
                        span class="count passed-text" { (summary.passed) }
                        span class="label" { (t!("html_report.summary.passed", locale = locale)) }
                    }
                    div class="summary-item" {
                        span class="count failed-text" { (summary.failed) }
                        span class="label" { (t!("html_report.summary.failed", locale = locale)) }
                    }
                }
                table {
                    thead {
                        tr {
                            th { (t!("html_report.table.header.id", locale = locale)) }
                            th { (t!("html_report.table.header.name", locale = locale)) }
                            th { (t!("html_report.table.header.status", locale = locale)) }
                            th class="duration-cell" { (t!("html_report.table.header.duration", locale = locale)) }
                        }
                    }
                    tbody {
                        @for unit in &report.units {
                            (render_unit(unit, locale))
                        }
                    }
                }
            }
        }
    }
}

fn render_unit(unit: &UnitReport, locale: &str) -> Markup {
    let (status, class) = match unit.failures.first().map(|failure| failure.kind) {
        None => (t!("html_report.status.passed", locale = locale), "status-passed"),
        Some(FailureKind::Assertion) => (
            t!("html_report.status.failed", locale = locale),
            "status-assertion",
        ),
        Some(FailureKind::CodeException) => (
            t!("html_report.status.error", locale = locale),
            "status-code_exception",
        ),
    };

    html! {
        tr {
            td class="id-cell" { (unit.id) }
            td {
                (unit.name)
                @for failure in &unit.failures {
                    pre class="output-content" {
                        (failure.message)
                        @for frame in failure.trace.frames() {
                            "\n    " (frame)
                        }
                    }
                }
            }
            td class={ "status-cell " (class) } { (status) }
            td class="duration-cell" { (format!("{:.2} ms", unit.duration_ms)) }
        }
    }
}

/// Writes the rendered report to `path`, creating missing parent directories.
pub fn write_html_report(report: &RunReport, path: &Path, locale: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let markup = render_html_report(report, locale);
    fs::write(path, markup.into_string())
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

impl Notifier for HtmlNotifier {
    fn run_start(&mut self, info: &RunInfo) {
        self.builder.start(info);
    }

    fn evaluate_finish(&mut self, executed: &ExecutedUnitOfWork) {
        self.builder.record(executed);
    }

    /// Fails the run only when the report cannot be written.
    fn run_finish(&mut self) -> bool {
        let report = self.builder.finish();
        match write_html_report(report, &self.path, &self.locale) {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "HTML report written");
                true
            }
            Err(error) => {
                tracing::error!(path = %self.path.display(), error = format!("{error:#}"), "failed to write HTML report");
                false
            }
        }
    }
}
