//! # JSON Reporting Module / JSON 报告模块
//!
//! Writes the whole run as one pretty-printed JSON document when the run
//! finishes.
//!
//! 运行结束时将整个运行写为一个格式化的 JSON 文档。

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::models::ExecutedUnitOfWork;
use crate::core::notifier::{Notifier, RunInfo};
use crate::reporting::report::{ReportBuilder, RunReport};

pub struct JsonNotifier {
    path: PathBuf,
    builder: ReportBuilder,
}

impl JsonNotifier {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            builder: ReportBuilder::default(),
        }
    }

    pub fn report(&self) -> &RunReport {
        self.builder.report()
    }
}

/// Serializes `report` to `path`, creating missing parent directories.
pub fn write_json_report(report: &RunReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

impl Notifier for JsonNotifier {
    fn run_start(&mut self, info: &RunInfo) {
        self.builder.start(info);
    }

    fn evaluate_finish(&mut self, executed: &ExecutedUnitOfWork) {
        self.builder.record(executed);
    }

    /// Fails the run only when the report cannot be written.
    fn run_finish(&mut self) -> bool {
        let report = self.builder.finish();
        match write_json_report(report, &self.path) {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "JSON report written");
                true
            }
            Err(error) => {
                tracing::error!(path = %self.path.display(), error = format!("{error:#}"), "failed to write JSON report");
                false
            }
        }
    }
}
