//! # Run Report Model / 运行报告模型
//!
//! The serializable record of a finished run shared by the file reports.
//!
//! 文件报告共用的、可序列化的已完成运行记录。

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::core::config::ShortId;
use crate::core::models::{ExecutedUnitOfWork, FailureKind, Trace};
use crate::core::notifier::RunInfo;
use crate::infra::short_id::short_id as default_short_id;

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub scheduler: String,
    pub workers: usize,
    pub started_at: DateTime<Local>,
    pub finished_at: Option<DateTime<Local>>,
    pub summary: Summary,
    pub units: Vec<UnitReport>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnitReport {
    pub id: String,
    pub name: String,
    pub passed: bool,
    pub duration_ms: f64,
    pub failures: Vec<FailureReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureReport {
    pub kind: FailureKind,
    pub message: String,
    pub trace: Trace,
}

/// Accumulates a [`RunReport`] from notifier events.
pub struct ReportBuilder {
    report: RunReport,
    short_id: Option<ShortId>,
}

impl Default for ReportBuilder {
    fn default() -> Self {
        Self {
            report: RunReport {
                scheduler: String::new(),
                workers: 0,
                started_at: Local::now(),
                finished_at: None,
                summary: Summary::default(),
                units: Vec::new(),
            },
            short_id: None,
        }
    }
}

impl ReportBuilder {
    pub fn start(&mut self, info: &RunInfo) {
        self.report.scheduler = info.scheduler.to_string();
        self.report.workers = info.workers;
        self.report.started_at = info.started_at;
        self.short_id = Some(info.short_id.clone());
    }

    pub fn record(&mut self, executed: &ExecutedUnitOfWork) {
        let unit = executed.unit();
        let id = match &self.short_id {
            Some(short_id) => short_id(unit),
            None => default_short_id(unit),
        };

        let summary = &mut self.report.summary;
        summary.total += 1;
        if executed.passed() {
            summary.passed += 1;
        } else {
            summary.failed += 1;
        }

        self.report.units.push(UnitReport {
            id,
            name: unit.full_name(),
            passed: executed.passed(),
            duration_ms: executed.duration().as_secs_f64() * 1000.0,
            failures: executed
                .failures()
                .iter()
                .map(|failure| FailureReport {
                    kind: failure.kind(),
                    message: failure.message().to_string(),
                    trace: failure.trace().clone(),
                })
                .collect(),
        });
    }

    /// Stamps the finish time and returns the report so far.
    pub fn finish(&mut self) -> &RunReport {
        self.report.finished_at = Some(Local::now());
        &self.report
    }

    pub fn report(&self) -> &RunReport {
        &self.report
    }
}
