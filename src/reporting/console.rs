//! # Console Reporting Module / 控制台报告模块
//!
//! Prints a run to a terminal: one colored glyph per unit of work while the
//! run is going, then the details of every failure and a summary line.
//!
//! 将运行输出到终端：运行期间每个工作单元打印一个彩色符号，
//! 随后打印每个失败的详细信息和一行摘要。
//!
//! ```text
//! ..F.E.
//!
//! --- Failures ---
//! [1/2] 3k9x0a  math addition adds
//!   want: 3
//!   got: 4
//!   at tests/math.rs:12:9
//! ...
//! 6 examples, 2 failed (1 assertion, 1 error) in 0.02s
//! ```

use colored::*;
use std::io::{self, Write};
use std::time::Instant;

use crate::core::config::ShortId;
use crate::core::models::{ExecutedUnitOfWork, Failure, FailureKind};
use crate::core::notifier::{Notifier, RunInfo, Tally};
use crate::infra::t;

/// Writes progress glyphs and a failure report to `W`.
pub struct ConsoleNotifier<W: Write + Send> {
    out: W,
    locale: String,
    short_id: Option<ShortId>,
    tally: Tally,
    failures: Vec<Failure>,
    /// Wall clock, set by `run_start`.
    started: Option<Instant>,
}

impl<W: Write + Send> ConsoleNotifier<W> {
    /// Prints in the current locale.
    pub fn new(out: W) -> Self {
        Self::with_locale(out, &rust_i18n::locale())
    }

    pub fn with_locale(out: W, locale: &str) -> Self {
        Self {
            out,
            locale: locale.to_string(),
            short_id: None,
            tally: Tally::default(),
            failures: Vec::new(),
            started: None,
        }
    }

    pub fn tally(&self) -> &Tally {
        &self.tally
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn print_progress(&mut self, executed: &ExecutedUnitOfWork) -> io::Result<()> {
        let glyph = executed.glyph().to_string();
        let glyph = match executed.failures().first().map(Failure::kind) {
            None => glyph.green(),
            Some(FailureKind::Assertion) => glyph.red(),
            Some(FailureKind::CodeException) => glyph.yellow(),
        };
        write!(self.out, "{glyph}")?;
        self.out.flush()
    }

    fn print_report(&mut self) -> io::Result<()> {
        let locale = self.locale.as_str();
        let elapsed = self
            .started
            .map(|started| started.elapsed().as_secs_f64())
            .unwrap_or_default();
        writeln!(self.out)?;

        if !self.failures.is_empty() {
            writeln!(
                self.out,
                "\n{}",
                t!("console.failures_banner", locale = locale).red().bold()
            )?;
            let total = self.failures.len();
            for (index, failure) in self.failures.iter().enumerate() {
                let id = self
                    .short_id
                    .as_ref()
                    .map(|short_id| short_id(failure.unit()))
                    .unwrap_or_default();
                let label = match failure.kind() {
                    FailureKind::Assertion => t!("console.assertion_failure", locale = locale).red(),
                    FailureKind::CodeException => t!("console.code_exception", locale = locale).yellow(),
                };
                writeln!(
                    self.out,
                    "[{}/{}] {}  {} ({})",
                    index + 1,
                    total,
                    id.dimmed(),
                    failure.unit().full_name().cyan(),
                    label
                )?;
                for line in failure.message().lines() {
                    writeln!(self.out, "  {line}")?;
                }
                for frame in failure.trace().frames() {
                    writeln!(
                        self.out,
                        "  {}",
                        t!("console.at", locale = locale, frame = frame).dimmed()
                    )?;
                }
                writeln!(self.out)?;
            }
        }

        let summary = t!(
            "console.summary",
            locale = locale,
            total = self.tally.executed,
            failed = self.tally.failed,
            assertions = self.tally.assertion_failures,
            errors = self.tally.code_exceptions,
            seconds = format!("{elapsed:.2}")
        );
        if self.tally.failed == 0 {
            writeln!(self.out, "{}", summary.green().bold())?;
        } else {
            writeln!(self.out, "{}", summary.red().bold())?;
        }
        self.out.flush()
    }
}

impl<W: Write + Send> Notifier for ConsoleNotifier<W> {
    fn run_start(&mut self, info: &RunInfo) {
        self.started = Some(Instant::now());
        self.short_id = Some(info.short_id.clone());
        let line = t!(
            "console.run_started",
            locale = self.locale.as_str(),
            scheduler = info.scheduler,
            workers = info.workers
        );
        if let Err(error) = writeln!(self.out, "{}", line.bold()) {
            tracing::warn!(%error, "failed to write to console");
        }
    }

    fn evaluate_finish(&mut self, executed: &ExecutedUnitOfWork) {
        self.tally.record(executed);
        self.failures.extend(executed.failures().iter().cloned());
        if let Err(error) = self.print_progress(executed) {
            tracing::warn!(%error, "failed to write to console");
        }
    }

    fn run_finish(&mut self) -> bool {
        if let Err(error) = self.print_report() {
            tracing::warn!(%error, "failed to write to console");
        }
        self.tally.failed == 0
    }
}
