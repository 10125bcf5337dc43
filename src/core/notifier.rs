//! # Notifier Module / 通知器模块
//!
//! A [`Notifier`] observes a run. The scheduler calls it in a fixed order:
//! `run_start` once, then `evaluate_start` and `evaluate_finish` for every unit
//! of work, then `run_finish` once. The value returned by `run_finish` is the
//! notifier's verdict on the whole run.
//!
//! [`Notifier`] 观察一次运行。调度器按固定顺序调用它：先调用一次 `run_start`，
//! 然后对每个工作单元调用 `evaluate_start` 和 `evaluate_finish`，最后调用一次
//! `run_finish`。`run_finish` 的返回值是通知器对整个运行的判定。

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use std::fmt;

use crate::core::config::ShortId;
use crate::core::models::{ExecutedUnitOfWork, NestedUnitOfWork};

/// Facts about a run, handed to [`Notifier::run_start`].
#[derive(Clone)]
pub struct RunInfo {
    pub scheduler: &'static str,
    pub workers: usize,
    pub started_at: DateTime<Local>,
    pub short_id: ShortId,
}

impl RunInfo {
    pub fn short_id(&self, unit: &NestedUnitOfWork) -> String {
        (self.short_id)(unit)
    }
}

impl fmt::Debug for RunInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunInfo")
            .field("scheduler", &self.scheduler)
            .field("workers", &self.workers)
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}

/// Receives the events of a run.
/// 接收运行中的事件。
pub trait Notifier: Send {
    fn run_start(&mut self, _info: &RunInfo) {}

    fn evaluate_start(&mut self, _unit: &NestedUnitOfWork) {}

    fn evaluate_finish(&mut self, executed: &ExecutedUnitOfWork);

    /// Called once after every unit finished. `true` means the run passed.
    fn run_finish(&mut self) -> bool;
}

impl<N: Notifier + ?Sized> Notifier for &mut N {
    fn run_start(&mut self, info: &RunInfo) {
        (**self).run_start(info)
    }

    fn evaluate_start(&mut self, unit: &NestedUnitOfWork) {
        (**self).evaluate_start(unit)
    }

    fn evaluate_finish(&mut self, executed: &ExecutedUnitOfWork) {
        (**self).evaluate_finish(executed)
    }

    fn run_finish(&mut self) -> bool {
        (**self).run_finish()
    }
}

impl<N: Notifier + ?Sized> Notifier for Box<N> {
    fn run_start(&mut self, info: &RunInfo) {
        (**self).run_start(info)
    }

    fn evaluate_start(&mut self, unit: &NestedUnitOfWork) {
        (**self).evaluate_start(unit)
    }

    fn evaluate_finish(&mut self, executed: &ExecutedUnitOfWork) {
        (**self).evaluate_finish(executed)
    }

    fn run_finish(&mut self) -> bool {
        (**self).run_finish()
    }
}

/// Two notifiers receiving every event. The run passes only if both agree.
/// 两个通知器都接收每个事件。只有两者都同意时运行才算通过。
#[derive(Debug, Default)]
pub struct Both<A, B> {
    pub first: A,
    pub second: B,
}

impl<A: Notifier, B: Notifier> Notifier for Both<A, B> {
    fn run_start(&mut self, info: &RunInfo) {
        self.first.run_start(info);
        self.second.run_start(info);
    }

    fn evaluate_start(&mut self, unit: &NestedUnitOfWork) {
        self.first.evaluate_start(unit);
        self.second.evaluate_start(unit);
    }

    fn evaluate_finish(&mut self, executed: &ExecutedUnitOfWork) {
        self.first.evaluate_finish(executed);
        self.second.evaluate_finish(executed);
    }

    fn run_finish(&mut self) -> bool {
        // Both sides must see the end of the run.
        let first = self.first.run_finish();
        let second = self.second.run_finish();
        first && second
    }
}

pub trait NotifierExt: Notifier + Sized {
    /// Combines `self` with `other` into a [`Both`].
    fn and<B: Notifier>(self, other: B) -> Both<Self, B> {
        Both {
            first: self,
            second: other,
        }
    }
}

impl<N: Notifier> NotifierExt for N {}

/// Counts executed units and failures. Passes when nothing failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    pub executed: usize,
    pub failed: usize,
    pub assertion_failures: usize,
    pub code_exceptions: usize,
}

impl Tally {
    pub fn passed(&self) -> usize {
        self.executed - self.failed
    }

    pub fn record(&mut self, executed: &ExecutedUnitOfWork) {
        self.executed += 1;
        if !executed.passed() {
            self.failed += 1;
        }
        for failure in executed.failures() {
            if failure.is_code_exception() {
                self.code_exceptions += 1;
            } else {
                self.assertion_failures += 1;
            }
        }
    }
}

impl Notifier for Tally {
    fn evaluate_finish(&mut self, executed: &ExecutedUnitOfWork) {
        self.record(executed);
    }

    fn run_finish(&mut self) -> bool {
        self.failed == 0
    }
}

/// Serializes access to a notifier shared between worker threads.
///
/// 序列化对工作线程间共享的通知器的访问。
pub struct Synchronized<N> {
    inner: Mutex<N>,
}

impl<N: Notifier> Synchronized<N> {
    pub fn new(inner: N) -> Self {
        Self {
            inner: Mutex::new(inner),
        }
    }

    pub fn run_start(&self, info: &RunInfo) {
        self.inner.lock().run_start(info);
    }

    pub fn evaluate_start(&self, unit: &NestedUnitOfWork) {
        self.inner.lock().evaluate_start(unit);
    }

    pub fn evaluate_finish(&self, executed: &ExecutedUnitOfWork) {
        self.inner.lock().evaluate_finish(executed);
    }

    pub fn run_finish(&self) -> bool {
        self.inner.lock().run_finish()
    }

    pub fn into_inner(self) -> N {
        self.inner.into_inner()
    }
}
