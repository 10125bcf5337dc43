//! # Scheduler Module / 调度器模块
//!
//! A [`Scheduler`] walks the flattened units of work, times each execution
//! through the unit's pipeline and reports to a [`Notifier`]. Three policies
//! share that contract:
//!
//! - [`SerialScheduler`] runs units one at a time in flattened order.
//! - [`ConcurrentScheduler`] runs them on a fixed pool of worker threads with
//!   no ordering guarantee between units.
//! - [`FilterScheduler`] hands another scheduler only the units matching a
//!   predicate.
//!
//! [`Scheduler`] 遍历展开后的工作单元，通过单元的管道为每次执行计时，并向
//! [`Notifier`] 报告。三种策略共享这一约定：
//!
//! - [`SerialScheduler`] 按展开顺序逐个运行单元。
//! - [`ConcurrentScheduler`] 在固定大小的工作线程池上运行它们，单元之间不保证顺序。
//! - [`FilterScheduler`] 只将满足谓词的单元交给另一个调度器。

use chrono::Local;
use parking_lot::Mutex;
use regex::Regex;
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Instant;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio_util::sync::CancellationToken;

use crate::core::config::ShortId;
use crate::core::context::Context;
use crate::core::models::{ExecutedUnitOfWork, NestedUnitOfWork};
use crate::core::notifier::{Notifier, RunInfo, Synchronized};
use crate::core::pipeline::Pipeline;
use crate::core::raise::Fatal;

/// Anything that can produce the units of work of a run.
pub trait UnitSource {
    fn units(&self) -> Box<dyn Iterator<Item = NestedUnitOfWork> + '_>;
}

impl UnitSource for Arc<Context> {
    fn units(&self) -> Box<dyn Iterator<Item = NestedUnitOfWork> + '_> {
        Box::new(self.flatten())
    }
}

/// What every scheduler needs besides the units and the notifier.
#[derive(Clone)]
pub struct RunEnv {
    /// Used for units with no pipeline override in their ancestor chain.
    pub pipeline: Arc<Pipeline>,
    pub short_id: ShortId,
}

impl RunEnv {
    pub fn new(pipeline: Arc<Pipeline>, short_id: ShortId) -> Self {
        Self { pipeline, short_id }
    }

    fn run_info(&self, scheduler: &'static str, workers: usize) -> RunInfo {
        RunInfo {
            scheduler,
            workers,
            started_at: Local::now(),
            short_id: Arc::clone(&self.short_id),
        }
    }

    /// Executes `unit` through its effective pipeline and times it.
    ///
    /// A panic carrying a [`Fatal`] payload ends up here as `Err`, like a
    /// raised fatal condition.
    ///
    /// 通过单元的有效管道执行 `unit` 并计时。携带 [`Fatal`] 载荷的 panic
    /// 与抛出的致命条件一样，在这里变为 `Err`。
    pub fn evaluate(&self, unit: &NestedUnitOfWork) -> Result<ExecutedUnitOfWork, Fatal> {
        let pipeline = unit.pipeline().unwrap_or(&self.pipeline);
        let started = Instant::now();

        let failures = match panic::catch_unwind(AssertUnwindSafe(|| pipeline.execute(unit))) {
            Ok(result) => result?,
            Err(payload) => match payload.downcast::<Fatal>() {
                Ok(fatal) => return Err(*fatal),
                Err(payload) => panic::resume_unwind(payload),
            },
        };

        let duration = started.elapsed();
        tracing::debug!(
            unit = %unit.full_name(),
            failures = failures.len(),
            ?duration,
            "unit of work executed"
        );
        Ok(ExecutedUnitOfWork::new(unit.clone(), failures, duration))
    }
}

/// The lifecycle of one run.
/// 单次运行的生命周期。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    Running,
    Finished,
}

impl RunState {
    /// The state after this one, if any.
    pub fn next(self) -> Option<RunState> {
        match self {
            RunState::NotStarted => Some(RunState::Running),
            RunState::Running => Some(RunState::Finished),
            RunState::Finished => None,
        }
    }

    fn advance(&mut self, scheduler: &str) {
        if let Some(next) = self.next() {
            tracing::debug!(scheduler, from = ?*self, to = ?next, "run state changed");
            *self = next;
        }
    }
}

/// Drives a run: `run_start`, one `evaluate_start`/`evaluate_finish` pair per
/// unit, then `run_finish`.
///
/// Returns the verdict: `run_finish()` and no unit failed. A fatal condition
/// stops the run and is returned without calling `run_finish`.
///
/// 驱动一次运行：`run_start`，每个单元一对 `evaluate_start`/`evaluate_finish`，
/// 然后是 `run_finish`。返回判定结果：`run_finish()` 为真且没有单元失败。
/// 致命条件会停止运行并直接返回，不调用 `run_finish`。
pub trait Scheduler: Send + Sync {
    fn name(&self) -> &'static str;

    fn run(
        &self,
        source: &dyn UnitSource,
        env: &RunEnv,
        notifier: &mut dyn Notifier,
    ) -> Result<bool, Fatal>;
}

/// Runs units one at a time, in flattened order.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialScheduler;

impl Scheduler for SerialScheduler {
    fn name(&self) -> &'static str {
        "serial"
    }

    fn run(
        &self,
        source: &dyn UnitSource,
        env: &RunEnv,
        notifier: &mut dyn Notifier,
    ) -> Result<bool, Fatal> {
        let mut state = RunState::NotStarted;
        let mut failed = false;

        notifier.run_start(&env.run_info(self.name(), 1));
        state.advance(self.name());

        for unit in source.units() {
            notifier.evaluate_start(&unit);
            let executed = env.evaluate(&unit)?;
            failed |= !executed.passed();
            notifier.evaluate_finish(&executed);
        }

        let verdict = notifier.run_finish();
        state.advance(self.name());
        Ok(verdict && !failed)
    }
}

enum Job {
    Run(NestedUnitOfWork),
    Stop,
}

/// Runs units on a fixed pool of worker threads pulling from one queue.
///
/// Each worker stops on its own sentinel, sent once every unit is queued.
/// Notifier calls are serialized, but `evaluate_finish` arrives in completion
/// order, not declaration order. A fatal condition stops workers from picking
/// up further units; units already running finish first.
///
/// 在从同一队列拉取任务的固定工作线程池上运行单元。所有单元入队后，
/// 每个工作线程在收到属于自己的哨兵时停止。通知器调用是串行化的，但
/// `evaluate_finish` 按完成顺序而非声明顺序到达。致命条件会阻止工作线程
/// 继续领取单元；已经在运行的单元会先完成。
#[derive(Debug, Clone, Copy)]
pub struct ConcurrentScheduler {
    workers: usize,
}

impl ConcurrentScheduler {
    /// A pool of `workers` threads; `0` means one per CPU.
    pub fn new(workers: usize) -> Self {
        let workers = if workers == 0 { num_cpus::get() } else { workers };
        Self { workers }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }
}

impl Default for ConcurrentScheduler {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Scheduler for ConcurrentScheduler {
    fn name(&self) -> &'static str {
        "concurrent"
    }

    fn run(
        &self,
        source: &dyn UnitSource,
        env: &RunEnv,
        notifier: &mut dyn Notifier,
    ) -> Result<bool, Fatal> {
        let mut state = RunState::NotStarted;
        let notifier = Synchronized::new(notifier);
        let (sender, receiver) = mpsc::unbounded_channel();
        let receiver = Mutex::new(receiver);
        let cancel = CancellationToken::new();
        let fatal = Mutex::new(None);
        let failed = AtomicBool::new(false);

        notifier.run_start(&env.run_info(self.name(), self.workers));
        state.advance(self.name());

        thread::scope(|scope| {
            for _ in 0..self.workers {
                scope.spawn(|| {
                    work(&receiver, env, &notifier, &cancel, &fatal, &failed);
                });
            }

            for unit in source.units() {
                if cancel.is_cancelled() || sender.send(Job::Run(unit)).is_err() {
                    break;
                }
            }
            for _ in 0..self.workers {
                if sender.send(Job::Stop).is_err() {
                    break;
                }
            }
        });

        if let Some(fatal) = fatal.into_inner() {
            return Err(fatal);
        }

        let verdict = notifier.run_finish();
        state.advance(self.name());
        Ok(verdict && !failed.load(Ordering::Acquire))
    }
}

fn work(
    receiver: &Mutex<UnboundedReceiver<Job>>,
    env: &RunEnv,
    notifier: &Synchronized<&mut dyn Notifier>,
    cancel: &CancellationToken,
    fatal: &Mutex<Option<Fatal>>,
    failed: &AtomicBool,
) {
    loop {
        let job = receiver.lock().blocking_recv();
        let unit = match job {
            Some(Job::Run(unit)) => unit,
            Some(Job::Stop) | None => break,
        };
        if cancel.is_cancelled() {
            continue;
        }

        notifier.evaluate_start(&unit);
        match env.evaluate(&unit) {
            Ok(executed) => {
                if !executed.passed() {
                    failed.store(true, Ordering::Release);
                }
                notifier.evaluate_finish(&executed);
            }
            Err(raised) => {
                let mut first = fatal.lock();
                if first.is_none() {
                    *first = Some(raised);
                }
                cancel.cancel();
            }
        }
    }
}

/// Predicate deciding which units a [`FilterScheduler`] lets through.
pub type UnitFilter = Arc<dyn Fn(&NestedUnitOfWork) -> bool + Send + Sync>;

/// A filtered view over another [`UnitSource`].
pub struct Filtered<'a> {
    source: &'a dyn UnitSource,
    predicate: &'a (dyn Fn(&NestedUnitOfWork) -> bool + Send + Sync),
}

impl<'a> Filtered<'a> {
    pub fn new(
        source: &'a dyn UnitSource,
        predicate: &'a (dyn Fn(&NestedUnitOfWork) -> bool + Send + Sync),
    ) -> Self {
        Self { source, predicate }
    }
}

impl UnitSource for Filtered<'_> {
    fn units(&self) -> Box<dyn Iterator<Item = NestedUnitOfWork> + '_> {
        Box::new(self.source.units().filter(|unit| (self.predicate)(unit)))
    }
}

/// Runs another scheduler over the units matching a predicate.
///
/// Filtering happens before delegation, so the inner scheduler and the
/// notifier only ever see the matching units.
///
/// 在满足谓词的单元上运行另一个调度器。过滤在委托之前进行，
/// 因此内部调度器和通知器只会看到匹配的单元。
pub struct FilterScheduler {
    inner: Box<dyn Scheduler>,
    predicate: UnitFilter,
}

impl FilterScheduler {
    pub fn new(inner: Box<dyn Scheduler>, predicate: UnitFilter) -> Self {
        Self { inner, predicate }
    }

    /// Keeps units whose full name matches `pattern`.
    pub fn matching(inner: Box<dyn Scheduler>, pattern: Regex) -> Self {
        Self::new(
            inner,
            Arc::new(move |unit: &NestedUnitOfWork| pattern.is_match(&unit.full_name())),
        )
    }

    /// Keeps units whose short id is one of `ids`.
    pub fn with_short_ids<I, S>(inner: Box<dyn Scheduler>, short_id: ShortId, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: HashSet<String> = ids.into_iter().map(Into::into).collect();
        Self::new(
            inner,
            Arc::new(move |unit: &NestedUnitOfWork| ids.contains(&short_id(unit))),
        )
    }
}

impl Scheduler for FilterScheduler {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn run(
        &self,
        source: &dyn UnitSource,
        env: &RunEnv,
        notifier: &mut dyn Notifier,
    ) -> Result<bool, Fatal> {
        let filtered = Filtered::new(source, self.predicate.as_ref());
        self.inner.run(&filtered, env, notifier)
    }
}
