// Shared test helpers for integration tests
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use context_runner::core::config::Config;
use context_runner::core::context::Context;
use context_runner::core::models::{ExecutedUnitOfWork, Failure, NestedUnitOfWork};
use context_runner::core::notifier::{Notifier, RunInfo};
use context_runner::core::raise::Fatal;
use context_runner::core::scheduler::{Scheduler, SerialScheduler};

/// One notifier callback, as seen by [`Recorder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    RunStart { scheduler: String, workers: usize },
    EvaluateStart(String),
    EvaluateFinish { name: String, failures: usize },
    RunFinish,
}

/// A notifier recording every callback. Clones share the same log, so a
/// clone can be handed to the runner and inspected afterwards.
#[derive(Clone)]
pub struct Recorder {
    events: Arc<Mutex<Vec<Event>>>,
    executed: Arc<Mutex<Vec<ExecutedUnitOfWork>>>,
    verdict: bool,
}

impl Default for Recorder {
    fn default() -> Self {
        Self {
            events: Arc::default(),
            executed: Arc::default(),
            verdict: true,
        }
    }
}

impl Recorder {
    /// A recorder whose `run_finish` always votes `verdict`.
    pub fn voting(verdict: bool) -> Self {
        Self {
            verdict,
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn executed(&self) -> Vec<ExecutedUnitOfWork> {
        self.executed.lock().unwrap().clone()
    }

    pub fn executed_names(&self) -> Vec<String> {
        self.executed()
            .iter()
            .map(|executed| executed.unit().full_name())
            .collect()
    }

    /// Failures of the unit with this full name.
    pub fn failures_of(&self, name: &str) -> Vec<Failure> {
        self.executed()
            .into_iter()
            .find(|executed| executed.unit().full_name() == name)
            .map(|executed| executed.failures().to_vec())
            .unwrap_or_else(|| panic!("no unit named `{name}` was executed"))
    }

    pub fn count(&self, wanted: fn(&Event) -> bool) -> usize {
        self.events().iter().filter(|event| wanted(event)).count()
    }
}

impl Notifier for Recorder {
    fn run_start(&mut self, info: &RunInfo) {
        self.events.lock().unwrap().push(Event::RunStart {
            scheduler: info.scheduler.to_string(),
            workers: info.workers,
        });
    }

    fn evaluate_start(&mut self, unit: &NestedUnitOfWork) {
        self.events
            .lock()
            .unwrap()
            .push(Event::EvaluateStart(unit.full_name()));
    }

    fn evaluate_finish(&mut self, executed: &ExecutedUnitOfWork) {
        self.events.lock().unwrap().push(Event::EvaluateFinish {
            name: executed.unit().full_name(),
            failures: executed.failures().len(),
        });
        self.executed.lock().unwrap().push(executed.clone());
    }

    fn run_finish(&mut self) -> bool {
        self.events.lock().unwrap().push(Event::RunFinish);
        self.verdict
    }
}

/// Runs `root` with `scheduler` and a fresh [`Recorder`].
pub fn run_recorded(
    root: Context,
    scheduler: impl Scheduler + 'static,
) -> (Result<bool, Fatal>, Recorder) {
    let recorder = Recorder::default();
    let config = Config::new()
        .notifier(recorder.clone())
        .scheduler(scheduler);
    let verdict = context_runner::run(root, config);
    (verdict, recorder)
}

/// Runs a tree holding the single test `body` serially and returns its failures.
pub fn failures_of_single_test<F>(build: F) -> Vec<Failure>
where
    F: FnOnce(&mut Context),
{
    let mut root = Context::default();
    build(&mut root);
    let (verdict, recorder) = run_recorded(root, SerialScheduler);
    verdict.expect("run must not be aborted");
    let executed = recorder.executed();
    assert_eq!(executed.len(), 1, "exactly one unit of work expected");
    executed[0].failures().to_vec()
}
