//! # Runner Module / 运行器模块
//!
//! Resolves a [`Config`] against its defaults and runs a context tree once.
//!
//! 根据默认值解析 [`Config`]，并运行一次上下文树。

use std::io;
use std::sync::Arc;

use crate::core::config::{Config, ShortId};
use crate::core::context::Context;
use crate::core::notifier::Notifier;
use crate::core::pipeline::Pipeline;
use crate::core::raise::Fatal;
use crate::core::scheduler::{RunEnv, Scheduler, SerialScheduler};
use crate::infra::short_id::short_id as default_short_id;
use crate::reporting::console::ConsoleNotifier;

/// Runs every unit of work under `root`.
///
/// Returns the verdict of the run, or the fatal condition that stopped it.
///
/// 运行 `root` 下的每个工作单元。返回运行的判定结果，或使运行停止的致命条件。
pub fn run(root: Context, config: Config) -> Result<bool, Fatal> {
    let Config {
        notifier,
        scheduler,
        pipeline,
        short_id,
    } = config;

    let short_id = short_id.unwrap_or_else(|| Arc::new(default_short_id) as ShortId);
    let pipeline = pipeline.unwrap_or_else(|| Arc::new(Pipeline::standard()));
    let scheduler =
        scheduler.unwrap_or_else(|| Box::new(SerialScheduler) as Box<dyn Scheduler>);
    let mut notifier = notifier
        .unwrap_or_else(|| Box::new(ConsoleNotifier::new(io::stdout())) as Box<dyn Notifier>);

    let root = Arc::new(root);
    let env = RunEnv::new(pipeline, short_id);

    tracing::debug!(scheduler = scheduler.name(), ?env.pipeline, "starting run");
    let verdict = scheduler.run(&root, &env, notifier.as_mut());
    match &verdict {
        Ok(passed) => tracing::debug!(passed, "run finished"),
        Err(fatal) => tracing::error!(%fatal, "run aborted"),
    }
    verdict
}
