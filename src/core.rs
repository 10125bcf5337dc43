//! # Core Module / 核心模块
//!
//! This module contains the core of the runner: the context tree, the
//! per-execution instance, doubles, the execution pipeline, schedulers,
//! notifiers and configuration.
//!
//! 此模块包含运行器的核心：上下文树、每次执行的实例、替身、执行管道、
//! 调度器、通知器和配置。

pub mod assertions;
pub mod config;
pub mod context;
pub mod double;
pub mod example;
pub mod models;
pub mod notifier;
pub mod pipeline;
pub mod raise;
pub mod runner;
pub mod scheduler;

// Re-exports
pub use config::{Config, Settings};
pub use context::Context;
pub use example::Example;
pub use pipeline::Pipeline;
pub use raise::{Fatal, Outcome, Raise};
