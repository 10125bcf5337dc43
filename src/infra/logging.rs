//! # Logging / 日志
//!
//! The library only emits `tracing` events. Binaries built on it call [`init`]
//! to print them to stderr, filtered by the `CONTEXT_RUNNER_LOG` environment
//! variable (same syntax as `RUST_LOG`, default `warn`).
//!
//! 库只发出 `tracing` 事件。基于它构建的二进制程序调用 [`init`] 将事件打印到 stderr，
//! 并由 `CONTEXT_RUNNER_LOG` 环境变量过滤（语法与 `RUST_LOG` 相同，默认为 `warn`）。

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "CONTEXT_RUNNER_LOG";

/// Installs the global subscriber. Does nothing if one is already installed.
pub fn init() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
