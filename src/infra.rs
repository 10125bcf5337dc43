//! # Infrastructure Module / 基础设施模块
//!
//! Process-level services used by the runner: panic capture, logging setup
//! and short-id derivation.
//!
//! 运行器使用的进程级服务：panic 捕获、日志设置和短标识符派生。

pub mod logging;
pub mod panic;
pub mod short_id;

// Re-export i18n functions for easier access
pub use rust_i18n::t;
