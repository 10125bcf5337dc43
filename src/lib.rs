//! # Context Runner Library / Context Runner 库
//!
//! A test-execution framework. Tests are declared into a tree of nested,
//! named contexts, executed through a pluggable middleware pipeline, and
//! reported to pluggable notifiers by a serial or concurrent scheduler.
//!
//! 一个测试执行框架。测试被声明到嵌套的命名上下文树中，通过可插拔的中间件管道执行，
//! 并由串行或并发调度器报告给可插拔的通知器。
//!
//! ## Modules / 模块
//!
//! - `core` - Context tree, doubles, execution pipeline, schedulers and notifiers
//! - `infra` - Infrastructure services like panic capture, logging and short ids
//! - `reporting` - Console, JSON and HTML notifiers
//! - `cli` - Command-line interface for test binaries
//!
//! - `core` - 上下文树、替身、执行管道、调度器和通知器
//! - `infra` - 基础设施服务，如 panic 捕获、日志和短标识符
//! - `reporting` - 控制台、JSON 和 HTML 通知器
//! - `cli` - 测试二进制程序的命令行接口
//!
//! ## Example / 示例
//!
//! ```
//! use context_runner::prelude::*;
//!
//! let mut root = Context::default();
//! root.add_child("arithmetic", |ctx| {
//!     ctx.add_memoized("two", |_| Ok(2));
//!     ctx.add_test("adds", |example| {
//!         let two = example.get::<i32>("two")?;
//!         assert_equal(&4, &(*two + *two))
//!     });
//! });
//!
//! let passed = context_runner::run(root, Config::new().notifier(Tally::default())).unwrap();
//! assert!(passed);
//! ```

pub mod cli;
pub mod core;
pub mod infra;
pub mod reporting;

// Re-export commonly used items
pub use core::models;
pub use core::runner::run;
pub use serde_json::{Value, json};

/// Everything a test file usually needs.
/// 测试文件通常需要的一切。
pub mod prelude {
    pub use crate::args;
    pub use crate::core::assertions::{assert, assert_equal, assert_include, assert_with, fail};
    pub use crate::core::config::Config;
    pub use crate::core::context::Context;
    pub use crate::core::double::{Double, Doubleable, TypeRegistry};
    pub use crate::core::example::Example;
    pub use crate::core::notifier::{Notifier, NotifierExt, Tally};
    pub use crate::core::pipeline::Pipeline;
    pub use crate::core::raise::{Fatal, Outcome, Raise};
    pub use serde_json::{Value, json};
}

/// Initializes the application's internationalization (i18n) based on the system locale.
///
/// This function detects the user's system locale and sets the appropriate
/// language for the application's user interface. It attempts to match the full
/// locale (e.g., "zh-CN"), then just the language code (e.g., "en"), and
/// finally falls back to the default language ("en").
pub fn init() {
    let locale = sys_locale::get_locale().unwrap_or_else(|| "en".to_string());
    rust_i18n::set_locale(resolve_locale(&locale));
}

/// Maps a requested locale to an available one: the full locale (e.g.,
/// "zh-CN"), then its language part (e.g., "en" from "en-US"), then "en".
///
/// 将请求的语言区域映射到可用的区域：先匹配完整区域（如 "zh-CN"），
/// 再匹配语言部分（如 "en-US" 中的 "en"），最后回退到 "en"。
pub fn resolve_locale(locale: &str) -> &str {
    let available_locales = rust_i18n::available_locales!();

    if available_locales.contains(&locale) {
        locale
    } else {
        locale
            .split('-')
            .next()
            .filter(|lang_code| available_locales.contains(lang_code))
            .unwrap_or("en")
    }
}

/// Whether `locale` names a bundled translation exactly.
pub fn supports_locale(locale: &str) -> bool {
    rust_i18n::available_locales!().contains(&locale)
}

// Initialize i18n
rust_i18n::i18n!("locales", fallback = "en");
