//! # Reporting Module / 报告模块
//!
//! Notifiers shipped with the runner: a colored, localized console notifier
//! and two report writers producing JSON and HTML files when a run finishes.
//!
//! 运行器自带的通知器：一个彩色、本地化的控制台通知器，
//! 以及两个在运行结束时生成 JSON 和 HTML 文件的报告写入器。

pub mod console;
pub mod html;
pub mod json;
pub mod report;

pub use console::ConsoleNotifier;
pub use html::HtmlNotifier;
pub use json::JsonNotifier;
