//! # Command-Line Interface / 命令行接口
//!
//! A test binary builds its root [`Context`] and hands it to [`run`]:
//!
//! ```no_run
//! use context_runner::prelude::*;
//!
//! fn main() -> std::process::ExitCode {
//!     let mut root = Context::default();
//!     root.add_test("truth", |_| assert(true));
//!     context_runner::cli::run(root)
//! }
//! ```
//!
//! 测试二进制程序构建其根 [`Context`] 并将其交给 [`run`]。

use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command};
use colored::*;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::core::config::DEFAULT_SETTINGS_FILE;
use crate::core::context::Context;
use crate::core::double::TypeRegistry;
use crate::infra::{logging, t};

pub mod commands {
    pub mod run;
}

/// Options of one invocation, as parsed from the command line.
/// 从命令行解析出的单次调用选项。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub example: Option<String>,
    pub focus: Vec<String>,
    pub jobs: Option<usize>,
    pub config: PathBuf,
    /// Whether `config` was given explicitly rather than defaulted.
    pub config_explicit: bool,
    pub lang: Option<String>,
    pub html: Option<PathBuf>,
    pub json: Option<PathBuf>,
    pub strict_doubles: bool,
    pub no_color: bool,
}

/// Pre-parses the command line arguments to find the language setting.
/// This allows i18n to be initialized before the full CLI is built.
/// It looks for a `--lang <VALUE>` or `--lang=<VALUE>` argument.
fn pre_parse_language(args: &[OsString]) -> String {
    let args: Vec<String> = args
        .iter()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect();
    if let Some(pos) = args.iter().position(|arg| arg == "--lang") {
        if let Some(lang) = args.get(pos + 1) {
            return lang.clone();
        }
    }
    if let Some(lang) = args.iter().find_map(|arg| arg.strip_prefix("--lang=")) {
        return lang.to_string();
    }
    // Fallback to system language detection
    sys_locale::get_locale().unwrap_or_else(|| "en".to_string())
}

pub fn build_cli(locale: &str) -> Command {
    Command::new("context-runner")
        .version(env!("CARGO_PKG_VERSION"))
        .about(t!("cli_about", locale = locale).to_string())
        .arg(
            Arg::new("example")
                .short('e')
                .long("example")
                .help(t!("arg_example", locale = locale).to_string())
                .value_name("PATTERN")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("focus")
                .short('f')
                .long("focus")
                .help(t!("arg_focus", locale = locale).to_string())
                .value_name("ID")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("jobs")
                .short('j')
                .long("jobs")
                .help(t!("arg_jobs", locale = locale).to_string())
                .value_name("JOBS")
                .value_parser(clap::value_parser!(usize))
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .help(t!("arg_config", locale = locale).to_string())
                .value_name("CONFIG")
                .default_value(DEFAULT_SETTINGS_FILE)
                .value_parser(clap::value_parser!(PathBuf))
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("lang")
                .long("lang")
                .help(t!("cli_lang", locale = locale).to_string())
                .value_name("LANGUAGE")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("html")
                .long("html")
                .help(t!("arg_html", locale = locale).to_string())
                .value_name("HTML")
                .value_parser(clap::value_parser!(PathBuf))
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help(t!("arg_json", locale = locale).to_string())
                .value_name("JSON")
                .value_parser(clap::value_parser!(PathBuf))
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("strict-doubles")
                .long("strict-doubles")
                .help(t!("arg_strict_doubles", locale = locale).to_string())
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-color")
                .long("no-color")
                .help(t!("arg_no_color", locale = locale).to_string())
                .action(ArgAction::SetTrue),
        )
}

fn options_from(matches: &ArgMatches) -> RunOptions {
    let config_explicit = matches
        .value_source("config")
        .is_some_and(|source| source != clap::parser::ValueSource::DefaultValue);

    RunOptions {
        example: matches.get_one::<String>("example").cloned(),
        focus: matches
            .get_many::<String>("focus")
            .map(|ids| ids.cloned().collect())
            .unwrap_or_default(),
        jobs: matches.get_one::<usize>("jobs").copied(),
        config: matches
            .get_one::<PathBuf>("config")
            .cloned()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE)),
        config_explicit,
        lang: matches.get_one::<String>("lang").cloned(),
        html: matches.get_one::<PathBuf>("html").cloned(),
        json: matches.get_one::<PathBuf>("json").cloned(),
        strict_doubles: matches.get_flag("strict-doubles"),
        no_color: matches.get_flag("no-color"),
    }
}

/// Parses `args` (program name first) into [`RunOptions`].
pub fn parse_args<I, T>(args: I) -> Result<RunOptions>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
    let language = pre_parse_language(&args);
    let matches = build_cli(crate::resolve_locale(&language)).try_get_matches_from(args)?;
    Ok(options_from(&matches))
}

/// Parses `args` and runs `root`. Returns the verdict of the run.
///
/// 解析 `args` 并运行 `root`。返回运行的判定结果。
pub fn run_from<I, T>(args: I, root: Context, registry: TypeRegistry) -> Result<bool>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let options = parse_args(args)?;
    commands::run::execute(options, root, registry)
}

/// Entry point for test binaries. Reads the process arguments, runs `root`
/// and maps the verdict to the exit code.
pub fn run(root: Context) -> ExitCode {
    run_with(root, TypeRegistry::new())
}

/// Like [`run`], resolving doubles against `registry`.
pub fn run_with(root: Context, registry: TypeRegistry) -> ExitCode {
    logging::init();

    match run_from(std::env::args_os(), root, registry) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(error) => {
            if let Some(clap_error) = error.downcast_ref::<clap::Error>() {
                clap_error.exit();
            }
            eprintln!(
                "{} {:#}",
                t!("error_prefix").red().bold(),
                error
            );
            ExitCode::FAILURE
        }
    }
}
