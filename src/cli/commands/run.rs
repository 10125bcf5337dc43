//! # Run Command Module / 运行命令模块
//!
//! Turns parsed [`RunOptions`] and the optional settings file into a
//! [`Config`] and runs the context tree with it.
//!
//! 将解析后的 [`RunOptions`] 和可选的设置文件转换为 [`Config`]，并用它运行上下文树。

use anyhow::{Context as _, Result};
use regex::Regex;
use std::io;
use std::sync::Arc;

use crate::cli::RunOptions;
use crate::core::config::{Config, Settings};
use crate::core::context::Context;
use crate::core::double::TypeRegistry;
use crate::core::notifier::{Notifier, NotifierExt};
use crate::core::scheduler::FilterScheduler;
use crate::infra::short_id::short_id;
use crate::infra::t;
use crate::reporting::{ConsoleNotifier, HtmlNotifier, JsonNotifier};

/// Executes the run command with the provided options.
///
/// # Returns
/// The verdict of the run. A fatal condition is returned as an error.
pub fn execute(options: RunOptions, root: Context, registry: TypeRegistry) -> Result<bool> {
    if options.no_color {
        colored::control::set_override(false);
    }

    let mut settings = load_settings(&options)?;
    apply_overrides(&mut settings, &options);

    let locale = crate::resolve_locale(&settings.language).to_string();
    rust_i18n::set_locale(&locale);

    let mut config = Config::from_settings(&settings, Arc::new(registry));

    if let Some(pattern) = &options.example {
        let pattern = Regex::new(pattern)
            .with_context(|| {
                t!("invalid_example_pattern", locale = &locale, pattern = pattern).to_string()
            })?;
        config.scheduler = config
            .scheduler
            .take()
            .map(|inner| Box::new(FilterScheduler::matching(inner, pattern)) as _);
    }
    if !options.focus.is_empty() {
        let ids = options.focus.clone();
        config.scheduler = config.scheduler.take().map(|inner| {
            Box::new(FilterScheduler::with_short_ids(inner, Arc::new(short_id), ids)) as _
        });
    }

    config.notifier = Some(build_notifier(&settings, &locale));

    let passed = crate::run(root, config)
        .with_context(|| t!("run_aborted", locale = &locale).to_string())?;
    Ok(passed)
}

/// Loads the settings file. A missing file is an error only when its path
/// was given explicitly.
fn load_settings(options: &RunOptions) -> Result<Settings> {
    let settings = if options.config_explicit {
        Settings::load(&options.config)?
    } else {
        Settings::load_or_default(&options.config)?
    };
    Ok(settings)
}

/// Command-line flags take precedence over the settings file.
pub fn apply_overrides(settings: &mut Settings, options: &RunOptions) {
    if let Some(lang) = &options.lang {
        settings.language = lang.clone();
    }
    if let Some(jobs) = options.jobs {
        settings.jobs = jobs;
    }
    if options.strict_doubles {
        settings.strict_doubles = true;
    }
    if let Some(html) = &options.html {
        settings.html_report = Some(html.clone());
    }
    if let Some(json) = &options.json {
        settings.json_report = Some(json.clone());
    }
}

fn build_notifier(settings: &Settings, locale: &str) -> Box<dyn Notifier> {
    let mut notifier: Box<dyn Notifier> = Box::new(ConsoleNotifier::with_locale(io::stdout(), locale));
    if let Some(path) = &settings.json_report {
        notifier = Box::new(notifier.and(JsonNotifier::new(path)));
    }
    if let Some(path) = &settings.html_report {
        notifier = Box::new(notifier.and(HtmlNotifier::with_locale(path, locale)));
    }
    notifier
}
