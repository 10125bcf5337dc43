//! # Configuration Module / 配置模块
//!
//! Two layers of configuration feed a run:
//!
//! - [`Config`] is the runtime struct handed to the runner. Every field is
//!   optional and falls back to a default when the run starts.
//! - [`Settings`] is the optional `ContextRunner.toml` file read by the CLI.
//!   It is turned into a [`Config`] with [`Config::from_settings`].
//!
//! 两层配置共同决定一次运行：
//!
//! - [`Config`] 是交给运行器的运行时结构。每个字段都是可选的，运行开始时回退到默认值。
//! - [`Settings`] 是 CLI 读取的可选 `ContextRunner.toml` 文件，
//!   通过 [`Config::from_settings`] 转换为 [`Config`]。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::core::double::TypeRegistry;
use crate::core::models::NestedUnitOfWork;
use crate::core::notifier::Notifier;
use crate::core::pipeline::{DoubleOptions, Pipeline};
use crate::core::scheduler::{ConcurrentScheduler, Scheduler, SerialScheduler};

/// Name of the settings file looked up by default.
pub const DEFAULT_SETTINGS_FILE: &str = "ContextRunner.toml";

/// Derives the display id of a unit of work.
pub type ShortId = Arc<dyn Fn(&NestedUnitOfWork) -> String + Send + Sync>;

/// Errors raised while loading or validating configuration.
/// 加载或验证配置时产生的错误。
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("unsupported language `{0}`")]
    UnsupportedLanguage(String),
}

/// Runtime configuration of a run. Unset fields take their defaults when the
/// run starts:
///
/// - `notifier`: the console notifier on stdout
/// - `scheduler`: [`SerialScheduler`]
/// - `pipeline`: [`Pipeline::standard`], used only by units whose contexts
///   declare no pipeline of their own
/// - `short_id`: [`crate::infra::short_id::short_id`]
///
/// 运行的运行时配置。未设置的字段在运行开始时取默认值。
#[derive(Default)]
pub struct Config {
    pub notifier: Option<Box<dyn Notifier>>,
    pub scheduler: Option<Box<dyn Scheduler>>,
    pub pipeline: Option<Arc<Pipeline>>,
    pub short_id: Option<ShortId>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scheduler and pipeline as described by `settings`. Doubles resolve
    /// types through `registry`.
    pub fn from_settings(settings: &Settings, registry: Arc<TypeRegistry>) -> Self {
        Self {
            scheduler: Some(settings.scheduler()),
            pipeline: Some(Arc::new(Pipeline::with_doubles(
                settings.double_options(registry),
            ))),
            ..Self::default()
        }
    }

    pub fn notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifier = Some(Box::new(notifier));
        self
    }

    pub fn scheduler(mut self, scheduler: impl Scheduler + 'static) -> Self {
        self.scheduler = Some(Box::new(scheduler));
        self
    }

    pub fn pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = Some(Arc::new(pipeline));
        self
    }

    pub fn short_id<F>(mut self, short_id: F) -> Self
    where
        F: Fn(&NestedUnitOfWork) -> String + Send + Sync + 'static,
    {
        self.short_id = Some(Arc::new(short_id));
        self
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("notifier", &self.notifier.is_some())
            .field("scheduler", &self.scheduler.as_ref().map(|s| s.name()))
            .field("pipeline", &self.pipeline)
            .field("short_id", &self.short_id.is_some())
            .finish()
    }
}

/// Contents of `ContextRunner.toml`. Every key is optional.
///
/// ```toml
/// language = "zh-CN"
/// jobs = 4
/// strict_doubles = true
/// auto_verify = true
/// html_report = "target/context-runner.html"
/// json_report = "target/context-runner.json"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Language of console output (e.g., "en", "zh-CN").
    /// 控制台输出的语言（例如 "en", "zh-CN"）。
    pub language: String,

    /// Worker threads. `1` runs serially, `0` uses one worker per CPU.
    /// 工作线程数。`1` 表示串行运行，`0` 表示每个 CPU 一个工作线程。
    pub jobs: usize,

    /// Refuse doubles of types missing from the type registry.
    pub strict_doubles: bool,

    /// Check doubles for unmet expectations after each passing unit.
    pub auto_verify: bool,

    pub html_report: Option<PathBuf>,
    pub json_report: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            language: default_language(),
            jobs: 1,
            strict_doubles: false,
            auto_verify: true,
            html_report: None,
            json_report: None,
        }
    }
}

fn default_language() -> String {
    "en".to_string()
}

impl Settings {
    /// Reads and validates the settings file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Settings = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        settings.validate()?;
        tracing::debug!(path = %path.display(), ?settings, "settings loaded");
        Ok(settings)
    }

    /// Like [`Settings::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "no settings file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if crate::supports_locale(&self.language) {
            Ok(())
        } else {
            Err(ConfigError::UnsupportedLanguage(self.language.clone()))
        }
    }

    pub fn scheduler(&self) -> Box<dyn Scheduler> {
        match self.jobs {
            1 => Box::new(SerialScheduler),
            jobs => Box::new(ConcurrentScheduler::new(jobs)),
        }
    }

    pub fn double_options(&self, registry: Arc<TypeRegistry>) -> DoubleOptions {
        DoubleOptions {
            registry,
            strict: self.strict_doubles,
            auto_verify: self.auto_verify,
        }
    }
}
