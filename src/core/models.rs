//! # Data Models Module / 数据模型模块
//!
//! This module defines the entity model shared by every other part of the runner:
//! units of work, their nested form annotated with the ancestor chain, the
//! executed form produced by the scheduler, and structured failures.
//!
//! 此模块定义了运行器各部分共享的实体模型：
//! 工作单元、带有祖先链注释的嵌套形式、调度器生成的已执行形式，以及结构化的失败。

use serde::Serialize;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt;
use std::panic::Location;
use std::sync::Arc;
use std::time::Duration;

use crate::core::context::{Context, Helper};
use crate::core::example::Example;
use crate::core::pipeline::Pipeline;
use crate::core::raise::Outcome;

/// The executable part of a unit of work.
/// 工作单元的可执行部分。
pub type Body = Arc<dyn Fn(&Example) -> Outcome + Send + Sync>;

/// A single named or anonymous test body.
///
/// Created when a test is declared and never mutated afterwards.
///
/// 单个命名或匿名的测试体。在声明测试时创建，之后永不修改。
#[derive(Clone)]
pub struct UnitOfWork {
    name: Option<String>,
    body: Body,
}

impl UnitOfWork {
    pub fn new(name: Option<String>, body: Body) -> Self {
        Self { name, body }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn body(&self) -> &Body {
        &self.body
    }
}

impl fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A unit of work annotated with its ancestor chain, ordered root first.
///
/// Produced by flattening a context tree. Cloning is cheap: the chain is shared
/// between all siblings of a context.
///
/// 带有祖先链（根在前）注释的工作单元。由上下文树展开生成。
/// 克隆代价很低：同一上下文的所有兄弟单元共享同一条链。
#[derive(Clone)]
pub struct NestedUnitOfWork {
    ancestors: Arc<[Arc<Context>]>,
    unit: Arc<UnitOfWork>,
}

impl NestedUnitOfWork {
    pub fn new(ancestors: Arc<[Arc<Context>]>, unit: Arc<UnitOfWork>) -> Self {
        Self { ancestors, unit }
    }

    pub fn ancestors(&self) -> &[Arc<Context>] {
        &self.ancestors
    }

    pub fn unit(&self) -> &UnitOfWork {
        &self.unit
    }

    /// The context responsible for executing this unit of work.
    pub fn parent(&self) -> Option<&Arc<Context>> {
        self.ancestors.last()
    }

    /// Names of every named ancestor followed by the unit's own name, space-joined.
    /// Unnamed contexts are skipped.
    ///
    /// 所有命名祖先的名称加上单元自身的名称，以空格连接。未命名的上下文会被跳过。
    pub fn full_name(&self) -> String {
        self.ancestors
            .iter()
            .filter_map(|context| context.name())
            .chain(self.unit.name())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// The pipeline override closest to the leaf, if any ancestor declares one.
    pub fn pipeline(&self) -> Option<&Arc<Pipeline>> {
        self.ancestors
            .iter()
            .rev()
            .find_map(|context| context.pipeline())
    }

    /// Looks up a helper by name; the definition closest to the leaf wins.
    pub(crate) fn helper(&self, name: &str) -> Option<&Helper> {
        self.ancestors
            .iter()
            .rev()
            .find_map(|context| context.helper(name))
    }
}

impl PartialEq for NestedUnitOfWork {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.unit, &other.unit)
            && self.ancestors.len() == other.ancestors.len()
            && self
                .ancestors
                .iter()
                .zip(other.ancestors.iter())
                .all(|(a, b)| Arc::ptr_eq(a, b))
    }
}

impl Eq for NestedUnitOfWork {}

impl fmt::Debug for NestedUnitOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NestedUnitOfWork")
            .field(&self.full_name())
            .finish()
    }
}

/// The two shapes a failure can take. They aggregate identically but are
/// displayed differently.
///
/// 失败的两种形式。它们的聚合方式相同，但显示方式不同。
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// An assertion or double failure triggered by the test itself.
    /// 由测试本身触发的断言失败或替身失败。
    Assertion,
    /// An unexpected error or panic leaking from test code.
    /// 从测试代码中泄漏的意外错误或 panic。
    CodeException,
}

impl FailureKind {
    /// Progress glyph used by notifiers.
    pub fn glyph(&self) -> char {
        match self {
            FailureKind::Assertion => 'F',
            FailureKind::CodeException => 'E',
        }
    }
}

/// A snapshot of where a failure was raised: the caller location first,
/// followed by backtrace frames when `RUST_BACKTRACE` enables capture.
///
/// 失败引发位置的快照：首先是调用者位置，
/// 当 `RUST_BACKTRACE` 启用捕获时，后面跟着回溯帧。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Trace(Vec<String>);

impl Trace {
    pub fn capture(location: &Location<'_>) -> Self {
        let mut frames = vec![location.to_string()];
        let backtrace = Backtrace::capture();
        if backtrace.status() == BacktraceStatus::Captured {
            frames.extend(backtrace.to_string().lines().map(str::to_owned));
        }
        Self(frames)
    }

    pub fn from_frames(frames: Vec<String>) -> Self {
        Self(frames)
    }

    pub fn frames(&self) -> &[String] {
        &self.0
    }

    /// The innermost known location, usually `file:line:column`.
    pub fn location(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A structured failure of one unit of work.
/// 单个工作单元的结构化失败。
#[derive(Debug, Clone)]
pub struct Failure {
    unit: NestedUnitOfWork,
    kind: FailureKind,
    message: String,
    trace: Trace,
}

impl Failure {
    pub fn assertion(unit: NestedUnitOfWork, message: impl Into<String>, trace: Trace) -> Self {
        Self {
            unit,
            kind: FailureKind::Assertion,
            message: message.into(),
            trace,
        }
    }

    pub fn code_exception(
        unit: NestedUnitOfWork,
        message: impl Into<String>,
        trace: Trace,
    ) -> Self {
        Self {
            unit,
            kind: FailureKind::CodeException,
            message: message.into(),
            trace,
        }
    }

    pub fn unit(&self) -> &NestedUnitOfWork {
        &self.unit
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    pub fn is_code_exception(&self) -> bool {
        self.kind == FailureKind::CodeException
    }
}

/// The outcome of one unit of work as handed to notifiers.
/// 交给通知器的单个工作单元的执行结果。
#[derive(Debug, Clone)]
pub struct ExecutedUnitOfWork {
    unit: NestedUnitOfWork,
    failures: Vec<Failure>,
    duration: Duration,
}

impl ExecutedUnitOfWork {
    pub fn new(unit: NestedUnitOfWork, failures: Vec<Failure>, duration: Duration) -> Self {
        Self {
            unit,
            failures,
            duration,
        }
    }

    pub fn unit(&self) -> &NestedUnitOfWork {
        &self.unit
    }

    pub fn failures(&self) -> &[Failure] {
        &self.failures
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }

    /// `.` when passed, otherwise the glyph of the first failure.
    pub fn glyph(&self) -> char {
        self.failures
            .first()
            .map(|failure| failure.kind().glyph())
            .unwrap_or('.')
    }
}
