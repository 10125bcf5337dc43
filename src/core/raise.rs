//! # Raised Conditions / 引发的条件
//!
//! Test bodies, hooks and helpers return an [`Outcome`]. When they fail they
//! "raise" a [`Raise`], which the execution pipeline translates into
//! [`Failure`](crate::core::models::Failure) values layer by layer.
//!
//! 测试体、钩子和辅助函数返回 [`Outcome`]。失败时它们会“引发”一个 [`Raise`]，
//! 执行管道会逐层将其转换为 [`Failure`](crate::core::models::Failure) 值。
//!
//! ## Taxonomy / 分类
//!
//! - [`RaiseKind::Assertion`] - expected, user-triggered failures
//! - [`RaiseKind::Double`] - test double protocol violations
//! - [`RaiseKind::Code`] - any other error leaking from test code
//! - [`RaiseKind::Fatal`] - unrecoverable conditions that terminate the run
//!
//! - [`RaiseKind::Assertion`] - 预期的、由用户触发的失败
//! - [`RaiseKind::Double`] - 测试替身协议违规
//! - [`RaiseKind::Code`] - 测试代码中泄漏的任何其他错误
//! - [`RaiseKind::Fatal`] - 终止整个运行的不可恢复条件

use std::fmt;
use std::panic::Location;

use crate::core::double::DoubleFailure;
use crate::core::models::Trace;

/// The result type of every piece of user code run by the framework.
/// 框架运行的每段用户代码的结果类型。
pub type Outcome<T = ()> = Result<T, Raise>;

/// An expected, user-triggered failure such as a failed `assert_equal`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct AssertionFailure {
    message: String,
}

impl AssertionFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A condition that must not be contained by the pipeline.
///
/// Returning `Raise::fatal(..)` from a test, or panicking with a `Fatal`
/// payload, stops the whole run instead of failing a single unit of work.
///
/// 不得被管道拦截的条件。从测试中返回 `Raise::fatal(..)`，
/// 或以 `Fatal` 负载触发 panic，会停止整个运行，而不只是让单个工作单元失败。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("fatal: {reason}")]
pub struct Fatal {
    reason: String,
}

impl Fatal {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// The classified payload of a [`Raise`].
#[derive(Debug)]
pub enum RaiseKind {
    Assertion(AssertionFailure),
    Double(DoubleFailure),
    Code(anyhow::Error),
    Fatal(Fatal),
}

/// A raised condition together with the trace captured where it was raised.
/// 引发的条件，以及在引发位置捕获的调用轨迹。
#[derive(Debug)]
pub struct Raise {
    pub kind: RaiseKind,
    pub trace: Trace,
}

impl Raise {
    /// Raises an assertion failure with the given message.
    #[track_caller]
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::with_kind(RaiseKind::Assertion(AssertionFailure::new(message)))
    }

    /// Raises a double protocol violation.
    #[track_caller]
    pub fn double(failure: DoubleFailure) -> Self {
        Self::with_kind(RaiseKind::Double(failure))
    }

    /// Raises a fatal condition that terminates the run.
    #[track_caller]
    pub fn fatal(reason: impl Into<String>) -> Self {
        Self::with_kind(RaiseKind::Fatal(Fatal::new(reason)))
    }

    /// Wraps an arbitrary error. Errors that are really assertion failures,
    /// double failures or fatal conditions keep their classification.
    ///
    /// 包装任意错误。实际上是断言失败、替身失败或致命条件的错误会保留其分类。
    #[track_caller]
    pub fn code(error: impl Into<anyhow::Error>) -> Self {
        Self::with_kind(classify(error.into()))
    }

    #[track_caller]
    fn with_kind(kind: RaiseKind) -> Self {
        Self {
            kind,
            trace: Trace::capture(Location::caller()),
        }
    }

    /// The message a notifier shows for this condition.
    pub fn message(&self) -> String {
        match &self.kind {
            RaiseKind::Assertion(failure) => failure.to_string(),
            RaiseKind::Double(failure) => failure.to_string(),
            RaiseKind::Code(error) => format!("{error:#}"),
            RaiseKind::Fatal(fatal) => fatal.to_string(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self.kind, RaiseKind::Fatal(_))
    }
}

impl fmt::Display for Raise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl<E> From<E> for Raise
where
    E: std::error::Error + Send + Sync + 'static,
{
    #[track_caller]
    fn from(error: E) -> Self {
        Self::code(anyhow::Error::new(error))
    }
}

fn classify(error: anyhow::Error) -> RaiseKind {
    let error = match error.downcast::<Fatal>() {
        Ok(fatal) => return RaiseKind::Fatal(fatal),
        Err(error) => error,
    };
    let error = match error.downcast::<AssertionFailure>() {
        Ok(failure) => return RaiseKind::Assertion(failure),
        Err(error) => error,
    };
    match error.downcast::<DoubleFailure>() {
        Ok(failure) => RaiseKind::Double(failure),
        Err(error) => RaiseKind::Code(error),
    }
}

