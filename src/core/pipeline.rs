//! # Execution Pipeline Module / 执行管道模块
//!
//! A [`Pipeline`] turns one unit of work into a list of [`Failure`]s. It is an
//! ordered stack of middleware [`Layer`]s between two fixed ends:
//!
//! - **Bottom** runs the hooks and the body and reports success as an empty list.
//! - **Top** creates the per-execution [`Example`], catches whatever no inner layer
//!   translated (including panics) and reports it as a code exception.
//!
//! 一个 [`Pipeline`] 将单个工作单元转换为 [`Failure`] 列表。它是位于两个固定端点之间的
//! 有序中间件 [`Layer`] 栈：
//!
//! - **Bottom** 运行钩子和测试体，并以空列表报告成功。
//! - **Top** 创建每次执行的 [`Example`]，捕获所有未被内层转换的内容（包括 panic），
//!   并将其报告为代码异常。
//!
//! Each layer translates the conditions it recognizes and passes everything else
//! outward unchanged. Fatal conditions are never contained.
//!
//! 每一层转换它能识别的条件，并将其他一切原样向外传递。致命条件永远不会被拦截。

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::core::double::{DoubleSpace, TypeRegistry};
use crate::core::example::Example;
use crate::core::models::{Failure, NestedUnitOfWork, Trace};
use crate::core::raise::{Fatal, Raise, RaiseKind};
use crate::infra::panic;

/// What a layer hands back to the layer around it.
pub type Evaluation = Result<Vec<Failure>, Raise>;

/// A middleware layer of the pipeline.
/// 管道的中间件层。
pub trait Layer: Send + Sync {
    fn name(&self) -> &str;

    /// Runs the rest of the pipeline through `next`, translating the
    /// conditions this layer recognizes.
    fn call(&self, example: &Example, next: Next<'_>) -> Evaluation;
}

/// The part of the pipeline inside the current layer.
pub struct Next<'a> {
    layers: &'a [Arc<dyn Layer>],
}

impl Next<'_> {
    pub fn run(self, example: &Example) -> Evaluation {
        match self.layers.split_first() {
            Some((layer, inner)) => layer.call(example, Next { layers: inner }),
            None => bottom(example),
        }
    }
}

/// Runs `before_each` hooks root first, the body, then `after_each` hooks leaf
/// first. After hooks run even when something before them failed, but only for
/// contexts whose before hooks all completed. The first raised condition is
/// the one reported.
fn bottom(example: &Example) -> Evaluation {
    let unit = example.unit();
    let ancestors = unit.ancestors();
    let mut raised = None;
    let mut prepared = 0;

    'setup: for context in ancestors {
        for hook in context.before_hooks() {
            if let Err(raise) = hook(example) {
                raised = Some(raise);
                break 'setup;
            }
        }
        prepared += 1;
    }

    if raised.is_none() {
        if let Err(raise) = (unit.unit().body())(example) {
            raised = Some(raise);
        }
    }

    let after_hooks = ancestors[..prepared]
        .iter()
        .rev()
        .flat_map(|context| context.after_hooks().iter().rev());
    for hook in after_hooks {
        if let Err(raise) = hook(example) {
            if raised.is_some() {
                tracing::debug!(unit = %unit.full_name(), error = %raise, "after hook failure shadowed by earlier failure");
            } else {
                raised = Some(raise);
            }
        }
    }

    match raised {
        Some(raise) => Err(raise),
        None => Ok(Vec::new()),
    }
}

/// Catch-all outermost layer.
fn top(unit: &NestedUnitOfWork, layers: &[Arc<dyn Layer>]) -> Result<Vec<Failure>, Fatal> {
    let example = Example::new(unit.clone());

    match panic::capture(|| Next { layers }.run(&example)) {
        Ok(Ok(failures)) => Ok(failures),
        Ok(Err(Raise {
            kind: RaiseKind::Fatal(fatal),
            ..
        })) => {
            tracing::error!(unit = %unit.full_name(), %fatal, "fatal condition raised");
            Err(fatal)
        }
        Ok(Err(raise)) => {
            let message = raise.message();
            Ok(vec![Failure::code_exception(unit.clone(), message, raise.trace)])
        }
        Err(caught) => {
            if caught.payload.is::<Fatal>() {
                std::panic::resume_unwind(caught.payload);
            }
            let message = caught.message();
            Ok(vec![Failure::code_exception(unit.clone(), message, caught.trace)])
        }
    }
}

/// An ordered composition of layers between Bottom and Top.
/// 位于 Bottom 和 Top 之间的有序层组合。
pub struct Pipeline {
    /// Outermost first.
    layers: Vec<Arc<dyn Layer>>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Bottom, [`DoubleLayer`] with default options, [`AssertionLayer`], Top.
    pub fn standard() -> Self {
        Self::with_doubles(DoubleOptions::default())
    }

    /// Like [`Pipeline::standard`] with the given double options.
    pub fn with_doubles(options: DoubleOptions) -> Self {
        Self::builder()
            .wrap(DoubleLayer::new(options))
            .wrap(AssertionLayer)
            .build()
    }

    /// Executes one unit of work in a fresh [`Example`].
    ///
    /// Returns the failures of the unit, or the fatal condition that must end
    /// the run.
    ///
    /// 在新的 [`Example`] 中执行一个工作单元。返回该单元的失败列表，
    /// 或必须终止运行的致命条件。
    pub fn execute(&self, unit: &NestedUnitOfWork) -> Result<Vec<Failure>, Fatal> {
        top(unit, &self.layers)
    }

    /// Layer names from the outside in, including both ends.
    pub fn layer_names(&self) -> Vec<&str> {
        let mut names = vec!["top"];
        names.extend(self.layers.iter().map(|layer| layer.name()));
        names.push("bottom");
        names
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.layer_names()).finish()
    }
}

/// Composes a [`Pipeline`]. Each [`wrap`](PipelineBuilder::wrap) places the
/// layer around everything wrapped before it, so the first layer wrapped sees
/// raw execution first.
#[derive(Default)]
pub struct PipelineBuilder {
    /// Innermost first.
    layers: Vec<Arc<dyn Layer>>,
}

impl PipelineBuilder {
    pub fn wrap(mut self, layer: impl Layer + 'static) -> Self {
        self.layers.push(Arc::new(layer));
        self
    }

    pub fn build(mut self) -> Pipeline {
        self.layers.reverse();
        Pipeline {
            layers: self.layers,
        }
    }
}

/// Translates assertion failures.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssertionLayer;

impl Layer for AssertionLayer {
    fn name(&self) -> &str {
        "assertions"
    }

    fn call(&self, example: &Example, next: Next<'_>) -> Evaluation {
        match next.run(example) {
            Err(Raise {
                kind: RaiseKind::Assertion(failure),
                trace,
            }) => Ok(vec![Failure::assertion(
                example.unit().clone(),
                failure.message(),
                trace,
            )]),
            other => other,
        }
    }
}

/// Configuration of the [`DoubleLayer`].
#[derive(Debug, Clone)]
pub struct DoubleOptions {
    pub registry: Arc<TypeRegistry>,
    /// Refuse doubles of types the registry cannot resolve.
    pub strict: bool,
    /// Check every double for unmet expectations after an otherwise clean run.
    /// Calls a double rejected are reported either way.
    pub auto_verify: bool,
}

impl Default for DoubleOptions {
    fn default() -> Self {
        Self {
            registry: Arc::new(TypeRegistry::new()),
            strict: false,
            auto_verify: true,
        }
    }
}

/// Gives the execution the ability to create doubles, translates double
/// failures and, when enabled, auto-verifies every double created.
///
/// 为执行提供创建替身的能力，转换替身失败，并在启用时自动验证创建的每个替身。
#[derive(Debug, Clone, Default)]
pub struct DoubleLayer {
    options: DoubleOptions,
}

impl DoubleLayer {
    pub fn new(options: DoubleOptions) -> Self {
        Self { options }
    }
}

impl Layer for DoubleLayer {
    fn name(&self) -> &str {
        "doubles"
    }

    fn call(&self, example: &Example, next: Next<'_>) -> Evaluation {
        example.install_doubles(DoubleSpace::new(
            Arc::clone(&self.options.registry),
            self.options.strict,
        ));

        let evaluation = match next.run(example) {
            Err(Raise {
                kind: RaiseKind::Double(failure),
                trace,
            }) => Ok(vec![Failure::assertion(
                example.unit().clone(),
                failure.to_string(),
                trace,
            )]),
            other => other,
        };

        let space = example.take_doubles();
        // Violations the body recovered from are reported even with
        // auto-verify off; unmet expectations only with it on.
        match (evaluation, space) {
            (Ok(mut failures), Some(space)) if failures.is_empty() => {
                for double in space.doubles() {
                    let problems = if self.options.auto_verify {
                        double.check_exhausted()
                    } else {
                        double.violations()
                    };
                    failures.extend(problems.into_iter().map(|failure| {
                        Failure::assertion(
                            example.unit().clone(),
                            failure.to_string(),
                            Trace::from_frames(vec![double.origin()]),
                        )
                    }));
                }
                Ok(failures)
            }
            (evaluation, _) => evaluation,
        }
    }
}

/// Bridges an external expectation library into the pipeline.
///
/// The library's only contract is that it reports a mismatch as an error of a
/// type the adapter recognizes.
///
/// 将外部期望库桥接到管道中。该库唯一的约定是以适配器可识别的错误类型报告不匹配。
pub trait ExpectationAdapter: Send + Sync {
    fn library(&self) -> &str;

    /// The failure message, when `error` is a mismatch reported by the library.
    fn recognize(&self, error: &anyhow::Error) -> Option<String>;
}

/// Recognizes errors whose concrete type is `E`.
pub struct ErrorTypeAdapter<E> {
    library: String,
    _error: PhantomData<fn() -> E>,
}

impl<E> ErrorTypeAdapter<E> {
    pub fn new(library: impl Into<String>) -> Self {
        Self {
            library: library.into(),
            _error: PhantomData,
        }
    }
}

impl<E> ExpectationAdapter for ErrorTypeAdapter<E>
where
    E: fmt::Display + fmt::Debug + Send + Sync + 'static,
{
    fn library(&self) -> &str {
        &self.library
    }

    fn recognize(&self, error: &anyhow::Error) -> Option<String> {
        error.downcast_ref::<E>().map(ToString::to_string)
    }
}

/// Translates mismatches of an external expectation library into assertion
/// failures.
pub struct MatcherLayer {
    adapter: Box<dyn ExpectationAdapter>,
}

impl MatcherLayer {
    pub fn new(adapter: impl ExpectationAdapter + 'static) -> Self {
        Self {
            adapter: Box::new(adapter),
        }
    }
}

impl Layer for MatcherLayer {
    fn name(&self) -> &str {
        self.adapter.library()
    }

    fn call(&self, example: &Example, next: Next<'_>) -> Evaluation {
        match next.run(example) {
            Err(Raise {
                kind: RaiseKind::Code(error),
                trace,
            }) => match self.adapter.recognize(&error) {
                Some(message) => Ok(vec![Failure::assertion(
                    example.unit().clone(),
                    message,
                    trace,
                )]),
                None => Err(Raise {
                    kind: RaiseKind::Code(error),
                    trace,
                }),
            },
            other => other,
        }
    }
}
