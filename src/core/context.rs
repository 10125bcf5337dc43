//! # Context Tree Module / 上下文树模块
//!
//! Tests are declared into a tree of contexts. Each context owns its child
//! contexts, its own units of work, named helpers, hooks and an optional
//! pipeline override. Descendants see everything declared by their ancestors;
//! the definition closest to the leaf wins.
//!
//! 测试被声明到上下文树中。每个上下文拥有其子上下文、自身的工作单元、
//! 命名辅助函数、钩子以及可选的管道覆盖。后代可以看到祖先声明的所有内容；
//! 离叶子最近的定义优先。
//!
//! Building happens once, before anything runs. After that the root is wrapped
//! in an `Arc` and the tree is read-only; state that changes while a test runs
//! lives in [`Example`].
//!
//! 构建只在任何测试运行之前发生一次。之后根节点被包装在 `Arc` 中，树变为只读；
//! 测试运行期间变化的状态存放在 [`Example`] 中。

use serde_json::Value;
use std::any::Any;
use std::collections::BTreeMap;
use std::iter;
use std::rc::Rc;
use std::sync::Arc;

use crate::core::example::Example;
use crate::core::models::{NestedUnitOfWork, UnitOfWork};
use crate::core::pipeline::Pipeline;
use crate::core::raise::Outcome;

/// Computes a memoized value for one execution.
pub type MemoFn = Arc<dyn Fn(&Example) -> Outcome<Rc<dyn Any>> + Send + Sync>;

/// A helper method callable through [`Example::call`].
pub type HelperFn = Arc<dyn Fn(&Example, &[Value]) -> Outcome<Value> + Send + Sync>;

/// A `before_each` or `after_each` hook.
pub type Hook = Arc<dyn Fn(&Example) -> Outcome + Send + Sync>;

/// A named helper declared on a context.
/// 在上下文中声明的命名辅助项。
#[derive(Clone)]
pub enum Helper {
    /// Computed on first access, cached for the rest of the execution.
    /// 首次访问时计算，并在本次执行的剩余时间内缓存。
    Memoized(MemoFn),
    /// Re-evaluated on every call.
    /// 每次调用时重新求值。
    Method(HelperFn),
}

/// The name of a context or unit of work. Converts from `&str`, `String` and
/// their `Option` forms; [`Name::anonymous`] leaves it unnamed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Name(Option<String>);

impl Name {
    pub fn anonymous() -> Self {
        Self(None)
    }

    fn into_inner(self) -> Option<String> {
        self.0
    }
}

impl From<&str> for Name {
    fn from(name: &str) -> Self {
        Self(Some(name.to_owned()))
    }
}

impl From<String> for Name {
    fn from(name: String) -> Self {
        Self(Some(name))
    }
}

impl From<Option<&str>> for Name {
    fn from(name: Option<&str>) -> Self {
        Self(name.map(str::to_owned))
    }
}

impl From<Option<String>> for Name {
    fn from(name: Option<String>) -> Self {
        Self(name)
    }
}

/// A node of the context tree.
/// 上下文树的节点。
#[derive(Default)]
pub struct Context {
    name: Option<String>,
    children: Vec<Arc<Context>>,
    units: Vec<Arc<UnitOfWork>>,
    helpers: BTreeMap<String, Helper>,
    before: Vec<Hook>,
    after: Vec<Hook>,
    pipeline: Option<Arc<Pipeline>>,
}

impl Context {
    /// Builds the unnamed root of a tree, executed through `pipeline` unless a
    /// descendant overrides it.
    ///
    /// 构建树的未命名根节点，除非后代覆盖，否则通过 `pipeline` 执行。
    pub fn root(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline: Some(pipeline),
            ..Self::default()
        }
    }

    /// Builds a context that is not linked into any tree, for groups of tests
    /// shared through [`Context::splice`].
    ///
    /// 构建一个不链接到任何树的上下文，用于通过 [`Context::splice`] 共享的测试组。
    pub fn detached(name: impl Into<Name>, build: impl FnOnce(&mut Context)) -> Self {
        let mut context = Self {
            name: name.into().into_inner(),
            ..Self::default()
        };
        build(&mut context);
        context
    }

    /// Declares a child context and populates it with `build`.
    pub fn add_child(&mut self, name: impl Into<Name>, build: impl FnOnce(&mut Context)) {
        let child = Self::detached(name, build);
        self.children.push(Arc::new(child));
    }

    /// Declares a unit of work owned by this context.
    pub fn add_test<F>(&mut self, name: impl Into<Name>, body: F)
    where
        F: Fn(&Example) -> Outcome + Send + Sync + 'static,
    {
        self.units
            .push(Arc::new(UnitOfWork::new(name.into().into_inner(), Arc::new(body))));
    }

    /// Declares a lazily computed value. The first [`Example::get`] of `name`
    /// within an execution runs `compute`; later gets in the same execution
    /// return the cached value. Every execution starts with an empty cache.
    ///
    /// 声明一个惰性计算的值。在一次执行中第一次对 `name` 调用 [`Example::get`]
    /// 时运行 `compute`；同一次执行中之后的获取返回缓存值。每次执行都从空缓存开始。
    pub fn add_memoized<T, F>(&mut self, name: impl Into<String>, compute: F)
    where
        T: Any,
        F: Fn(&Example) -> Outcome<T> + Send + Sync + 'static,
    {
        let memo: MemoFn =
            Arc::new(move |example| compute(example).map(|value| Rc::new(value) as Rc<dyn Any>));
        self.helpers.insert(name.into(), Helper::Memoized(memo));
    }

    /// Declares a helper method, re-evaluated on every [`Example::call`].
    pub fn add_helper<F>(&mut self, name: impl Into<String>, method: F)
    where
        F: Fn(&Example, &[Value]) -> Outcome<Value> + Send + Sync + 'static,
    {
        self.helpers
            .insert(name.into(), Helper::Method(Arc::new(method)));
    }

    /// Runs before every unit of work in this subtree, outer contexts first.
    pub fn before_each<F>(&mut self, hook: F)
    where
        F: Fn(&Example) -> Outcome + Send + Sync + 'static,
    {
        self.before.push(Arc::new(hook));
    }

    /// Runs after every unit of work in this subtree, inner contexts first,
    /// even when the body failed.
    pub fn after_each<F>(&mut self, hook: F)
    where
        F: Fn(&Example) -> Outcome + Send + Sync + 'static,
    {
        self.after.push(Arc::new(hook));
    }

    /// Overrides the pipeline used for this subtree.
    pub fn set_pipeline(&mut self, pipeline: Arc<Pipeline>) {
        self.pipeline = Some(pipeline);
    }

    /// Appends a new child holding copies of the units of work `source` owns
    /// directly.
    ///
    /// Only those units are copied: nested contexts, helpers and hooks of
    /// `source` are left behind, and a warning names what was dropped. Every
    /// call makes an independent copy, so one shared group can be spliced
    /// into many places.
    ///
    /// 追加一个新的子上下文，其中包含 `source` 直接拥有的工作单元的副本。
    /// 只复制这些单元：`source` 的嵌套上下文、辅助函数和钩子不会被复制，
    /// 并会发出警告说明丢弃了什么。每次调用都会生成独立的副本。
    pub fn splice(&mut self, source: &Context) {
        let hooks = source.before.len() + source.after.len();
        if !source.children.is_empty() || !source.helpers.is_empty() || hooks > 0 {
            tracing::warn!(
                context = source.name().unwrap_or("<anonymous>"),
                children = source.children.len(),
                helpers = source.helpers.len(),
                hooks,
                "splice copies only directly owned units of work; nested contexts, helpers and hooks are dropped"
            );
        }

        let copy = Context {
            name: source.name.clone(),
            units: source
                .units
                .iter()
                .map(|unit| Arc::new(UnitOfWork::clone(unit)))
                .collect(),
            ..Context::default()
        };
        self.children.push(Arc::new(copy));
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn children(&self) -> &[Arc<Context>] {
        &self.children
    }

    pub fn units(&self) -> &[Arc<UnitOfWork>] {
        &self.units
    }

    pub fn pipeline(&self) -> Option<&Arc<Pipeline>> {
        self.pipeline.as_ref()
    }

    pub fn helper(&self, name: &str) -> Option<&Helper> {
        self.helpers.get(name)
    }

    pub fn before_hooks(&self) -> &[Hook] {
        &self.before
    }

    pub fn after_hooks(&self) -> &[Hook] {
        &self.after
    }

    /// Walks the tree depth-first, lazily. A context's children come first, in
    /// declaration order, followed by its own units of work. Each call starts a
    /// fresh walk over the same immutable tree.
    ///
    /// 惰性地深度优先遍历树。上下文的子上下文按声明顺序排在前面，
    /// 随后是它自己的工作单元。每次调用都会在同一棵不可变树上重新开始遍历。
    pub fn flatten(self: &Arc<Self>) -> Flatten {
        let chain: Arc<[Arc<Context>]> = Arc::from(vec![Arc::clone(self)]);
        Flatten {
            stack: vec![Frame::new(Arc::clone(self), chain)],
        }
    }
}

struct Frame {
    context: Arc<Context>,
    chain: Arc<[Arc<Context>]>,
    next_child: usize,
    next_unit: usize,
}

impl Frame {
    fn new(context: Arc<Context>, chain: Arc<[Arc<Context>]>) -> Self {
        Self {
            context,
            chain,
            next_child: 0,
            next_unit: 0,
        }
    }
}

/// Lazy depth-first iterator returned by [`Context::flatten`].
pub struct Flatten {
    stack: Vec<Frame>,
}

impl Iterator for Flatten {
    type Item = NestedUnitOfWork;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let frame = self.stack.last_mut()?;

            if let Some(child) = frame.context.children.get(frame.next_child) {
                frame.next_child += 1;
                let child = Arc::clone(child);
                let chain: Arc<[Arc<Context>]> = frame
                    .chain
                    .iter()
                    .cloned()
                    .chain(iter::once(Arc::clone(&child)))
                    .collect();
                self.stack.push(Frame::new(child, chain));
                continue;
            }

            if let Some(unit) = frame.context.units.get(frame.next_unit) {
                frame.next_unit += 1;
                return Some(NestedUnitOfWork::new(
                    Arc::clone(&frame.chain),
                    Arc::clone(unit),
                ));
            }

            self.stack.pop();
        }
    }
}
