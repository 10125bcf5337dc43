//! # Test Double Engine / 测试替身引擎
//!
//! A [`Double`] stands in for a collaborator. Calls are explicit: the code
//! under test (or an adapter implementing the collaborator's trait) forwards
//! them through [`Double::invoke`], which matches them against what the test
//! declared.
//!
//! 一个 [`Double`] 代替协作对象。调用是显式的：被测代码（或实现协作者 trait
//! 的适配器）通过 [`Double::invoke`] 转发调用，并与测试声明的内容进行匹配。
//!
//! ## Disciplines / 验证方式
//!
//! - **Stub**: `stub(..).with(..).returns(..)` registers a reusable response.
//!   Unmatched calls return `Value::Null`.
//! - **Expect**: `expect(..).with(..).returns(..)` registers a one-shot
//!   expectation. Once a double has expectations, unmatched calls fail
//!   immediately, and [`Double::assert_exhausted`] fails for expectations that
//!   were never met.
//! - **Verify after**: every call is logged; [`Double::verify`] consumes one
//!   matching entry from the log.
//!
//! - **Stub**：`stub(..).with(..).returns(..)` 注册可重复使用的响应。未匹配的调用返回 `Value::Null`。
//! - **Expect**：`expect(..).with(..).returns(..)` 注册一次性期望。一旦替身拥有期望，
//!   未匹配的调用会立即失败；从未满足的期望会使 [`Double::assert_exhausted`] 失败。
//! - **Verify after**：每次调用都会被记录；[`Double::verify`] 从记录中消费一条匹配项。
//!
//! Matching requires the method name and the argument list to be exactly equal.
//! 匹配要求方法名和参数列表完全相等。

use parking_lot::Mutex;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use crate::core::raise::{Outcome, Raise};

/// Builds a `Vec<Value>` argument list; each argument goes through `json!`.
///
/// ```
/// use context_runner::args;
/// let args = args!["bob", 3, true];
/// assert_eq!(args.len(), 3);
/// ```
#[macro_export]
macro_rules! args {
    () => {
        ::std::vec::Vec::<$crate::Value>::new()
    };
    ($($arg:expr),+ $(,)?) => {
        ::std::vec![$($crate::json!($arg)),+]
    };
}

/// A violation of the double protocol.
/// 替身协议的违规。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DoubleFailure {
    #[error("could not resolve type `{type_name}` for a strict double")]
    UnresolvedType { type_name: String },

    #[error("{type_name}{separator}{method} is not a method of {type_name}")]
    InvalidMethod {
        type_name: String,
        separator: char,
        method: String,
    },

    #[error("Unexpectedly received: {call}\n{double} {}", listing("still expects", "has no remaining expectations", .expected))]
    UnexpectedCall {
        double: String,
        call: String,
        expected: Vec<String>,
    },

    #[error("{double} did not receive:{}", indented(.calls))]
    NotReceived { double: String, calls: Vec<String> },

    #[error("{double} was expected to receive: {expected}\n{}", listing("but received", "but received nothing", .received))]
    NotVerified {
        double: String,
        expected: String,
        received: Vec<String>,
    },
}

fn indented(calls: &[String]) -> String {
    calls.iter().map(|call| format!("\n  {call}")).collect()
}

fn listing(header: &str, empty: &str, calls: &[String]) -> String {
    if calls.is_empty() {
        empty.to_owned()
    } else {
        format!("{header}:{}", indented(calls))
    }
}

/// Implemented by real types so their public surface can be registered and
/// doubles of them validated.
///
/// 由真实类型实现，以便注册其公共接口并校验它们的替身。
pub trait Doubleable {
    const TYPE_NAME: &'static str;
    const INSTANCE_METHODS: &'static [&'static str];
    const TYPE_METHODS: &'static [&'static str] = &[];
}

/// The public callable surface of a type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeSurface {
    instance_methods: BTreeSet<String>,
    type_methods: BTreeSet<String>,
}

impl TypeSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn instance_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.instance_methods
            .extend(methods.into_iter().map(Into::into));
        self
    }

    pub fn type_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.type_methods.extend(methods.into_iter().map(Into::into));
        self
    }

    fn allows(&self, kind: DoubleKind, method: &str) -> bool {
        match kind {
            DoubleKind::Instance => self.instance_methods.contains(method),
            DoubleKind::Type => self.type_methods.contains(method),
        }
    }
}

/// Maps type names to their callable surface. Populated at startup and
/// handed to the double layer.
///
/// 将类型名称映射到其可调用接口。在启动时填充并交给替身层。
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: HashMap<String, Arc<TypeSurface>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: Doubleable>(&mut self) -> &mut Self {
        let surface = TypeSurface::new()
            .instance_methods(T::INSTANCE_METHODS.iter().copied())
            .type_methods(T::TYPE_METHODS.iter().copied());
        self.insert(T::TYPE_NAME, surface)
    }

    pub fn insert(&mut self, type_name: impl Into<String>, surface: TypeSurface) -> &mut Self {
        self.types.insert(type_name.into(), Arc::new(surface));
        self
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    pub fn resolve(&self, type_name: &str) -> Reference {
        match self.types.get(type_name) {
            Some(surface) => Reference::Resolved {
                type_name: type_name.to_owned(),
                surface: Arc::clone(surface),
            },
            None => Reference::Unresolved(type_name.to_owned()),
        }
    }
}

/// What a double stands in for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    Resolved {
        type_name: String,
        surface: Arc<TypeSurface>,
    },
    /// A name the registry does not know. Calls are not validated.
    Unresolved(String),
}

impl Reference {
    pub fn type_name(&self) -> &str {
        match self {
            Reference::Resolved { type_name, .. } => type_name,
            Reference::Unresolved(type_name) => type_name,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Reference::Resolved { .. })
    }

    fn validate(&self, kind: DoubleKind, method: &str) -> Result<(), DoubleFailure> {
        match self {
            Reference::Resolved { type_name, surface } if !surface.allows(kind, method) => {
                Err(DoubleFailure::InvalidMethod {
                    type_name: type_name.clone(),
                    separator: kind.separator(),
                    method: method.to_owned(),
                })
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoubleKind {
    /// Stands in for an instance of the type.
    Instance,
    /// Stands in for the type itself.
    Type,
}

impl DoubleKind {
    fn separator(self) -> char {
        match self {
            DoubleKind::Instance => '#',
            DoubleKind::Type => '.',
        }
    }
}

/// A method name with its argument list, rendered as `name(arg, ...)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub method: String,
    pub args: Vec<Value>,
}

impl Call {
    pub fn new(method: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            method: method.into(),
            args,
        }
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.method)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{arg}")?;
        }
        f.write_str(")")
    }
}

type Response = Arc<dyn Fn(&[Value]) -> Value + Send + Sync>;

struct Registration {
    call: Call,
    response: Response,
}

struct Received {
    call: Call,
    verified: bool,
}

struct DoubleState {
    reference: Reference,
    kind: DoubleKind,
    origin: String,
    stubs: Vec<Registration>,
    expectations: VecDeque<Registration>,
    mocking: bool,
    received: Vec<Received>,
    /// Rejected calls, kept even when the caller swallowed the error.
    violations: Vec<DoubleFailure>,
}

impl DoubleState {
    fn describe(&self) -> String {
        match self.kind {
            DoubleKind::Instance => format!("instance double of {}", self.reference.type_name()),
            DoubleKind::Type => format!("type double of {}", self.reference.type_name()),
        }
    }
}

/// A handle to a test double. Clones share the same state.
/// 测试替身的句柄。克隆共享同一状态。
#[derive(Clone)]
pub struct Double {
    state: Arc<Mutex<DoubleState>>,
}

impl Double {
    #[track_caller]
    pub fn new(reference: Reference, kind: DoubleKind) -> Self {
        Self {
            state: Arc::new(Mutex::new(DoubleState {
                reference,
                kind,
                origin: Location::caller().to_string(),
                stubs: Vec::new(),
                expectations: VecDeque::new(),
                mocking: false,
                received: Vec::new(),
                violations: Vec::new(),
            })),
        }
    }

    pub fn describe(&self) -> String {
        self.state.lock().describe()
    }

    pub fn reference(&self) -> Reference {
        self.state.lock().reference.clone()
    }

    /// Where the double was created, as `file:line:column`.
    pub fn origin(&self) -> String {
        self.state.lock().origin.clone()
    }

    /// Starts registering a reusable response for `method`.
    pub fn stub(&self, method: impl Into<String>) -> CallBuilder<'_> {
        CallBuilder::new(self, method.into(), Mode::Stub)
    }

    /// Starts registering a one-shot expectation for `method`.
    pub fn expect(&self, method: impl Into<String>) -> CallBuilder<'_> {
        CallBuilder::new(self, method.into(), Mode::Expect)
    }

    /// Sends `method(args)` to the double.
    ///
    /// A matching expectation is consumed first, then the most recently
    /// registered matching stub answers. Otherwise the call returns
    /// `Value::Null`, unless the double has expectations, in which case it
    /// fails with `Unexpectedly received`.
    ///
    /// Rejected calls are remembered and reported again by
    /// [`assert_exhausted`](Self::assert_exhausted), so code that recovers
    /// from the error cannot hide the violation. Only accepted calls are
    /// logged for [`verify`](Self::verify).
    ///
    /// 向替身发送 `method(args)`。优先消费匹配的期望，其次由最近注册的匹配桩响应。
    /// 否则调用返回 `Value::Null`；但如果替身拥有期望，则以 `Unexpectedly received` 失败。
    /// 被拒绝的调用会被记录，并由 `assert_exhausted` 再次报告；只有被接受的调用才会记入日志供 `verify` 使用。
    #[track_caller]
    pub fn invoke(&self, method: &str, args: Vec<Value>) -> Outcome<Value> {
        let mut state = self.state.lock();
        if let Err(failure) = state.reference.validate(state.kind, method) {
            state.violations.push(failure.clone());
            return Err(Raise::double(failure));
        }

        let call = Call::new(method, args);
        tracing::trace!(double = %state.describe(), %call, "double received call");

        let expected = state
            .expectations
            .iter()
            .position(|registration| registration.call == call);
        let response = match expected {
            Some(index) => state
                .expectations
                .remove(index)
                .map(|registration| registration.response),
            None => state
                .stubs
                .iter()
                .rev()
                .find(|registration| registration.call == call)
                .map(|registration| Arc::clone(&registration.response)),
        };

        if response.is_none() && state.mocking {
            let failure = DoubleFailure::UnexpectedCall {
                double: state.describe(),
                call: call.to_string(),
                expected: state
                    .expectations
                    .iter()
                    .map(|registration| registration.call.to_string())
                    .collect(),
            };
            state.violations.push(failure.clone());
            return Err(Raise::double(failure));
        }

        state.received.push(Received {
            call: call.clone(),
            verified: false,
        });
        drop(state);

        Ok(response
            .map(|response| response(&call.args))
            .unwrap_or(Value::Null))
    }

    /// Consumes one logged, not yet verified call equal to `method(args)`.
    #[track_caller]
    pub fn verify(&self, method: &str, args: Vec<Value>) -> Outcome {
        let mut state = self.state.lock();
        if let Err(failure) = state.reference.validate(state.kind, method) {
            return Err(Raise::double(failure));
        }

        let call = Call::new(method, args);
        let position = state
            .received
            .iter()
            .position(|received| !received.verified && received.call == call);
        match position {
            Some(index) => {
                state.received[index].verified = true;
                Ok(())
            }
            None => Err(Raise::double(DoubleFailure::NotVerified {
                double: state.describe(),
                expected: call.to_string(),
                received: state
                    .received
                    .iter()
                    .filter(|received| !received.verified)
                    .map(|received| received.call.to_string())
                    .collect(),
            })),
        }
    }

    /// Fails when a call was rejected or any registered expectation was never
    /// consumed. The first problem found is reported.
    #[track_caller]
    pub fn assert_exhausted(&self) -> Outcome {
        match self.check_exhausted().into_iter().next() {
            None => Ok(()),
            Some(failure) => Err(Raise::double(failure)),
        }
    }

    /// Rejected calls in order, then the unconsumed expectations.
    pub(crate) fn check_exhausted(&self) -> Vec<DoubleFailure> {
        let state = self.state.lock();
        let mut problems = state.violations.clone();
        if !state.expectations.is_empty() {
            problems.push(DoubleFailure::NotReceived {
                double: state.describe(),
                calls: state
                    .expectations
                    .iter()
                    .map(|registration| registration.call.to_string())
                    .collect(),
            });
        }
        problems
    }

    /// Calls this double rejected, in order.
    pub(crate) fn violations(&self) -> Vec<DoubleFailure> {
        self.state.lock().violations.clone()
    }

    /// Every accepted call so far, in order.
    pub fn received(&self) -> Vec<Call> {
        self.state
            .lock()
            .received
            .iter()
            .map(|received| received.call.clone())
            .collect()
    }

    #[track_caller]
    fn register(&self, mode: Mode, call: Call, response: Response) -> Outcome {
        let mut state = self.state.lock();
        if let Err(failure) = state.reference.validate(state.kind, &call.method) {
            return Err(Raise::double(failure));
        }
        tracing::trace!(double = %state.describe(), %call, ?mode, "double registration");

        let registration = Registration { call, response };
        match mode {
            Mode::Stub => state.stubs.push(registration),
            Mode::Expect => {
                state.mocking = true;
                state.expectations.push_back(registration);
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Double {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Double").field(&self.describe()).finish()
    }
}

#[derive(Debug, Clone, Copy)]
enum Mode {
    Stub,
    Expect,
}

/// Collects the arguments and response of a stub or expectation.
/// Nothing is registered until a terminal method is called.
#[must_use = "a stub or expectation is only registered by `returns`, `returns_with` or `register`"]
pub struct CallBuilder<'a> {
    double: &'a Double,
    method: String,
    args: Vec<Value>,
    mode: Mode,
}

impl<'a> CallBuilder<'a> {
    fn new(double: &'a Double, method: String, mode: Mode) -> Self {
        Self {
            double,
            method,
            args: Vec::new(),
            mode,
        }
    }

    /// The exact argument list to match; defaults to no arguments.
    pub fn with(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    #[track_caller]
    pub fn returns(self, value: impl Into<Value>) -> Outcome {
        let value = value.into();
        self.returns_with(move |_| value.clone())
    }

    /// Computes the response from the received arguments on every match.
    #[track_caller]
    pub fn returns_with<F>(self, response: F) -> Outcome
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        let call = Call::new(self.method, self.args);
        self.double.register(self.mode, call, Arc::new(response))
    }

    /// Registers the call with a `Value::Null` response.
    #[track_caller]
    pub fn register(self) -> Outcome {
        self.returns(Value::Null)
    }
}

/// Creates the doubles of one execution and remembers them for
/// auto-verification.
///
/// 创建一次执行中的替身，并记住它们以便自动验证。
pub struct DoubleSpace {
    registry: Arc<TypeRegistry>,
    strict: bool,
    created: RefCell<Vec<Double>>,
}

impl DoubleSpace {
    pub fn new(registry: Arc<TypeRegistry>, strict: bool) -> Self {
        Self {
            registry,
            strict,
            created: RefCell::new(Vec::new()),
        }
    }

    #[track_caller]
    pub fn instance_double(&self, type_name: &str) -> Outcome<Double> {
        self.create(type_name, DoubleKind::Instance)
    }

    #[track_caller]
    pub fn type_double(&self, type_name: &str) -> Outcome<Double> {
        self.create(type_name, DoubleKind::Type)
    }

    #[track_caller]
    fn create(&self, type_name: &str, kind: DoubleKind) -> Outcome<Double> {
        let reference = self.registry.resolve(type_name);
        if self.strict && !reference.is_resolved() {
            return Err(Raise::double(DoubleFailure::UnresolvedType {
                type_name: type_name.to_owned(),
            }));
        }

        let double = Double::new(reference, kind);
        tracing::trace!(double = %double.describe(), "double created");
        self.created.borrow_mut().push(double.clone());
        Ok(double)
    }

    /// Every double created so far, in creation order.
    pub fn doubles(&self) -> Vec<Double> {
        self.created.borrow().clone()
    }
}
