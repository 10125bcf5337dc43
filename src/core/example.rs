//! # Execution Instance Module / 执行实例模块
//!
//! An [`Example`] is created by the pipeline for every single execution of a
//! unit of work. It holds everything that may change while that unit runs:
//! the memoized-value cache and the doubles created by the test. Nothing in it
//! outlives the execution, so two executions never observe each other's state,
//! even when they run concurrently on different workers.
//!
//! 流水线为工作单元的每一次执行创建一个 [`Example`]。它保存该单元运行期间
//! 可能变化的一切：记忆化值缓存和测试创建的替身。其中的内容不会比执行活得更久，
//! 因此两次执行永远不会观察到彼此的状态，即使它们在不同工作线程上并发运行。

use serde_json::Value;
use std::any::{Any, type_name};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::core::context::Helper;
use crate::core::double::{Double, DoubleSpace};
use crate::core::models::NestedUnitOfWork;
use crate::core::raise::{Outcome, Raise};

pub struct Example {
    unit: NestedUnitOfWork,
    memo: RefCell<HashMap<String, Rc<dyn Any>>>,
    computing: RefCell<Vec<String>>,
    doubles: RefCell<Option<DoubleSpace>>,
}

impl Example {
    pub fn new(unit: NestedUnitOfWork) -> Self {
        Self {
            unit,
            memo: RefCell::new(HashMap::new()),
            computing: RefCell::new(Vec::new()),
            doubles: RefCell::new(None),
        }
    }

    /// The unit of work this execution belongs to.
    pub fn unit(&self) -> &NestedUnitOfWork {
        &self.unit
    }

    /// Returns the memoized value `name`, computing it on first access.
    ///
    /// Repeated gets within one execution return the same `Rc`.
    ///
    /// 返回记忆化值 `name`，首次访问时计算。同一次执行中的重复获取返回同一个 `Rc`。
    #[track_caller]
    pub fn get<T: Any>(&self, name: &str) -> Outcome<Rc<T>> {
        let cached = self.memo.borrow().get(name).cloned();
        let value = match cached {
            Some(value) => value,
            None => {
                let compute = match self.unit.helper(name) {
                    Some(Helper::Memoized(compute)) => compute.clone(),
                    Some(Helper::Method(_)) => {
                        return Err(Raise::code(anyhow::anyhow!(
                            "`{name}` is a helper method, use `call` instead of `get`"
                        )));
                    }
                    None => {
                        return Err(Raise::code(anyhow::anyhow!(
                            "no memoized value named `{name}` is defined for `{}`",
                            self.unit.full_name()
                        )));
                    }
                };

                if self.computing.borrow().iter().any(|pending| pending == name) {
                    return Err(Raise::code(anyhow::anyhow!(
                        "memoized value `{name}` depends on itself"
                    )));
                }
                self.computing.borrow_mut().push(name.to_owned());
                let computed = compute(self);
                self.computing.borrow_mut().retain(|pending| pending != name);

                let value = computed?;
                self.memo
                    .borrow_mut()
                    .insert(name.to_owned(), Rc::clone(&value));
                value
            }
        };

        value.downcast::<T>().map_err(|_| {
            Raise::code(anyhow::anyhow!(
                "memoized value `{name}` is not a `{}`",
                type_name::<T>()
            ))
        })
    }

    /// Calls the helper method `name` with `args`.
    #[track_caller]
    pub fn call(&self, name: &str, args: &[Value]) -> Outcome<Value> {
        match self.unit.helper(name) {
            Some(Helper::Method(method)) => method(self, args),
            Some(Helper::Memoized(_)) => Err(Raise::code(anyhow::anyhow!(
                "`{name}` is a memoized value, use `get` instead of `call`"
            ))),
            None => Err(Raise::code(anyhow::anyhow!(
                "no helper named `{name}` is defined for `{}`",
                self.unit.full_name()
            ))),
        }
    }

    /// Creates a double standing in for an instance of `type_name`.
    /// Requires a pipeline with a double layer.
    #[track_caller]
    pub fn instance_double(&self, type_name: &str) -> Outcome<Double> {
        match self.doubles.borrow().as_ref() {
            Some(space) => space.instance_double(type_name),
            None => Err(doubles_disabled()),
        }
    }

    /// Creates a double standing in for the type `type_name` itself.
    #[track_caller]
    pub fn type_double(&self, type_name: &str) -> Outcome<Double> {
        match self.doubles.borrow().as_ref() {
            Some(space) => space.type_double(type_name),
            None => Err(doubles_disabled()),
        }
    }

    pub(crate) fn install_doubles(&self, space: DoubleSpace) {
        *self.doubles.borrow_mut() = Some(space);
    }

    pub(crate) fn take_doubles(&self) -> Option<DoubleSpace> {
        self.doubles.borrow_mut().take()
    }
}

#[track_caller]
fn doubles_disabled() -> Raise {
    Raise::code(anyhow::anyhow!(
        "doubles are not enabled in this pipeline; add a DoubleLayer"
    ))
}
