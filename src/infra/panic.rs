//! # Panic Capture / Panic 捕获
//!
//! The outermost pipeline layer runs test code under `catch_unwind`. While it
//! does, the hook installed here records where the panic happened instead of
//! printing it; panics on any other thread, or outside a capture, still reach
//! the previously installed hook.
//!
//! 流水线最外层在 `catch_unwind` 下运行测试代码。在此期间，这里安装的钩子会记录
//! panic 发生的位置而不是打印它；其他线程上或捕获范围之外的 panic 仍会交给之前安装的钩子。

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

use crate::core::models::Trace;

static PANIC_HOOK_INIT: Once = Once::new();

thread_local! {
    static CAPTURING: Cell<bool> = const { Cell::new(false) };
    static CAPTURED: RefCell<Option<Trace>> = const { RefCell::new(None) };
}

/// A panic caught by [`capture`].
pub struct CaughtPanic {
    pub payload: Box<dyn Any + Send>,
    /// Where the panic was raised, when the hook saw it.
    pub trace: Trace,
}

impl CaughtPanic {
    /// The panic message for `&str` and `String` payloads.
    pub fn message(&self) -> String {
        payload_message(self.payload.as_ref())
    }
}

/// Extracts the message of a panic payload.
pub fn payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "Box<dyn Any>".to_owned()
    }
}

/// Installs the capturing panic hook once per process.
pub fn install_capture_hook() {
    PANIC_HOOK_INIT.call_once(|| {
        let default_hook = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if CAPTURING.with(Cell::get) {
                let trace = info
                    .location()
                    .map(Trace::capture)
                    .unwrap_or_default();
                CAPTURED.with(|captured| *captured.borrow_mut() = Some(trace));
            } else {
                default_hook(info);
            }
        }));
    });
}

/// Runs `f`, turning a panic into a [`CaughtPanic`].
pub fn capture<R>(f: impl FnOnce() -> R) -> Result<R, CaughtPanic> {
    install_capture_hook();

    let previous = CAPTURING.with(|capturing| capturing.replace(true));
    let result = panic::catch_unwind(AssertUnwindSafe(f));
    CAPTURING.with(|capturing| capturing.set(previous));

    result.map_err(|payload| CaughtPanic {
        payload,
        trace: CAPTURED
            .with(|captured| captured.borrow_mut().take())
            .unwrap_or_default(),
    })
}
