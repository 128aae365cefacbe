//! Converts panics raised by service code into internal failures.
//!
//! A process-wide panic hook is installed the first time a [`CaptureScope`]
//! is entered. While [`CaptureScope::call`] runs on the current thread the
//! hook records the panic message and location instead of printing them;
//! panics on other threads, or anywhere outside `call`, reach the previously
//! installed hook as usual.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe, PanicHookInfo};
use std::sync::Once;

use crate::error::{InternalError, ServiceError};

static INSTALL_HOOK: Once = Once::new();

thread_local! {
    static CALL_DEPTH: Cell<usize> = const { Cell::new(0) };
    static LAST_PANIC: RefCell<Option<CapturedPanic>> = const { RefCell::new(None) };
}

struct CapturedPanic {
    message: String,
    location: Option<String>,
}

/// Turns panics raised inside [`CaptureScope::call`] into [`InternalError`]s.
///
/// Calls nest; a scope stays on the thread that entered it.
#[derive(Debug)]
pub struct CaptureScope {
    _not_send: PhantomData<*const ()>,
}

impl CaptureScope {
    /// Enters a capture scope on the current thread.
    #[must_use]
    pub fn enter() -> Self {
        INSTALL_HOOK.call_once(install_hook);
        Self {
            _not_send: PhantomData,
        }
    }

    /// Runs `operation`, turning a panic into an internal failure.
    ///
    /// # Errors
    ///
    /// Returns the operation's own failure, or an internal failure describing
    /// the panic.
    pub fn call<T>(
        &self,
        operation: impl FnOnce() -> Result<T, ServiceError>,
    ) -> Result<T, ServiceError> {
        CALL_DEPTH.with(|depth| depth.set(depth.get() + 1));
        let outcome = panic::catch_unwind(AssertUnwindSafe(operation));
        CALL_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
        match outcome {
            Ok(result) => result,
            Err(payload) => Err(ServiceError::Internal(captured_failure(payload.as_ref()))),
        }
    }
}

fn install_hook() {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info: &PanicHookInfo<'_>| {
        if CALL_DEPTH.with(Cell::get) == 0 {
            previous(info);
            return;
        }
        let captured = CapturedPanic {
            message: payload_message(info.payload()),
            location: info.location().map(ToString::to_string),
        };
        LAST_PANIC.with(|slot| *slot.borrow_mut() = Some(captured));
    }));
}

fn captured_failure(payload: &(dyn Any + Send)) -> InternalError {
    let captured = LAST_PANIC.with(|slot| slot.borrow_mut().take());
    match captured {
        Some(CapturedPanic { message, location }) => {
            let error = InternalError::new(message);
            match location {
                Some(location) => error.with_frame(format!("panicked at {location}")),
                None => error,
            }
        }
        None => InternalError::new(payload_message(payload)),
    }
}

fn payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "service panicked".to_owned()
    }
}
