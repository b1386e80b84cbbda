//! Failure isolation for ability callbacks.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::ability::CallbackError;

/// Runs a callback, converting a panic into [`CallbackError::Panicked`].
///
/// The engine holds no lock while a callback runs, so unwinding cannot leave
/// a store half-mutated.
pub(crate) fn isolate<T>(
    callback: impl FnOnce() -> Result<T, CallbackError>,
) -> Result<T, CallbackError> {
    match panic::catch_unwind(AssertUnwindSafe(callback)) {
        Ok(result) => result,
        Err(payload) => Err(CallbackError::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
