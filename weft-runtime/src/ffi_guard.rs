// FFI boundary guard: wraps callbacks to catch panics before they cross the
// FFI boundary (which is undefined behavior).

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

use crate::logging::{LogLevel, Logger};

/// Execute `f` and catch any panic, returning `default` on failure.
///
/// All `extern "C"` functions called by the native host wrap their body in this
/// guard or in [`ffi_boundary_logged`].
pub fn ffi_boundary<F, R>(default: R, f: F) -> R
where
    F: FnOnce() -> R,
{
    catch_unwind(AssertUnwindSafe(f)).unwrap_or(default)
}

/// Like [`ffi_boundary`], but reports the panic message through `logger`.
pub fn ffi_boundary_logged<F, R>(logger: &Logger, default: R, f: F) -> R
where
    F: FnOnce() -> R,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(payload) => {
            logger.log(LogLevel::Error, &panic_message(&payload));
            default
        }
    }
}

/// Extract a human-readable message from a panic payload.
pub fn panic_message(payload: &Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("[Weft] Rust panic: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("[Weft] Rust panic: {s}")
    } else {
        "[Weft] Rust panic (unknown payload)".to_string()
    }
}
