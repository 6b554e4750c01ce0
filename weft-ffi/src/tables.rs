use std::ffi::c_void;

use crate::error::WeftErrorCode;
use crate::handles::*;

// Every entry is nullable: the native side may leave utilities it does not
// provide unset. `Option<fn>` has the same layout as a raw function pointer.

// ---------------------------------------------------------------------------
// Object utilities
// ---------------------------------------------------------------------------

/// Class introspection and reference tracking, bound once per context.
#[repr(C)]
#[derive(Clone, Copy, Default)]
pub struct ObjectUtilsTable {
    /// Look up a native class by its un-prefixed name (UTF-8). Null when absent.
    pub get_class_by_name:
        Option<unsafe extern "C" fn(name: *const u8, name_len: u32) -> UClassPtr>,

    /// Write the class name into a caller-supplied buffer (UTF-8).
    /// Returns `BufferTooSmall` with `out_len` set when `buf_len` is insufficient.
    pub get_class_name: Option<
        unsafe extern "C" fn(
            class: UClassPtr,
            buf: *mut u8,
            buf_len: u32,
            out_len: *mut u32,
        ) -> WeftErrorCode,
    >,

    /// True when `derived` is `base` or inherits from it.
    pub is_class_child_of:
        Option<unsafe extern "C" fn(derived: UClassPtr, base: UClassPtr) -> bool>,

    /// Drop the reference the bridge holds on an object.
    pub remove_object_ref: Option<unsafe extern "C" fn(obj: UObjectPtr)>,
}

// ---------------------------------------------------------------------------
// Log utilities
// ---------------------------------------------------------------------------

pub type LogFn = unsafe extern "C" fn(text: *const u8, text_len: u32);

/// One entry per native verbosity level. Text is UTF-8, not NUL-terminated.
#[repr(C)]
#[derive(Clone, Copy, Default)]
pub struct LogUtilsTable {
    /// Terminates the host process after logging.
    pub fatal: Option<LogFn>,
    pub error: Option<LogFn>,
    pub warning: Option<LogFn>,
    pub display: Option<LogFn>,
    pub log: Option<LogFn>,
    pub verbose: Option<LogFn>,
    pub very_verbose: Option<LogFn>,
}

// ---------------------------------------------------------------------------
// Array utilities
// ---------------------------------------------------------------------------

/// Element access on native dynamic arrays. Indices are not range checked
/// natively; callers validate against `num` first.
#[repr(C)]
#[derive(Clone, Copy, Default)]
pub struct ArrayUtilsTable {
    pub num: Option<unsafe extern "C" fn(array: ArrayPtr) -> i32>,

    /// Pointer to the element storage at `index`. Primitive reads go through this.
    pub get_raw_ptr: Option<unsafe extern "C" fn(array: ArrayPtr, index: i32) -> *mut c_void>,

    pub get_string: Option<
        unsafe extern "C" fn(
            array: ArrayPtr,
            index: i32,
            buf: *mut u8,
            buf_len: u32,
            out_len: *mut u32,
        ) -> WeftErrorCode,
    >,
    pub get_name: Option<unsafe extern "C" fn(array: ArrayPtr, index: i32) -> ScriptName>,
    pub get_object: Option<unsafe extern "C" fn(array: ArrayPtr, index: i32) -> UObjectPtr>,

    pub set_u8: Option<unsafe extern "C" fn(array: ArrayPtr, index: i32, value: u8)>,
    pub set_i16: Option<unsafe extern "C" fn(array: ArrayPtr, index: i32, value: i16)>,
    pub set_i32: Option<unsafe extern "C" fn(array: ArrayPtr, index: i32, value: i32)>,
    pub set_i64: Option<unsafe extern "C" fn(array: ArrayPtr, index: i32, value: i64)>,
    pub set_string: Option<
        unsafe extern "C" fn(array: ArrayPtr, index: i32, text: *const u8, text_len: u32),
    >,
    pub set_name: Option<unsafe extern "C" fn(array: ArrayPtr, index: i32, value: ScriptName)>,
    pub set_object: Option<unsafe extern "C" fn(array: ArrayPtr, index: i32, value: UObjectPtr)>,

    /// Append one default-initialized element; returns its index.
    pub add: Option<unsafe extern "C" fn(array: ArrayPtr) -> i32>,
    /// Remove every element, keeping `new_capacity` slots allocated.
    pub reset: Option<unsafe extern "C" fn(array: ArrayPtr, new_capacity: i32)>,

    /// Typed linear searches; -1 when absent.
    pub find_u8: Option<unsafe extern "C" fn(array: ArrayPtr, value: u8) -> i32>,
    pub find_i16: Option<unsafe extern "C" fn(array: ArrayPtr, value: i16) -> i32>,
    pub find_i32: Option<unsafe extern "C" fn(array: ArrayPtr, value: i32) -> i32>,
    pub find_i64: Option<unsafe extern "C" fn(array: ArrayPtr, value: i64) -> i32>,
    pub find_string:
        Option<unsafe extern "C" fn(array: ArrayPtr, text: *const u8, text_len: u32) -> i32>,
    pub find_name: Option<unsafe extern "C" fn(array: ArrayPtr, value: ScriptName) -> i32>,
    pub find_object: Option<unsafe extern "C" fn(array: ArrayPtr, value: UObjectPtr) -> i32>,

    /// Insert one default-initialized element at `index`.
    pub insert: Option<unsafe extern "C" fn(array: ArrayPtr, index: i32)>,
    pub remove_at: Option<unsafe extern "C" fn(array: ArrayPtr, index: i32)>,
    /// Free a native array the bridge owns.
    pub destroy: Option<unsafe extern "C" fn(array: ArrayPtr)>,
}
