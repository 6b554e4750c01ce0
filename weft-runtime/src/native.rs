// Typed call wrappers over the native function-pointer tables.
//
// Script-side code never touches the raw tables. It talks to `ObjectUtils` /
// `ArrayUtils` / `LogSink` trait objects, which are either the `Native*`
// wrappers below or the in-process fakes in `crate::testing`.

use std::ffi::c_void;
use std::sync::Arc;

use weft_ffi::*;

use crate::error::{WeftError, WeftResult, check_ffi};
use crate::logging::{LogSink, NativeLogUtils};

/// Class introspection and reference tracking.
pub trait ObjectUtils: Send + Sync {
    /// Null when the native side knows no class with that name.
    fn class_by_name(&self, name: &str) -> UClassPtr;
    fn class_name(&self, class: UClassPtr) -> WeftResult<String>;
    fn is_class_child_of(&self, derived: UClassPtr, base: UClassPtr) -> bool;
    fn remove_object_ref(&self, obj: UObjectPtr);
}

/// Element access on native dynamic arrays. Indices are assumed in range.
pub trait ArrayUtils: Send + Sync {
    fn num(&self, array: ArrayPtr) -> i32;

    fn get_u8(&self, array: ArrayPtr, index: i32) -> u8;
    fn get_i16(&self, array: ArrayPtr, index: i32) -> i16;
    fn get_i32(&self, array: ArrayPtr, index: i32) -> i32;
    fn get_i64(&self, array: ArrayPtr, index: i32) -> i64;
    fn get_string(&self, array: ArrayPtr, index: i32) -> WeftResult<String>;
    fn get_name(&self, array: ArrayPtr, index: i32) -> ScriptName;
    fn get_object(&self, array: ArrayPtr, index: i32) -> UObjectPtr;

    fn set_u8(&self, array: ArrayPtr, index: i32, value: u8);
    fn set_i16(&self, array: ArrayPtr, index: i32, value: i16);
    fn set_i32(&self, array: ArrayPtr, index: i32, value: i32);
    fn set_i64(&self, array: ArrayPtr, index: i32, value: i64);
    fn set_string(&self, array: ArrayPtr, index: i32, value: &str);
    fn set_name(&self, array: ArrayPtr, index: i32, value: ScriptName);
    fn set_object(&self, array: ArrayPtr, index: i32, value: UObjectPtr);

    fn find_u8(&self, array: ArrayPtr, value: u8) -> i32;
    fn find_i16(&self, array: ArrayPtr, value: i16) -> i32;
    fn find_i32(&self, array: ArrayPtr, value: i32) -> i32;
    fn find_i64(&self, array: ArrayPtr, value: i64) -> i32;
    fn find_string(&self, array: ArrayPtr, value: &str) -> i32;
    fn find_name(&self, array: ArrayPtr, value: ScriptName) -> i32;
    fn find_object(&self, array: ArrayPtr, value: UObjectPtr) -> i32;

    /// Append a default element and return its index.
    fn add(&self, array: ArrayPtr) -> i32;
    fn reset(&self, array: ArrayPtr, new_capacity: i32);
    /// Insert a default element at `index`.
    fn insert(&self, array: ArrayPtr, index: i32);
    fn remove_at(&self, array: ArrayPtr, index: i32);
    fn destroy(&self, array: ArrayPtr);
}

/// Unwrap a nullable table entry. A missing entry the bridge needs is a host
/// bug; the resulting panic is caught at the FFI boundary.
#[inline]
fn bound<F>(entry: Option<F>, table: &str, name: &str) -> F {
    match entry {
        Some(f) => f,
        None => panic!("[Weft] {table}.{name} is not bound"),
    }
}

macro_rules! call {
    ($self:ident . $entry:ident ( $($arg:expr),* )) => {{
        let f = bound($self.table.$entry, $self.label(), stringify!($entry));
        // SAFETY: guaranteed by the constructor of the wrapper.
        unsafe { f($($arg),*) }
    }};
}

/// Read a UTF-8 string through the caller-buffer protocol, retrying once with
/// the size the native side reported.
fn read_string(call: impl Fn(*mut u8, u32, *mut u32) -> WeftErrorCode) -> WeftResult<String> {
    let mut buf = vec![0u8; 256];
    let mut written: u32 = 0;
    let code = call(buf.as_mut_ptr(), buf.len() as u32, &mut written);
    if code == WeftErrorCode::BufferTooSmall {
        let needed = (written as usize).max(buf.len() * 2);
        buf.resize(needed, 0);
        check_ffi(call(buf.as_mut_ptr(), buf.len() as u32, &mut written))?;
    } else {
        check_ffi(code)?;
    }
    buf.truncate(written as usize);
    String::from_utf8(buf).map_err(|_| WeftError::InvalidConversion("native string is not valid UTF-8".into()))
}

// ---------------------------------------------------------------------------
// NativeObjectUtils
// ---------------------------------------------------------------------------

pub struct NativeObjectUtils {
    table: ObjectUtilsTable,
}

impl NativeObjectUtils {
    /// # Safety
    /// Every non-null entry must follow the `ObjectUtilsTable` contract for as
    /// long as this value lives.
    pub unsafe fn new(table: ObjectUtilsTable) -> Self {
        NativeObjectUtils { table }
    }

    fn label(&self) -> &'static str {
        "ObjectUtils"
    }
}

impl ObjectUtils for NativeObjectUtils {
    fn class_by_name(&self, name: &str) -> UClassPtr {
        call!(self.get_class_by_name(name.as_ptr(), name.len() as u32))
    }

    fn class_name(&self, class: UClassPtr) -> WeftResult<String> {
        let f = bound(self.table.get_class_name, self.label(), "get_class_name");
        // SAFETY: see `NativeObjectUtils::new`; the buffer outlives each call.
        read_string(|buf, len, out| unsafe { f(class, buf, len, out) })
    }

    fn is_class_child_of(&self, derived: UClassPtr, base: UClassPtr) -> bool {
        call!(self.is_class_child_of(derived, base))
    }

    fn remove_object_ref(&self, obj: UObjectPtr) {
        call!(self.remove_object_ref(obj))
    }
}

// ---------------------------------------------------------------------------
// NativeArrayUtils
// ---------------------------------------------------------------------------

pub struct NativeArrayUtils {
    table: ArrayUtilsTable,
}

impl NativeArrayUtils {
    /// # Safety
    /// Every non-null entry must follow the `ArrayUtilsTable` contract for as
    /// long as this value lives.
    pub unsafe fn new(table: ArrayUtilsTable) -> Self {
        NativeArrayUtils { table }
    }

    fn label(&self) -> &'static str {
        "ArrayUtils"
    }

    fn raw_element(&self, array: ArrayPtr, index: i32) -> *const c_void {
        let ptr: *mut c_void = call!(self.get_raw_ptr(array, index));
        if ptr.is_null() {
            panic!("[Weft] ArrayUtils.get_raw_ptr returned null for index {index}");
        }
        ptr
    }
}

macro_rules! read_raw {
    ($name:ident, $ty:ty) => {
        fn $name(&self, array: ArrayPtr, index: i32) -> $ty {
            let ptr = self.raw_element(array, index);
            // SAFETY: the native side returned storage for an element of this type.
            unsafe { (ptr as *const $ty).read_unaligned() }
        }
    };
}

impl ArrayUtils for NativeArrayUtils {
    fn num(&self, array: ArrayPtr) -> i32 {
        call!(self.num(array))
    }

    read_raw!(get_u8, u8);
    read_raw!(get_i16, i16);
    read_raw!(get_i32, i32);
    read_raw!(get_i64, i64);

    fn get_string(&self, array: ArrayPtr, index: i32) -> WeftResult<String> {
        let f = bound(self.table.get_string, self.label(), "get_string");
        // SAFETY: see `NativeArrayUtils::new`; the buffer outlives each call.
        read_string(|buf, len, out| unsafe { f(array, index, buf, len, out) })
    }

    fn get_name(&self, array: ArrayPtr, index: i32) -> ScriptName {
        call!(self.get_name(array, index))
    }

    fn get_object(&self, array: ArrayPtr, index: i32) -> UObjectPtr {
        call!(self.get_object(array, index))
    }

    fn set_u8(&self, array: ArrayPtr, index: i32, value: u8) {
        call!(self.set_u8(array, index, value))
    }

    fn set_i16(&self, array: ArrayPtr, index: i32, value: i16) {
        call!(self.set_i16(array, index, value))
    }

    fn set_i32(&self, array: ArrayPtr, index: i32, value: i32) {
        call!(self.set_i32(array, index, value))
    }

    fn set_i64(&self, array: ArrayPtr, index: i32, value: i64) {
        call!(self.set_i64(array, index, value))
    }

    fn set_string(&self, array: ArrayPtr, index: i32, value: &str) {
        call!(self.set_string(array, index, value.as_ptr(), value.len() as u32))
    }

    fn set_name(&self, array: ArrayPtr, index: i32, value: ScriptName) {
        call!(self.set_name(array, index, value))
    }

    fn set_object(&self, array: ArrayPtr, index: i32, value: UObjectPtr) {
        call!(self.set_object(array, index, value))
    }

    fn find_u8(&self, array: ArrayPtr, value: u8) -> i32 {
        call!(self.find_u8(array, value))
    }

    fn find_i16(&self, array: ArrayPtr, value: i16) -> i32 {
        call!(self.find_i16(array, value))
    }

    fn find_i32(&self, array: ArrayPtr, value: i32) -> i32 {
        call!(self.find_i32(array, value))
    }

    fn find_i64(&self, array: ArrayPtr, value: i64) -> i32 {
        call!(self.find_i64(array, value))
    }

    fn find_string(&self, array: ArrayPtr, value: &str) -> i32 {
        call!(self.find_string(array, value.as_ptr(), value.len() as u32))
    }

    fn find_name(&self, array: ArrayPtr, value: ScriptName) -> i32 {
        call!(self.find_name(array, value))
    }

    fn find_object(&self, array: ArrayPtr, value: UObjectPtr) -> i32 {
        call!(self.find_object(array, value))
    }

    fn add(&self, array: ArrayPtr) -> i32 {
        call!(self.add(array))
    }

    fn reset(&self, array: ArrayPtr, new_capacity: i32) {
        call!(self.reset(array, new_capacity))
    }

    fn insert(&self, array: ArrayPtr, index: i32) {
        call!(self.insert(array, index))
    }

    fn remove_at(&self, array: ArrayPtr, index: i32) {
        call!(self.remove_at(array, index))
    }

    fn destroy(&self, array: ArrayPtr) {
        call!(self.destroy(array))
    }
}

// ---------------------------------------------------------------------------
// FunctionTables
// ---------------------------------------------------------------------------

/// The three utility tables bound into one execution context.
#[derive(Clone)]
pub struct FunctionTables {
    pub object: Arc<dyn ObjectUtils>,
    pub log: Arc<dyn LogSink>,
    pub array: Arc<dyn ArrayUtils>,
}

impl FunctionTables {
    /// Wrap raw tables received from the native host. Tables are copied.
    ///
    /// # Safety
    /// Every non-null entry of every table must stay callable under its
    /// documented contract for as long as the returned value (or any clone of
    /// its `Arc`s) lives.
    pub unsafe fn from_native(
        object: &ObjectUtilsTable,
        log: &LogUtilsTable,
        array: &ArrayUtilsTable,
    ) -> Self {
        unsafe {
            FunctionTables {
                object: Arc::new(NativeObjectUtils::new(*object)),
                log: Arc::new(NativeLogUtils::new(*log)),
                array: Arc::new(NativeArrayUtils::new(*array)),
            }
        }
    }
}
