use std::ffi::c_void;

/// Opaque pointer to a native object. Never dereferenced on the script side.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct UObjectPtr(pub *mut c_void);

/// Opaque pointer to a native class object.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct UClassPtr(pub *mut c_void);

/// Opaque pointer to a native dynamic array.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ArrayPtr(pub *mut c_void);

macro_rules! impl_raw_ptr {
    ($($ty:ident),+) => {$(
        impl $ty {
            #[inline]
            pub const fn null() -> Self {
                $ty(std::ptr::null_mut())
            }

            #[inline]
            pub fn is_null(self) -> bool {
                self.0.is_null()
            }

            /// The raw address as an integer. Used as a map key.
            #[inline]
            pub fn addr(self) -> usize {
                self.0 as usize
            }

            #[inline]
            pub fn from_addr(addr: usize) -> Self {
                $ty(addr as *mut c_void)
            }
        }

        impl Default for $ty {
            fn default() -> Self {
                $ty::null()
            }
        }
    )+};
}

impl_raw_ptr!(UObjectPtr, UClassPtr, ArrayPtr);

/// Native name value: comparison index plus instance number.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct ScriptName {
    pub comparison_index: i32,
    pub number: i32,
}

/// Identifies an execution context across the boundary.
pub type ContextId = i32;

/// Returned by context creation on failure.
pub const INVALID_CONTEXT_ID: ContextId = 0;

/// The privileged default context. Exists once per process.
pub const DEFAULT_CONTEXT_ID: ContextId = 1;

/// Identifies a live script instance within one context.
pub type InstanceId = i64;

/// Reserved: never handed out by the instance id generator.
pub const INVALID_INSTANCE_ID: InstanceId = 0;

// Pointers are plain identifiers. They may be moved between threads but are
// only *used* on the native game thread.
unsafe impl Send for UObjectPtr {}
unsafe impl Sync for UObjectPtr {}
unsafe impl Send for UClassPtr {}
unsafe impl Sync for UClassPtr {}
unsafe impl Send for ArrayPtr {}
unsafe impl Sync for ArrayPtr {}
