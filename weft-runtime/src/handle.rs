// Owning and non-owning references to native objects.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use weft_ffi::UObjectPtr;

use crate::native::ObjectUtils;

/// The release callback of one execution context.
///
/// Every owning handle created in a context shares the context's hook. The
/// context closes the hook when it unloads, after which releases become no-ops:
/// a handle that outlives its context never calls into native code.
pub struct ReleaseHook {
    utils: Arc<dyn ObjectUtils>,
    open: AtomicBool,
}

impl ReleaseHook {
    pub fn new(utils: Arc<dyn ObjectUtils>) -> Arc<Self> {
        Arc::new(ReleaseHook {
            utils,
            open: AtomicBool::new(true),
        })
    }

    pub fn release(&self, obj: UObjectPtr) {
        if self.open.load(Ordering::Acquire) {
            self.utils.remove_object_ref(obj);
        }
    }

    pub fn revoke(&self) {
        self.open.store(false, Ordering::Release);
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

/// A native object pointer plus the ownership flag and release callback.
///
/// A null handle is a valid, inert value. Construction never calls into native
/// code; release happens at most once, on `release()` or drop, and only for
/// owning handles with a hook.
pub struct NativeHandle {
    addr: usize,
    owns: bool,
    hook: Option<Arc<ReleaseHook>>,
}

impl NativeHandle {
    #[inline]
    pub const fn null() -> Self {
        NativeHandle {
            addr: 0,
            owns: false,
            hook: None,
        }
    }

    pub fn new(ptr: UObjectPtr, owns: bool, hook: Option<Arc<ReleaseHook>>) -> Self {
        NativeHandle {
            addr: ptr.addr(),
            owns,
            hook,
        }
    }

    /// A non-owning handle. Never releases.
    pub fn borrowed(ptr: UObjectPtr) -> Self {
        NativeHandle::new(ptr, false, None)
    }

    #[inline]
    pub fn is_invalid(&self) -> bool {
        self.addr == 0
    }

    #[inline]
    pub fn ptr(&self) -> UObjectPtr {
        UObjectPtr::from_addr(self.addr)
    }

    #[inline]
    pub fn owns(&self) -> bool {
        self.owns
    }

    /// Withdraw the bridge's reference. Idempotent; the handle is invalid afterwards.
    pub fn release(&mut self) {
        if self.addr == 0 {
            return;
        }
        let ptr = self.ptr();
        self.addr = 0;
        if self.owns {
            if let Some(hook) = self.hook.take() {
                hook.release(ptr);
            }
        }
    }

    /// A non-owning alias of the same pointer.
    pub fn to_borrowed(&self) -> NativeHandle {
        NativeHandle::borrowed(self.ptr())
    }
}

impl Default for NativeHandle {
    fn default() -> Self {
        NativeHandle::null()
    }
}

impl Drop for NativeHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl PartialEq for NativeHandle {
    fn eq(&self, other: &Self) -> bool {
        self.addr == other.addr
    }
}

impl Eq for NativeHandle {}

impl Hash for NativeHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr.hash(state);
    }
}

impl fmt::Debug for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeHandle")
            .field("addr", &format_args!("{:#x}", self.addr))
            .field("owns", &self.owns)
            .finish()
    }
}
