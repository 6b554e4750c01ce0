// Script instance capabilities and the extern "C" thunks that native code
// calls through the lifecycle proxies.

use std::ffi::c_void;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use bitflags::bitflags;
use weft_ffi::{InstanceId, ScriptComponentProxy, ScriptObjectInstanceInfo, UObjectPtr};

use crate::ffi_guard::{ffi_boundary_logged, panic_message};
use crate::handle::NativeHandle;
use crate::logging::Logger;
use crate::services::ContextServices;

/// Error type script constructors may return.
pub type ScriptResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// State every script instance carries, handed to its constructor.
#[derive(Debug)]
pub struct ScriptBase {
    instance_id: InstanceId,
    native: NativeHandle,
    services: Arc<ContextServices>,
}

impl ScriptBase {
    pub fn new(instance_id: InstanceId, native: UObjectPtr, services: Arc<ContextServices>) -> Self {
        ScriptBase {
            instance_id,
            native: NativeHandle::borrowed(native),
            services,
        }
    }

    pub fn instance_id(&self) -> InstanceId {
        self.instance_id
    }

    /// The native object or component this instance mirrors. Non-owning.
    pub fn native(&self) -> &NativeHandle {
        &self.native
    }

    pub fn log(&self) -> &Logger {
        self.services.logger()
    }

    /// Class lookups, handle adoption and array access for the owning context.
    pub fn services(&self) -> &Arc<ContextServices> {
        &self.services
    }
}

/// A script class mirroring a native object's lifecycle.
pub trait ScriptObject: Send + Sized + 'static {
    fn new(base: ScriptBase) -> ScriptResult<Self>;

    fn base(&self) -> &ScriptBase;

    fn instance_id(&self) -> InstanceId {
        self.base().instance_id()
    }

    fn begin_play(&mut self) {}

    fn tick(&mut self, _delta_time: f32) {}

    fn destroy(&mut self) {}
}

bitflags! {
    /// Component hooks a script class overrides.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ComponentHooks: u8 {
        const ON_COMPONENT_CREATED = 1 << 0;
        const ON_COMPONENT_DESTROYED = 1 << 1;
        const ON_REGISTER = 1 << 2;
        const ON_UNREGISTER = 1 << 3;
        const INITIALIZE_COMPONENT = 1 << 4;
        const TICK_COMPONENT = 1 << 5;
    }
}

/// A script class mirroring a native component's lifecycle.
///
/// Only hooks listed in `OVERRIDES` are exposed to native code. Implementations
/// annotated with `#[script_component]` get `OVERRIDES` filled in from the
/// methods they define.
pub trait ScriptComponent: Send + Sized + 'static {
    const OVERRIDES: ComponentHooks = ComponentHooks::empty();

    fn new(base: ScriptBase) -> ScriptResult<Self>;

    fn base(&self) -> &ScriptBase;

    fn instance_id(&self) -> InstanceId {
        self.base().instance_id()
    }

    fn on_component_created(&mut self) {}

    fn on_component_destroyed(&mut self) {}

    fn on_register(&mut self) {}

    fn on_unregister(&mut self) {}

    fn initialize_component(&mut self) {}

    fn tick_component(&mut self, _delta_time: f32) {}
}

// ---------------------------------------------------------------------------
// Thunks
// ---------------------------------------------------------------------------

/// Run `f` on the instance behind `instance`, catching panics and logging them
/// through the instance's own logger.
///
/// # Safety
/// `instance` must be null or point to a live `T` created by the context.
unsafe fn with_instance<T, F>(instance: *mut c_void, log_of: fn(&T) -> &Logger, f: F)
where
    F: FnOnce(&mut T),
{
    if instance.is_null() {
        return;
    }
    // SAFETY: guaranteed by the caller.
    let this = unsafe { &mut *(instance as *mut T) };
    let log = log_of(this).clone();
    ffi_boundary_logged(&log, (), || f(this));
}

fn object_log<T: ScriptObject>(this: &T) -> &Logger {
    this.base().log()
}

fn component_log<T: ScriptComponent>(this: &T) -> &Logger {
    this.base().log()
}

macro_rules! lifecycle_thunks {
    ($bound:ident, $log:ident; $($thunk:ident => $hook:ident),+ $(,)?) => {$(
        unsafe extern "C" fn $thunk<T: $bound>(instance: *mut c_void) {
            unsafe { with_instance::<T, _>(instance, $log::<T>, |this| this.$hook()) }
        }
    )+};
}

lifecycle_thunks!(ScriptObject, object_log;
    object_begin_play => begin_play,
    object_destroy => destroy,
);

lifecycle_thunks!(ScriptComponent, component_log;
    component_created => on_component_created,
    component_destroyed => on_component_destroyed,
    component_register => on_register,
    component_unregister => on_unregister,
    component_initialize => initialize_component,
);

unsafe extern "C" fn object_tick<T: ScriptObject>(instance: *mut c_void, delta_time: f32) {
    unsafe { with_instance::<T, _>(instance, object_log::<T>, |this| this.tick(delta_time)) }
}

unsafe extern "C" fn component_tick<T: ScriptComponent>(instance: *mut c_void, delta_time: f32) {
    unsafe {
        with_instance::<T, _>(instance, component_log::<T>, |this| this.tick_component(delta_time))
    }
}

/// Lifecycle info for a script object. Every hook is bound.
pub fn object_info<T: ScriptObject>(instance_id: InstanceId, instance: *mut c_void) -> ScriptObjectInstanceInfo {
    ScriptObjectInstanceInfo {
        instance_id,
        instance,
        begin_play: Some(object_begin_play::<T>),
        tick: Some(object_tick::<T>),
        destroy: Some(object_destroy::<T>),
    }
}

/// One row per component hook: its flag and how to bind its thunk.
pub struct HookBinding {
    pub flag: ComponentHooks,
    pub bind: fn(&mut ScriptComponentProxy),
}

pub fn component_hook_table<T: ScriptComponent>() -> [HookBinding; 6] {
    [
        HookBinding {
            flag: ComponentHooks::ON_COMPONENT_CREATED,
            bind: |p| p.on_component_created = Some(component_created::<T>),
        },
        HookBinding {
            flag: ComponentHooks::ON_COMPONENT_DESTROYED,
            bind: |p| p.on_component_destroyed = Some(component_destroyed::<T>),
        },
        HookBinding {
            flag: ComponentHooks::ON_REGISTER,
            bind: |p| p.on_register = Some(component_register::<T>),
        },
        HookBinding {
            flag: ComponentHooks::ON_UNREGISTER,
            bind: |p| p.on_unregister = Some(component_unregister::<T>),
        },
        HookBinding {
            flag: ComponentHooks::INITIALIZE_COMPONENT,
            bind: |p| p.initialize_component = Some(component_initialize::<T>),
        },
        HookBinding {
            flag: ComponentHooks::TICK_COMPONENT,
            bind: |p| p.tick_component = Some(component_tick::<T>),
        },
    ]
}

/// Proxy for a script component with only the `overrides` hooks bound.
pub fn component_proxy<T: ScriptComponent>(
    instance_id: InstanceId,
    instance: *mut c_void,
    overrides: ComponentHooks,
) -> ScriptComponentProxy {
    let mut proxy = ScriptComponentProxy {
        instance_id,
        instance,
        ..Default::default()
    };
    for hook in component_hook_table::<T>() {
        if overrides.contains(hook.flag) {
            (hook.bind)(&mut proxy);
        }
    }
    proxy
}

// ---------------------------------------------------------------------------
// InstanceBox
// ---------------------------------------------------------------------------

/// A type-erased, heap-pinned script instance. The address handed to native
/// code stays valid until the box is disposed.
pub struct InstanceBox {
    ptr: *mut c_void,
    drop_fn: unsafe fn(*mut c_void),
    type_name: &'static str,
}

// Only `Send` script types are boxed.
unsafe impl Send for InstanceBox {}

unsafe fn drop_boxed<T>(ptr: *mut c_void) {
    drop(unsafe { Box::from_raw(ptr as *mut T) });
}

impl InstanceBox {
    pub fn new<T: Send + 'static>(value: T) -> Self {
        InstanceBox {
            ptr: Box::into_raw(Box::new(value)) as *mut c_void,
            drop_fn: drop_boxed::<T>,
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn as_ptr(&self) -> *mut c_void {
        self.ptr
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Drop the instance, reporting a panicking destructor as an error.
    pub fn dispose(mut self) -> Result<(), String> {
        let ptr = std::mem::replace(&mut self.ptr, std::ptr::null_mut());
        let drop_fn = self.drop_fn;
        // SAFETY: `ptr` came from `Box::into_raw` for the type `drop_fn` was made for.
        std::panic::catch_unwind(AssertUnwindSafe(|| unsafe { drop_fn(ptr) }))
            .map_err(|p| panic_message(&p))
    }
}

impl Drop for InstanceBox {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            // SAFETY: see `dispose`.
            unsafe { (self.drop_fn)(self.ptr) };
        }
    }
}
