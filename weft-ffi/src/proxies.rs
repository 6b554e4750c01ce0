// Lifecycle proxies handed back to the native side when a script instance is
// created. The native side stores them and calls the pointers directly, passing
// `instance` back as the first argument.

use std::ffi::c_void;

use crate::handles::{INVALID_INSTANCE_ID, InstanceId};

pub type LifecycleFn = unsafe extern "C" fn(instance: *mut c_void);
pub type TickFn = unsafe extern "C" fn(instance: *mut c_void, delta_time: f32);

/// Returned from script object creation. All three hooks are always bound.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct ScriptObjectInstanceInfo {
    pub instance_id: InstanceId,
    pub instance: *mut c_void,
    pub begin_play: Option<LifecycleFn>,
    pub tick: Option<TickFn>,
    pub destroy: Option<LifecycleFn>,
}

/// Returned from script component creation. Only hooks the class overrides are
/// bound; the rest stay null and the native side skips them.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct ScriptComponentProxy {
    pub instance_id: InstanceId,
    pub instance: *mut c_void,
    pub on_component_created: Option<LifecycleFn>,
    pub on_component_destroyed: Option<LifecycleFn>,
    pub on_register: Option<LifecycleFn>,
    pub on_unregister: Option<LifecycleFn>,
    pub initialize_component: Option<LifecycleFn>,
    pub tick_component: Option<TickFn>,
}

impl Default for ScriptObjectInstanceInfo {
    fn default() -> Self {
        ScriptObjectInstanceInfo {
            instance_id: INVALID_INSTANCE_ID,
            instance: std::ptr::null_mut(),
            begin_play: None,
            tick: None,
            destroy: None,
        }
    }
}

impl Default for ScriptComponentProxy {
    fn default() -> Self {
        ScriptComponentProxy {
            instance_id: INVALID_INSTANCE_ID,
            instance: std::ptr::null_mut(),
            on_component_created: None,
            on_component_destroyed: None,
            on_register: None,
            on_unregister: None,
            initialize_component: None,
            tick_component: None,
        }
    }
}

/// Receives one UTF-8 string per call. Used to stream name lists out.
pub type StringSink = unsafe extern "C" fn(user_data: *mut c_void, text: *const u8, text_len: u32);
