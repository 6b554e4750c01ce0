// Process-global host behind the `entry!()` exports. Each function here is the
// body of one export: arguments arrive as raw pointers, nothing unwinds out,
// and failures come back as the export's sentinel value.

use std::ffi::c_void;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use weft_ffi::{
    ArrayUtilsTable, ContextId, INVALID_CONTEXT_ID, InstanceId, LogUtilsTable, ObjectUtilsTable,
    ScriptComponentProxy, ScriptObjectInstanceInfo, StringSink, UObjectPtr,
};
use weft_runtime::{
    AssemblyCatalog, FunctionTables, HostConfig, LogLevel, Logger, NativeLogUtils, ffi_boundary,
    ffi_boundary_logged, wlog,
};

use crate::host::{Host, finish_destroy_all_contexts, finish_destroy_context, finish_destroy_instance};

static HOST: Mutex<Option<Host>> = Mutex::new(None);

/// A panic while the host was locked must not take the bridge down with it.
fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Run `f` against the live host. `default` when the host is not started or
/// `f` panics; the panic is logged through the host's logger.
///
/// The host lock is held while `f` runs. Nothing `f` calls may re-enter an
/// export; code that runs script destructors goes through [`detach_then`].
fn with_host<R: Copy>(default: R, f: impl FnOnce(&mut Host) -> R) -> R {
    ffi_boundary(default, || {
        let mut guard = lock_or_recover(&HOST);
        let Some(host) = guard.as_mut() else {
            return default;
        };
        let log = host.logger().clone();
        ffi_boundary_logged(&log, default, || f(host))
    })
}

/// Unregister something under the host lock with `detach`, then release the
/// lock and hand it to `finish`. Script destructors run in `finish`, so the
/// native callbacks they make may call any export again.
fn detach_then<D>(detach: impl FnOnce(&mut Host) -> Option<D>, finish: impl FnOnce(&Logger, D) -> bool) -> bool {
    ffi_boundary(false, || {
        let (log, detached) = {
            let mut guard = lock_or_recover(&HOST);
            let Some(host) = guard.as_mut() else {
                return false;
            };
            let log = host.logger().clone();
            let detached = ffi_boundary_logged(&log, None, || detach(host));
            (log, detached)
        };
        match detached {
            Some(detached) => ffi_boundary_logged(&log, false, || finish(&log, detached)),
            None => false,
        }
    })
}

/// # Safety
/// `ptr` must be null or point to `len` readable bytes that outlive the call.
unsafe fn utf8_arg<'a>(ptr: *const u8, len: u32) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    let bytes = unsafe { std::slice::from_raw_parts(ptr, len as usize) };
    std::str::from_utf8(bytes).ok()
}

fn bad_argument(host: &Host, operation: &str, what: &str) {
    wlog!(host.logger(), LogLevel::Error, "[Weft] protocol violation in {operation}: {what}");
}

// ---------------------------------------------------------------------------
// Startup / shutdown
// ---------------------------------------------------------------------------

/// Build the host from an optional TOML config file. A second call while the
/// host is running fails.
///
/// # Safety
/// `log_table` must be null or valid for the whole host lifetime; `config_path`
/// must be null or point to `config_path_len` bytes.
pub unsafe fn startup(log_table: *const LogUtilsTable, config_path: *const u8, config_path_len: u32) -> bool {
    ffi_boundary(false, || {
        let log = if log_table.is_null() {
            Logger::null()
        } else {
            Logger::new(Arc::new(unsafe { NativeLogUtils::new(*log_table) }))
        };

        let mut guard = lock_or_recover(&HOST);
        if guard.is_some() {
            wlog!(log, LogLevel::Error, "[Weft] protocol violation in startup: host already running");
            return false;
        }

        let config = match unsafe { utf8_arg(config_path, config_path_len) } {
            None | Some("") => HostConfig::default(),
            Some(path) => match HostConfig::load(Path::new(path)) {
                Ok(config) => config,
                Err(err) => {
                    wlog!(log, LogLevel::Error, "[Weft] startup failed: {err}");
                    return false;
                }
            },
        };

        let catalog = AssemblyCatalog::from_inventory();
        wlog!(log, LogLevel::Display, "[Weft] host started ({} assemblies)", catalog.len());
        *guard = Some(Host::new(config, log, catalog));
        true
    })
}

/// Destroy all contexts and drop the host. No-op when not started. The host
/// is taken out of the global first, so exports called while contexts unload
/// see no host.
pub fn shutdown() {
    ffi_boundary((), || {
        let host = lock_or_recover(&HOST).take();
        if let Some(mut host) = host {
            host.shutdown();
        }
    })
}

// ---------------------------------------------------------------------------
// Context lifecycle
// ---------------------------------------------------------------------------

/// # Safety
/// `application_base` must be null or point to `len` bytes. Null or empty uses
/// the configured base.
pub unsafe fn create_context(requester: ContextId, application_base: *const u8, len: u32) -> ContextId {
    with_host(INVALID_CONTEXT_ID, |host| {
        let base = unsafe { utf8_arg(application_base, len) }.filter(|s| !s.is_empty());
        host.create_context(requester, base.map(Path::new))
    })
}

pub fn destroy_context(requester: ContextId, ctx: ContextId) -> bool {
    detach_then(|host| host.remove_context(requester, ctx), finish_destroy_context)
}

pub fn destroy_all_contexts(requester: ContextId) -> bool {
    detach_then(|host| host.remove_all_contexts(requester), finish_destroy_all_contexts)
}

/// # Safety
/// Each table pointer must be null or valid, and every non-null entry must stay
/// callable until the context is destroyed.
pub unsafe fn bind_function_tables(
    ctx: ContextId,
    object_table: *const ObjectUtilsTable,
    log_table: *const LogUtilsTable,
    array_table: *const ArrayUtilsTable,
) -> bool {
    with_host(false, |host| {
        if object_table.is_null() || log_table.is_null() || array_table.is_null() {
            bad_argument(host, "bind_function_tables", "null function table");
            return false;
        }
        let tables = unsafe { FunctionTables::from_native(&*object_table, &*log_table, &*array_table) };
        host.bind_function_tables(ctx, tables)
    })
}

/// # Safety
/// `name` must point to `len` bytes.
pub unsafe fn load_assembly(ctx: ContextId, name: *const u8, len: u32) -> bool {
    with_host(false, |host| match unsafe { utf8_arg(name, len) } {
        Some(name) => host.load_assembly(ctx, name),
        None => {
            bad_argument(host, "load_assembly", "assembly name is null or not UTF-8");
            false
        }
    })
}

// ---------------------------------------------------------------------------
// Script instances
// ---------------------------------------------------------------------------

/// # Safety
/// `class_name` must point to `len` bytes; `out_info` must be null or writable.
pub unsafe fn create_script_object(
    ctx: ContextId,
    class_name: *const u8,
    len: u32,
    owner: UObjectPtr,
    out_info: *mut ScriptObjectInstanceInfo,
) -> bool {
    with_host(false, |host| {
        let Some(class_name) = (unsafe { utf8_arg(class_name, len) }) else {
            bad_argument(host, "create_script_object", "class name is null or not UTF-8");
            return false;
        };
        if out_info.is_null() {
            bad_argument(host, "create_script_object", "null output pointer");
            return false;
        }
        match host.create_script_object(ctx, class_name, owner) {
            Some(info) => {
                unsafe { out_info.write(info) };
                true
            }
            None => false,
        }
    })
}

/// # Safety
/// `class_name` must point to `len` bytes; `out_proxy` must be null or writable.
pub unsafe fn create_script_component(
    ctx: ContextId,
    class_name: *const u8,
    len: u32,
    component: UObjectPtr,
    out_proxy: *mut ScriptComponentProxy,
) -> bool {
    with_host(false, |host| {
        let Some(class_name) = (unsafe { utf8_arg(class_name, len) }) else {
            bad_argument(host, "create_script_component", "class name is null or not UTF-8");
            return false;
        };
        if out_proxy.is_null() {
            bad_argument(host, "create_script_component", "null output pointer");
            return false;
        }
        match host.create_script_component(ctx, class_name, component) {
            Some(proxy) => {
                unsafe { out_proxy.write(proxy) };
                true
            }
            None => false,
        }
    })
}

pub fn destroy_script_object(ctx: ContextId, instance_id: InstanceId) -> bool {
    detach_then(
        |host| host.remove_script_object(ctx, instance_id),
        |log, removed| finish_destroy_instance(log, "destroy_script_object", removed),
    )
}

pub fn destroy_script_component(ctx: ContextId, instance_id: InstanceId) -> bool {
    detach_then(
        |host| host.remove_script_component(ctx, instance_id),
        |log, removed| finish_destroy_instance(log, "destroy_script_component", removed),
    )
}

/// Stream component class names through `sink`. Returns how many were sent,
/// or -1 when the context cannot be queried.
///
/// # Safety
/// `sink` must accept `user_data` and a borrowed UTF-8 slice for each call.
pub unsafe fn list_script_component_types(ctx: ContextId, sink: Option<StringSink>, user_data: *mut c_void) -> i32 {
    with_host(-1, |host| {
        let Some(names) = host.script_component_types(ctx) else {
            return -1;
        };
        if let Some(sink) = sink {
            for name in &names {
                unsafe { sink(user_data, name.as_ptr(), name.len() as u32) };
            }
        }
        names.len() as i32
    })
}

/// # Safety
/// `class_name` must point to `len` bytes and `pointers` to `count` entries
/// (or be null with `count == 0`).
pub unsafe fn set_native_function_pointers(
    ctx: ContextId,
    class_name: *const u8,
    len: u32,
    pointers: *const *const c_void,
    count: u32,
) -> bool {
    with_host(false, |host| {
        let Some(class_name) = (unsafe { utf8_arg(class_name, len) }) else {
            bad_argument(host, "set_native_function_pointers", "class name is null or not UTF-8");
            return false;
        };
        let pointers = match (pointers.is_null(), count) {
            (_, 0) => Vec::new(),
            (true, _) => {
                bad_argument(host, "set_native_function_pointers", "null pointer list");
                return false;
            }
            (false, n) => unsafe { std::slice::from_raw_parts(pointers, n as usize) }.to_vec(),
        };
        host.set_native_function_pointers(ctx, class_name, pointers)
    })
}
