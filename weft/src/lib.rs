// weft: User-facing library crate. Script crates depend on this, declare their
// classes with #[script_object] / #[script_component], and call `weft::entry!()`
// to generate the DLL entry points in their own cdylib crate.

// Re-exports for proc macro path resolution and user access.
pub use weft_ffi as ffi;
pub use weft_runtime as runtime;
pub use weft_macros::{script_component, script_object};

// For proc macro generated inventory::submit! invocations.
#[doc(hidden)]
pub extern crate inventory as __inventory;

pub mod boundary;
pub mod host;
pub mod prelude;

pub use host::Host;

/// Generates the DLL exports the native host calls.
///
/// Place this at the top of your cdylib crate's `lib.rs`:
/// ```ignore
/// weft::entry!();
/// ```
///
/// Every export forwards to [`boundary`], which catches panics and turns
/// failures into status values plus a log line.
///
/// # Re-entry
///
/// Exports serialize on one host lock. The `weft_destroy_*` exports and
/// `weft_shutdown` release it before script instances are dropped, so native
/// callbacks reached from script destructors (`remove_object_ref`, log
/// entries) may call any export. Callbacks made while another export runs,
/// for example from a script constructor, must not re-enter: the lock is
/// still held and the call would block forever. Lifecycle hooks are called by
/// native code directly and hold no lock.
#[macro_export]
macro_rules! entry {
    () => {
        pub mod __weft_entry {
            use ::core::ffi::c_void;

            use $crate::ffi::{
                ArrayUtilsTable, ContextId, InstanceId, LogUtilsTable, ObjectUtilsTable,
                ScriptComponentProxy, ScriptObjectInstanceInfo, StringSink, UObjectPtr,
            };

            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn weft_startup(
                log_table: *const LogUtilsTable,
                config_path: *const u8,
                config_path_len: u32,
            ) -> bool {
                unsafe { $crate::boundary::startup(log_table, config_path, config_path_len) }
            }

            #[unsafe(no_mangle)]
            pub extern "C" fn weft_shutdown() {
                $crate::boundary::shutdown()
            }

            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn weft_create_context(
                requester: ContextId,
                application_base: *const u8,
                application_base_len: u32,
            ) -> ContextId {
                unsafe { $crate::boundary::create_context(requester, application_base, application_base_len) }
            }

            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn weft_bind_function_tables(
                ctx: ContextId,
                object_table: *const ObjectUtilsTable,
                log_table: *const LogUtilsTable,
                array_table: *const ArrayUtilsTable,
            ) -> bool {
                unsafe { $crate::boundary::bind_function_tables(ctx, object_table, log_table, array_table) }
            }

            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn weft_load_assembly(ctx: ContextId, name: *const u8, name_len: u32) -> bool {
                unsafe { $crate::boundary::load_assembly(ctx, name, name_len) }
            }

            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn weft_create_script_object(
                ctx: ContextId,
                class_name: *const u8,
                class_name_len: u32,
                owner: UObjectPtr,
                out_info: *mut ScriptObjectInstanceInfo,
            ) -> bool {
                unsafe { $crate::boundary::create_script_object(ctx, class_name, class_name_len, owner, out_info) }
            }

            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn weft_create_script_component(
                ctx: ContextId,
                class_name: *const u8,
                class_name_len: u32,
                component: UObjectPtr,
                out_proxy: *mut ScriptComponentProxy,
            ) -> bool {
                unsafe {
                    $crate::boundary::create_script_component(ctx, class_name, class_name_len, component, out_proxy)
                }
            }

            #[unsafe(no_mangle)]
            pub extern "C" fn weft_destroy_script_object(ctx: ContextId, instance_id: InstanceId) -> bool {
                $crate::boundary::destroy_script_object(ctx, instance_id)
            }

            #[unsafe(no_mangle)]
            pub extern "C" fn weft_destroy_script_component(ctx: ContextId, instance_id: InstanceId) -> bool {
                $crate::boundary::destroy_script_component(ctx, instance_id)
            }

            #[unsafe(no_mangle)]
            pub extern "C" fn weft_destroy_context(requester: ContextId, ctx: ContextId) -> bool {
                $crate::boundary::destroy_context(requester, ctx)
            }

            #[unsafe(no_mangle)]
            pub extern "C" fn weft_destroy_all_contexts(requester: ContextId) -> bool {
                $crate::boundary::destroy_all_contexts(requester)
            }

            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn weft_list_script_component_types(
                ctx: ContextId,
                sink: Option<StringSink>,
                user_data: *mut c_void,
            ) -> i32 {
                unsafe { $crate::boundary::list_script_component_types(ctx, sink, user_data) }
            }

            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn weft_set_native_function_pointers(
                ctx: ContextId,
                class_name: *const u8,
                class_name_len: u32,
                pointers: *const *const c_void,
                count: u32,
            ) -> bool {
                unsafe {
                    $crate::boundary::set_native_function_pointers(ctx, class_name, class_name_len, pointers, count)
                }
            }
        }
    };
}
