// weft-runtime: Safe Rust API over weft-ffi.
// All unsafe FFI calls are confined to this crate. Script code and the boundary
// crate interact only with the safe types exported here.

pub mod error;
pub mod logging;
pub mod ffi_guard;
pub mod native;
pub mod handle;
pub mod wrappers;
pub mod class_registry;
pub mod containers;
pub mod services;
pub mod script;
pub mod assembly;
pub mod config;
pub mod context;
pub mod manager;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export the primary public API surface.
pub use error::{check_ffi, ErrorKind, WeftError, WeftResult};
pub use logging::{LogLevel, LogSink, LogWriter, Logger, NativeLogUtils};
pub use ffi_guard::{ffi_boundary, ffi_boundary_logged};
pub use native::{ArrayUtils, FunctionTables, NativeArrayUtils, NativeObjectUtils, ObjectUtils};
pub use handle::{NativeHandle, ReleaseHook};
pub use wrappers::{ManagedType, ObjectWrapper, UObject};
pub use class_registry::{ClassDescriptor, ClassRef, ClassRegistry, SubclassOf};
pub use containers::{ArrayElement, NativeArray};
pub use services::ContextServices;
pub use script::{ComponentHooks, ScriptBase, ScriptComponent, ScriptObject, ScriptResult};
pub use assembly::{
    AssemblyCatalog, ScriptAssembly, ScriptClassDescriptor, ScriptClassKind,
    ScriptClassRegistration, ENGINE_ASSEMBLY,
};
pub use config::HostConfig;
pub use context::{ContextState, ExecutionContext, InstanceIdGenerator, RemovedInstance};
pub use manager::ContextManager;

// Re-export FFI types that appear in the public API.
pub use weft_ffi::{
    ArrayPtr, ContextId, InstanceId, ScriptComponentProxy, ScriptName, ScriptObjectInstanceInfo,
    UClassPtr, UObjectPtr, DEFAULT_CONTEXT_ID, INVALID_CONTEXT_ID, INVALID_INSTANCE_ID,
};
