// Prelude: one-import access to what script authors use.
//
// Usage: `use weft::prelude::*;`

pub use weft_runtime::{
    ClassRef, ComponentHooks, ContextServices, LogLevel, Logger, NativeArray, NativeHandle,
    ObjectWrapper, ScriptBase, ScriptComponent, ScriptObject, ScriptResult, SubclassOf, UObject,
    WeftError, WeftResult,
};
pub use weft_runtime::{declare_wrapper, wlog};

pub use weft_ffi::{ArrayPtr, InstanceId, ScriptName, UClassPtr, UObjectPtr};

pub use weft_macros::{script_component, script_object};
