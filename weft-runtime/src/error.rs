// Error types for the weft runtime.

use weft_ffi::{ContextId, InstanceId, WeftErrorCode};

/// Coarse classification used by the boundary to decide how a failure is reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unknown class, instance, context or assembly. Recoverable.
    LookupMiss,
    /// The caller broke the calling protocol (wrong requester, wrong order).
    ProtocolViolation,
    /// A script class could not be instantiated.
    ConstructionFailure,
    /// An unload ran to completion but some disposal failed.
    PartialTeardownFailure,
    /// Misuse of a runtime API from script code.
    Usage,
}

#[derive(Debug, thiserror::Error)]
pub enum WeftError {
    #[error("class not found: {0}")]
    ClassNotFound(String),
    #[error("no live instance with id {0}")]
    InstanceNotFound(InstanceId),
    #[error("no execution context with id {0}")]
    ContextNotFound(ContextId),
    #[error("assembly not found: {0}")]
    AssemblyNotFound(String),

    #[error("context {0} is not privileged to manage execution contexts")]
    NotPrivileged(ContextId),
    #[error("function tables are not bound in context {0}")]
    TablesNotBound(ContextId),
    #[error("function tables are already bound in context {0}")]
    TablesAlreadyBound(ContextId),
    #[error("the default context cannot be destroyed or host scripts")]
    DefaultContextImmutable,
    #[error("context {0} has already been unloaded")]
    AlreadyUnloaded(ContextId),

    #[error("failed to construct {class}: {reason}")]
    ConstructionFailed { class: String, reason: String },
    #[error("{0} is not a script object class")]
    NotAScriptObject(String),
    #[error("{0} is not a script component class")]
    NotAScriptComponent(String),

    #[error("unloading context {id} left {} failed disposal(s): {}", .failures.len(), .failures.join("; "))]
    UnloadFailed { id: ContextId, failures: Vec<String> },

    #[error("invalid conversion: {0}")]
    InvalidConversion(String),
    #[error("collection was modified; enumeration operation may not execute")]
    InvalidatedIterator,
    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: i32, len: i32 },
    #[error("invalid application base: {0}")]
    InvalidApplicationBase(String),
    #[error("script panicked: {0}")]
    ScriptPanicked(String),
    #[error("native call failed: {0:?}")]
    Native(WeftErrorCode),

    #[error("failed to read config {path}: {source}")]
    ConfigIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl WeftError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WeftError::ClassNotFound(_)
            | WeftError::InstanceNotFound(_)
            | WeftError::ContextNotFound(_)
            | WeftError::AssemblyNotFound(_) => ErrorKind::LookupMiss,

            WeftError::NotPrivileged(_)
            | WeftError::TablesNotBound(_)
            | WeftError::TablesAlreadyBound(_)
            | WeftError::DefaultContextImmutable
            | WeftError::AlreadyUnloaded(_) => ErrorKind::ProtocolViolation,

            WeftError::ConstructionFailed { .. }
            | WeftError::NotAScriptObject(_)
            | WeftError::NotAScriptComponent(_) => ErrorKind::ConstructionFailure,

            WeftError::UnloadFailed { .. } => ErrorKind::PartialTeardownFailure,

            WeftError::InvalidConversion(_)
            | WeftError::InvalidatedIterator
            | WeftError::IndexOutOfRange { .. }
            | WeftError::InvalidApplicationBase(_)
            | WeftError::ScriptPanicked(_)
            | WeftError::Native(_)
            | WeftError::ConfigIo { .. }
            | WeftError::ConfigParse(_) => ErrorKind::Usage,
        }
    }
}

/// Convenience alias used throughout the runtime.
pub type WeftResult<T> = Result<T, WeftError>;

/// Convert a native status code to a `WeftResult<()>`.
pub fn check_ffi(code: WeftErrorCode) -> WeftResult<()> {
    match code {
        WeftErrorCode::Ok => Ok(()),
        other => Err(WeftError::Native(other)),
    }
}
