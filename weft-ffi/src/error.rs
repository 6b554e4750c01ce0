/// Status codes shared between the native host and weft.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WeftErrorCode {
    Ok = 0,
    NullArgument = 1,
    IndexOutOfRange = 2,
    ClassNotFound = 3,
    InvalidOperation = 4,
    InternalError = 5,
    BufferTooSmall = 6,
}
