// weft-ffi: #[repr(C)] types, handle types, function-pointer tables and
// lifecycle proxy structs. Zero external dependencies. This crate defines the
// complete contract between the native host and the script side.

pub mod handles;
pub mod error;
pub mod tables;
pub mod proxies;

pub use handles::*;
pub use error::*;
pub use tables::*;
pub use proxies::*;
