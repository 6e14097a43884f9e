//! Filesystem abstraction
//!
//! The capability set, its OS-backed implementation and glob expansion.

pub mod errors;
mod glob;
pub mod os;
pub mod system;

#[cfg(test)]
pub mod fake;

pub use errors::{FsError, FsResult};
pub use os::OsFileSystem;
pub use system::{ConvergeOpts, FileSystem, ReadOpts, StatOpts, WalkControl, WalkFn};
