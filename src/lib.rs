//! cachefs - read-through caching filesystem layer
//!
//! Wraps a `FileSystem` so that whole-file reads and glob expansion are
//! served from memory until the caches are explicitly dropped.

pub mod cache;
pub mod config;
pub mod fs;
pub mod ipc;
pub mod stemcell;
pub mod trigger;

pub use cache::{CacheStats, CachingFileSystem};
pub use config::Config;
pub use fs::{FileSystem, FsError, FsResult, OsFileSystem};
