//! In-memory caching layer
//!
//! `CachingFileSystem` memoizes file reads and glob expansion on top of any
//! `FileSystem`, backed by two independent `CacheStore`s.

pub mod caching_fs;
pub mod store;

pub use caching_fs::{CacheStats, CachingFileSystem};
pub use store::{CacheStore, StoreStats};

/// Component tag attached to every cache event
pub const COMPONENT: &str = "CachingFileSystem";
