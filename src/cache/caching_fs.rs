//! Caching filesystem decorator
//!
//! Wraps any `FileSystem` and memoizes whole-file reads and non-recursive
//! glob expansion in memory until `drop_cache` is called. Every other
//! operation is forwarded to the wrapped filesystem untouched.
//!
//! The two caches have independent locks, so reads never wait on globs and
//! vice versa. Within one cache every lookup (hit or miss) is serialized,
//! including the backend call on a miss.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::store::{CacheStore, StoreStats};
use super::COMPONENT;
use crate::fs::system::forward_file_system;
use crate::fs::{FileSystem, FsResult};

/// Counters for both caches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub read: StoreStats,
    pub glob: StoreStats,
    pub invalidations: u64,
}

/// Read-through caching decorator over a `FileSystem`
pub struct CachingFileSystem<F> {
    inner: F,
    /// File content keyed by the path exactly as the caller passed it
    read_cache: CacheStore<OsString, Vec<u8>>,
    /// Glob matches keyed by pattern, in the order the backend returned them
    glob_cache: CacheStore<String, Vec<PathBuf>>,
    invalidations: AtomicU64,
}

impl<F: FileSystem> CachingFileSystem<F> {
    /// Wrap `inner` with two empty caches
    pub fn new(inner: F) -> Self {
        Self {
            inner,
            read_cache: CacheStore::new("read"),
            glob_cache: CacheStore::new("glob"),
            invalidations: AtomicU64::new(0),
        }
    }

    /// The wrapped filesystem
    pub fn inner(&self) -> &F {
        &self.inner
    }

    /// Forget everything cached so far.
    ///
    /// The read cache is emptied first, then the glob cache. Each swap is
    /// atomic for its own cache, but a concurrent caller may see one cache
    /// already empty while the other still has entries.
    pub fn drop_cache(&self) {
        info!(component = COMPONENT, "Reloading data");

        self.read_cache.clear();
        self.glob_cache.clear();

        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            read: self.read_cache.stats(),
            glob: self.glob_cache.stats(),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }

    /// Log current cache metrics
    pub fn log_metrics(&self) {
        let stats = self.stats();

        debug!(
            component = COMPONENT,
            read_hits = stats.read.hits,
            read_misses = stats.read.misses,
            read_hit_rate = format!("{:.1}%", stats.read.hit_rate()),
            read_entries = stats.read.entries,
            glob_hits = stats.glob.hits,
            glob_misses = stats.glob.misses,
            glob_hit_rate = format!("{:.1}%", stats.glob.hit_rate()),
            glob_entries = stats.glob.entries,
            invalidations = stats.invalidations,
            "Cache metrics"
        );
    }
}

impl<F: FileSystem> FileSystem for CachingFileSystem<F> {
    forward_file_system!(Self::inner);

    fn read_file(&self, path: &Path) -> FsResult<Vec<u8>> {
        self.read_cache
            .get_or_fetch(path.as_os_str(), &path.display(), || self.inner.read_file(path))
    }

    fn glob(&self, pattern: &str) -> FsResult<Vec<PathBuf>> {
        self.glob_cache
            .get_or_fetch(pattern, &pattern, || self.inner.glob(pattern))
    }
}
