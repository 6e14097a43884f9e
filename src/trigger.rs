//! Cache invalidation triggers
//!
//! `Reloader` drops the caches and pre-warms the configured glob patterns.
//! The daemon runs it on SIGHUP, on an optional timer, and on the IPC
//! `dropCache` command.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::cache::CachingFileSystem;
use crate::fs::FileSystem;

/// Drops and re-warms a `CachingFileSystem`
pub struct Reloader<F> {
    fs: Arc<CachingFileSystem<F>>,
    /// Patterns expanded after every drop
    watch_globs: Vec<String>,
}

impl<F: FileSystem + 'static> Reloader<F> {
    pub fn new(fs: Arc<CachingFileSystem<F>>, watch_globs: Vec<String>) -> Self {
        Self { fs, watch_globs }
    }

    pub fn fs(&self) -> &Arc<CachingFileSystem<F>> {
        &self.fs
    }

    /// Expand every watched pattern through the cache
    pub fn warm(&self) {
        for pattern in &self.watch_globs {
            match self.fs.glob(pattern) {
                Ok(matches) => {
                    debug!(pattern = %pattern, matches = matches.len(), "Warmed glob")
                }
                Err(e) => warn!(pattern = %pattern, error = %e, "Failed to warm glob"),
            }
        }
    }

    /// Drop both caches, then re-warm
    pub fn reload(&self, reason: &str) {
        info!(reason = reason, "Dropping caches");
        self.fs.drop_cache();
        self.warm();
        self.fs.log_metrics();
    }

    /// `warm` on the blocking pool
    pub async fn warm_async(self: &Arc<Self>) {
        let reloader = Arc::clone(self);
        if let Err(e) = tokio::task::spawn_blocking(move || reloader.warm()).await {
            error!(error = %e, "Warm task panicked");
        }
    }

    /// `reload` on the blocking pool; cache locks may be held by slow reads
    pub async fn reload_async(self: &Arc<Self>, reason: &'static str) {
        let reloader = Arc::clone(self);
        if let Err(e) = tokio::task::spawn_blocking(move || reloader.reload(reason)).await {
            error!(error = %e, "Reload task panicked");
        }
    }
}

/// Reload on every SIGHUP
pub fn spawn_signal_trigger<F: FileSystem + 'static>(
    reloader: Arc<Reloader<F>>,
) -> Result<JoinHandle<()>> {
    let mut hangups = signal(SignalKind::hangup()).context("Failed to install SIGHUP handler")?;

    Ok(tokio::spawn(async move {
        while hangups.recv().await.is_some() {
            reloader.reload_async("SIGHUP").await;
        }
    }))
}

/// Reload every `period`
pub fn spawn_interval_trigger<F: FileSystem + 'static>(
    reloader: Arc<Reloader<F>>,
    period: Duration,
) -> JoinHandle<()> {
    info!(period_secs = period.as_secs(), "Scheduling periodic cache drops");

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // First tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            reloader.reload_async("timer").await;
        }
    })
}
