//! Filesystem capability set
//!
//! `FileSystem` is the full set of operations the rest of the daemon uses to
//! touch disk. `OsFileSystem` implements it against the real OS, and
//! `CachingFileSystem` wraps any implementation of it.

use std::fs::{File, Metadata, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::errors::{FsError, FsResult};

/// Options for `FileSystem::read_file_with_opts`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOpts {
    /// Skip debug logging for this read
    pub quiet: bool,
}

/// Options for `FileSystem::stat_with_opts`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatOpts {
    /// Skip debug logging for this stat
    pub quiet: bool,
}

/// Options for `FileSystem::converge_file_contents`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConvergeOpts {
    /// Report whether a write would happen without writing
    pub dry_run: bool,
}

/// What a walk callback wants the traversal to do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkControl {
    /// Keep going
    Continue,
    /// Do not descend into the current directory
    SkipDir,
}

/// Callback invoked for every entry visited by `FileSystem::walk`.
///
/// Receives the entry path and either its metadata or the error hit while
/// reading it. Returning `Err` aborts the walk with that error.
pub type WalkFn<'a> =
    dyn FnMut(&Path, Result<&Metadata, &FsError>) -> FsResult<WalkControl> + 'a;

/// Full filesystem capability set
pub trait FileSystem: Send + Sync {
    /// Home directory of `username` (empty string means the current user)
    fn home_dir(&self, username: &str) -> FsResult<PathBuf>;

    /// Move the root used by `temp_file` / `temp_dir`
    fn change_temp_root(&self, path: &Path) -> FsResult<()>;

    fn mkdir_all(&self, path: &Path, mode: u32) -> FsResult<()>;

    /// Remove a file or a whole directory tree. A missing path is not an error.
    fn remove_all(&self, path: &Path) -> FsResult<()>;

    fn chown(&self, path: &Path, username: &str) -> FsResult<()>;

    fn chmod(&self, path: &Path, mode: u32) -> FsResult<()>;

    fn open_file(&self, path: &Path, options: &OpenOptions) -> FsResult<File>;

    fn write_file_string(&self, path: &Path, content: &str) -> FsResult<()>;

    fn write_file(&self, path: &Path, content: &[u8]) -> FsResult<()>;

    /// Same as `write_file` but without logging
    fn write_file_quietly(&self, path: &Path, content: &[u8]) -> FsResult<()>;

    /// Write `content` only if the file does not already hold it.
    ///
    /// Returns whether the file was (or, with `dry_run`, would be) written.
    fn converge_file_contents(
        &self,
        path: &Path,
        content: &[u8],
        opts: ConvergeOpts,
    ) -> FsResult<bool>;

    /// Expand a leading `~` and make the path absolute
    fn expand_path(&self, path: &str) -> FsResult<PathBuf>;

    fn read_file(&self, path: &Path) -> FsResult<Vec<u8>>;

    /// `read_file` decoded as UTF-8
    fn read_file_string(&self, path: &Path) -> FsResult<String> {
        let bytes = self.read_file(path)?;
        String::from_utf8(bytes).map_err(|_| FsError::InvalidUtf8 {
            path: path.to_path_buf(),
        })
    }

    fn read_file_with_opts(&self, path: &Path, opts: ReadOpts) -> FsResult<Vec<u8>>;

    fn file_exists(&self, path: &Path) -> bool;

    fn rename(&self, old_path: &Path, new_path: &Path) -> FsResult<()>;

    /// Create `link` pointing at `target`
    fn symlink(&self, target: &Path, link: &Path) -> FsResult<()>;

    /// Resolve every symlink in `path`
    fn read_and_follow_link(&self, path: &Path) -> FsResult<PathBuf>;

    /// Raw target of the symlink at `path`
    fn readlink(&self, path: &Path) -> FsResult<PathBuf>;

    fn copy_file(&self, src: &Path, dst: &Path) -> FsResult<()>;

    fn copy_dir(&self, src: &Path, dst: &Path) -> FsResult<()>;

    /// Create a file under the temp root. The file is kept on disk.
    fn temp_file(&self, prefix: &str) -> FsResult<(File, PathBuf)>;

    /// Create a directory under the temp root. The directory is kept on disk.
    fn temp_dir(&self, prefix: &str) -> FsResult<PathBuf>;

    fn lstat(&self, path: &Path) -> FsResult<Metadata>;

    fn stat(&self, path: &Path) -> FsResult<Metadata>;

    fn stat_with_opts(&self, path: &Path, opts: StatOpts) -> FsResult<Metadata>;

    /// Expand a pattern whose wildcards never cross a path separator
    fn glob(&self, pattern: &str) -> FsResult<Vec<PathBuf>>;

    /// Expand a pattern where `**` matches any number of directories
    fn recursive_glob(&self, pattern: &str) -> FsResult<Vec<PathBuf>>;

    fn walk(&self, root: &Path, walk_fn: &mut WalkFn<'_>) -> FsResult<()>;
}

/// Generate every `FileSystem` method except `read_file`, `read_file_string`
/// and `glob` as a plain call on the filesystem returned by `$via(self)`.
macro_rules! forward_file_system {
    ($via:path) => {
        fn home_dir(&self, username: &str) -> $crate::fs::FsResult<::std::path::PathBuf> {
            $via(self).home_dir(username)
        }

        fn change_temp_root(&self, path: &::std::path::Path) -> $crate::fs::FsResult<()> {
            $via(self).change_temp_root(path)
        }

        fn mkdir_all(&self, path: &::std::path::Path, mode: u32) -> $crate::fs::FsResult<()> {
            $via(self).mkdir_all(path, mode)
        }

        fn remove_all(&self, path: &::std::path::Path) -> $crate::fs::FsResult<()> {
            $via(self).remove_all(path)
        }

        fn chown(&self, path: &::std::path::Path, username: &str) -> $crate::fs::FsResult<()> {
            $via(self).chown(path, username)
        }

        fn chmod(&self, path: &::std::path::Path, mode: u32) -> $crate::fs::FsResult<()> {
            $via(self).chmod(path, mode)
        }

        fn open_file(
            &self,
            path: &::std::path::Path,
            options: &::std::fs::OpenOptions,
        ) -> $crate::fs::FsResult<::std::fs::File> {
            $via(self).open_file(path, options)
        }

        fn write_file_string(
            &self,
            path: &::std::path::Path,
            content: &str,
        ) -> $crate::fs::FsResult<()> {
            $via(self).write_file_string(path, content)
        }

        fn write_file(&self, path: &::std::path::Path, content: &[u8]) -> $crate::fs::FsResult<()> {
            $via(self).write_file(path, content)
        }

        fn write_file_quietly(
            &self,
            path: &::std::path::Path,
            content: &[u8],
        ) -> $crate::fs::FsResult<()> {
            $via(self).write_file_quietly(path, content)
        }

        fn converge_file_contents(
            &self,
            path: &::std::path::Path,
            content: &[u8],
            opts: $crate::fs::ConvergeOpts,
        ) -> $crate::fs::FsResult<bool> {
            $via(self).converge_file_contents(path, content, opts)
        }

        fn expand_path(&self, path: &str) -> $crate::fs::FsResult<::std::path::PathBuf> {
            $via(self).expand_path(path)
        }

        fn read_file_with_opts(
            &self,
            path: &::std::path::Path,
            opts: $crate::fs::ReadOpts,
        ) -> $crate::fs::FsResult<Vec<u8>> {
            $via(self).read_file_with_opts(path, opts)
        }

        fn file_exists(&self, path: &::std::path::Path) -> bool {
            $via(self).file_exists(path)
        }

        fn rename(
            &self,
            old_path: &::std::path::Path,
            new_path: &::std::path::Path,
        ) -> $crate::fs::FsResult<()> {
            $via(self).rename(old_path, new_path)
        }

        fn symlink(
            &self,
            target: &::std::path::Path,
            link: &::std::path::Path,
        ) -> $crate::fs::FsResult<()> {
            $via(self).symlink(target, link)
        }

        fn read_and_follow_link(
            &self,
            path: &::std::path::Path,
        ) -> $crate::fs::FsResult<::std::path::PathBuf> {
            $via(self).read_and_follow_link(path)
        }

        fn readlink(&self, path: &::std::path::Path) -> $crate::fs::FsResult<::std::path::PathBuf> {
            $via(self).readlink(path)
        }

        fn copy_file(
            &self,
            src: &::std::path::Path,
            dst: &::std::path::Path,
        ) -> $crate::fs::FsResult<()> {
            $via(self).copy_file(src, dst)
        }

        fn copy_dir(
            &self,
            src: &::std::path::Path,
            dst: &::std::path::Path,
        ) -> $crate::fs::FsResult<()> {
            $via(self).copy_dir(src, dst)
        }

        fn temp_file(
            &self,
            prefix: &str,
        ) -> $crate::fs::FsResult<(::std::fs::File, ::std::path::PathBuf)> {
            $via(self).temp_file(prefix)
        }

        fn temp_dir(&self, prefix: &str) -> $crate::fs::FsResult<::std::path::PathBuf> {
            $via(self).temp_dir(prefix)
        }

        fn lstat(&self, path: &::std::path::Path) -> $crate::fs::FsResult<::std::fs::Metadata> {
            $via(self).lstat(path)
        }

        fn stat(&self, path: &::std::path::Path) -> $crate::fs::FsResult<::std::fs::Metadata> {
            $via(self).stat(path)
        }

        fn stat_with_opts(
            &self,
            path: &::std::path::Path,
            opts: $crate::fs::StatOpts,
        ) -> $crate::fs::FsResult<::std::fs::Metadata> {
            $via(self).stat_with_opts(path, opts)
        }

        fn recursive_glob(
            &self,
            pattern: &str,
        ) -> $crate::fs::FsResult<Vec<::std::path::PathBuf>> {
            $via(self).recursive_glob(pattern)
        }

        fn walk(
            &self,
            root: &::std::path::Path,
            walk_fn: &mut $crate::fs::WalkFn<'_>,
        ) -> $crate::fs::FsResult<()> {
            $via(self).walk(root, walk_fn)
        }
    };
}

pub(crate) use forward_file_system;

fn shared<T: ?Sized>(fs: &Arc<T>) -> &T {
    fs
}

impl<T: FileSystem + ?Sized> FileSystem for Arc<T> {
    forward_file_system!(shared);

    fn read_file(&self, path: &Path) -> FsResult<Vec<u8>> {
        shared(self).read_file(path)
    }

    fn read_file_string(&self, path: &Path) -> FsResult<String> {
        shared(self).read_file_string(path)
    }

    fn glob(&self, pattern: &str) -> FsResult<Vec<PathBuf>> {
        shared(self).glob(pattern)
    }
}
