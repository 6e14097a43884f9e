//! OS-backed filesystem
//!
//! `FileSystem` implementation on top of `std::fs`, with tempfile for
//! temporary files and nix for user lookups.

use std::fs::{self, DirBuilder, File, Metadata, OpenOptions, Permissions};
use std::io::{self, Write};
use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use nix::unistd::{chown, User};
use tracing::debug;
use walkdir::WalkDir;

use super::errors::{FsError, FsResult};
use super::glob;
use super::system::{ConvergeOpts, FileSystem, ReadOpts, StatOpts, WalkControl, WalkFn};

/// Mode used for parent directories created by writes
const DEFAULT_DIR_MODE: u32 = 0o755;

/// Filesystem that talks to the real OS
pub struct OsFileSystem {
    /// Root for temp files and directories (None = OS default)
    temp_root: RwLock<Option<PathBuf>>,
}

impl OsFileSystem {
    pub fn new() -> Self {
        Self {
            temp_root: RwLock::new(None),
        }
    }

    fn temp_root(&self) -> PathBuf {
        self.temp_root
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }

    fn lookup_user(username: &str) -> FsResult<User> {
        match User::from_name(username) {
            Ok(Some(user)) => Ok(user),
            Ok(None) => Err(FsError::UnknownUser(username.to_string())),
            Err(errno) => Err(FsError::io(
                "Looking up user",
                Path::new(username),
                io::Error::from(errno),
            )),
        }
    }

    fn write_bytes(&self, path: &Path, content: &[u8], quiet: bool) -> FsResult<()> {
        if !quiet {
            debug!(path = %path.display(), size = content.len(), "Writing file");
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            self.mkdir_all(parent, DEFAULT_DIR_MODE)?;
        }

        let mut file = File::create(path).map_err(|e| FsError::io("Creating file", path, e))?;
        file.write_all(content)
            .map_err(|e| FsError::io("Writing file", path, e))
    }
}

impl Default for OsFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for OsFileSystem {
    fn home_dir(&self, username: &str) -> FsResult<PathBuf> {
        if username.is_empty() {
            return dirs::home_dir().ok_or_else(|| FsError::UnknownUser("current user".to_string()));
        }
        Ok(Self::lookup_user(username)?.dir)
    }

    fn change_temp_root(&self, path: &Path) -> FsResult<()> {
        self.mkdir_all(path, DEFAULT_DIR_MODE)?;
        *self.temp_root.write().unwrap_or_else(PoisonError::into_inner) = Some(path.to_path_buf());
        debug!(path = %path.display(), "Changed temp root");
        Ok(())
    }

    fn mkdir_all(&self, path: &Path, mode: u32) -> FsResult<()> {
        DirBuilder::new()
            .recursive(true)
            .mode(mode)
            .create(path)
            .map_err(|e| FsError::io("Creating directory", path, e))
    }

    fn remove_all(&self, path: &Path) -> FsResult<()> {
        let result = match fs::symlink_metadata(path) {
            Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
            Ok(_) => fs::remove_file(path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => Err(e),
        };
        result.map_err(|e| FsError::io("Removing", path, e))
    }

    fn chown(&self, path: &Path, username: &str) -> FsResult<()> {
        let user = Self::lookup_user(username)?;
        chown(path, Some(user.uid), Some(user.gid))
            .map_err(|errno| FsError::io("Changing owner", path, io::Error::from(errno)))
    }

    fn chmod(&self, path: &Path, mode: u32) -> FsResult<()> {
        fs::set_permissions(path, Permissions::from_mode(mode))
            .map_err(|e| FsError::io("Changing permissions", path, e))
    }

    fn open_file(&self, path: &Path, options: &OpenOptions) -> FsResult<File> {
        options
            .open(path)
            .map_err(|e| FsError::io("Opening file", path, e))
    }

    fn write_file_string(&self, path: &Path, content: &str) -> FsResult<()> {
        self.write_bytes(path, content.as_bytes(), false)
    }

    fn write_file(&self, path: &Path, content: &[u8]) -> FsResult<()> {
        self.write_bytes(path, content, false)
    }

    fn write_file_quietly(&self, path: &Path, content: &[u8]) -> FsResult<()> {
        self.write_bytes(path, content, true)
    }

    fn converge_file_contents(
        &self,
        path: &Path,
        content: &[u8],
        opts: ConvergeOpts,
    ) -> FsResult<bool> {
        match fs::read(path) {
            Ok(existing) if existing == content => return Ok(false),
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(FsError::io("Reading file", path, e)),
        }

        if !opts.dry_run {
            self.write_bytes(path, content, false)?;
        }
        Ok(true)
    }

    fn expand_path(&self, path: &str) -> FsResult<PathBuf> {
        let expanded = match path.strip_prefix('~') {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => {
                let home = self.home_dir("")?;
                home.join(rest.trim_start_matches('/'))
            }
            _ => PathBuf::from(path),
        };

        std::path::absolute(&expanded).map_err(|e| FsError::io("Expanding path", &expanded, e))
    }

    fn read_file(&self, path: &Path) -> FsResult<Vec<u8>> {
        self.read_file_with_opts(path, ReadOpts::default())
    }

    fn read_file_with_opts(&self, path: &Path, opts: ReadOpts) -> FsResult<Vec<u8>> {
        if !opts.quiet {
            debug!(path = %path.display(), "Reading file");
        }
        fs::read(path).map_err(|e| FsError::io("Reading file", path, e))
    }

    fn file_exists(&self, path: &Path) -> bool {
        fs::symlink_metadata(path).is_ok()
    }

    fn rename(&self, old_path: &Path, new_path: &Path) -> FsResult<()> {
        fs::rename(old_path, new_path).map_err(|e| FsError::io("Renaming", old_path, e))
    }

    fn symlink(&self, target: &Path, link: &Path) -> FsResult<()> {
        std::os::unix::fs::symlink(target, link)
            .map_err(|e| FsError::io("Creating symlink", link, e))
    }

    fn read_and_follow_link(&self, path: &Path) -> FsResult<PathBuf> {
        fs::canonicalize(path).map_err(|e| FsError::io("Following symlink", path, e))
    }

    fn readlink(&self, path: &Path) -> FsResult<PathBuf> {
        fs::read_link(path).map_err(|e| FsError::io("Reading symlink", path, e))
    }

    fn copy_file(&self, src: &Path, dst: &Path) -> FsResult<()> {
        fs::copy(src, dst)
            .map(|_| ())
            .map_err(|e| FsError::io("Copying file", src, e))
    }

    fn copy_dir(&self, src: &Path, dst: &Path) -> FsResult<()> {
        for entry in WalkDir::new(src).sort_by_file_name() {
            let entry = entry.map_err(|e| FsError::Walk {
                path: src.to_path_buf(),
                message: e.to_string(),
            })?;

            let rel = entry.path().strip_prefix(src).unwrap_or(entry.path());
            let target = dst.join(rel);
            let meta = entry
                .metadata()
                .map_err(|e| FsError::Walk {
                    path: entry.path().to_path_buf(),
                    message: e.to_string(),
                })?;

            if meta.is_dir() {
                self.mkdir_all(&target, meta.permissions().mode() & 0o7777)?;
            } else {
                self.copy_file(entry.path(), &target)?;
            }
        }
        Ok(())
    }

    fn temp_file(&self, prefix: &str) -> FsResult<(File, PathBuf)> {
        let root = self.temp_root();
        tempfile::Builder::new()
            .prefix(prefix)
            .tempfile_in(&root)
            .map_err(|e| FsError::io("Creating temp file", &root, e))?
            .keep()
            .map_err(|e| FsError::io("Keeping temp file", &root, e.error))
    }

    fn temp_dir(&self, prefix: &str) -> FsResult<PathBuf> {
        let root = self.temp_root();
        let dir = tempfile::Builder::new()
            .prefix(prefix)
            .tempdir_in(&root)
            .map_err(|e| FsError::io("Creating temp dir", &root, e))?;
        Ok(dir.keep())
    }

    fn lstat(&self, path: &Path) -> FsResult<Metadata> {
        fs::symlink_metadata(path).map_err(|e| FsError::io("Stat'ing", path, e))
    }

    fn stat(&self, path: &Path) -> FsResult<Metadata> {
        self.stat_with_opts(path, StatOpts::default())
    }

    fn stat_with_opts(&self, path: &Path, opts: StatOpts) -> FsResult<Metadata> {
        if !opts.quiet {
            debug!(path = %path.display(), "Stat'ing");
        }
        fs::metadata(path).map_err(|e| FsError::io("Stat'ing", path, e))
    }

    fn glob(&self, pattern: &str) -> FsResult<Vec<PathBuf>> {
        debug!(pattern = pattern, "Globbing");
        glob::expand(pattern, false)
    }

    fn recursive_glob(&self, pattern: &str) -> FsResult<Vec<PathBuf>> {
        debug!(pattern = pattern, "Recursively globbing");
        glob::expand(pattern, true)
    }

    fn walk(&self, root: &Path, walk_fn: &mut WalkFn<'_>) -> FsResult<()> {
        let mut it = WalkDir::new(root).sort_by_file_name().into_iter();

        while let Some(entry) = it.next() {
            let control = match entry {
                Ok(entry) => match entry.metadata() {
                    Ok(meta) => {
                        let control = walk_fn(entry.path(), Ok(&meta))?;
                        if control == WalkControl::SkipDir && !meta.is_dir() {
                            WalkControl::Continue
                        } else {
                            control
                        }
                    }
                    Err(e) => {
                        let err = FsError::Walk {
                            path: entry.path().to_path_buf(),
                            message: e.to_string(),
                        };
                        walk_fn(entry.path(), Err(&err))?
                    }
                },
                Err(e) => {
                    let path = e.path().unwrap_or(root).to_path_buf();
                    let err = FsError::Walk {
                        path: path.clone(),
                        message: e.to_string(),
                    };
                    walk_fn(&path, Err(&err))?;
                    WalkControl::Continue
                }
            };

            if control == WalkControl::SkipDir {
                it.skip_current_dir();
            }
        }
        Ok(())
    }
}
