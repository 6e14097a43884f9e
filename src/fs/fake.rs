//! In-memory fake filesystem for tests
//!
//! Holds files and glob results in maps, counts calls to the operations the
//! caching layer intercepts, and records every other call by name.

use std::collections::{HashMap, HashSet};
use std::fs::{File, Metadata, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use super::errors::{FsError, FsResult};
use super::system::{ConvergeOpts, FileSystem, ReadOpts, StatOpts, WalkControl, WalkFn};

#[derive(Default)]
pub struct FakeFileSystem {
    files: Mutex<HashMap<PathBuf, Vec<u8>>>,
    globs: Mutex<HashMap<String, Vec<PathBuf>>>,
    read_errors: Mutex<HashSet<PathBuf>>,
    glob_errors: Mutex<HashSet<String>>,
    read_calls: Mutex<HashMap<PathBuf, usize>>,
    glob_calls: Mutex<HashMap<String, usize>>,
    recursive_glob_calls: Mutex<HashMap<String, usize>>,
    calls: Mutex<Vec<String>>,
    read_delay: Mutex<Duration>,
    read_gate: Mutex<Option<Receiver<()>>>,
}

impl FakeFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_file(&self, path: &str, content: &[u8]) {
        self.files
            .lock()
            .unwrap()
            .insert(PathBuf::from(path), content.to_vec());
    }

    pub fn set_glob(&self, pattern: &str, matches: &[&str]) {
        self.globs.lock().unwrap().insert(
            pattern.to_string(),
            matches.iter().map(PathBuf::from).collect(),
        );
    }

    pub fn fail_read(&self, path: &str, fail: bool) {
        let mut errors = self.read_errors.lock().unwrap();
        if fail {
            errors.insert(PathBuf::from(path));
        } else {
            errors.remove(Path::new(path));
        }
    }

    pub fn fail_glob(&self, pattern: &str, fail: bool) {
        let mut errors = self.glob_errors.lock().unwrap();
        if fail {
            errors.insert(pattern.to_string());
        } else {
            errors.remove(pattern);
        }
    }

    /// Make every `read_file` sleep for `delay`
    pub fn set_read_delay(&self, delay: Duration) {
        *self.read_delay.lock().unwrap() = delay;
    }

    /// Make the next `read_file` block until `gate` receives a message
    pub fn set_read_gate(&self, gate: Receiver<()>) {
        *self.read_gate.lock().unwrap() = Some(gate);
    }

    pub fn read_count(&self, path: &str) -> usize {
        self.read_calls
            .lock()
            .unwrap()
            .get(Path::new(path))
            .copied()
            .unwrap_or(0)
    }

    pub fn glob_count(&self, pattern: &str) -> usize {
        self.glob_calls.lock().unwrap().get(pattern).copied().unwrap_or(0)
    }

    pub fn recursive_glob_count(&self, pattern: &str) -> usize {
        self.recursive_glob_calls
            .lock()
            .unwrap()
            .get(pattern)
            .copied()
            .unwrap_or(0)
    }

    /// Names of the non-intercepted operations called so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    fn unsupported(op: &'static str, path: &Path) -> FsError {
        FsError::io(op, path, io::Error::from(io::ErrorKind::Unsupported))
    }

    fn lookup(&self, path: &Path) -> FsResult<Vec<u8>> {
        if self.read_errors.lock().unwrap().contains(path) {
            return Err(FsError::io(
                "Reading file",
                path,
                io::Error::new(io::ErrorKind::PermissionDenied, "fake failure"),
            ));
        }
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| FsError::io("Reading file", path, io::Error::from(io::ErrorKind::NotFound)))
    }

    fn expand(&self, pattern: &str) -> FsResult<Vec<PathBuf>> {
        if self.glob_errors.lock().unwrap().contains(pattern) {
            return Err(FsError::InvalidPattern {
                pattern: pattern.to_string(),
                message: "fake failure".to_string(),
            });
        }
        Ok(self.globs.lock().unwrap().get(pattern).cloned().unwrap_or_default())
    }
}

fn bump<K: std::hash::Hash + Eq>(counts: &Mutex<HashMap<K, usize>>, key: K) {
    *counts.lock().unwrap().entry(key).or_insert(0) += 1;
}

impl FileSystem for FakeFileSystem {
    fn home_dir(&self, username: &str) -> FsResult<PathBuf> {
        self.record(format!("home_dir {username}"));
        Ok(PathBuf::from("/home").join(username))
    }

    fn change_temp_root(&self, path: &Path) -> FsResult<()> {
        self.record(format!("change_temp_root {}", path.display()));
        Ok(())
    }

    fn mkdir_all(&self, path: &Path, mode: u32) -> FsResult<()> {
        self.record(format!("mkdir_all {} {mode:o}", path.display()));
        Ok(())
    }

    fn remove_all(&self, path: &Path) -> FsResult<()> {
        self.record(format!("remove_all {}", path.display()));
        self.files.lock().unwrap().remove(path);
        Ok(())
    }

    fn chown(&self, path: &Path, username: &str) -> FsResult<()> {
        self.record(format!("chown {} {username}", path.display()));
        Err(FsError::UnknownUser(username.to_string()))
    }

    fn chmod(&self, path: &Path, mode: u32) -> FsResult<()> {
        self.record(format!("chmod {} {mode:o}", path.display()));
        Ok(())
    }

    fn open_file(&self, path: &Path, _options: &OpenOptions) -> FsResult<File> {
        self.record(format!("open_file {}", path.display()));
        Err(Self::unsupported("Opening file", path))
    }

    fn write_file_string(&self, path: &Path, content: &str) -> FsResult<()> {
        self.record(format!("write_file_string {}", path.display()));
        self.set_file(&path.to_string_lossy(), content.as_bytes());
        Ok(())
    }

    fn write_file(&self, path: &Path, content: &[u8]) -> FsResult<()> {
        self.record(format!("write_file {}", path.display()));
        self.set_file(&path.to_string_lossy(), content);
        Ok(())
    }

    fn write_file_quietly(&self, path: &Path, content: &[u8]) -> FsResult<()> {
        self.record(format!("write_file_quietly {}", path.display()));
        self.set_file(&path.to_string_lossy(), content);
        Ok(())
    }

    fn converge_file_contents(
        &self,
        path: &Path,
        content: &[u8],
        opts: ConvergeOpts,
    ) -> FsResult<bool> {
        self.record(format!("converge_file_contents {}", path.display()));
        let current = self.files.lock().unwrap().get(path).cloned();
        if current.as_deref() == Some(content) {
            return Ok(false);
        }
        if !opts.dry_run {
            self.set_file(&path.to_string_lossy(), content);
        }
        Ok(true)
    }

    fn expand_path(&self, path: &str) -> FsResult<PathBuf> {
        self.record(format!("expand_path {path}"));
        Ok(PathBuf::from("/expanded").join(path))
    }

    fn read_file(&self, path: &Path) -> FsResult<Vec<u8>> {
        bump(&self.read_calls, path.to_path_buf());

        let gate = self.read_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.recv();
        }
        let delay = *self.read_delay.lock().unwrap();
        if !delay.is_zero() {
            thread::sleep(delay);
        }

        self.lookup(path)
    }

    fn read_file_with_opts(&self, path: &Path, _opts: ReadOpts) -> FsResult<Vec<u8>> {
        self.record(format!("read_file_with_opts {}", path.display()));
        self.lookup(path)
    }

    fn file_exists(&self, path: &Path) -> bool {
        self.record(format!("file_exists {}", path.display()));
        self.files.lock().unwrap().contains_key(path)
    }

    fn rename(&self, old_path: &Path, new_path: &Path) -> FsResult<()> {
        self.record(format!("rename {} {}", old_path.display(), new_path.display()));
        let mut files = self.files.lock().unwrap();
        match files.remove(old_path) {
            Some(content) => {
                files.insert(new_path.to_path_buf(), content);
                Ok(())
            }
            None => Err(FsError::io(
                "Renaming",
                old_path,
                io::Error::from(io::ErrorKind::NotFound),
            )),
        }
    }

    fn symlink(&self, target: &Path, link: &Path) -> FsResult<()> {
        self.record(format!("symlink {} {}", target.display(), link.display()));
        Ok(())
    }

    fn read_and_follow_link(&self, path: &Path) -> FsResult<PathBuf> {
        self.record(format!("read_and_follow_link {}", path.display()));
        Ok(path.join("followed"))
    }

    fn readlink(&self, path: &Path) -> FsResult<PathBuf> {
        self.record(format!("readlink {}", path.display()));
        Ok(path.join("target"))
    }

    fn copy_file(&self, src: &Path, dst: &Path) -> FsResult<()> {
        self.record(format!("copy_file {} {}", src.display(), dst.display()));
        let content = self.lookup(src)?;
        self.files.lock().unwrap().insert(dst.to_path_buf(), content);
        Ok(())
    }

    fn copy_dir(&self, src: &Path, dst: &Path) -> FsResult<()> {
        self.record(format!("copy_dir {} {}", src.display(), dst.display()));
        Ok(())
    }

    fn temp_file(&self, prefix: &str) -> FsResult<(File, PathBuf)> {
        self.record(format!("temp_file {prefix}"));
        Err(Self::unsupported("Creating temp file", Path::new(prefix)))
    }

    fn temp_dir(&self, prefix: &str) -> FsResult<PathBuf> {
        self.record(format!("temp_dir {prefix}"));
        Ok(PathBuf::from("/tmp").join(prefix))
    }

    fn lstat(&self, path: &Path) -> FsResult<Metadata> {
        self.record(format!("lstat {}", path.display()));
        Err(Self::unsupported("Stat'ing", path))
    }

    fn stat(&self, path: &Path) -> FsResult<Metadata> {
        self.record(format!("stat {}", path.display()));
        Err(Self::unsupported("Stat'ing", path))
    }

    fn stat_with_opts(&self, path: &Path, _opts: StatOpts) -> FsResult<Metadata> {
        self.record(format!("stat_with_opts {}", path.display()));
        Err(Self::unsupported("Stat'ing", path))
    }

    fn glob(&self, pattern: &str) -> FsResult<Vec<PathBuf>> {
        bump(&self.glob_calls, pattern.to_string());
        self.expand(pattern)
    }

    fn recursive_glob(&self, pattern: &str) -> FsResult<Vec<PathBuf>> {
        bump(&self.recursive_glob_calls, pattern.to_string());
        self.expand(pattern)
    }

    fn walk(&self, root: &Path, walk_fn: &mut WalkFn<'_>) -> FsResult<()> {
        self.record(format!("walk {}", root.display()));
        let mut paths: Vec<PathBuf> = self
            .files
            .lock()
            .unwrap()
            .keys()
            .filter(|p| p.starts_with(root))
            .cloned()
            .collect();
        paths.sort();

        let err = Self::unsupported("Stat'ing", root);
        for path in paths {
            if walk_fn(&path, Err(&err))? == WalkControl::SkipDir {
                break;
            }
        }
        Ok(())
    }
}
