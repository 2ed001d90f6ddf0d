//! Temporary-directory allocation used by the legacy adapter.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::TempDir;

use crate::util::lock;

/// Creates, reuses and removes scratch directories by logical name.
///
/// Names are keys, not paths. The legacy adapter only hands out names made
/// of ASCII alphanumerics, `-`, `_` and `/`; other callers may pass anything,
/// so implementations must map names to safe directory names themselves.
pub trait TempDirAllocator: Send + Sync {
    /// Return the directory registered under `name`, creating it on first use.
    fn make_or_reuse(&self, name: &str) -> io::Result<PathBuf>;

    /// Delete the directory registered under `name`. Unknown names are a no-op.
    fn remove(&self, name: &str) -> io::Result<()>;

    /// Recursively delete `path` and recreate it empty.
    fn clear(&self, path: &Path) -> io::Result<()> {
        match std::fs::remove_dir_all(path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        std::fs::create_dir_all(path)
    }
}

/// [`TempDirAllocator`] backed by `tempfile`, rooted under one directory.
pub struct TempDirs {
    root: PathBuf,
    dirs: Mutex<HashMap<String, TempDir>>,
}

impl TempDirs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            dirs: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        lock(&self.dirs).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TempDirs {
    fn default() -> Self {
        Self::new(std::env::temp_dir().join("treeforge"))
    }
}

impl TempDirAllocator for TempDirs {
    fn make_or_reuse(&self, name: &str) -> io::Result<PathBuf> {
        let mut dirs = lock(&self.dirs);
        if let Some(dir) = dirs.get(name) {
            return Ok(dir.path().to_path_buf());
        }
        std::fs::create_dir_all(&self.root)?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("{}-", sanitize(name)))
            .tempdir_in(&self.root)?;
        let path = dir.path().to_path_buf();
        tracing::trace!(name, path = %path.display(), "allocated temp dir");
        dirs.insert(name.to_string(), dir);
        Ok(path)
    }

    fn remove(&self, name: &str) -> io::Result<()> {
        let dir = lock(&self.dirs).remove(name);
        match dir {
            Some(dir) => dir.close(),
            None => Ok(()),
        }
    }
}

pub(crate) fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
