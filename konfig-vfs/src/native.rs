//! Native file system implementation

use crate::error::{VfsError, VfsResult};
use crate::VirtualFileSystem;
use std::path::{Path, PathBuf};

/// A native OS file system implementation.
///
/// Wraps `std::fs`. With a base directory, relative paths are resolved
/// against it; absolute paths are used as-is.
///
/// # Example
/// ```
/// use konfig_vfs::{NativeFileSystem, VirtualFileSystem};
/// use std::path::Path;
///
/// let fs = NativeFileSystem::new();
/// assert!(!fs.exists(Path::new("/definitely/not/here.k")));
/// ```
#[derive(Debug, Clone, Default)]
pub struct NativeFileSystem {
    base: Option<PathBuf>,
}

impl NativeFileSystem {
    pub fn new() -> Self {
        Self { base: None }
    }

    /// Create a native file system rooted at `base`.
    pub fn with_base(base: impl Into<PathBuf>) -> Self {
        Self {
            base: Some(base.into()),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.base {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl VirtualFileSystem for NativeFileSystem {
    fn read_file(&self, path: &Path) -> VfsResult<Vec<u8>> {
        let full = self.resolve(path);
        std::fs::read(&full).map_err(|e| VfsError::from_io(e, path))
    }

    fn write_file(&self, path: &Path, content: &[u8]) -> VfsResult<()> {
        let full = self.resolve(path);
        std::fs::write(&full, content).map_err(|e| VfsError::from_io(e, path))
    }

    fn exists(&self, path: &Path) -> bool {
        self.resolve(path).exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        self.resolve(path).is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.resolve(path).is_dir()
    }

    fn read_dir(&self, path: &Path) -> VfsResult<Vec<PathBuf>> {
        let full = self.resolve(path);
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(&full).map_err(|e| VfsError::from_io(e, path))? {
            entries.push(path.join(entry?.file_name()));
        }
        entries.sort();
        Ok(entries)
    }
}
