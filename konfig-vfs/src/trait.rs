//! VirtualFileSystem trait definition

use crate::error::VfsResult;
use std::path::{Path, PathBuf};

/// Virtual File System trait
///
/// Provides a unified interface for file operations, decoupling the module
/// resolver from specific file system implementations.
pub trait VirtualFileSystem: Send + Sync {
    /// Read file contents
    fn read_file(&self, path: &Path) -> VfsResult<Vec<u8>>;

    /// Read a file as UTF-8 text
    fn read_to_string(&self, path: &Path) -> VfsResult<String> {
        let bytes = self.read_file(path)?;
        String::from_utf8(bytes).map_err(|e| crate::VfsError::InvalidPath {
            path: path.to_string_lossy().to_string(),
            reason: format!("not valid UTF-8: {e}"),
        })
    }

    /// Write file contents
    ///
    /// Creates the file if it doesn't exist, truncates it if it does.
    fn write_file(&self, path: &Path, content: &[u8]) -> VfsResult<()>;

    /// Check if path exists
    fn exists(&self, path: &Path) -> bool;

    /// Check if path exists and is a file
    fn is_file(&self, path: &Path) -> bool;

    /// Check if path exists and is a directory
    fn is_dir(&self, path: &Path) -> bool;

    /// List the direct entries of a directory, sorted by path
    fn read_dir(&self, path: &Path) -> VfsResult<Vec<PathBuf>>;
}
