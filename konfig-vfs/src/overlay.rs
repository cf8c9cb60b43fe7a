//! Overlay VFS: an in-memory upper layer shadowing a lower file system

use crate::{MemoryFileSystem, VfsResult, VirtualFileSystem};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Reads consult the upper layer first, then fall through to the lower one.
/// Writes always land in the upper layer, so the lower one is never modified.
pub struct OverlayFileSystem {
    upper: MemoryFileSystem,
    lower: Arc<dyn VirtualFileSystem>,
}

impl OverlayFileSystem {
    pub fn new(lower: Arc<dyn VirtualFileSystem>) -> Self {
        Self {
            upper: MemoryFileSystem::new(),
            lower,
        }
    }

    /// Shadow `path` with `content`
    pub fn with_file(self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) -> Self {
        // MemoryFileSystem::write_file is infallible
        let _ = self.upper.write_file(path.as_ref(), &content.into());
        self
    }
}

impl VirtualFileSystem for OverlayFileSystem {
    fn read_file(&self, path: &Path) -> VfsResult<Vec<u8>> {
        if self.upper.is_file(path) {
            return self.upper.read_file(path);
        }
        self.lower.read_file(path)
    }

    fn write_file(&self, path: &Path, content: &[u8]) -> VfsResult<()> {
        self.upper.write_file(path, content)
    }

    fn exists(&self, path: &Path) -> bool {
        self.upper.exists(path) || self.lower.exists(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        self.upper.is_file(path) || self.lower.is_file(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.upper.is_dir(path) || self.lower.is_dir(path)
    }

    fn read_dir(&self, path: &Path) -> VfsResult<Vec<PathBuf>> {
        let upper = self.upper.read_dir(path);
        let lower = self.lower.read_dir(path);
        match (upper, lower) {
            (Err(e), Err(_)) => Err(e),
            (upper, lower) => {
                let merged: BTreeSet<PathBuf> = upper
                    .unwrap_or_default()
                    .into_iter()
                    .chain(lower.unwrap_or_default())
                    .collect();
                Ok(merged.into_iter().collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lower() -> Arc<dyn VirtualFileSystem> {
        Arc::new(MemoryFileSystem::with_files([
            ("/w/main.k", "foo = 1"),
            ("/w/pkg/a.k", "a = 1"),
        ]))
    }

    #[test]
    fn test_upper_shadows_lower() {
        let fs = OverlayFileSystem::new(lower()).with_file("/w/main.k", "foo = 2");
        assert_eq!(fs.read_file(Path::new("/w/main.k")).unwrap(), b"foo = 2");
        assert_eq!(fs.read_file(Path::new("/w/pkg/a.k")).unwrap(), b"a = 1");
    }

    #[test]
    fn test_writes_do_not_reach_lower() {
        let base = lower();
        let fs = OverlayFileSystem::new(Arc::clone(&base));
        fs.write_file(Path::new("/w/new.k"), b"n = 1").unwrap();

        assert!(fs.is_file(Path::new("/w/new.k")));
        assert!(!base.exists(Path::new("/w/new.k")));
    }

    #[test]
    fn test_read_dir_merges_layers() {
        let fs = OverlayFileSystem::new(lower()).with_file("/w/pkg/b.k", "b = 2");
        assert_eq!(
            fs.read_dir(Path::new("/w/pkg")).unwrap(),
            vec![PathBuf::from("/w/pkg/a.k"), PathBuf::from("/w/pkg/b.k")]
        );
    }
}
