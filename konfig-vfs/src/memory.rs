//! In-memory file system implementation

use crate::error::{VfsError, VfsResult};
use crate::VirtualFileSystem;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// An in-memory file system implementation.
///
/// Files live in a `BTreeMap` keyed by normalized path. Directories are
/// implicit: a path is a directory when some file lives beneath it.
/// Clones share the same storage.
///
/// # Example
/// ```
/// use konfig_vfs::{MemoryFileSystem, VirtualFileSystem};
/// use std::path::Path;
///
/// let fs = MemoryFileSystem::new();
/// fs.write_file(Path::new("/work/main.k"), b"foo = 42").unwrap();
/// assert!(fs.is_dir(Path::new("/work")));
/// assert_eq!(fs.read_file(Path::new("/work/main.k")).unwrap(), b"foo = 42");
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryFileSystem {
    files: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a memory file system pre-populated with files.
    pub fn with_files<I, P, C>(files: I) -> Self
    where
        I: IntoIterator<Item = (P, C)>,
        P: AsRef<Path>,
        C: Into<Vec<u8>>,
    {
        let fs = Self::new();
        {
            let mut map = fs.files.write();
            for (path, content) in files {
                map.insert(normalize_path(path.as_ref()), content.into());
            }
        }
        fs
    }

    /// Number of stored files
    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }
}

/// Forward slashes, no trailing slash, no `./` segments.
fn normalize_path(path: &Path) -> String {
    let raw = path.to_string_lossy().replace('\\', "/");
    let mut out: Vec<&str> = Vec::new();
    for (i, segment) in raw.split('/').enumerate() {
        match segment {
            "." => {}
            "" if i > 0 => {}
            other => out.push(other),
        }
    }
    let joined = out.join("/");
    match joined.as_str() {
        "" if raw.starts_with('/') => "/".to_string(),
        "" => ".".to_string(),
        _ => joined,
    }
}

fn dir_prefix(path: &Path) -> String {
    let dir = normalize_path(path);
    match dir.as_str() {
        "." => String::new(),
        "/" => "/".to_string(),
        _ => format!("{dir}/"),
    }
}

impl VirtualFileSystem for MemoryFileSystem {
    fn read_file(&self, path: &Path) -> VfsResult<Vec<u8>> {
        self.files
            .read()
            .get(&normalize_path(path))
            .cloned()
            .ok_or_else(|| VfsError::NotFound {
                path: path.to_string_lossy().to_string(),
            })
    }

    fn write_file(&self, path: &Path, content: &[u8]) -> VfsResult<()> {
        self.files
            .write()
            .insert(normalize_path(path), content.to_vec());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.is_file(path) || self.is_dir(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        self.files.read().contains_key(&normalize_path(path))
    }

    fn is_dir(&self, path: &Path) -> bool {
        let prefix = dir_prefix(path);
        self.files.read().keys().any(|k| k.starts_with(&prefix))
    }

    fn read_dir(&self, path: &Path) -> VfsResult<Vec<PathBuf>> {
        let prefix = dir_prefix(path);
        let files = self.files.read();
        let children: BTreeSet<&str> = files
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix))
            .map(|rest| rest.split('/').next().unwrap_or(rest))
            .collect();
        if children.is_empty() {
            return Err(VfsError::NotFound {
                path: path.to_string_lossy().to_string(),
            });
        }
        Ok(children.into_iter().map(|c| path.join(c)).collect())
    }
}
