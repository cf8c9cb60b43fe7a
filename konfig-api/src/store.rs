//! Artifact store
//!
//! Artifacts are written to a uniquely named temporary file next to the
//! output path and renamed into place once complete. Readers therefore see
//! either no file or a whole artifact, and a failed write leaves nothing at
//! the output path. An existing file is never replaced: once an artifact is
//! at a path, the bytes there stay the same.

use crate::error::KonfigError;
use konfig_core::LoadError;
use konfig_vfs::{NativeFileSystem, VirtualFileSystem};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Atomically write `bytes` to `output`, which must not exist yet
pub fn persist(output: &Path, bytes: &[u8]) -> Result<PathBuf, KonfigError> {
    let io_error = |what: &str, e: std::io::Error| {
        KonfigError::Internal(format!("cannot {} '{}': {}", what, output.display(), e))
    };

    if output.as_os_str().is_empty() {
        return Err(KonfigError::Internal("empty artifact output path".to_string()));
    }
    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|e| io_error("create the directory of", e))?;

    let mut temp = tempfile::Builder::new()
        .prefix(".konfig-build-")
        .tempfile_in(&dir)
        .map_err(|e| io_error("create a temporary file for", e))?;
    temp.write_all(bytes).map_err(|e| io_error("write", e))?;
    temp.as_file().sync_all().map_err(|e| io_error("sync", e))?;
    temp.persist_noclobber(output).map_err(|e| {
        if e.error.kind() == std::io::ErrorKind::AlreadyExists {
            KonfigError::Internal(format!("artifact '{}' already exists", output.display()))
        } else {
            io_error("rename into", e.error)
        }
    })?;
    Ok(output.to_path_buf())
}

/// Read a whole artifact file
pub fn read(path: &Path) -> Result<Vec<u8>, LoadError> {
    NativeFileSystem::new().read_file(path).map_err(|e| {
        LoadError::new(konfig_core::LoadErrorKind::Io(e.to_string()))
            .with_path(path.display().to_string())
    })
}
