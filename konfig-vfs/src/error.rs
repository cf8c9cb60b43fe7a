//! VFS Error Types

/// Result type for VFS operations
pub type VfsResult<T> = Result<T, VfsError>;

/// Error type for VFS operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VfsError {
    /// File or directory not found
    #[error("Path not found: {path}")]
    NotFound { path: String },

    /// Permission denied
    #[error("Permission denied: {path}")]
    PermissionDenied { path: String },

    /// Invalid path
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// IO error
    #[error("IO error: {message}")]
    Io { message: String },
}

impl VfsError {
    pub(crate) fn from_io(err: std::io::Error, path: &std::path::Path) -> Self {
        let path = path.to_string_lossy().to_string();
        match err.kind() {
            std::io::ErrorKind::NotFound => VfsError::NotFound { path },
            std::io::ErrorKind::PermissionDenied => VfsError::PermissionDenied { path },
            _ => VfsError::Io {
                message: err.to_string(),
            },
        }
    }
}

impl From<std::io::Error> for VfsError {
    fn from(err: std::io::Error) -> Self {
        VfsError::Io {
            message: err.to_string(),
        }
    }
}
