//! API error type
//!
//! Every service operation returns [`KonfigError`]. `to_report()` turns it
//! into a flat [`ErrorReport`] for callers that want structured data.

use konfig_core::error::LoadErrorKind;
use konfig_core::{CompileError, LoadError, RuntimeError};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum KonfigError {
    /// Syntax, import resolution or static check failure
    #[error("{0}")]
    Compile(#[from] CompileError),

    /// Missing, unreadable or corrupted artifact
    #[error("{0}")]
    Load(#[from] LoadError),

    /// Evaluation failure, including bad runtime arguments
    #[error("{0}")]
    Runtime(#[from] RuntimeError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<konfig_core::Error> for KonfigError {
    fn from(err: konfig_core::Error) -> Self {
        match err {
            konfig_core::Error::Compile(e) => KonfigError::Compile(e),
            konfig_core::Error::Load(e) => KonfigError::Load(e),
            konfig_core::Error::Runtime(e) => KonfigError::Runtime(e),
            konfig_core::Error::Internal(msg) => KonfigError::Internal(msg),
        }
    }
}

impl KonfigError {
    /// Phase name: the compile phase (`lexer`, `parser`, `resolver`, ...),
    /// `loader`, `runtime` or `internal`
    pub fn phase(&self) -> &'static str {
        match self {
            KonfigError::Compile(e) => e.phase.as_str(),
            KonfigError::Load(_) => "loader",
            KonfigError::Runtime(_) => "runtime",
            KonfigError::Internal(_) => "internal",
        }
    }

    pub fn file(&self) -> Option<&str> {
        match self {
            KonfigError::Compile(e) => Some(e.file.as_str()),
            KonfigError::Load(e) => e.path.as_deref(),
            KonfigError::Runtime(e) => e.file.as_deref(),
            KonfigError::Internal(_) => None,
        }
    }

    pub fn line(&self) -> Option<usize> {
        match self {
            KonfigError::Compile(e) => Some(e.line),
            KonfigError::Runtime(e) if e.has_location() => Some(e.line),
            _ => None,
        }
    }

    pub fn column(&self) -> Option<usize> {
        match self {
            KonfigError::Compile(e) => Some(e.column),
            KonfigError::Runtime(e) if e.has_location() => Some(e.column),
            _ => None,
        }
    }

    /// Message without the location prefix
    pub fn message(&self) -> String {
        match self {
            KonfigError::Compile(e) => e.message.clone(),
            KonfigError::Runtime(e) => e.message.clone(),
            KonfigError::Load(e) => e.to_string(),
            KonfigError::Internal(msg) => msg.clone(),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            KonfigError::Compile(_) => "CompileError",
            KonfigError::Load(e) => match e.kind {
                LoadErrorKind::Io(_) => "LoadError::Io",
                LoadErrorKind::Format(_) => "LoadError::Format",
                LoadErrorKind::Payload { .. } => "LoadError::Payload",
                LoadErrorKind::Inconsistent(_) => "LoadError::Inconsistent",
            },
            KonfigError::Runtime(_) => "RuntimeError",
            KonfigError::Internal(_) => "InternalError",
        }
    }

    /// Flat structured report, for callers that render errors themselves
    pub fn to_report(&self) -> ErrorReport {
        ErrorReport {
            phase: self.phase(),
            kind: self.kind().to_string(),
            file: self.file().map(str::to_string),
            line: self.line(),
            column: self.column(),
            message: self.message(),
        }
    }
}

/// Structured error report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReport {
    pub phase: &'static str,
    /// Stable error kind for programmatic handling
    pub kind: String,
    pub file: Option<String>,
    /// 1-based line, if known
    pub line: Option<usize>,
    /// 1-based column, if known
    pub column: Option<usize>,
    pub message: String,
}

impl std::fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.file, self.line, self.column) {
            (Some(file), Some(line), Some(col)) => write!(
                f,
                "[{}:{}:{}] {} error: {}",
                file, line, col, self.phase, self.message
            ),
            (None, Some(line), Some(col)) => {
                write!(f, "[{}:{}] {} error: {}", line, col, self.phase, self.message)
            }
            _ => write!(f, "{} error: {}", self.phase, self.message),
        }
    }
}

impl ErrorReport {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!("{{\"phase\":\"{}\",\"kind\":\"{}\"}}", self.phase, self.kind)
        })
    }

    /// Short form for terminals
    pub fn to_short(&self) -> String {
        format!("{}: {}", self.phase, self.message)
    }
}
