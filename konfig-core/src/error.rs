//! 编译、加载、运行三个阶段的错误类型
//!
//! 每个错误都携带非空的可读消息，可定位的错误同时带有文件、行、列。

use crate::binary::{ReadError, SectionKind};
use crate::lexer::Coordinate;
use crate::parser::ParserError;
use konfig_config::Phase;

/// 编译期错误：语法、导入解析、静态检查
#[derive(Debug, Clone, PartialEq)]
pub struct CompileError {
    pub phase: Phase,
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl CompileError {
    pub fn new(phase: Phase, file: impl Into<String>, pos: Coordinate, message: impl Into<String>) -> Self {
        Self {
            phase,
            file: file.into(),
            line: pos.line,
            column: pos.column,
            message: message.into(),
        }
    }

    pub fn resolver(file: impl Into<String>, pos: Coordinate, message: impl Into<String>) -> Self {
        Self::new(Phase::Resolver, file, pos, message)
    }

    pub fn checker(file: impl Into<String>, pos: Coordinate, message: impl Into<String>) -> Self {
        Self::new(Phase::Checker, file, pos, message)
    }

    pub fn from_parser(file: impl Into<String>, err: &ParserError) -> Self {
        let phase = match err.kind {
            crate::parser::ParserErrorKind::Lexer(_) => Phase::Lexer,
            _ => Phase::Parser,
        };
        Self::new(phase, file, err.position, err.to_string())
    }
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}: {}",
            self.file, self.line, self.column, self.message
        )
    }
}

impl std::error::Error for CompileError {}

/// 运行期错误
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeError {
    /// 产物不含调试信息时为 `None`
    pub file: Option<String>,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            file: None,
            line: 0,
            column: 0,
            message: message.into(),
        }
    }

    pub fn at(mut self, file: Option<String>, line: usize, column: usize) -> Self {
        self.file = file;
        self.line = line;
        self.column = column;
        self
    }

    pub fn has_location(&self) -> bool {
        self.line > 0
    }
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.file, self.has_location()) {
            (Some(file), true) => write!(f, "{}:{}:{}: {}", file, self.line, self.column, self.message),
            (None, true) => write!(f, "line {}:{}: {}", self.line, self.column, self.message),
            _ => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for RuntimeError {}

/// 构建产物加载错误
#[derive(Debug, Clone, PartialEq)]
pub struct LoadError {
    pub path: Option<String>,
    pub kind: LoadErrorKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadErrorKind {
    /// 文件无法读取
    Io(String),
    /// 容器格式错误（文件头、section、校验和）
    Format(ReadError),
    /// section 内容无法解码
    Payload { section: SectionKind, message: String },
    /// 解码成功但内容不一致
    Inconsistent(String),
}

impl LoadError {
    pub fn new(kind: LoadErrorKind) -> Self {
        Self { path: None, kind }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn io(path: impl Into<String>, err: &std::io::Error) -> Self {
        Self::new(LoadErrorKind::Io(err.to_string())).with_path(path)
    }
}

impl From<ReadError> for LoadError {
    fn from(err: ReadError) -> Self {
        Self::new(LoadErrorKind::Format(err))
    }
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(path) = &self.path {
            write!(f, "failed to load artifact '{}': ", path)?;
        } else {
            write!(f, "failed to load artifact: ")?;
        }
        match &self.kind {
            LoadErrorKind::Io(msg) => write!(f, "{}", msg),
            LoadErrorKind::Format(err) => write!(f, "{}", err),
            LoadErrorKind::Payload { section, message } => {
                write!(f, "corrupted {:?} section: {}", section, message)
            }
            LoadErrorKind::Inconsistent(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            LoadErrorKind::Format(err) => Some(err),
            _ => None,
        }
    }
}

/// 核心库的统一错误
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("compile error: {0}")]
    Compile(#[from] CompileError),
    #[error("{0}")]
    Load(#[from] LoadError),
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),
    /// 不应出现的状态，例如非法的模块状态迁移
    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
