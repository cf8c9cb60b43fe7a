use crate::lexer::{Coordinate, LexerError};

/// 语法错误，包含位置信息
#[derive(Debug, Clone, PartialEq)]
pub struct ParserError {
    pub kind: ParserErrorKind,
    pub position: Coordinate,
}

/// 语法错误类型
#[derive(Debug, Clone, PartialEq)]
pub enum ParserErrorKind {
    /// 词法错误
    Lexer(String),
    /// 意外的token
    UnexpectedToken { found: String, expected: Vec<String> },
    /// 期望标识符
    ExpectedIdentifier { found: String },
    /// 嵌套超过上限
    NestingTooDeep(usize),
    /// schema 中重复定义的属性
    DuplicateAttribute(String),
    /// 自定义错误消息
    Custom(String),
}

pub type ParseResult<T> = Result<T, ParserError>;

impl ParserError {
    pub fn at(kind: ParserErrorKind, position: Coordinate) -> Self {
        Self { kind, position }
    }

    pub fn line(&self) -> usize {
        self.position.line
    }

    pub fn column(&self) -> usize {
        self.position.column
    }
}

impl From<LexerError> for ParserError {
    fn from(err: LexerError) -> Self {
        Self {
            kind: ParserErrorKind::Lexer(err.to_string()),
            position: err.position,
        }
    }
}

impl std::fmt::Display for ParserError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ParserErrorKind::Lexer(msg) => write!(f, "{msg}"),
            ParserErrorKind::UnexpectedToken { found, expected } => {
                if expected.is_empty() {
                    write!(f, "unexpected {found}")
                } else {
                    write!(f, "unexpected {found}, expected {}", expected.join(" or "))
                }
            }
            ParserErrorKind::ExpectedIdentifier { found } => {
                write!(f, "expected identifier, found {found}")
            }
            ParserErrorKind::NestingTooDeep(limit) => {
                write!(f, "expression nesting exceeds the limit of {limit}")
            }
            ParserErrorKind::DuplicateAttribute(name) => {
                write!(f, "attribute '{name}' is defined more than once")
            }
            ParserErrorKind::Custom(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for ParserError {}
