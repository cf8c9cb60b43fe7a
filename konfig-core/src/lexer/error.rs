//! Lexer 错误类型

use super::position::Coordinate;

#[derive(Debug, Clone, PartialEq)]
pub enum LexerErrorKind {
    /// 无法识别的字符
    InvalidChar(char),
    /// 字符串未闭合
    UnterminatedString,
    /// 无效的数字格式
    InvalidNumber(String),
    /// 缩进与任何外层缩进都不匹配
    InconsistentDedent,
    /// 多余的右括号
    UnbalancedBracket(char),
}

/// 词法错误，包含结构化信息
#[derive(Debug, Clone, PartialEq)]
pub struct LexerError {
    pub kind: LexerErrorKind,
    pub position: Coordinate,
}

impl LexerError {
    pub fn at(kind: LexerErrorKind, position: Coordinate) -> Self {
        Self { kind, position }
    }

    pub fn line(&self) -> usize {
        self.position.line
    }

    pub fn column(&self) -> usize {
        self.position.column
    }
}

impl std::fmt::Display for LexerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            LexerErrorKind::InvalidChar(c) => write!(f, "invalid character {c:?}"),
            LexerErrorKind::UnterminatedString => write!(f, "unterminated string literal"),
            LexerErrorKind::InvalidNumber(s) => write!(f, "invalid number literal '{s}'"),
            LexerErrorKind::InconsistentDedent => {
                write!(f, "unindent does not match any outer indentation level")
            }
            LexerErrorKind::UnbalancedBracket(c) => write!(f, "unmatched '{c}'"),
        }
    }
}

impl std::error::Error for LexerError {}
