//! Token 定义

use super::position::Span;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // 字面量
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),

    // 关键字
    Import,
    As,
    Schema,
    Check,
    Assert,
    If,
    Else,
    And,
    Or,
    Not,
    In,
    True,
    False,
    None,

    // 括号
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftCurly,
    RightCurly,

    // 标点与运算符
    Comma,
    Colon,
    Dot,
    Question,
    Equal,
    DoubleEqual,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Plus,
    Minus,
    Star,
    Slash,
    DoubleSlash,
    Percent,
    Pipe,

    // 布局
    Newline,
    Indent,
    Dedent,
    Eof,
}

impl TokenKind {
    pub fn keyword(ident: &str) -> Option<TokenKind> {
        let kind = match ident {
            "import" => TokenKind::Import,
            "as" => TokenKind::As,
            "schema" => TokenKind::Schema,
            "check" => TokenKind::Check,
            "assert" => TokenKind::Assert,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            "in" => TokenKind::In,
            "True" => TokenKind::True,
            "False" => TokenKind::False,
            "None" => TokenKind::None,
            _ => return None,
        };
        Some(kind)
    }

    /// 同类比较（忽略携带的数据）
    pub fn same_kind(&self, other: &TokenKind) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::Ident(name) => return write!(f, "identifier '{name}'"),
            TokenKind::Int(v) => return write!(f, "integer {v}"),
            TokenKind::Float(v) => return write!(f, "float {v}"),
            TokenKind::Str(s) => return write!(f, "string {s:?}"),
            TokenKind::Import => "'import'",
            TokenKind::As => "'as'",
            TokenKind::Schema => "'schema'",
            TokenKind::Check => "'check'",
            TokenKind::Assert => "'assert'",
            TokenKind::If => "'if'",
            TokenKind::Else => "'else'",
            TokenKind::And => "'and'",
            TokenKind::Or => "'or'",
            TokenKind::Not => "'not'",
            TokenKind::In => "'in'",
            TokenKind::True => "'True'",
            TokenKind::False => "'False'",
            TokenKind::None => "'None'",
            TokenKind::LeftParen => "'('",
            TokenKind::RightParen => "')'",
            TokenKind::LeftBracket => "'['",
            TokenKind::RightBracket => "']'",
            TokenKind::LeftCurly => "'{'",
            TokenKind::RightCurly => "'}'",
            TokenKind::Comma => "','",
            TokenKind::Colon => "':'",
            TokenKind::Dot => "'.'",
            TokenKind::Question => "'?'",
            TokenKind::Equal => "'='",
            TokenKind::DoubleEqual => "'=='",
            TokenKind::NotEqual => "'!='",
            TokenKind::Less => "'<'",
            TokenKind::LessEqual => "'<='",
            TokenKind::Greater => "'>'",
            TokenKind::GreaterEqual => "'>='",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Star => "'*'",
            TokenKind::Slash => "'/'",
            TokenKind::DoubleSlash => "'//'",
            TokenKind::Percent => "'%'",
            TokenKind::Pipe => "'|'",
            TokenKind::Newline => "newline",
            TokenKind::Indent => "indent",
            TokenKind::Dedent => "dedent",
            TokenKind::Eof => "end of file",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}
