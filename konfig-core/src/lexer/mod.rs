//! 词法分析
//!
//! 行式语法：括号外的换行产生 `Newline`，行首缩进变化产生 `Indent` / `Dedent`。
//! 括号内的换行和缩进都被忽略。

pub mod error;
pub mod position;
pub mod token;

pub use error::{LexerError, LexerErrorKind};
pub use position::{Coordinate, Span};
pub use token::{Token, TokenKind};

const TAB_WIDTH: usize = 4;

pub struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    column: usize,
    indent_stack: Vec<usize>,
    brackets: Vec<char>,
    at_line_start: bool,
    tokens: Vec<Token>,
}

/// 对整段源码做词法分析
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexerError> {
    Lexer::new(source).run()
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            line: 1,
            column: 1,
            indent_stack: vec![0],
            brackets: Vec::new(),
            at_line_start: true,
            tokens: Vec::new(),
        }
    }

    fn coordinate(&self) -> Coordinate {
        Coordinate {
            line: self.line,
            column: self.column,
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn peek_second(&self) -> Option<char> {
        let mut ahead = self.chars.clone();
        ahead.next();
        ahead.next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn push(&mut self, kind: TokenKind, start: Coordinate) {
        let end = self.coordinate();
        self.tokens.push(Token {
            kind,
            span: Span::new(start, end),
        });
    }

    fn last_is_layout(&self) -> bool {
        matches!(
            self.tokens.last().map(|t| &t.kind),
            None | Some(TokenKind::Newline) | Some(TokenKind::Indent) | Some(TokenKind::Dedent)
        )
    }

    pub fn run(mut self) -> Result<Vec<Token>, LexerError> {
        loop {
            if self.at_line_start && self.brackets.is_empty() && !self.handle_indentation()? {
                break;
            }

            let Some(c) = self.peek() else { break };
            let start = self.coordinate();

            match c {
                ' ' | '\t' | '\r' => {
                    self.bump();
                }
                '\\' if self.peek_second() == Some('\n') => {
                    self.bump();
                    self.bump();
                }
                '#' => self.skip_comment(),
                '\n' => {
                    self.bump();
                    if self.brackets.is_empty() {
                        if !self.last_is_layout() {
                            self.push(TokenKind::Newline, start);
                        }
                        self.at_line_start = true;
                    }
                }
                '0'..='9' => self.lex_number(start)?,
                '"' | '\'' => {
                    let value = self.lex_string(false)?;
                    self.push(TokenKind::Str(value), start);
                }
                'r' if matches!(self.peek_second(), Some('"') | Some('\'')) => {
                    self.bump();
                    let value = self.lex_string(true)?;
                    self.push(TokenKind::Str(value), start);
                }
                c if c.is_alphabetic() || c == '_' => self.lex_ident(start),
                _ => self.lex_punct(start)?,
            }
        }

        if !self.brackets.is_empty() {
            let open = self.brackets.last().copied().unwrap_or('(');
            return Err(LexerError::at(
                LexerErrorKind::UnbalancedBracket(open),
                self.coordinate(),
            ));
        }

        let end = self.coordinate();
        if !self.last_is_layout() {
            self.push(TokenKind::Newline, end);
        }
        while self.indent_stack.len() > 1 {
            self.indent_stack.pop();
            self.push(TokenKind::Dedent, end);
        }
        self.push(TokenKind::Eof, end);
        Ok(self.tokens)
    }

    /// 处理行首缩进；返回 false 表示已到达文件末尾
    fn handle_indentation(&mut self) -> Result<bool, LexerError> {
        loop {
            let mut width = 0;
            while let Some(c) = self.peek() {
                match c {
                    ' ' => width += 1,
                    '\t' => width = (width / TAB_WIDTH + 1) * TAB_WIDTH,
                    '\r' => {}
                    _ => break,
                }
                self.bump();
            }

            match self.peek() {
                None => return Ok(false),
                // 空行与注释行不影响缩进
                Some('\n') => {
                    self.bump();
                    continue;
                }
                Some('#') => {
                    self.skip_comment();
                    continue;
                }
                Some(_) => {}
            }

            let position = self.coordinate();
            let current = self.indent_stack.last().copied().unwrap_or(0);
            if width > current {
                self.indent_stack.push(width);
                self.push(TokenKind::Indent, position);
            } else if width < current {
                while self.indent_stack.last().is_some_and(|&w| w > width) {
                    self.indent_stack.pop();
                    self.push(TokenKind::Dedent, position);
                }
                if self.indent_stack.last() != Some(&width) {
                    return Err(LexerError::at(LexerErrorKind::InconsistentDedent, position));
                }
            }
            self.at_line_start = false;
            return Ok(true);
        }
    }

    fn skip_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn lex_ident(&mut self, start: Coordinate) {
        let mut ident = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                ident.push(c);
                self.bump();
            } else {
                break;
            }
        }
        let kind = TokenKind::keyword(&ident).unwrap_or(TokenKind::Ident(ident));
        self.push(kind, start);
    }

    fn lex_number(&mut self, start: Coordinate) -> Result<(), LexerError> {
        let mut text = String::new();
        let mut is_float = false;

        while let Some(c) = self.peek() {
            match c {
                '0'..='9' | '_' => {
                    if c != '_' {
                        text.push(c);
                    }
                    self.bump();
                }
                '.' if !is_float && self.peek_second().is_some_and(|n| n.is_ascii_digit()) => {
                    is_float = true;
                    text.push(c);
                    self.bump();
                }
                'e' | 'E' => {
                    is_float = true;
                    text.push(c);
                    self.bump();
                    if let Some(sign @ ('+' | '-')) = self.peek() {
                        text.push(sign);
                        self.bump();
                    }
                }
                _ => break,
            }
        }

        let invalid = || LexerError::at(LexerErrorKind::InvalidNumber(text.clone()), start);
        let kind = if is_float {
            TokenKind::Float(text.parse().map_err(|_| invalid())?)
        } else {
            TokenKind::Int(text.parse().map_err(|_| invalid())?)
        };
        self.push(kind, start);
        Ok(())
    }

    fn lex_string(&mut self, raw: bool) -> Result<String, LexerError> {
        let start = self.coordinate();
        let quote = self.bump().unwrap_or('"');

        let triple = self.peek() == Some(quote) && self.peek_second() == Some(quote);
        if triple {
            self.bump();
            self.bump();
        } else if self.peek() == Some(quote) {
            // 空字符串
            self.bump();
            return Ok(String::new());
        }

        let mut value = String::new();
        loop {
            let Some(c) = self.bump() else {
                return Err(LexerError::at(LexerErrorKind::UnterminatedString, start));
            };
            match c {
                c if c == quote => {
                    if !triple {
                        return Ok(value);
                    }
                    if self.peek() == Some(quote) && self.peek_second() == Some(quote) {
                        self.bump();
                        self.bump();
                        return Ok(value);
                    }
                    value.push(c);
                }
                '\n' if !triple => {
                    return Err(LexerError::at(LexerErrorKind::UnterminatedString, start));
                }
                '\\' if !raw => {
                    let Some(escaped) = self.bump() else {
                        return Err(LexerError::at(LexerErrorKind::UnterminatedString, start));
                    };
                    match escaped {
                        'n' => value.push('\n'),
                        't' => value.push('\t'),
                        'r' => value.push('\r'),
                        '0' => value.push('\0'),
                        '\\' => value.push('\\'),
                        '\'' => value.push('\''),
                        '"' => value.push('"'),
                        '\n' => {}
                        other => {
                            value.push('\\');
                            value.push(other);
                        }
                    }
                }
                '\\' if raw && self.peek() == Some(quote) => {
                    value.push('\\');
                    if let Some(q) = self.bump() {
                        value.push(q);
                    }
                }
                c => value.push(c),
            }
        }
    }

    fn lex_punct(&mut self, start: Coordinate) -> Result<(), LexerError> {
        let c = self.bump().unwrap_or('\0');
        let next = self.peek();

        let kind = match c {
            '(' | '[' | '{' => {
                self.brackets.push(c);
                match c {
                    '(' => TokenKind::LeftParen,
                    '[' => TokenKind::LeftBracket,
                    _ => TokenKind::LeftCurly,
                }
            }
            ')' | ']' | '}' => {
                let expected = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                if self.brackets.pop() != Some(expected) {
                    return Err(LexerError::at(LexerErrorKind::UnbalancedBracket(c), start));
                }
                match c {
                    ')' => TokenKind::RightParen,
                    ']' => TokenKind::RightBracket,
                    _ => TokenKind::RightCurly,
                }
            }
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            '.' => TokenKind::Dot,
            '?' => TokenKind::Question,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '%' => TokenKind::Percent,
            '|' => TokenKind::Pipe,
            '/' if next == Some('/') => {
                self.bump();
                TokenKind::DoubleSlash
            }
            '/' => TokenKind::Slash,
            '=' if next == Some('=') => {
                self.bump();
                TokenKind::DoubleEqual
            }
            '=' => TokenKind::Equal,
            '!' if next == Some('=') => {
                self.bump();
                TokenKind::NotEqual
            }
            '<' if next == Some('=') => {
                self.bump();
                TokenKind::LessEqual
            }
            '<' => TokenKind::Less,
            '>' if next == Some('=') => {
                self.bump();
                TokenKind::GreaterEqual
            }
            '>' => TokenKind::Greater,
            other => return Err(LexerError::at(LexerErrorKind::InvalidChar(other), start)),
        };
        self.push(kind, start);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_simple_assignment() {
        assert_eq!(
            kinds("foo = 42"),
            vec![
                TokenKind::Ident("foo".into()),
                TokenKind::Equal,
                TokenKind::Int(42),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_indent_and_dedent() {
        let source = "schema A:\n    x: int\n\n    # comment\n    y?: str\nb = 1\n";
        assert_eq!(
            kinds(source),
            vec![
                TokenKind::Schema,
                TokenKind::Ident("A".into()),
                TokenKind::Colon,
                TokenKind::Newline,
                TokenKind::Indent,
                TokenKind::Ident("x".into()),
                TokenKind::Colon,
                TokenKind::Ident("int".into()),
                TokenKind::Newline,
                TokenKind::Ident("y".into()),
                TokenKind::Question,
                TokenKind::Colon,
                TokenKind::Ident("str".into()),
                TokenKind::Newline,
                TokenKind::Dedent,
                TokenKind::Ident("b".into()),
                TokenKind::Equal,
                TokenKind::Int(1),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_newlines_inside_brackets_are_ignored() {
        let tokens = kinds("a = [\n    1,\n    2\n]\n");
        assert_eq!(
            tokens
                .iter()
                .filter(|k| matches!(k, TokenKind::Newline))
                .count(),
            1
        );
        assert!(!tokens.contains(&TokenKind::Indent));
    }

    #[test]
    fn test_dedent_at_eof() {
        let tokens = kinds("schema A:\n    x: int");
        assert_eq!(
            &tokens[tokens.len() - 3..],
            &[TokenKind::Newline, TokenKind::Dedent, TokenKind::Eof]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(r#"x = "^\\w+$""#)[2],
            TokenKind::Str("^\\w+$".into())
        );
        assert_eq!(kinds(r#"x = "a\nb""#)[2], TokenKind::Str("a\nb".into()));
        assert_eq!(kinds(r#"x = r"\d+""#)[2], TokenKind::Str("\\d+".into()));
        assert_eq!(kinds("x = ''")[2], TokenKind::Str(String::new()));
        assert_eq!(
            kinds("x = \"\"\"line1\nline2\"\"\"")[2],
            TokenKind::Str("line1\nline2".into())
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(kinds("1_000")[0], TokenKind::Int(1000));
        assert_eq!(kinds("3.5")[0], TokenKind::Float(3.5));
        assert_eq!(kinds("1e3")[0], TokenKind::Float(1000.0));
    }

    #[test]
    fn test_member_access_on_int_is_not_float() {
        let tokens = kinds("a.b");
        assert_eq!(tokens[1], TokenKind::Dot);
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("a // b != c <= d")[..7],
            [
                TokenKind::Ident("a".into()),
                TokenKind::DoubleSlash,
                TokenKind::Ident("b".into()),
                TokenKind::NotEqual,
                TokenKind::Ident("c".into()),
                TokenKind::LessEqual,
                TokenKind::Ident("d".into()),
            ]
        );
    }

    #[test]
    fn test_errors() {
        let err = tokenize("x = \"abc").unwrap_err();
        assert_eq!(err.kind, LexerErrorKind::UnterminatedString);
        assert_eq!(err.line(), 1);

        let err = tokenize("x = 1 $").unwrap_err();
        assert_eq!(err.kind, LexerErrorKind::InvalidChar('$'));
        assert_eq!(err.column(), 7);

        let err = tokenize("x = (1\n").unwrap_err();
        assert_eq!(err.kind, LexerErrorKind::UnbalancedBracket('('));

        let err = tokenize("schema A:\n        x: int\n    y: int\n").unwrap_err();
        assert_eq!(err.kind, LexerErrorKind::InconsistentDedent);
    }

    #[test]
    fn test_spans() {
        let tokens = tokenize("a = 1\nbb = 2").unwrap();
        let bb = tokens
            .iter()
            .find(|t| t.kind == TokenKind::Ident("bb".into()))
            .unwrap();
        assert_eq!(bb.span.start, Coordinate { line: 2, column: 1 });
        assert_eq!(bb.span.end, Coordinate { line: 2, column: 3 });
    }
}
