//! 语法分析

pub mod ast;
pub mod error;
mod parser;
mod utils;

pub use error::{ParseResult, ParserError, ParserErrorKind};
pub use parser::Parser;

/// 解析一个源文件
pub fn parse_source(filename: &str, source: &str, max_depth: usize) -> ParseResult<ast::Module> {
    let tokens = crate::lexer::tokenize(source)?;
    Parser::new(filename, tokens, max_depth).parse()
}
