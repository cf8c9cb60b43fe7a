use super::ast::{
    AssertStmt, AssignStmt, CheckExpr, ConfigEntry, Expr, ExprKind, ImportStmt, IndexSignature,
    Keyword, Module, SchemaAttr, SchemaStmt, Stmt, StmtKind, TypeExpr, UnaryOp,
};
use super::error::{ParseResult, ParserError, ParserErrorKind};
use super::utils::{binary_op, get_precedence, COMPARISON_PRECEDENCE};
use crate::lexer::{Coordinate, Token, TokenKind};
use std::collections::HashSet;

pub struct Parser {
    filename: String,
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    max_depth: usize,
}

impl Parser {
    /// `tokens` 必须以 `Eof` 结尾（`tokenize` 保证这一点）
    pub fn new(filename: impl Into<String>, tokens: Vec<Token>, max_depth: usize) -> Self {
        Self {
            filename: filename.into(),
            tokens,
            pos: 0,
            depth: 0,
            max_depth,
        }
    }

    /// 解析整个文件
    pub fn parse(mut self) -> ParseResult<Module> {
        let mut body = Vec::new();
        while !self.check(&TokenKind::Eof) {
            if self.match_token(&TokenKind::Newline) {
                continue;
            }
            body.push(self.parse_statement()?);
        }
        Ok(Module {
            filename: self.filename,
            body,
        })
    }

    // ==================== token 工具 ====================

    fn current(&self) -> &TokenKind {
        self.tokens
            .get(self.pos)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    fn peek_kind(&self, offset: usize) -> &TokenKind {
        self.tokens
            .get(self.pos + offset)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    fn coordinate(&self) -> Coordinate {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.span.start)
            .unwrap_or_default()
    }

    fn consume(&mut self) -> TokenKind {
        let kind = self.current().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        kind
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.current().same_kind(kind)
    }

    fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.consume();
            true
        } else {
            false
        }
    }

    fn error_here(&self, kind: ParserErrorKind) -> ParserError {
        ParserError::at(kind, self.coordinate())
    }

    fn unexpected(&self, expected: &[&str]) -> ParserError {
        self.error_here(ParserErrorKind::UnexpectedToken {
            found: self.current().to_string(),
            expected: expected.iter().map(|s| s.to_string()).collect(),
        })
    }

    fn expect(&mut self, kind: &TokenKind) -> ParseResult<()> {
        if self.match_token(kind) {
            Ok(())
        } else {
            Err(self.unexpected(&[&kind.to_string()]))
        }
    }

    fn expect_identifier(&mut self) -> ParseResult<String> {
        match self.current() {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.consume();
                Ok(name)
            }
            other => Err(self.error_here(ParserErrorKind::ExpectedIdentifier {
                found: other.to_string(),
            })),
        }
    }

    /// 语句结束：换行，或紧随其后的 dedent / 文件末尾
    fn expect_statement_end(&mut self) -> ParseResult<()> {
        if self.match_token(&TokenKind::Newline)
            || self.check(&TokenKind::Dedent)
            || self.check(&TokenKind::Eof)
        {
            Ok(())
        } else {
            Err(self.unexpected(&["newline"]))
        }
    }

    // ==================== 语句 ====================

    fn parse_statement(&mut self) -> ParseResult<Stmt> {
        let pos = self.coordinate();
        let kind = match self.current() {
            TokenKind::Import => self.parse_import()?,
            TokenKind::Schema => self.parse_schema()?,
            TokenKind::Assert => {
                self.consume();
                let (test, msg) = self.parse_test_with_message()?;
                StmtKind::Assert(AssertStmt { test, msg })
            }
            TokenKind::Ident(_)
                if matches!(self.peek_kind(1), TokenKind::Equal | TokenKind::Colon) =>
            {
                self.parse_assign()?
            }
            TokenKind::Indent => {
                return Err(self.error_here(ParserErrorKind::Custom(
                    "unexpected indentation".to_string(),
                )))
            }
            _ => StmtKind::Expr(self.parse_expr()?),
        };
        self.expect_statement_end()?;
        Ok(Stmt { kind, pos })
    }

    /// 解析模块路径（如 a.b.c）
    fn parse_module_path(&mut self) -> ParseResult<String> {
        let mut path = self.expect_identifier()?;
        while self.match_token(&TokenKind::Dot) {
            let part = self.expect_identifier()?;
            path.push('.');
            path.push_str(&part);
        }
        Ok(path)
    }

    fn parse_import(&mut self) -> ParseResult<StmtKind> {
        self.expect(&TokenKind::Import)?;
        let path = self.parse_module_path()?;
        let alias = if self.match_token(&TokenKind::As) {
            Some(self.expect_identifier()?)
        } else {
            None
        };
        Ok(StmtKind::Import(ImportStmt { path, alias }))
    }

    fn parse_assign(&mut self) -> ParseResult<StmtKind> {
        let target = self.expect_identifier()?;
        let ty = if self.match_token(&TokenKind::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };
        self.expect(&TokenKind::Equal)?;
        let value = self.parse_expr()?;
        Ok(StmtKind::Assign(AssignStmt { target, ty, value }))
    }

    fn parse_test_with_message(&mut self) -> ParseResult<(Expr, Option<Expr>)> {
        let test = self.parse_expr()?;
        let msg = if self.match_token(&TokenKind::Comma) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        Ok((test, msg))
    }

    fn parse_schema(&mut self) -> ParseResult<StmtKind> {
        self.expect(&TokenKind::Schema)?;
        let name = self.expect_identifier()?;
        self.expect(&TokenKind::Colon)?;
        self.expect(&TokenKind::Newline)?;
        self.expect(&TokenKind::Indent)?;

        let mut schema = SchemaStmt {
            name,
            attrs: Vec::new(),
            index_signature: None,
            checks: Vec::new(),
        };
        let mut seen = HashSet::new();

        while !self.match_token(&TokenKind::Dedent) {
            if self.match_token(&TokenKind::Newline) {
                continue;
            }
            if self.check(&TokenKind::Eof) {
                return Err(self.unexpected(&["dedent"]));
            }
            match self.current() {
                TokenKind::Check => self.parse_check_block(&mut schema.checks)?,
                TokenKind::LeftBracket => {
                    let signature = self.parse_index_signature()?;
                    schema.index_signature = Some(signature);
                    self.expect_statement_end()?;
                }
                _ => {
                    let attr = self.parse_schema_attr()?;
                    if !seen.insert(attr.name.clone()) {
                        return Err(ParserError::at(
                            ParserErrorKind::DuplicateAttribute(attr.name),
                            attr.pos,
                        ));
                    }
                    schema.attrs.push(attr);
                    self.expect_statement_end()?;
                }
            }
        }
        Ok(StmtKind::Schema(schema))
    }

    fn parse_schema_attr(&mut self) -> ParseResult<SchemaAttr> {
        let pos = self.coordinate();
        let name = self.expect_identifier()?;
        let optional = self.match_token(&TokenKind::Question);

        let ty = if self.match_token(&TokenKind::Colon) {
            self.parse_type()?
        } else if self.check(&TokenKind::Equal) {
            TypeExpr::Any
        } else {
            return Err(self.unexpected(&["':'", "'='"]));
        };
        let default = if self.match_token(&TokenKind::Equal) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        Ok(SchemaAttr {
            name,
            optional,
            ty,
            default,
            pos,
        })
    }

    fn parse_index_signature(&mut self) -> ParseResult<IndexSignature> {
        self.expect(&TokenKind::LeftBracket)?;
        let key_name = match (self.current(), self.peek_kind(1)) {
            (TokenKind::Ident(name), TokenKind::Colon) => {
                let name = name.clone();
                self.consume();
                self.consume();
                Some(name)
            }
            _ => None,
        };
        let key_ty = self.parse_type()?;
        self.expect(&TokenKind::RightBracket)?;
        self.expect(&TokenKind::Colon)?;
        let value_ty = self.parse_type()?;
        Ok(IndexSignature {
            key_name,
            key_ty,
            value_ty,
        })
    }

    fn parse_check_block(&mut self, checks: &mut Vec<CheckExpr>) -> ParseResult<()> {
        self.expect(&TokenKind::Check)?;
        self.expect(&TokenKind::Colon)?;
        self.expect(&TokenKind::Newline)?;
        self.expect(&TokenKind::Indent)?;
        while !self.match_token(&TokenKind::Dedent) {
            if self.match_token(&TokenKind::Newline) {
                continue;
            }
            let pos = self.coordinate();
            let (test, msg) = self.parse_test_with_message()?;
            checks.push(CheckExpr { test, msg, pos });
            self.expect_statement_end()?;
        }
        Ok(())
    }

    // ==================== 类型 ====================

    fn parse_type(&mut self) -> ParseResult<TypeExpr> {
        let first = self.parse_primary_type()?;
        if !self.check(&TokenKind::Pipe) {
            return Ok(first);
        }
        let mut types = vec![first];
        while self.match_token(&TokenKind::Pipe) {
            types.push(self.parse_primary_type()?);
        }
        Ok(TypeExpr::Union(types))
    }

    fn parse_primary_type(&mut self) -> ParseResult<TypeExpr> {
        match self.current().clone() {
            TokenKind::None => {
                self.consume();
                Ok(TypeExpr::None)
            }
            TokenKind::LeftBracket => {
                self.consume();
                let item = if self.check(&TokenKind::RightBracket) {
                    TypeExpr::Any
                } else {
                    self.parse_type()?
                };
                self.expect(&TokenKind::RightBracket)?;
                Ok(TypeExpr::List(Box::new(item)))
            }
            TokenKind::LeftCurly => {
                self.consume();
                if self.match_token(&TokenKind::RightCurly) {
                    return Ok(TypeExpr::Dict(Box::new(TypeExpr::Any), Box::new(TypeExpr::Any)));
                }
                let key = self.parse_type()?;
                self.expect(&TokenKind::Colon)?;
                let value = self.parse_type()?;
                self.expect(&TokenKind::RightCurly)?;
                Ok(TypeExpr::Dict(Box::new(key), Box::new(value)))
            }
            TokenKind::Ident(name) => {
                self.consume();
                let ty = match name.as_str() {
                    "any" => TypeExpr::Any,
                    "bool" => TypeExpr::Bool,
                    "int" => TypeExpr::Int,
                    "float" => TypeExpr::Float,
                    "str" => TypeExpr::Str,
                    "list" => TypeExpr::List(Box::new(TypeExpr::Any)),
                    "dict" => TypeExpr::Dict(Box::new(TypeExpr::Any), Box::new(TypeExpr::Any)),
                    _ if self.match_token(&TokenKind::Dot) => TypeExpr::Named {
                        pkg: Some(name),
                        name: self.expect_identifier()?,
                    },
                    _ => TypeExpr::Named { pkg: None, name },
                };
                Ok(ty)
            }
            _ => Err(self.unexpected(&["type"])),
        }
    }

    // ==================== 表达式 ====================

    pub fn parse_expr(&mut self) -> ParseResult<Expr> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(self.error_here(ParserErrorKind::NestingTooDeep(self.max_depth)));
        }
        let result = self.parse_conditional();
        self.depth -= 1;
        result
    }

    /// `a if cond else b`
    fn parse_conditional(&mut self) -> ParseResult<Expr> {
        let then = self.parse_binary(1)?;
        if !self.match_token(&TokenKind::If) {
            return Ok(then);
        }
        let pos = then.pos;
        let cond = self.parse_binary(1)?;
        self.expect(&TokenKind::Else)?;
        let orelse = self.parse_expr()?;
        Ok(Expr::new(
            ExprKind::IfElse {
                cond: Box::new(cond),
                then: Box::new(then),
                orelse: Box::new(orelse),
            },
            pos,
        ))
    }

    /// 优先级爬升
    fn parse_binary(&mut self, min_precedence: u8) -> ParseResult<Expr> {
        let mut left = self.parse_unary()?;

        loop {
            let precedence = get_precedence(self.current());
            if precedence == 0 || precedence < min_precedence {
                break;
            }

            let op = if self.check(&TokenKind::Not) {
                // 仅 `not in` 可作为二元运算符
                if !self.peek_kind(1).same_kind(&TokenKind::In) {
                    break;
                }
                self.consume();
                self.consume();
                super::ast::BinaryOp::NotIn
            } else {
                let kind = self.consume();
                match binary_op(&kind) {
                    Some(op) => op,
                    None => break,
                }
            };

            let right = self.parse_binary(precedence + 1)?;
            let pos = left.pos;
            left = Expr::new(
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                pos,
            );
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        let pos = self.coordinate();
        let (op, operand) = match self.current() {
            TokenKind::Not => {
                self.consume();
                (UnaryOp::Not, self.parse_binary(COMPARISON_PRECEDENCE)?)
            }
            TokenKind::Minus => {
                self.consume();
                (UnaryOp::Neg, self.parse_unary()?)
            }
            TokenKind::Plus => {
                self.consume();
                (UnaryOp::Plus, self.parse_unary()?)
            }
            _ => return self.parse_postfix(),
        };
        Ok(Expr::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            pos,
        ))
    }

    fn parse_postfix(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_primary()?;

        loop {
            let pos = expr.pos;
            match self.current() {
                TokenKind::Dot => {
                    self.consume();
                    let attr = self.expect_identifier()?;
                    expr = Expr::new(
                        ExprKind::Member {
                            value: Box::new(expr),
                            attr,
                        },
                        pos,
                    );
                }
                TokenKind::LeftParen => {
                    self.consume();
                    let (args, kwargs) = self.parse_call_arguments()?;
                    expr = Expr::new(
                        ExprKind::Call {
                            func: Box::new(expr),
                            args,
                            kwargs,
                        },
                        pos,
                    );
                }
                TokenKind::LeftBracket => {
                    self.consume();
                    let index = self.parse_expr()?;
                    self.expect(&TokenKind::RightBracket)?;
                    expr = Expr::new(
                        ExprKind::Index {
                            value: Box::new(expr),
                            index: Box::new(index),
                        },
                        pos,
                    );
                }
                TokenKind::LeftCurly => {
                    // `Name {..}` 与 `pkg.Name {..}` 是 schema 实例化
                    let (pkg, name) = match &expr.kind {
                        ExprKind::Name { name } => (None, name.clone()),
                        ExprKind::Member { value, attr } => match &value.kind {
                            ExprKind::Name { name } => (Some(name.clone()), attr.clone()),
                            _ => break,
                        },
                        _ => break,
                    };
                    self.consume();
                    let entries = self.parse_config_entries()?;
                    expr = Expr::new(ExprKind::SchemaExpr { pkg, name, entries }, pos);
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    fn parse_call_arguments(&mut self) -> ParseResult<(Vec<Expr>, Vec<Keyword>)> {
        let mut args = Vec::new();
        let mut kwargs: Vec<Keyword> = Vec::new();

        while !self.match_token(&TokenKind::RightParen) {
            match (self.current(), self.peek_kind(1)) {
                (TokenKind::Ident(name), TokenKind::Equal) => {
                    let name = name.clone();
                    self.consume();
                    self.consume();
                    let value = self.parse_expr()?;
                    kwargs.push(Keyword { name, value });
                }
                _ => {
                    if !kwargs.is_empty() {
                        return Err(self.error_here(ParserErrorKind::Custom(
                            "positional argument follows keyword argument".to_string(),
                        )));
                    }
                    args.push(self.parse_expr()?);
                }
            }
            if !self.match_token(&TokenKind::Comma) && !self.check(&TokenKind::RightParen) {
                return Err(self.unexpected(&["','", "')'"]));
            }
        }

        Ok((args, kwargs))
    }

    /// `{` 已被消费；逗号可省略
    fn parse_config_entries(&mut self) -> ParseResult<Vec<ConfigEntry>> {
        let mut entries = Vec::new();
        while !self.match_token(&TokenKind::RightCurly) {
            let pos = self.coordinate();
            let key = match self.current().clone() {
                TokenKind::Ident(name) => name,
                TokenKind::Str(value) => value,
                TokenKind::Int(value) => value.to_string(),
                _ => return Err(self.unexpected(&["key"])),
            };
            self.consume();
            if !self.match_token(&TokenKind::Colon) && !self.match_token(&TokenKind::Equal) {
                return Err(self.unexpected(&["':'", "'='"]));
            }
            let value = self.parse_expr()?;
            entries.push(ConfigEntry { key, value, pos });
            self.match_token(&TokenKind::Comma);
        }
        Ok(entries)
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let pos = self.coordinate();
        let kind = match self.current().clone() {
            TokenKind::Int(value) => ExprKind::Int { value },
            TokenKind::Float(value) => ExprKind::Float { value },
            TokenKind::Str(value) => {
                self.consume();
                // 相邻字符串字面量拼接
                let mut value = value;
                while let TokenKind::Str(next) = self.current() {
                    value.push_str(next);
                    self.consume();
                }
                return Ok(Expr::new(ExprKind::Str { value }, pos));
            }
            TokenKind::True => ExprKind::Bool { value: true },
            TokenKind::False => ExprKind::Bool { value: false },
            TokenKind::None => ExprKind::None,
            TokenKind::Ident(name) => ExprKind::Name { name },
            TokenKind::LeftParen => {
                self.consume();
                let inner = self.parse_expr()?;
                self.expect(&TokenKind::RightParen)?;
                return Ok(inner);
            }
            TokenKind::LeftBracket => {
                self.consume();
                let mut items = Vec::new();
                while !self.match_token(&TokenKind::RightBracket) {
                    items.push(self.parse_expr()?);
                    self.match_token(&TokenKind::Comma);
                }
                return Ok(Expr::new(ExprKind::List { items }, pos));
            }
            TokenKind::LeftCurly => {
                self.consume();
                let entries = self.parse_config_entries()?;
                return Ok(Expr::new(ExprKind::Config { entries }, pos));
            }
            _ => return Err(self.unexpected(&["expression"])),
        };
        self.consume();
        Ok(Expr::new(kind, pos))
    }
}

#[cfg(test)]
mod tests {
    use super::super::ast::BinaryOp;
    use super::super::parse_source;
    use super::*;

    fn parse(source: &str) -> Module {
        parse_source("main.k", source, 64).unwrap()
    }

    fn first_value(source: &str) -> ExprKind {
        match &parse(source).body[0].kind {
            StmtKind::Assign(assign) => assign.value.kind.clone(),
            other => panic!("expected assignment, got {other:?}"),
        }
    }

    #[test]
    fn test_import_and_assign() {
        let module = parse("import big_unused_pkg\n\nfoo = 42\n");
        assert_eq!(module.body.len(), 2);
        match &module.body[0].kind {
            StmtKind::Import(import) => {
                assert_eq!(import.path, "big_unused_pkg");
                assert_eq!(import.name(), "big_unused_pkg");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(first_value("foo = 42"), ExprKind::Int { value: 42 });
    }

    #[test]
    fn test_import_alias_and_dotted_path() {
        let module = parse("import konfig_plugin.hello\nimport a.b as c\n");
        let names: Vec<_> = module.imports().map(|(i, _)| i.name().to_string()).collect();
        assert_eq!(names, vec!["hello", "c"]);
    }

    #[test]
    fn test_schema_definition() {
        let source = r#"
schema Config:
    name: str
    replicas?: int = 1
    labels: {str:str} = {}
    [key: str]: any

    check:
        replicas >= 0, "replicas must be non-negative"
        len(name) > 0
"#;
        let module = parse(source);
        let StmtKind::Schema(schema) = &module.body[0].kind else {
            panic!("expected schema");
        };
        assert_eq!(schema.name, "Config");
        assert_eq!(schema.attrs.len(), 3);
        assert!(schema.attrs[1].optional);
        assert_eq!(
            schema.attrs[2].ty,
            TypeExpr::Dict(Box::new(TypeExpr::Str), Box::new(TypeExpr::Str))
        );
        let signature = schema.index_signature.as_ref().unwrap();
        assert_eq!(signature.key_name.as_deref(), Some("key"));
        assert_eq!(signature.value_ty, TypeExpr::Any);
        assert_eq!(schema.checks.len(), 2);
        assert!(schema.checks[0].msg.is_some());
    }

    #[test]
    fn test_schema_instance_and_config() {
        let value = first_value("c = Config {name = \"a\", replicas: 2\n labels: {\"k\": \"v\"}}");
        let ExprKind::SchemaExpr { pkg, name, entries } = value else {
            panic!("expected schema expr");
        };
        assert_eq!(pkg, None);
        assert_eq!(name, "Config");
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[2].key, "labels");

        let value = first_value("c = pkg.Config {}");
        assert!(matches!(
            value,
            ExprKind::SchemaExpr { pkg: Some(ref p), .. } if p == "pkg"
        ));
    }

    #[test]
    fn test_call_with_kwargs() {
        let value = first_value("v = option(\"foo\", type=\"int\", default=1)");
        let ExprKind::Call { args, kwargs, .. } = value else {
            panic!("expected call");
        };
        assert_eq!(args.len(), 1);
        assert_eq!(kwargs[0].name, "type");
        assert_eq!(kwargs[1].name, "default");
    }

    #[test]
    fn test_precedence() {
        let value = first_value("x = 1 + 2 * 3 == 7 and not False");
        let ExprKind::Binary { op, left, .. } = value else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOp::And);
        let ExprKind::Binary { op, left, .. } = left.kind else {
            panic!("expected comparison");
        };
        assert_eq!(op, BinaryOp::Eq);
        let ExprKind::Binary { op, right, .. } = left.kind else {
            panic!("expected addition");
        };
        assert_eq!(op, BinaryOp::Add);
        assert!(matches!(right.kind, ExprKind::Binary { op: BinaryOp::Mul, .. }));
    }

    #[test]
    fn test_not_in_and_conditional() {
        let value = first_value("x = \"a\" not in items if flag else None");
        let ExprKind::IfElse { then, orelse, .. } = value else {
            panic!("expected conditional");
        };
        assert!(matches!(then.kind, ExprKind::Binary { op: BinaryOp::NotIn, .. }));
        assert_eq!(orelse.kind, ExprKind::None);
    }

    #[test]
    fn test_member_index_chain() {
        let value = first_value("x = regex.match(\"foo\", \"^\\\\w+$\")[0].upper()");
        assert!(matches!(value, ExprKind::Call { .. }));
    }

    #[test]
    fn test_typed_binding_and_statements() {
        let module = parse("x: int = 1\nassert x > 0, \"positive\"\nprint(x)\n");
        assert!(matches!(
            &module.body[0].kind,
            StmtKind::Assign(AssignStmt { ty: Some(TypeExpr::Int), .. })
        ));
        assert!(matches!(&module.body[1].kind, StmtKind::Assert(_)));
        assert!(matches!(&module.body[2].kind, StmtKind::Expr(_)));
    }

    #[test]
    fn test_union_and_named_types() {
        let module = parse("x: int | str = 1\ny: pkg.Config = pkg.Config {}\n");
        let StmtKind::Assign(assign) = &module.body[1].kind else {
            panic!();
        };
        assert_eq!(
            assign.ty,
            Some(TypeExpr::Named {
                pkg: Some("pkg".into()),
                name: "Config".into()
            })
        );
    }

    #[test]
    fn test_errors_carry_position() {
        let err = parse_source("main.k", "a = 1\nb = = 2\n", 64).unwrap_err();
        assert_eq!(err.line(), 2);
        assert_eq!(err.column(), 5);

        let err = parse_source("main.k", "a = (1 +\n", 64).unwrap_err();
        assert!(matches!(err.kind, ParserErrorKind::Lexer(_)));

        let err = parse_source("main.k", "schema A:\n    x: int\n    x: str\n", 64).unwrap_err();
        assert_eq!(err.kind, ParserErrorKind::DuplicateAttribute("x".into()));
    }

    #[test]
    fn test_nesting_limit() {
        let source = format!("x = {}1{}", "(".repeat(40), ")".repeat(40));
        let err = parse_source("main.k", &source, 16).unwrap_err();
        assert_eq!(err.kind, ParserErrorKind::NestingTooDeep(16));
    }

    #[test]
    fn test_ast_serializes() {
        let module = parse("foo = 42\n");
        let json = serde_json::to_value(&module).unwrap();
        assert_eq!(json["body"][0]["type"], "Assign");
        assert_eq!(json["body"][0]["target"], "foo");
    }
}
