//! 可达性：收集语句中读取的自由名字

use crate::lexer::Coordinate;
use crate::parser::ast::{
    ConfigEntry, Expr, ExprKind, ImportStmt, Module, SchemaStmt, Stmt, StmtKind, TypeExpr,
};
use std::collections::HashSet;

/// 语句读取的一个名字
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// `name`
    Name { name: String, pos: Coordinate },
    /// `alias.member`，`alias` 可能是导入别名，也可能是普通绑定
    Member {
        alias: String,
        member: String,
        pos: Coordinate,
    },
}

impl Reference {
    /// 被读取的顶层名字
    pub fn root(&self) -> &str {
        match self {
            Reference::Name { name, .. } => name,
            Reference::Member { alias, .. } => alias,
        }
    }
}

/// 收集一条顶层语句的引用
pub fn stmt_references(stmt: &Stmt) -> Vec<Reference> {
    let mut collector = Collector::default();
    match &stmt.kind {
        StmtKind::Import(_) => {}
        StmtKind::Schema(schema) => collector.schema(schema, stmt.pos),
        StmtKind::Assign(assign) => {
            if let Some(ty) = &assign.ty {
                collector.ty(ty, stmt.pos);
            }
            collector.expr(&assign.value);
        }
        StmtKind::Assert(assert) => {
            collector.expr(&assert.test);
            if let Some(msg) = &assert.msg {
                collector.expr(msg);
            }
        }
        StmtKind::Expr(expr) => collector.expr(expr),
    }
    collector.refs
}

/// 文件中从未被读取的导入
pub fn unused_imports(module: &Module) -> Vec<(&ImportStmt, Coordinate)> {
    let used: HashSet<String> = module
        .body
        .iter()
        .flat_map(stmt_references)
        .map(|r| r.root().to_string())
        .collect();
    module
        .imports()
        .filter(|(import, _)| !used.contains(import.name()))
        .collect()
}

#[derive(Default)]
struct Collector {
    refs: Vec<Reference>,
    /// schema 体内的属性名
    locals: HashSet<String>,
}

impl Collector {
    fn schema(&mut self, schema: &SchemaStmt, pos: Coordinate) {
        for attr in &schema.attrs {
            self.ty(&attr.ty, attr.pos);
        }
        if let Some(index) = &schema.index_signature {
            self.ty(&index.key_ty, pos);
            self.ty(&index.value_ty, pos);
        }

        self.locals = schema.attrs.iter().map(|a| a.name.clone()).collect();
        if let Some(key) = schema.index_signature.as_ref().and_then(|i| i.key_name.clone()) {
            self.locals.insert(key);
        }
        for attr in &schema.attrs {
            if let Some(default) = &attr.default {
                self.expr(default);
            }
        }
        for check in &schema.checks {
            self.expr(&check.test);
            if let Some(msg) = &check.msg {
                self.expr(msg);
            }
        }
        self.locals.clear();
    }

    fn ty(&mut self, ty: &TypeExpr, pos: Coordinate) {
        match ty {
            TypeExpr::List(item) => self.ty(item, pos),
            TypeExpr::Dict(key, value) => {
                self.ty(key, pos);
                self.ty(value, pos);
            }
            TypeExpr::Union(types) => types.iter().for_each(|t| self.ty(t, pos)),
            TypeExpr::Named { pkg: Some(pkg), name } => self.refs.push(Reference::Member {
                alias: pkg.clone(),
                member: name.clone(),
                pos,
            }),
            TypeExpr::Named { pkg: None, name } => self.name(name, pos),
            _ => {}
        }
    }

    fn name(&mut self, name: &str, pos: Coordinate) {
        if !self.locals.contains(name) {
            self.refs.push(Reference::Name {
                name: name.to_string(),
                pos,
            });
        }
    }

    fn entries(&mut self, entries: &[ConfigEntry]) {
        for entry in entries {
            self.expr(&entry.value);
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::None
            | ExprKind::Bool { .. }
            | ExprKind::Int { .. }
            | ExprKind::Float { .. }
            | ExprKind::Str { .. } => {}
            ExprKind::Name { name } => self.name(name, expr.pos),
            ExprKind::List { items } => items.iter().for_each(|e| self.expr(e)),
            ExprKind::Config { entries } => self.entries(entries),
            ExprKind::SchemaExpr { pkg, name, entries } => {
                match pkg {
                    Some(pkg) => self.refs.push(Reference::Member {
                        alias: pkg.clone(),
                        member: name.clone(),
                        pos: expr.pos,
                    }),
                    None => self.name(name, expr.pos),
                }
                self.entries(entries);
            }
            ExprKind::Call { func, args, kwargs } => {
                self.expr(func);
                args.iter().for_each(|e| self.expr(e));
                kwargs.iter().for_each(|k| self.expr(&k.value));
            }
            ExprKind::Member { value, attr } => match &value.kind {
                ExprKind::Name { name } if !self.locals.contains(name) => {
                    self.refs.push(Reference::Member {
                        alias: name.clone(),
                        member: attr.clone(),
                        pos: expr.pos,
                    })
                }
                _ => self.expr(value),
            },
            ExprKind::Index { value, index } => {
                self.expr(value);
                self.expr(index);
            }
            ExprKind::Unary { operand, .. } => self.expr(operand),
            ExprKind::Binary { left, right, .. } => {
                self.expr(left);
                self.expr(right);
            }
            ExprKind::IfElse { cond, then, orelse } => {
                self.expr(cond);
                self.expr(then);
                self.expr(orelse);
            }
        }
    }
}
