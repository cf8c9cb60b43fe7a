//! AST -> IR 降级
//!
//! 降级所有已加载模块的绑定和 schema。名字查找顺序：
//! schema 属性 -> 包级定义 -> 文件导入 -> 内置函数。

use super::*;
use crate::error::{CompileError, Error, Result};
use crate::lexer::Coordinate;
use crate::parser::ast::{self, ConfigEntry, Expr, ExprKind, Keyword, StmtKind, TypeExpr};
use crate::resolver::{ImportRef, ModuleKind, ParsedFile, Resolution, SymbolKind};
use konfig_config::Phase;
use std::collections::{HashMap, HashSet};

/// 把解析结果降级为可执行的程序
pub fn lower(resolution: &Resolution) -> Result<Program> {
    Lowerer::new(resolution).run()
}

/// 名字查找结果
enum Lookup<'a> {
    Local,
    Global { pkg: PackageId, index: usize },
    Schema(SchemaId),
    Module(&'a ImportRef),
    Option,
    Builtin(Builtin),
    Undefined,
}

/// 表达式所在的上下文
#[derive(Clone, Copy)]
struct Ctx<'a> {
    pkg: PackageId,
    file: &'a ParsedFile,
    /// schema 体内的属性名
    locals: Option<&'a HashSet<String>>,
}

struct Lowerer<'r> {
    resolution: &'r Resolution,
    /// 每个包：名字 -> 绑定下标
    bindings: Vec<HashMap<String, usize>>,
    schema_ids: HashMap<(PackageId, String), SchemaId>,
}

impl<'r> Lowerer<'r> {
    fn new(resolution: &'r Resolution) -> Self {
        Self {
            resolution,
            bindings: Vec::new(),
            schema_ids: HashMap::new(),
        }
    }

    fn run(mut self) -> Result<Program> {
        let resolution = self.resolution;

        // 第一遍：为绑定和 schema 分配下标
        let mut schema_sites = Vec::new();
        for (pkg, package) in resolution.packages.iter().enumerate() {
            let mut names = HashMap::new();
            for (file_index, file) in package.files.iter().enumerate() {
                for stmt in &file.module.body {
                    match &stmt.kind {
                        StmtKind::Assign(assign) => {
                            let index = names.len();
                            names.insert(assign.target.clone(), index);
                        }
                        StmtKind::Schema(schema) => {
                            self.schema_ids
                                .insert((pkg, schema.name.clone()), schema_sites.len());
                            schema_sites.push((pkg, file_index, stmt));
                        }
                        _ => {}
                    }
                }
            }
            self.bindings.push(names);
        }

        // 第二遍：schema
        let mut schemas = Vec::with_capacity(schema_sites.len());
        for (pkg, file_index, stmt) in schema_sites {
            let file = &resolution.packages[pkg].files[file_index];
            if let StmtKind::Schema(schema) = &stmt.kind {
                schemas.push(self.lower_schema(pkg, file, schema, stmt.pos)?);
            }
        }

        // 第三遍：绑定和顶层语句
        let mut packages = Vec::with_capacity(resolution.packages.len());
        for (pkg, package) in resolution.packages.iter().enumerate() {
            let mut bindings = Vec::with_capacity(self.bindings[pkg].len());
            let mut items = Vec::new();
            for file in &package.files {
                let ctx = Ctx {
                    pkg,
                    file,
                    locals: None,
                };
                for stmt in &file.module.body {
                    match &stmt.kind {
                        StmtKind::Assign(assign) => {
                            let ty = match &assign.ty {
                                Some(ty) => Some(self.lower_type(ctx, ty, stmt.pos)?),
                                None => None,
                            };
                            let value = self.lower_value(ctx, &assign.value, ty.as_ref())?;
                            items.push(ItemIr::Binding(bindings.len()));
                            bindings.push(BindingIr {
                                name: assign.target.clone(),
                                public: !assign.target.starts_with('_'),
                                ty,
                                value,
                                pos: self.pos(ctx, stmt.pos),
                            });
                        }
                        StmtKind::Assert(assert) => {
                            items.push(ItemIr::Assert {
                                test: self.lower_expr(ctx, &assert.test)?,
                                msg: self.lower_opt(ctx, assert.msg.as_ref())?,
                                pos: self.pos(ctx, stmt.pos),
                            });
                        }
                        StmtKind::Expr(expr) => {
                            items.push(ItemIr::Expr {
                                value: self.lower_expr(ctx, expr)?,
                                pos: self.pos(ctx, stmt.pos),
                            });
                        }
                        _ => {}
                    }
                }
            }
            packages.push(PackageIr {
                path: package.path.clone(),
                bindings,
                items,
            });
        }

        Ok(Program {
            packages,
            schemas,
            entry: resolution.main,
            init_order: resolution.init_order.clone(),
        })
    }

    fn lower_schema(
        &self,
        pkg: PackageId,
        file: &ParsedFile,
        schema: &ast::SchemaStmt,
        pos: Coordinate,
    ) -> Result<SchemaIr> {
        let mut locals: HashSet<String> = schema.attrs.iter().map(|a| a.name.clone()).collect();
        if let Some(key) = schema.index_signature.as_ref().and_then(|i| i.key_name.clone()) {
            locals.insert(key);
        }
        let plain = Ctx {
            pkg,
            file,
            locals: None,
        };
        let ctx = Ctx {
            locals: Some(&locals),
            ..plain
        };

        let mut attrs = Vec::with_capacity(schema.attrs.len());
        for attr in &schema.attrs {
            let ty = self.lower_type(plain, &attr.ty, attr.pos)?;
            let default = match &attr.default {
                Some(default) => Some(self.lower_value(ctx, default, Some(&ty))?),
                None => None,
            };
            attrs.push(AttrIr {
                name: attr.name.clone(),
                optional: attr.optional,
                ty,
                default,
            });
        }

        let index_signature = match &schema.index_signature {
            Some(index) => Some(IndexSignatureIr {
                key: self.lower_type(plain, &index.key_ty, pos)?,
                value: self.lower_type(plain, &index.value_ty, pos)?,
            }),
            None => None,
        };

        let mut checks = Vec::with_capacity(schema.checks.len());
        for check in &schema.checks {
            checks.push(CheckIr {
                test: self.lower_expr(ctx, &check.test)?,
                msg: self.lower_opt(ctx, check.msg.as_ref())?,
                pos: self.pos(ctx, check.pos),
            });
        }

        Ok(SchemaIr {
            name: schema.name.clone(),
            pkg: self.resolution.packages[pkg].path.clone(),
            attrs,
            index_signature,
            checks,
        })
    }

    fn pos(&self, ctx: Ctx<'_>, at: Coordinate) -> Pos {
        Pos {
            file: ctx.file.index,
            line: at.line as u32,
            column: at.column as u32,
        }
    }

    fn error(&self, ctx: Ctx<'_>, at: Coordinate, message: impl Into<String>) -> Error {
        CompileError::new(Phase::Checker, ctx.file.name.clone(), at, message).into()
    }

    fn lookup<'a>(&self, ctx: Ctx<'a>, name: &str) -> Result<Lookup<'a>> {
        if ctx.locals.is_some_and(|locals| locals.contains(name)) {
            return Ok(Lookup::Local);
        }
        if let Some(symbol) = self.resolution.packages[ctx.pkg].scope.get(name) {
            return self.lookup_symbol(ctx.pkg, name, symbol.kind);
        }
        if let Some(import) = ctx.file.imports.get(name) {
            return Ok(Lookup::Module(import));
        }
        if name == "option" {
            return Ok(Lookup::Option);
        }
        Ok(Builtin::from_name(name).map_or(Lookup::Undefined, Lookup::Builtin))
    }

    fn lookup_symbol<'a>(&self, pkg: PackageId, name: &str, kind: SymbolKind) -> Result<Lookup<'a>> {
        let missing = || {
            Error::Internal(format!(
                "'{}' of module '{}' was not resolved",
                name, self.resolution.packages[pkg].path
            ))
        };
        match kind {
            SymbolKind::Binding => {
                let index = *self.bindings[pkg].get(name).ok_or_else(missing)?;
                Ok(Lookup::Global { pkg, index })
            }
            SymbolKind::Schema => {
                let id = *self
                    .schema_ids
                    .get(&(pkg, name.to_string()))
                    .ok_or_else(missing)?;
                Ok(Lookup::Schema(id))
            }
        }
    }

    /// 用户模块中的成员
    fn lookup_member<'a>(
        &self,
        ctx: Ctx<'_>,
        import: &ImportRef,
        member: &str,
        at: Coordinate,
    ) -> Result<Lookup<'a>> {
        let target = self
            .resolution
            .package_index(&import.path)
            .ok_or_else(|| Error::Internal(format!("module '{}' was not resolved", import.path)))?;
        match self.resolution.packages[target].scope.get(member) {
            Some(symbol) => self.lookup_symbol(target, member, symbol.kind),
            None => Err(self.error(
                ctx,
                at,
                format!("module '{}' has no member '{}'", import.path, member),
            )),
        }
    }

    fn module_kind(&self, import: &ImportRef) -> ModuleKind {
        self.resolution
            .graph
            .get(&import.path)
            .map(|node| node.kind.clone())
            .unwrap_or(ModuleKind::User { location: None })
    }

    fn lower_type(&self, ctx: Ctx<'_>, ty: &TypeExpr, at: Coordinate) -> Result<TypeIr> {
        let lowered = match ty {
            TypeExpr::Any => TypeIr::Any,
            TypeExpr::None => TypeIr::None,
            TypeExpr::Bool => TypeIr::Bool,
            TypeExpr::Int => TypeIr::Int,
            TypeExpr::Float => TypeIr::Float,
            TypeExpr::Str => TypeIr::Str,
            TypeExpr::List(item) => TypeIr::List(Box::new(self.lower_type(ctx, item, at)?)),
            TypeExpr::Dict(key, value) => TypeIr::Dict(
                Box::new(self.lower_type(ctx, key, at)?),
                Box::new(self.lower_type(ctx, value, at)?),
            ),
            TypeExpr::Union(types) => TypeIr::Union(
                types
                    .iter()
                    .map(|t| self.lower_type(ctx, t, at))
                    .collect::<Result<_>>()?,
            ),
            TypeExpr::Named { pkg: None, name } => match self.lookup(ctx, name)? {
                Lookup::Schema(id) => TypeIr::Schema(id),
                _ => return Err(self.error(ctx, at, format!("unknown type '{}'", name))),
            },
            TypeExpr::Named {
                pkg: Some(alias),
                name,
            } => match self.lookup(ctx, alias)? {
                Lookup::Module(import)
                    if matches!(self.module_kind(import), ModuleKind::User { .. }) =>
                {
                    match self.lookup_member(ctx, import, name, at)? {
                        Lookup::Schema(id) => TypeIr::Schema(id),
                        _ => return Err(self.error(ctx, at, format!("unknown type '{}'", ty))),
                    }
                }
                _ => return Err(self.error(ctx, at, format!("unknown type '{}'", ty))),
            },
        };
        Ok(lowered)
    }

    fn lower_opt(&self, ctx: Ctx<'_>, expr: Option<&Expr>) -> Result<Option<ExprIr>> {
        expr.map(|e| self.lower_expr(ctx, e)).transpose()
    }

    /// 绑定或属性的值：直接调用 `option()` 时使用声明的类型
    fn lower_value(&self, ctx: Ctx<'_>, expr: &Expr, expected: Option<&TypeIr>) -> Result<ExprIr> {
        if let ExprKind::Call { func, args, kwargs } = &expr.kind {
            if let ExprKind::Name { name } = &func.kind {
                if let Lookup::Option = self.lookup(ctx, name)? {
                    return self.lower_option(ctx, args, kwargs, expected, expr.pos);
                }
            }
        }
        self.lower_expr(ctx, expr)
    }

    fn lower_exprs(&self, ctx: Ctx<'_>, exprs: &[Expr]) -> Result<Vec<ExprIr>> {
        exprs.iter().map(|e| self.lower_expr(ctx, e)).collect()
    }

    fn lower_entries(&self, ctx: Ctx<'_>, entries: &[ConfigEntry]) -> Result<Vec<(String, ExprIr)>> {
        entries
            .iter()
            .map(|entry| Ok((entry.key.clone(), self.lower_expr(ctx, &entry.value)?)))
            .collect()
    }

    fn lower_kwargs(&self, ctx: Ctx<'_>, kwargs: &[Keyword]) -> Result<Vec<(String, ExprIr)>> {
        kwargs
            .iter()
            .map(|k| Ok((k.name.clone(), self.lower_expr(ctx, &k.value)?)))
            .collect()
    }

    fn lower_expr(&self, ctx: Ctx<'_>, expr: &Expr) -> Result<ExprIr> {
        let at = expr.pos;
        let lowered = match &expr.kind {
            ExprKind::None => ExprIr::Const(ConstIr::None),
            ExprKind::Bool { value } => ExprIr::Const(ConstIr::Bool(*value)),
            ExprKind::Int { value } => ExprIr::Const(ConstIr::Int(*value)),
            ExprKind::Float { value } => ExprIr::Const(ConstIr::Float(*value)),
            ExprKind::Str { value } => ExprIr::Const(ConstIr::Str(value.clone())),
            ExprKind::Name { name } => match self.lookup(ctx, name)? {
                Lookup::Local => ExprIr::Local(name.clone()),
                Lookup::Global { pkg, index } => ExprIr::Global { pkg, index },
                Lookup::Schema(_) => {
                    return Err(self.error(
                        ctx,
                        at,
                        format!("schema '{}' cannot be used as a value", name),
                    ))
                }
                Lookup::Module(_) => {
                    return Err(self.error(
                        ctx,
                        at,
                        format!("module '{}' cannot be used as a value", name),
                    ))
                }
                Lookup::Option | Lookup::Builtin(_) => {
                    return Err(self.error(
                        ctx,
                        at,
                        format!("builtin function '{}' must be called", name),
                    ))
                }
                Lookup::Undefined => {
                    return Err(self.error(ctx, at, format!("name '{}' is not defined", name)))
                }
            },
            ExprKind::List { items } => ExprIr::List(self.lower_exprs(ctx, items)?),
            ExprKind::Config { entries } => ExprIr::Dict(self.lower_entries(ctx, entries)?),
            ExprKind::SchemaExpr { pkg, name, entries } => {
                let schema = self.schema_id(ctx, pkg.as_deref(), name, at)?;
                ExprIr::Schema {
                    schema,
                    entries: self.lower_entries(ctx, entries)?,
                    pos: self.pos(ctx, at),
                }
            }
            ExprKind::Call { func, args, kwargs } => self.lower_call(ctx, func, args, kwargs, at)?,
            ExprKind::Member { value, attr } => {
                if let Some(import) = self.module_alias(ctx, value)? {
                    return match self.module_kind(import) {
                        ModuleKind::User { .. } => {
                            match self.lookup_member(ctx, import, attr, at)? {
                                Lookup::Global { pkg, index } => Ok(ExprIr::Global { pkg, index }),
                                _ => Err(self.error(
                                    ctx,
                                    at,
                                    format!("schema '{}' cannot be used as a value", attr),
                                )),
                            }
                        }
                        _ => Err(self.error(
                            ctx,
                            at,
                            format!("function '{}.{}' must be called", import.path, attr),
                        )),
                    };
                }
                ExprIr::Member {
                    value: Box::new(self.lower_expr(ctx, value)?),
                    attr: attr.clone(),
                }
            }
            ExprKind::Index { value, index } => ExprIr::Index {
                value: Box::new(self.lower_expr(ctx, value)?),
                index: Box::new(self.lower_expr(ctx, index)?),
            },
            ExprKind::Unary { op, operand } => ExprIr::Unary {
                op: *op,
                operand: Box::new(self.lower_expr(ctx, operand)?),
            },
            ExprKind::Binary { op, left, right } => ExprIr::Binary {
                op: *op,
                left: Box::new(self.lower_expr(ctx, left)?),
                right: Box::new(self.lower_expr(ctx, right)?),
            },
            ExprKind::IfElse { cond, then, orelse } => ExprIr::IfElse {
                cond: Box::new(self.lower_expr(ctx, cond)?),
                then: Box::new(self.lower_expr(ctx, then)?),
                orelse: Box::new(self.lower_expr(ctx, orelse)?),
            },
        };
        Ok(lowered)
    }

    /// `value` 是否是一个导入别名
    fn module_alias<'a>(&self, ctx: Ctx<'a>, value: &Expr) -> Result<Option<&'a ImportRef>> {
        if let ExprKind::Name { name } = &value.kind {
            if let Lookup::Module(import) = self.lookup(ctx, name)? {
                return Ok(Some(import));
            }
        }
        Ok(None)
    }

    fn schema_id(
        &self,
        ctx: Ctx<'_>,
        pkg: Option<&str>,
        name: &str,
        at: Coordinate,
    ) -> Result<SchemaId> {
        let found = match pkg {
            None => self.lookup(ctx, name)?,
            Some(alias) => match self.lookup(ctx, alias)? {
                Lookup::Module(import)
                    if matches!(self.module_kind(import), ModuleKind::User { .. }) =>
                {
                    self.lookup_member(ctx, import, name, at)?
                }
                _ => Lookup::Undefined,
            },
        };
        match found {
            Lookup::Schema(id) => Ok(id),
            _ => {
                let full = pkg.map_or_else(|| name.to_string(), |p| format!("{}.{}", p, name));
                Err(self.error(ctx, at, format!("'{}' is not a schema", full)))
            }
        }
    }

    fn lower_call(
        &self,
        ctx: Ctx<'_>,
        func: &Expr,
        args: &[Expr],
        kwargs: &[Keyword],
        at: Coordinate,
    ) -> Result<ExprIr> {
        match &func.kind {
            ExprKind::Name { name } => {
                let callee = match self.lookup(ctx, name)? {
                    Lookup::Option => return self.lower_option(ctx, args, kwargs, None, at),
                    Lookup::Builtin(builtin) => Callee::Builtin(builtin),
                    Lookup::Undefined => {
                        return Err(self.error(ctx, at, format!("name '{}' is not defined", name)))
                    }
                    Lookup::Schema(_) => {
                        return Err(self.error(
                            ctx,
                            at,
                            format!("schema '{0}' is not callable, use '{0} {{...}}'", name),
                        ))
                    }
                    _ => return Err(self.error(ctx, at, format!("'{}' is not callable", name))),
                };
                Ok(ExprIr::Call {
                    callee,
                    args: self.lower_exprs(ctx, args)?,
                    kwargs: self.lower_kwargs(ctx, kwargs)?,
                })
            }
            ExprKind::Member { value, attr } => {
                let Some(import) = self.module_alias(ctx, value)? else {
                    return Ok(ExprIr::Method {
                        receiver: Box::new(self.lower_expr(ctx, value)?),
                        name: attr.clone(),
                        args: self.lower_exprs(ctx, args)?,
                        kwargs: self.lower_kwargs(ctx, kwargs)?,
                    });
                };
                let callee = match self.module_kind(import) {
                    ModuleKind::System(module) => Callee::System {
                        module,
                        func: attr.clone(),
                    },
                    ModuleKind::Plugin(plugin) => Callee::Plugin {
                        plugin,
                        func: attr.clone(),
                    },
                    _ => {
                        return Err(self.error(
                            ctx,
                            at,
                            format!("'{}.{}' is not callable", import.path, attr),
                        ))
                    }
                };
                Ok(ExprIr::Call {
                    callee,
                    args: self.lower_exprs(ctx, args)?,
                    kwargs: self.lower_kwargs(ctx, kwargs)?,
                })
            }
            _ => Err(self.error(ctx, at, "expression is not callable")),
        }
    }

    /// `option(key, type=, default=, required=, help=)`
    fn lower_option(
        &self,
        ctx: Ctx<'_>,
        args: &[Expr],
        kwargs: &[Keyword],
        expected: Option<&TypeIr>,
        at: Coordinate,
    ) -> Result<ExprIr> {
        let mut key = None;
        match args {
            [] => {}
            [first] => key = Some(first),
            _ => return Err(self.error(ctx, at, "option() takes exactly one positional argument")),
        }

        let mut ty = expected.cloned();
        let mut default = None;
        let mut required = false;
        let mut help = None;
        for kwarg in kwargs {
            match kwarg.name.as_str() {
                "key" => key = Some(&kwarg.value),
                "type" => {
                    let name = self.string_literal(ctx, &kwarg.value, "option type")?;
                    ty = Some(TypeIr::from_name(&name).ok_or_else(|| {
                        self.error(ctx, kwarg.value.pos, format!("unknown option type '{}'", name))
                    })?);
                }
                "default" => default = Some(self.lower_expr(ctx, &kwarg.value)?),
                "required" => match kwarg.value.kind {
                    ExprKind::Bool { value } => required = value,
                    _ => {
                        return Err(self.error(
                            ctx,
                            kwarg.value.pos,
                            "option 'required' must be True or False",
                        ))
                    }
                },
                "help" => help = Some(self.string_literal(ctx, &kwarg.value, "option help")?),
                other => {
                    return Err(self.error(
                        ctx,
                        kwarg.value.pos,
                        format!("unexpected keyword argument '{}' for option()", other),
                    ))
                }
            }
        }

        let Some(key) = key else {
            return Err(self.error(ctx, at, "option() requires a name"));
        };
        let name = self.string_literal(ctx, key, "option name")?;

        Ok(ExprIr::Option(Box::new(OptionIr {
            name,
            ty,
            default,
            required,
            help,
        })))
    }

    fn string_literal(&self, ctx: Ctx<'_>, expr: &Expr, what: &str) -> Result<String> {
        match &expr.kind {
            ExprKind::Str { value } => Ok(value.clone()),
            _ => Err(self.error(ctx, expr.pos, format!("{} must be a string literal", what))),
        }
    }
}
