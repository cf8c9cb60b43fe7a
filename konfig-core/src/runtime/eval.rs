//! IR 求值器
//!
//! 每次执行创建一个新的求值器，执行结束即丢弃，执行之间不共享任何状态。
//! 顶层绑定按需求值并缓存：第一次读取时计算，之后直接返回缓存的值。

use super::builtins::{call_builtin, call_method, Args};
use super::operators;
use super::options::{coerce, OptionArgs};
use super::plugin::PluginRegistry;
use super::system::{call_system, RegexCache};
use super::value::{Dict, SchemaValue, Value};
use crate::error::RuntimeError;
use crate::ir::{Callee, ExprIr, ItemIr, OptionIr, PackageId, Pos, Program, SchemaId, SchemaIr, TypeIr};
use crate::parser::ast::BinaryOp;
use konfig_config::Phase;
use konfig_log::{debug, trace, Logger};
use std::collections::HashMap;
use std::sync::Arc;

type EvalResult<T = Value> = Result<T, RuntimeError>;

/// 一次执行的结果
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// 入口包的公开绑定，按声明顺序
    pub result: Dict,
    /// `print` 的输出
    pub stdout: String,
}

enum Slot {
    Pending,
    InProgress,
    Done(Value),
}

pub struct Evaluator<'p> {
    program: &'p Program,
    files: Option<&'p [String]>,
    args: &'p OptionArgs,
    plugins: &'p PluginRegistry,
    logger: Arc<Logger>,
    max_depth: usize,
    max_len: usize,
    slots: Vec<Vec<Slot>>,
    /// schema 属性帧
    locals: Vec<Dict>,
    depth: usize,
    stdout: String,
    regexes: RegexCache,
}

impl<'p> Evaluator<'p> {
    pub fn new(program: &'p Program, args: &'p OptionArgs, plugins: &'p PluginRegistry) -> Self {
        let slots = program
            .packages
            .iter()
            .map(|p| p.bindings.iter().map(|_| Slot::Pending).collect())
            .collect();
        Self {
            program,
            files: None,
            args,
            plugins,
            logger: Logger::noop(),
            max_depth: konfig_config::LimitConfig::default().max_eval_depth,
            max_len: konfig_config::LimitConfig::default().max_collection_len,
            slots,
            locals: Vec::new(),
            depth: 0,
            stdout: String::new(),
            regexes: RegexCache::default(),
        }
    }

    /// 调试信息中的文件表，用于错误定位
    pub fn with_files(mut self, files: &'p [String]) -> Self {
        self.files = Some(files);
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// 重复和 `range()` 产生的列表或字符串的最大长度
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }

    pub fn with_logger(mut self, logger: Arc<Logger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn run(mut self) -> EvalResult<Evaluation> {
        let program = self.program;
        debug!(
            self.logger,
            target: Phase::Runtime.target(),
            "evaluating '{}' ({} packages, {} args)",
            program.entry_package().path,
            program.packages.len(),
            self.args.len()
        );

        for &pkg in &program.init_order {
            if pkg != program.entry {
                self.run_items(pkg)?;
            }
        }
        self.run_items(program.entry)?;

        let mut result = Dict::new();
        for (index, binding) in program.entry_package().bindings.iter().enumerate() {
            if binding.public {
                let value = self.global(program.entry, index)?;
                result.insert(binding.name.clone(), value);
            }
        }
        Ok(Evaluation {
            result,
            stdout: self.stdout,
        })
    }

    fn run_items(&mut self, pkg: PackageId) -> EvalResult<()> {
        let program = self.program;
        let package = &program.packages[pkg];
        trace!(
            self.logger,
            target: Phase::Runtime.target(),
            "running {} top-level items of '{}'",
            package.items.len(),
            package.path
        );
        for item in &package.items {
            match item {
                ItemIr::Binding(index) => {
                    self.global(pkg, *index)?;
                }
                ItemIr::Assert { test, msg, pos } => {
                    let passed = self.eval(test).map_err(|e| self.locate(e, *pos))?;
                    if !passed.is_truthy() {
                        let message = match msg {
                            Some(msg) => {
                                let msg = self.eval(msg).map_err(|e| self.locate(e, *pos))?;
                                format!("assertion failed: {}", msg)
                            }
                            None => "assertion failed".to_string(),
                        };
                        return Err(self.locate(RuntimeError::new(message), *pos));
                    }
                }
                ItemIr::Expr { value, pos } => {
                    self.eval(value).map_err(|e| self.locate(e, *pos))?;
                }
            }
        }
        Ok(())
    }

    fn file_name(&self, pos: Pos) -> Option<String> {
        self.files
            .and_then(|files| files.get(pos.file as usize))
            .cloned()
    }

    /// 还没有位置的错误定位到 `pos`
    fn locate(&self, err: RuntimeError, pos: Pos) -> RuntimeError {
        if err.has_location() || pos.line == 0 {
            err
        } else {
            err.at(self.file_name(pos), pos.line as usize, pos.column as usize)
        }
    }

    fn global(&mut self, pkg: PackageId, index: usize) -> EvalResult {
        let program = self.program;
        let binding = &program.packages[pkg].bindings[index];
        match &self.slots[pkg][index] {
            Slot::Done(value) => return Ok(value.clone()),
            Slot::InProgress => {
                let err = RuntimeError::new(format!("cyclic reference to '{}'", binding.name));
                return Err(self.locate(err, binding.pos));
            }
            Slot::Pending => {}
        }
        self.slots[pkg][index] = Slot::InProgress;

        // 顶层绑定看不到调用处的 schema 属性
        let saved = std::mem::take(&mut self.locals);
        let result = match self.eval(&binding.value) {
            Ok(value) => match &binding.ty {
                Some(ty) => self.convert(value, ty),
                None => Ok(value),
            },
            Err(e) => Err(e),
        };
        self.locals = saved;

        let value = result.map_err(|e| self.locate(e, binding.pos))?;
        self.slots[pkg][index] = Slot::Done(value.clone());
        Ok(value)
    }

    fn eval(&mut self, expr: &ExprIr) -> EvalResult {
        if self.depth >= self.max_depth {
            return Err(RuntimeError::new(format!(
                "maximum evaluation depth {} exceeded",
                self.max_depth
            )));
        }
        self.depth += 1;
        let result = self.eval_inner(expr);
        self.depth -= 1;
        result
    }

    fn eval_all(&mut self, exprs: &[ExprIr]) -> EvalResult<Vec<Value>> {
        exprs.iter().map(|e| self.eval(e)).collect()
    }

    fn eval_entries(&mut self, entries: &[(String, ExprIr)]) -> EvalResult<Vec<(String, Value)>> {
        entries
            .iter()
            .map(|(k, e)| Ok((k.clone(), self.eval(e)?)))
            .collect()
    }

    fn eval_inner(&mut self, expr: &ExprIr) -> EvalResult {
        let value = match expr {
            ExprIr::Const(c) => match c {
                crate::ir::ConstIr::None => Value::None,
                crate::ir::ConstIr::Bool(b) => Value::Bool(*b),
                crate::ir::ConstIr::Int(n) => Value::Int(*n),
                crate::ir::ConstIr::Float(f) => Value::Float(*f),
                crate::ir::ConstIr::Str(s) => Value::Str(s.clone()),
            },
            ExprIr::List(items) => Value::List(self.eval_all(items)?),
            ExprIr::Dict(entries) => Value::Dict(self.eval_entries(entries)?.into_iter().collect()),
            ExprIr::Global { pkg, index } => self.global(*pkg, *index)?,
            ExprIr::Local(name) => self
                .locals
                .last()
                .and_then(|frame| frame.get(name))
                .cloned()
                .unwrap_or(Value::None),
            ExprIr::Schema {
                schema,
                entries,
                pos,
            } => {
                let entries = self.eval_entries(entries)?;
                self.instantiate(*schema, entries)
                    .map_err(|e| self.locate(e, *pos))?
            }
            ExprIr::Option(option) => self.option(option)?,
            ExprIr::Call {
                callee,
                args,
                kwargs,
            } => {
                let args = self.eval_all(args)?;
                let kwargs = self.eval_entries(kwargs)?;
                self.call(callee, args, kwargs)?
            }
            ExprIr::Method {
                receiver,
                name,
                args,
                kwargs,
            } => {
                let receiver = self.eval(receiver)?;
                let args = self.eval_all(args)?;
                let kwargs = self.eval_entries(kwargs)?;
                call_method(receiver, name, args, kwargs).map_err(RuntimeError::new)?
            }
            ExprIr::Member { value, attr } => {
                let value = self.eval(value)?;
                member(value, attr)?
            }
            ExprIr::Index { value, index } => {
                let value = self.eval(value)?;
                let index = self.eval(index)?;
                subscript(value, index)?
            }
            ExprIr::Unary { op, operand } => {
                let operand = self.eval(operand)?;
                operators::unary(*op, operand).map_err(RuntimeError::new)?
            }
            ExprIr::Binary { op, left, right } => {
                let left = self.eval(left)?;
                match op {
                    BinaryOp::And if !left.is_truthy() => left,
                    BinaryOp::Or if left.is_truthy() => left,
                    BinaryOp::And | BinaryOp::Or => self.eval(right)?,
                    _ => {
                        let right = self.eval(right)?;
                        operators::binary(*op, &left, &right, self.max_len)
                            .map_err(RuntimeError::new)?
                    }
                }
            }
            ExprIr::IfElse { cond, then, orelse } => {
                if self.eval(cond)?.is_truthy() {
                    self.eval(then)?
                } else {
                    self.eval(orelse)?
                }
            }
        };
        Ok(value)
    }

    fn call(&mut self, callee: &Callee, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> EvalResult {
        let result = match callee {
            Callee::Builtin(builtin) => call_builtin(
                *builtin,
                Args::new(builtin.name(), args, kwargs),
                &mut self.stdout,
                self.max_len,
            ),
            Callee::System { module, func } => call_system(
                *module,
                func,
                Args::new(format!("{}.{}", module.name(), func), args, kwargs),
                &mut self.regexes,
            ),
            Callee::Plugin { plugin, func } => self.plugins.call(plugin, func, &args, &kwargs),
        };
        result.map_err(RuntimeError::new)
    }

    fn option(&mut self, option: &OptionIr) -> EvalResult {
        if let Some(raw) = self.args.get(&option.name) {
            return coerce(&option.name, raw, option.ty.as_ref()).map_err(RuntimeError::new);
        }
        if let Some(default) = &option.default {
            let value = self.eval(default)?;
            return match &option.ty {
                Some(ty) => self.convert(value, ty),
                None => Ok(value),
            };
        }
        if option.required {
            let help = option
                .help
                .as_ref()
                .map(|h| format!(" ({})", h))
                .unwrap_or_default();
            return Err(RuntimeError::new(format!(
                "option '{}' is required but was not provided{}",
                option.name, help
            )));
        }
        Ok(Value::None)
    }

    fn schema(&self, id: SchemaId) -> EvalResult<&'p SchemaIr> {
        let program = self.program;
        program
            .schemas
            .get(id)
            .ok_or_else(|| RuntimeError::new(format!("unknown schema #{}", id)))
    }

    fn type_name(&self, ty: &TypeIr) -> String {
        ty.display(&self.program.schemas)
    }

    /// 创建 schema 实例：类型检查与转换、默认值、必填属性、check 块
    fn instantiate(&mut self, id: SchemaId, entries: Vec<(String, Value)>) -> EvalResult {
        let schema = self.schema(id)?;
        let mut given = Dict::new();
        for (key, value) in entries {
            let ty = match (schema.attr(&key), &schema.index_signature) {
                (Some(attr), _) => &attr.ty,
                (None, Some(index)) => &index.value,
                (None, None) => {
                    return Err(RuntimeError::new(format!(
                        "schema '{}' has no attribute '{}'",
                        schema.name, key
                    )))
                }
            };
            let value = self.convert(value, ty).map_err(|e| RuntimeError {
                message: format!("attribute '{}' of '{}': {}", key, schema.name, e.message),
                ..e
            })?;
            given.insert(key, value);
        }

        self.locals.push(given);
        let filled = self.fill_defaults(schema);
        let frame = self.locals.pop().unwrap_or_default();
        filled?;

        let mut declared: HashMap<String, Value> = HashMap::new();
        let mut extra = Vec::new();
        for (key, value) in frame.into_entries() {
            if schema.attr(&key).is_some() {
                declared.insert(key, value);
            } else {
                extra.push((key, value));
            }
        }
        let mut attrs = Dict::new();
        for attr in &schema.attrs {
            let value = declared.remove(&attr.name).unwrap_or(Value::None);
            if matches!(value, Value::None) && !attr.optional {
                return Err(RuntimeError::new(format!(
                    "attribute '{}' of '{}' is required and can't be None",
                    attr.name, schema.name
                )));
            }
            attrs.insert(attr.name.clone(), value);
        }
        for (key, value) in extra {
            attrs.insert(key, value);
        }

        self.locals.push(attrs);
        let checked = self.run_checks(schema);
        let attrs = self.locals.pop().unwrap_or_default();
        checked?;

        Ok(Value::Schema(SchemaValue {
            id,
            name: schema.name.clone(),
            attrs,
        }))
    }

    fn fill_defaults(&mut self, schema: &SchemaIr) -> EvalResult<()> {
        for attr in &schema.attrs {
            let present = self
                .locals
                .last()
                .is_some_and(|frame| frame.contains_key(&attr.name));
            if present {
                continue;
            }
            let Some(default) = &attr.default else {
                continue;
            };
            let value = self.eval(default)?;
            let value = self.convert(value, &attr.ty)?;
            if let Some(frame) = self.locals.last_mut() {
                frame.insert(attr.name.clone(), value);
            }
        }
        Ok(())
    }

    fn run_checks(&mut self, schema: &SchemaIr) -> EvalResult<()> {
        for check in &schema.checks {
            let passed = self.eval(&check.test).map_err(|e| self.locate(e, check.pos))?;
            if passed.is_truthy() {
                continue;
            }
            let message = match &check.msg {
                Some(msg) => {
                    let msg = self.eval(msg).map_err(|e| self.locate(e, check.pos))?;
                    format!("check failed for '{}': {}", schema.name, msg)
                }
                None => format!("check failed for '{}'", schema.name),
            };
            return Err(self.locate(RuntimeError::new(message), check.pos));
        }
        Ok(())
    }

    /// 把值转换为声明类型：int 提升为 float，字典实例化为 schema
    fn convert(&mut self, value: Value, ty: &TypeIr) -> EvalResult {
        let converted = match (value, ty) {
            (value, TypeIr::Any) => value,
            (Value::None, _) => Value::None,
            (value @ Value::Bool(_), TypeIr::Bool)
            | (value @ Value::Int(_), TypeIr::Int)
            | (value @ Value::Float(_), TypeIr::Float)
            | (value @ Value::Str(_), TypeIr::Str) => value,
            (Value::Int(n), TypeIr::Float) => Value::Float(n as f64),
            (Value::List(items), TypeIr::List(item_ty)) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.convert(item, item_ty)?);
                }
                Value::List(out)
            }
            (Value::Dict(dict), TypeIr::Dict(_, value_ty)) => {
                let mut out = Dict::new();
                for (key, value) in dict.into_entries() {
                    out.insert(key, self.convert(value, value_ty)?);
                }
                Value::Dict(out)
            }
            (value @ Value::Schema(_), TypeIr::Dict(..)) => value,
            (Value::Dict(dict), TypeIr::Schema(id)) => self.instantiate(*id, dict.into_entries())?,
            (Value::Schema(schema), TypeIr::Schema(id)) if schema.id == *id => Value::Schema(schema),
            (value, TypeIr::Union(types)) => {
                for candidate in types {
                    if let Ok(converted) = self.convert(value.clone(), candidate) {
                        return Ok(converted);
                    }
                }
                return Err(self.mismatch(&value, ty));
            }
            (value, ty) => return Err(self.mismatch(&value, ty)),
        };
        Ok(converted)
    }

    fn mismatch(&self, value: &Value, ty: &TypeIr) -> RuntimeError {
        RuntimeError::new(format!(
            "expected {}, got {}",
            self.type_name(ty),
            value.type_name()
        ))
    }
}

fn member(value: Value, attr: &str) -> EvalResult {
    match &value {
        Value::Dict(dict) => Ok(dict.get(attr).cloned().unwrap_or(Value::None)),
        Value::Schema(schema) => schema.attrs.get(attr).cloned().ok_or_else(|| {
            RuntimeError::new(format!("'{}' object has no attribute '{}'", schema.name, attr))
        }),
        other => Err(RuntimeError::new(format!(
            "'{}' object has no attribute '{}'",
            other.type_name(),
            attr
        ))),
    }
}

fn subscript(value: Value, index: Value) -> EvalResult {
    let position = |len: usize, n: i64| -> EvalResult<usize> {
        let resolved = if n < 0 { n + len as i64 } else { n };
        if resolved < 0 || resolved >= len as i64 {
            Err(RuntimeError::new(format!("index {} out of range", n)))
        } else {
            Ok(resolved as usize)
        }
    };
    match (&value, &index) {
        (Value::List(items), Value::Int(n)) => Ok(items[position(items.len(), *n)?].clone()),
        (Value::Str(s), Value::Int(n)) => {
            let chars: Vec<char> = s.chars().collect();
            Ok(Value::Str(chars[position(chars.len(), *n)?].to_string()))
        }
        (Value::Dict(_) | Value::Schema(_), Value::Str(key)) => Ok(value
            .as_dict()
            .and_then(|dict| dict.get(key))
            .cloned()
            .unwrap_or(Value::None)),
        _ => Err(RuntimeError::new(format!(
            "'{}' object is not subscriptable with '{}'",
            value.type_name(),
            index.type_name()
        ))),
    }
}
