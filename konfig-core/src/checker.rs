//! 静态检查
//!
//! 只检查字面量：带类型注解的绑定、schema 属性默认值、schema 字面量中的
//! 键和值。非字面量表达式留给运行时检查。

use crate::error::CompileError;
use crate::ir::{ConstIr, ExprIr, Pos, Program, SchemaId, SchemaIr, TypeIr};
use crate::lexer::Coordinate;
use konfig_config::Phase;

pub fn check_program(program: &Program, files: &[String]) -> Result<(), CompileError> {
    let checker = Checker {
        schemas: &program.schemas,
        files,
    };

    for package in &program.packages {
        for binding in &package.bindings {
            if let Some(ty) = &binding.ty {
                checker.value(&binding.value, ty).map_err(|message| {
                    checker.error(
                        binding.pos,
                        format!("type mismatch for '{}': {}", binding.name, message),
                    )
                })?;
            }
            checker.literals(&binding.value, binding.pos)?;
        }
        for item in &package.items {
            match item {
                crate::ir::ItemIr::Binding(_) => {}
                crate::ir::ItemIr::Assert { test, pos, .. } => checker.literals(test, *pos)?,
                crate::ir::ItemIr::Expr { value, pos } => checker.literals(value, *pos)?,
            }
        }
    }

    for schema in &program.schemas {
        for attr in &schema.attrs {
            let Some(default) = &attr.default else {
                continue;
            };
            // 默认值没有独立的位置，报告在第一个 check 或文件开头
            let pos = schema.checks.first().map(|c| c.pos).unwrap_or_default();
            checker.value(default, &attr.ty).map_err(|message| {
                checker.error(
                    pos,
                    format!(
                        "invalid default for '{}.{}': {}",
                        schema.name, attr.name, message
                    ),
                )
            })?;
            checker.literals(default, pos)?;
        }
    }
    Ok(())
}

struct Checker<'a> {
    schemas: &'a [SchemaIr],
    files: &'a [String],
}

impl Checker<'_> {
    fn error(&self, pos: Pos, message: String) -> CompileError {
        let file = self
            .files
            .get(pos.file as usize)
            .cloned()
            .unwrap_or_else(|| "<unknown>".to_string());
        CompileError::new(
            Phase::Checker,
            file,
            Coordinate {
                line: pos.line as usize,
                column: pos.column as usize,
            },
            message,
        )
    }

    fn type_name(&self, ty: &TypeIr) -> String {
        ty.display(self.schemas)
    }

    /// 检查表达式中出现的所有 schema 字面量
    fn literals(&self, expr: &ExprIr, outer: Pos) -> Result<(), CompileError> {
        let mut result = Ok(());
        expr.walk(&mut |e| {
            if result.is_err() {
                return;
            }
            if let ExprIr::Schema {
                schema,
                entries,
                pos,
            } = e
            {
                let pos = if pos.line > 0 { *pos } else { outer };
                result = self
                    .schema_entries(*schema, entries)
                    .map_err(|message| self.error(pos, message));
            }
        });
        result
    }

    fn schema_entries(&self, id: SchemaId, entries: &[(String, ExprIr)]) -> Result<(), String> {
        let Some(schema) = self.schemas.get(id) else {
            return Err(format!("unknown schema #{}", id));
        };
        for (key, value) in entries {
            let ty = match (schema.attr(key), &schema.index_signature) {
                (Some(attr), _) => &attr.ty,
                (None, Some(index)) => &index.value,
                (None, None) => {
                    return Err(format!(
                        "schema '{}' has no attribute '{}'",
                        schema.name, key
                    ))
                }
            };
            self.value(value, ty)
                .map_err(|message| format!("attribute '{}' of '{}': {}", key, schema.name, message))?;
        }
        Ok(())
    }

    /// 字面量与声明类型是否相容
    fn value(&self, expr: &ExprIr, ty: &TypeIr) -> Result<(), String> {
        match (expr, ty) {
            (_, TypeIr::Any) | (ExprIr::Const(ConstIr::None), _) => Ok(()),
            (_, TypeIr::Union(types)) => {
                if types.iter().any(|t| self.value(expr, t).is_ok()) {
                    Ok(())
                } else {
                    Err(self.mismatch(expr, ty))
                }
            }
            (ExprIr::Const(value), _) => {
                let ok = matches!(
                    (value, ty),
                    (ConstIr::Bool(_), TypeIr::Bool)
                        | (ConstIr::Int(_), TypeIr::Int | TypeIr::Float)
                        | (ConstIr::Float(_), TypeIr::Float)
                        | (ConstIr::Str(_), TypeIr::Str)
                );
                if ok {
                    Ok(())
                } else {
                    Err(self.mismatch(expr, ty))
                }
            }
            (ExprIr::List(items), TypeIr::List(item)) => {
                items.iter().try_for_each(|value| self.value(value, item))
            }
            (ExprIr::Dict(entries), TypeIr::Dict(_, value)) => entries
                .iter()
                .try_for_each(|(_, v)| self.value(v, value)),
            (ExprIr::Dict(entries), TypeIr::Schema(id)) => self.schema_entries(*id, entries),
            (ExprIr::Schema { schema, .. }, TypeIr::Schema(id)) if schema == id => Ok(()),
            (ExprIr::Schema { .. }, TypeIr::Dict(..)) => Ok(()),
            (ExprIr::List(_) | ExprIr::Dict(_) | ExprIr::Schema { .. }, _) => {
                Err(self.mismatch(expr, ty))
            }
            _ => Ok(()),
        }
    }

    fn mismatch(&self, expr: &ExprIr, ty: &TypeIr) -> String {
        let got = match expr {
            ExprIr::Const(ConstIr::None) => "None".to_string(),
            ExprIr::Const(ConstIr::Bool(_)) => "bool".to_string(),
            ExprIr::Const(ConstIr::Int(_)) => "int".to_string(),
            ExprIr::Const(ConstIr::Float(_)) => "float".to_string(),
            ExprIr::Const(ConstIr::Str(s)) => format!("str({})", s),
            ExprIr::List(_) => "list".to_string(),
            ExprIr::Dict(_) => "dict".to_string(),
            ExprIr::Schema { schema, .. } => self.type_name(&TypeIr::Schema(*schema)),
            _ => "expression".to_string(),
        };
        format!("expected {}, got {}", self.type_name(ty), got)
    }
}
