//! `option()` 参数
//!
//! 运行参数都是字符串。有期望类型时按类型转换；没有时按字面量解析
//! （整数、浮点、布尔、None、JSON 列表或字典），都不匹配则保留字符串。

use super::value::Value;
use crate::ir::TypeIr;
use std::collections::HashMap;

/// 一次执行的命名参数
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionArgs {
    values: HashMap<String, String>,
}

impl OptionArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// 同名参数以后出现的为准
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

pub fn coerce(name: &str, raw: &str, ty: Option<&TypeIr>) -> Result<Value, String> {
    let fail = |expected: &str| {
        format!(
            "option '{}': cannot convert '{}' to {}",
            name, raw, expected
        )
    };
    let trimmed = raw.trim();
    match ty {
        Some(TypeIr::Str) => Ok(Value::str(raw)),
        Some(TypeIr::Int) => trimmed.parse().map(Value::Int).map_err(|_| fail("int")),
        Some(TypeIr::Float) => trimmed
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| fail("float")),
        Some(TypeIr::Bool) => match trimmed {
            "True" | "true" => Ok(Value::Bool(true)),
            "False" | "false" => Ok(Value::Bool(false)),
            _ => Err(fail("bool")),
        },
        Some(TypeIr::List(_)) => match parse_json(trimmed) {
            Some(value @ Value::List(_)) => Ok(value),
            _ => Err(fail("list")),
        },
        Some(TypeIr::Dict(..)) => match parse_json(trimmed) {
            Some(value @ Value::Dict(_)) => Ok(value),
            _ => Err(fail("dict")),
        },
        _ => Ok(parse_literal(raw)),
    }
}

fn parse_json(raw: &str) -> Option<Value> {
    serde_json::from_str::<serde_json::Value>(raw)
        .ok()
        .map(Value::from)
}

/// 无类型参数的字面量解析
pub fn parse_literal(raw: &str) -> Value {
    let trimmed = raw.trim();
    if let Ok(n) = trimmed.parse::<i64>() {
        return Value::Int(n);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        if f.is_finite() {
            return Value::Float(f);
        }
    }
    match trimmed {
        "True" | "true" => return Value::Bool(true),
        "False" | "false" => return Value::Bool(false),
        "None" | "null" => return Value::None,
        _ => {}
    }
    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        if let Some(value) = parse_json(trimmed) {
            return value;
        }
    }
    Value::str(raw)
}
