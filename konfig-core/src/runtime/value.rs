//! 运行时值
//!
//! 值是纯数据，可以跨线程传递。字典保持插入顺序，输出 JSON 时
//! 键的顺序即声明顺序。

use crate::ir::SchemaId;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Dict(Dict),
    Schema(SchemaValue),
}

/// schema 实例：属性按 schema 声明顺序排列，索引签名的额外键在后
#[derive(Debug, Clone)]
pub struct SchemaValue {
    pub id: SchemaId,
    pub name: String,
    pub attrs: Dict,
}

/// 保持插入顺序的字典
#[derive(Debug, Clone, Default)]
pub struct Dict {
    entries: Vec<(String, Value)>,
    index: HashMap<String, usize>,
}

impl Dict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// 已存在的键原地覆盖，不改变顺序
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        match self.index.get(&key) {
            Some(&i) => self.entries[i].1 = value,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn into_entries(self) -> Vec<(String, Value)> {
        self.entries
    }
}

impl FromIterator<(String, Value)> for Dict {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut dict = Dict::new();
        for (k, v) in iter {
            dict.insert(k, v);
        }
        dict
    }
}

impl PartialEq for Dict {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(k, v)| other.get(k).is_some_and(|o| o == v))
    }
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    pub fn type_name(&self) -> &str {
        match self {
            Value::None => "None",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Dict(_) => "dict",
            Value::Schema(s) => &s.name,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Dict(dict) => !dict.is_empty(),
            Value::Schema(_) => true,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// 字典与 schema 实例共用的属性视图
    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            Value::Dict(dict) => Some(dict),
            Value::Schema(schema) => Some(&schema.attrs),
            _ => None,
        }
    }

    /// `str()` 中嵌套元素的表示：字符串带引号
    pub fn repr(&self) -> String {
        match self {
            Value::Str(s) => format!("'{}'", s.replace('\'', "\\'")),
            other => other.to_string(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                self.as_f64() == other.as_f64()
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (a, b) => match (a.as_dict(), b.as_dict()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

pub(crate) fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{:.1}", f)
    } else {
        f.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{}", format_float(*x)),
            Value::Str(s) => write!(f, "{}", s),
            Value::List(items) => {
                let items: Vec<String> = items.iter().map(Value::repr).collect();
                write!(f, "[{}]", items.join(", "))
            }
            Value::Dict(dict) => write_dict(f, dict),
            Value::Schema(schema) => {
                write!(f, "{}", schema.name)?;
                write_dict(f, &schema.attrs)
            }
        }
    }
}

fn write_dict(f: &mut fmt::Formatter<'_>, dict: &Dict) -> fmt::Result {
    let entries: Vec<String> = dict
        .iter()
        .map(|(k, v)| format!("'{}': {}", k, v.repr()))
        .collect();
    write!(f, "{{{}}}", entries.join(", "))
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::None => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(n) => serializer.serialize_i64(*n),
            Value::Float(x) => serializer.serialize_f64(*x),
            Value::Str(s) => serializer.serialize_str(s),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Dict(dict) | Value::Schema(SchemaValue { attrs: dict, .. }) => {
                let mut map = serializer.serialize_map(Some(dict.len()))?;
                for (k, v) in dict.iter() {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::None,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Dict(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dict_keeps_insertion_order() {
        let mut dict = Dict::new();
        dict.insert("b", Value::Int(1));
        dict.insert("a", Value::Int(2));
        dict.insert("b", Value::Int(3));
        let keys: Vec<&String> = dict.keys().collect();
        assert_eq!(keys, ["b", "a"]);
        assert_eq!(dict.get("b"), Some(&Value::Int(3)));
    }

    #[test]
    fn test_numeric_equality() {
        assert_eq!(Value::Int(1), Value::Float(1.0));
        assert_ne!(Value::Int(1), Value::Str("1".into()));
        assert_ne!(Value::Bool(true), Value::Int(1));
    }

    #[test]
    fn test_display() {
        let list = Value::List(vec![Value::Int(1), Value::str("a"), Value::None]);
        assert_eq!(list.to_string(), "[1, 'a', None]");
        assert_eq!(Value::Float(2.0).to_string(), "2.0");
        assert_eq!(Value::Float(0.5).to_string(), "0.5");

        let dict: Dict = [("k".to_string(), Value::Bool(true))].into_iter().collect();
        assert_eq!(Value::Dict(dict).to_string(), "{'k': True}");
    }

    #[test]
    fn test_serialize() {
        let dict: Dict = [
            ("z".to_string(), Value::Int(1)),
            ("a".to_string(), Value::List(vec![Value::Float(1.5), Value::None])),
        ]
        .into_iter()
        .collect();
        let json = serde_json::to_string(&Value::Dict(dict)).unwrap();
        assert_eq!(json, r#"{"z":1,"a":[1.5,null]}"#);
    }

    #[test]
    fn test_from_json() {
        let value = Value::from(serde_json::json!({"a": [1, 2.5, "x"], "b": null}));
        let dict = value.as_dict().unwrap();
        assert_eq!(
            dict.get("a"),
            Some(&Value::List(vec![Value::Int(1), Value::Float(2.5), Value::str("x")]))
        );
        assert_eq!(dict.get("b"), Some(&Value::None));
    }
}
