//! 结果编码
//!
//! JSON 使用 `", "` 与 `": "` 作为分隔符（`{"foo": 42}`），YAML 使用
//! serde_yaml 的默认格式。

use super::value::{Dict, Value};
use serde::Serialize;
use serde_json::ser::Formatter;
use std::io;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputOptions {
    /// 去掉值为 None 的字典项
    pub disable_none: bool,
    /// 字典键按字典序排列
    pub sort_keys: bool,
}

/// 按输出选项整理结果；schema 实例变成普通字典
pub fn prepare(value: Value, options: OutputOptions) -> Value {
    match value {
        Value::List(items) => Value::List(
            items
                .into_iter()
                .map(|item| prepare(item, options))
                .collect(),
        ),
        Value::Dict(dict) => Value::Dict(prepare_dict(dict, options)),
        Value::Schema(schema) => Value::Dict(prepare_dict(schema.attrs, options)),
        other => other,
    }
}

fn prepare_dict(dict: Dict, options: OutputOptions) -> Dict {
    let mut entries: Vec<(String, Value)> = dict
        .into_entries()
        .into_iter()
        .filter(|(_, v)| !(options.disable_none && matches!(v, Value::None)))
        .map(|(k, v)| (k, prepare(v, options)))
        .collect();
    if options.sort_keys {
        entries.sort_by(|a, b| a.0.cmp(&b.0));
    }
    entries.into_iter().collect()
}

/// 带空格分隔符的紧凑格式
struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }
}

pub fn to_json(value: &Value) -> Result<String, String> {
    let mut serializer = serde_json::Serializer::with_formatter(Vec::new(), SpacedFormatter);
    value
        .serialize(&mut serializer)
        .map_err(|e| format!("failed to encode JSON result: {}", e))?;
    String::from_utf8(serializer.into_inner()).map_err(|e| format!("JSON result is not UTF-8: {}", e))
}

pub fn to_yaml(value: &Value) -> Result<String, String> {
    serde_yaml::to_string(value).map_err(|e| format!("failed to encode YAML result: {}", e))
}
