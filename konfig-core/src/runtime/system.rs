//! 系统模块 `regex` 与 `math`

use super::builtins::Args;
use super::value::Value;
use crate::ir::SystemModule;
use regex::Regex;
use std::collections::HashMap;

/// 编译过的正则表达式缓存，每个求值器一份
#[derive(Default)]
pub struct RegexCache {
    compiled: HashMap<String, Regex>,
}

impl RegexCache {
    fn get(&mut self, pattern: &str) -> Result<&Regex, String> {
        if !self.compiled.contains_key(pattern) {
            let regex = Regex::new(pattern)
                .map_err(|e| format!("invalid regular expression '{}': {}", pattern, e))?;
            self.compiled.insert(pattern.to_string(), regex);
        }
        self.compiled
            .get(pattern)
            .ok_or_else(|| format!("regular expression '{}' was not cached", pattern))
    }
}

pub fn call_system(
    module: SystemModule,
    func: &str,
    mut args: Args,
    regexes: &mut RegexCache,
) -> Result<Value, String> {
    let result = match module {
        SystemModule::Regex => call_regex(func, &mut args, regexes)?,
        SystemModule::Math => call_math(func, &mut args)?,
    };
    args.finish()?;
    Ok(result)
}

fn call_regex(func: &str, args: &mut Args, regexes: &mut RegexCache) -> Result<Value, String> {
    let string = args.str(0, "string")?;
    let pattern = args.str(1, "pattern")?;
    let value = match func {
        // 只在字符串开头匹配
        "match" => Value::Bool(
            regexes
                .get(&pattern)?
                .find(&string)
                .is_some_and(|m| m.start() == 0),
        ),
        "search" => Value::Bool(regexes.get(&pattern)?.is_match(&string)),
        "replace" => {
            let replacement = args.str(2, "replace")?;
            let count = args.opt_int(3, "count", 0)?;
            let regex = regexes.get(&pattern)?;
            let limit = usize::try_from(count).unwrap_or(0);
            Value::Str(
                regex
                    .replacen(&string, limit, replacement.as_str())
                    .into_owned(),
            )
        }
        "findall" => Value::List(
            regexes
                .get(&pattern)?
                .find_iter(&string)
                .map(|m| Value::str(m.as_str()))
                .collect(),
        ),
        "split" => {
            let maxsplit = args.opt_int(2, "maxsplit", 0)?;
            let regex = regexes.get(&pattern)?;
            let parts: Vec<Value> = if maxsplit > 0 {
                regex
                    .splitn(&string, maxsplit as usize + 1)
                    .map(Value::str)
                    .collect()
            } else {
                regex.split(&string).map(Value::str).collect()
            };
            Value::List(parts)
        }
        _ => return Err(format!("module 'regex' has no function '{}'", func)),
    };
    Ok(value)
}

fn call_math(func: &str, args: &mut Args) -> Result<Value, String> {
    let x = args.number(0, "x")?;
    let value = match func {
        "ceil" => Value::Int(x.ceil() as i64),
        "floor" => Value::Int(x.floor() as i64),
        "sqrt" => {
            if x < 0.0 {
                return Err("math domain error".to_string());
            }
            Value::Float(x.sqrt())
        }
        "pow" => Value::Float(x.powf(args.number(1, "y")?)),
        "log" => {
            if x <= 0.0 {
                return Err("math domain error".to_string());
            }
            match args.take(1, "base") {
                None => Value::Float(x.ln()),
                Some(base) => {
                    let base = base
                        .as_f64()
                        .ok_or_else(|| args.type_error("base", "int or float", &base))?;
                    Value::Float(x.ln() / base.ln())
                }
            }
        }
        _ => return Err(format!("module 'math' has no function '{}'", func)),
    };
    Ok(value)
}
