//! 内置函数与字符串方法
//!
//! 原生函数统一返回 `Result<Value, String>`，错误位置由求值器补上。

use super::operators::{add_values, compare};
use super::value::Value;
use crate::ir::Builtin;

/// 调用参数：按位置或按关键字取值，取过的参数不会再被取到
pub struct Args {
    func: String,
    positional: Vec<Option<Value>>,
    kwargs: Vec<(String, Value)>,
}

impl Args {
    pub fn new(func: impl Into<String>, positional: Vec<Value>, kwargs: Vec<(String, Value)>) -> Self {
        Self {
            func: func.into(),
            positional: positional.into_iter().map(Some).collect(),
            kwargs,
        }
    }

    pub fn len(&self) -> usize {
        self.positional.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.kwargs.is_empty()
    }

    pub fn take(&mut self, index: usize, key: &str) -> Option<Value> {
        if let Some(at) = self.kwargs.iter().position(|(k, _)| k == key) {
            return Some(self.kwargs.remove(at).1);
        }
        self.positional.get_mut(index).and_then(Option::take)
    }

    pub fn required(&mut self, index: usize, key: &str) -> Result<Value, String> {
        self.take(index, key).ok_or_else(|| {
            format!(
                "{}() missing required argument '{}' (pos {})",
                self.func,
                key,
                index + 1
            )
        })
    }

    pub fn str(&mut self, index: usize, key: &str) -> Result<String, String> {
        match self.required(index, key)? {
            Value::Str(s) => Ok(s),
            other => Err(self.type_error(key, "str", &other)),
        }
    }

    pub fn opt_int(&mut self, index: usize, key: &str, default: i64) -> Result<i64, String> {
        match self.take(index, key) {
            None => Ok(default),
            Some(Value::Int(n)) => Ok(n),
            Some(other) => Err(self.type_error(key, "int", &other)),
        }
    }

    pub fn number(&mut self, index: usize, key: &str) -> Result<f64, String> {
        let value = self.required(index, key)?;
        value.as_f64().ok_or_else(|| self.type_error(key, "int or float", &value))
    }

    pub fn type_error(&self, key: &str, expected: &str, got: &Value) -> String {
        format!(
            "{}() argument '{}' must be {}, not {}",
            self.func,
            key,
            expected,
            got.type_name()
        )
    }

    /// 所有参数都已被取走，否则报告多余的参数
    pub fn finish(self) -> Result<(), String> {
        if let Some((key, _)) = self.kwargs.first() {
            return Err(format!(
                "{}() got an unexpected keyword argument '{}'",
                self.func, key
            ));
        }
        let extra = self.positional.iter().filter(|v| v.is_some()).count();
        if extra > 0 {
            let used = self.positional.len() - extra;
            return Err(format!(
                "{}() takes {} positional argument(s) but {} were given",
                self.func,
                used,
                self.positional.len()
            ));
        }
        Ok(())
    }

    fn rest(&mut self) -> Vec<Value> {
        self.positional.iter_mut().filter_map(Option::take).collect()
    }
}

/// `max_len` 限制 `range()` 产生的列表长度
pub fn call_builtin(
    builtin: Builtin,
    mut args: Args,
    stdout: &mut String,
    max_len: usize,
) -> Result<Value, String> {
    let result = match builtin {
        Builtin::Print => {
            let sep = match args.take(usize::MAX, "sep") {
                Some(Value::Str(s)) => s,
                Some(other) => return Err(args.type_error("sep", "str", &other)),
                None => " ".to_string(),
            };
            let end = match args.take(usize::MAX, "end") {
                Some(Value::Str(s)) => s,
                Some(other) => return Err(args.type_error("end", "str", &other)),
                None => "\n".to_string(),
            };
            let items: Vec<String> = args.rest().iter().map(Value::to_string).collect();
            stdout.push_str(&items.join(&sep));
            stdout.push_str(&end);
            Value::None
        }
        Builtin::Len => {
            let value = args.required(0, "x")?;
            let len = match &value {
                Value::Str(s) => s.chars().count(),
                Value::List(items) => items.len(),
                Value::Dict(_) | Value::Schema(_) => value.as_dict().map_or(0, |d| d.len()),
                other => return Err(format!("object of type '{}' has no len()", other.type_name())),
            };
            Value::Int(len as i64)
        }
        Builtin::Str => match args.take(0, "x") {
            Some(value) => Value::Str(value.to_string()),
            None => Value::str(""),
        },
        Builtin::Int => to_int(args.required(0, "x")?)?,
        Builtin::Float => to_float(args.required(0, "x")?)?,
        Builtin::Bool => Value::Bool(args.take(0, "x").is_some_and(|v| v.is_truthy())),
        Builtin::Typeof => Value::str(args.required(0, "x")?.type_name()),
        Builtin::Abs => match args.required(0, "x")? {
            Value::Int(n) => Value::Int(n.checked_abs().ok_or("integer overflow")?),
            Value::Float(f) => Value::Float(f.abs()),
            other => return Err(args.type_error("x", "int or float", &other)),
        },
        Builtin::Max | Builtin::Min => {
            let items = match args.len() {
                1 => iterable(args.required(0, "iterable")?)?,
                _ => args.rest(),
            };
            let want = if builtin == Builtin::Max {
                std::cmp::Ordering::Greater
            } else {
                std::cmp::Ordering::Less
            };
            let mut iter = items.into_iter();
            let mut best = iter
                .next()
                .ok_or_else(|| format!("{}() arg is an empty sequence", builtin.name()))?;
            for item in iter {
                if compare(&item, &best)? == want {
                    best = item;
                }
            }
            best
        }
        Builtin::Sum => {
            let items = iterable(args.required(0, "iterable")?)?;
            let mut total = args.take(1, "start").unwrap_or(Value::Int(0));
            for item in &items {
                total = add_values(&total, item)?;
            }
            total
        }
        Builtin::Sorted => {
            let mut items = iterable(args.required(0, "iterable")?)?;
            let reverse = args.take(1, "reverse").is_some_and(|v| v.is_truthy());
            let mut failure = None;
            items.sort_by(|a, b| {
                compare(a, b).unwrap_or_else(|e| {
                    failure.get_or_insert(e);
                    std::cmp::Ordering::Equal
                })
            });
            if let Some(err) = failure {
                return Err(err);
            }
            if reverse {
                items.reverse();
            }
            Value::List(items)
        }
        Builtin::Range => {
            let first = int_arg(&mut args, 0, "start")?;
            let (start, stop) = match args.take(1, "stop") {
                Some(stop) => (first, expect_int(&args, "stop", stop)?),
                None => (0, first),
            };
            let step = args.opt_int(2, "step", 1)?;
            if step == 0 {
                return Err("range() arg 3 must not be zero".to_string());
            }
            let span = i128::from(stop) - i128::from(start);
            let step_wide = i128::from(step);
            let count = if (span > 0) == (step_wide > 0) && span != 0 {
                (span + step_wide - step_wide.signum()) / step_wide
            } else {
                0
            };
            if count > max_len as i128 {
                return Err(format!("range() too large (limit {} items)", max_len));
            }
            let mut items = Vec::with_capacity(count as usize);
            let mut n = start;
            while (step > 0 && n < stop) || (step < 0 && n > stop) {
                items.push(Value::Int(n));
                n = match n.checked_add(step) {
                    Some(next) => next,
                    None => break,
                };
            }
            Value::List(items)
        }
    };
    args.finish()?;
    Ok(result)
}

fn int_arg(args: &mut Args, index: usize, key: &str) -> Result<i64, String> {
    let value = args.required(index, key)?;
    expect_int(args, key, value)
}

fn expect_int(args: &Args, key: &str, value: Value) -> Result<i64, String> {
    match value {
        Value::Int(n) => Ok(n),
        other => Err(args.type_error(key, "int", &other)),
    }
}

/// 可迭代对象的元素；字典迭代其键
fn iterable(value: Value) -> Result<Vec<Value>, String> {
    match value {
        Value::List(items) => Ok(items),
        Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
        Value::Dict(_) | Value::Schema(_) => Ok(value
            .as_dict()
            .map(|d| d.keys().map(|k| Value::str(k.as_str())).collect())
            .unwrap_or_default()),
        other => Err(format!("'{}' object is not iterable", other.type_name())),
    }
}

pub fn to_int(value: Value) -> Result<Value, String> {
    match value {
        Value::Int(n) => Ok(Value::Int(n)),
        Value::Bool(b) => Ok(Value::Int(b as i64)),
        Value::Float(f) if f.is_finite() => Ok(Value::Int(f.trunc() as i64)),
        Value::Str(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| format!("invalid literal for int(): '{}'", s)),
        other => Err(format!("int() argument must be a string or a number, not '{}'", other.type_name())),
    }
}

pub fn to_float(value: Value) -> Result<Value, String> {
    match value {
        Value::Float(f) => Ok(Value::Float(f)),
        Value::Int(n) => Ok(Value::Float(n as f64)),
        Value::Bool(b) => Ok(Value::Float(if b { 1.0 } else { 0.0 })),
        Value::Str(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| format!("could not convert string to float: '{}'", s)),
        other => Err(format!("float() argument must be a string or a number, not '{}'", other.type_name())),
    }
}

/// 值上的方法调用，目前只有字符串方法
pub fn call_method(receiver: Value, name: &str, positional: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    let Value::Str(s) = receiver else {
        return Err(format!(
            "'{}' object has no attribute '{}'",
            receiver.type_name(),
            name
        ));
    };
    let mut args = Args::new(format!("str.{}", name), positional, kwargs);

    let result = match name {
        "upper" => Value::Str(s.to_uppercase()),
        "lower" => Value::Str(s.to_lowercase()),
        "strip" | "lstrip" | "rstrip" => {
            let chars: Option<Vec<char>> = match args.take(0, "chars") {
                Some(Value::Str(c)) => Some(c.chars().collect()),
                Some(Value::None) | None => None,
                Some(other) => return Err(args.type_error("chars", "str", &other)),
            };
            let matches = |c: char| match &chars {
                Some(set) => set.contains(&c),
                None => c.is_whitespace(),
            };
            let out = match name {
                "strip" => s.trim_matches(matches),
                "lstrip" => s.trim_start_matches(matches),
                _ => s.trim_end_matches(matches),
            };
            Value::str(out)
        }
        "startswith" => Value::Bool(s.starts_with(args.str(0, "prefix")?.as_str())),
        "endswith" => Value::Bool(s.ends_with(args.str(0, "suffix")?.as_str())),
        "find" => {
            let sub = args.str(0, "sub")?;
            let found = s
                .find(sub.as_str())
                .map(|byte| s[..byte].chars().count() as i64)
                .unwrap_or(-1);
            Value::Int(found)
        }
        "replace" => {
            let old = args.str(0, "old")?;
            let new = args.str(1, "new")?;
            let count = args.opt_int(2, "count", -1)?;
            if count < 0 {
                Value::Str(s.replace(old.as_str(), &new))
            } else {
                Value::Str(s.replacen(old.as_str(), &new, count as usize))
            }
        }
        "split" => {
            let sep = match args.take(0, "sep") {
                Some(Value::Str(sep)) if sep.is_empty() => return Err("empty separator".to_string()),
                Some(Value::Str(sep)) => Some(sep),
                Some(Value::None) | None => None,
                Some(other) => return Err(args.type_error("sep", "str", &other)),
            };
            let parts: Vec<Value> = match &sep {
                Some(sep) => s.split(sep.as_str()).map(Value::str).collect(),
                None => s.split_whitespace().map(Value::str).collect(),
            };
            Value::List(parts)
        }
        "join" => {
            let items = match args.required(0, "iterable")? {
                Value::List(items) => items,
                other => return Err(args.type_error("iterable", "list", &other)),
            };
            let mut parts = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::Str(part) => parts.push(part),
                    other => {
                        return Err(format!(
                            "sequence item: expected str instance, {} found",
                            other.type_name()
                        ))
                    }
                }
            }
            Value::Str(parts.join(&s))
        }
        "format" => {
            let positional = args.rest();
            let named = std::mem::take(&mut args.kwargs);
            Value::Str(format_string(&s, &positional, &named)?)
        }
        _ => return Err(format!("'str' object has no attribute '{}'", name)),
    };
    args.finish()?;
    Ok(result)
}

/// `"{} {0} {name}".format(...)`，`{{` 与 `}}` 转义花括号
fn format_string(template: &str, positional: &[Value], named: &[(String, Value)]) -> Result<String, String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    let mut next_auto = 0;
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut field = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => field.push(ch),
                        None => return Err("single '{' encountered in format string".to_string()),
                    }
                }
                let value = if field.is_empty() {
                    let value = positional.get(next_auto);
                    next_auto += 1;
                    value
                } else if let Ok(index) = field.parse::<usize>() {
                    positional.get(index)
                } else {
                    named.iter().find(|(k, _)| *k == field).map(|(_, v)| v)
                };
                let value = value.ok_or_else(|| format!("format field '{{{}}}' has no value", field))?;
                out.push_str(&value.to_string());
            }
            '}' => return Err("single '}' encountered in format string".to_string()),
            c => out.push(c),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(builtin: Builtin, args: Vec<Value>) -> Result<Value, String> {
        let mut stdout = String::new();
        call_builtin(builtin, Args::new(builtin.name(), args, vec![]), &mut stdout, 1024)
    }

    fn method(s: &str, name: &str, args: Vec<Value>) -> Result<Value, String> {
        call_method(Value::str(s), name, args, vec![])
    }

    fn ints(values: &[i64]) -> Value {
        Value::List(values.iter().map(|n| Value::Int(*n)).collect())
    }

    #[test]
    fn test_print_captures_output() {
        let mut stdout = String::new();
        let args = Args::new(
            "print",
            vec![Value::str("a"), Value::Int(1)],
            vec![("sep".to_string(), Value::str("-"))],
        );
        call_builtin(Builtin::Print, args, &mut stdout, 1024).unwrap();
        assert_eq!(stdout, "a-1\n");
    }

    #[test]
    fn test_numeric_builtins() {
        assert_eq!(call(Builtin::Len, vec![Value::str("héllo")]).unwrap(), Value::Int(5));
        assert_eq!(call(Builtin::Int, vec![Value::str(" 42 ")]).unwrap(), Value::Int(42));
        assert_eq!(call(Builtin::Int, vec![Value::Float(-2.7)]).unwrap(), Value::Int(-2));
        assert_eq!(call(Builtin::Float, vec![Value::Int(2)]).unwrap(), Value::Float(2.0));
        assert_eq!(call(Builtin::Max, vec![ints(&[3, 9, 2])]).unwrap(), Value::Int(9));
        assert_eq!(call(Builtin::Min, vec![Value::Int(4), Value::Int(-1)]).unwrap(), Value::Int(-1));
        assert_eq!(call(Builtin::Sum, vec![ints(&[1, 2, 3])]).unwrap(), Value::Int(6));
        assert_eq!(call(Builtin::Sorted, vec![ints(&[3, 1, 2])]).unwrap(), ints(&[1, 2, 3]));
        assert_eq!(call(Builtin::Range, vec![Value::Int(3)]).unwrap(), ints(&[0, 1, 2]));
        assert_eq!(
            call(Builtin::Range, vec![Value::Int(5), Value::Int(0), Value::Int(-2)]).unwrap(),
            ints(&[5, 3, 1])
        );
        assert_eq!(call(Builtin::Typeof, vec![Value::None]).unwrap(), Value::str("None"));
    }

    #[test]
    fn test_builtin_errors() {
        assert!(call(Builtin::Int, vec![Value::str("abc")])
            .unwrap_err()
            .contains("invalid literal for int()"));
        assert!(call(Builtin::Max, vec![ints(&[])]).is_err());
        match call(Builtin::Range, vec![Value::Int(1024)]).unwrap() {
            Value::List(items) => assert_eq!(items.len(), 1024),
            other => panic!("expected a list, got {other:?}"),
        }
        assert!(call(Builtin::Range, vec![Value::Int(1025)])
            .unwrap_err()
            .starts_with("range() too large"));
        assert!(call(Builtin::Range, vec![Value::Int(i64::MIN), Value::Int(i64::MAX)])
            .unwrap_err()
            .starts_with("range() too large"));
        assert!(call(Builtin::Sorted, vec![Value::List(vec![Value::Int(1), Value::str("a")])]).is_err());
        assert!(call(Builtin::Len, vec![Value::Int(1), Value::Int(2)])
            .unwrap_err()
            .contains("takes 1 positional argument"));
    }

    #[test]
    fn test_string_methods() {
        assert_eq!(method("Abc", "upper", vec![]).unwrap(), Value::str("ABC"));
        assert_eq!(method("  x ", "strip", vec![]).unwrap(), Value::str("x"));
        assert_eq!(method("xxaxx", "lstrip", vec![Value::str("x")]).unwrap(), Value::str("axx"));
        assert_eq!(method("abc", "startswith", vec![Value::str("ab")]).unwrap(), Value::Bool(true));
        assert_eq!(
            method("a-b-c", "replace", vec![Value::str("-"), Value::str("+")]).unwrap(),
            Value::str("a+b+c")
        );
        assert_eq!(
            method("a,b", "split", vec![Value::str(",")]).unwrap(),
            Value::List(vec![Value::str("a"), Value::str("b")])
        );
        assert_eq!(
            method("-", "join", vec![Value::List(vec![Value::str("a"), Value::str("b")])]).unwrap(),
            Value::str("a-b")
        );
        assert_eq!(method("hello", "find", vec![Value::str("l")]).unwrap(), Value::Int(2));
    }

    #[test]
    fn test_format() {
        let out = call_method(
            Value::str("{} {1} {name} {{x}}"),
            "format",
            vec![Value::str("a"), Value::Int(2)],
            vec![("name".to_string(), Value::Bool(true))],
        )
        .unwrap();
        assert_eq!(out, Value::str("a 2 True {x}"));
        assert!(method("{", "format", vec![]).is_err());
    }

    #[test]
    fn test_method_on_non_string() {
        let err = call_method(Value::Int(1), "upper", vec![], vec![]).unwrap_err();
        assert_eq!(err, "'int' object has no attribute 'upper'");
    }
}
