//! 运算符实现
//!
//! 语义与 Python 一致：整数运算溢出报错，`/` 总是返回浮点数，
//! `//` 与 `%` 向下取整。`and`/`or` 需要短路，由求值器处理。
//! 重复（`"ab" * n`、`[1] * n`）的结果长度不能超过 `max_len`。

use super::value::{Dict, Value};
use crate::parser::ast::{BinaryOp, UnaryOp};
use std::cmp::Ordering;

pub fn unary(op: UnaryOp, value: Value) -> Result<Value, String> {
    match (op, value) {
        (UnaryOp::Not, v) => Ok(Value::Bool(!v.is_truthy())),
        (UnaryOp::Plus, v @ (Value::Int(_) | Value::Float(_))) => Ok(v),
        (UnaryOp::Neg, Value::Int(n)) => n.checked_neg().map(Value::Int).ok_or_else(overflow),
        (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (op, v) => Err(format!(
            "bad operand type for unary {}: '{}'",
            match op {
                UnaryOp::Neg => "-",
                UnaryOp::Plus => "+",
                UnaryOp::Not => "not",
            },
            v.type_name()
        )),
    }
}

pub fn binary(op: BinaryOp, a: &Value, b: &Value, max_len: usize) -> Result<Value, String> {
    match op {
        BinaryOp::Add => add_values(a, b),
        BinaryOp::Sub => arith(op, a, b, i64::checked_sub, |x, y| x - y),
        BinaryOp::Mul => mul_values(a, b, max_len),
        BinaryOp::Div => div_values(a, b),
        BinaryOp::FloorDiv => floor_div_values(a, b),
        BinaryOp::Mod => mod_values(a, b),
        BinaryOp::Eq => Ok(Value::Bool(a == b)),
        BinaryOp::NotEq => Ok(Value::Bool(a != b)),
        BinaryOp::Lt => ordering(op, a, b).map(|o| Value::Bool(o == Ordering::Less)),
        BinaryOp::LtE => ordering(op, a, b).map(|o| Value::Bool(o != Ordering::Greater)),
        BinaryOp::Gt => ordering(op, a, b).map(|o| Value::Bool(o == Ordering::Greater)),
        BinaryOp::GtE => ordering(op, a, b).map(|o| Value::Bool(o != Ordering::Less)),
        BinaryOp::In => contains(a, b).map(Value::Bool),
        BinaryOp::NotIn => contains(a, b).map(|found| Value::Bool(!found)),
        BinaryOp::And | BinaryOp::Or => {
            Err(format!("operator '{}' must be short-circuited", op.symbol()))
        }
    }
}

fn overflow() -> String {
    "integer overflow".to_string()
}

fn unsupported(op: BinaryOp, a: &Value, b: &Value) -> String {
    format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        op.symbol(),
        a.type_name(),
        b.type_name()
    )
}

fn arith(
    op: BinaryOp,
    a: &Value,
    b: &Value,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value, String> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => int_op(*x, *y).map(Value::Int).ok_or_else(overflow),
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => Ok(Value::Float(float_op(x, y))),
            _ => Err(unsupported(op, a, b)),
        },
    }
}

/// 加法：数值、字符串拼接、列表拼接、字典合并（右侧覆盖）
pub fn add_values(a: &Value, b: &Value) -> Result<Value, String> {
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => Ok(Value::Str(format!("{x}{y}"))),
        (Value::List(x), Value::List(y)) => Ok(Value::List(x.iter().chain(y).cloned().collect())),
        (Value::Dict(x), Value::Dict(y)) => {
            let mut merged: Dict = x.clone();
            for (k, v) in y.iter() {
                merged.insert(k.clone(), v.clone());
            }
            Ok(Value::Dict(merged))
        }
        _ => arith(BinaryOp::Add, a, b, i64::checked_add, |x, y| x + y),
    }
}

/// 重复次数；负数按 0 处理
fn repeat_count(len: usize, times: i64, max_len: usize) -> Result<usize, String> {
    let times = usize::try_from(times).unwrap_or(0);
    match len.checked_mul(times) {
        Some(total) if total <= max_len => Ok(times),
        _ => Err(format!("repetition too large (limit {} items)", max_len)),
    }
}

pub fn mul_values(a: &Value, b: &Value, max_len: usize) -> Result<Value, String> {
    match (a, b) {
        (Value::Str(s), Value::Int(n)) | (Value::Int(n), Value::Str(s)) => {
            let times = repeat_count(s.len(), *n, max_len)?;
            Ok(Value::Str(s.repeat(times)))
        }
        (Value::List(items), Value::Int(n)) | (Value::Int(n), Value::List(items)) => {
            let times = repeat_count(items.len(), *n, max_len)?;
            let mut out = Vec::with_capacity(items.len() * times);
            for _ in 0..times {
                out.extend_from_slice(items);
            }
            Ok(Value::List(out))
        }
        _ => arith(BinaryOp::Mul, a, b, i64::checked_mul, |x, y| x * y),
    }
}

fn numbers(op: BinaryOp, a: &Value, b: &Value) -> Result<(f64, f64), String> {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => {
            if y == 0.0 {
                Err("division by zero".to_string())
            } else {
                Ok((x, y))
            }
        }
        _ => Err(unsupported(op, a, b)),
    }
}

pub fn div_values(a: &Value, b: &Value) -> Result<Value, String> {
    let (x, y) = numbers(BinaryOp::Div, a, b)?;
    Ok(Value::Float(x / y))
}

pub fn floor_div_values(a: &Value, b: &Value) -> Result<Value, String> {
    if let (Value::Int(x), Value::Int(y)) = (a, b) {
        if *y == 0 {
            return Err("integer division by zero".to_string());
        }
        let q = x.checked_div(*y).ok_or_else(overflow)?;
        let floored = if x % y != 0 && ((*x < 0) != (*y < 0)) { q - 1 } else { q };
        return Ok(Value::Int(floored));
    }
    let (x, y) = numbers(BinaryOp::FloorDiv, a, b)?;
    Ok(Value::Float((x / y).floor()))
}

pub fn mod_values(a: &Value, b: &Value) -> Result<Value, String> {
    if let (Value::Int(x), Value::Int(y)) = (a, b) {
        if *y == 0 {
            return Err("integer modulo by zero".to_string());
        }
        let r = x.checked_rem(*y).ok_or_else(overflow)?;
        let r = if r != 0 && ((r < 0) != (*y < 0)) { r + y } else { r };
        return Ok(Value::Int(r));
    }
    let (x, y) = numbers(BinaryOp::Mod, a, b)?;
    let r = x % y;
    Ok(Value::Float(if r != 0.0 && ((r < 0.0) != (y < 0.0)) { r + y } else { r }))
}

fn ordering(op: BinaryOp, a: &Value, b: &Value) -> Result<Ordering, String> {
    compare(a, b).map_err(|_| {
        format!(
            "'{}' not supported between instances of '{}' and '{}'",
            op.symbol(),
            a.type_name(),
            b.type_name()
        )
    })
}

/// 可排序值之间的全序（`sorted`、`max`、`min` 共用）
pub fn compare(a: &Value, b: &Value) -> Result<Ordering, String> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Ok(x.cmp(y)),
        (Value::Str(x), Value::Str(y)) => Ok(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Ok(x.cmp(y)),
        (Value::List(x), Value::List(y)) => {
            for (l, r) in x.iter().zip(y) {
                match compare(l, r)? {
                    Ordering::Equal => continue,
                    other => return Ok(other),
                }
            }
            Ok(x.len().cmp(&y.len()))
        }
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x
                .partial_cmp(&y)
                .ok_or_else(|| "cannot compare NaN".to_string()),
            _ => Err(format!(
                "cannot compare '{}' with '{}'",
                a.type_name(),
                b.type_name()
            )),
        },
    }
}

fn contains(item: &Value, container: &Value) -> Result<bool, String> {
    match (item, container) {
        (_, Value::List(items)) => Ok(items.contains(item)),
        (Value::Str(key), Value::Dict(_) | Value::Schema(_)) => Ok(container
            .as_dict()
            .is_some_and(|dict| dict.contains_key(key))),
        (Value::Str(needle), Value::Str(haystack)) => Ok(haystack.contains(needle.as_str())),
        _ => Err(format!(
            "argument of type '{}' is not iterable with '{}'",
            container.type_name(),
            item.type_name()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX_LEN: usize = 1024;

    fn int(n: i64) -> Value {
        Value::Int(n)
    }

    fn op(op: BinaryOp, a: &Value, b: &Value) -> Result<Value, String> {
        binary(op, a, b, MAX_LEN)
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(op(BinaryOp::Add, &int(1), &int(2)).unwrap(), int(3));
        assert_eq!(
            op(BinaryOp::Add, &int(1), &Value::Float(0.5)).unwrap(),
            Value::Float(1.5)
        );
        assert_eq!(
            op(BinaryOp::Div, &int(7), &int(2)).unwrap(),
            Value::Float(3.5)
        );
        assert_eq!(op(BinaryOp::FloorDiv, &int(-7), &int(2)).unwrap(), int(-4));
        assert_eq!(op(BinaryOp::Mod, &int(-7), &int(2)).unwrap(), int(1));
        assert_eq!(op(BinaryOp::Mod, &int(7), &int(-2)).unwrap(), int(-1));
    }

    #[test]
    fn test_overflow_and_zero_division() {
        assert_eq!(
            op(BinaryOp::Add, &int(i64::MAX), &int(1)).unwrap_err(),
            "integer overflow"
        );
        assert!(op(BinaryOp::Div, &int(1), &int(0)).is_err());
        assert!(op(BinaryOp::FloorDiv, &int(1), &int(0)).is_err());
    }

    #[test]
    fn test_sequences() {
        assert_eq!(
            op(BinaryOp::Add, &Value::str("a"), &Value::str("b")).unwrap(),
            Value::str("ab")
        );
        assert_eq!(
            op(BinaryOp::Mul, &Value::str("ab"), &int(2)).unwrap(),
            Value::str("abab")
        );
        assert_eq!(
            op(BinaryOp::In, &int(2), &Value::List(vec![int(1), int(2)])).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            op(BinaryOp::NotIn, &Value::str("x"), &Value::str("abc")).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_repetition_is_bounded() {
        assert_eq!(
            op(BinaryOp::Mul, &int(3), &Value::List(vec![int(1)])).unwrap(),
            Value::List(vec![int(1), int(1), int(1)])
        );
        assert_eq!(op(BinaryOp::Mul, &Value::str("ab"), &int(-1)).unwrap(), Value::str(""));
        assert_eq!(
            op(BinaryOp::Mul, &Value::str("ab"), &int(512)).unwrap(),
            Value::str("ab".repeat(512))
        );

        let err = op(BinaryOp::Mul, &Value::str("ab"), &int(513)).unwrap_err();
        assert!(err.starts_with("repetition too large"), "{err}");
        let err = op(BinaryOp::Mul, &Value::List(vec![int(1), int(2)]), &int(i64::MAX)).unwrap_err();
        assert!(err.starts_with("repetition too large"), "{err}");
        let err = op(BinaryOp::Mul, &int(i64::MAX), &Value::str("ab")).unwrap_err();
        assert!(err.starts_with("repetition too large"), "{err}");
    }

    #[test]
    fn test_type_errors() {
        let err = op(BinaryOp::Add, &int(1), &Value::str("a")).unwrap_err();
        assert_eq!(err, "unsupported operand type(s) for +: 'int' and 'str'");
        let err = op(BinaryOp::Lt, &int(1), &Value::str("a")).unwrap_err();
        assert_eq!(err, "'<' not supported between instances of 'int' and 'str'");
    }

    #[test]
    fn test_unary() {
        assert_eq!(unary(UnaryOp::Neg, int(3)).unwrap(), int(-3));
        assert_eq!(unary(UnaryOp::Not, Value::str("")).unwrap(), Value::Bool(true));
        assert!(unary(UnaryOp::Neg, Value::str("a")).is_err());
    }
}
