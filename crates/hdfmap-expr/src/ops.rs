//! Arithmetic and comparison on [`Value`]s, with array broadcasting.

use std::cmp::Ordering;

use ndarray::{ArrayD, IxDyn, Zip};

use crate::ast::{BinaryOp, CompareOp};
use crate::error::{ExprError, Result};
use crate::value::Value;

/// Result shape of broadcasting two shapes together, if compatible.
pub fn broadcast_shape(a: &[usize], b: &[usize]) -> Option<Vec<usize>> {
    let rank = a.len().max(b.len());
    let mut out = vec![0; rank];
    for i in 0..rank {
        let da = if i < rank - a.len() { 1 } else { a[i - (rank - a.len())] };
        let db = if i < rank - b.len() { 1 } else { b[i - (rank - b.len())] };
        out[i] = match (da, db) {
            (x, y) if x == y => x,
            (1, y) => y,
            (x, 1) => x,
            _ => return None,
        };
    }
    Some(out)
}

/// Combine two arrays element by element after broadcasting.
pub fn broadcast_with<F>(a: &ArrayD<f64>, b: &ArrayD<f64>, f: F) -> Result<ArrayD<f64>>
where
    F: Fn(f64, f64) -> f64,
{
    let mismatch = || ExprError::Broadcast { left: a.shape().to_vec(), right: b.shape().to_vec() };
    let shape = broadcast_shape(a.shape(), b.shape()).ok_or_else(mismatch)?;
    let av = a.broadcast(IxDyn(&shape)).ok_or_else(mismatch)?;
    let bv = b.broadcast(IxDyn(&shape)).ok_or_else(mismatch)?;
    Ok(Zip::from(&av).and(&bv).map_collect(|&x, &y| f(x, y)))
}

/// Longest string that repetition may build.
const MAX_TEXT_LEN: usize = 1 << 24;

fn unsupported(op: &str, l: &Value, r: &Value) -> ExprError {
    ExprError::Type(format!(
        "unsupported operand type(s) for {op}: '{}' and '{}'",
        l.type_name(),
        r.type_name()
    ))
}

fn is_int_like(v: &Value) -> bool {
    matches!(v, Value::Bool(_) | Value::Int(_))
}

fn is_array_operand(v: &Value) -> bool {
    v.is_numeric_scalar() || matches!(v, Value::Array(_) | Value::Tuple(_))
}

pub fn binary(op: BinaryOp, l: Value, r: Value) -> Result<Value> {
    let l = l.materialize()?;
    let r = r.materialize()?;
    match (op, &l, &r) {
        (BinaryOp::Add, Value::Text(a), Value::Text(b)) => Ok(Value::Text(format!("{a}{b}"))),
        (BinaryOp::Mul, Value::Text(s), n) | (BinaryOp::Mul, n, Value::Text(s)) if is_int_like(n) => {
            let count = usize::try_from(n.as_i64().unwrap_or(0).max(0)).unwrap_or(usize::MAX);
            match s.len().checked_mul(count) {
                Some(len) if len <= MAX_TEXT_LEN => Ok(Value::Text(s.repeat(count))),
                _ => Err(ExprError::Value(format!("string repetition of {count} is too large"))),
            }
        }
        (BinaryOp::Add, Value::Tuple(a), Value::Tuple(b)) => {
            Ok(Value::Tuple(a.iter().chain(b.iter()).cloned().collect()))
        }
        _ if is_int_like(&l) && is_int_like(&r) => {
            int_op(op, l.as_i64().unwrap_or(0), r.as_i64().unwrap_or(0))
        }
        _ if l.is_numeric_scalar() && r.is_numeric_scalar() => {
            float_op(op, l.as_f64().unwrap_or(f64::NAN), r.as_f64().unwrap_or(f64::NAN)).map(Value::Float)
        }
        _ if is_array_operand(&l) && is_array_operand(&r) => {
            let a = l.to_array()?;
            let b = r.to_array()?;
            let f = array_fn(op);
            Ok(Value::from_array(broadcast_with(&a, &b, f)?))
        }
        _ => Err(unsupported(op.symbol(), &l, &r)),
    }
}

fn int_op(op: BinaryOp, a: i64, b: i64) -> Result<Value> {
    let as_float = || float_op(op, a as f64, b as f64).map(Value::Float);
    match op {
        BinaryOp::Add => a.checked_add(b).map(Value::Int).map_or_else(as_float, Ok),
        BinaryOp::Sub => a.checked_sub(b).map(Value::Int).map_or_else(as_float, Ok),
        BinaryOp::Mul => a.checked_mul(b).map(Value::Int).map_or_else(as_float, Ok),
        BinaryOp::Div => float_op(op, a as f64, b as f64).map(Value::Float),
        BinaryOp::FloorDiv => {
            if b == 0 {
                return Err(ExprError::ZeroDivision);
            }
            match (a.checked_div(b), a.checked_rem(b)) {
                (Some(q), Some(r)) if r != 0 && ((r < 0) != (b < 0)) => Ok(Value::Int(q - 1)),
                (Some(q), Some(_)) => Ok(Value::Int(q)),
                _ => as_float(),
            }
        }
        BinaryOp::Mod => {
            if b == 0 {
                return Err(ExprError::ZeroDivision);
            }
            match a.checked_rem(b) {
                Some(r) if r != 0 && ((r < 0) != (b < 0)) => Ok(Value::Int(r + b)),
                Some(r) => Ok(Value::Int(r)),
                None => Ok(Value::Int(0)),
            }
        }
        BinaryOp::Pow => match u32::try_from(b) {
            Ok(exp) => a.checked_pow(exp).map(Value::Int).map_or_else(as_float, Ok),
            Err(_) => as_float(),
        },
    }
}

fn float_op(op: BinaryOp, a: f64, b: f64) -> Result<f64> {
    match op {
        BinaryOp::Add => Ok(a + b),
        BinaryOp::Sub => Ok(a - b),
        BinaryOp::Mul => Ok(a * b),
        BinaryOp::Div if b == 0.0 => Err(ExprError::ZeroDivision),
        BinaryOp::Div => Ok(a / b),
        BinaryOp::FloorDiv if b == 0.0 => Err(ExprError::ZeroDivision),
        BinaryOp::FloorDiv => Ok((a / b).floor()),
        BinaryOp::Mod if b == 0.0 => Err(ExprError::ZeroDivision),
        BinaryOp::Mod => Ok(python_mod(a, b)),
        BinaryOp::Pow => Ok(a.powf(b)),
    }
}

fn python_mod(a: f64, b: f64) -> f64 {
    let r = a % b;
    if r != 0.0 && ((r < 0.0) != (b < 0.0)) {
        r + b
    } else {
        r
    }
}

/// Element-wise form of an operator; division by zero yields inf/nan.
fn array_fn(op: BinaryOp) -> fn(f64, f64) -> f64 {
    match op {
        BinaryOp::Add => |a, b| a + b,
        BinaryOp::Sub => |a, b| a - b,
        BinaryOp::Mul => |a, b| a * b,
        BinaryOp::Div => |a, b| a / b,
        BinaryOp::FloorDiv => |a, b| (a / b).floor(),
        BinaryOp::Mod => |a, b| if b == 0.0 { f64::NAN } else { python_mod(a, b) },
        BinaryOp::Pow => f64::powf,
    }
}

pub fn negate(v: Value) -> Result<Value> {
    match v.materialize()? {
        Value::Bool(b) => Ok(Value::Int(-i64::from(b))),
        Value::Int(i) => Ok(i.checked_neg().map(Value::Int).unwrap_or(Value::Float(-(i as f64)))),
        Value::Float(f) => Ok(Value::Float(-f)),
        Value::Array(a) => Ok(Value::Array(a.mapv(|x| -x))),
        other => Err(ExprError::Type(format!("bad operand type for unary -: '{}'", other.type_name()))),
    }
}

pub fn positive(v: Value) -> Result<Value> {
    match v.materialize()? {
        Value::Bool(b) => Ok(Value::Int(i64::from(b))),
        v @ (Value::Int(_) | Value::Float(_) | Value::Array(_)) => Ok(v),
        other => Err(ExprError::Type(format!("bad operand type for unary +: '{}'", other.type_name()))),
    }
}

// ---------------------------------------------------------------------------
// Comparisons
// ---------------------------------------------------------------------------

fn ordering_holds(op: CompareOp, ord: Option<Ordering>) -> bool {
    match (op, ord) {
        (CompareOp::Eq, Some(o)) => o == Ordering::Equal,
        (CompareOp::Ne, Some(o)) => o != Ordering::Equal,
        (CompareOp::Ne, None) => true,
        (CompareOp::Lt, Some(o)) => o == Ordering::Less,
        (CompareOp::Le, Some(o)) => o != Ordering::Greater,
        (CompareOp::Gt, Some(o)) => o == Ordering::Greater,
        (CompareOp::Ge, Some(o)) => o != Ordering::Less,
        _ => false,
    }
}

pub fn compare(op: CompareOp, l: Value, r: Value) -> Result<Value> {
    let l = l.materialize()?;
    let r = r.materialize()?;
    if matches!(op, CompareOp::In | CompareOp::NotIn) {
        let found = contains(&r, &l)?;
        return Ok(Value::Bool(found == (op == CompareOp::In)));
    }
    let equality = matches!(op, CompareOp::Eq | CompareOp::Ne);
    match (&l, &r) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Bool(ordering_holds(op, Some(a.cmp(b))))),
        (a, b) if a.is_numeric_scalar() && b.is_numeric_scalar() => {
            let (x, y) = (a.as_f64().unwrap_or(f64::NAN), b.as_f64().unwrap_or(f64::NAN));
            Ok(Value::Bool(ordering_holds(op, x.partial_cmp(&y))))
        }
        (Value::Text(a), Value::Text(b)) => Ok(Value::Bool(ordering_holds(op, Some(a.cmp(b))))),
        (Value::Datetime(a), Value::Datetime(b)) => Ok(Value::Bool(ordering_holds(op, Some(a.cmp(b))))),
        (Value::TextArray(a), Value::Text(s)) | (Value::Text(s), Value::TextArray(a)) if equality => {
            let want = op == CompareOp::Eq;
            Ok(Value::Array(a.mapv(|v| f64::from(u8::from((&v == s) == want)))))
        }
        (a, b) if matches!(a, Value::Array(_)) || matches!(b, Value::Array(_)) => {
            if !(is_array_operand(a) && is_array_operand(b)) {
                return Err(ExprError::Type(format!(
                    "'{}' not supported between instances of '{}' and '{}'",
                    op.symbol(),
                    a.type_name(),
                    b.type_name()
                )));
            }
            let out = broadcast_with(&a.to_array()?, &b.to_array()?, |x, y| {
                f64::from(u8::from(ordering_holds(op, x.partial_cmp(&y))))
            })?;
            Ok(Value::from_array(out))
        }
        (Value::None, Value::None) if equality => Ok(Value::Bool(op == CompareOp::Eq)),
        (Value::Tuple(a), Value::Tuple(b)) if equality => Ok(Value::Bool((a == b) == (op == CompareOp::Eq))),
        _ if equality => Ok(Value::Bool(op == CompareOp::Ne)),
        (a, b) => Err(ExprError::Type(format!(
            "'{}' not supported between instances of '{}' and '{}'",
            op.symbol(),
            a.type_name(),
            b.type_name()
        ))),
    }
}

fn contains(container: &Value, item: &Value) -> Result<bool> {
    match (container, item) {
        (Value::Text(hay), Value::Text(needle)) => Ok(hay.contains(needle.as_str())),
        (Value::Tuple(items), _) => Ok(items.iter().any(|v| v == item)),
        (Value::TextArray(a), Value::Text(s)) => Ok(a.iter().any(|v| v == s)),
        (Value::Array(a), v) if v.is_numeric_scalar() => {
            let x = v.as_f64().unwrap_or(f64::NAN);
            Ok(a.iter().any(|y| *y == x))
        }
        _ => Err(ExprError::Type(format!(
            "argument of type '{}' does not support 'in' with '{}'",
            container.type_name(),
            item.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arr(shape: &[usize], data: Vec<f64>) -> ArrayD<f64> {
        ArrayD::from_shape_vec(IxDyn(shape), data).unwrap()
    }

    #[test]
    fn string_repetition_is_bounded() {
        assert_eq!(binary(BinaryOp::Mul, Value::Int(-3), "ab".into()).unwrap(), Value::from(""));
        let huge = binary(BinaryOp::Mul, "ab".into(), Value::Int(1 << 62));
        assert!(matches!(huge, Err(ExprError::Value(_))), "{huge:?}");
        assert!(binary(BinaryOp::Mul, "a".into(), Value::Int(1_000_000_000_000)).is_err());
    }

    #[test]
    fn integer_arithmetic_follows_floor_semantics() {
        assert_eq!(binary(BinaryOp::FloorDiv, Value::Int(-7), Value::Int(2)).unwrap(), Value::Int(-4));
        assert_eq!(binary(BinaryOp::Mod, Value::Int(-7), Value::Int(2)).unwrap(), Value::Int(1));
        assert_eq!(binary(BinaryOp::Div, Value::Int(7), Value::Int(2)).unwrap(), Value::Float(3.5));
        assert_eq!(binary(BinaryOp::Pow, Value::Int(2), Value::Int(-1)).unwrap(), Value::Float(0.5));
        assert_eq!(binary(BinaryOp::Div, Value::Int(1), Value::Int(0)), Err(ExprError::ZeroDivision));
    }

    #[test]
    fn arrays_broadcast() {
        let a = Value::Array(arr(&[2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]));
        let b = Value::Array(arr(&[3], vec![10.0, 20.0, 30.0]));
        let out = binary(BinaryOp::Add, a, b).unwrap();
        assert_eq!(out.as_array().unwrap()[[1, 2]], 36.0);

        let bad = binary(
            BinaryOp::Add,
            Value::Array(arr(&[2], vec![1.0, 2.0])),
            Value::Array(arr(&[3], vec![1.0, 2.0, 3.0])),
        );
        assert!(matches!(bad, Err(ExprError::Broadcast { .. })));
    }

    #[test]
    fn array_division_by_zero_is_not_an_error() {
        let out = binary(BinaryOp::Div, Value::Array(arr(&[2], vec![1.0, 0.0])), Value::Int(0)).unwrap();
        let a = out.as_array().unwrap();
        assert!(a[[0]].is_infinite());
        assert!(a[[1]].is_nan());
    }

    #[test]
    fn text_operations() {
        assert_eq!(binary(BinaryOp::Add, "ab".into(), "cd".into()).unwrap(), Value::from("abcd"));
        assert_eq!(binary(BinaryOp::Mul, "ab".into(), Value::Int(2)).unwrap(), Value::from("abab"));
        assert!(binary(BinaryOp::Sub, "ab".into(), Value::Int(2)).is_err());
    }

    #[test]
    fn comparisons() {
        assert_eq!(compare(CompareOp::Lt, Value::Int(1), Value::Float(1.5)).unwrap(), Value::Bool(true));
        assert_eq!(compare(CompareOp::Eq, "a".into(), Value::Int(1)).unwrap(), Value::Bool(false));
        assert_eq!(compare(CompareOp::In, "scan".into(), "scan eta".into()).unwrap(), Value::Bool(true));
        assert!(compare(CompareOp::Lt, "a".into(), Value::Int(1)).is_err());
        let mask = compare(CompareOp::Gt, Value::Array(arr(&[3], vec![1.0, 5.0, 9.0])), Value::Int(4)).unwrap();
        assert_eq!(mask.as_array().unwrap().iter().copied().collect::<Vec<_>>(), vec![0.0, 1.0, 1.0]);
    }
}
