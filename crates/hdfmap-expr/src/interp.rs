//! Tree-walking evaluator for [`Expr`].

use std::collections::HashMap;

use hdfmap_tree::{slice_indices, Selection, SliceArg};
use ndarray::{ArrayD, IxDyn};
use tracing::trace;

use crate::ast::{BinaryOp, Expr, IndexItem, Literal, UnaryOp};
use crate::builtins;
use crate::error::{ExprError, Result};
use crate::ops;
use crate::value::Value;

/// Evaluates expressions against a fixed symbol table.
pub struct Interpreter<'a> {
    symbols: &'a HashMap<String, Value>,
}

impl<'a> Interpreter<'a> {
    pub fn new(symbols: &'a HashMap<String, Value>) -> Self {
        Interpreter { symbols }
    }

    pub fn eval(&self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(lit) => Ok(match lit {
                Literal::None => Value::None,
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Int(v) => Value::Int(*v),
                Literal::Float(v) => Value::Float(*v),
                Literal::Str(s) => Value::Text(s.clone()),
            }),
            Expr::Name(name) => self
                .symbols
                .get(name)
                .cloned()
                .ok_or_else(|| ExprError::Undefined(name.clone())),
            Expr::Tuple(items) | Expr::List(items) => {
                Ok(Value::Tuple(items.iter().map(|e| self.eval(e)).collect::<Result<_>>()?))
            }
            Expr::Unary(op, operand) => {
                let v = self.eval(operand)?;
                match op {
                    UnaryOp::Neg => ops::negate(v),
                    UnaryOp::Pos => ops::positive(v),
                    UnaryOp::Not => Ok(Value::Bool(!v.materialize()?.is_truthy()?)),
                }
            }
            Expr::Binary(op, l, r) => self.binary(*op, l, r),
            Expr::Compare(first, rest) => {
                let mut left = self.eval(first)?;
                let mut result = Value::Bool(true);
                for (op, rhs) in rest {
                    let right = self.eval(rhs)?;
                    result = ops::compare(*op, left, right.clone())?;
                    // chains stop at the first false link
                    if rest.len() > 1 && !result.is_truthy()? {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Ok(result)
            }
            Expr::And(l, r) => {
                let left = self.eval(l)?.materialize()?;
                if !left.is_truthy()? {
                    return Ok(left);
                }
                self.eval(r)
            }
            Expr::Or(l, r) => {
                let left = self.eval(l)?.materialize()?;
                if left.is_truthy()? {
                    return Ok(left);
                }
                self.eval(r)
            }
            Expr::IfElse { cond, then, otherwise } => {
                if self.eval(cond)?.materialize()?.is_truthy()? {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
            Expr::Call { func, qualified, args, kwargs } => {
                let positional = args.iter().map(|e| self.eval(e)).collect::<Result<Vec<_>>>()?;
                let keywords = kwargs
                    .iter()
                    .map(|(k, e)| Ok((k.clone(), self.eval(e)?)))
                    .collect::<Result<Vec<_>>>()?;
                trace!(func = func.name(), qualified, nargs = positional.len(), "call");
                builtins::call(*func, *qualified, positional, keywords)
            }
            Expr::Subscript(target, items) => {
                let target = self.eval(target)?;
                let mut args = Vec::with_capacity(items.len());
                for item in items {
                    self.push_index(item, &mut args)?;
                }
                subscript(target, Selection::new(args))
            }
        }
    }

    fn binary(&self, op: BinaryOp, l: &Expr, r: &Expr) -> Result<Value> {
        let left = self.eval(l)?;
        let right = self.eval(r)?;
        ops::binary(op, left, right)
    }

    fn index_int(&self, e: &Expr) -> Result<isize> {
        match self.eval(e)?.materialize()? {
            Value::Int(v) => Ok(v as isize),
            Value::Bool(b) => Ok(isize::from(b)),
            other => Err(ExprError::Type(format!(
                "indices must be integers, not {}",
                other.type_name()
            ))),
        }
    }

    fn optional_int(&self, e: &Option<Expr>) -> Result<Option<isize>> {
        match e {
            None | Some(Expr::Literal(Literal::None)) => Ok(None),
            Some(e) => self.index_int(e).map(Some),
        }
    }

    fn push_index(&self, item: &IndexItem, args: &mut Vec<SliceArg>) -> Result<()> {
        match item {
            IndexItem::Index(e) => match self.eval(e)?.materialize()? {
                Value::Tuple(parts) => {
                    for part in parts {
                        args.push(SliceArg::Index(scalar_index(&part)?));
                    }
                }
                v => args.push(SliceArg::Index(scalar_index(&v)?)),
            },
            IndexItem::Slice { start, stop, step } => args.push(SliceArg::Range {
                start: self.optional_int(start)?,
                stop: self.optional_int(stop)?,
                step: self.optional_int(step)?,
            }),
            IndexItem::Ellipsis => args.push(SliceArg::Ellipsis),
            IndexItem::NewAxis => args.push(SliceArg::NewAxis),
        }
        Ok(())
    }
}

fn scalar_index(v: &Value) -> Result<isize> {
    match v {
        Value::Int(i) => Ok(*i as isize),
        Value::Bool(b) => Ok(isize::from(*b)),
        other => Err(ExprError::Type(format!(
            "indices must be integers, not {}",
            other.type_name()
        ))),
    }
}

/// Apply `[...]` to a value.
pub fn subscript(target: Value, sel: Selection) -> Result<Value> {
    match target {
        Value::Handle(h) => Ok(Value::from_raw(h.read(&sel)?)),
        Value::Array(a) => Ok(Value::from_array(sel.apply(a)?)),
        Value::TextArray(a) => Ok(Value::from_text_array(sel.apply(a)?)),
        Value::DatetimeArray(a) => {
            let out = sel.apply(a)?;
            if out.ndim() == 0 {
                Ok(out.iter().next().map(|d| Value::Datetime(*d)).unwrap_or(Value::None))
            } else {
                Ok(Value::DatetimeArray(out))
            }
        }
        Value::Tuple(items) => {
            let arr = ArrayD::from_shape_vec(IxDyn(&[items.len()]), items)
                .map_err(|e| ExprError::Value(e.to_string()))?;
            let out = sel.apply(arr)?;
            match out.ndim() {
                0 => Ok(out.into_iter().next().unwrap_or(Value::None)),
                1 => Ok(Value::Tuple(out.into_iter().collect())),
                _ => Err(ExprError::Type("tuple indices cannot add dimensions".into())),
            }
        }
        Value::Text(s) => text_subscript(&s, &sel),
        other => Err(ExprError::Type(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

fn text_subscript(s: &str, sel: &Selection) -> Result<Value> {
    let chars: Vec<char> = s.chars().collect();
    let n = chars.len();
    match sel.args() {
        [SliceArg::Index(i)] => {
            let idx = if *i < 0 { *i + n as isize } else { *i };
            if idx < 0 || idx >= n as isize {
                return Err(ExprError::Value("string index out of range".into()));
            }
            Ok(Value::Text(chars[idx as usize].to_string()))
        }
        [SliceArg::Range { start, stop, step }] => {
            let picks = slice_indices(n, *start, *stop, *step)?;
            Ok(Value::Text(picks.into_iter().map(|i| chars[i]).collect()))
        }
        _ => Err(ExprError::Type("strings take a single index or slice".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::token::tokenize;

    fn run(src: &str, symbols: &HashMap<String, Value>) -> Result<Value> {
        let tokens = tokenize(src)?;
        let expr = parse(src, &tokens)?;
        Interpreter::new(symbols).eval(&expr)
    }

    fn symbols() -> HashMap<String, Value> {
        let mut s = HashMap::new();
        s.insert("x".to_string(), Value::Float(2.0));
        s.insert("n".to_string(), Value::Int(5));
        s.insert(
            "arr".to_string(),
            Value::Array(ArrayD::from_shape_vec(IxDyn(&[2, 3]), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap()),
        );
        s.insert("name".to_string(), Value::from("sample"));
        s
    }

    #[test]
    fn arithmetic_and_names() {
        let s = symbols();
        assert_eq!(run("x * 3 + n", &s).unwrap(), Value::Float(11.0));
        assert_eq!(run("n // 2", &s).unwrap(), Value::Int(2));
        assert_eq!(run("2 ** 10", &s).unwrap(), Value::Int(1024));
        assert!(matches!(run("missing + 1", &s), Err(ExprError::Undefined(n)) if n == "missing"));
    }

    #[test]
    fn boolean_operators_return_operands() {
        let s = symbols();
        assert_eq!(run("0 or name", &s).unwrap(), Value::from("sample"));
        assert_eq!(run("n and 0", &s).unwrap(), Value::Int(0));
        assert_eq!(run("0 and missing", &s).unwrap(), Value::Int(0));
        assert_eq!(run("'a' if n > 3 else 'b'", &s).unwrap(), Value::from("a"));
        assert_eq!(run("1 < n < 10", &s).unwrap(), Value::Bool(true));
        assert_eq!(run("1 < n < 3", &s).unwrap(), Value::Bool(false));
    }

    #[test]
    fn subscripts() {
        let s = symbols();
        assert_eq!(run("arr[1, 2]", &s).unwrap(), Value::Float(6.0));
        assert_eq!(run("arr[-1, ::2]", &s).unwrap(), Value::from(vec![4.0, 6.0]));
        assert_eq!(run("np.sum(arr[:, 0])", &s).unwrap(), Value::Float(5.0));
        assert_eq!(run("name[1:3]", &s).unwrap(), Value::from("am"));
        assert_eq!(run("(1, 2, 3)[-1]", &s).unwrap(), Value::Int(3));
        assert!(run("arr[0.5]", &s).is_err());
        assert!(run("arr[5]", &s).is_err());
    }

    #[test]
    fn membership() {
        let s = symbols();
        assert_eq!(run("'amp' in name", &s).unwrap(), Value::Bool(true));
        assert_eq!(run("3 not in (1, 2)", &s).unwrap(), Value::Bool(true));
    }
}
