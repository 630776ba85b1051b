//! The fixed set of callable functions.
//!
//! Every function is reachable by its bare name; array functions are also
//! reachable as `np.<name>`. Nothing outside this table can be called.

use std::f64::consts;

use ndarray::{ArrayD, ArrayView1, Axis, IxDyn};

use hdfmap_tree::squeeze;

use crate::error::{ExprError, Result};
use crate::ops::broadcast_with;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Abs,
    Sqrt,
    Exp,
    Log,
    Log10,
    Sin,
    Cos,
    Tan,
    Arcsin,
    Arccos,
    Arctan,
    Floor,
    Ceil,
    Round,
    Int,
    Float,
    Str,
    Bool,
    Len,
    Shape,
    Size,
    Sum,
    Max,
    Min,
    Mean,
    Std,
    Argmax,
    Argmin,
    Any,
    All,
    Array,
    Arange,
    Squeeze,
}

impl Builtin {
    fn from_name(name: &str) -> Option<Builtin> {
        Some(match name {
            "abs" | "absolute" => Builtin::Abs,
            "sqrt" => Builtin::Sqrt,
            "exp" => Builtin::Exp,
            "log" => Builtin::Log,
            "log10" => Builtin::Log10,
            "sin" => Builtin::Sin,
            "cos" => Builtin::Cos,
            "tan" => Builtin::Tan,
            "arcsin" => Builtin::Arcsin,
            "arccos" => Builtin::Arccos,
            "arctan" => Builtin::Arctan,
            "floor" => Builtin::Floor,
            "ceil" => Builtin::Ceil,
            "round" => Builtin::Round,
            "int" => Builtin::Int,
            "float" => Builtin::Float,
            "str" => Builtin::Str,
            "bool" => Builtin::Bool,
            "len" => Builtin::Len,
            "shape" => Builtin::Shape,
            "size" => Builtin::Size,
            "sum" => Builtin::Sum,
            "max" | "amax" => Builtin::Max,
            "min" | "amin" => Builtin::Min,
            "mean" => Builtin::Mean,
            "std" => Builtin::Std,
            "argmax" => Builtin::Argmax,
            "argmin" => Builtin::Argmin,
            "any" => Builtin::Any,
            "all" => Builtin::All,
            "array" | "asarray" => Builtin::Array,
            "arange" => Builtin::Arange,
            "squeeze" => Builtin::Squeeze,
            _ => return None,
        })
    }

    /// Language-level conversions have no `np.` spelling.
    fn has_array_spelling(self) -> bool {
        !matches!(self, Builtin::Int | Builtin::Float | Builtin::Str | Builtin::Bool | Builtin::Len)
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Abs => "abs",
            Builtin::Sqrt => "sqrt",
            Builtin::Exp => "exp",
            Builtin::Log => "log",
            Builtin::Log10 => "log10",
            Builtin::Sin => "sin",
            Builtin::Cos => "cos",
            Builtin::Tan => "tan",
            Builtin::Arcsin => "arcsin",
            Builtin::Arccos => "arccos",
            Builtin::Arctan => "arctan",
            Builtin::Floor => "floor",
            Builtin::Ceil => "ceil",
            Builtin::Round => "round",
            Builtin::Int => "int",
            Builtin::Float => "float",
            Builtin::Str => "str",
            Builtin::Bool => "bool",
            Builtin::Len => "len",
            Builtin::Shape => "shape",
            Builtin::Size => "size",
            Builtin::Sum => "sum",
            Builtin::Max => "max",
            Builtin::Min => "min",
            Builtin::Mean => "mean",
            Builtin::Std => "std",
            Builtin::Argmax => "argmax",
            Builtin::Argmin => "argmin",
            Builtin::Any => "any",
            Builtin::All => "all",
            Builtin::Array => "array",
            Builtin::Arange => "arange",
            Builtin::Squeeze => "squeeze",
        }
    }
}

/// Resolve a callable name; the flag tells whether it was `np.`-qualified.
pub fn lookup(name: &str) -> Option<(Builtin, bool)> {
    match name.strip_prefix("np.") {
        Some(member) => Builtin::from_name(member)
            .filter(|b| b.has_array_spelling())
            .map(|b| (b, true)),
        None => Builtin::from_name(name).map(|b| (b, false)),
    }
}

/// Named numeric constants.
pub fn constant(name: &str) -> Option<f64> {
    match name {
        "np.pi" => Some(consts::PI),
        "np.e" => Some(consts::E),
        "np.nan" => Some(f64::NAN),
        "np.inf" => Some(f64::INFINITY),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

struct Args {
    func: Builtin,
    positional: Vec<Value>,
    keywords: Vec<(String, Value)>,
}

impl Args {
    fn arity(&self, min: usize, max: usize) -> Result<()> {
        let n = self.positional.len();
        if n < min || n > max {
            return Err(ExprError::Type(format!(
                "{}() takes {} argument(s), {} given",
                self.func.name(),
                if min == max { min.to_string() } else { format!("{min} to {max}") },
                n
            )));
        }
        Ok(())
    }

    fn first(&self) -> Result<Value> {
        self.positional
            .first()
            .cloned()
            .ok_or_else(|| ExprError::Type(format!("{}() missing required argument", self.func.name())))
    }

    /// Positional argument `index`, or the keyword `name`.
    fn optional(&mut self, index: usize, name: &str) -> Option<Value> {
        if let Some(pos) = self.keywords.iter().position(|(k, _)| k == name) {
            return Some(self.keywords.remove(pos).1);
        }
        self.positional.get(index).cloned()
    }

    fn reject_keywords(&self) -> Result<()> {
        match self.keywords.first() {
            Some((k, _)) => Err(ExprError::Type(format!(
                "{}() got an unexpected keyword argument '{k}'",
                self.func.name()
            ))),
            None => Ok(()),
        }
    }
}

/// Call a built-in.
pub fn call(func: Builtin, qualified: bool, positional: Vec<Value>, keywords: Vec<(String, Value)>) -> Result<Value> {
    let mut args = Args { func, positional, keywords };
    match func {
        Builtin::Abs => {
            args.arity(1, 1)?;
            args.reject_keywords()?;
            match args.first()?.materialize()? {
                Value::Int(v) => Ok(Value::Int(v.checked_abs().unwrap_or(i64::MAX))),
                Value::Bool(b) => Ok(Value::Int(i64::from(b))),
                other => elementwise(func, other, f64::abs),
            }
        }
        Builtin::Sqrt => unary_math(args, f64::sqrt),
        Builtin::Exp => unary_math(args, f64::exp),
        Builtin::Log => unary_math(args, f64::ln),
        Builtin::Log10 => unary_math(args, f64::log10),
        Builtin::Sin => unary_math(args, f64::sin),
        Builtin::Cos => unary_math(args, f64::cos),
        Builtin::Tan => unary_math(args, f64::tan),
        Builtin::Arcsin => unary_math(args, f64::asin),
        Builtin::Arccos => unary_math(args, f64::acos),
        Builtin::Arctan => unary_math(args, f64::atan),
        Builtin::Floor => unary_math(args, f64::floor),
        Builtin::Ceil => unary_math(args, f64::ceil),
        Builtin::Round => round(args, qualified),
        Builtin::Int => {
            args.arity(1, 1)?;
            args.reject_keywords()?;
            to_int(args.first()?.materialize()?)
        }
        Builtin::Float => {
            args.arity(0, 1)?;
            args.reject_keywords()?;
            match args.positional.first().cloned() {
                None => Ok(Value::Float(0.0)),
                Some(v) => to_float(v.materialize()?),
            }
        }
        Builtin::Str => {
            args.arity(0, 1)?;
            args.reject_keywords()?;
            Ok(Value::Text(args.positional.first().map(|v| v.to_string()).unwrap_or_default()))
        }
        Builtin::Bool => {
            args.arity(0, 1)?;
            args.reject_keywords()?;
            match args.positional.first() {
                None => Ok(Value::Bool(false)),
                Some(v) => Ok(Value::Bool(v.clone().materialize()?.is_truthy()?)),
            }
        }
        Builtin::Len => {
            args.arity(1, 1)?;
            match args.first()? {
                Value::Text(s) => Ok(Value::Int(s.chars().count() as i64)),
                v => match v.shape().first() {
                    Some(n) => Ok(Value::Int(*n as i64)),
                    None => Err(ExprError::Type(format!("object of type '{}' has no len()", v.type_name()))),
                },
            }
        }
        Builtin::Shape => {
            args.arity(1, 1)?;
            let shape = args.first()?.shape();
            Ok(Value::Tuple(shape.into_iter().map(|d| Value::Int(d as i64)).collect()))
        }
        Builtin::Size => {
            args.arity(1, 1)?;
            let v = args.first()?;
            let size = match &v {
                Value::Tuple(_) | Value::Array(_) | Value::TextArray(_) | Value::DatetimeArray(_) | Value::Handle(_) => {
                    v.shape().iter().product::<usize>()
                }
                _ => 1,
            };
            Ok(Value::Int(size as i64))
        }
        Builtin::Max | Builtin::Min if !qualified && args.positional.len() > 1 => extreme_of(args),
        Builtin::Sum => reduce(args, Reduction::Sum),
        Builtin::Max => reduce(args, Reduction::Max),
        Builtin::Min => reduce(args, Reduction::Min),
        Builtin::Mean => reduce(args, Reduction::Mean),
        Builtin::Std => reduce(args, Reduction::Std),
        Builtin::Argmax | Builtin::Argmin => {
            args.arity(1, 1)?;
            args.reject_keywords()?;
            let a = args.first()?.to_array()?;
            arg_extreme(&a, func == Builtin::Argmax)
        }
        Builtin::Any | Builtin::All => {
            args.arity(1, 1)?;
            args.reject_keywords()?;
            let v = args.first()?.materialize()?;
            let truths: Vec<bool> = match &v {
                Value::Tuple(items) => items.iter().map(|i| i.is_truthy()).collect::<Result<_>>()?,
                Value::Array(a) => a.iter().map(|x| *x != 0.0).collect(),
                Value::TextArray(a) => a.iter().map(|s| !s.is_empty()).collect(),
                other => vec![other.is_truthy()?],
            };
            let out = if func == Builtin::Any { truths.iter().any(|t| *t) } else { truths.iter().all(|t| *t) };
            Ok(Value::Bool(out))
        }
        Builtin::Array => {
            args.arity(1, 1)?;
            args.reject_keywords()?;
            match args.first()?.materialize()? {
                Value::Tuple(items) if !items.is_empty() && items.iter().all(|v| matches!(v, Value::Text(_))) => {
                    let texts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                    let n = texts.len();
                    ArrayD::from_shape_vec(IxDyn(&[n]), texts)
                        .map(Value::TextArray)
                        .map_err(|e| ExprError::Value(e.to_string()))
                }
                v @ (Value::TextArray(_) | Value::DatetimeArray(_)) => Ok(v),
                v => Ok(Value::Array(v.to_array()?)),
            }
        }
        Builtin::Arange => arange(args),
        Builtin::Squeeze => {
            args.arity(1, 1)?;
            args.reject_keywords()?;
            match args.first()?.materialize()? {
                Value::Array(a) => Ok(Value::from_array(squeeze(a))),
                Value::TextArray(a) => Ok(Value::from_text_array(squeeze(a))),
                Value::DatetimeArray(a) => {
                    let s = squeeze(a);
                    match s.ndim() {
                        0 => Ok(s.iter().next().map(|d| Value::Datetime(*d)).unwrap_or(Value::None)),
                        _ => Ok(Value::DatetimeArray(s)),
                    }
                }
                other => Ok(other),
            }
        }
    }
}

fn elementwise(func: Builtin, v: Value, f: fn(f64) -> f64) -> Result<Value> {
    match v.materialize()? {
        s if s.is_numeric_scalar() => Ok(Value::Float(f(s.as_f64().unwrap_or(f64::NAN)))),
        Value::Array(a) => Ok(Value::Array(a.mapv(f))),
        t @ Value::Tuple(_) => Ok(Value::from_array(t.to_array()?.mapv(f))),
        other => Err(ExprError::Type(format!(
            "{}() does not support '{}'",
            func.name(),
            other.type_name()
        ))),
    }
}

fn unary_math(args: Args, f: fn(f64) -> f64) -> Result<Value> {
    args.arity(1, 1)?;
    args.reject_keywords()?;
    elementwise(args.func, args.first()?, f)
}

fn round_half_even(x: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (x * scale).round_ties_even() / scale
}

fn round(mut args: Args, qualified: bool) -> Result<Value> {
    args.arity(1, 2)?;
    let digits = args.optional(1, "decimals").or_else(|| args.optional(1, "ndigits"));
    args.reject_keywords()?;
    let value = args.first()?.materialize()?;
    let decimals = match &digits {
        None | Some(Value::None) => None,
        Some(v) => Some(
            v.as_i64()
                .ok_or_else(|| ExprError::Type("round() digits must be an integer".into()))? as i32,
        ),
    };
    match value {
        Value::Int(v) if decimals.map_or(true, |d| d >= 0) => Ok(Value::Int(v)),
        s if s.is_numeric_scalar() => {
            let x = s.as_f64().unwrap_or(f64::NAN);
            match decimals {
                None if !qualified => {
                    if !x.is_finite() {
                        return Err(ExprError::Value(format!("cannot convert float {x} to integer")));
                    }
                    Ok(Value::Int(round_half_even(x, 0) as i64))
                }
                d => Ok(Value::Float(round_half_even(x, d.unwrap_or(0)))),
            }
        }
        Value::Array(a) => {
            let d = decimals.unwrap_or(0);
            Ok(Value::Array(a.mapv(|x| round_half_even(x, d))))
        }
        other => Err(ExprError::Type(format!("type {} doesn't define round()", other.type_name()))),
    }
}

fn to_int(v: Value) -> Result<Value> {
    match v {
        Value::Bool(b) => Ok(Value::Int(i64::from(b))),
        Value::Int(i) => Ok(Value::Int(i)),
        Value::Float(f) if f.is_finite() => Ok(Value::Int(f.trunc() as i64)),
        Value::Float(f) => Err(ExprError::Value(format!("cannot convert float {f} to integer"))),
        Value::Text(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| ExprError::Value(format!("invalid literal for int() with base 10: '{s}'"))),
        Value::Array(a) if a.len() == 1 => to_int(Value::Float(a.iter().next().copied().unwrap_or(f64::NAN))),
        Value::TextArray(a) if a.len() == 1 => to_int(Value::Text(a.iter().next().cloned().unwrap_or_default())),
        other => Err(ExprError::Type(format!(
            "int() argument must be a string or a number, not '{}'",
            other.type_name()
        ))),
    }
}

fn to_float(v: Value) -> Result<Value> {
    match v {
        s if s.is_numeric_scalar() => Ok(Value::Float(s.as_f64().unwrap_or(f64::NAN))),
        Value::Text(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| ExprError::Value(format!("could not convert string to float: '{s}'"))),
        Value::Array(a) if a.len() == 1 => Ok(Value::Float(a.iter().next().copied().unwrap_or(f64::NAN))),
        Value::TextArray(a) if a.len() == 1 => to_float(Value::Text(a.iter().next().cloned().unwrap_or_default())),
        other => Err(ExprError::Type(format!(
            "float() argument must be a string or a number, not '{}'",
            other.type_name()
        ))),
    }
}

/// `max(a, b, ...)` / `min(a, b, ...)` over scalars.
fn extreme_of(args: Args) -> Result<Value> {
    args.reject_keywords()?;
    let want_max = args.func == Builtin::Max;
    let mut best: Option<Value> = None;
    for v in &args.positional {
        let v = v.clone().materialize()?;
        let x = v
            .as_f64()
            .ok_or_else(|| ExprError::Type(format!("{}() arguments must be numbers", args.func.name())))?;
        let replace = match &best {
            None => true,
            Some(b) => {
                let y = b.as_f64().unwrap_or(f64::NAN);
                if want_max { x > y } else { x < y }
            }
        };
        if replace {
            best = Some(v);
        }
    }
    best.ok_or_else(|| ExprError::Type("expected at least one argument".into()))
}

// ---------------------------------------------------------------------------
// Reductions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reduction {
    Sum,
    Max,
    Min,
    Mean,
    Std,
}

impl Reduction {
    fn name(self) -> &'static str {
        match self {
            Reduction::Sum => "sum",
            Reduction::Max => "maximum",
            Reduction::Min => "minimum",
            Reduction::Mean => "mean",
            Reduction::Std => "std",
        }
    }

    fn apply(self, lane: ArrayView1<'_, f64>) -> Result<f64> {
        let n = lane.len();
        match self {
            Reduction::Sum => Ok(lane.sum()),
            Reduction::Max | Reduction::Min if n == 0 => Err(ExprError::Value(format!(
                "zero-size array to reduction operation {} which has no identity",
                self.name()
            ))),
            Reduction::Max => Ok(lane.iter().copied().fold(f64::NEG_INFINITY, nan_max)),
            Reduction::Min => Ok(lane.iter().copied().fold(f64::INFINITY, nan_min)),
            Reduction::Mean => Ok(lane.sum() / n as f64),
            Reduction::Std => {
                let mean = lane.sum() / n as f64;
                let var = lane.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / n as f64;
                Ok(var.sqrt())
            }
        }
    }
}

fn nan_max(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else {
        a.max(b)
    }
}

fn nan_min(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else {
        a.min(b)
    }
}

fn normalize_axes(axis: &Value, ndim: usize) -> Result<Vec<usize>> {
    let raw: Vec<i64> = match axis {
        Value::Tuple(items) => items
            .iter()
            .map(|v| v.as_i64().ok_or_else(|| ExprError::Type("axis must be an integer".into())))
            .collect::<Result<_>>()?,
        v => vec![v.as_i64().ok_or_else(|| ExprError::Type("axis must be an integer".into()))?],
    };
    let mut axes = Vec::with_capacity(raw.len());
    for a in raw {
        let n = ndim as i64;
        let wrapped = if a < 0 { a + n } else { a };
        if wrapped < 0 || wrapped >= n {
            return Err(ExprError::Value(format!(
                "axis {a} is out of bounds for array of dimension {ndim}"
            )));
        }
        let axis = wrapped as usize;
        if axes.contains(&axis) {
            return Err(ExprError::Value("duplicate value in 'axis'".into()));
        }
        axes.push(axis);
    }
    Ok(axes)
}

/// Reduce along one axis.
fn reduce_axis(a: &ArrayD<f64>, axis: usize, kind: Reduction) -> Result<ArrayD<f64>> {
    let mut failure = None;
    let out = a.map_axis(Axis(axis), |lane| match kind.apply(lane) {
        Ok(v) => v,
        Err(e) => {
            failure.get_or_insert(e);
            f64::NAN
        }
    });
    match failure {
        Some(e) => Err(e),
        None => Ok(out),
    }
}

/// Reduce over a set of axes, keeping them as unit axes.
fn reduce_keepdims(a: &ArrayD<f64>, axes: &[usize], kind: Reduction) -> Result<ArrayD<f64>> {
    let mut sorted = axes.to_vec();
    sorted.sort_unstable_by(|x, y| y.cmp(x));
    let mut out = a.clone();
    for &ax in &sorted {
        out = reduce_axis(&out, ax, kind)?;
    }
    sorted.reverse();
    for &ax in &sorted {
        out = out.insert_axis(Axis(ax));
    }
    Ok(out)
}

fn reduce(mut args: Args, kind: Reduction) -> Result<Value> {
    args.arity(1, 2)?;
    let axis = args.optional(1, "axis");
    args.reject_keywords()?;
    let a = args.first()?.to_array()?;
    let axes = match axis {
        None | Some(Value::None) => None,
        Some(v) => Some(normalize_axes(&v, a.ndim())?),
    };
    let Some(axes) = axes else {
        let flat = ArrayD::from_shape_vec(IxDyn(&[a.len()]), a.iter().copied().collect())
            .map_err(|e| ExprError::Value(e.to_string()))?;
        let lane = flat.view().into_dimensionality::<ndarray::Ix1>().map_err(|e| ExprError::Value(e.to_string()))?;
        return Ok(Value::Float(kind.apply(lane)?));
    };
    let out = match kind {
        Reduction::Std => {
            let mean = reduce_keepdims(&a, &axes, Reduction::Mean)?;
            let sq = broadcast_with(&a, &mean, |x, m| (x - m) * (x - m))?;
            reduce_keepdims(&sq, &axes, Reduction::Mean)?.mapv(f64::sqrt)
        }
        _ => reduce_keepdims(&a, &axes, kind)?,
    };
    let mut sorted = axes;
    sorted.sort_unstable_by(|x, y| y.cmp(x));
    let mut out = out;
    for ax in sorted {
        out = out.index_axis_move(Axis(ax), 0);
    }
    Ok(Value::from_array(out))
}

fn arg_extreme(a: &ArrayD<f64>, want_max: bool) -> Result<Value> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &x) in a.iter().enumerate() {
        if x.is_nan() {
            return Ok(Value::Int(i as i64));
        }
        let better = match best {
            None => true,
            Some((_, y)) => if want_max { x > y } else { x < y },
        };
        if better {
            best = Some((i, x));
        }
    }
    best.map(|(i, _)| Value::Int(i as i64)).ok_or_else(|| {
        ExprError::Value(format!(
            "attempt to get {} of an empty sequence",
            if want_max { "argmax" } else { "argmin" }
        ))
    })
}

const MAX_ARANGE: usize = 100_000_000;

fn arange(args: Args) -> Result<Value> {
    args.arity(1, 3)?;
    args.reject_keywords()?;
    let nums = args
        .positional
        .iter()
        .map(|v| v.as_f64().ok_or_else(|| ExprError::Type("arange() arguments must be numbers".into())))
        .collect::<Result<Vec<f64>>>()?;
    let (start, stop, step) = match nums.as_slice() {
        [stop] => (0.0, *stop, 1.0),
        [start, stop] => (*start, *stop, 1.0),
        [start, stop, step] => (*start, *stop, *step),
        _ => return Err(ExprError::Type("arange() takes 1 to 3 arguments".into())),
    };
    if step == 0.0 || !step.is_finite() || !start.is_finite() || !stop.is_finite() {
        return Err(ExprError::Value("arange() needs finite bounds and a non-zero step".into()));
    }
    let count = ((stop - start) / step).ceil().max(0.0);
    if count > MAX_ARANGE as f64 {
        return Err(ExprError::Value(format!("arange() of {count} elements is too large")));
    }
    let data: Vec<f64> = (0..count as usize).map(|i| start + step * i as f64).collect();
    Ok(Value::from(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arr(shape: &[usize], data: Vec<f64>) -> Value {
        Value::Array(ArrayD::from_shape_vec(IxDyn(shape), data).unwrap())
    }

    fn call0(name: &str, args: Vec<Value>) -> Result<Value> {
        let (f, q) = lookup(name).unwrap();
        call(f, q, args, Vec::new())
    }

    #[test]
    fn lookup_respects_qualifiers() {
        assert_eq!(lookup("np.sqrt"), Some((Builtin::Sqrt, true)));
        assert_eq!(lookup("sqrt"), Some((Builtin::Sqrt, false)));
        assert_eq!(lookup("np.int"), None);
        assert_eq!(lookup("eval"), None);
    }

    #[test]
    fn reductions_with_axis() {
        let a = arr(&[2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(call0("np.sum", vec![a.clone()]).unwrap(), Value::Float(21.0));
        let rows = call(Builtin::Sum, true, vec![a.clone()], vec![("axis".into(), Value::Int(1))]).unwrap();
        assert_eq!(rows, arr(&[2], vec![6.0, 15.0]));
        let cols = call0("np.max", vec![a.clone(), Value::Int(0)]).unwrap();
        assert_eq!(cols, arr(&[3], vec![4.0, 5.0, 6.0]));
        let both = call0("np.mean", vec![a.clone(), Value::Tuple(vec![Value::Int(0), Value::Int(-1)])]).unwrap();
        assert_eq!(both, Value::Float(3.5));
        assert!(call0("np.sum", vec![a, Value::Int(2)]).is_err());
    }

    #[test]
    fn std_over_axis_matches_population_std() {
        let a = arr(&[2, 2], vec![1.0, 3.0, 5.0, 9.0]);
        assert_eq!(call0("np.std", vec![a.clone(), Value::Int(1)]).unwrap(), arr(&[2], vec![1.0, 2.0]));
        assert_eq!(call0("std", vec![arr(&[2], vec![1.0, 3.0])]).unwrap(), Value::Float(1.0));
    }

    #[test]
    fn python_max_of_scalars() {
        assert_eq!(call0("max", vec![Value::Int(3), Value::Float(4.5)]).unwrap(), Value::Float(4.5));
        assert_eq!(call0("min", vec![Value::Int(3), Value::Int(7)]).unwrap(), Value::Int(3));
    }

    #[test]
    fn rounding_is_half_even() {
        assert_eq!(call0("round", vec![Value::Float(2.5)]).unwrap(), Value::Int(2));
        assert_eq!(call0("round", vec![Value::Float(3.5)]).unwrap(), Value::Int(4));
        assert_eq!(call0("round", vec![Value::Float(3.14159), Value::Int(2)]).unwrap(), Value::Float(3.14));
        assert_eq!(call0("np.round", vec![Value::Float(2.7)]).unwrap(), Value::Float(3.0));
    }

    #[test]
    fn conversions() {
        assert_eq!(call0("int", vec![Value::Float(-3.7)]).unwrap(), Value::Int(-3));
        assert_eq!(call0("int", vec![Value::from(" 42 ")]).unwrap(), Value::Int(42));
        assert!(call0("int", vec![Value::from("4.2")]).is_err());
        assert_eq!(call0("float", vec![Value::from("4.25")]).unwrap(), Value::Float(4.25));
        assert_eq!(call0("str", vec![Value::Float(2.0)]).unwrap(), Value::from("2.0"));
        assert_eq!(call0("len", vec![arr(&[4, 2], vec![0.0; 8])]).unwrap(), Value::Int(4));
        assert_eq!(
            call0("np.shape", vec![arr(&[4, 2], vec![0.0; 8])]).unwrap(),
            Value::Tuple(vec![Value::Int(4), Value::Int(2)])
        );
    }

    #[test]
    fn argmax_and_arange() {
        assert_eq!(call0("np.argmax", vec![arr(&[4], vec![1.0, 7.0, 7.0, 2.0])]).unwrap(), Value::Int(1));
        assert_eq!(call0("np.arange", vec![Value::Int(3)]).unwrap(), arr(&[3], vec![0.0, 1.0, 2.0]));
        assert_eq!(
            call0("np.arange", vec![Value::Int(1), Value::Int(2), Value::Float(0.5)]).unwrap(),
            arr(&[2], vec![1.0, 1.5])
        );
    }

    #[test]
    fn empty_max_is_an_error() {
        assert!(call0("np.max", vec![arr(&[0], vec![])]).is_err());
        assert_eq!(call0("np.sum", vec![arr(&[0], vec![])]).unwrap(), Value::Float(0.0));
    }
}
