//! Runtime values of the expression language.

use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDateTime, Timelike};
use hdfmap_tree::{float_repr, shape_repr, DatasetHandle, RawData, Selection};
use ndarray::{ArrayD, IxDyn};

use crate::error::{ExprError, Result};

/// A dataset-derived or computed value.
///
/// Numeric arrays are held as `f64`. A `Handle` is an unread dataset; it is
/// read when indexed or passed to a function that needs the data.
#[derive(Debug, Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Datetime(NaiveDateTime),
    Array(ArrayD<f64>),
    TextArray(ArrayD<String>),
    DatetimeArray(ArrayD<NaiveDateTime>),
    Tuple(Vec<Value>),
    Handle(Arc<dyn DatasetHandle>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "str",
            Value::Datetime(_) => "datetime",
            Value::Array(_) | Value::TextArray(_) | Value::DatetimeArray(_) => "ndarray",
            Value::Tuple(_) => "tuple",
            Value::Handle(_) => "Dataset",
        }
    }

    /// Wrap a float array, collapsing rank 0 to a scalar.
    pub fn from_array(array: ArrayD<f64>) -> Value {
        if array.ndim() == 0 {
            Value::Float(array.iter().next().copied().unwrap_or(f64::NAN))
        } else {
            Value::Array(array)
        }
    }

    /// Wrap a string array, collapsing rank 0 to a scalar.
    pub fn from_text_array(array: ArrayD<String>) -> Value {
        if array.ndim() == 0 {
            Value::Text(array.iter().next().cloned().unwrap_or_default())
        } else {
            Value::TextArray(array)
        }
    }

    /// Raw dataset read, without any interpretation of text.
    pub fn from_raw(raw: RawData) -> Value {
        match raw {
            RawData::Float(a) => Value::from_array(a),
            RawData::Int(a) if a.ndim() == 0 => Value::Int(a.iter().next().copied().unwrap_or(0)),
            RawData::Int(a) => Value::Array(a.mapv(|v| v as f64)),
            RawData::Text(a) => Value::from_text_array(a),
        }
    }

    /// Read a dataset handle in full; other values are returned unchanged.
    pub fn materialize(self) -> Result<Value> {
        match self {
            Value::Handle(h) => Ok(Value::from_raw(h.read(&Selection::all())?)),
            other => Ok(other),
        }
    }

    pub fn is_numeric_scalar(&self) -> bool {
        matches!(self, Value::Bool(_) | Value::Int(_) | Value::Float(_))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Bool(b) => Some(f64::from(u8::from(*b))),
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Array(a) if a.len() == 1 => a.iter().next().copied(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayD<f64>> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Numeric array view of the value; scalars become rank-0 arrays and
    /// nested tuples become stacked arrays.
    pub fn to_array(&self) -> Result<ArrayD<f64>> {
        match self {
            Value::Array(a) => Ok(a.clone()),
            Value::Bool(_) | Value::Int(_) | Value::Float(_) => {
                Ok(ArrayD::from_elem(IxDyn(&[]), self.as_f64().unwrap_or(f64::NAN)))
            }
            Value::Tuple(items) => {
                let parts = items.iter().map(|v| v.to_array()).collect::<Result<Vec<_>>>()?;
                let inner: Vec<usize> = parts.first().map(|p| p.shape().to_vec()).unwrap_or_default();
                if parts.iter().any(|p| p.shape() != inner.as_slice()) {
                    return Err(ExprError::Value("setting an array element with a sequence: inhomogeneous shape".into()));
                }
                let mut shape = vec![parts.len()];
                shape.extend(inner);
                let data: Vec<f64> = parts.iter().flat_map(|p| p.iter().copied()).collect();
                ArrayD::from_shape_vec(IxDyn(&shape), data).map_err(|e| ExprError::Value(e.to_string()))
            }
            Value::Handle(_) => self.clone().materialize()?.to_array(),
            other => Err(ExprError::Type(format!("expected a number or numeric array, got {}", other.type_name()))),
        }
    }

    pub fn shape(&self) -> Vec<usize> {
        match self {
            Value::Array(a) => a.shape().to_vec(),
            Value::TextArray(a) => a.shape().to_vec(),
            Value::DatetimeArray(a) => a.shape().to_vec(),
            Value::Tuple(items) => vec![items.len()],
            Value::Handle(h) => h.shape().to_vec(),
            _ => Vec::new(),
        }
    }

    /// Truth value; multi-element arrays are ambiguous.
    pub fn is_truthy(&self) -> Result<bool> {
        Ok(match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(v) => *v != 0,
            Value::Float(v) => *v != 0.0,
            Value::Text(s) => !s.is_empty(),
            Value::Tuple(items) => !items.is_empty(),
            Value::Datetime(_) | Value::Handle(_) => true,
            Value::Array(a) => match a.len() {
                0 => false,
                1 => a.iter().next().is_some_and(|v| *v != 0.0),
                _ => return Err(ambiguous()),
            },
            Value::TextArray(a) => match a.len() {
                0 => false,
                1 => a.iter().next().is_some_and(|v| !v.is_empty()),
                _ => return Err(ambiguous()),
            },
            Value::DatetimeArray(a) => match a.len() {
                0 => false,
                1 => true,
                _ => return Err(ambiguous()),
            },
        })
    }

    /// Quoted representation, as used inside tuples and by `!r`.
    pub fn repr(&self) -> String {
        match self {
            Value::Text(s) => format!("'{s}'"),
            Value::Datetime(dt) => format!("datetime('{}')", datetime_text(dt)),
            other => other.to_string(),
        }
    }
}

fn ambiguous() -> ExprError {
    ExprError::Value(
        "the truth value of an array with more than one element is ambiguous; use any() or all()".into(),
    )
}

/// `YYYY-MM-DD HH:MM:SS`, with microseconds when present.
pub fn datetime_text(dt: &NaiveDateTime) -> String {
    let micros = dt.nanosecond() / 1000;
    if micros == 0 {
        dt.format("%Y-%m-%d %H:%M:%S").to_string()
    } else {
        format!("{}.{micros:06}", dt.format("%Y-%m-%d %H:%M:%S"))
    }
}

fn array_text<T>(array: &ArrayD<T>, item: &dyn Fn(&T) -> String) -> String {
    fn walk<T>(view: ndarray::ArrayViewD<'_, T>, item: &dyn Fn(&T) -> String) -> String {
        if view.ndim() == 0 {
            return view.iter().next().map(item).unwrap_or_default();
        }
        if view.ndim() == 1 {
            let parts: Vec<String> = view.iter().map(item).collect();
            if parts.len() > 1000 {
                return format!("[{} ... {}]", parts[..3].join(" "), parts[parts.len() - 3..].join(" "));
            }
            return format!("[{}]", parts.join(" "));
        }
        let rows: Vec<String> = view.outer_iter().map(|row| walk(row, item)).collect();
        format!("[{}]", rows.join("\n "))
    }
    walk(array.view(), item)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("None"),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => f.write_str(&float_repr(*v)),
            Value::Text(s) => f.write_str(s),
            Value::Datetime(dt) => f.write_str(&datetime_text(dt)),
            Value::Array(a) => f.write_str(&array_text(a, &|v| float_repr(*v))),
            Value::TextArray(a) => f.write_str(&array_text(a, &|s| format!("'{s}'"))),
            Value::DatetimeArray(a) => f.write_str(&array_text(a, &|d| format!("'{}'", datetime_text(d)))),
            Value::Tuple(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.repr()).collect();
                if parts.len() == 1 {
                    write!(f, "({},)", parts[0])
                } else {
                    write!(f, "({})", parts.join(", "))
                }
            }
            Value::Handle(h) => write!(
                f,
                "<dataset \"{}\": shape {}, type \"{}\">",
                h.path(),
                shape_repr(h.shape()),
                h.info().dtype
            ),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Datetime(a), Value::Datetime(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::TextArray(a), Value::TextArray(b)) => a == b,
            (Value::DatetimeArray(a), Value::DatetimeArray(b)) => a == b,
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Handle(a), Value::Handle(b)) => Arc::ptr_eq(a, b),
            (Value::Int(a), Value::Int(b)) => a == b,
            (a, b) if a.is_numeric_scalar() && b.is_numeric_scalar() => a.as_f64() == b.as_f64(),
            _ => false,
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<ArrayD<f64>> for Value {
    fn from(v: ArrayD<f64>) -> Self {
        Value::from_array(v)
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::Array(ArrayD::from_shape_vec(IxDyn(&[v.len()]), v).unwrap_or_else(|_| ArrayD::zeros(IxDyn(&[0]))))
    }
}
