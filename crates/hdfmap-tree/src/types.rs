//! Attribute values, storage types and link kinds.

use std::collections::BTreeMap;
use std::fmt;

/// Attribute table of a group or dataset, ordered by name.
pub type Attributes = BTreeMap<String, AttrValue>;

/// A decoded attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    F64(f64),
    F64Array(Vec<f64>),
    I64(i64),
    I64Array(Vec<i64>),
    U64(u64),
    String(String),
    StringArray(Vec<String>),
    /// Fixed-length byte string, decoded on demand.
    Bytes(Vec<u8>),
}

impl AttrValue {
    /// Text of a string-like attribute. Byte strings are decoded lossily and a
    /// single-element string array yields its element.
    pub fn to_text(&self) -> Option<String> {
        match self {
            AttrValue::String(s) => Some(s.clone()),
            AttrValue::Bytes(b) => Some(String::from_utf8_lossy(b).into_owned()),
            AttrValue::StringArray(v) if v.len() == 1 => v.first().cloned(),
            _ => None,
        }
    }

    /// Numeric scalar value, if this attribute holds one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::F64(v) => Some(*v),
            AttrValue::I64(v) => Some(*v as f64),
            AttrValue::U64(v) => Some(*v as f64),
            AttrValue::F64Array(v) if v.len() == 1 => v.first().copied(),
            AttrValue::I64Array(v) if v.len() == 1 => v.first().map(|x| *x as f64),
            _ => None,
        }
    }

    /// Integer scalar value, if this attribute holds one.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttrValue::I64(v) => Some(*v),
            AttrValue::U64(v) => i64::try_from(*v).ok(),
            AttrValue::I64Array(v) if v.len() == 1 => v.first().copied(),
            _ => None,
        }
    }

    /// Names held by a string or string-list attribute, e.g. NeXus `axes`.
    pub fn as_string_list(&self) -> Option<Vec<String>> {
        match self {
            AttrValue::StringArray(v) => Some(v.clone()),
            AttrValue::String(_) | AttrValue::Bytes(_) => self.to_text().map(|s| vec![s]),
            _ => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::F64(v) => f.write_str(&float_repr(*v)),
            AttrValue::I64(v) => write!(f, "{v}"),
            AttrValue::U64(v) => write!(f, "{v}"),
            AttrValue::String(s) => f.write_str(s),
            AttrValue::Bytes(b) => f.write_str(&String::from_utf8_lossy(b)),
            AttrValue::F64Array(v) => {
                let items: Vec<String> = v.iter().map(|x| float_repr(*x)).collect();
                write!(f, "[{}]", items.join(", "))
            }
            AttrValue::I64Array(v) => {
                let items: Vec<String> = v.iter().map(|x| x.to_string()).collect();
                write!(f, "[{}]", items.join(", "))
            }
            AttrValue::StringArray(v) => {
                let items: Vec<String> = v.iter().map(|x| format!("'{x}'")).collect();
                write!(f, "[{}]", items.join(", "))
            }
        }
    }
}

/// Shortest round-tripping text for a float, written the way numeric
/// software prints it: `5.0`, `3.58`, `1e-05`, `nan`.
pub fn float_repr(v: f64) -> String {
    if v.is_nan() {
        return "nan".into();
    }
    if v.is_infinite() {
        return if v > 0.0 { "inf".into() } else { "-inf".into() };
    }
    let abs = v.abs();
    if abs != 0.0 && !(1e-4..1e16).contains(&abs) {
        // Rust gives `1e-5` / `1.5e20`; pad the exponent to two digits with a sign.
        let s = format!("{v:e}");
        return match s.split_once('e') {
            Some((mantissa, exp)) => {
                let (sign, digits) = match exp.strip_prefix('-') {
                    Some(d) => ('-', d),
                    None => ('+', exp),
                };
                format!("{mantissa}e{sign}{digits:0>2}")
            }
            None => s,
        };
    }
    let s = format!("{v}");
    if s.contains('.') {
        s
    } else {
        format!("{s}.0")
    }
}

// ---------------------------------------------------------------------------
// Storage types
// ---------------------------------------------------------------------------

/// Storage type of a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DType {
    F32,
    F64,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    Bool,
    /// Fixed-length byte string.
    String,
    VariableLengthString,
    Other(String),
}

impl DType {
    /// Integer and floating point types. Booleans and strings are not numeric.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DType::F32
                | DType::F64
                | DType::I8
                | DType::I16
                | DType::I32
                | DType::I64
                | DType::U8
                | DType::U16
                | DType::U32
                | DType::U64
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self, DType::F32 | DType::F64)
    }

    pub fn is_text(&self) -> bool {
        matches!(self, DType::String | DType::VariableLengthString)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DType::F32 => "float32",
            DType::F64 => "float64",
            DType::I8 => "int8",
            DType::I16 => "int16",
            DType::I32 => "int32",
            DType::I64 => "int64",
            DType::U8 => "uint8",
            DType::U16 => "uint16",
            DType::U32 => "uint32",
            DType::U64 => "uint64",
            DType::Bool => "bool",
            DType::String => "bytes",
            DType::VariableLengthString => "object",
            DType::Other(name) => name,
        };
        f.write_str(name)
    }
}

/// How a child is attached to its parent group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkKind {
    Hard,
    Soft,
    External,
}

/// Format a shape the way array libraries print tuples: `(3,)`, `(2, 5)`, `()`.
pub fn shape_repr(shape: &[usize]) -> String {
    match shape {
        [] => "()".into(),
        [n] => format!("({n},)"),
        _ => {
            let dims: Vec<String> = shape.iter().map(|d| d.to_string()).collect();
            format!("({})", dims.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_repr_matches_numeric_convention() {
        assert_eq!(float_repr(3.58), "3.58");
        assert_eq!(float_repr(5.0), "5.0");
        assert_eq!(float_repr(-2.0), "-2.0");
        assert_eq!(float_repr(1e-5), "1e-05");
        assert_eq!(float_repr(1.5e20), "1.5e+20");
        assert_eq!(float_repr(f64::NAN), "nan");
        assert_eq!(float_repr(0.0), "0.0");
    }

    #[test]
    fn attr_text_decoding() {
        assert_eq!(AttrValue::Bytes(b"NXentry".to_vec()).to_text().as_deref(), Some("NXentry"));
        assert_eq!(
            AttrValue::StringArray(vec!["x".into()]).to_text().as_deref(),
            Some("x")
        );
        assert_eq!(AttrValue::F64(1.0).to_text(), None);
        assert_eq!(
            AttrValue::String("eta".into()).as_string_list(),
            Some(vec!["eta".to_string()])
        );
    }

    #[test]
    fn dtype_names() {
        assert_eq!(DType::F64.to_string(), "float64");
        assert_eq!(DType::U16.to_string(), "uint16");
        assert!(DType::I32.is_numeric());
        assert!(!DType::Bool.is_numeric());
        assert!(!DType::VariableLengthString.is_numeric());
    }

    #[test]
    fn shape_text() {
        assert_eq!(shape_repr(&[]), "()");
        assert_eq!(shape_repr(&[3]), "(3,)");
        assert_eq!(shape_repr(&[2, 5]), "(2, 5)");
    }
}
