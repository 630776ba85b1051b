//! Evaluating expressions and templates against a map and an open container.
//!
//! Identifiers are loaded lazily: an expression is compiled first, and only
//! the free names of the compiled form are read. A name resolves through, in
//! order, attribute references, local values, the combined namespace, the
//! `filename`/`filepath` extras and the sigil prefixes:
//!
//! | form     | value                                      |
//! |----------|--------------------------------------------|
//! | `_name`  | dataset path                               |
//! | `__name` | identifier derived from the dataset path   |
//! | `s_name` | one-line summary, with units               |
//! | `d_name` | live dataset handle, indexable for partial reads |
//!
//! A `d_name` handle keeps its backing storage alive after the container it
//! came from is dropped. Values derived from it are not tied to the
//! container's lifetime either.

use std::collections::HashMap;
use std::path::Path;

use hdfmap_expr::{
    compile, format_value, parse_template, ExprError, Interpreter, Namespace, Piece, Result as ExprResult, Value,
};
use hdfmap_tree::{AttrValue, Container, Node, Selection};
use ndarray::Array1;
use tracing::{debug, error, warn};

use crate::coerce::{coerce, summarize};
use crate::error::{Error, Result};
use crate::map::HdfMap;
use crate::options::EvalOptions;

/// Convert a stored attribute to an expression value.
pub fn attr_to_value(attr: &AttrValue) -> Value {
    match attr {
        AttrValue::F64(v) => Value::Float(*v),
        AttrValue::I64(v) => Value::Int(*v),
        AttrValue::U64(v) => i64::try_from(*v).map_or(Value::Float(*v as f64), Value::Int),
        AttrValue::F64Array(v) => Value::Array(Array1::from(v.clone()).into_dyn()),
        AttrValue::I64Array(v) => Value::Array(Array1::from_iter(v.iter().map(|x| *x as f64)).into_dyn()),
        AttrValue::StringArray(v) => Value::TextArray(Array1::from(v.clone()).into_dyn()),
        AttrValue::String(_) | AttrValue::Bytes(_) => Value::Text(attr.to_text().unwrap_or_default()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sigil {
    Path,
    Identifier,
    Summary,
    Handle,
}

fn split_sigil(name: &str) -> Option<(Sigil, &str)> {
    let (sigil, base) = if let Some(base) = name.strip_prefix("__") {
        (Sigil::Identifier, base)
    } else if let Some(base) = name.strip_prefix("s_") {
        (Sigil::Summary, base)
    } else if let Some(base) = name.strip_prefix("d_") {
        (Sigil::Handle, base)
    } else {
        (Sigil::Path, name.strip_prefix('_')?)
    };
    (!base.is_empty()).then_some((sigil, base))
}

const EXTRAS: [&str; 2] = ["filename", "filepath"];

/// One evaluation context: a map plus the container to read from.
pub(crate) struct Scope<'a> {
    map: &'a HdfMap,
    container: &'a dyn Container,
}

impl<'a> Scope<'a> {
    pub(crate) fn new(map: &'a HdfMap, container: &'a dyn Container) -> Self {
        Self { map, container }
    }

    fn has_dataset(&self, path: &str) -> bool {
        matches!(self.container.get(path), Ok(Some(Node::Dataset(_))))
    }

    fn sigil_target(&self, name: &str) -> Option<(Sigil, &'a str)> {
        let (sigil, base) = split_sigil(name)?;
        self.map.get_path(base).map(|path| (sigil, path))
    }

    fn extra(&self, name: &str) -> Option<Value> {
        let location = self.container.location();
        match name {
            "filepath" => Some(Value::Text(location.to_string())),
            "filename" => {
                let file = Path::new(location)
                    .file_name()
                    .map_or_else(|| location.to_string(), |f| f.to_string_lossy().into_owned());
                Some(Value::Text(file))
            }
            _ => None,
        }
    }

    /// Value of one free name, or `None` when nothing provides it.
    fn load(&self, name: &str) -> ExprResult<Option<Value>> {
        if let Some(value) = self.map.local_values.get(name) {
            return Ok(Some(value.clone()));
        }
        if let Some(path) = self.map.get_path(name) {
            if self.has_dataset(path) {
                let handle = self.container.dataset(path)?;
                return Ok(Some(coerce(handle.as_ref(), &Selection::all(), false)?));
            }
            warn!(name, path, file = self.container.location(), "mapped dataset is missing from container");
        }
        if let Some(value) = self.extra(name) {
            return Ok(Some(value));
        }
        let Some((sigil, path)) = self.sigil_target(name) else {
            return Ok(None);
        };
        let value = match sigil {
            Sigil::Path => Value::Text(path.to_string()),
            Sigil::Identifier => Value::Text(
                self.map
                    .datasets
                    .get(path)
                    .map(|d| d.display_name.clone())
                    .unwrap_or_default(),
            ),
            Sigil::Summary => {
                if !self.has_dataset(path) {
                    return Ok(None);
                }
                Value::Text(summarize(self.container.dataset(path)?.as_ref(), true)?)
            }
            Sigil::Handle => {
                if !self.has_dataset(path) {
                    return Ok(None);
                }
                Value::Handle(self.container.dataset(path)?)
            }
        };
        Ok(Some(value))
    }

    /// Evaluate one expression, reusing and extending `cache`.
    pub(crate) fn evaluate(
        &self,
        expression: &str,
        default: &Value,
        cache: &mut HashMap<String, Value>,
    ) -> ExprResult<Value> {
        let expression = expression.trim();
        if expression.starts_with('/') && self.has_dataset(expression) {
            debug!(path = expression, "reading literal dataset path");
            let handle = self.container.dataset(expression)?;
            return Ok(coerce(handle.as_ref(), &Selection::all(), false)?);
        }
        let compiled = compile(expression, self)?;
        cache.extend(compiled.attributes.iter().map(|(k, v)| (k.clone(), v.clone())));
        let names = compiled.names();
        debug!(expression, ?names, "evaluating");
        for name in names {
            if cache.contains_key(&name) {
                continue;
            }
            let value = match self.load(&name)? {
                Some(value) => value,
                None => {
                    debug!(name = %name, "unknown identifier, using default");
                    default.clone()
                }
            };
            cache.insert(name, value);
        }
        Interpreter::new(cache).eval(&compiled.expr)
    }

    /// Render a brace template.
    pub(crate) fn format(&self, template: &str, default: &Value, cache: &mut HashMap<String, Value>) -> ExprResult<String> {
        let mut out = String::with_capacity(template.len());
        for piece in parse_template(template)? {
            match piece {
                Piece::Literal(text) => out.push_str(&text),
                Piece::Field { expr, conversion, spec } => {
                    let value = self.evaluate(&expr, default, cache)?;
                    out.push_str(&format_value(&value, conversion, &spec)?);
                }
            }
        }
        Ok(out)
    }
}

impl Namespace for Scope<'_> {
    fn contains(&self, name: &str) -> bool {
        self.map.local_values.contains_key(name)
            || self.map.get_path(name).is_some_and(|p| self.has_dataset(p))
            || EXTRAS.contains(&name)
            || self.sigil_target(name).is_some()
    }

    fn attribute(&self, name: &str, attr: &str) -> Option<Value> {
        let path = self.map.get_path(name).or_else(|| self.map.get_group_path(name))?;
        match self.container.get(path) {
            Ok(Some(node)) => node.attrs().get(attr).map(attr_to_value),
            _ => self.map.get_attribute(path, attr).map(attr_to_value),
        }
    }

    fn macro_body(&self, name: &str) -> Option<String> {
        self.map.named_macros.get(name).cloned()
    }
}

/// Errors in the expression itself, reported whatever the error policy.
fn is_malformed(e: &ExprError) -> bool {
    matches!(
        e,
        ExprError::Syntax { .. } | ExprError::Unsafe(_) | ExprError::UnknownFunction(_) | ExprError::MacroCycle(_)
    )
}

fn settle<T>(
    expression: &str,
    result: ExprResult<T>,
    options: &EvalOptions,
    on_error: impl FnOnce(String) -> T,
) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(e) if is_malformed(&e) => Err(Error::Expr(e)),
        Err(e) if options.raise_on_error => Err(Error::Evaluation { expression: expression.to_string(), source: e }),
        Err(e) => {
            error!(expression, error = %e, "evaluation failed");
            Ok(on_error(format!("error: {e}")))
        }
    }
}

impl HdfMap {
    /// Evaluate `expression` against this map, reading from `container`.
    ///
    /// Unknown identifiers take `options.default`. Evaluation failures are
    /// returned as [`Error::Evaluation`], or as `Value::Text("error: ...")`
    /// when `options.raise_on_error` is off. Malformed expressions are always
    /// errors.
    pub fn evaluate(&self, container: &dyn Container, expression: &str, options: &EvalOptions) -> Result<Value> {
        self.logger.scope(|| {
            let mut cache = HashMap::new();
            let result = Scope::new(self, container).evaluate(expression, &options.default, &mut cache);
            settle(expression, result, options, Value::Text)
        })
    }

    /// Render a template with `{expression!conversion:spec}` fields.
    pub fn format(&self, container: &dyn Container, template: &str, options: &EvalOptions) -> Result<String> {
        self.logger.scope(|| {
            let mut cache = HashMap::new();
            let result = Scope::new(self, container).format(template, &options.default, &mut cache);
            settle(template, result, options, |msg| msg)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hdfmap_tree::{FileBuilder, MemoryFile};

    fn file() -> MemoryFile {
        let mut f = FileBuilder::new();
        let mut entry = f.create_group("entry");
        entry.set_attr("NX_class", AttrValue::String("NXentry".into()));
        let mut meas = entry.create_group("measurement");
        meas.create_dataset("energy")
            .with_f64_value(3.58)
            .set_attr("units", AttrValue::String("eV".into()));
        meas.create_dataset("eta").with_f64_data(&[1.0, 2.0, 3.0]);
        meas.create_dataset("sum").with_i64_data(&[10, 20, 30]);
        entry.add_group(meas.finish());
        f.add_group(entry.finish());
        f.finish("/data/1234.nxs").unwrap()
    }

    fn map_for(file: &MemoryFile) -> HdfMap {
        let mut map = HdfMap::new();
        map.populate(file).unwrap();
        map
    }

    #[test]
    fn sigils_split() {
        assert_eq!(split_sigil("_eta"), Some((Sigil::Path, "eta")));
        assert_eq!(split_sigil("__eta"), Some((Sigil::Identifier, "eta")));
        assert_eq!(split_sigil("s_eta"), Some((Sigil::Summary, "eta")));
        assert_eq!(split_sigil("d_eta"), Some((Sigil::Handle, "eta")));
        assert_eq!(split_sigil("eta"), None);
        assert_eq!(split_sigil("_"), None);
    }

    #[test]
    fn sigils_resolve() {
        let f = file();
        let map = map_for(&f);
        let eval = |e: &str| map.evaluate(&f, e, &EvalOptions::default()).unwrap();
        assert_eq!(eval("_energy"), Value::from("/entry/measurement/energy"));
        assert_eq!(eval("__measurement_eta"), Value::from("eta"));
        assert_eq!(eval("s_energy"), Value::from("3.58 eV"));
        assert_eq!(eval("d_eta[1]"), Value::Float(2.0));
        assert_eq!(eval("filename"), Value::from("1234.nxs"));
        assert_eq!(eval("filepath"), Value::from("/data/1234.nxs"));
    }

    #[test]
    fn attributes_and_literal_paths() {
        let f = file();
        let map = map_for(&f);
        let eval = |e: &str| map.evaluate(&f, e, &EvalOptions::default()).unwrap();
        assert_eq!(eval("energy@units"), Value::from("eV"));
        assert_eq!(eval("/entry/measurement/energy"), Value::Float(3.58));
        assert_eq!(eval("missing@units"), Value::from("--"));
    }

    #[test]
    fn error_policy() {
        let f = file();
        let map = map_for(&f);
        let err = map.evaluate(&f, "eta + 'x'", &EvalOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Evaluation { .. }), "{err:?}");

        let text = map.evaluate(&f, "eta + 'x'", &EvalOptions::tolerant()).unwrap();
        assert!(matches!(text, Value::Text(s) if s.starts_with("error: ")));

        let err = map.evaluate(&f, "eta.__class__", &EvalOptions::tolerant()).unwrap_err();
        assert!(matches!(err, Error::Expr(_)), "{err:?}");
    }

    #[test]
    fn templates_share_loaded_values() {
        let f = file();
        let map = map_for(&f);
        let text = map
            .format(&f, "{filename}: {energy:.1f} {energy@units} max={np.max(sum)}", &EvalOptions::default())
            .unwrap();
        assert_eq!(text, "1234.nxs: 3.6 eV max=30.0");
    }

    #[test]
    fn locals_shadow_datasets() {
        let f = file();
        let mut map = map_for(&f);
        map.add_local("energy", 9.0).unwrap();
        assert_eq!(map.evaluate(&f, "energy", &EvalOptions::default()).unwrap(), Value::Float(9.0));
    }
}
