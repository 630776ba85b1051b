//! Turning raw dataset reads into semantic values and short summaries.

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use hdfmap_expr::{datetime_text, Value};
use hdfmap_tree::{float_repr, shape_repr, DatasetHandle, RawData, Result, Selection};
use ndarray::ArrayD;
use regex::{Captures, Regex};

const UNITS_ATTR: &str = "units";
const DECIMALS_ATTR: &str = "decimals";

fn long_float() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+\.\d{5,}").ok()).as_ref()
}

/// Round numbers with five or more decimals in `text` to three decimals.
///
/// ```
/// use hdfmap::round_string_floats;
///
/// assert_eq!(
///     round_string_floats("scan eta 74.89533603616637 76.49533603616636 0.02 pil3_100k 1"),
///     "scan eta 74.895 76.495 0.02 pil3_100k 1",
/// );
/// ```
pub fn round_string_floats(text: &str) -> String {
    let Some(re) = long_float() else {
        return text.to_string();
    };
    re.replace_all(text, |caps: &Captures<'_>| {
        let m = &caps[0];
        match m.parse::<f64>() {
            Ok(v) => float_repr((v * 1000.0).round_ties_even() / 1000.0),
            Err(_) => m.to_string(),
        }
    })
    .into_owned()
}

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse an ISO-8601 style timestamp. Offsets are dropped, keeping the
/// local wall-clock time.
pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.len() < 10 {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%:z"] {
        if let Ok(dt) = DateTime::parse_from_str(text, format) {
            return Some(dt.naive_local());
        }
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn map_all<T>(text: &ArrayD<String>, f: impl Fn(&str) -> Option<T>) -> Option<ArrayD<T>> {
    if text.is_empty() {
        return None;
    }
    let parsed: Vec<T> = text.iter().map(|s| f(s)).collect::<Option<_>>()?;
    ArrayD::from_shape_vec(text.raw_dim(), parsed).ok()
}

/// Read `selection` of a dataset as a semantic value.
///
/// Rules, first match wins:
/// 1. `direct`: the read as stored.
/// 2. numeric storage: the read with unit axes removed.
/// 3. text holding integers: integer scalar or array.
/// 4. text holding timestamps: datetime scalar or array.
/// 5. other text: a scalar has long floats rounded; arrays are unchanged.
pub fn coerce(handle: &dyn DatasetHandle, selection: &Selection, direct: bool) -> Result<Value> {
    let raw = handle.read(selection)?;
    if direct {
        return Ok(Value::from_raw(raw));
    }
    let text = match raw.squeeze() {
        RawData::Text(text) => text,
        numeric => return Ok(Value::from_raw(numeric)),
    };
    if let Some(ints) = map_all(&text, |s| s.trim().parse::<i64>().ok()) {
        return Ok(if ints.ndim() == 0 {
            Value::Int(ints.iter().next().copied().unwrap_or(0))
        } else {
            Value::Array(ints.mapv(|v| v as f64))
        });
    }
    if let Some(times) = map_all(&text, parse_datetime) {
        return Ok(if times.ndim() == 0 {
            times.iter().next().map_or(Value::None, |t| Value::Datetime(*t))
        } else {
            Value::DatetimeArray(times)
        });
    }
    if text.ndim() == 0 {
        let s = text.iter().next().cloned().unwrap_or_default();
        return Ok(Value::Text(round_string_floats(&s)));
    }
    Ok(Value::TextArray(text))
}

fn first_and_count(first: String, count: usize) -> String {
    format!("'{first}' ... ({count})")
}

/// One-line description of a dataset.
///
/// Numeric arrays give `dtype (shape)`; numeric scalars give the value,
/// rounded by a `decimals` attribute and followed by `units` when
/// `with_units` is set; text is quoted, with arrays shown as their first
/// element and a count.
pub fn summarize(handle: &dyn DatasetHandle, with_units: bool) -> Result<String> {
    let info = handle.info();
    if !info.dtype.is_text() {
        if info.size() != 1 {
            return Ok(format!("{} {}", info.dtype, shape_repr(&info.shape)));
        }
        let value = coerce(handle, &Selection::all(), false)?;
        let mut text = match (info.attr(DECIMALS_ATTR).and_then(|d| d.as_i64()), value.as_f64()) {
            (Some(decimals), Some(x)) if !matches!(value, Value::Int(_)) => {
                format!("{x:.*}", decimals.clamp(0, 17) as usize)
            }
            _ => value.to_string(),
        };
        if with_units {
            if let Some(units) = info.attr(UNITS_ATTR).and_then(|u| u.to_text()) {
                if !units.is_empty() {
                    text = format!("{text} {units}");
                }
            }
        }
        return Ok(text);
    }
    Ok(match coerce(handle, &Selection::all(), false)? {
        Value::Text(s) => format!("'{s}'"),
        Value::Datetime(dt) => format!("'{}'", datetime_text(&dt)),
        Value::TextArray(a) => first_and_count(a.iter().next().cloned().unwrap_or_default(), a.len()),
        Value::DatetimeArray(a) => {
            first_and_count(a.iter().next().map(datetime_text).unwrap_or_default(), a.len())
        }
        Value::Array(a) => format!("int64 {}", shape_repr(a.shape())),
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use hdfmap_tree::{AttrValue, Container, FileBuilder, MemoryFile};

    fn file() -> MemoryFile {
        let mut b = FileBuilder::new();
        b.create_dataset("energy")
            .with_f64_value(3.58123456)
            .set_attr("units", AttrValue::String("keV".into()))
            .set_attr("decimals", AttrValue::I64(2));
        b.create_dataset("column").with_f64_data(&[1.0, 2.0, 3.0]).with_shape(&[3, 1]);
        b.create_dataset("count").with_string_value("42");
        b.create_dataset("start_time").with_string_value("2024-03-05T14:07:09.250+01:00");
        b.create_dataset("times").with_strings(&["2024-03-05 14:07:09", "2024-03-05 14:08:09"]);
        b.create_dataset("command").with_string_value("scan eta 74.89533603616637 76.4953360 0.02");
        b.create_dataset("names").with_strings(&["alpha", "beta", "gamma"]);
        b.finish("coerce.h5").unwrap()
    }

    #[test]
    fn numeric_reads_are_squeezed() {
        let f = file();
        let column = coerce(f.dataset("/column").unwrap().as_ref(), &Selection::all(), false).unwrap();
        assert_eq!(column.shape(), vec![3]);
        let raw = coerce(f.dataset("/column").unwrap().as_ref(), &Selection::all(), true).unwrap();
        assert_eq!(raw.shape(), vec![3, 1]);
    }

    #[test]
    fn text_is_interpreted_in_order() {
        let f = file();
        let read = |p: &str| coerce(f.dataset(p).unwrap().as_ref(), &Selection::all(), false).unwrap();
        assert_eq!(read("/count"), Value::Int(42));
        match read("/start_time") {
            Value::Datetime(dt) => {
                assert_eq!(dt.hour(), 14);
                assert_eq!(dt.nanosecond(), 250_000_000);
            }
            other => panic!("expected datetime, got {other:?}"),
        }
        assert!(matches!(read("/times"), Value::DatetimeArray(a) if a.len() == 2));
        assert_eq!(read("/command"), Value::from("scan eta 74.895 76.495 0.02"));
        assert!(matches!(read("/names"), Value::TextArray(a) if a.len() == 3));
    }

    #[test]
    fn summaries() {
        let f = file();
        let s = |p: &str, units: bool| summarize(f.dataset(p).unwrap().as_ref(), units).unwrap();
        assert_eq!(s("/energy", true), "3.58 keV");
        assert_eq!(s("/energy", false), "3.58");
        assert_eq!(s("/column", true), "float64 (3, 1)");
        assert_eq!(s("/names", true), "'alpha' ... (3)");
        assert_eq!(s("/times", true), "'2024-03-05 14:07:09' ... (2)");
        assert_eq!(s("/command", true), "'scan eta 74.895 76.495 0.02'");
    }

    #[test]
    fn datetime_forms() {
        assert!(parse_datetime("2024-03-05").is_some());
        assert!(parse_datetime("2024-03-05T14:07").is_some());
        assert!(parse_datetime("2024-03-05T14:07:09Z").is_some());
        assert!(parse_datetime("not a date").is_none());
        assert!(parse_datetime("42").is_none());
    }
}
