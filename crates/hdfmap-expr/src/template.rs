//! Brace templates and the format-spec mini-language.
//!
//! A template is literal text with `{expr!conv:spec}` fields; `{{` and `}}`
//! are literal braces. Each field is compiled like any other expression, so
//! templates accept the full extended syntax.

use chrono::format::{Item, StrftimeItems};
use hdfmap_tree::float_repr;

use crate::error::{ExprError, Result};
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Piece {
    Literal(String),
    Field {
        expr: String,
        conversion: Option<char>,
        spec: String,
    },
}

/// Largest width or precision a format spec may ask for.
const MAX_SPEC_NUMBER: usize = 10_000;

fn format_error(msg: impl Into<String>) -> ExprError {
    ExprError::Format(msg.into())
}

/// Split a template into literal text and replacement fields.
pub fn parse_template(text: &str) -> Result<Vec<Piece>> {
    let chars: Vec<char> = text.chars().collect();
    let mut pieces = Vec::new();
    let mut literal = String::new();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '{' if chars.get(i + 1) == Some(&'{') => {
                literal.push('{');
                i += 2;
            }
            '}' if chars.get(i + 1) == Some(&'}') => {
                literal.push('}');
                i += 2;
            }
            '}' => return Err(format_error("single '}' is not allowed")),
            '{' => {
                if !literal.is_empty() {
                    pieces.push(Piece::Literal(std::mem::take(&mut literal)));
                }
                let (piece, next) = parse_field(&chars, i + 1)?;
                pieces.push(piece);
                i = next;
            }
            c => {
                literal.push(c);
                i += 1;
            }
        }
    }
    if !literal.is_empty() {
        pieces.push(Piece::Literal(literal));
    }
    Ok(pieces)
}

/// Scan one field starting after its `{`; returns the piece and the index
/// after the closing `}`.
fn parse_field(chars: &[char], start: usize) -> Result<(Piece, usize)> {
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut i = start;
    let mut expr_end = None;
    let mut conversion = None;
    while i < chars.len() {
        let c = chars[i];
        if let Some(q) = quote {
            if c == '\\' {
                i += 2;
                continue;
            }
            if c == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' => depth -= 1,
            '}' if depth > 0 => depth -= 1,
            '!' if depth == 0 && chars.get(i + 1) != Some(&'=') => {
                expr_end = Some(i);
                conversion = chars.get(i + 1).copied();
                i += 2;
                break;
            }
            ':' | '}' if depth == 0 => {
                expr_end = Some(i);
                break;
            }
            _ => {}
        }
        i += 1;
    }
    let Some(expr_end) = expr_end else {
        return Err(format_error("expected '}' before end of template"));
    };
    let expr: String = chars[start..expr_end].iter().collect();
    if expr.trim().is_empty() {
        return Err(format_error("empty expression not allowed in template"));
    }
    if let Some(conv) = conversion {
        if !matches!(conv, 'r' | 's' | 'a') {
            return Err(format_error(format!("invalid conversion character '{conv}'")));
        }
    }
    let mut spec = String::new();
    if chars.get(i) == Some(&':') {
        i += 1;
        while i < chars.len() && chars[i] != '}' {
            if chars[i] == '{' {
                return Err(format_error("nested replacement fields are not supported in format specs"));
            }
            spec.push(chars[i]);
            i += 1;
        }
    }
    if chars.get(i) != Some(&'}') {
        return Err(format_error("expected '}' before end of template"));
    }
    Ok((Piece::Field { expr: expr.trim().to_string(), conversion, spec }, i + 1))
}

// ---------------------------------------------------------------------------
// Format spec
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormatSpec {
    pub fill: Option<char>,
    pub align: Option<char>,
    pub sign: Option<char>,
    pub alternate: bool,
    pub zero: bool,
    pub width: Option<usize>,
    pub grouping: Option<char>,
    pub precision: Option<usize>,
    pub kind: Option<char>,
}

impl FormatSpec {
    /// `[[fill]align][sign][#][0][width][,|_][.precision][type]`
    pub fn parse(spec: &str) -> Result<FormatSpec> {
        let chars: Vec<char> = spec.chars().collect();
        let mut out = FormatSpec::default();
        let mut i = 0;
        let is_align = |c: char| matches!(c, '<' | '>' | '^' | '=');
        if chars.len() >= 2 && is_align(chars[1]) {
            out.fill = Some(chars[0]);
            out.align = Some(chars[1]);
            i = 2;
        } else if chars.first().copied().is_some_and(is_align) {
            out.align = Some(chars[0]);
            i = 1;
        }
        if let Some(&c @ ('+' | '-' | ' ')) = chars.get(i) {
            out.sign = Some(c);
            i += 1;
        }
        if chars.get(i) == Some(&'#') {
            out.alternate = true;
            i += 1;
        }
        if chars.get(i) == Some(&'0') {
            out.zero = true;
            i += 1;
        }
        let digits = |i: &mut usize, what: &str| -> Result<Option<usize>> {
            let begin = *i;
            while chars.get(*i).is_some_and(|c| c.is_ascii_digit()) {
                *i += 1;
            }
            if begin == *i {
                return Ok(None);
            }
            match chars[begin..*i].iter().collect::<String>().parse::<usize>() {
                Ok(n) if n <= MAX_SPEC_NUMBER => Ok(Some(n)),
                _ => Err(format_error(format!("{what} too large"))),
            }
        };
        out.width = digits(&mut i, "width")?;
        if let Some(&c @ (',' | '_')) = chars.get(i) {
            out.grouping = Some(c);
            i += 1;
        }
        if chars.get(i) == Some(&'.') {
            i += 1;
            out.precision =
                Some(digits(&mut i, "precision")?.ok_or_else(|| format_error("format specifier missing precision"))?);
        }
        if let Some(&c) = chars.get(i) {
            out.kind = Some(c);
            i += 1;
        }
        if i != chars.len() {
            return Err(format_error(format!("invalid format specifier '{spec}'")));
        }
        Ok(out)
    }

    fn pad(&self, body: String, numeric: bool) -> String {
        let Some(width) = self.width else { return body };
        let len = body.chars().count();
        if len >= width {
            return body;
        }
        let gap = width - len;
        let (fill, align) = match (self.fill, self.align) {
            (fill, Some(align)) => (fill.unwrap_or(if self.zero { '0' } else { ' ' }), align),
            (_, None) if self.zero && numeric => ('0', '='),
            _ => (' ', if numeric { '>' } else { '<' }),
        };
        let run = |n: usize| std::iter::repeat(fill).take(n).collect::<String>();
        match align {
            '<' => body + &run(gap),
            '^' => format!("{}{}{}", run(gap / 2), body, run(gap - gap / 2)),
            '=' => {
                let sign_len = body.chars().take_while(|c| matches!(c, '+' | '-' | ' ')).count();
                let (sign, rest) = body.split_at(sign_len);
                format!("{sign}{}{rest}", run(gap))
            }
            _ => run(gap) + &body,
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Render a value the way a template field does.
pub fn format_value(value: &Value, conversion: Option<char>, spec: &str) -> Result<String> {
    let value = match conversion {
        Some('r' | 'a') => Value::Text(value.repr()),
        Some(_) => Value::Text(value.to_string()),
        None => value.clone(),
    };
    if spec.is_empty() {
        return Ok(value.to_string());
    }
    match &value {
        Value::Datetime(dt) => {
            let items: Vec<Item<'_>> = StrftimeItems::new(spec).collect();
            if items.iter().any(|item| matches!(item, Item::Error)) {
                return Err(format_error(format!("invalid datetime format '{spec}'")));
            }
            Ok(dt.format_with_items(items.into_iter()).to_string())
        }
        Value::Text(s) => {
            let fs = FormatSpec::parse(spec)?;
            format_text(s, &fs)
        }
        Value::Int(v) => format_int(*v, &FormatSpec::parse(spec)?),
        Value::Bool(b) => {
            let fs = FormatSpec::parse(spec)?;
            match fs.kind {
                None | Some('s') => format_text(&value.to_string(), &fs),
                Some(_) => format_int(i64::from(*b), &fs),
            }
        }
        Value::Float(v) => format_float(*v, &FormatSpec::parse(spec)?),
        Value::Array(a) if a.len() == 1 && a.ndim() == 0 => {
            format_float(a.iter().next().copied().unwrap_or(f64::NAN), &FormatSpec::parse(spec)?)
        }
        other => Err(format_error(format!(
            "unsupported format string passed to {}",
            other.type_name()
        ))),
    }
}

fn format_text(s: &str, fs: &FormatSpec) -> Result<String> {
    if !matches!(fs.kind, None | Some('s')) {
        return Err(format_error(format!(
            "unknown format code '{}' for object of type 'str'",
            fs.kind.unwrap_or(' ')
        )));
    }
    if fs.sign.is_some() {
        return Err(format_error("sign not allowed in string format specifier"));
    }
    let body: String = match fs.precision {
        Some(p) => s.chars().take(p).collect(),
        None => s.to_string(),
    };
    Ok(fs.pad(body, false))
}

fn with_sign(negative: bool, digits: String, fs: &FormatSpec) -> String {
    let sign = match (negative, fs.sign) {
        (true, _) => "-",
        (false, Some('+')) => "+",
        (false, Some(' ')) => " ",
        _ => "",
    };
    format!("{sign}{digits}")
}

fn group_digits(int_part: &str, sep: char) -> String {
    let digits: Vec<char> = int_part.chars().collect();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(sep);
        }
        out.push(*c);
    }
    out
}

/// Apply thousands grouping to the integer part of a formatted number.
fn grouped(body: String, fs: &FormatSpec) -> String {
    let Some(sep) = fs.grouping else { return body };
    let end = body.find(|c: char| !c.is_ascii_digit()).unwrap_or(body.len());
    format!("{}{}", group_digits(&body[..end], sep), &body[end..])
}

fn format_int(v: i64, fs: &FormatSpec) -> Result<String> {
    if fs.precision.is_some() && matches!(fs.kind, None | Some('d')) {
        return Err(format_error("precision not allowed in integer format specifier"));
    }
    let magnitude = v.unsigned_abs();
    let body = match fs.kind {
        None | Some('d') | Some('n') => grouped(magnitude.to_string(), fs),
        Some('x') => format!("{}{magnitude:x}", if fs.alternate { "0x" } else { "" }),
        Some('X') => format!("{}{magnitude:X}", if fs.alternate { "0X" } else { "" }),
        Some('o') => format!("{}{magnitude:o}", if fs.alternate { "0o" } else { "" }),
        Some('b') => format!("{}{magnitude:b}", if fs.alternate { "0b" } else { "" }),
        Some('c') => char::from_u32(magnitude as u32).map(String::from).unwrap_or_default(),
        Some('s') => return Err(format_error("unknown format code 's' for object of type 'int'")),
        Some(_) => return format_float(v as f64, fs),
    };
    Ok(fs.pad(with_sign(v < 0, body, fs), true))
}

/// `1.5e+03` style exponent from Rust's `1.5e3`.
fn python_exponent(text: String, upper: bool) -> String {
    let Some(pos) = text.find('e') else { return text };
    let (mantissa, exp) = text.split_at(pos);
    let exp = &exp[1..];
    let (sign, digits) = match exp.strip_prefix('-') {
        Some(d) => ('-', d),
        None => ('+', exp),
    };
    let e = if upper { 'E' } else { 'e' };
    format!("{mantissa}{e}{sign}{digits:0>2}")
}

fn strip_zeros(text: &str) -> String {
    let (mantissa, exp) = match text.find(['e', 'E']) {
        Some(pos) => text.split_at(pos),
        None => (text, ""),
    };
    let mantissa = if mantissa.contains('.') {
        mantissa.trim_end_matches('0').trim_end_matches('.')
    } else {
        mantissa
    };
    format!("{mantissa}{exp}")
}

/// General format of a non-negative finite value with `p` significant digits.
fn general(x: f64, p: usize, keep_zeros: bool, upper: bool) -> String {
    let p = p.max(1);
    let sci = format!("{:.*e}", p - 1, x);
    let exp: i32 = sci
        .rsplit('e')
        .next()
        .and_then(|e| e.parse().ok())
        .unwrap_or(0);
    let text = if -4 <= exp && exp < p as i32 {
        let decimals = (p as i32 - 1 - exp).max(0) as usize;
        format!("{x:.decimals$}")
    } else {
        python_exponent(sci, upper)
    };
    if keep_zeros {
        text
    } else {
        strip_zeros(&text)
    }
}

fn format_float(v: f64, fs: &FormatSpec) -> Result<String> {
    let negative = v.is_sign_negative() && !v.is_nan();
    let x = v.abs();
    let upper = fs.kind.is_some_and(|k| k.is_ascii_uppercase());
    if !x.is_finite() {
        let word = match (x.is_nan(), upper) {
            (true, false) => "nan",
            (true, true) => "NAN",
            (false, false) => "inf",
            (false, true) => "INF",
        };
        let suffix = if fs.kind == Some('%') { "%" } else { "" };
        return Ok(fs.pad(with_sign(negative, format!("{word}{suffix}"), fs), true));
    }
    let body = match fs.kind {
        Some('f' | 'F') => format!("{x:.*}", fs.precision.unwrap_or(6)),
        Some('e' | 'E') => python_exponent(format!("{x:.*e}", fs.precision.unwrap_or(6)), upper),
        Some('g' | 'G' | 'n') => general(x, fs.precision.unwrap_or(6), fs.alternate, upper),
        Some('%') => format!("{:.*}%", fs.precision.unwrap_or(6), x * 100.0),
        None => match fs.precision {
            None => float_repr(x),
            Some(p) => {
                let text = general(x, p, fs.alternate, false);
                if text.contains(['.', 'e']) {
                    text
                } else {
                    format!("{text}.0")
                }
            }
        },
        Some(other) => {
            return Err(format_error(format!(
                "unknown format code '{other}' for object of type 'float'"
            )))
        }
    };
    Ok(fs.pad(with_sign(negative, grouped(body, fs), fs), true))
}
