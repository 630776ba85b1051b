//! Tokenizer for the extended expression grammar.
//!
//! Besides numbers, strings, names and the usual operators, the token stream
//! carries the dataset-aware markers `@` (attribute), `?` (default) and `|`
//! (alternation). `np.<name>` is read as one qualified name; any other `.`
//! after a name is attribute access and is rejected here, before parsing.

use crate::error::{ExprError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    DoubleSlash,
    Percent,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Assign,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    At,
    Question,
    Pipe,
    Ellipsis,
}

impl TokenKind {
    pub fn ident(&self) -> Option<&str> {
        match self {
            TokenKind::Ident(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, TokenKind::Int(_) | TokenKind::Float(_) | TokenKind::Str(_))
    }
}

/// Byte range of a token in its source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Namespaces accepted as a function qualifier.
const QUALIFIERS: [&str; 2] = ["np", "numpy"];

fn line_col(input: &str, offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut col = 1;
    for (i, ch) in input.char_indices() {
        if i >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}

pub(crate) fn syntax_error(input: &str, span: Span, message: impl Into<String>) -> ExprError {
    let (line, col) = line_col(input, span.start);
    ExprError::Syntax { message: message.into(), line, col }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let at = |i: usize| chars.get(i).map(|&(_, c)| c);
    let offset = |i: usize| chars.get(i).map(|&(o, _)| o).unwrap_or(input.len());

    let mut tokens = Vec::new();
    let mut i = 0;
    while let Some(c) = at(i) {
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        let start = i;

        // Two- and three-character operators first.
        let (kind, width) = match (c, at(i + 1), at(i + 2)) {
            ('.', Some('.'), Some('.')) => (Some(TokenKind::Ellipsis), 3),
            ('*', Some('*'), _) => (Some(TokenKind::DoubleStar), 2),
            ('/', Some('/'), _) => (Some(TokenKind::DoubleSlash), 2),
            ('=', Some('='), _) => (Some(TokenKind::Eq), 2),
            ('!', Some('='), _) => (Some(TokenKind::Ne), 2),
            ('<', Some('='), _) => (Some(TokenKind::Le), 2),
            ('>', Some('='), _) => (Some(TokenKind::Ge), 2),
            ('+', ..) => (Some(TokenKind::Plus), 1),
            ('-', ..) => (Some(TokenKind::Minus), 1),
            ('*', ..) => (Some(TokenKind::Star), 1),
            ('/', ..) => (Some(TokenKind::Slash), 1),
            ('%', ..) => (Some(TokenKind::Percent), 1),
            ('(', ..) => (Some(TokenKind::LParen), 1),
            (')', ..) => (Some(TokenKind::RParen), 1),
            ('[', ..) => (Some(TokenKind::LBracket), 1),
            (']', ..) => (Some(TokenKind::RBracket), 1),
            (',', ..) => (Some(TokenKind::Comma), 1),
            (':', ..) => (Some(TokenKind::Colon), 1),
            ('=', ..) => (Some(TokenKind::Assign), 1),
            ('<', ..) => (Some(TokenKind::Lt), 1),
            ('>', ..) => (Some(TokenKind::Gt), 1),
            ('@', ..) => (Some(TokenKind::At), 1),
            ('?', ..) => (Some(TokenKind::Question), 1),
            ('|', ..) => (Some(TokenKind::Pipe), 1),
            _ => (None, 0),
        };
        if let Some(kind) = kind {
            i += width;
            tokens.push(Token::new(kind, Span { start: offset(start), end: offset(i) }));
            continue;
        }

        let kind = if c.is_ascii_digit() || (c == '.' && at(i + 1).is_some_and(|d| d.is_ascii_digit())) {
            let mut is_float = false;
            while at(i).is_some_and(|d| d.is_ascii_digit()) {
                i += 1;
            }
            if at(i) == Some('.') && at(i + 1) != Some('.') {
                is_float = true;
                i += 1;
                while at(i).is_some_and(|d| d.is_ascii_digit()) {
                    i += 1;
                }
            }
            if matches!(at(i), Some('e' | 'E')) {
                let mut j = i + 1;
                if matches!(at(j), Some('+' | '-')) {
                    j += 1;
                }
                if at(j).is_some_and(|d| d.is_ascii_digit()) {
                    is_float = true;
                    i = j;
                    while at(i).is_some_and(|d| d.is_ascii_digit()) {
                        i += 1;
                    }
                }
            }
            let text = &input[offset(start)..offset(i)];
            let span = Span { start: offset(start), end: offset(i) };
            if is_float {
                let v: f64 = text
                    .parse()
                    .map_err(|_| syntax_error(input, span, format!("invalid number '{text}'")))?;
                TokenKind::Float(v)
            } else {
                match text.parse::<i64>() {
                    Ok(v) => TokenKind::Int(v),
                    Err(_) => TokenKind::Float(
                        text.parse()
                            .map_err(|_| syntax_error(input, span, format!("invalid number '{text}'")))?,
                    ),
                }
            }
        } else if c == '\'' || c == '"' {
            let quote = c;
            i += 1;
            let mut text = String::new();
            loop {
                match at(i) {
                    None => {
                        return Err(syntax_error(
                            input,
                            Span { start: offset(start), end: input.len() },
                            "unterminated string literal",
                        ))
                    }
                    Some(ch) if ch == quote => {
                        i += 1;
                        break;
                    }
                    Some('\\') => {
                        match at(i + 1) {
                            Some('n') => text.push('\n'),
                            Some('t') => text.push('\t'),
                            Some('r') => text.push('\r'),
                            Some(ch @ ('\\' | '\'' | '"')) => text.push(ch),
                            Some(ch) => {
                                text.push('\\');
                                text.push(ch);
                            }
                            None => text.push('\\'),
                        }
                        i += 2;
                    }
                    Some(ch) => {
                        text.push(ch);
                        i += 1;
                    }
                }
            }
            TokenKind::Str(text)
        } else if is_ident_start(c) {
            while at(i).is_some_and(is_ident_char) {
                i += 1;
            }
            let mut name = input[offset(start)..offset(i)].to_string();
            if at(i) == Some('.') && at(i + 1) != Some('.') {
                let qualified = QUALIFIERS.contains(&name.as_str())
                    && at(i + 1).is_some_and(is_ident_start);
                if !qualified {
                    return Err(ExprError::Unsafe(format!(
                        "attribute access '{}'",
                        &input[offset(start)..offset((i + 2).min(chars.len()))]
                    )));
                }
                i += 1;
                let member_start = i;
                while at(i).is_some_and(is_ident_char) {
                    i += 1;
                }
                name = format!("np.{}", &input[offset(member_start)..offset(i)]);
                if at(i) == Some('.') && at(i + 1) != Some('.') {
                    return Err(ExprError::Unsafe(format!("attribute access '{name}.'")));
                }
            }
            TokenKind::Ident(name)
        } else if c == '.' {
            return Err(ExprError::Unsafe("attribute access '.'".into()));
        } else {
            let span = Span { start: offset(start), end: offset(start + 1) };
            return Err(syntax_error(input, span, format!("unexpected character '{c}'")));
        };
        tokens.push(Token::new(kind, Span { start: offset(start), end: offset(i) }));
    }
    Ok(tokens)
}
