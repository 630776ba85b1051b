//! Extended syntax: lowering dataset-aware markers to plain expressions.
//!
//! ```text
//!   source ──tokenize──▶ tokens ──build──▶ [Ir] ──lower(ns)──▶ tokens ──parse──▶ Expr
//!                                          │
//!                                          ├─ AttributeRef   name@attr
//!                                          ├─ DefaultRef     name?(expr)
//!                                          ├─ AlternateRef   (a|b|c)
//!                                          └─ MacroRef       registered name
//! ```
//!
//! Building the IR only needs the macro table. Lowering consults the
//! namespace to pick branches and collects attribute values in a side table
//! keyed by the synthesized `name@attr` identifier.

use std::collections::HashMap;

use tracing::trace;

use crate::ast::Expr;
use crate::error::{ExprError, Result};
use crate::parser::parse;
use crate::token::{syntax_error, tokenize, Span, Token, TokenKind};
use crate::value::Value;

/// What the rewriter needs to know about the names an expression can use.
pub trait Namespace {
    /// Whether `name` resolves to something loadable.
    fn contains(&self, name: &str) -> bool;

    /// Value of attribute `attr` on the dataset `name` refers to.
    fn attribute(&self, name: &str, attr: &str) -> Option<Value>;

    /// Body of a registered macro.
    fn macro_body(&self, name: &str) -> Option<String>;
}

/// Intermediate form between tokens and the plain grammar.
#[derive(Debug, Clone, PartialEq)]
pub enum Ir {
    Token(Token),
    AttributeRef { name: String, attr: String, span: Span },
    DefaultRef { name: String, default: Vec<Ir>, span: Span },
    AlternateRef { alternatives: Vec<Vec<Ir>>, span: Span },
    MacroRef { name: String, body: Vec<Ir>, span: Span },
}

/// Synthesized identifier holding an attribute value.
pub fn attribute_key(name: &str, attr: &str) -> String {
    format!("{name}@{attr}")
}

/// A parsed expression plus the attribute values it refers to.
#[derive(Debug, Clone)]
pub struct Compiled {
    pub expr: Expr,
    pub attributes: HashMap<String, Value>,
}

impl Compiled {
    /// Identifiers that must be supplied before evaluation.
    pub fn names(&self) -> Vec<String> {
        self.expr.free_names()
    }
}

/// Tokenize, expand, resolve and parse `input`.
pub fn compile<N: Namespace + ?Sized>(input: &str, ns: &N) -> Result<Compiled> {
    let tokens = tokenize(input)?;
    let mut stack = Vec::new();
    let ir = build(input, &tokens, ns, &mut stack)?;
    let mut plain = Vec::with_capacity(tokens.len());
    let mut attributes = HashMap::new();
    lower(&ir, ns, &mut plain, &mut attributes, None);
    let expr = parse(input, &plain)?;
    trace!(input, attributes = attributes.len(), "compiled expression");
    Ok(Compiled { expr, attributes })
}

// ---------------------------------------------------------------------------
// IR construction
// ---------------------------------------------------------------------------

fn kind_at(tokens: &[Token], i: usize) -> Option<&TokenKind> {
    tokens.get(i).map(|t| &t.kind)
}

fn matching_paren(input: &str, tokens: &[Token], open: usize) -> Result<usize> {
    let mut depth = 0usize;
    for (i, tok) in tokens.iter().enumerate().skip(open) {
        match tok.kind {
            TokenKind::LParen => depth += 1,
            TokenKind::RParen => {
                depth -= 1;
                if depth == 0 {
                    return Ok(i);
                }
            }
            _ => {}
        }
    }
    Err(syntax_error(input, tokens[open].span, "'(' was never closed"))
}

/// Indices of `|` at the top level of `tokens`.
fn top_level_pipes(tokens: &[Token]) -> Vec<usize> {
    let mut depth = 0i32;
    let mut out = Vec::new();
    for (i, tok) in tokens.iter().enumerate() {
        match tok.kind {
            TokenKind::LParen | TokenKind::LBracket => depth += 1,
            TokenKind::RParen | TokenKind::RBracket => depth -= 1,
            TokenKind::Pipe if depth == 0 => out.push(i),
            _ => {}
        }
    }
    out
}

fn build<N: Namespace + ?Sized>(
    input: &str,
    tokens: &[Token],
    ns: &N,
    stack: &mut Vec<String>,
) -> Result<Vec<Ir>> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        let tok = &tokens[i];
        match &tok.kind {
            TokenKind::Ident(name) if kind_at(tokens, i + 1) == Some(&TokenKind::At) => {
                let Some(Token { kind: TokenKind::Ident(attr), span }) = tokens.get(i + 2) else {
                    return Err(syntax_error(input, tokens[i + 1].span, "expected attribute name after '@'"));
                };
                out.push(Ir::AttributeRef {
                    name: name.clone(),
                    attr: attr.clone(),
                    span: Span { start: tok.span.start, end: span.end },
                });
                i += 3;
            }
            TokenKind::Ident(name) if kind_at(tokens, i + 1) == Some(&TokenKind::Question) => {
                let open = i + 2;
                if kind_at(tokens, open) != Some(&TokenKind::LParen) {
                    return Err(syntax_error(input, tokens[i + 1].span, "expected '(' after '?'"));
                }
                let close = matching_paren(input, tokens, open)?;
                if close == open + 1 {
                    return Err(syntax_error(input, tokens[open].span, "empty default"));
                }
                let default = build(input, &tokens[open + 1..close], ns, stack)?;
                out.push(Ir::DefaultRef {
                    name: name.clone(),
                    default,
                    span: Span { start: tok.span.start, end: tokens[close].span.end },
                });
                i = close + 1;
            }
            TokenKind::Ident(name) if kind_at(tokens, i + 1) != Some(&TokenKind::LParen) => {
                match ns.macro_body(name) {
                    Some(body) => out.push(expand_macro(name, &body, tok.span, ns, stack)?),
                    None => out.push(Ir::Token(tok.clone())),
                }
                i += 1;
            }
            TokenKind::LParen => {
                let close = matching_paren(input, tokens, i)?;
                let inner = &tokens[i + 1..close];
                let pipes = top_level_pipes(inner);
                if pipes.is_empty() {
                    out.push(Ir::Token(tok.clone()));
                    i += 1;
                    continue;
                }
                let mut alternatives = Vec::with_capacity(pipes.len() + 1);
                let mut start = 0;
                for end in pipes.into_iter().chain(std::iter::once(inner.len())) {
                    let part = &inner[start..end];
                    let anchor = part.first().map_or(tok.span, |t| t.span);
                    let alt = build(input, part, ns, stack)?;
                    if !is_simple_alternative(&alt) {
                        return Err(syntax_error(
                            input,
                            anchor,
                            "alternatives must be names, name@attr, name?(default) or literals",
                        ));
                    }
                    alternatives.push(alt);
                    start = end + 1;
                }
                out.push(Ir::AlternateRef {
                    alternatives,
                    span: Span { start: tok.span.start, end: tokens[close].span.end },
                });
                i = close + 1;
            }
            TokenKind::At | TokenKind::Question | TokenKind::Pipe => {
                let symbol = match tok.kind {
                    TokenKind::At => "@",
                    TokenKind::Question => "?",
                    _ => "|",
                };
                return Err(syntax_error(input, tok.span, format!("unexpected '{symbol}'")));
            }
            _ => {
                out.push(Ir::Token(tok.clone()));
                i += 1;
            }
        }
    }
    Ok(out)
}

fn expand_macro<N: Namespace + ?Sized>(
    name: &str,
    body: &str,
    span: Span,
    ns: &N,
    stack: &mut Vec<String>,
) -> Result<Ir> {
    if stack.iter().any(|s| s == name) {
        return Err(ExprError::MacroCycle(name.to_string()));
    }
    stack.push(name.to_string());
    let expanded = tokenize(body).and_then(|tokens| build(body, &tokens, ns, stack));
    stack.pop();
    let body = expanded?;
    if body.is_empty() {
        return Err(ExprError::Value(format!("macro '{name}' is empty")));
    }
    Ok(Ir::MacroRef { name: name.to_string(), body, span })
}

fn is_simple_alternative(alt: &[Ir]) -> bool {
    match alt {
        [Ir::Token(t)] => matches!(t.kind, TokenKind::Ident(_)) || t.kind.is_literal(),
        [Ir::Token(sign), Ir::Token(num)] => {
            sign.kind == TokenKind::Minus && matches!(num.kind, TokenKind::Int(_) | TokenKind::Float(_))
        }
        [Ir::AttributeRef { .. }] | [Ir::DefaultRef { .. }] | [Ir::MacroRef { .. }] => true,
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

fn is_present<N: Namespace + ?Sized>(alt: &[Ir], ns: &N) -> bool {
    match alt {
        [Ir::Token(Token { kind: TokenKind::Ident(name), .. })] => ns.contains(name),
        [Ir::AttributeRef { name, attr, .. }] => ns.attribute(name, attr).is_some(),
        [Ir::DefaultRef { name, .. }] => ns.contains(name),
        [Ir::MacroRef { .. }] => true,
        _ => false,
    }
}

fn push(out: &mut Vec<Token>, kind: TokenKind, span: Span, at: Option<Span>) {
    out.push(Token::new(kind, at.unwrap_or(span)));
}

/// Lower IR to plain tokens. `at` replaces the spans of macro-body tokens
/// so errors point at the macro name in the caller's text.
fn lower<N: Namespace + ?Sized>(
    ir: &[Ir],
    ns: &N,
    out: &mut Vec<Token>,
    attributes: &mut HashMap<String, Value>,
    at: Option<Span>,
) {
    for node in ir {
        match node {
            Ir::Token(t) => push(out, t.kind.clone(), t.span, at),
            Ir::AttributeRef { name, attr, span } => {
                let key = attribute_key(name, attr);
                if let Some(value) = ns.attribute(name, attr) {
                    attributes.insert(key.clone(), value);
                }
                push(out, TokenKind::Ident(key), *span, at);
            }
            Ir::DefaultRef { name, default, span } => {
                if ns.contains(name) {
                    push(out, TokenKind::Ident(name.clone()), *span, at);
                } else {
                    push(out, TokenKind::LParen, *span, at);
                    lower(default, ns, out, attributes, at);
                    push(out, TokenKind::RParen, *span, at);
                }
            }
            Ir::AlternateRef { alternatives, span } => {
                let chosen = alternatives
                    .iter()
                    .find(|alt| is_present(alt, ns))
                    .or_else(|| alternatives.last());
                if let Some(alt) = chosen {
                    push(out, TokenKind::LParen, *span, at);
                    lower(alt, ns, out, attributes, at);
                    push(out, TokenKind::RParen, *span, at);
                }
            }
            Ir::MacroRef { body, span, .. } => {
                let here = Some(at.unwrap_or(*span));
                push(out, TokenKind::LParen, *span, here);
                lower(body, ns, out, attributes, here);
                push(out, TokenKind::RParen, *span, here);
            }
        }
    }
}
