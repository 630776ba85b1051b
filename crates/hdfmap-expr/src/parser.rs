//! Recursive-descent parser from plain tokens to [`Expr`].
//!
//! Precedence, loosest first: tuple `,` / `x if c else y` / `or` / `and` /
//! `not` / comparisons and `in` / `+ -` / `* / // %` / unary `- +` / `**` /
//! subscripts. Calls are only possible on allow-listed built-in names, and
//! there is no syntax for attribute access, assignment or definitions.

use crate::ast::{BinaryOp, CompareOp, Expr, IndexItem, Literal, UnaryOp};
use crate::builtins;
use crate::error::{ExprError, Result};
use crate::token::{syntax_error, Span, Token, TokenKind};

/// Words that belong to statements or definitions.
const FORBIDDEN: [&str; 22] = [
    "lambda", "import", "from", "def", "class", "for", "while", "del", "global", "nonlocal",
    "with", "as", "return", "yield", "assert", "raise", "try", "except", "finally", "async",
    "await", "pass",
];

const KEYWORDS: [&str; 9] = ["if", "else", "and", "or", "not", "in", "is", "True", "False"];

pub fn parse(input: &str, tokens: &[Token]) -> Result<Expr> {
    if let Some(word) = tokens
        .iter()
        .filter_map(|t| t.kind.ident())
        .find(|name| FORBIDDEN.contains(name))
    {
        return Err(ExprError::Unsafe(format!("'{word}'")));
    }
    let mut parser = Parser { input, tokens, pos: 0 };
    if tokens.is_empty() {
        return Err(syntax_error(input, Span::default(), "empty expression"));
    }
    let expr = parser.parse_tuple()?;
    match parser.peek() {
        None => Ok(expr),
        Some(t) => Err(parser.unexpected(t.clone())),
    }
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Int(v) => v.to_string(),
        TokenKind::Float(v) => v.to_string(),
        TokenKind::Str(s) => format!("'{s}'"),
        TokenKind::Ident(s) => s.clone(),
        TokenKind::Plus => "+".into(),
        TokenKind::Minus => "-".into(),
        TokenKind::Star => "*".into(),
        TokenKind::DoubleStar => "**".into(),
        TokenKind::Slash => "/".into(),
        TokenKind::DoubleSlash => "//".into(),
        TokenKind::Percent => "%".into(),
        TokenKind::LParen => "(".into(),
        TokenKind::RParen => ")".into(),
        TokenKind::LBracket => "[".into(),
        TokenKind::RBracket => "]".into(),
        TokenKind::Comma => ",".into(),
        TokenKind::Colon => ":".into(),
        TokenKind::Assign => "=".into(),
        TokenKind::Eq => "==".into(),
        TokenKind::Ne => "!=".into(),
        TokenKind::Lt => "<".into(),
        TokenKind::Le => "<=".into(),
        TokenKind::Gt => ">".into(),
        TokenKind::Ge => ">=".into(),
        TokenKind::At => "@".into(),
        TokenKind::Question => "?".into(),
        TokenKind::Pipe => "|".into(),
        TokenKind::Ellipsis => "...".into(),
    }
}

struct Parser<'a> {
    input: &'a str,
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.peek().map(|t| &t.kind)
    }

    fn peek_ident(&self) -> Option<&str> {
        self.peek_kind().and_then(|k| k.ident())
    }

    fn nth_kind(&self, n: usize) -> Option<&TokenKind> {
        self.tokens.get(self.pos + n).map(|t| &t.kind)
    }

    fn advance(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn end_span(&self) -> Span {
        Span { start: self.input.len(), end: self.input.len() }
    }

    fn unexpected(&self, t: Token) -> ExprError {
        if t.kind == TokenKind::Assign {
            return ExprError::Unsafe("assignment".into());
        }
        syntax_error(self.input, t.span, format!("unexpected '{}'", describe(&t.kind)))
    }

    fn expect(&mut self, expected: TokenKind) -> Result<()> {
        match self.advance() {
            Some(t) if t.kind == expected => Ok(()),
            Some(t) => Err(syntax_error(
                self.input,
                t.span,
                format!("expected '{}', got '{}'", describe(&expected), describe(&t.kind)),
            )),
            None => Err(syntax_error(
                self.input,
                self.end_span(),
                format!("expected '{}', got end of input", describe(&expected)),
            )),
        }
    }

    fn eat_keyword(&mut self, word: &str) -> bool {
        if self.peek_ident() == Some(word) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Whether the next token can begin an operand.
    fn at_operand(&self) -> bool {
        match self.peek_kind() {
            Some(TokenKind::Ident(name)) => {
                !KEYWORDS.contains(&name.as_str()) || matches!(name.as_str(), "not" | "True" | "False")
            }
            Some(
                TokenKind::Int(_)
                | TokenKind::Float(_)
                | TokenKind::Str(_)
                | TokenKind::LParen
                | TokenKind::LBracket
                | TokenKind::Minus
                | TokenKind::Plus,
            ) => true,
            _ => false,
        }
    }

    // ── Grammar rules ──────────────────────────────────────────

    fn parse_tuple(&mut self) -> Result<Expr> {
        let first = self.parse_ternary()?;
        if self.peek_kind() != Some(&TokenKind::Comma) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.peek_kind() == Some(&TokenKind::Comma) {
            self.advance();
            if !self.at_operand() {
                break;
            }
            items.push(self.parse_ternary()?);
        }
        Ok(Expr::Tuple(items))
    }

    fn parse_ternary(&mut self) -> Result<Expr> {
        let body = self.parse_or()?;
        if !self.eat_keyword("if") {
            return Ok(body);
        }
        let cond = self.parse_or()?;
        if !self.eat_keyword("else") {
            let span = self.peek().map(|t| t.span).unwrap_or_else(|| self.end_span());
            return Err(syntax_error(self.input, span, "expected 'else' in conditional expression"));
        }
        let otherwise = self.parse_ternary()?;
        Ok(Expr::IfElse { cond: Box::new(cond), then: Box::new(body), otherwise: Box::new(otherwise) })
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_and()?;
        while self.eat_keyword("or") {
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_not()?;
        while self.eat_keyword("and") {
            let right = self.parse_not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr> {
        if self.eat_keyword("not") {
            let inner = self.parse_not()?;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let first = self.parse_arith()?;
        let mut rest = Vec::new();
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Eq) => CompareOp::Eq,
                Some(TokenKind::Ne) => CompareOp::Ne,
                Some(TokenKind::Lt) => CompareOp::Lt,
                Some(TokenKind::Le) => CompareOp::Le,
                Some(TokenKind::Gt) => CompareOp::Gt,
                Some(TokenKind::Ge) => CompareOp::Ge,
                Some(TokenKind::Ident(w)) if w == "in" => CompareOp::In,
                Some(TokenKind::Ident(w))
                    if w == "not" && self.nth_kind(1).and_then(|k| k.ident()) == Some("in") =>
                {
                    self.advance();
                    CompareOp::NotIn
                }
                Some(TokenKind::Ident(w)) if w == "is" => {
                    if self.nth_kind(1).and_then(|k| k.ident()) == Some("not") {
                        self.advance();
                        CompareOp::Ne
                    } else {
                        CompareOp::Eq
                    }
                }
                _ => break,
            };
            self.advance();
            rest.push((op, self.parse_arith()?));
        }
        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Compare(Box::new(first), rest))
        }
    }

    fn parse_arith(&mut self) -> Result<Expr> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Plus) => BinaryOp::Add,
                Some(TokenKind::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_term()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr> {
        let mut left = self.parse_factor()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Star) => BinaryOp::Mul,
                Some(TokenKind::Slash) => BinaryOp::Div,
                Some(TokenKind::DoubleSlash) => BinaryOp::FloorDiv,
                Some(TokenKind::Percent) => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_factor()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> Result<Expr> {
        match self.peek_kind() {
            Some(TokenKind::Minus) => {
                self.advance();
                Ok(Expr::Unary(UnaryOp::Neg, Box::new(self.parse_factor()?)))
            }
            Some(TokenKind::Plus) => {
                self.advance();
                Ok(Expr::Unary(UnaryOp::Pos, Box::new(self.parse_factor()?)))
            }
            _ => self.parse_power(),
        }
    }

    fn parse_power(&mut self) -> Result<Expr> {
        let base = self.parse_postfix()?;
        if self.peek_kind() == Some(&TokenKind::DoubleStar) {
            self.advance();
            let exponent = self.parse_factor()?;
            return Ok(Expr::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_atom()?;
        loop {
            match self.peek_kind() {
                Some(TokenKind::LBracket) => {
                    self.advance();
                    let items = self.parse_subscript()?;
                    expr = Expr::Subscript(Box::new(expr), items);
                }
                Some(TokenKind::LParen) => {
                    return Err(ExprError::Unsafe("calling a computed value".into()));
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_subscript(&mut self) -> Result<Vec<IndexItem>> {
        let mut items = Vec::new();
        loop {
            match self.peek_kind() {
                Some(TokenKind::RBracket) => {
                    let t = self.advance();
                    if items.is_empty() {
                        let span = t.map(|t| t.span).unwrap_or_default();
                        return Err(syntax_error(self.input, span, "empty subscript"));
                    }
                    return Ok(items);
                }
                Some(TokenKind::Ellipsis) => {
                    self.advance();
                    items.push(IndexItem::Ellipsis);
                }
                _ => items.push(self.parse_index_item()?),
            }
            match self.peek_kind() {
                Some(TokenKind::Comma) => {
                    self.advance();
                }
                Some(TokenKind::RBracket) => {}
                _ => {
                    return match self.advance() {
                        Some(t) => Err(self.unexpected(t)),
                        None => Err(syntax_error(self.input, self.end_span(), "expected ']'")),
                    }
                }
            }
        }
    }

    fn slice_part(&mut self) -> Result<Option<Expr>> {
        match self.peek_kind() {
            Some(TokenKind::Colon | TokenKind::Comma | TokenKind::RBracket) | None => Ok(None),
            _ => Ok(Some(self.parse_ternary()?)),
        }
    }

    fn parse_index_item(&mut self) -> Result<IndexItem> {
        let start = self.slice_part()?;
        if self.peek_kind() != Some(&TokenKind::Colon) {
            return match start {
                Some(Expr::Literal(Literal::None)) => Ok(IndexItem::NewAxis),
                Some(e) => Ok(IndexItem::Index(e)),
                None => match self.advance() {
                    Some(t) => Err(self.unexpected(t)),
                    None => Err(syntax_error(self.input, self.end_span(), "expected index")),
                },
            };
        }
        self.advance();
        let stop = self.slice_part()?;
        let step = if self.peek_kind() == Some(&TokenKind::Colon) {
            self.advance();
            self.slice_part()?
        } else {
            None
        };
        Ok(IndexItem::Slice { start, stop, step })
    }

    fn parse_call(&mut self, name: &str) -> Result<Expr> {
        let (func, qualified) =
            builtins::lookup(name).ok_or_else(|| ExprError::UnknownFunction(name.to_string()))?;
        self.expect(TokenKind::LParen)?;
        let mut args = Vec::new();
        let mut kwargs: Vec<(String, Expr)> = Vec::new();
        while self.peek_kind() != Some(&TokenKind::RParen) {
            let keyword = match (self.peek_kind(), self.nth_kind(1)) {
                (Some(TokenKind::Ident(k)), Some(TokenKind::Assign)) => Some(k.clone()),
                _ => None,
            };
            if let Some(k) = keyword {
                self.advance();
                self.advance();
                kwargs.push((k, self.parse_ternary()?));
            } else {
                if !kwargs.is_empty() {
                    let span = self.peek().map(|t| t.span).unwrap_or_else(|| self.end_span());
                    return Err(syntax_error(self.input, span, "positional argument follows keyword argument"));
                }
                args.push(self.parse_ternary()?);
            }
            match self.peek_kind() {
                Some(TokenKind::Comma) => {
                    self.advance();
                }
                Some(TokenKind::RParen) => {}
                _ => {
                    return match self.advance() {
                        Some(t) => Err(self.unexpected(t)),
                        None => Err(syntax_error(self.input, self.end_span(), "expected ')'")),
                    }
                }
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok(Expr::Call { func, qualified, args, kwargs })
    }

    fn parse_atom(&mut self) -> Result<Expr> {
        let Some(tok) = self.advance() else {
            return Err(syntax_error(self.input, self.end_span(), "unexpected end of input"));
        };
        match tok.kind {
            TokenKind::Int(v) => Ok(Expr::Literal(Literal::Int(v))),
            TokenKind::Float(v) => Ok(Expr::Literal(Literal::Float(v))),
            TokenKind::Str(s) => {
                let mut text = s;
                while let Some(TokenKind::Str(next)) = self.peek_kind() {
                    text.push_str(next);
                    self.advance();
                }
                Ok(Expr::Literal(Literal::Str(text)))
            }
            TokenKind::Ident(name) => {
                let calling = self.peek_kind() == Some(&TokenKind::LParen);
                match name.as_str() {
                    "True" => Ok(Expr::Literal(Literal::Bool(true))),
                    "False" => Ok(Expr::Literal(Literal::Bool(false))),
                    "None" | "np.newaxis" => Ok(Expr::Literal(Literal::None)),
                    w if KEYWORDS.contains(&w) => {
                        Err(syntax_error(self.input, tok.span, format!("unexpected keyword '{w}'")))
                    }
                    _ if calling => self.parse_call(&name),
                    _ => {
                        if let Some(v) = builtins::constant(&name) {
                            Ok(Expr::Literal(Literal::Float(v)))
                        } else if name.starts_with("np.") {
                            match builtins::lookup(&name) {
                                Some(_) => Err(ExprError::Type(format!("function '{name}' must be called"))),
                                None => Err(ExprError::UnknownFunction(name)),
                            }
                        } else {
                            Ok(Expr::Name(name))
                        }
                    }
                }
            }
            TokenKind::LParen => {
                if self.peek_kind() == Some(&TokenKind::RParen) {
                    self.advance();
                    return Ok(Expr::Tuple(Vec::new()));
                }
                let inner = self.parse_tuple()?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::LBracket => {
                let mut items = Vec::new();
                while self.peek_kind() != Some(&TokenKind::RBracket) {
                    items.push(self.parse_ternary()?);
                    match self.peek_kind() {
                        Some(TokenKind::Comma) => {
                            self.advance();
                        }
                        Some(TokenKind::RBracket) => {}
                        _ => {
                            return match self.advance() {
                                Some(t) => Err(self.unexpected(t)),
                                None => Err(syntax_error(self.input, self.end_span(), "expected ']'")),
                            }
                        }
                    }
                }
                self.expect(TokenKind::RBracket)?;
                Ok(Expr::List(items))
            }
            _ => Err(self.unexpected(tok)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::Builtin;
    use crate::token::tokenize;

    fn parse_str(input: &str) -> Result<Expr> {
        let tokens = tokenize(input)?;
        parse(input, &tokens)
    }

    fn name(n: &str) -> Box<Expr> {
        Box::new(Expr::Name(n.into()))
    }

    #[test]
    fn precedence_of_arithmetic() {
        let e = parse_str("a + b * c ** 2").unwrap();
        match e {
            Expr::Binary(BinaryOp::Add, l, r) => {
                assert_eq!(l, name("a"));
                assert!(matches!(*r, Expr::Binary(BinaryOp::Mul, _, _)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn power_binds_tighter_than_unary_minus() {
        let e = parse_str("-2 ** 2").unwrap();
        assert!(matches!(e, Expr::Unary(UnaryOp::Neg, ref inner) if matches!(**inner, Expr::Binary(BinaryOp::Pow, _, _))));
    }

    #[test]
    fn conditional_expression() {
        let e = parse_str("idutrp if iddgap == 100 else iddtrp").unwrap();
        match e {
            Expr::IfElse { cond, then, otherwise } => {
                assert_eq!(then, name("idutrp"));
                assert_eq!(otherwise, name("iddtrp"));
                assert!(matches!(*cond, Expr::Compare(_, _)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn calls_with_keywords_and_qualifiers() {
        let e = parse_str("np.sum(vol, axis=0)").unwrap();
        match e {
            Expr::Call { func, qualified, args, kwargs } => {
                assert_eq!(func, Builtin::Sum);
                assert!(qualified);
                assert_eq!(args.len(), 1);
                assert_eq!(kwargs[0].0, "axis");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn subscripts_with_slices_and_ellipsis() {
        let e = parse_str("d_IMAGE[..., 10:20, ::2]").unwrap();
        match e {
            Expr::Subscript(_, items) => {
                assert_eq!(items.len(), 3);
                assert_eq!(items[0], IndexItem::Ellipsis);
                assert!(matches!(items[2], IndexItem::Slice { start: None, stop: None, step: Some(_) }));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn tuples() {
        assert!(matches!(parse_str("a, b").unwrap(), Expr::Tuple(v) if v.len() == 2));
        assert!(matches!(parse_str("(a,)").unwrap(), Expr::Tuple(v) if v.len() == 1));
        assert!(matches!(parse_str("()").unwrap(), Expr::Tuple(v) if v.is_empty()));
    }

    #[test]
    fn free_names_skip_functions_and_constants() {
        let e = parse_str("np.sqrt(signal) / count_time + np.pi * signal").unwrap();
        assert_eq!(e.free_names(), vec!["signal".to_string(), "count_time".to_string()]);
    }

    #[test]
    fn disallowed_constructs() {
        assert!(matches!(parse_str("x = 1"), Err(ExprError::Unsafe(_))));
        assert!(matches!(parse_str("lambda: 1"), Err(ExprError::Unsafe(_))));
        assert!(matches!(parse_str("[x for x in y]"), Err(ExprError::Unsafe(_))));
        assert!(matches!(parse_str("open('f')"), Err(ExprError::UnknownFunction(_))));
        assert!(matches!(parse_str("__import__('os')"), Err(ExprError::UnknownFunction(_))));
        assert!(matches!(parse_str("(abs)(1)"), Err(ExprError::Type(_)) | Err(ExprError::Unsafe(_)) | Err(ExprError::Syntax { .. })));
    }

    #[test]
    fn syntax_errors() {
        assert!(matches!(parse_str("a +"), Err(ExprError::Syntax { .. })));
        assert!(matches!(parse_str("(a"), Err(ExprError::Syntax { .. })));
        assert!(matches!(parse_str("a b"), Err(ExprError::Syntax { .. })));
        assert!(matches!(parse_str("a | b"), Err(ExprError::Syntax { .. })));
    }
}
