//! Abstract syntax tree of plain expressions.

use crate::builtins::Builtin;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::FloorDiv => "//",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::In => "in",
            CompareOp::NotIn => "not in",
        }
    }
}

/// One argument inside `[...]`.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexItem {
    Index(Expr),
    Slice {
        start: Option<Expr>,
        stop: Option<Expr>,
        step: Option<Expr>,
    },
    Ellipsis,
    NewAxis,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Name(String),
    Tuple(Vec<Expr>),
    List(Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    /// Chained comparison `a < b <= c`.
    Compare(Box<Expr>, Vec<(CompareOp, Expr)>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    IfElse {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Call {
        func: Builtin,
        qualified: bool,
        args: Vec<Expr>,
        kwargs: Vec<(String, Expr)>,
    },
    Subscript(Box<Expr>, Vec<IndexItem>),
}

impl Expr {
    /// Names the expression reads, in first-use order, without repeats.
    pub fn free_names(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_names(&mut out);
        out
    }

    fn collect_names(&self, out: &mut Vec<String>) {
        match self {
            Expr::Literal(_) => {}
            Expr::Name(n) => {
                if !out.contains(n) {
                    out.push(n.clone());
                }
            }
            Expr::Tuple(items) | Expr::List(items) => items.iter().for_each(|e| e.collect_names(out)),
            Expr::Unary(_, e) => e.collect_names(out),
            Expr::Binary(_, l, r) | Expr::And(l, r) | Expr::Or(l, r) => {
                l.collect_names(out);
                r.collect_names(out);
            }
            Expr::Compare(first, rest) => {
                first.collect_names(out);
                rest.iter().for_each(|(_, e)| e.collect_names(out));
            }
            Expr::IfElse { cond, then, otherwise } => {
                then.collect_names(out);
                cond.collect_names(out);
                otherwise.collect_names(out);
            }
            Expr::Call { args, kwargs, .. } => {
                args.iter().for_each(|e| e.collect_names(out));
                kwargs.iter().for_each(|(_, e)| e.collect_names(out));
            }
            Expr::Subscript(target, items) => {
                target.collect_names(out);
                for item in items {
                    match item {
                        IndexItem::Index(e) => e.collect_names(out),
                        IndexItem::Slice { start, stop, step } => {
                            for e in [start, stop, step].into_iter().flatten() {
                                e.collect_names(out);
                            }
                        }
                        IndexItem::Ellipsis | IndexItem::NewAxis => {}
                    }
                }
            }
        }
    }
}
