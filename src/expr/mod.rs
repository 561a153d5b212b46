pub mod combine;
pub mod eval;
pub mod pattern;
pub mod walk;
pub mod wire;


use crate::value::Value;
use std::ops::{BitAnd, BitOr, Not as OpsNot};

///
/// Expr
///
/// The predicate tree shared by the UI, API, and authorization layers.
///
/// Pure, store-agnostic representation: no schema validation, no index
/// logic, no execution semantics. Interpretation happens in later
/// passes (partial evaluation, CNF conversion, entailment).
///
/// `Value` is the resolved case; every other variant is an unresolved
/// node that partial evaluation may reduce or leave as residual. Trees
/// are immutable values: every pass builds a new tree.
///

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// A resolved scalar.
    Value(Value),
    /// A named field reference resolved against a record.
    Param(String),
    /// A named built-in (`NOW`, `UPPER`, `LOWER`) or an opaque macro
    /// (`Q`) expanded by the query-library collaborator before
    /// evaluation.
    Func(String, Vec<Expr>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    Compare(CompareOp, Box<Expr>, Box<Expr>),
    Like(LikeExpr),
    IsNull(Box<Expr>),
    IsNotNull(Box<Expr>),
    Arith(ArithOp, Vec<Expr>),
}

///
/// CompareOp
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    /// Wire tag for the tagged-array interchange form.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
        }
    }
}

///
/// ArithOp
///
/// N-ary arithmetic/concatenation. `Sub` and `Div` are left-associative
/// only; the rest are fully associative.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Concat,
}

impl ArithOp {
    /// Wire tag for the tagged-array interchange form.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Concat => "||",
        }
    }
}

///
/// LikeExpr
///
/// One pattern test: `subject [NOT] LIKE pattern [ESCAPE escape]`.
/// Operands are full expressions; the test only fires once all of them
/// resolve to scalars.
///

#[derive(Clone, Debug, PartialEq)]
pub struct LikeExpr {
    pub negated: bool,
    pub subject: Box<Expr>,
    pub pattern: Box<Expr>,
    pub escape: Option<Box<Expr>>,
}

impl Expr {
    #[must_use]
    pub fn value(v: impl Into<Value>) -> Self {
        Self::Value(v.into())
    }

    #[must_use]
    pub const fn null() -> Self {
        Self::Value(Value::Null)
    }

    #[must_use]
    pub fn param(name: impl Into<String>) -> Self {
        Self::Param(name.into())
    }

    #[must_use]
    pub fn func(name: impl Into<String>, args: Vec<Self>) -> Self {
        Self::Func(name.into(), args)
    }

    #[must_use]
    pub fn compare(op: CompareOp, lhs: Self, rhs: Self) -> Self {
        Self::Compare(op, Box::new(lhs), Box::new(rhs))
    }

    #[must_use]
    pub fn eq(lhs: Self, rhs: Self) -> Self {
        Self::compare(CompareOp::Eq, lhs, rhs)
    }

    #[must_use]
    pub fn ne(lhs: Self, rhs: Self) -> Self {
        Self::compare(CompareOp::Ne, lhs, rhs)
    }

    #[must_use]
    pub fn gt(lhs: Self, rhs: Self) -> Self {
        Self::compare(CompareOp::Gt, lhs, rhs)
    }

    #[must_use]
    pub fn gte(lhs: Self, rhs: Self) -> Self {
        Self::compare(CompareOp::Gte, lhs, rhs)
    }

    #[must_use]
    pub fn lt(lhs: Self, rhs: Self) -> Self {
        Self::compare(CompareOp::Lt, lhs, rhs)
    }

    #[must_use]
    pub fn lte(lhs: Self, rhs: Self) -> Self {
        Self::compare(CompareOp::Lte, lhs, rhs)
    }

    #[must_use]
    pub fn like(subject: Self, pattern: Self, escape: Option<Self>) -> Self {
        Self::Like(LikeExpr {
            negated: false,
            subject: Box::new(subject),
            pattern: Box::new(pattern),
            escape: escape.map(Box::new),
        })
    }

    #[must_use]
    pub fn not_like(subject: Self, pattern: Self, escape: Option<Self>) -> Self {
        Self::Like(LikeExpr {
            negated: true,
            subject: Box::new(subject),
            pattern: Box::new(pattern),
            escape: escape.map(Box::new),
        })
    }

    #[must_use]
    pub fn is_null(operand: Self) -> Self {
        Self::IsNull(Box::new(operand))
    }

    #[must_use]
    pub fn is_not_null(operand: Self) -> Self {
        Self::IsNotNull(Box::new(operand))
    }

    #[must_use]
    pub fn arith(op: ArithOp, operands: Vec<Self>) -> Self {
        Self::Arith(op, operands)
    }

    /// The resolved scalar, if this tree reduced all the way down.
    #[must_use]
    pub const fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        matches!(self, Self::Value(_))
    }
}

impl From<Value> for Expr {
    fn from(v: Value) -> Self {
        Self::Value(v)
    }
}

impl From<bool> for Expr {
    fn from(b: bool) -> Self {
        Self::Value(Value::Bool(b))
    }
}

impl From<f64> for Expr {
    fn from(n: f64) -> Self {
        Self::Value(Value::Num(n))
    }
}

impl From<i64> for Expr {
    fn from(n: i64) -> Self {
        Self::Value(Value::from(n))
    }
}

impl From<&str> for Expr {
    fn from(s: &str) -> Self {
        Self::Value(Value::from(s))
    }
}

// Operator sugar delegates to the simplifying combinators, so composed
// filters stay flat and absorbed without an extra normalization pass.

impl BitAnd for Expr {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        combine::and(self, rhs)
    }
}

impl BitOr for Expr {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        combine::or(self, rhs)
    }
}

impl OpsNot for Expr {
    type Output = Self;

    fn not(self) -> Self::Output {
        combine::not(self)
    }
}
