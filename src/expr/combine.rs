use crate::expr::Expr;

///
/// Algebraic combinators
///
/// Construction-time simplifiers, independent of record-bound
/// evaluation. Filters are composed incrementally (an authorization
/// filter ANDed onto a user-supplied one per request), so these flatten
/// same-operator nesting and absorb concrete booleans at build time to
/// keep tree depth bounded.
///

/// Conjunction with short-circuit and flattening.
///
/// A resolved falsy operand (false or null) absorbs the whole
/// conjunction; a resolved truthy operand drops out. Nested `AND`
/// children merge into a single n-ary node.
#[must_use]
pub fn and(lhs: Expr, rhs: Expr) -> Expr {
    if let Expr::Value(v) = &lhs {
        return if v.is_truthy() { rhs } else { lhs };
    }
    if let Expr::Value(v) = &rhs {
        return if v.is_truthy() { lhs } else { rhs };
    }

    let mut operands = Vec::new();
    match lhs {
        Expr::And(children) => operands.extend(children),
        other => operands.push(other),
    }
    match rhs {
        Expr::And(children) => operands.extend(children),
        other => operands.push(other),
    }

    Expr::And(operands)
}

/// Disjunction with short-circuit and flattening.
#[must_use]
pub fn or(lhs: Expr, rhs: Expr) -> Expr {
    if let Expr::Value(v) = &lhs {
        return if v.is_truthy() { lhs } else { rhs };
    }
    if let Expr::Value(v) = &rhs {
        return if v.is_truthy() { rhs } else { lhs };
    }

    let mut operands = Vec::new();
    match lhs {
        Expr::Or(children) => operands.extend(children),
        other => operands.push(other),
    }
    match rhs {
        Expr::Or(children) => operands.extend(children),
        other => operands.push(other),
    }

    Expr::Or(operands)
}

/// Structural negation: double negation cancels without evaluation.
#[must_use]
pub fn not(expr: Expr) -> Expr {
    match expr {
        Expr::Not(inner) => *inner,
        other => Expr::Not(Box::new(other)),
    }
}

///
/// TESTS
///
