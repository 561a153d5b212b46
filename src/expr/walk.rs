use crate::expr::{Expr, LikeExpr};

///
/// Tree walker
///
/// One generic bottom-up transform underlies evaluation, parameter
/// extraction, and external macro expansion. Operands are rewritten
/// first (left to right), the node is rebuilt from the rewritten
/// operands, then the visitor sees the rebuilt node. Leaves go straight
/// to the visitor.
///

pub fn transform<F>(expr: &Expr, visitor: &mut F) -> Expr
where
    F: FnMut(Expr) -> Expr,
{
    let rebuilt = match expr {
        Expr::Value(_) | Expr::Param(_) => expr.clone(),
        Expr::Func(name, args) => Expr::Func(
            name.clone(),
            args.iter().map(|a| transform(a, visitor)).collect(),
        ),
        Expr::And(operands) => Expr::And(
            operands
                .iter()
                .map(|o| transform(o, visitor))
                .collect(),
        ),
        Expr::Or(operands) => Expr::Or(
            operands
                .iter()
                .map(|o| transform(o, visitor))
                .collect(),
        ),
        Expr::Not(inner) => Expr::Not(Box::new(transform(inner, visitor))),
        Expr::Compare(op, lhs, rhs) => Expr::Compare(
            *op,
            Box::new(transform(lhs, visitor)),
            Box::new(transform(rhs, visitor)),
        ),
        Expr::Like(like) => Expr::Like(LikeExpr {
            negated: like.negated,
            subject: Box::new(transform(&like.subject, visitor)),
            pattern: Box::new(transform(&like.pattern, visitor)),
            escape: like
                .escape
                .as_ref()
                .map(|e| Box::new(transform(e, visitor))),
        }),
        Expr::IsNull(inner) => Expr::IsNull(Box::new(transform(inner, visitor))),
        Expr::IsNotNull(inner) => Expr::IsNotNull(Box::new(transform(inner, visitor))),
        Expr::Arith(op, operands) => Expr::Arith(
            *op,
            operands
                .iter()
                .map(|o| transform(o, visitor))
                .collect(),
        ),
    };

    visitor(rebuilt)
}

/// Every field name referenced by a `PARAM` leaf, in left-to-right
/// depth-first discovery order, deduplicated.
///
/// Callers use this to know which fields to fetch before evaluating a
/// filter against records.
#[must_use]
pub fn referenced_fields(expr: &Expr) -> Vec<String> {
    let mut fields: Vec<String> = Vec::new();
    transform(expr, &mut |e| {
        if let Expr::Param(name) = &e
            && !fields.iter().any(|f| f == name)
        {
            fields.push(name.clone());
        }
        e
    });
    fields
}

/// Replace named `FUNC` nodes with collaborator-supplied expansions.
///
/// The query-library layer uses this to expand opaque smart-query
/// macros (`FUNC "Q"`) before a tree reaches evaluation. `lookup`
/// returns `None` to leave a node untouched.
#[must_use]
pub fn expand_macros<F>(expr: &Expr, lookup: &mut F) -> Expr
where
    F: FnMut(&str, &[Expr]) -> Option<Expr>,
{
    transform(expr, &mut |e| {
        if let Expr::Func(name, args) = &e
            && let Some(expansion) = lookup(name, args)
        {
            return expansion;
        }
        e
    })
}

///
/// TESTS
///
