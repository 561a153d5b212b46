use crate::{
    error::{EvalError, PatternError},
    expr::{ArithOp, CompareOp, Expr, LikeExpr, pattern::PatternCache, walk::transform},
    value::Value,
};
use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashMap},
};

///
/// Record
///
/// Field lookup supplied by the record store when a concrete evaluation
/// is wanted. A store that keeps structured attributes collapses them
/// to their primary scalar before returning; `None` means the record
/// carries no value for the field.
///

pub trait Record {
    fn field(&self, name: &str) -> Option<Value>;
}

impl Record for BTreeMap<String, Value> {
    fn field(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl Record for HashMap<String, Value> {
    fn field(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

///
/// Evaluator
///
/// Partial evaluation scope for one filter expression. Owns the pattern
/// cache, so one filter evaluated against many records compiles each
/// LIKE pattern once. The cache is reclaimed with the evaluator and
/// never shared across unrelated trees.
///

#[derive(Debug, Default)]
pub struct Evaluator {
    patterns: PatternCache,
}

impl Evaluator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reduce `expr` bottom-up as far as the given bindings allow.
    ///
    /// With a record and timestamp every reference resolves and the
    /// result is a single scalar node. With partial or absent bindings
    /// the result is a maximally simplified residual tree. Null and
    /// unresolved operands are values, not errors; only an invalid LIKE
    /// escape configuration fails.
    pub fn evaluate(
        &self,
        expr: &Expr,
        record: Option<&dyn Record>,
        now: Option<f64>,
    ) -> Result<Expr, EvalError> {
        let mut failure: Option<EvalError> = None;

        let out = transform(expr, &mut |node| {
            if failure.is_some() {
                return node;
            }
            match self.step(node, record, now) {
                Ok(next) => next,
                Err(err) => {
                    failure = Some(err);
                    Expr::null()
                }
            }
        });

        match failure {
            Some(err) => Err(err),
            None => Ok(out),
        }
    }

    // Apply one operator's semantic rule to a node whose operands are
    // already reduced. Returns the node unchanged when the rule cannot
    // be discharged yet.
    fn step(
        &self,
        node: Expr,
        record: Option<&dyn Record>,
        now: Option<f64>,
    ) -> Result<Expr, EvalError> {
        match node {
            Expr::Value(_) => Ok(node),

            Expr::Param(name) => match record {
                Some(rec) => Ok(Expr::Value(rec.field(&name).unwrap_or(Value::Null))),
                None => Ok(Expr::Param(name)),
            },

            Expr::Func(name, args) => Ok(step_func(name, args, now)),

            Expr::And(operands) => {
                let folded = fold_adjacent(operands, |a, b, _| match (a, b) {
                    (Expr::Value(v), _) => Some(if v.is_truthy() { b.clone() } else { a.clone() }),
                    (_, Expr::Value(v)) => Some(if v.is_truthy() { a.clone() } else { b.clone() }),
                    _ => None,
                });
                Ok(collapse(Expr::And, folded))
            }

            Expr::Or(operands) => {
                let folded = fold_adjacent(operands, |a, b, _| match (a, b) {
                    (Expr::Value(v), _) => Some(if v.is_truthy() { a.clone() } else { b.clone() }),
                    (_, Expr::Value(v)) => Some(if v.is_truthy() { b.clone() } else { a.clone() }),
                    _ => None,
                });
                Ok(collapse(Expr::Or, folded))
            }

            Expr::Not(inner) => Ok(match *inner {
                Expr::Value(v) => Expr::Value(Value::Bool(!v.is_truthy())),
                // Double negation cancels without resolving the operand.
                Expr::Not(cancelled) => *cancelled,
                other => Expr::Not(Box::new(other)),
            }),

            Expr::IsNull(inner) => Ok(match *inner {
                Expr::Value(v) => Expr::Value(Value::Bool(v.is_null())),
                other => Expr::IsNull(Box::new(other)),
            }),

            Expr::IsNotNull(inner) => Ok(match *inner {
                Expr::Value(v) => Expr::Value(Value::Bool(!v.is_null())),
                other => Expr::IsNotNull(Box::new(other)),
            }),

            Expr::Compare(op, lhs, rhs) => {
                if let (Some(l), Some(r)) = (lhs.as_value(), rhs.as_value()) {
                    return Ok(Expr::Value(apply_compare(op, l, r)));
                }
                Ok(Expr::Compare(op, lhs, rhs))
            }

            Expr::Like(like) => self.step_like(like),

            Expr::Arith(op, operands) => {
                let folded = fold_adjacent(operands, |a, b, pair_index| match (a, b) {
                    (Expr::Value(x), Expr::Value(y)) => {
                        Some(Expr::Value(apply_arith(op, pair_index, x, y)))
                    }
                    _ => None,
                });
                Ok(collapse(|ops| Expr::Arith(op, ops), folded))
            }
        }
    }

    fn step_like(&self, like: LikeExpr) -> Result<Expr, EvalError> {
        let (subject, pattern) = match (like.subject.as_value(), like.pattern.as_value()) {
            (Some(s), Some(p)) => (s, p),
            _ => return Ok(Expr::Like(like)),
        };
        let escape = match like.escape.as_deref() {
            None => None,
            Some(Expr::Value(v)) => Some(v),
            Some(_) => return Ok(Expr::Like(like)),
        };

        if subject.is_null() || pattern.is_null() || escape.is_some_and(Value::is_null) {
            return Ok(Expr::null());
        }

        let escape_char = match escape {
            None => None,
            Some(v) => {
                let text = v.to_string();
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some(c),
                    _ => return Err(PatternError::EscapeNotSingleChar(text).into()),
                }
            }
        };

        let regex = self
            .patterns
            .get_or_compile(&pattern.to_string(), escape_char)?;
        let matched = regex.is_match(&subject.to_string());

        Ok(Expr::Value(Value::Bool(matched != like.negated)))
    }
}

/// Reduce an expression against optional bindings with a fresh pattern
/// cache. Callers evaluating one filter against many records should
/// hold an [`Evaluator`] instead, so compiled patterns are reused.
pub fn evaluate(
    expr: &Expr,
    record: Option<&dyn Record>,
    now: Option<f64>,
) -> Result<Expr, EvalError> {
    Evaluator::new().evaluate(expr, record, now)
}

// Fold adjacent operand pairs to a fixpoint. `fold` sees the pair's
// position in the current operand list; `None` leaves the pair in
// place. Each successful fold shortens the list, so this terminates.
fn fold_adjacent<F>(mut operands: Vec<Expr>, fold: F) -> Vec<Expr>
where
    F: Fn(&Expr, &Expr, usize) -> Option<Expr>,
{
    let mut changed = true;
    while changed {
        changed = false;
        let mut i = 1;
        while i < operands.len() {
            if let Some(folded) = fold(&operands[i - 1], &operands[i], i - 1) {
                operands[i - 1] = folded;
                operands.remove(i);
                changed = true;
            } else {
                i += 1;
            }
        }
    }
    operands
}

// A fully folded node collapses to its single remaining operand.
fn collapse(rebuild: impl FnOnce(Vec<Expr>) -> Expr, mut operands: Vec<Expr>) -> Expr {
    if operands.len() == 1 {
        operands.remove(0)
    } else {
        rebuild(operands)
    }
}

fn step_func(name: String, args: Vec<Expr>, now: Option<f64>) -> Expr {
    match name.as_str() {
        "NOW" => {
            debug_assert!(args.is_empty(), "NOW takes no operands");
            match now {
                Some(ts) => Expr::Value(Value::Num(ts)),
                None => Expr::Func(name, args),
            }
        }
        "UPPER" | "LOWER" => {
            debug_assert_eq!(args.len(), 1, "case-folding functions take one operand");
            match args.first().and_then(Expr::as_value) {
                Some(Value::Null) => Expr::null(),
                Some(v) => {
                    let text = v.to_string();
                    Expr::Value(Value::Text(if name == "UPPER" {
                        text.to_uppercase()
                    } else {
                        text.to_lowercase()
                    }))
                }
                None => Expr::Func(name, args),
            }
        }
        // Opaque macros (e.g. "Q") are expanded by an external
        // collaborator before evaluation; anything still here stays
        // unresolved.
        _ => Expr::Func(name, args),
    }
}

fn apply_compare(op: CompareOp, lhs: &Value, rhs: &Value) -> Value {
    if lhs.is_null() || rhs.is_null() {
        return Value::Null;
    }
    let result = match op {
        CompareOp::Eq => lhs == rhs,
        CompareOp::Ne => lhs != rhs,
        CompareOp::Gt => matches!(lhs.loose_cmp(rhs), Some(Ordering::Greater)),
        CompareOp::Gte => matches!(
            lhs.loose_cmp(rhs),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        CompareOp::Lt => matches!(lhs.loose_cmp(rhs), Some(Ordering::Less)),
        CompareOp::Lte => matches!(lhs.loose_cmp(rhs), Some(Ordering::Less | Ordering::Equal)),
    };
    Value::Bool(result)
}

// Null propagates strictly through arithmetic: no short-circuiting.
// Folding a pair at position > 0 of a partially folded `-`/`/` chain
// uses the inverse operation, which keeps the residual equal to
// left-to-right binary application of the original chain.
fn apply_arith(op: ArithOp, pair_index: usize, lhs: &Value, rhs: &Value) -> Value {
    if lhs.is_null() || rhs.is_null() {
        return Value::Null;
    }
    if op == ArithOp::Concat {
        return Value::Text(format!("{lhs}{rhs}"));
    }

    let (Some(a), Some(b)) = (lhs.as_num(), rhs.as_num()) else {
        return Value::Null;
    };
    let result = match op {
        ArithOp::Add | ArithOp::Concat => a + b,
        ArithOp::Mul => a * b,
        ArithOp::Sub => {
            if pair_index == 0 {
                a - b
            } else {
                a + b
            }
        }
        ArithOp::Div => {
            if pair_index == 0 {
                a / b
            } else {
                a * b
            }
        }
    };
    Value::Num(result)
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::{Evaluator, Record, evaluate};
    use crate::{
        error::{EvalError, PatternError},
        expr::{ArithOp, Expr},
        value::Value,
    };
    use std::collections::BTreeMap;

    fn record(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    fn eval(expr: &Expr, rec: Option<&BTreeMap<String, Value>>) -> Expr {
        evaluate(expr, rec.map(|r| r as &dyn Record), None).expect("evaluation should not fail")
    }

    #[test]
    fn param_resolves_against_a_record() {
        let rec = record(&[("a", Value::Num(5.0))]);
        let expr = Expr::eq(Expr::param("a"), Expr::from(5i64));

        assert_eq!(eval(&expr, Some(&rec)), Expr::from(true));
    }

    #[test]
    fn missing_field_resolves_to_null_and_comparison_to_null() {
        let rec = record(&[]);
        let expr = Expr::eq(Expr::param("a"), Expr::from(5i64));

        assert_eq!(eval(&expr, Some(&rec)), Expr::null());
    }

    #[test]
    fn param_stays_unresolved_without_a_record() {
        let expr = Expr::eq(Expr::param("a"), Expr::from(5i64));
        assert_eq!(eval(&expr, None), expr);
    }

    #[test]
    fn subtraction_chain_applies_left_to_right() {
        let expr = Expr::arith(
            ArithOp::Sub,
            vec![Expr::from(10i64), Expr::from(1i64), Expr::from(2i64)],
        );
        assert_eq!(eval(&expr, None), Expr::from(7.0));
    }

    #[test]
    fn multiplication_chain_folds_completely() {
        let expr = Expr::arith(
            ArithOp::Mul,
            vec![Expr::from(2i64), Expr::from(3i64), Expr::from(4i64)],
        );
        assert_eq!(eval(&expr, None), Expr::from(24.0));
    }

    #[test]
    fn division_chain_applies_left_to_right() {
        let expr = Expr::arith(
            ArithOp::Div,
            vec![Expr::from(24i64), Expr::from(2i64), Expr::from(3i64)],
        );
        assert_eq!(eval(&expr, None), Expr::from(4.0));
    }

    #[test]
    fn division_by_zero_follows_ieee_semantics() {
        let expr = Expr::arith(ArithOp::Div, vec![Expr::from(1i64), Expr::from(0i64)]);
        assert_eq!(eval(&expr, None), Expr::from(f64::INFINITY));

        let expr = Expr::arith(ArithOp::Div, vec![Expr::from(0i64), Expr::from(0i64)]);
        let folded = eval(&expr, None);
        assert!(matches!(folded.as_value(), Some(Value::Num(n)) if n.is_nan()));
    }

    #[test]
    fn comparisons_against_nan_are_false_not_null() {
        let zero_over_zero =
            Expr::arith(ArithOp::Div, vec![Expr::from(0i64), Expr::from(0i64)]);
        let expr = Expr::gt(Expr::from(1i64), zero_over_zero);
        assert_eq!(eval(&expr, None), Expr::from(false));
    }

    #[test]
    fn partial_subtraction_chain_folds_trailing_operands() {
        // a - 1 - 2 reduces to a - 3 while `a` is unbound.
        let expr = Expr::arith(
            ArithOp::Sub,
            vec![Expr::param("a"), Expr::from(1i64), Expr::from(2i64)],
        );
        let residual = eval(&expr, None);
        assert_eq!(
            residual,
            Expr::arith(ArithOp::Sub, vec![Expr::param("a"), Expr::from(3.0)])
        );

        // Binding `a` afterwards gives the same result as the full chain.
        let rec = record(&[("a", Value::Num(10.0))]);
        assert_eq!(eval(&residual, Some(&rec)), Expr::from(7.0));
    }

    #[test]
    fn null_propagates_through_arithmetic() {
        let expr = Expr::arith(ArithOp::Add, vec![Expr::from(1i64), Expr::null()]);
        assert_eq!(eval(&expr, None), Expr::null());
    }

    #[test]
    fn concat_joins_coerced_strings() {
        let expr = Expr::arith(
            ArithOp::Concat,
            vec![Expr::from("fw-"), Expr::from(2i64), Expr::from(".bin")],
        );
        assert_eq!(eval(&expr, None), Expr::from("fw-2.bin"));
    }

    #[test]
    fn and_short_circuits_and_preserves_null_versus_false() {
        let unresolved = Expr::eq(Expr::param("a"), Expr::from(1i64));

        let expr = Expr::And(vec![Expr::from(false), unresolved.clone()]);
        assert_eq!(eval(&expr, None), Expr::from(false));

        let expr = Expr::And(vec![Expr::null(), unresolved.clone()]);
        assert_eq!(eval(&expr, None), Expr::null());

        let expr = Expr::And(vec![Expr::from(true), unresolved.clone()]);
        assert_eq!(eval(&expr, None), unresolved);
    }

    #[test]
    fn or_short_circuits_on_truthy_and_drops_falsy() {
        let unresolved = Expr::eq(Expr::param("a"), Expr::from(1i64));

        let expr = Expr::Or(vec![Expr::from(true), unresolved.clone()]);
        assert_eq!(eval(&expr, None), Expr::from(true));

        let expr = Expr::Or(vec![Expr::null(), unresolved.clone()]);
        assert_eq!(eval(&expr, None), unresolved);
    }

    #[test]
    fn and_folds_around_unresolved_operands() {
        let (a, b) = (
            Expr::eq(Expr::param("a"), Expr::from(1i64)),
            Expr::eq(Expr::param("b"), Expr::from(2i64)),
        );
        let expr = Expr::And(vec![a.clone(), Expr::from(true), b.clone()]);
        assert_eq!(eval(&expr, None), Expr::And(vec![a, b]));
    }

    #[test]
    fn not_negates_resolved_operands_and_cancels_itself() {
        let expr = Expr::Not(Box::new(Expr::from(false)));
        assert_eq!(eval(&expr, None), Expr::from(true));

        let unresolved = Expr::eq(Expr::param("a"), Expr::from(1i64));
        let expr = Expr::Not(Box::new(Expr::Not(Box::new(unresolved.clone()))));
        assert_eq!(eval(&expr, None), unresolved);
    }

    #[test]
    fn is_null_resolves_over_resolved_operands_only() {
        let rec = record(&[("a", Value::Num(1.0))]);

        let expr = Expr::is_null(Expr::param("a"));
        assert_eq!(eval(&expr, Some(&rec)), Expr::from(false));
        assert_eq!(eval(&expr, None), expr);

        let expr = Expr::is_null(Expr::param("missing"));
        assert_eq!(eval(&expr, Some(&rec)), Expr::from(true));

        let expr = Expr::is_not_null(Expr::param("a"));
        assert_eq!(eval(&expr, Some(&rec)), Expr::from(true));
    }

    #[test]
    fn comparison_returns_null_when_either_side_is_null() {
        let expr = Expr::gt(Expr::null(), Expr::from(1i64));
        assert_eq!(eval(&expr, None), Expr::null());
    }

    #[test]
    fn incomparable_operands_compare_false_not_null() {
        let expr = Expr::lt(Expr::from("abc"), Expr::from(5i64));
        assert_eq!(eval(&expr, None), Expr::from(false));
    }

    #[test]
    fn like_matches_and_negates() {
        let rec = record(&[("serial", Value::Text("ABC123".to_string()))]);

        let expr = Expr::like(Expr::param("serial"), Expr::from("ABC%"), None);
        assert_eq!(eval(&expr, Some(&rec)), Expr::from(true));

        let expr = Expr::not_like(Expr::param("serial"), Expr::from("ABC%"), None);
        assert_eq!(eval(&expr, Some(&rec)), Expr::from(false));
    }

    #[test]
    fn like_propagates_null_and_stays_partial_over_trees() {
        let expr = Expr::like(Expr::null(), Expr::from("a%"), None);
        assert_eq!(eval(&expr, None), Expr::null());

        let expr = Expr::like(Expr::param("a"), Expr::from("a%"), None);
        assert_eq!(eval(&expr, None), expr);
    }

    #[test]
    fn like_reports_invalid_escape_operands() {
        let expr = Expr::like(Expr::from("abc"), Expr::from("a%"), Some(Expr::from("!!")));
        let err = evaluate(&expr, None, None).unwrap_err();
        assert_eq!(
            err,
            EvalError::Pattern(PatternError::EscapeNotSingleChar("!!".to_string()))
        );
    }

    #[test]
    fn now_resolves_only_with_a_supplied_timestamp() {
        let expr = Expr::gt(Expr::func("NOW", vec![]), Expr::param("expiry"));

        let rec = record(&[("expiry", Value::Num(1000.0))]);
        assert_eq!(
            evaluate(&expr, Some(&rec as &dyn Record), Some(2000.0))
                .expect("evaluation should not fail"),
            Expr::from(true)
        );

        // Without a timestamp the reference stays symbolic.
        assert_eq!(
            eval(&expr, Some(&rec)),
            Expr::gt(Expr::func("NOW", vec![]), Expr::from(1000.0))
        );
    }

    #[test]
    fn case_folding_resolves_scalars_and_propagates_null() {
        let expr = Expr::func("UPPER", vec![Expr::from("abc")]);
        assert_eq!(eval(&expr, None), Expr::from("ABC"));

        let expr = Expr::func("LOWER", vec![Expr::from("AbC")]);
        assert_eq!(eval(&expr, None), Expr::from("abc"));

        let expr = Expr::func("UPPER", vec![Expr::null()]);
        assert_eq!(eval(&expr, None), Expr::null());

        let expr = Expr::func("UPPER", vec![Expr::param("a")]);
        assert_eq!(eval(&expr, None), expr);
    }

    #[test]
    fn opaque_macros_stay_unresolved() {
        let expr = Expr::func("Q", vec![Expr::from("online")]);
        assert_eq!(eval(&expr, None), expr);
    }

    #[test]
    fn evaluation_is_idempotent_on_residuals() {
        let expr = Expr::And(vec![
            Expr::eq(Expr::param("a"), Expr::from(1i64)),
            Expr::from(true),
            Expr::Or(vec![
                Expr::like(Expr::param("b"), Expr::from("x%"), None),
                Expr::from(false),
            ]),
        ]);

        let once = eval(&expr, None);
        let twice = eval(&once, None);
        assert_eq!(once, twice);
    }

    #[test]
    fn evaluator_reuses_compiled_patterns_across_records() {
        let evaluator = Evaluator::new();
        let expr = Expr::like(Expr::param("serial"), Expr::from("AB%"), None);

        for serial in ["AB1", "AB2", "ZZ9"] {
            let rec = record(&[("serial", Value::Text(serial.to_string()))]);
            evaluator
                .evaluate(&expr, Some(&rec as &dyn Record), None)
                .expect("evaluation should not fail");
        }

        assert_eq!(evaluator.patterns.len(), 1);
    }
}
