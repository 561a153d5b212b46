pub mod cnf;
pub mod dpll;

use crate::{
    error::EvalError,
    expr::{Expr, combine, eval::evaluate},
};

///
/// Entailment
///
/// `implies(a, b)` answers "does every record satisfying `a` also
/// satisfy `b`?" — the question the authorization layer asks to decide
/// whether a user-supplied filter is covered by a permission's filter,
/// and the query layer asks when narrowing.
///

/// True iff every record satisfying `a` also satisfies `b`.
///
/// Builds the counterexample condition `a AND NOT b` (as
/// `NOT(OR(NOT a, b))`), partially evaluates it with nothing bound, and
/// asks whether any assignment of the residual atoms makes it true.
/// Entailment holds exactly when no counterexample exists. Atoms are
/// treated as free booleans; a counterexample that evaluates to null is
/// never definitely true, so it does not refute entailment.
pub fn implies(a: &Expr, b: &Expr) -> Result<bool, EvalError> {
    let counterexample = combine::not(combine::or(combine::not(a.clone()), b.clone()));
    let residual = evaluate(&counterexample, None, None)?;

    if let Expr::Value(v) = &residual {
        return Ok(!v.is_truthy());
    }

    let formula = cnf::boolean_cnf(&residual);
    Ok(!dpll::is_satisfiable(&formula))
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::implies;
    use crate::expr::{ArithOp, Expr};

    fn eq(field: &str, n: i64) -> Expr {
        Expr::eq(Expr::param(field), Expr::from(n))
    }

    fn check(a: &Expr, b: &Expr) -> bool {
        implies(a, b).expect("entailment check should not fail")
    }

    #[test]
    fn a_filter_implies_a_widening_disjunction() {
        let a = eq("a", 1);
        let b = Expr::Or(vec![eq("a", 1), eq("a", 2)]);
        assert!(check(&a, &b));
    }

    #[test]
    fn distinct_equalities_do_not_imply_each_other() {
        assert!(!check(&eq("a", 1), &eq("a", 2)));
    }

    #[test]
    fn every_filter_implies_itself() {
        let filters = [
            eq("a", 1),
            Expr::And(vec![eq("a", 1), eq("b", 2)]),
            Expr::Not(Box::new(Expr::is_null(Expr::param("c")))),
            Expr::like(Expr::param("serial"), Expr::from("AB%"), None),
        ];
        for filter in &filters {
            assert!(check(filter, filter));
        }
    }

    #[test]
    fn a_conjunction_implies_each_conjunct() {
        let a = Expr::And(vec![eq("a", 1), eq("b", 2)]);
        assert!(check(&a, &eq("a", 1)));
        assert!(check(&a, &eq("b", 2)));
        assert!(!check(&eq("a", 1), &a));
    }

    #[test]
    fn anything_implies_a_tautology_over_its_atoms() {
        let x = eq("a", 1);
        let tautology = Expr::Or(vec![x.clone(), Expr::Not(Box::new(x.clone()))]);
        assert!(check(&x, &tautology));
        assert!(check(&eq("b", 9), &tautology));
    }

    #[test]
    fn a_contradiction_implies_anything() {
        let x = eq("a", 1);
        let contradiction = Expr::And(vec![x.clone(), Expr::Not(Box::new(x))]);
        assert!(check(&contradiction, &eq("z", 42)));
    }

    #[test]
    fn concrete_filters_resolve_without_the_solver() {
        assert!(check(&Expr::from(false), &Expr::from(false)));
        assert!(check(&Expr::from(true), &Expr::from(true)));
        assert!(!check(&Expr::from(true), &Expr::from(false)));
    }

    #[test]
    fn structurally_distinct_atoms_are_independent() {
        // The solver has no comparison semantics: a > 5 does not imply
        // a > 4 because the atoms are opaque.
        let stronger = Expr::gt(Expr::param("a"), Expr::from(5i64));
        let weaker = Expr::gt(Expr::param("a"), Expr::from(4i64));
        assert!(!check(&stronger, &weaker));
    }

    #[test]
    fn nan_bearing_residuals_reach_the_solver_safely() {
        // 0/0 folds to NaN inside the counterexample residual; both
        // occurrences of the comparison must map to one solver variable.
        let zero_over_zero =
            Expr::arith(ArithOp::Div, vec![Expr::from(0i64), Expr::from(0i64)]);
        let filter = Expr::gt(Expr::param("x"), zero_over_zero);

        assert!(check(&filter, &filter));
        assert!(!check(&filter, &eq("y", 1)));
    }

    #[test]
    fn authorization_narrowing_scenario() {
        // Permission: tag = "lab" AND NOT(firmware IS NULL).
        // User filter: tag = "lab" AND firmware = "1.2.3" AND NOT(firmware IS NULL).
        let permission = Expr::And(vec![
            Expr::eq(Expr::param("tag"), Expr::from("lab")),
            Expr::Not(Box::new(Expr::is_null(Expr::param("firmware")))),
        ]);
        let user_filter = Expr::And(vec![
            Expr::eq(Expr::param("tag"), Expr::from("lab")),
            Expr::eq(Expr::param("firmware"), Expr::from("1.2.3")),
            Expr::Not(Box::new(Expr::is_null(Expr::param("firmware")))),
        ]);

        assert!(check(&user_filter, &permission));
        assert!(!check(&permission, &user_filter));
    }
}
