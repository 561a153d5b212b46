use crate::sat::cnf::{Cnf, Lit};

///
/// DPLL satisfiability search
///
/// Classic backtracking over the CNF form: unit propagation to a
/// fixpoint, then case-split on the first unassigned variable. Worst
/// case exponential in the variable count, which is acceptable because
/// a single filter references a small, bounded set of distinct atoms.
/// Callers needing bounded latency impose an external budget.
///

/// Decide whether any assignment satisfies every clause.
#[must_use]
pub fn is_satisfiable(cnf: &Cnf) -> bool {
    let mut assignment: Vec<Option<bool>> = vec![None; cnf.var_count];
    search(&cnf.clauses, &mut assignment)
}

// Outcome of scanning one clause under a partial assignment.
enum ClauseState {
    Satisfied,
    Conflict,
    Unit(Lit),
    Open,
}

fn scan_clause(clause: &[Lit], assignment: &[Option<bool>]) -> ClauseState {
    let mut unassigned: Option<Lit> = None;
    let mut unassigned_count = 0usize;

    for lit in clause {
        match assignment[lit.var] {
            Some(value) if value == lit.positive => return ClauseState::Satisfied,
            Some(_) => {}
            None => {
                unassigned_count += 1;
                unassigned = Some(*lit);
            }
        }
    }

    match (unassigned_count, unassigned) {
        (0, _) => ClauseState::Conflict,
        (1, Some(lit)) => ClauseState::Unit(lit),
        _ => ClauseState::Open,
    }
}

fn search(clauses: &[Vec<Lit>], assignment: &mut Vec<Option<bool>>) -> bool {
    // Unit propagation: a clause with one unassigned literal forces it.
    let mut propagated: Vec<usize> = Vec::new();
    loop {
        let mut forced: Option<Lit> = None;
        for clause in clauses {
            match scan_clause(clause, assignment) {
                ClauseState::Conflict => {
                    for &var in &propagated {
                        assignment[var] = None;
                    }
                    return false;
                }
                ClauseState::Unit(lit) => {
                    forced = Some(lit);
                    break;
                }
                ClauseState::Satisfied | ClauseState::Open => {}
            }
        }
        match forced {
            Some(lit) => {
                assignment[lit.var] = Some(lit.positive);
                propagated.push(lit.var);
            }
            None => break,
        }
    }

    // A full pass with no conflict and no unit: either branch, or a
    // total assignment has satisfied every clause.
    let Some(var) = assignment.iter().position(Option::is_none) else {
        return true;
    };

    for value in [true, false] {
        assignment[var] = Some(value);
        if search(clauses, assignment) {
            return true;
        }
        assignment[var] = None;
    }

    for &var in &propagated {
        assignment[var] = None;
    }
    false
}

///
/// TESTS
///
