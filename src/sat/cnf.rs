use crate::{
    expr::{Expr, LikeExpr},
    value::Value,
};

///
/// CNF conversion
///
/// Turns a boolean-only residual tree (AND/OR/NOT over opaque atoms)
/// into conjunctive normal form via a Tseitin-style encoding: one
/// variable per distinct atom, one auxiliary variable per internal
/// AND/OR gate, NOT folded into literal polarity. The result is
/// equisatisfiable with the input and linear in its size, trading a few
/// extra search variables for the exponential blowup of distributive
/// expansion. Atoms are opaque: this pass has no semantic knowledge of
/// what they mean.
///

///
/// Lit
///
/// One literal: a variable index with a polarity.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Lit {
    pub var: usize,
    pub positive: bool,
}

impl Lit {
    #[must_use]
    pub const fn pos(var: usize) -> Self {
        Self {
            var,
            positive: true,
        }
    }

    #[must_use]
    pub const fn neg(var: usize) -> Self {
        Self {
            var,
            positive: false,
        }
    }

    #[must_use]
    pub const fn negated(self) -> Self {
        Self {
            var: self.var,
            positive: !self.positive,
        }
    }
}

///
/// Cnf
///
/// Clauses over `var_count` variables. Variables `0..atoms.len()` map
/// one-to-one onto the distinct atoms (structurally identical atoms
/// share a variable); the rest are auxiliary gate variables. Built
/// fresh per entailment query and discarded afterwards.
///

#[derive(Clone, Debug)]
pub struct Cnf {
    pub atoms: Vec<Expr>,
    pub clauses: Vec<Vec<Lit>>,
    pub var_count: usize,
}

/// Encode a boolean residual tree as CNF.
#[must_use]
pub fn boolean_cnf(expr: &Expr) -> Cnf {
    let atoms = collect_atoms(expr);

    let mut encoder = Encoder {
        atoms,
        clauses: Vec::new(),
        next_var: 0,
    };
    encoder.next_var = encoder.atoms.len();

    let root = encoder.encode(expr);
    encoder.clauses.push(vec![root]);

    Cnf {
        atoms: encoder.atoms,
        clauses: encoder.clauses,
        var_count: encoder.next_var,
    }
}

// Gather the distinct irreducible atoms, left to right. Connectives
// recurse; anything else (comparison, pattern test, null test, param,
// unresolved func, arithmetic residual) is one opaque atom.
fn collect_atoms(expr: &Expr) -> Vec<Expr> {
    fn walk(expr: &Expr, atoms: &mut Vec<Expr>) {
        match expr {
            Expr::And(operands) | Expr::Or(operands) => {
                for operand in operands {
                    walk(operand, atoms);
                }
            }
            Expr::Not(inner) => walk(inner, atoms),
            // Resolved scalars are encoded as forced constants, not atoms.
            Expr::Value(_) => {}
            atom => {
                if !atoms.iter().any(|a| atom_eq(a, atom)) {
                    atoms.push(atom.clone());
                }
            }
        }
    }

    let mut atoms = Vec::new();
    walk(expr, &mut atoms);
    atoms
}

// Total structural identity for atom-to-variable mapping. `PartialEq`
// is not reflexive over NaN, and NaN-bearing residuals are reachable
// from valid arithmetic (`0 / 0` folds to one), so variable lookup
// compares numbers by bit pattern instead.
fn atom_eq(a: &Expr, b: &Expr) -> bool {
    match (a, b) {
        (Expr::Value(x), Expr::Value(y)) => value_eq(x, y),
        (Expr::Param(x), Expr::Param(y)) => x == y,
        (Expr::Func(n1, x), Expr::Func(n2, y)) => n1 == n2 && all_eq(x, y),
        (Expr::And(x), Expr::And(y)) | (Expr::Or(x), Expr::Or(y)) => all_eq(x, y),
        (Expr::Not(x), Expr::Not(y)) => atom_eq(x, y),
        (Expr::Compare(o1, l1, r1), Expr::Compare(o2, l2, r2)) => {
            o1 == o2 && atom_eq(l1, l2) && atom_eq(r1, r2)
        }
        (Expr::Like(x), Expr::Like(y)) => like_eq(x, y),
        (Expr::IsNull(x), Expr::IsNull(y)) | (Expr::IsNotNull(x), Expr::IsNotNull(y)) => {
            atom_eq(x, y)
        }
        (Expr::Arith(o1, x), Expr::Arith(o2, y)) => o1 == o2 && all_eq(x, y),
        _ => false,
    }
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Num(x), Value::Num(y)) => x.to_bits() == y.to_bits(),
        _ => a == b,
    }
}

fn like_eq(a: &LikeExpr, b: &LikeExpr) -> bool {
    let escapes = match (&a.escape, &b.escape) {
        (None, None) => true,
        (Some(x), Some(y)) => atom_eq(x, y),
        _ => false,
    };
    a.negated == b.negated
        && atom_eq(&a.subject, &b.subject)
        && atom_eq(&a.pattern, &b.pattern)
        && escapes
}

fn all_eq(a: &[Expr], b: &[Expr]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| atom_eq(x, y))
}

struct Encoder {
    atoms: Vec<Expr>,
    clauses: Vec<Vec<Lit>>,
    next_var: usize,
}

impl Encoder {
    fn fresh(&mut self) -> usize {
        let var = self.next_var;
        self.next_var += 1;
        var
    }

    fn encode(&mut self, expr: &Expr) -> Lit {
        match expr {
            Expr::Not(inner) => self.encode(inner).negated(),

            Expr::And(operands) => {
                let gate = self.fresh();
                let literals: Vec<Lit> = operands.iter().map(|o| self.encode(o)).collect();
                // gate → every operand; all operands → gate.
                for lit in &literals {
                    self.clauses.push(vec![Lit::neg(gate), *lit]);
                }
                let mut clause = vec![Lit::pos(gate)];
                clause.extend(literals.iter().map(|l| l.negated()));
                self.clauses.push(clause);
                Lit::pos(gate)
            }

            Expr::Or(operands) => {
                let gate = self.fresh();
                let literals: Vec<Lit> = operands.iter().map(|o| self.encode(o)).collect();
                // Every operand → gate; gate → some operand.
                for lit in &literals {
                    self.clauses.push(vec![Lit::pos(gate), lit.negated()]);
                }
                let mut clause = vec![Lit::neg(gate)];
                clause.extend(literals.iter().copied());
                self.clauses.push(clause);
                Lit::pos(gate)
            }

            // A leftover concrete scalar becomes a variable forced to
            // its truthiness.
            Expr::Value(v) => {
                let var = self.fresh();
                self.clauses.push(vec![Lit {
                    var,
                    positive: v.is_truthy(),
                }]);
                Lit::pos(var)
            }

            atom => {
                let var = self
                    .atoms
                    .iter()
                    .position(|a| atom_eq(a, atom))
                    .unwrap_or_else(|| unreachable!("atom was collected before encoding"));
                Lit::pos(var)
            }
        }
    }
}

///
/// TESTS
///
