//! Filter expression engine for remotely managed device fleets.
//!
//! The UI, API, and authorization layers of the auto-configuration
//! server all express predicate filters over structured records
//! (devices, provisioning scripts, uploaded files, users) as one tree
//! type. This crate is the engine behind that tree: a small typed logic
//! with three-valued (null-aware) semantics, a partial evaluator that
//! reduces a filter against zero or more known bindings, algebraic
//! combinators for composing filters without growing tree depth, and a
//! satisfiability-based entailment check ("does filter A always imply
//! filter B?") that authorization relies on.
//!
//! Purely computational: no I/O, no clocks, no store access. Records
//! and timestamps come from collaborators; trees are immutable values
//! and every pass returns a new tree.

pub mod error;
pub mod expr;
pub mod sat;
pub mod value;

pub use error::{EvalError, PatternError};
pub use expr::{
    ArithOp, CompareOp, Expr, LikeExpr,
    combine::{and, not, or},
    eval::{Evaluator, Record, evaluate},
    pattern::{PatternCache, compile_like},
    walk::{expand_macros, referenced_fields, transform},
};
pub use sat::{
    cnf::{Cnf, Lit, boolean_cnf},
    dpll::is_satisfiable,
    implies,
};
pub use value::Value;

///
/// Prelude
///
/// Domain vocabulary only; helpers stay one module level down.
///

pub mod prelude {
    pub use crate::{
        expr::{ArithOp, CompareOp, Expr, eval::Record},
        value::Value,
    };
}
