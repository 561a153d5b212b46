use thiserror::Error as ThisError;

///
/// PatternError
///
/// Caller-visible failures while compiling a LIKE wildcard pattern.
/// An invalid escape configuration is a data error reported to the
/// caller, never a silent best-effort match.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum PatternError {
    #[error("escape character '{0}' conflicts with LIKE wildcard syntax")]
    EscapeIsWildcard(char),

    #[error("pattern ends with a dangling escape character")]
    DanglingEscape,

    #[error("LIKE escape operand '{0}' must be a single character")]
    EscapeNotSingleChar(String),

    #[error("compiled pattern was rejected by the regex engine: {0}")]
    Compile(String),
}

///
/// EvalError
///
/// Failures surfaced by partial evaluation. Semantic unknowns (null or
/// unresolved operands) are never errors; they propagate as values.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum EvalError {
    #[error(transparent)]
    Pattern(#[from] PatternError),
}
