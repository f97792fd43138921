//! Error types for rule loading, context assembly and evaluation.
//!
//! Each failure family has its own enum so callers can tell a malformed
//! rule (fatal to loading it) from a per-request evaluation failure
//! (recoverable by denying) from a configuration defect (a rule that
//! evaluates to something other than a boolean).

use std::fmt;

/// Expected operand count of an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
    Between(usize, usize),
}

impl Arity {
    pub fn accepts(&self, count: usize) -> bool {
        match *self {
            Arity::Exactly(n) => count == n,
            Arity::AtLeast(n) => count >= n,
            Arity::Between(lo, hi) => count >= lo && count <= hi,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exactly(1) => write!(f, "exactly 1 operand"),
            Arity::Exactly(n) => write!(f, "exactly {} operands", n),
            Arity::AtLeast(n) => write!(f, "at least {} operand(s)", n),
            Arity::Between(lo, hi) => write!(f, "{} to {} operands", lo, hi),
        }
    }
}

/// A rule that cannot be turned into an expression tree.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedExpression {
    /// A single-key object whose key names no known operator.
    #[error("unsupported operator '{op}'")]
    UnsupportedOperator { op: String },

    /// An operator was given the wrong number of operands.
    #[error("operator '{op}' expects {expected}, got {got}")]
    Arity {
        op: String,
        expected: Arity,
        got: usize,
    },

    /// An operand has the wrong shape for its position.
    #[error("operator '{op}': {message}")]
    InvalidOperand { op: String, message: String },

    /// A literal could not be represented as a value.
    #[error("invalid literal: {0}")]
    InvalidLiteral(#[from] ValueError),

    /// The rule nests deeper than the configured limit.
    #[error("rule nesting exceeds maximum depth of {max}")]
    TooDeep { max: usize },
}

/// Errors raised while evaluating an expression against a context.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    /// Operands are of a kind the operator does not accept.
    #[error("type mismatch in '{op}': expected {expected}, got {got}")]
    TypeMismatch {
        op: String,
        expected: String,
        got: String,
    },

    /// Division or remainder with a zero divisor.
    #[error("division by zero in '{op}'")]
    DivisionByZero { op: String },

    /// Decimal arithmetic left the representable range.
    #[error("numeric overflow in '{op}'")]
    Overflow { op: String },

    /// Text could not be read as an RFC 3339 timestamp.
    #[error("invalid timestamp '{value}' in '{op}'")]
    InvalidTimestamp { op: String, value: String },

    /// A variable path could not be resolved: bad call syntax, or a call
    /// argument that did not resolve to Text.
    #[error("{reason} (during evaluation of {path})")]
    InvalidPath { path: String, reason: String },

    /// A document template could not be rendered or compiled.
    #[error("invalid template: {reason}")]
    InvalidTemplate { reason: String },
}

impl EvalError {
    /// Short machine-readable code, used in evaluation logs and verdicts.
    pub fn code(&self) -> &'static str {
        match self {
            EvalError::TypeMismatch { .. } => "type_mismatch",
            EvalError::DivisionByZero { .. } => "division_by_zero",
            EvalError::Overflow { .. } => "overflow",
            EvalError::InvalidTimestamp { .. } => "invalid_timestamp",
            EvalError::InvalidPath { .. } => "invalid_path",
            EvalError::InvalidTemplate { .. } => "invalid_template",
        }
    }
}

/// Errors from evaluating a stored permission rule to a decision.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PermissionError {
    #[error(transparent)]
    Evaluation(#[from] EvalError),

    /// The rule produced a non-boolean; the rule itself is misconfigured.
    #[error("permission rule evaluated to {got}, expected Bool")]
    UnsupportedTopLevelResult { got: String },
}

impl PermissionError {
    pub fn code(&self) -> &'static str {
        match self {
            PermissionError::Evaluation(e) => e.code(),
            PermissionError::UnsupportedTopLevelResult { .. } => "unsupported_top_level_result",
        }
    }
}

/// A permission document could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    #[error("invalid permission document: {0}")]
    Parse(String),

    #[error("permission '{permission}': {source}")]
    Rule {
        permission: String,
        source: MalformedExpression,
    },
}

/// Conversion failures between JSON and runtime values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    #[error("number '{0}' is not representable as a decimal")]
    InvalidNumber(String),

    #[error("invalid RFC 3339 timestamp '{0}'")]
    InvalidTimestamp(String),

    #[error("expected a Mapping, got {0}")]
    NotAMapping(&'static str),
}

/// Errors from building an evaluation context.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    #[error("namespace '{0}' submitted twice in the same context")]
    DuplicateNamespace(String),

    #[error("namespace must not be empty")]
    EmptyNamespace,
}

/// A principal could not derive its context contribution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PrincipalError {
    #[error("principal '{kind}' is missing required claim '{claim}'")]
    MissingClaim { kind: &'static str, claim: String },

    #[error("principal '{kind}': {message}")]
    Invalid { kind: &'static str, message: String },
}

/// A typed entity field failed boundary validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("field '{field}' must not be null")]
    Null { field: String },

    #[error("field '{field}' expected {expected}, got {got}")]
    WrongType {
        field: String,
        expected: &'static str,
        got: &'static str,
    },

    #[error("field '{field}' has invalid number '{value}'")]
    InvalidNumber { field: String, value: String },

    #[error("field '{field}' has invalid timestamp '{value}'")]
    InvalidTimestamp { field: String, value: String },

    #[error("field '{field}' must not be empty")]
    Empty { field: String },

    #[error("field '{field}' is {actual} characters long, max is {max}")]
    TooLong {
        field: String,
        max: usize,
        actual: usize,
    },

    #[error("field '{field}' must be an integer of at least {min}, got {value}")]
    BelowMinimum {
        field: String,
        min: i64,
        value: String,
    },

    #[error("field '{field}' declared twice")]
    Duplicate { field: String },
}

/// Errors from assembling a request context out of principals and an entity.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssembleError {
    #[error(transparent)]
    Principal(#[from] PrincipalError),

    #[error(transparent)]
    Context(#[from] ContextError),
}

/// Errors from the load-assemble-authorize pipeline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckError {
    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Assemble(#[from] AssembleError),
}

/// Errors from loading an `EngineConfig`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Parse(String),

    #[error("environment variable {var} has invalid value '{value}'")]
    InvalidEnv { var: String, value: String },

    #[error("'{field}' must be greater than zero")]
    Zero { field: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arity_accepts() {
        assert!(Arity::Exactly(2).accepts(2));
        assert!(!Arity::Exactly(2).accepts(3));
        assert!(Arity::AtLeast(1).accepts(5));
        assert!(!Arity::AtLeast(1).accepts(0));
        assert!(Arity::Between(2, 3).accepts(3));
        assert!(!Arity::Between(2, 3).accepts(1));
    }

    #[test]
    fn arity_error_names_operator() {
        let err = MalformedExpression::Arity {
            op: "%".to_string(),
            expected: Arity::Exactly(2),
            got: 3,
        };
        assert_eq!(err.to_string(), "operator '%' expects exactly 2 operands, got 3");
    }

    #[test]
    fn permission_error_wraps_eval_error() {
        let err: PermissionError = EvalError::DivisionByZero { op: "/".to_string() }.into();
        assert_eq!(err.to_string(), "division by zero in '/'");
    }
}
