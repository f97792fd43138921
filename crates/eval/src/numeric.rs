//! Numeric model and typed comparison.
//!
//! All arithmetic uses `rust_decimal::Decimal` with checked operations. No
//! `f64` anywhere in the evaluation path. Division results carry at most 28
//! significant digits, rounded the way `rust_decimal` rounds.

use std::cmp::Ordering;

use rust_decimal::Decimal;

use crate::error::EvalError;
use crate::value::Value;

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
        }
    }
}

/// Arithmetic operators that fold over a list of numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Min,
    Max,
}

impl ArithOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Min => "min",
            ArithOp::Max => "max",
        }
    }
}

/// Compare two values with the given operator.
///
/// Equality accepts `Null` on either side (equal only to `Null`), which is
/// how rules test for absence. Otherwise both sides must be the same kind;
/// ordering is defined for Number, Text and Timestamp only.
pub fn compare_values(left: &Value, right: &Value, op: CompareOp) -> Result<bool, EvalError> {
    match op {
        CompareOp::Eq => values_equal(left, right, op),
        CompareOp::Ne => values_equal(left, right, op).map(|eq| !eq),
        CompareOp::Lt => order_values(left, right, op).map(|o| o == Ordering::Less),
        CompareOp::Lte => order_values(left, right, op).map(|o| o != Ordering::Greater),
        CompareOp::Gt => order_values(left, right, op).map(|o| o == Ordering::Greater),
        CompareOp::Gte => order_values(left, right, op).map(|o| o != Ordering::Less),
    }
}

fn values_equal(left: &Value, right: &Value, op: CompareOp) -> Result<bool, EvalError> {
    if left.is_null() || right.is_null() {
        return Ok(left.is_null() && right.is_null());
    }
    if std::mem::discriminant(left) != std::mem::discriminant(right) {
        return Err(mismatch(op.symbol(), left.type_name(), right.type_name()));
    }
    Ok(left == right)
}

/// Order two values of the same orderable kind.
pub fn order_values(left: &Value, right: &Value, op: CompareOp) -> Result<Ordering, EvalError> {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => Ok(l.cmp(r)),
        (Value::Text(l), Value::Text(r)) => Ok(l.cmp(r)),
        (Value::Timestamp(l), Value::Timestamp(r)) => Ok(l.cmp(r)),
        _ => Err(EvalError::TypeMismatch {
            op: op.symbol().to_string(),
            expected: "two Numbers, two Texts or two Timestamps".to_string(),
            got: format!("{} and {}", left.type_name(), right.type_name()),
        }),
    }
}

fn mismatch(op: &str, left: &str, right: &str) -> EvalError {
    EvalError::TypeMismatch {
        op: op.to_string(),
        expected: "operands of the same kind".to_string(),
        got: format!("{} and {}", left, right),
    }
}

/// Extract a number operand or fail with a type mismatch naming the operator.
pub fn expect_number(op: &str, value: &Value) -> Result<Decimal, EvalError> {
    value.as_number().ok_or_else(|| EvalError::TypeMismatch {
        op: op.to_string(),
        expected: "Number".to_string(),
        got: value.type_name().to_string(),
    })
}

/// Fold a non-empty list of numbers with an arithmetic operator.
///
/// A single operand to `-` negates it; every other operator returns a
/// single operand unchanged.
pub fn fold_numbers(op: ArithOp, operands: &[Decimal]) -> Result<Decimal, EvalError> {
    let symbol = op.symbol();
    let (first, rest) = operands.split_first().ok_or_else(|| EvalError::TypeMismatch {
        op: symbol.to_string(),
        expected: "at least one Number".to_string(),
        got: "no operands".to_string(),
    })?;
    if rest.is_empty() && op == ArithOp::Sub {
        return Ok(-*first);
    }
    rest.iter().try_fold(*first, |acc, &next| match op {
        ArithOp::Add => acc.checked_add(next).ok_or_else(|| overflow(symbol)),
        ArithOp::Sub => acc.checked_sub(next).ok_or_else(|| overflow(symbol)),
        ArithOp::Mul => acc.checked_mul(next).ok_or_else(|| overflow(symbol)),
        ArithOp::Div => checked_div(acc, next),
        ArithOp::Min => Ok(acc.min(next)),
        ArithOp::Max => Ok(acc.max(next)),
    })
}

/// Exact division; a zero divisor is an error rather than infinity.
pub fn checked_div(dividend: Decimal, divisor: Decimal) -> Result<Decimal, EvalError> {
    if divisor.is_zero() {
        return Err(EvalError::DivisionByZero {
            op: "/".to_string(),
        });
    }
    dividend.checked_div(divisor).ok_or_else(|| overflow("/"))
}

/// Truncated remainder: the result takes the sign of the dividend.
pub fn remainder(dividend: Decimal, divisor: Decimal) -> Result<Decimal, EvalError> {
    if divisor.is_zero() {
        return Err(EvalError::DivisionByZero {
            op: "%".to_string(),
        });
    }
    dividend.checked_rem(divisor).ok_or_else(|| overflow("%"))
}

fn overflow(op: &str) -> EvalError {
    EvalError::Overflow { op: op.to_string() }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
