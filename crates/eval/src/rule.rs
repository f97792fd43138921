//! JSON rule representation: decoding into [`Expr`] and encoding back.
//!
//! Decoding rules:
//! - an object with exactly one key naming an operator is an operator node;
//!   its value is the operand list (a non-array value is a single operand);
//! - `constant` takes its value verbatim as a literal;
//! - an object with one unknown key is rejected;
//! - other objects, and all scalars, are literals;
//! - arrays are arrays of expressions.
//!
//! `decode(encode(e)) == e` for every tree built from JSON.
//!
//! A timestamp literal encodes as `{"timestamp": [..]}` only at the top of
//! a literal. Inside a literal Sequence or Mapping it encodes as RFC 3339
//! Text and decodes back as Text; decoding never produces such nesting.

use crate::config::DEFAULT_MAX_RULE_DEPTH;
use crate::error::MalformedExpression;
use crate::expression::{Expr, Operator};
use crate::value::{format_timestamp, Value};

/// Decode a rule, rejecting nesting deeper than `max_depth`.
pub fn decode(json: &serde_json::Value, max_depth: usize) -> Result<Expr, MalformedExpression> {
    decode_at(json, 1, max_depth)
}

fn decode_at(
    json: &serde_json::Value,
    depth: usize,
    max_depth: usize,
) -> Result<Expr, MalformedExpression> {
    if depth > max_depth {
        return Err(MalformedExpression::TooDeep { max: max_depth });
    }
    match json {
        serde_json::Value::Array(items) => Ok(Expr::Array(decode_all(items, depth, max_depth)?)),
        serde_json::Value::Object(obj) if obj.len() == 1 => {
            let Some((key, operand)) = obj.iter().next() else {
                return Ok(Expr::Literal(Value::from_json(json)?));
            };
            let op = Operator::from_key(key).ok_or_else(|| {
                MalformedExpression::UnsupportedOperator { op: key.clone() }
            })?;
            if op == Operator::Constant {
                return Ok(Expr::Literal(Value::from_json(operand)?));
            }
            let operands = match operand {
                serde_json::Value::Array(items) => decode_all(items, depth, max_depth)?,
                single => vec![decode_at(single, depth + 1, max_depth)?],
            };
            Expr::build(op, operands)
        }
        other => Ok(Expr::Literal(Value::from_json(other)?)),
    }
}

fn decode_all(
    items: &[serde_json::Value],
    depth: usize,
    max_depth: usize,
) -> Result<Vec<Expr>, MalformedExpression> {
    items
        .iter()
        .map(|item| decode_at(item, depth + 1, max_depth))
        .collect()
}

/// Encode an expression back into its JSON rule form.
pub fn encode(expr: &Expr) -> serde_json::Value {
    match expr {
        Expr::Literal(value) => encode_literal(value),
        Expr::Array(items) => serde_json::Value::Array(items.iter().map(encode).collect()),
        Expr::Var { path, default } => {
            let path = serde_json::Value::String(path.to_string());
            match default {
                Some(d) => operator("var", vec![path, encode(d)]),
                None => operator("var", vec![path]),
            }
        }
        other => {
            let key = other.operator_kind().map(|op| op.key()).unwrap_or("constant");
            let mut operands: Vec<serde_json::Value> =
                other.children().into_iter().map(encode).collect();
            // The binding name sits between collection and body.
            if let Expr::Iterate {
                binding: Some(name),
                ..
            } = other
            {
                operands.insert(1, serde_json::Value::String(name.clone()));
            }
            operator(key, operands)
        }
    }
}

fn encode_literal(value: &Value) -> serde_json::Value {
    match value {
        Value::Timestamp(ts) => operator(
            "timestamp",
            vec![serde_json::Value::String(format_timestamp(ts))],
        ),
        // Arrays and single-key objects would otherwise decode as expressions.
        Value::Sequence(_) => single("constant", value.to_json()),
        Value::Mapping(map) if map.len() == 1 => single("constant", value.to_json()),
        other => other.to_json(),
    }
}

fn operator(key: &str, operands: Vec<serde_json::Value>) -> serde_json::Value {
    single(key, serde_json::Value::Array(operands))
}

fn single(key: &str, value: serde_json::Value) -> serde_json::Value {
    let mut obj = serde_json::Map::new();
    obj.insert(key.to_string(), value);
    serde_json::Value::Object(obj)
}

impl Expr {
    /// Decode with the default depth limit.
    pub fn from_json(json: &serde_json::Value) -> Result<Expr, MalformedExpression> {
        decode(json, DEFAULT_MAX_RULE_DEPTH)
    }

    pub fn to_json(&self) -> serde_json::Value {
        encode(self)
    }
}

impl serde::Serialize for Expr {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        encode(self).serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for Expr {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        Expr::from_json(&json).map_err(serde::de::Error::custom)
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
