//! Typed entity fields, validated at the boundary.
//!
//! Every field of a ledger entity enters the engine through
//! [`TypedValue::from_json`], which checks the declared kind and its
//! constraints. Once inside, a field is just a [`Value`] under the entity
//! namespace of the context.

use indexmap::IndexMap;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::config::EngineConfig;
use crate::error::FieldError;
use crate::value::{parse_decimal, parse_timestamp, Mapping, Value};

/// Smallest credits amount an entity may carry.
pub const MIN_CREDITS: i64 = 1;

/// Declared kind of an entity field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Boolean,
    Timestamp,
    Number,
    Text,
    Identifier,
    Credits,
}

impl FieldKind {
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::Boolean => "boolean",
            FieldKind::Timestamp => "timestamp",
            FieldKind::Number => "number",
            FieldKind::Text => "text",
            FieldKind::Identifier => "identifier",
            FieldKind::Credits => "credits",
        }
    }
}

/// A validated scalar field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypedValue {
    Boolean(bool),
    Timestamp(OffsetDateTime),
    Number(rust_decimal::Decimal),
    Text(String),
    Identifier(String),
    Credits(i64),
}

impl TypedValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            TypedValue::Boolean(_) => FieldKind::Boolean,
            TypedValue::Timestamp(_) => FieldKind::Timestamp,
            TypedValue::Number(_) => FieldKind::Number,
            TypedValue::Text(_) => FieldKind::Text,
            TypedValue::Identifier(_) => FieldKind::Identifier,
            TypedValue::Credits(_) => FieldKind::Credits,
        }
    }

    /// Parse and validate a JSON value against the declared kind.
    pub fn from_json(
        field: &str,
        kind: FieldKind,
        json: &serde_json::Value,
        config: &EngineConfig,
    ) -> Result<TypedValue, FieldError> {
        if json.is_null() {
            return Err(FieldError::Null {
                field: field.to_string(),
            });
        }
        let wrong_type = || FieldError::WrongType {
            field: field.to_string(),
            expected: kind.name(),
            got: json_type_name(json),
        };

        match kind {
            FieldKind::Boolean => json.as_bool().map(TypedValue::Boolean).ok_or_else(wrong_type),
            FieldKind::Timestamp => {
                let text = json.as_str().ok_or_else(wrong_type)?;
                parse_timestamp(text)
                    .map(TypedValue::Timestamp)
                    .map_err(|_| FieldError::InvalidTimestamp {
                        field: field.to_string(),
                        value: text.to_string(),
                    })
            }
            FieldKind::Number => parse_number(field, json)
                .map(TypedValue::Number)
                .map_err(|e| e.unwrap_or_else(wrong_type)),
            FieldKind::Text => {
                let text = json.as_str().ok_or_else(wrong_type)?;
                check_length(field, text, config.text_max_length)?;
                Ok(TypedValue::Text(text.to_string()))
            }
            FieldKind::Identifier => {
                let text = json.as_str().ok_or_else(wrong_type)?;
                if text.is_empty() {
                    return Err(FieldError::Empty {
                        field: field.to_string(),
                    });
                }
                check_length(field, text, Some(config.identifier_max_length))?;
                Ok(TypedValue::Identifier(text.to_string()))
            }
            FieldKind::Credits => {
                let amount = parse_number(field, json).map_err(|e| e.unwrap_or_else(wrong_type))?;
                let below = || FieldError::BelowMinimum {
                    field: field.to_string(),
                    min: MIN_CREDITS,
                    value: amount.to_string(),
                };
                if !amount.fract().is_zero() {
                    return Err(below());
                }
                match amount.to_i64() {
                    Some(n) if n >= MIN_CREDITS => Ok(TypedValue::Credits(n)),
                    _ => Err(below()),
                }
            }
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            TypedValue::Boolean(b) => Value::Bool(*b),
            TypedValue::Timestamp(ts) => Value::Timestamp(*ts),
            TypedValue::Number(d) => Value::Number(*d),
            TypedValue::Text(s) | TypedValue::Identifier(s) => Value::Text(s.clone()),
            TypedValue::Credits(n) => Value::from(*n),
        }
    }
}

/// `Err(None)` means the JSON had the wrong type entirely.
fn parse_number(
    field: &str,
    json: &serde_json::Value,
) -> Result<rust_decimal::Decimal, Option<FieldError>> {
    let n = json.as_number().ok_or(None)?;
    let text = n.to_string();
    parse_decimal(&text).map_err(|_| {
        Some(FieldError::InvalidNumber {
            field: field.to_string(),
            value: text,
        })
    })
}

fn check_length(field: &str, text: &str, max: Option<usize>) -> Result<(), FieldError> {
    let actual = text.chars().count();
    match max {
        Some(max) if actual > max => Err(FieldError::TooLong {
            field: field.to_string(),
            max,
            actual,
        }),
        _ => Ok(()),
    }
}

fn json_type_name(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct FieldSpec {
    kind: FieldKind,
    value: serde_json::Value,
}

/// A validated snapshot of an entity's fields, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EntityFields {
    fields: IndexMap<String, TypedValue>,
}

impl EntityFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field. Each name may be declared once.
    pub fn insert(&mut self, name: impl Into<String>, value: TypedValue) -> Result<(), FieldError> {
        let name = name.into();
        if self.fields.contains_key(&name) {
            return Err(FieldError::Duplicate { field: name });
        }
        self.fields.insert(name, value);
        Ok(())
    }

    pub fn with(mut self, name: impl Into<String>, value: TypedValue) -> Result<Self, FieldError> {
        self.insert(name, value)?;
        Ok(self)
    }

    /// Parse `{"<field>": {"kind": "<kind>", "value": <json>}, ...}`.
    pub fn from_json(json: &serde_json::Value, config: &EngineConfig) -> Result<Self, FieldError> {
        let obj = json.as_object().ok_or_else(|| FieldError::WrongType {
            field: "entity".to_string(),
            expected: "object",
            got: json_type_name(json),
        })?;
        let mut fields = EntityFields::new();
        for (name, spec) in obj {
            let spec: FieldSpec =
                serde_json::from_value(spec.clone()).map_err(|_| FieldError::WrongType {
                    field: name.clone(),
                    expected: "{\"kind\", \"value\"} object",
                    got: json_type_name(spec),
                })?;
            let value = TypedValue::from_json(name, spec.kind, &spec.value, config)?;
            fields.insert(name.clone(), value)?;
        }
        Ok(fields)
    }

    pub fn get(&self, name: &str) -> Option<&TypedValue> {
        self.fields.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TypedValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn to_value(&self) -> Value {
        let map: Mapping = self
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), v.to_value()))
            .collect();
        Value::Mapping(map)
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use serde_json::json;
    use time::macros::datetime;

    fn parse(kind: FieldKind, json: serde_json::Value) -> Result<TypedValue, FieldError> {
        TypedValue::from_json("f", kind, &json, &EngineConfig::default())
    }

    #[test]
    fn boolean_field() {
        assert_eq!(parse(FieldKind::Boolean, json!(true)).unwrap(), TypedValue::Boolean(true));
        assert!(matches!(
            parse(FieldKind::Boolean, json!("true")),
            Err(FieldError::WrongType { expected: "boolean", got: "string", .. })
        ));
    }

    #[test]
    fn null_is_rejected_for_every_kind() {
        for kind in [FieldKind::Boolean, FieldKind::Text, FieldKind::Credits] {
            assert!(matches!(parse(kind, json!(null)), Err(FieldError::Null { .. })));
        }
    }

    #[test]
    fn timestamp_field() {
        assert_eq!(
            parse(FieldKind::Timestamp, json!("2024-02-29T12:00:00Z")).unwrap(),
            TypedValue::Timestamp(datetime!(2024-02-29 12:00 UTC))
        );
        assert!(matches!(
            parse(FieldKind::Timestamp, json!("yesterday")),
            Err(FieldError::InvalidTimestamp { .. })
        ));
    }

    #[test]
    fn number_field_is_exact() {
        assert_eq!(
            parse(FieldKind::Number, json!(12.50)).unwrap(),
            TypedValue::Number(Decimal::new(1250, 2))
        );
        assert!(matches!(
            parse(FieldKind::Number, json!("12")),
            Err(FieldError::WrongType { .. })
        ));
    }

    #[test]
    fn identifier_bounds() {
        assert!(matches!(parse(FieldKind::Identifier, json!("")), Err(FieldError::Empty { .. })));
        let config = EngineConfig {
            identifier_max_length: 4,
            ..EngineConfig::default()
        };
        let err = TypedValue::from_json("id", FieldKind::Identifier, &json!("abcde"), &config)
            .unwrap_err();
        assert_eq!(
            err,
            FieldError::TooLong {
                field: "id".to_string(),
                max: 4,
                actual: 5
            }
        );
        assert!(TypedValue::from_json("id", FieldKind::Identifier, &json!("abcd"), &config).is_ok());
    }

    #[test]
    fn text_limit_counts_characters() {
        let config = EngineConfig {
            text_max_length: Some(3),
            ..EngineConfig::default()
        };
        assert!(TypedValue::from_json("t", FieldKind::Text, &json!("żółw"), &config).is_err());
        assert!(TypedValue::from_json("t", FieldKind::Text, &json!("żół"), &config).is_ok());
        // no limit by default
        assert!(parse(FieldKind::Text, json!("x".repeat(10_000))).is_ok());
    }

    #[test]
    fn credits_minimum() {
        assert_eq!(parse(FieldKind::Credits, json!(1)).unwrap(), TypedValue::Credits(1));
        assert!(matches!(
            parse(FieldKind::Credits, json!(0)),
            Err(FieldError::BelowMinimum { min: 1, .. })
        ));
        assert!(matches!(
            parse(FieldKind::Credits, json!(-5)),
            Err(FieldError::BelowMinimum { .. })
        ));
        assert!(matches!(
            parse(FieldKind::Credits, json!(2.5)),
            Err(FieldError::BelowMinimum { .. })
        ));
    }

    #[test]
    fn entity_from_json() {
        let fields = EntityFields::from_json(
            &json!({
                "owner": { "kind": "identifier", "value": "alice" },
                "credits": { "kind": "credits", "value": 10 },
                "sealed": { "kind": "boolean", "value": false }
            }),
            &EngineConfig::default(),
        )
        .unwrap();
        assert_eq!(fields.len(), 3);
        let v = fields.to_value();
        assert_eq!(v.lookup("owner"), Value::from("alice"));
        assert_eq!(v.lookup("credits"), Value::from(10));
        assert_eq!(v.lookup("sealed"), Value::Bool(false));
    }

    #[test]
    fn entity_from_json_rejects_bad_spec() {
        let err = EntityFields::from_json(
            &json!({ "owner": { "kind": "uuid", "value": "x" } }),
            &EngineConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, FieldError::WrongType { ref field, .. } if field == "owner"));
    }

    #[test]
    fn duplicate_field_rejected() {
        let err = EntityFields::new()
            .with("a", TypedValue::Boolean(true))
            .unwrap()
            .with("a", TypedValue::Boolean(false))
            .unwrap_err();
        assert_eq!(err, FieldError::Duplicate { field: "a".to_string() });
    }
}
