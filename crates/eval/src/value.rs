//! Runtime value model and path lookup.
//!
//! All numeric values use `rust_decimal::Decimal` -- never `f64`.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use rust_decimal::Decimal;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::ValueError;

/// Ordered string-keyed mapping. Equality ignores insertion order.
pub type Mapping = IndexMap<String, Value>;

/// Runtime value flowing through contexts and expressions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(Decimal),
    Text(String),
    Timestamp(OffsetDateTime),
    Sequence(Vec<Value>),
    Mapping(Mapping),
}

impl Value {
    /// Returns a human-readable type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::Number(_) => "Number",
            Value::Text(_) => "Text",
            Value::Timestamp(_) => "Timestamp",
            Value::Sequence(_) => "Sequence",
            Value::Mapping(_) => "Mapping",
        }
    }

    /// Truthiness used by logical connectives and collection predicates.
    ///
    /// `Null` and `false` are falsy. Every other value is truthy, including
    /// numeric zero, empty text and empty collections.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Null | Value::Bool(false))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<Decimal> {
        match self {
            Value::Number(d) => Some(*d),
            _ => None,
        }
    }

    /// Build a mapping value from key/value pairs, later keys overwriting earlier ones.
    pub fn mapping<K, I>(entries: I) -> Value
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Mapping(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Look up a dotted path (see [`Path::parse`]). Missing paths yield `Null`.
    pub fn lookup(&self, path: &str) -> Value {
        self.lookup_path(Path::parse(path).segments())
    }

    /// Look up a segment list. Missing paths, and descents into scalars, yield `Null`.
    pub fn lookup_path(&self, segments: &[PathSegment]) -> Value {
        self.resolve(segments)
            .map(Cow::into_owned)
            .unwrap_or(Value::Null)
    }

    /// Resolve a segment list without cloning when the target is stored in the tree.
    pub fn resolve(&self, segments: &[PathSegment]) -> Option<Cow<'_, Value>> {
        let mut current = Cow::Borrowed(self);
        for segment in segments {
            current = match current {
                Cow::Borrowed(v) => step(v, segment)?,
                Cow::Owned(v) => Cow::Owned(step(&v, segment)?.into_owned()),
            };
        }
        Some(current)
    }

    /// Convert a JSON document to a value. Numbers are parsed exactly.
    pub fn from_json(v: &serde_json::Value) -> Result<Value, ValueError> {
        Ok(match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(parse_decimal(&n.to_string())?),
            serde_json::Value::String(s) => Value::Text(s.clone()),
            serde_json::Value::Array(items) => Value::Sequence(
                items
                    .iter()
                    .map(Value::from_json)
                    .collect::<Result<_, _>>()?,
            ),
            serde_json::Value::Object(obj) => {
                let mut map = Mapping::with_capacity(obj.len());
                for (k, item) in obj {
                    map.insert(k.clone(), Value::from_json(item)?);
                }
                Value::Mapping(map)
            }
        })
    }

    /// Convert to JSON. Timestamps render as RFC 3339 text.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(d) => decimal_to_json(*d),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Timestamp(ts) => serde_json::Value::String(format_timestamp(ts)),
            Value::Sequence(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Mapping(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => f.write_str(s),
            Value::Timestamp(ts) => f.write_str(&format_timestamp(ts)),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Decimal> for Value {
    fn from(d: Decimal) -> Self {
        Value::Number(d)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Number(Decimal::from(i))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<OffsetDateTime> for Value {
    fn from(ts: OffsetDateTime) -> Self {
        Value::Timestamp(ts)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Sequence(items)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl serde::Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for Value {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        Value::from_json(&json).map_err(serde::de::Error::custom)
    }
}

// ──────────────────────────────────────────────
// Paths
// ──────────────────────────────────────────────

/// One step of a path.
///
/// Most segments are a plain mapping key or a sequence index. A segment
/// containing a call such as `@(ids.first)` is [`PathSegment::Dynamic`]:
/// the argument path is resolved at evaluation time and spliced into the
/// key as `@('<value>')`. Call arguments that are already quoted
/// (`@('doc-1')`) fold into a plain key when parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
    Dynamic(Vec<KeyPart>),
    /// Text that could not be parsed; resolving it is an evaluation error.
    Invalid { raw: String, reason: String },
}

/// Piece of a [`PathSegment::Dynamic`] key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyPart {
    Text(String),
    /// Rendered as `('<resolved text>')`.
    Argument(Path),
}

impl From<&str> for PathSegment {
    fn from(s: &str) -> Self {
        let canonical = s == "0" || !s.starts_with('0');
        if canonical && !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(i) = s.parse::<usize>() {
                return PathSegment::Index(i);
            }
        }
        PathSegment::Key(s.to_string())
    }
}

impl From<usize> for PathSegment {
    fn from(i: usize) -> Self {
        PathSegment::Index(i)
    }
}

impl PathSegment {
    fn from_parts(mut parts: Vec<KeyPart>) -> Self {
        match parts.as_slice() {
            [] => PathSegment::from(""),
            [KeyPart::Text(_)] => match parts.pop() {
                Some(KeyPart::Text(text)) => PathSegment::from(text.as_str()),
                _ => PathSegment::Dynamic(parts),
            },
            _ => PathSegment::Dynamic(parts),
        }
    }
}

/// A parsed variable path such as `signature.certificate.subject.CN`.
///
/// Segments are separated by `.`; a backslash escapes the next character,
/// so `a\.b` is the single key `a.b`. `name(arg)` inside a segment is a
/// call: a quoted argument (`'x'`) is kept verbatim, anything else is a
/// path whose Text value is quoted in its place. The empty path addresses
/// the root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Path(Vec<PathSegment>);

impl Path {
    pub fn new(segments: Vec<PathSegment>) -> Self {
        Path(segments)
    }

    pub fn root() -> Self {
        Path(Vec::new())
    }

    pub fn parse(s: &str) -> Self {
        if s.is_empty() {
            return Path::root();
        }
        let mut parser = PathParser { src: s, pos: 0 };
        let mut segments = Vec::new();
        loop {
            let start = parser.pos;
            match parser.read_until('.', false) {
                Ok((parts, closed)) => {
                    segments.push(PathSegment::from_parts(parts));
                    if !closed {
                        break;
                    }
                }
                Err(reason) => {
                    segments.push(PathSegment::Invalid {
                        raw: s[start..].to_string(),
                        reason,
                    });
                    break;
                }
            }
        }
        Path(segments)
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// True when every segment is a plain key or index.
    pub fn is_static(&self) -> bool {
        self.0
            .iter()
            .all(|s| matches!(s, PathSegment::Key(_) | PathSegment::Index(_)))
    }

    /// First segment as a key, used to resolve iteration bindings.
    pub fn head_key(&self) -> Option<&str> {
        match self.0.first() {
            Some(PathSegment::Key(k)) => Some(k),
            _ => None,
        }
    }
}

struct PathParser<'s> {
    src: &'s str,
    pos: usize,
}

impl PathParser<'_> {
    fn next_char(&mut self) -> Option<char> {
        let c = self.src[self.pos..].chars().next()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Read key parts up to `end`. Returns whether `end` was seen.
    fn read_until(&mut self, end: char, required: bool) -> Result<(Vec<KeyPart>, bool), String> {
        let mut parts = Vec::new();
        let mut text = String::new();
        while let Some(c) = self.next_char() {
            match c {
                // A trailing backslash is kept literally.
                '\\' => text.push(self.next_char().unwrap_or('\\')),
                c if c == end => {
                    if !text.is_empty() {
                        parts.push(KeyPart::Text(text));
                    }
                    return Ok((parts, true));
                }
                '(' => {
                    let start = self.pos;
                    let (inner, _) = self.read_until(')', true)?;
                    let raw = &self.src[start..self.pos - 1];
                    match literal_argument(&inner)? {
                        Some(quoted) => {
                            text.push('(');
                            text.push_str(&quoted);
                            text.push(')');
                        }
                        None => {
                            if !text.is_empty() {
                                parts.push(KeyPart::Text(std::mem::take(&mut text)));
                            }
                            parts.push(KeyPart::Argument(Path::parse(raw)));
                        }
                    }
                }
                other => text.push(other),
            }
        }
        if required {
            return Err(format!("unexpected end of input, expecting `{}`", end));
        }
        if !text.is_empty() {
            parts.push(KeyPart::Text(text));
        }
        Ok((parts, false))
    }
}

/// A quoted call argument, returned with its quotes.
fn literal_argument(inner: &[KeyPart]) -> Result<Option<String>, String> {
    let text = match inner {
        [] => return Ok(None),
        [KeyPart::Text(text)] => text,
        _ => return Ok(None),
    };
    if !text.starts_with('\'') {
        return Ok(None);
    }
    if text.len() < 2 || !text.ends_with('\'') {
        return Err("string argument not closed with `'`".to_string());
    }
    Ok(Some(text.clone()))
}

impl FromStr for Path {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Path::parse(s))
    }
}

fn write_escaped(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    for c in text.chars() {
        if matches!(c, '.' | '\\' | '(' | ')') {
            f.write_str("\\")?;
        }
        write!(f, "{}", c)?;
    }
    Ok(())
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            match segment {
                PathSegment::Index(n) => write!(f, "{}", n)?,
                PathSegment::Key(k) => write_escaped(f, k)?,
                PathSegment::Dynamic(parts) => {
                    for part in parts {
                        match part {
                            KeyPart::Text(text) => write_escaped(f, text)?,
                            KeyPart::Argument(arg) => write!(f, "({})", arg)?,
                        }
                    }
                }
                PathSegment::Invalid { raw, .. } => f.write_str(raw)?,
            }
        }
        Ok(())
    }
}

fn step<'a>(value: &'a Value, segment: &PathSegment) -> Option<Cow<'a, Value>> {
    match (value, segment) {
        (Value::Mapping(map), PathSegment::Key(k)) => map.get(k).map(Cow::Borrowed),
        (Value::Mapping(map), PathSegment::Index(i)) => {
            map.get(&i.to_string()).map(Cow::Borrowed)
        }
        (Value::Sequence(items), PathSegment::Index(i)) => items.get(*i).map(Cow::Borrowed),
        (Value::Sequence(items), PathSegment::Key(k)) => match k.as_str() {
            "length" | "$length" => Some(Cow::Owned(Value::Number(Decimal::from(items.len())))),
            "$first" | "$oldest" => items.first().map(Cow::Borrowed),
            "$last" | "$newest" => items.last().map(Cow::Borrowed),
            _ => None,
        },
        _ => None,
    }
}

// ──────────────────────────────────────────────
// Scalar helpers
// ──────────────────────────────────────────────

/// Parse decimal text, accepting scientific notation.
pub fn parse_decimal(s: &str) -> Result<Decimal, ValueError> {
    Decimal::from_str_exact(s)
        .or_else(|_| Decimal::from_scientific(s))
        .map_err(|_| ValueError::InvalidNumber(s.to_string()))
}

/// Render a decimal as an exact JSON number.
pub fn decimal_to_json(d: Decimal) -> serde_json::Value {
    let text = d.to_string();
    serde_json::Number::from_str(&text)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::String(text))
}

/// Parse an RFC 3339 timestamp.
pub fn parse_timestamp(s: &str) -> Result<OffsetDateTime, ValueError> {
    OffsetDateTime::parse(s, &Rfc3339).map_err(|_| ValueError::InvalidTimestamp(s.to_string()))
}

/// Format a timestamp as RFC 3339.
pub fn format_timestamp(ts: &OffsetDateTime) -> String {
    ts.format(&Rfc3339).unwrap_or_else(|_| ts.to_string())
}

/// Serde adapters for RFC 3339 timestamp fields.
pub mod rfc3339 {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::OffsetDateTime;

    pub fn serialize<S: Serializer>(ts: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_timestamp(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<OffsetDateTime, D::Error> {
        let text = String::deserialize(deserializer)?;
        super::parse_timestamp(&text).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};
        use time::OffsetDateTime;

        pub fn serialize<S: Serializer>(
            ts: &Option<OffsetDateTime>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match ts {
                Some(ts) => serializer.serialize_some(&crate::value::format_timestamp(ts)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<OffsetDateTime>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|text| crate::value::parse_timestamp(&text).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
