//! Document template matching for the `matches_template` operator.
//!
//! A template is text with `${path}` interpolations over a request object.
//! Matching renders the template against the request object, compiles the
//! rendered text into a pattern that tolerates whitespace, case, bullet
//! markers and typographic quotes, and searches the normalized document
//! text for it.
//!
//! Rendering must read every field of the request object (other than
//! `@id`, `@type`, `@link` and `#`-prefixed keys at the top level). A
//! request object carrying fields the template never mentions does not
//! match.

use indexmap::IndexSet;
use regex::Regex;

use crate::error::EvalError;
use crate::value::{format_timestamp, Mapping, Value};

/// Optional bullet before each unordered list item.
pub const DEFAULT_LIST_MARKER: &str =
    r"[\-+*\x{25A0}-\x{25FF}\x{2756}\x{27A2}\x{2794}\x{274F}\x{2605},\x{2022}]?";

const IGNORED_KEYS: [&str; 3] = ["@link", "@id", "@type"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub text: String,
    /// Regex for list markers; [`DEFAULT_LIST_MARKER`] when absent.
    pub unordered_list_marker_pattern: Option<String>,
}

/// Template text rendered against a request object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub text: String,
    /// Request object fields the template never read, as dotted paths.
    pub unread: Vec<String>,
}

impl Template {
    pub fn new(text: impl Into<String>) -> Self {
        Template {
            text: text.into(),
            unordered_list_marker_pattern: None,
        }
    }

    pub fn with_list_marker(mut self, pattern: impl Into<String>) -> Self {
        self.unordered_list_marker_pattern = Some(pattern.into());
        self
    }

    /// Read a template from `{"text", "unordered_list_marker_pattern"?}`.
    /// Anything else is not a template.
    pub fn from_value(value: &Value) -> Option<Template> {
        let Value::Mapping(map) = value else {
            return None;
        };
        let text = map.get("text")?.as_text()?.to_string();
        let unordered_list_marker_pattern = match map.get("unordered_list_marker_pattern") {
            None | Some(Value::Null) => None,
            Some(Value::Text(pattern)) => Some(pattern.clone()),
            Some(_) => return None,
        };
        Some(Template {
            text,
            unordered_list_marker_pattern,
        })
    }

    /// Does `document_text` contain this template rendered for `request`?
    pub fn matches(&self, document_text: &str, request: &Mapping) -> Result<bool, EvalError> {
        let rendered = self.render(request)?;
        if !rendered.unread.is_empty() {
            return Ok(false);
        }
        let pattern = self.compile(&rendered.text)?;
        Ok(pattern.is_match(&normalize(document_text)))
    }

    pub fn render(&self, request: &Mapping) -> Result<Rendered, EvalError> {
        let mut unread = IndexSet::new();
        collect_leaves(request, "", &mut unread);
        unread.retain(|key: &String| {
            let top = key.split('.').next().unwrap_or(key.as_str());
            !IGNORED_KEYS.contains(&top) && !top.starts_with('#')
        });

        let mut text = String::with_capacity(self.text.len());
        let mut rest = self.text.as_str();
        while let Some(start) = rest.find("${") {
            text.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after
                .find('}')
                .ok_or_else(|| invalid(format!("unterminated interpolation `{}`", &rest[start..])))?;
            text.push_str(&interpolate(request, after[..end].trim(), &mut unread)?);
            rest = &after[end + 1..];
        }
        text.push_str(rest);

        Ok(Rendered {
            text,
            unread: unread.into_iter().collect(),
        })
    }

    /// Compile rendered text into a search pattern over normalized text.
    pub fn compile(&self, rendered: &str) -> Result<Regex, EvalError> {
        let marker = self
            .unordered_list_marker_pattern
            .as_deref()
            .unwrap_or(DEFAULT_LIST_MARKER);
        let elements = read_elements(rendered);
        let body = join_groups(elements.iter().map(|e| e.to_regex(marker)));
        Regex::new(&format!(r"\s*(?:{})\s*", body)).map_err(|e| invalid(e.to_string()))
    }
}

/// `matches_template` over evaluated operands. Anything that is not a
/// document with Text `text` and a Mapping `request_object`, or not a
/// template, does not match.
pub fn matches_document(document: &Value, template: &Value) -> Result<bool, EvalError> {
    let Value::Mapping(document) = document else {
        return Ok(false);
    };
    let Some(template) = Template::from_value(template) else {
        return Ok(false);
    };
    let Some(Value::Text(text)) = document.get("text") else {
        return Ok(false);
    };
    let Some(Value::Mapping(request)) = document.get("request_object") else {
        return Ok(false);
    };
    template.matches(text, request)
}

fn invalid(reason: String) -> EvalError {
    EvalError::InvalidTemplate { reason }
}

fn collect_leaves(map: &Mapping, prefix: &str, out: &mut IndexSet<String>) {
    for (key, value) in map {
        let path = format!("{}{}", prefix, key);
        match value {
            Value::Mapping(nested) => collect_leaves(nested, &format!("{}.", path), out),
            _ => {
                out.insert(path);
            }
        }
    }
}

fn interpolate(
    request: &Mapping,
    expr: &str,
    unread: &mut IndexSet<String>,
) -> Result<String, EvalError> {
    if expr.is_empty() {
        return Err(invalid("empty interpolation `${}`".to_string()));
    }
    let field: Vec<&str> = expr.split('.').map(str::trim).collect();
    let mut current = request;
    let mut segments = field.iter().copied().peekable();
    while let Some(segment) = segments.next() {
        let value = current
            .get(segment)
            .filter(|v| !v.is_null())
            .ok_or_else(|| invalid(format!("`{}` is missing from the request object", expr)))?;
        match (value, segments.peek()) {
            (Value::Mapping(nested), Some(_)) => current = nested,
            (_, Some(_)) => {
                return Err(invalid(format!("`{}` does not name a field", expr)));
            }
            (leaf, None) => {
                unread.shift_remove(&field.join("."));
                return scalar_text(expr, leaf);
            }
        }
    }
    Err(invalid(format!("`{}` does not name a field", expr)))
}

fn scalar_text(expr: &str, value: &Value) -> Result<String, EvalError> {
    match value {
        Value::Text(text) => Ok(text.clone()),
        Value::Number(n) => Ok(n.normalize().to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Timestamp(ts) => Ok(format_timestamp(ts)),
        other => Err(invalid(format!(
            "`{}` is a {} and cannot be interpolated",
            expr,
            other.type_name()
        ))),
    }
}

// ──────────────────────────────────────────────
// Pattern compilation
// ──────────────────────────────────────────────

enum Element {
    Paragraph(String),
    List(Vec<String>),
}

impl Element {
    fn to_regex(&self, marker: &str) -> String {
        match self {
            Element::Paragraph(text) => regex::escape(&normalize(text)),
            Element::List(items) => join_groups(
                items
                    .iter()
                    .map(|item| format!("{}{}", marker, regex::escape(&normalize(item)))),
            ),
        }
    }
}

fn join_groups(parts: impl Iterator<Item = String>) -> String {
    let parts: Vec<String> = parts.collect();
    format!("(?:{})", parts.join(r")\s?(?:"))
}

fn read_elements(text: &str) -> Vec<Element> {
    let mut elements: Vec<Element> = Vec::new();
    for line in text.split(is_vertical_space) {
        if line.trim().is_empty() {
            continue;
        }
        match (list_item(line), elements.last_mut()) {
            (Some(item), Some(Element::List(items))) => items.push(item.to_string()),
            (Some(item), _) => elements.push(Element::List(vec![item.to_string()])),
            (None, _) => elements.push(Element::Paragraph(line.to_string())),
        }
    }
    elements
}

/// `  * item` -> `item`.
fn list_item(line: &str) -> Option<&str> {
    let rest = line.trim_start_matches(is_horizontal_space).strip_prefix('*')?;
    let item = rest.trim_start_matches(is_horizontal_space);
    (item.len() < rest.len()).then_some(item)
}

fn is_vertical_space(c: char) -> bool {
    matches!(
        c,
        '\n' | '\u{0B}' | '\u{0C}' | '\r' | '\u{85}' | '\u{2028}' | '\u{2029}'
    )
}

fn is_horizontal_space(c: char) -> bool {
    c == '\t' || (c.is_whitespace() && !is_vertical_space(c))
}

// ──────────────────────────────────────────────
// Normalization
// ──────────────────────────────────────────────

/// Lower-case `text`, drop separator and invisible characters except a
/// single space between two word characters, and replace typographic
/// quotes and dashes with ASCII.
pub fn normalize(text: &str) -> String {
    let chars: Vec<char> = text.to_lowercase().chars().collect();
    let mut out = String::with_capacity(chars.len());
    let mut i = 0;
    while i < chars.len() {
        if is_blank(chars[i]) {
            let start = i;
            while i < chars.len() && is_blank(chars[i]) {
                i += 1;
            }
            if start > 0
                && i < chars.len()
                && chars[start - 1].is_alphanumeric()
                && chars[i].is_alphanumeric()
            {
                out.push(' ');
            }
            continue;
        }
        match ascii_equivalent(chars[i]) {
            Some(replacement) => out.push_str(replacement),
            None => out.push(chars[i]),
        }
        i += 1;
    }
    out
}

fn is_blank(c: char) -> bool {
    c.is_whitespace()
        || c.is_control()
        || matches!(
            c,
            '\u{AD}' | '\u{200B}'..='\u{200F}' | '\u{202A}'..='\u{202E}' | '\u{2060}'..='\u{2064}' | '\u{FEFF}'
        )
}

fn ascii_equivalent(c: char) -> Option<&'static str> {
    match c {
        '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{2039}' | '\u{203A}' => Some("'"),
        '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{AB}' | '\u{BB}' => Some("\""),
        '\u{2010}'..='\u{2015}' | '\u{2212}' => Some("-"),
        '\u{2026}' => Some("..."),
        _ => None,
    }
}
