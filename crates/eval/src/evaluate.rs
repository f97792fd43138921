//! Expression evaluator.
//!
//! A pure tree walk over an [`Expr`] against an immutable
//! [`EvaluationContext`]. Iteration operators bind names in a chain of
//! local scopes; variable lookup checks those scopes, innermost first,
//! before falling back to the context.
//!
//! Truthiness follows [`Value::is_truthy`]: only `Null` and `false` are
//! falsy.
//!
//! Every non-root variable read is logged into the trace as
//! `variable_evaluation_started` followed by either
//! `variable_evaluation_result` or `variable_evaluation_failed`.

use std::borrow::Cow;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use time::OffsetDateTime;
use tracing::trace;

use crate::context::EvaluationContext;
use crate::error::EvalError;
use crate::expression::{Expr, IterOp, TemporalOp, ACCUMULATOR, CURRENT};
use crate::numeric::{self, CompareOp};
use crate::provenance::{codes, EvaluationTrace};
use crate::template::matches_document;
use crate::value::{parse_timestamp, KeyPart, Mapping, Path, PathSegment, Value};

type Lookup = fn(&Value, &[PathSegment]) -> Value;

/// Evaluate an expression against a context.
pub fn evaluate(expr: &Expr, ctx: &EvaluationContext) -> Result<Value, EvalError> {
    let mut evaluator = Evaluator { ctx, trace: None };
    evaluator.eval(expr, &Scope::root())
}

/// Evaluate and record accessed values and log entries into `trace`.
pub fn evaluate_traced(
    expr: &Expr,
    ctx: &EvaluationContext,
    trace: &mut EvaluationTrace,
) -> Result<Value, EvalError> {
    let mut evaluator = Evaluator {
        ctx,
        trace: Some(trace),
    };
    evaluator.eval(expr, &Scope::root())
}

/// Local bindings introduced by iteration operators.
struct Scope<'p> {
    frame: Mapping,
    parent: Option<&'p Scope<'p>>,
}

impl<'p> Scope<'p> {
    fn root() -> Scope<'static> {
        Scope {
            frame: Mapping::new(),
            parent: None,
        }
    }

    fn child(&'p self, frame: Mapping) -> Scope<'p> {
        Scope {
            frame,
            parent: Some(self),
        }
    }

    fn binding(&self, name: &str) -> Option<&Value> {
        self.frame
            .get(name)
            .or_else(|| self.parent.and_then(|p| p.binding(name)))
    }
}

struct Evaluator<'a> {
    ctx: &'a EvaluationContext,
    trace: Option<&'a mut EvaluationTrace>,
}

impl Evaluator<'_> {
    fn eval(&mut self, expr: &Expr, scope: &Scope<'_>) -> Result<Value, EvalError> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),

            Expr::Array(items) => Ok(Value::Sequence(self.eval_all(items, scope)?)),

            Expr::Var { path, default } => {
                self.variable(path, scope, Value::lookup_path, default.as_deref())
            }

            Expr::VarMap { path, data } => {
                let path = self.eval(path, scope)?;
                let path = match path {
                    Value::Text(s) => Path::parse(&s),
                    Value::Number(n) => Path::parse(&n.to_string()),
                    other => return Err(mismatch("var_map", "Text path", &other)),
                };
                match data {
                    Some(data) => {
                        let base = self.eval(data, scope)?;
                        let path = self.concrete(&path, scope)?;
                        Ok(auto_map_lookup(&base, path.segments()))
                    }
                    None => self.variable(&path, scope, auto_map_lookup, None),
                }
            }

            Expr::Missing(operands) => {
                let paths = self.eval_paths("missing", operands.iter(), scope)?;
                Ok(Value::Sequence(self.missing_paths(paths, scope)?))
            }

            Expr::MissingSome { need, paths } => {
                let need = self.eval(need, scope)?;
                let need = integer("missing_some", &need)?;
                let paths = self.eval_paths("missing_some", [&**paths], scope)?;
                let total = paths.len() as i64;
                let missing = self.missing_paths(paths, scope)?;
                if total - missing.len() as i64 >= need {
                    Ok(Value::Sequence(Vec::new()))
                } else {
                    Ok(Value::Sequence(missing))
                }
            }

            Expr::And(operands) => {
                for operand in operands {
                    if !self.eval(operand, scope)?.is_truthy() {
                        return Ok(Value::Bool(false));
                    }
                }
                Ok(Value::Bool(true))
            }

            Expr::Or(operands) => {
                for operand in operands {
                    if self.eval(operand, scope)?.is_truthy() {
                        return Ok(Value::Bool(true));
                    }
                }
                Ok(Value::Bool(false))
            }

            Expr::Not(operand) => Ok(Value::Bool(!self.eval(operand, scope)?.is_truthy())),

            Expr::Truthy(operand) => Ok(Value::Bool(self.eval(operand, scope)?.is_truthy())),

            Expr::If(operands) => {
                let mut rest = operands.as_slice();
                loop {
                    match rest {
                        [] => return Ok(Value::Null),
                        [otherwise] => return self.eval(otherwise, scope),
                        [cond, then, tail @ ..] => {
                            if self.eval(cond, scope)?.is_truthy() {
                                return self.eval(then, scope);
                            }
                            rest = tail;
                        }
                    }
                }
            }

            Expr::Compare { op, left, right } => {
                let l = self.eval(left, scope)?;
                let r = self.eval(right, scope)?;
                Ok(Value::Bool(numeric::compare_values(&l, &r, *op)?))
            }

            Expr::Between {
                op,
                low,
                value,
                high,
            } => {
                let low = self.eval(low, scope)?;
                let value = self.eval(value, scope)?;
                let high = self.eval(high, scope)?;
                let result = numeric::compare_values(&low, &value, *op)?
                    && numeric::compare_values(&value, &high, *op)?;
                Ok(Value::Bool(result))
            }

            Expr::Arith { op, operands } => {
                let mut numbers = Vec::with_capacity(operands.len());
                for operand in operands {
                    let v = self.eval(operand, scope)?;
                    numbers.push(numeric::expect_number(op.symbol(), &v)?);
                }
                Ok(Value::Number(numeric::fold_numbers(*op, &numbers)?))
            }

            Expr::Modulo { dividend, divisor } => {
                let a = self.eval(dividend, scope)?;
                let b = self.eval(divisor, scope)?;
                let a = numeric::expect_number("%", &a)?;
                let b = numeric::expect_number("%", &b)?;
                Ok(Value::Number(numeric::remainder(a, b)?))
            }

            Expr::In { needle, haystack } => {
                let needle = self.eval(needle, scope)?;
                let haystack = self.eval(haystack, scope)?;
                membership(&needle, &haystack).map(Value::Bool)
            }

            Expr::Cat(operands) => {
                let mut out = String::new();
                for operand in operands {
                    out.push_str(&self.eval(operand, scope)?.to_string());
                }
                Ok(Value::Text(out))
            }

            Expr::Substr {
                text,
                start,
                length,
            } => {
                let text = self.eval(text, scope)?;
                let text = text
                    .as_text()
                    .ok_or_else(|| mismatch("substr", "Text", &text))?;
                let start = integer("substr", &self.eval(start, scope)?)?;
                let length = match length {
                    Some(length) => Some(integer("substr", &self.eval(length, scope)?)?),
                    None => None,
                };
                Ok(Value::Text(substring(text, start, length)))
            }

            Expr::Merge(operands) => {
                let mut out = Vec::new();
                for operand in operands {
                    match self.eval(operand, scope)? {
                        Value::Sequence(items) => out.extend(items),
                        other => out.push(other),
                    }
                }
                Ok(Value::Sequence(out))
            }

            Expr::Iterate {
                op,
                collection,
                binding,
                body,
            } => {
                let key = op.operator().key();
                let items = elements(key, self.eval(collection, scope)?)?;
                let name = binding.as_deref().unwrap_or(CURRENT);
                self.iterate(*op, items, name, body, scope)
            }

            Expr::Reduce {
                collection,
                body,
                initial,
            } => {
                let items = elements("reduce", self.eval(collection, scope)?)?;
                let mut accumulator = self.eval(initial, scope)?;
                for item in items {
                    let mut frame = Mapping::with_capacity(2);
                    frame.insert(CURRENT.to_string(), item);
                    frame.insert(ACCUMULATOR.to_string(), accumulator);
                    accumulator = self.eval(body, &scope.child(frame))?;
                }
                Ok(accumulator)
            }

            Expr::Contains {
                negated,
                collection,
                element,
            } => {
                let key = if *negated { "does_not_contain" } else { "contains" };
                let collection = self.eval(collection, scope)?;
                let element = self.eval(element, scope)?;
                let found = contains(key, &collection, &element)?;
                Ok(Value::Bool(found != *negated))
            }

            Expr::ContainsAnyOf {
                collection,
                candidates,
            } => {
                let collection = self.eval(collection, scope)?;
                let found = match self.eval(candidates, scope)? {
                    Value::Sequence(candidates) => {
                        let mut any = false;
                        for candidate in &candidates {
                            if contains("contains_any_of", &collection, candidate)? {
                                any = true;
                                break;
                            }
                        }
                        any
                    }
                    single => contains("contains_any_of", &collection, &single)?,
                };
                Ok(Value::Bool(found))
            }

            Expr::Temporal { op, left, right } => {
                let key = match op {
                    TemporalOp::Before => "before",
                    TemporalOp::After => "after",
                };
                let l = instant(key, &self.eval(left, scope)?)?;
                let r = instant(key, &self.eval(right, scope)?)?;
                Ok(Value::Bool(match (l, r, op) {
                    (Some(l), Some(r), TemporalOp::Before) => l < r,
                    (Some(l), Some(r), TemporalOp::After) => l > r,
                    _ => false,
                }))
            }

            Expr::Node(id) => {
                let Some(id) = id else {
                    return Ok(Value::Null);
                };
                let id = match self.eval(id, scope)? {
                    Value::Null => return Ok(Value::Null),
                    Value::Text(id) => id,
                    scalar @ (Value::Number(_) | Value::Bool(_)) => scalar.to_string(),
                    other => return Err(mismatch("node", "Text node id", &other)),
                };
                // A quoted id is literal; a bare one is a path to the id.
                let path = Path::parse(&format!("@({})", id));
                self.variable(&path, scope, Value::lookup_path, None)
            }

            Expr::MatchesTemplate { document, template } => {
                let document = self.eval(document, scope)?;
                let template = self.eval(template, scope)?;
                matches_document(&document, &template).map(Value::Bool)
            }
        }
    }

    fn eval_all(&mut self, items: &[Expr], scope: &Scope<'_>) -> Result<Vec<Value>, EvalError> {
        items.iter().map(|item| self.eval(item, scope)).collect()
    }

    fn iterate(
        &mut self,
        op: IterOp,
        items: Vec<Value>,
        name: &str,
        body: &Expr,
        scope: &Scope<'_>,
    ) -> Result<Value, EvalError> {
        let mut mapped = Vec::new();
        for item in items {
            let mut frame = Mapping::with_capacity(1);
            frame.insert(name.to_string(), item.clone());
            let inner = scope.child(frame);
            let result = self.eval(body, &inner);
            match op {
                IterOp::Map => mapped.push(result?),
                IterOp::Filter => {
                    if result?.is_truthy() {
                        mapped.push(item);
                    }
                }
                IterOp::All => {
                    if !result?.is_truthy() {
                        return Ok(Value::Bool(false));
                    }
                }
                IterOp::None => {
                    if result?.is_truthy() {
                        return Ok(Value::Bool(false));
                    }
                }
                IterOp::Some => {
                    if result?.is_truthy() {
                        return Ok(Value::Bool(true));
                    }
                }
            }
        }
        Ok(match op {
            IterOp::Map | IterOp::Filter => Value::Sequence(mapped),
            IterOp::All | IterOp::None => Value::Bool(true),
            IterOp::Some => Value::Bool(false),
        })
    }

    /// Read a variable, falling back to `default` when it is Null.
    fn variable(
        &mut self,
        path: &Path,
        scope: &Scope<'_>,
        lookup: Lookup,
        default: Option<&Expr>,
    ) -> Result<Value, EvalError> {
        let logged = !path.is_root();
        if logged {
            self.log(codes::VARIABLE_EVALUATION_STARTED, || path.to_string());
        }
        let result = self.concrete(path, scope).and_then(|concrete| {
            match (self.resolve_with(&concrete, scope, lookup), default) {
                (Value::Null, Some(default)) => self.eval(default, scope),
                (value, _) => Ok(value),
            }
        });
        if logged {
            match &result {
                Ok(value) => self.log(codes::VARIABLE_EVALUATION_RESULT, || {
                    format!("{}\n-> {}", path, value.to_json())
                }),
                Err(err) => self.log(codes::VARIABLE_EVALUATION_FAILED, || {
                    let reason = match err {
                        EvalError::InvalidPath { reason, .. } => reason.clone(),
                        other => other.to_string(),
                    };
                    format!("{} (during evaluation of {})", reason, path)
                }),
            }
        }
        result
    }

    /// Splice the quoted Text value of every call argument into its key.
    fn concrete<'p>(
        &mut self,
        path: &'p Path,
        scope: &Scope<'_>,
    ) -> Result<Cow<'p, Path>, EvalError> {
        if path.is_static() {
            return Ok(Cow::Borrowed(path));
        }
        let mut segments = Vec::with_capacity(path.segments().len());
        for segment in path.segments() {
            let segment = match segment {
                PathSegment::Dynamic(parts) => {
                    let mut key = String::new();
                    for part in parts {
                        match part {
                            KeyPart::Text(text) => key.push_str(text),
                            KeyPart::Argument(arg) => {
                                match self.variable(arg, scope, Value::lookup_path, None)? {
                                    Value::Text(text) => {
                                        key.push_str("('");
                                        key.push_str(&text);
                                        key.push_str("')");
                                    }
                                    other => {
                                        return Err(invalid_path(
                                            path,
                                            format!(
                                                "argument `{}` is {}, expected Text",
                                                arg,
                                                other.type_name()
                                            ),
                                        ))
                                    }
                                }
                            }
                        }
                    }
                    PathSegment::Key(key)
                }
                PathSegment::Invalid { reason, .. } => {
                    return Err(invalid_path(path, reason.clone()))
                }
                plain => plain.clone(),
            };
            segments.push(segment);
        }
        Ok(Cow::Owned(Path::new(segments)))
    }

    fn resolve_with(&mut self, path: &Path, scope: &Scope<'_>, lookup: Lookup) -> Value {
        if let Some(bound) = path.head_key().and_then(|name| scope.binding(name)) {
            return lookup(bound, &path.segments()[1..]);
        }
        let value = lookup(self.ctx.root(), path.segments());
        let rendered = path.to_string();
        trace!(path = %rendered, value = %value, "resolved variable");
        if let Some(trace) = self.trace.as_deref_mut() {
            trace.record_access(&rendered, &value);
        }
        value
    }

    fn eval_paths<'e>(
        &mut self,
        op: &str,
        operands: impl IntoIterator<Item = &'e Expr>,
        scope: &Scope<'_>,
    ) -> Result<Vec<Path>, EvalError> {
        let mut paths = Vec::new();
        for operand in operands {
            match self.eval(operand, scope)? {
                Value::Sequence(items) => {
                    for item in &items {
                        paths.push(path_value(op, item)?);
                    }
                }
                single => paths.push(path_value(op, &single)?),
            }
        }
        Ok(paths)
    }

    fn missing_paths(
        &mut self,
        paths: Vec<Path>,
        scope: &Scope<'_>,
    ) -> Result<Vec<Value>, EvalError> {
        let mut missing = Vec::new();
        for path in paths {
            let concrete = self.concrete(&path, scope)?;
            if self.resolve_with(&concrete, scope, Value::lookup_path).is_null() {
                missing.push(Value::Text(path.to_string()));
            }
        }
        Ok(missing)
    }

    /// Messages are only built when a trace is being recorded.
    fn log(&mut self, code: &str, message: impl FnOnce() -> String) {
        if let Some(trace) = self.trace.as_deref_mut() {
            trace.log(code, message());
        }
    }
}

// ──────────────────────────────────────────────
// Operator helpers
// ──────────────────────────────────────────────

fn mismatch(op: &str, expected: &str, got: &Value) -> EvalError {
    EvalError::TypeMismatch {
        op: op.to_string(),
        expected: expected.to_string(),
        got: got.type_name().to_string(),
    }
}

fn invalid_path(path: &Path, reason: String) -> EvalError {
    EvalError::InvalidPath {
        path: path.to_string(),
        reason,
    }
}

fn integer(op: &str, value: &Value) -> Result<i64, EvalError> {
    let n: Decimal = numeric::expect_number(op, value)?;
    if !n.fract().is_zero() {
        return Err(mismatch(op, "integer Number", value));
    }
    n.to_i64().ok_or_else(|| EvalError::Overflow { op: op.to_string() })
}

fn path_value(op: &str, value: &Value) -> Result<Path, EvalError> {
    match value {
        Value::Text(s) => Ok(Path::parse(s)),
        Value::Number(n) => Ok(Path::parse(&n.to_string())),
        other => Err(mismatch(op, "Text path", other)),
    }
}

/// Elements of an iterable value. Mappings iterate as `{key, value}` entries
/// in ascending key order; `Null` is empty.
fn elements(op: &str, collection: Value) -> Result<Vec<Value>, EvalError> {
    match collection {
        Value::Null => Ok(Vec::new()),
        Value::Sequence(items) => Ok(items),
        Value::Mapping(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Ok(entries
                .into_iter()
                .map(|(key, value)| {
                    Value::mapping([("key", Value::Text(key)), ("value", value)])
                })
                .collect())
        }
        other => Err(mismatch(op, "Sequence or Mapping", &other)),
    }
}

/// Equality that treats values of different kinds as unequal.
fn loosely_equal(a: &Value, b: &Value) -> bool {
    numeric::compare_values(a, b, CompareOp::Eq).unwrap_or(false)
}

fn membership(needle: &Value, haystack: &Value) -> Result<bool, EvalError> {
    match haystack {
        Value::Null => Ok(false),
        Value::Sequence(items) => Ok(items.iter().any(|item| loosely_equal(item, needle))),
        Value::Text(text) => match needle {
            Value::Text(part) => Ok(text.contains(part.as_str())),
            other => Err(mismatch("in", "Text needle for a Text haystack", other)),
        },
        Value::Mapping(map) => match needle {
            Value::Text(key) => Ok(map.contains_key(key)),
            other => Err(mismatch("in", "Text key for a Mapping haystack", other)),
        },
        other => Err(mismatch("in", "Sequence, Text or Mapping", other)),
    }
}

fn contains(op: &str, collection: &Value, element: &Value) -> Result<bool, EvalError> {
    match collection {
        Value::Null => Ok(false),
        Value::Sequence(items) => Ok(items.iter().any(|item| loosely_equal(item, element))),
        other => Err(mismatch(op, "Sequence", other)),
    }
}

fn instant(op: &str, value: &Value) -> Result<Option<OffsetDateTime>, EvalError> {
    match value {
        Value::Null => Ok(None),
        Value::Timestamp(ts) => Ok(Some(*ts)),
        Value::Text(text) => parse_timestamp(text)
            .map(Some)
            .map_err(|_| EvalError::InvalidTimestamp {
                op: op.to_string(),
                value: text.clone(),
            }),
        other => Err(mismatch(op, "Timestamp or RFC 3339 Text", other)),
    }
}

/// Character-based substring. A negative start counts from the end; a
/// negative length leaves that many characters off the end.
fn substring(text: &str, start: i64, length: Option<i64>) -> String {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len() as i64;
    let from = if start < 0 {
        len.saturating_add(start).max(0)
    } else {
        start.min(len)
    };
    let to = match length {
        None => len,
        Some(n) if n < 0 => len.saturating_add(n).max(from),
        Some(n) => from.saturating_add(n).min(len),
    };
    chars[from as usize..to as usize].iter().collect()
}

const SEQUENCE_KEYS: [&str; 6] = ["length", "$length", "$first", "$oldest", "$last", "$newest"];

/// Path lookup where an ordinary key applied to a sequence is applied to
/// each element instead, flattening nested sequences and dropping `Null`s.
fn auto_map_lookup(value: &Value, segments: &[PathSegment]) -> Value {
    segments
        .iter()
        .fold(value.clone(), |current, segment| auto_map_step(&current, segment))
}

fn auto_map_step(value: &Value, segment: &PathSegment) -> Value {
    match (value, segment) {
        (Value::Sequence(items), PathSegment::Key(key))
            if !SEQUENCE_KEYS.contains(&key.as_str()) =>
        {
            let mut out = Vec::new();
            for item in items {
                match auto_map_step(item, segment) {
                    Value::Null => {}
                    Value::Sequence(inner) => out.extend(inner),
                    other => out.push(other),
                }
            }
            Value::Sequence(out)
        }
        _ => value.lookup_path(std::slice::from_ref(segment)),
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
