//! Immutable evaluation context: a namespaced value tree.
//!
//! A context is accumulated through [`ContextBuilder`] and frozen by
//! [`ContextBuilder::build`]. Contexts from several sources are combined
//! with [`EvaluationContext::merge`], a deterministic deep merge in which
//! the right-hand side wins scalar conflicts.

use crate::error::{ContextError, ValueError};
use crate::value::{Mapping, Path, Value};

/// Rooted mapping from namespace to sub-tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationContext {
    root: Value,
}

impl Default for EvaluationContext {
    fn default() -> Self {
        EvaluationContext::empty()
    }
}

impl EvaluationContext {
    pub fn builder() -> ContextBuilder {
        ContextBuilder::default()
    }

    /// The context with no namespaces; identity for [`merge`](Self::merge).
    pub fn empty() -> Self {
        EvaluationContext {
            root: Value::Mapping(Mapping::new()),
        }
    }

    /// Wrap a JSON document as a context, one namespace per top-level key.
    ///
    /// `null` gives the empty context; any other non-object root is
    /// rejected.
    pub fn from_json(json: &serde_json::Value) -> Result<Self, ValueError> {
        let root = match Value::from_json(json)? {
            Value::Null => Value::Mapping(Mapping::new()),
            root @ Value::Mapping(_) => root,
            other => return Err(ValueError::NotAMapping(other.type_name())),
        };
        Ok(EvaluationContext { root })
    }

    /// Deep-merge `other` over `self` into a new context.
    ///
    /// Keys present in both sides merge recursively when both values are
    /// mappings; otherwise the value from `other` wins.
    pub fn merge(&self, other: &EvaluationContext) -> EvaluationContext {
        EvaluationContext {
            root: merge_values(&self.root, &other.root),
        }
    }

    /// Merge a sequence of contexts left to right, starting from empty.
    pub fn fold<'a, I>(contexts: I) -> EvaluationContext
    where
        I: IntoIterator<Item = &'a EvaluationContext>,
    {
        contexts
            .into_iter()
            .fold(EvaluationContext::empty(), |acc, next| acc.merge(next))
    }

    /// Resolve a dotted path. Absent paths yield `Null`, never an error.
    pub fn lookup(&self, path: &str) -> Value {
        self.root.lookup(path)
    }

    pub fn lookup_path(&self, path: &Path) -> Value {
        self.root.lookup_path(path.segments())
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        let keys = match &self.root {
            Value::Mapping(map) => Some(map.keys().map(String::as_str)),
            _ => None,
        };
        keys.into_iter().flatten()
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces().next().is_none()
    }

    pub fn to_json(&self) -> serde_json::Value {
        self.root.to_json()
    }
}

impl serde::Serialize for EvaluationContext {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.root.serialize(serializer)
    }
}

fn merge_values(base: &Value, over: &Value) -> Value {
    match (base, over) {
        (Value::Mapping(left), Value::Mapping(right)) => {
            let mut merged = left.clone();
            for (key, value) in right {
                let next = match merged.get(key) {
                    Some(existing) => merge_values(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), next);
            }
            Value::Mapping(merged)
        }
        (_, over) => over.clone(),
    }
}

/// Accumulates namespaced contributions before freezing them into a context.
#[derive(Debug, Default)]
pub struct ContextBuilder {
    entries: Mapping,
}

impl ContextBuilder {
    /// Add a namespace. Each namespace may be submitted once per builder.
    pub fn with(mut self, namespace: impl Into<String>, value: Value) -> Result<Self, ContextError> {
        let namespace = namespace.into();
        if namespace.is_empty() {
            return Err(ContextError::EmptyNamespace);
        }
        if self.entries.contains_key(&namespace) {
            return Err(ContextError::DuplicateNamespace(namespace));
        }
        self.entries.insert(namespace, value);
        Ok(self)
    }

    pub fn build(self) -> EvaluationContext {
        EvaluationContext {
            root: Value::Mapping(self.entries),
        }
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
