//! Permissions: loading permission documents and deciding requests.
//!
//! A permission document names the actions it applies to (`allow`), an
//! optional map of simple path requirements (`require`) and an optional
//! free-form rule (`require_logic`). Requirements compile to expressions
//! and are joined with the rule by `and`; a permission with neither
//! grants unconditionally.
//!
//! Checking a request walks the matching permissions in order and grants
//! on the first one whose rule evaluates to `true`. A rule that fails to
//! evaluate, or that evaluates to a non-boolean, denies and is reported
//! in the verdict; it never grants.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::context::EvaluationContext;
use crate::error::{DocumentError, MalformedExpression, PermissionError};
use crate::evaluate::{evaluate, evaluate_traced};
use crate::expression::{Expr, Operator, ACCUMULATOR, CURRENT};
use crate::numeric::ArithOp;
use crate::provenance::{codes, EvaluationTrace};
use crate::rule;
use crate::value::Value;

// ──────────────────────────────────────────────
// Documents
// ──────────────────────────────────────────────

/// Action a permission applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllowAction {
    All,
    LinkToAnchor,
    UnlinkFromAnchor,
    ReadState,
}

impl AllowAction {
    /// Whether requests for this action name an anchor.
    pub fn requires_anchor(&self) -> bool {
        matches!(self, AllowAction::LinkToAnchor | AllowAction::UnlinkFromAnchor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allow {
    pub action: AllowAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<String>,
}

impl Allow {
    /// `all` without an anchor allows everything; otherwise action and
    /// anchor must both match.
    pub fn allows(&self, action: AllowAction, anchor: Option<&str>) -> bool {
        if self.action == AllowAction::All && self.anchor.is_none() {
            return true;
        }
        self.action == action && self.anchor.as_deref() == anchor
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregate {
    Sum,
}

/// One path requirement: `{"op": "==", "value": 3}` or `{"op": "==", "var": "other.path"}`.
///
/// The collection operators `all`, `some` and `none` take a nested
/// requirement map as `value`, optionally binding each element under `as`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Requirement {
    pub op: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate: Option<Aggregate>,
    #[serde(default, rename = "as", skip_serializing_if = "Option::is_none")]
    pub binding: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub var: Option<String>,
}

/// A single requirement map, or a list of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Requirements {
    Simple(IndexMap<String, Requirement>),
    List(Vec<IndexMap<String, Requirement>>),
}

impl Requirements {
    fn iter(&self) -> Box<dyn Iterator<Item = (&String, &Requirement)> + '_> {
        match self {
            Requirements::Simple(map) => Box::new(map.iter()),
            Requirements::List(maps) => Box::new(maps.iter().flat_map(|m| m.iter())),
        }
    }
}

/// The stored JSON form of a permission.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PermissionDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allow: Vec<Allow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require: Option<Requirements>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_logic: Option<serde_json::Value>,
}

// ──────────────────────────────────────────────
// Compiled permissions
// ──────────────────────────────────────────────

/// A loaded permission: its allow list and the compiled rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permission {
    pub id: String,
    pub allow: Vec<Allow>,
    /// `None` grants unconditionally.
    pub rule: Option<Expr>,
}

impl Permission {
    /// A permission for every action with the given rule.
    pub fn new(id: impl Into<String>, rule: Option<Expr>) -> Self {
        Permission {
            id: id.into(),
            allow: vec![Allow {
                action: AllowAction::All,
                anchor: None,
            }],
            rule,
        }
    }

    /// Compile a document. `fallback_id` names documents without an `id`.
    pub fn compile(
        doc: &PermissionDocument,
        fallback_id: &str,
        config: &EngineConfig,
    ) -> Result<Permission, DocumentError> {
        let id = doc.id.clone().unwrap_or_else(|| fallback_id.to_string());
        let rule = compile_rule(doc, config).map_err(|source| DocumentError::Rule {
            permission: id.clone(),
            source,
        })?;
        Ok(Permission {
            id,
            allow: doc.allow.clone(),
            rule,
        })
    }

    pub fn from_json(json: &serde_json::Value, config: &EngineConfig) -> Result<Permission, DocumentError> {
        let doc: PermissionDocument = serde_json::from_value(json.clone())
            .map_err(|e| DocumentError::Parse(e.to_string()))?;
        Permission::compile(&doc, "#0", config)
    }

    /// Load a JSON array of permission documents. Documents without an id
    /// are named by position (`#0`, `#1`, ...).
    pub fn list_from_json(
        json: &serde_json::Value,
        config: &EngineConfig,
    ) -> Result<Vec<Permission>, DocumentError> {
        let docs: Vec<PermissionDocument> = serde_json::from_value(json.clone())
            .map_err(|e| DocumentError::Parse(e.to_string()))?;
        docs.iter()
            .enumerate()
            .map(|(i, doc)| Permission::compile(doc, &format!("#{}", i), config))
            .collect()
    }

    /// Whether any allow entry covers the request.
    pub fn allows(&self, action: AllowAction, anchor: Option<&str>) -> bool {
        self.allow.iter().any(|a| a.allows(action, anchor))
    }
}

fn compile_rule(
    doc: &PermissionDocument,
    config: &EngineConfig,
) -> Result<Option<Expr>, MalformedExpression> {
    let mut parts = match &doc.require {
        Some(requirements) => compile_requirements(requirements)?,
        None => Vec::new(),
    };
    if let Some(logic) = &doc.require_logic {
        parts.push(rule::decode(logic, config.max_rule_depth)?);
    }
    Ok(match parts.len() {
        0 => None,
        1 => parts.pop(),
        _ => Some(Expr::And(parts)),
    })
}

fn compile_requirements(requirements: &Requirements) -> Result<Vec<Expr>, MalformedExpression> {
    requirements
        .iter()
        .map(|(path, req)| compile_requirement(path, req))
        .collect()
}

fn compile_requirement(path: &str, req: &Requirement) -> Result<Expr, MalformedExpression> {
    let mut left = var_map(path)?;
    if let Some(Aggregate::Sum) = req.aggregate {
        left = Expr::Reduce {
            collection: Box::new(left),
            body: Box::new(Expr::Arith {
                op: ArithOp::Add,
                operands: vec![Expr::var(ACCUMULATOR), Expr::var(CURRENT)],
            }),
            initial: Box::new(Expr::literal(0)),
        };
    }

    let op = Operator::from_key(&req.op).ok_or_else(|| MalformedExpression::UnsupportedOperator {
        op: req.op.clone(),
    })?;

    if matches!(op, Operator::All | Operator::Some | Operator::None) {
        if req.var.is_some() {
            return Err(MalformedExpression::InvalidOperand {
                op: req.op.clone(),
                message: "nested requirements can't be used with 'var'".to_string(),
            });
        }
        let nested: Requirements = serde_json::from_value(req.value.clone().unwrap_or_default())
            .map_err(|e| MalformedExpression::InvalidOperand {
                op: req.op.clone(),
                message: format!("invalid nested requirements: {}", e),
            })?;
        let body = Expr::And(compile_requirements(&nested)?);
        let operands = match &req.binding {
            Some(name) => vec![left, Expr::literal(name.as_str()), body],
            None => vec![left, body],
        };
        return Expr::build(op, operands);
    }

    let right = match (&req.var, &req.value) {
        (Some(var), _) => var_map(var)?,
        (None, Some(value)) => Expr::Literal(Value::from_json(value)?),
        (None, None) => Expr::Literal(Value::Null),
    };
    Expr::build(op, vec![left, right])
}

fn var_map(path: &str) -> Result<Expr, MalformedExpression> {
    Expr::build(Operator::VarMap, vec![Expr::literal(path)])
}

// ──────────────────────────────────────────────
// Evaluation
// ──────────────────────────────────────────────

/// Evaluate one permission's rule to a decision.
pub fn evaluate_permission(
    permission: &Permission,
    ctx: &EvaluationContext,
) -> Result<bool, PermissionError> {
    match &permission.rule {
        Some(rule) => top_level_bool(evaluate(rule, ctx)?),
        None => Ok(true),
    }
}

/// As [`evaluate_permission`], recording accessed values and failures.
pub fn evaluate_permission_traced(
    permission: &Permission,
    ctx: &EvaluationContext,
    trace: &mut EvaluationTrace,
) -> Result<bool, PermissionError> {
    let Some(rule) = &permission.rule else {
        return Ok(true);
    };
    let result = evaluate_traced(rule, ctx, trace)
        .map_err(PermissionError::from)
        .and_then(top_level_bool);
    // A failed variable read is already logged where it happened.
    if let Err(e) = &result {
        if !trace.has_code(codes::VARIABLE_EVALUATION_FAILED) {
            trace.log(codes::UNKNOWN_EXCEPTION, e.to_string());
        }
    }
    result
}

fn top_level_bool(value: Value) -> Result<bool, PermissionError> {
    match value {
        Value::Bool(b) => Ok(b),
        other => Err(PermissionError::UnsupportedTopLevelResult {
            got: other.type_name().to_string(),
        }),
    }
}

/// How one permission came out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Granted,
    Denied,
    /// The rule could not be evaluated for this request.
    Failed { code: String, reason: String },
    /// The rule evaluated to a non-boolean.
    Misconfigured { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionEvaluation {
    pub permission: String,
    #[serde(flatten)]
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<EvaluationTrace>,
}

/// Result of checking a request against a permission set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub granted: bool,
    /// Permission that granted, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub granted_by: Option<String>,
    pub evaluations: Vec<PermissionEvaluation>,
}

impl Verdict {
    pub fn is_granted(&self) -> bool {
        self.granted
    }

    /// Permissions that failed or were misconfigured.
    pub fn failures(&self) -> impl Iterator<Item = &PermissionEvaluation> {
        self.evaluations
            .iter()
            .filter(|e| matches!(e.outcome, Outcome::Failed { .. } | Outcome::Misconfigured { .. }))
    }
}

/// A request to check: the action and, for link/unlink, the anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessRequest<'a> {
    pub action: AllowAction,
    pub anchor: Option<&'a str>,
    /// Grant a link or unlink when no permission applies to it. Reading
    /// state always needs an applicable permission.
    pub allow_when_no_permissions: bool,
}

impl<'a> AccessRequest<'a> {
    pub fn new(action: AllowAction) -> Self {
        AccessRequest {
            action,
            anchor: None,
            allow_when_no_permissions: false,
        }
    }

    pub fn with_anchor(mut self, anchor: &'a str) -> Self {
        self.anchor = Some(anchor);
        self
    }

    pub fn allow_when_no_permissions(mut self, allow: bool) -> Self {
        self.allow_when_no_permissions = allow;
        self
    }
}

/// Check every permission in order; the first `true` grants.
pub fn authorize(
    permissions: &[Permission],
    ctx: &EvaluationContext,
    config: &EngineConfig,
) -> Verdict {
    let all: Vec<&Permission> = permissions.iter().collect();
    check_in_order(&all, ctx, config)
}

/// Check the permissions that allow the request's action and anchor.
pub fn authorize_request(
    permissions: &[Permission],
    request: AccessRequest<'_>,
    ctx: &EvaluationContext,
    config: &EngineConfig,
) -> Verdict {
    let matching: Vec<&Permission> = permissions
        .iter()
        .filter(|p| p.allows(request.action, request.anchor))
        .collect();
    if matching.is_empty() {
        let granted =
            request.allow_when_no_permissions && request.action != AllowAction::ReadState;
        debug!(
            action = ?request.action,
            anchor = ?request.anchor,
            granted,
            "no permission applies to request"
        );
        return Verdict {
            granted,
            granted_by: None,
            evaluations: Vec::new(),
        };
    }
    check_in_order(&matching, ctx, config)
}

fn check_in_order(
    permissions: &[&Permission],
    ctx: &EvaluationContext,
    config: &EngineConfig,
) -> Verdict {
    let mut evaluations = Vec::with_capacity(permissions.len());
    for permission in permissions {
        let mut trace = config.record_trace.then(EvaluationTrace::new);
        let result = match trace.as_mut() {
            Some(t) => evaluate_permission_traced(permission, ctx, t),
            None => evaluate_permission(permission, ctx),
        };
        let outcome = match result {
            Ok(true) => Outcome::Granted,
            Ok(false) => Outcome::Denied,
            Err(e @ PermissionError::UnsupportedTopLevelResult { .. }) => {
                warn!(permission = %permission.id, error = %e, "permission rule is misconfigured");
                Outcome::Misconfigured {
                    reason: e.to_string(),
                }
            }
            Err(e) => {
                warn!(permission = %permission.id, error = %e, "permission rule failed to evaluate");
                Outcome::Failed {
                    code: e.code().to_string(),
                    reason: e.to_string(),
                }
            }
        };
        debug!(permission = %permission.id, outcome = ?outcome, "permission evaluated");
        let granted = outcome == Outcome::Granted;
        evaluations.push(PermissionEvaluation {
            permission: permission.id.clone(),
            outcome,
            trace,
        });
        if granted {
            return Verdict {
                granted: true,
                granted_by: Some(permission.id.clone()),
                evaluations,
            };
        }
    }
    Verdict {
        granted: false,
        granted_by: None,
        evaluations,
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx(json: serde_json::Value) -> EvaluationContext {
        EvaluationContext::from_json(&json).unwrap()
    }

    fn permission(json: serde_json::Value) -> Permission {
        Permission::from_json(&json, &EngineConfig::default()).unwrap()
    }

    #[test]
    fn allow_matching() {
        let all = Allow {
            action: AllowAction::All,
            anchor: None,
        };
        assert!(all.allows(AllowAction::LinkToAnchor, Some("#files")));
        let link = Allow {
            action: AllowAction::LinkToAnchor,
            anchor: Some("#files".to_string()),
        };
        assert!(link.allows(AllowAction::LinkToAnchor, Some("#files")));
        assert!(!link.allows(AllowAction::LinkToAnchor, Some("#other")));
        assert!(!link.allows(AllowAction::ReadState, None));
        assert!(AllowAction::UnlinkFromAnchor.requires_anchor());
        assert!(!AllowAction::ReadState.requires_anchor());
    }

    #[test]
    fn require_logic_must_be_bool() {
        let p = permission(json!({"id": "p", "require_logic": {"+": [1, 2]}}));
        let err = evaluate_permission(&p, &EvaluationContext::empty()).unwrap_err();
        assert_eq!(
            err,
            PermissionError::UnsupportedTopLevelResult {
                got: "Number".to_string()
            }
        );
    }

    #[test]
    fn empty_permission_grants() {
        let p = permission(json!({"id": "open"}));
        assert!(p.rule.is_none());
        assert!(evaluate_permission(&p, &EvaluationContext::empty()).unwrap());
    }

    #[test]
    fn requirements_compile_to_var_map_comparisons() {
        let p = permission(json!({
            "id": "owner",
            "require": {
                "api.username": {"op": "==", "var": "$node.owner"},
                "$node.credits": {"op": ">=", "value": 2}
            }
        }));
        let data = ctx(json!({"api": {"username": "bob"}, "$node": {"owner": "bob", "credits": 3}}));
        assert!(evaluate_permission(&p, &data).unwrap());
        let data = ctx(json!({"api": {"username": "eve"}, "$node": {"owner": "bob", "credits": 3}}));
        assert!(!evaluate_permission(&p, &data).unwrap());
    }

    #[test]
    fn requirements_and_logic_are_joined() {
        let p = permission(json!({
            "require": {"api.username": {"op": "==", "value": "alice"}},
            "require_logic": {"==": [{"var": "signature.log_code"}, null]}
        }));
        assert!(matches!(p.rule, Some(Expr::And(ref parts)) if parts.len() == 2));
        assert!(evaluate_permission(&p, &ctx(json!({"api": {"username": "alice"}}))).unwrap());
    }

    #[test]
    fn sum_aggregate() {
        let p = permission(json!({
            "require": {"$node.payments.amount": {"op": ">", "value": 10, "aggregate": "sum"}}
        }));
        let data = ctx(json!({"$node": {"payments": [{"amount": 4}, {"amount": 7}]}}));
        assert!(evaluate_permission(&p, &data).unwrap());
    }

    #[test]
    fn nested_collection_requirements() {
        let p = permission(json!({
            "require": {
                "$node.signers": {
                    "op": "all",
                    "as": "signer",
                    "value": {"signer.verified": {"op": "==", "value": true}}
                }
            }
        }));
        let ok = ctx(json!({"$node": {"signers": [{"verified": true}, {"verified": true}]}}));
        let bad = ctx(json!({"$node": {"signers": [{"verified": true}, {"verified": false}]}}));
        assert!(evaluate_permission(&p, &ok).unwrap());
        assert!(!evaluate_permission(&p, &bad).unwrap());
    }

    #[test]
    fn nested_requirement_with_var_rejected() {
        let err = Permission::from_json(
            &json!({"id": "x", "require": {"a": {"op": "some", "var": "b"}}}),
            &EngineConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            DocumentError::Rule {
                source: MalformedExpression::InvalidOperand { .. },
                ..
            }
        ));
    }

    #[test]
    fn unknown_operator_in_rule_names_permission() {
        let err = Permission::from_json(
            &json!({"id": "p1", "require_logic": {"frobnicate": [1]}}),
            &EngineConfig::default(),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "permission 'p1': unsupported operator 'frobnicate'");
    }

    #[test]
    fn first_true_permission_grants() {
        let perms = Permission::list_from_json(
            &json!([
                {"id": "never", "require_logic": false},
                {"id": "alice", "require_logic": {"==": [{"var": "api.username"}, "alice"]}},
                {"id": "unreached", "require_logic": true}
            ]),
            &EngineConfig::default(),
        )
        .unwrap();
        let v = authorize(&perms, &ctx(json!({"api": {"username": "alice"}})), &EngineConfig::default());
        assert!(v.is_granted());
        assert_eq!(v.granted_by.as_deref(), Some("alice"));
        assert_eq!(v.evaluations.len(), 2);
        assert_eq!(v.evaluations[0].outcome, Outcome::Denied);
    }

    #[test]
    fn failures_deny_and_are_reported() {
        let perms = Permission::list_from_json(
            &json!([
                {"require_logic": {"/": [1, 0]}},
                {"require_logic": {"var": "api.username"}}
            ]),
            &EngineConfig::default(),
        )
        .unwrap();
        let v = authorize(&perms, &ctx(json!({"api": {"username": "alice"}})), &EngineConfig::default());
        assert!(!v.is_granted());
        assert_eq!(v.failures().count(), 2);
        assert!(matches!(
            &v.evaluations[0].outcome,
            Outcome::Failed { code, .. } if code == "division_by_zero"
        ));
        assert_eq!(v.evaluations[0].permission, "#0");
        assert!(matches!(v.evaluations[1].outcome, Outcome::Misconfigured { .. }));
        let trace = v.evaluations[0].trace.as_ref().unwrap();
        assert!(trace.has_code(codes::UNKNOWN_EXCEPTION));
        let trace = v.evaluations[1].trace.as_ref().unwrap();
        assert_eq!(trace.log.last().map(|e| e.code.as_str()), Some(codes::UNKNOWN_EXCEPTION));
    }

    #[test]
    fn failed_variable_read_is_not_logged_twice() {
        let perms = Permission::list_from_json(
            &json!([{"require_logic": {"var": "a('b"}}]),
            &EngineConfig::default(),
        )
        .unwrap();
        let v = authorize(&perms, &EvaluationContext::empty(), &EngineConfig::default());
        assert!(!v.is_granted());
        assert!(matches!(
            &v.evaluations[0].outcome,
            Outcome::Failed { code, .. } if code == "invalid_path"
        ));
        let trace = v.evaluations[0].trace.as_ref().unwrap();
        let log: Vec<&str> = trace.log.iter().map(|e| e.code.as_str()).collect();
        assert_eq!(
            log,
            vec![codes::VARIABLE_EVALUATION_STARTED, codes::VARIABLE_EVALUATION_FAILED]
        );
    }

    #[test]
    fn trace_can_be_disabled() {
        let config = EngineConfig {
            record_trace: false,
            ..EngineConfig::default()
        };
        let perms = vec![Permission::new("p", Some(Expr::literal(true)))];
        let v = authorize(&perms, &EvaluationContext::empty(), &config);
        assert!(v.is_granted());
        assert!(v.evaluations[0].trace.is_none());
    }

    #[test]
    fn request_filters_by_allow() {
        let perms = Permission::list_from_json(
            &json!([
                {"id": "read", "allow": [{"action": "read_state"}], "require_logic": true},
                {"id": "link", "allow": [{"action": "link_to_anchor", "anchor": "#docs"}], "require_logic": false}
            ]),
            &EngineConfig::default(),
        )
        .unwrap();
        let config = EngineConfig::default();
        let empty = EvaluationContext::empty();

        let read = authorize_request(&perms, AccessRequest::new(AllowAction::ReadState), &empty, &config);
        assert_eq!(read.granted_by.as_deref(), Some("read"));

        let link = AccessRequest::new(AllowAction::LinkToAnchor).with_anchor("#docs");
        assert!(!authorize_request(&perms, link, &empty, &config).is_granted());

        let unlink = AccessRequest::new(AllowAction::UnlinkFromAnchor).with_anchor("#docs");
        let v = authorize_request(&perms, unlink, &empty, &config);
        assert!(!v.is_granted());
        assert!(v.evaluations.is_empty());
        let v = authorize_request(&perms, unlink.allow_when_no_permissions(true), &empty, &config);
        assert!(v.is_granted());
    }

    #[test]
    fn read_state_without_permissions_is_always_denied() {
        let perms = Permission::list_from_json(
            &json!([{"allow": [{"action": "link_to_anchor", "anchor": "#docs"}], "require_logic": true}]),
            &EngineConfig::default(),
        )
        .unwrap();
        let config = EngineConfig::default();
        let empty = EvaluationContext::empty();
        let read = AccessRequest::new(AllowAction::ReadState).allow_when_no_permissions(true);
        let v = authorize_request(&perms, read, &empty, &config);
        assert!(!v.is_granted());
        assert!(v.evaluations.is_empty());
        assert!(!authorize_request(&[], read, &empty, &config).is_granted());
    }

    #[test]
    fn verdict_serializes_outcomes() {
        let perms = vec![Permission::new("p", Some(Expr::literal(false)))];
        let config = EngineConfig {
            record_trace: false,
            ..EngineConfig::default()
        };
        let v = authorize(&perms, &EvaluationContext::empty(), &config);
        assert_eq!(
            serde_json::to_value(&v).unwrap(),
            json!({"granted": false, "evaluations": [{"permission": "p", "outcome": "denied"}]})
        );
    }
}
