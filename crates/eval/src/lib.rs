//! Sigil permission evaluator -- assembles a request context from
//! principals and entity fields, evaluates JSON-shaped permission rules
//! against it, and produces traced verdicts.
//!
//! Rules are decoded once into immutable [`Expr`] trees (see [`rule`])
//! and evaluated per request against an [`EvaluationContext`]. Nothing in
//! this crate performs I/O; principals hand over already-resolved data.

pub mod assemble;
pub mod config;
pub mod context;
pub mod entity;
pub mod error;
pub mod evaluate;
pub mod expression;
pub mod numeric;
pub mod permission;
pub mod principal;
pub mod provenance;
pub mod rule;
pub mod signature;
pub mod template;
pub mod value;

pub use assemble::assemble_context;
pub use config::EngineConfig;
pub use context::{ContextBuilder, EvaluationContext};
pub use entity::{EntityFields, FieldKind, TypedValue};
pub use error::{
    AssembleError, CheckError, ConfigError, ContextError, DocumentError, EvalError, FieldError,
    MalformedExpression, PermissionError, PrincipalError, ValueError,
};
pub use evaluate::{evaluate, evaluate_traced};
pub use expression::{Expr, Operator};
pub use permission::{
    authorize, authorize_request, evaluate_permission, AccessRequest, AllowAction, Outcome,
    Permission, Verdict,
};
pub use principal::{
    ApiPrincipal, ClaimsPrincipal, DocumentSignaturePrincipal, LedgerKeyPrincipal, Principal,
};
pub use provenance::EvaluationTrace;
pub use signature::{SignatureValidation, ValidationLogCode};
pub use value::{Path, Value};

/// Load permission documents, assemble the request context and check the
/// request.
///
/// # Arguments
/// * `permissions` - JSON array of permission documents
/// * `principals` - resolved principals, in submission order
/// * `entity` - the target entity's fields, if any
/// * `request` - action and anchor being checked
pub fn check<'p, I>(
    permissions: &serde_json::Value,
    principals: I,
    entity: Option<&EntityFields>,
    request: AccessRequest<'_>,
    config: &EngineConfig,
) -> Result<Verdict, CheckError>
where
    I: IntoIterator<Item = &'p dyn Principal>,
{
    let permissions = Permission::list_from_json(permissions, config)?;
    let ctx = assemble_context(principals, entity, config)?;
    Ok(authorize_request(&permissions, request, &ctx, config))
}

// ──────────────────────────────────────────────
// Integration tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod integration_tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn owner_may_read_state() {
        let permissions = json!([
            {
                "id": "owner_reads",
                "allow": [{"action": "read_state"}],
                "require": {"api.username": {"op": "==", "var": "$node.owner"}}
            }
        ]);
        let entity = EntityFields::new()
            .with("owner", TypedValue::Identifier("alice".to_string()))
            .unwrap();
        let alice = ApiPrincipal::new("alice");
        let verdict = check(
            &permissions,
            [&alice as &dyn Principal],
            Some(&entity),
            AccessRequest::new(AllowAction::ReadState),
            &EngineConfig::default(),
        )
        .unwrap();
        assert!(verdict.is_granted());
        assert_eq!(verdict.granted_by.as_deref(), Some("owner_reads"));

        let trace = verdict.evaluations[0].trace.as_ref().unwrap();
        let paths: Vec<&str> = trace.accessed_paths().collect();
        assert_eq!(paths, vec!["api.username", "$node.owner"]);
    }

    #[test]
    fn malformed_document_fails_before_assembly() {
        let bad = ApiPrincipal::new("");
        let err = check(
            &json!([{"require_logic": {"nope": []}}]),
            [&bad as &dyn Principal],
            None,
            AccessRequest::new(AllowAction::ReadState),
            &EngineConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CheckError::Document(_)));
    }
}
