//! End-to-end authorization scenarios.
//!
//! Each test resolves principals, assembles the request context and
//! evaluates a stored rule, the same path a request takes in production.
//! Rules are written as JSON fixtures.

use serde_json::json;
use sigil_eval::permission::{authorize, Outcome};
use sigil_eval::{
    assemble_context, evaluate, ApiPrincipal, ClaimsPrincipal, DocumentSignaturePrincipal,
    EngineConfig, EntityFields, EvalError, EvaluationContext, Expr, Permission, Principal,
    SignatureValidation, ValidationLogCode, Value,
};

// ──────────────────────────────────────────────
// Test helpers
// ──────────────────────────────────────────────

fn rule(json: serde_json::Value) -> Expr {
    Expr::from_json(&json).expect("rule should decode")
}

fn context_for(principals: &[&dyn Principal]) -> EvaluationContext {
    assemble_context(principals.iter().copied(), None, &EngineConfig::default())
        .expect("context should assemble")
}

// ──────────────────────────────────────────────
// A. API credential
// ──────────────────────────────────────────────

#[test]
fn a_api_username_matches() {
    let alice = ApiPrincipal::new("alice");
    let ctx = context_for(&[&alice]);
    let expr = rule(json!({"==": [{"var": "api.username"}, "alice"]}));
    assert_eq!(evaluate(&expr, &ctx).unwrap(), Value::Bool(true));
}

#[test]
fn a_api_username_differs() {
    let bob = ApiPrincipal::new("bob");
    let ctx = context_for(&[&bob]);
    let expr = rule(json!({"==": [{"var": "api.username"}, "alice"]}));
    assert_eq!(evaluate(&expr, &ctx).unwrap(), Value::Bool(false));
}

// ──────────────────────────────────────────────
// B. Document signature outcome
// ──────────────────────────────────────────────

#[test]
fn b_signature_log_code_matches() {
    let sig = DocumentSignaturePrincipal::new(SignatureValidation::rejected(
        ValidationLogCode::CertificateNotValid,
    ));
    let ctx = context_for(&[&sig]);
    let expr = rule(json!({"==": [{"var": "signature.log_code"}, "certificate_not_valid"]}));
    assert_eq!(evaluate(&expr, &ctx).unwrap(), Value::Bool(true));
}

#[test]
fn b_signature_log_code_differs() {
    let sig = DocumentSignaturePrincipal::new(SignatureValidation::rejected(
        ValidationLogCode::CorruptedPdf,
    ));
    let ctx = context_for(&[&sig]);
    let expr = rule(json!({"==": [{"var": "signature.log_code"}, "certificate_not_valid"]}));
    assert_eq!(evaluate(&expr, &ctx).unwrap(), Value::Bool(false));
}

// ──────────────────────────────────────────────
// C. Modulo
// ──────────────────────────────────────────────

#[test]
fn c_modulo() {
    let ctx = EvaluationContext::empty();
    assert_eq!(
        evaluate(&rule(json!({"%": [7, 3]})), &ctx).unwrap(),
        Value::from(1)
    );
}

#[test]
fn c_modulo_by_zero() {
    let ctx = EvaluationContext::empty();
    let err = evaluate(&rule(json!({"%": [7, 0]})), &ctx).unwrap_err();
    assert!(matches!(err, EvalError::DivisionByZero { .. }));
}

// ──────────────────────────────────────────────
// D. Missing variables
// ──────────────────────────────────────────────

#[test]
fn d_missing_path_is_falsy() {
    let alice = ApiPrincipal::new("alice");
    let ctx = context_for(&[&alice]);
    let expr = rule(json!({"and": [{"var": "missing.path"}, true]}));
    assert_eq!(evaluate(&expr, &ctx).unwrap(), Value::Bool(false));
}

// ──────────────────────────────────────────────
// Composite requests
// ──────────────────────────────────────────────

#[test]
fn api_and_signature_together() {
    let alice = ApiPrincipal::new("alice");
    let sig = DocumentSignaturePrincipal::new(SignatureValidation::rejected(
        ValidationLogCode::SignerDigestMismatch,
    ));
    let ctx = context_for(&[&alice, &sig]);
    let expr = rule(json!({"or": [
        {"==": [{"var": "signature.log_code"}, null]},
        {"==": [{"var": "api.username"}, "alice"]}
    ]}));
    assert_eq!(evaluate(&expr, &ctx).unwrap(), Value::Bool(true));
}

#[test]
fn entity_fields_feed_rules() {
    let config = EngineConfig::default();
    let entity = EntityFields::from_json(
        &json!({
            "owner": {"kind": "identifier", "value": "alice"},
            "credits": {"kind": "credits", "value": 5},
            "expires": {"kind": "timestamp", "value": "2030-01-01T00:00:00Z"}
        }),
        &config,
    )
    .unwrap();
    let alice = ApiPrincipal::new("alice");
    let ctx = assemble_context([&alice as &dyn Principal], Some(&entity), &config).unwrap();

    let expr = rule(json!({"and": [
        {"==": [{"var": "$node.owner"}, {"var": "api.username"}]},
        {">=": [{"var": "$node.credits"}, 1]},
        {"after": [{"var": "$node.expires"}, "2026-01-01T00:00:00Z"]}
    ]}));
    assert_eq!(evaluate(&expr, &ctx).unwrap(), Value::Bool(true));
}

#[test]
fn team_claims_authorize_through_permission_set() {
    let config = EngineConfig::default();
    let alice = ApiPrincipal::new("alice");
    let team = ClaimsPrincipal::new(
        "team",
        Value::from_json(&json!({"roles": ["reader", "editor"]})).unwrap(),
    );
    let ctx = assemble_context([&alice as &dyn Principal, &team], None, &config).unwrap();

    let permissions = Permission::list_from_json(
        &json!([
            {"id": "admins", "require_logic": {"contains": [{"var": "team.roles"}, "admin"]}},
            {"id": "editors", "require_logic": {"contains_any_of": [{"var": "team.roles"}, ["editor", "owner"]]}}
        ]),
        &config,
    )
    .unwrap();
    let verdict = authorize(&permissions, &ctx, &config);
    assert!(verdict.is_granted());
    assert_eq!(verdict.granted_by.as_deref(), Some("editors"));
    assert_eq!(verdict.evaluations[0].outcome, Outcome::Denied);
}

#[test]
fn cross_kind_comparison_denies_with_reason() {
    let config = EngineConfig::default();
    let ctx = EvaluationContext::from_json(&json!({"$node": {"credits": "5"}})).unwrap();
    let permissions = vec![Permission::new(
        "credits",
        Some(rule(json!({">": [{"var": "$node.credits"}, 1]}))),
    )];
    let verdict = authorize(&permissions, &ctx, &config);
    assert!(!verdict.is_granted());
    assert!(matches!(
        &verdict.evaluations[0].outcome,
        Outcome::Failed { code, .. } if code == "type_mismatch"
    ));
}
