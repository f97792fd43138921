//! Shared expressions and contexts across threads.

use std::sync::Arc;
use std::thread;

use serde_json::json;
use sigil_eval::{
    assemble_context, evaluate, ApiPrincipal, EngineConfig, EvaluationContext, Expr, Principal,
    Value,
};

#[test]
fn one_expression_many_requests() {
    let expr = Arc::new(
        Expr::from_json(&json!({"and": [
            {"==": [{"%": [{"var": "req.n"}, 2]}, 0]},
            {"in": [{"var": "api.username"}, ["alice", "bob"]]}
        ]}))
        .unwrap(),
    );

    let handles: Vec<_> = (0..8i64)
        .map(|n| {
            let expr = Arc::clone(&expr);
            thread::spawn(move || {
                let user = if n % 4 == 0 { "alice" } else { "mallory" };
                let api = ApiPrincipal::new(user);
                let identity =
                    assemble_context([&api as &dyn Principal], None, &EngineConfig::default())
                        .unwrap();
                let req = EvaluationContext::from_json(&json!({"req": {"n": n}})).unwrap();
                let ctx = identity.merge(&req);
                (n, evaluate(&expr, &ctx).unwrap())
            })
        })
        .collect();

    for handle in handles {
        let (n, result) = handle.join().unwrap();
        assert_eq!(result, Value::Bool(n % 4 == 0), "request {}", n);
    }
}

#[test]
fn shared_context_gives_same_answer_everywhere() {
    let ctx = Arc::new(
        EvaluationContext::from_json(&json!({"signature": {"log_code": "corrupted_pdf"}})).unwrap(),
    );
    let expr = Arc::new(
        Expr::from_json(&json!({"==": [{"var": "signature.log_code"}, "corrupted_pdf"]})).unwrap(),
    );
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let ctx = Arc::clone(&ctx);
            let expr = Arc::clone(&expr);
            thread::spawn(move || evaluate(&expr, &ctx).unwrap())
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), Value::Bool(true));
    }
}
