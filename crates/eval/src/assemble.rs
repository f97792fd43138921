//! Request-context assembly from principals and the target entity.
//!
//! Precedence, lowest first:
//! - the entity snapshot, under `EngineConfig::entity_namespace`;
//! - each principal's contribution, in submission order.
//!
//! A later principal overrides an earlier one on scalar conflicts. The
//! entity never overrides an identity claim.

use tracing::debug;

use crate::config::EngineConfig;
use crate::context::EvaluationContext;
use crate::entity::EntityFields;
use crate::error::AssembleError;
use crate::principal::Principal;
use crate::value::Value;

/// Assemble the context for one request.
pub fn assemble_context<'p, I>(
    principals: I,
    entity: Option<&EntityFields>,
    config: &EngineConfig,
) -> Result<EvaluationContext, AssembleError>
where
    I: IntoIterator<Item = &'p dyn Principal>,
{
    assemble_context_with_tree(principals, entity.map(EntityFields::to_value), config)
}

/// Same as [`assemble_context`] with an already-validated entity tree.
pub fn assemble_context_with_tree<'p, I>(
    principals: I,
    entity: Option<Value>,
    config: &EngineConfig,
) -> Result<EvaluationContext, AssembleError>
where
    I: IntoIterator<Item = &'p dyn Principal>,
{
    let mut contributions = Vec::new();
    for principal in principals {
        let (namespace, tree) = principal.derive_context()?;
        debug!(namespace = %namespace, "principal contributed context");
        contributions.push(EvaluationContext::builder().with(namespace, tree)?.build());
    }
    let identity = EvaluationContext::fold(&contributions);

    match entity {
        Some(tree) => {
            let entity_ctx = EvaluationContext::builder()
                .with(config.entity_namespace.clone(), tree)?
                .build();
            Ok(entity_ctx.merge(&identity))
        }
        None => Ok(identity),
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
