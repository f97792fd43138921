//! Principal files: a JSON array of resolved principals.
//!
//! ```json
//! [
//!   {"kind": "api", "username": "alice"},
//!   {"kind": "signature", "log_code": "certificate_not_valid", "indication": "total_failed"},
//!   {"kind": "key", "id": "k1", "algorithm": "ed25519", "fingerprint": "ab:cd"},
//!   {"kind": "claims", "namespace": "team", "claims": {"roles": ["editor"]}}
//! ]
//! ```

use serde::Deserialize;
use sigil_eval::{
    ApiPrincipal, ClaimsPrincipal, DocumentSignaturePrincipal, LedgerKeyPrincipal, Principal,
    SignatureValidation, Value,
};

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum PrincipalSpec {
    Api {
        username: String,
    },
    Signature(SignatureValidation),
    Key {
        id: String,
        algorithm: String,
        fingerprint: String,
    },
    Claims {
        namespace: String,
        claims: Value,
    },
}

impl PrincipalSpec {
    pub(crate) fn into_principal(self) -> Box<dyn Principal> {
        match self {
            PrincipalSpec::Api { username } => Box::new(ApiPrincipal::new(username)),
            PrincipalSpec::Signature(validation) => {
                Box::new(DocumentSignaturePrincipal::new(validation))
            }
            PrincipalSpec::Key {
                id,
                algorithm,
                fingerprint,
            } => Box::new(LedgerKeyPrincipal {
                key_id: id,
                algorithm,
                fingerprint,
            }),
            PrincipalSpec::Claims { namespace, claims } => {
                Box::new(ClaimsPrincipal::new(namespace, claims))
            }
        }
    }
}

/// Parse a principal file into principals, in file order.
pub(crate) fn parse_principals(json: serde_json::Value) -> Result<Vec<Box<dyn Principal>>, String> {
    let specs: Vec<PrincipalSpec> = serde_json::from_value(json).map_err(|e| e.to_string())?;
    Ok(specs.into_iter().map(PrincipalSpec::into_principal).collect())
}
