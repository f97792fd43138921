//! Identity sources that contribute a namespace to the evaluation context.
//!
//! A principal turns whatever the caller resolved about the requester (an
//! API credential, a verified signature, a ledger key) into exactly one
//! namespaced value tree. Adding a new kind of principal means adding an
//! implementation here; neither the context nor the evaluator changes.

use crate::error::PrincipalError;
use crate::signature::SignatureValidation;
use crate::value::Value;

/// Capability to derive a context contribution.
///
/// Implementations are pure: no I/O, no clock reads.
pub trait Principal: Send + Sync {
    /// The namespace and sub-tree this principal contributes.
    fn derive_context(&self) -> Result<(String, Value), PrincipalError>;
}

/// A caller authenticated with an API credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiPrincipal {
    pub username: String,
}

impl ApiPrincipal {
    pub fn new(username: impl Into<String>) -> Self {
        ApiPrincipal {
            username: username.into(),
        }
    }
}

impl Principal for ApiPrincipal {
    fn derive_context(&self) -> Result<(String, Value), PrincipalError> {
        if self.username.is_empty() {
            return Err(PrincipalError::MissingClaim {
                kind: "api",
                claim: "username".to_string(),
            });
        }
        Ok((
            "api".to_string(),
            Value::mapping([("username", Value::from(self.username.as_str()))]),
        ))
    }
}

/// A caller identified by a signature on the submitted document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSignaturePrincipal {
    pub validation: SignatureValidation,
}

impl DocumentSignaturePrincipal {
    pub fn new(validation: SignatureValidation) -> Self {
        DocumentSignaturePrincipal { validation }
    }
}

impl Principal for DocumentSignaturePrincipal {
    fn derive_context(&self) -> Result<(String, Value), PrincipalError> {
        Ok(("signature".to_string(), self.validation.to_value()))
    }
}

/// A caller holding a registered ledger key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerKeyPrincipal {
    pub key_id: String,
    pub algorithm: String,
    pub fingerprint: String,
}

impl Principal for LedgerKeyPrincipal {
    fn derive_context(&self) -> Result<(String, Value), PrincipalError> {
        for (claim, value) in [
            ("id", &self.key_id),
            ("algorithm", &self.algorithm),
            ("fingerprint", &self.fingerprint),
        ] {
            if value.is_empty() {
                return Err(PrincipalError::MissingClaim {
                    kind: "key",
                    claim: claim.to_string(),
                });
            }
        }
        Ok((
            "key".to_string(),
            Value::mapping([
                ("id", Value::from(self.key_id.as_str())),
                ("algorithm", Value::from(self.algorithm.as_str())),
                ("fingerprint", Value::from(self.fingerprint.as_str())),
            ]),
        ))
    }
}

/// Arbitrary authorization claims placed under a caller-chosen namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimsPrincipal {
    pub namespace: String,
    pub claims: Value,
}

impl ClaimsPrincipal {
    pub fn new(namespace: impl Into<String>, claims: Value) -> Self {
        ClaimsPrincipal {
            namespace: namespace.into(),
            claims,
        }
    }
}

impl Principal for ClaimsPrincipal {
    fn derive_context(&self) -> Result<(String, Value), PrincipalError> {
        if self.namespace.is_empty() {
            return Err(PrincipalError::Invalid {
                kind: "claims",
                message: "namespace must not be empty".to_string(),
            });
        }
        match &self.claims {
            Value::Mapping(_) => Ok((self.namespace.clone(), self.claims.clone())),
            other => Err(PrincipalError::Invalid {
                kind: "claims",
                message: format!("claims must be a Mapping, got {}", other.type_name()),
            }),
        }
    }
}
