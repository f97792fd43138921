//! Resolved document-signature validation outcomes.
//!
//! Cryptographic validation happens upstream. This module only carries the
//! result: a closed log-code vocabulary and the typed attributes a rule may
//! inspect under the `signature` namespace.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::value::{Mapping, Value};

/// Outcome codes surfaced to rules as `signature.log_code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationLogCode {
    Unknown,
    AnchorMaxSizeExceeded,
    SignatureMalformed,
    MissingSubFilter,
    UnsupportedSubFilter,
    InvalidCertificateDn,
    UnsupportedAlgorithm,
    UnsupportedProvider,
    SignerDigestMismatch,
    CertificateNotValid,
    CorruptedPdf,
}

impl ValidationLogCode {
    pub const ALL: [ValidationLogCode; 11] = [
        ValidationLogCode::Unknown,
        ValidationLogCode::AnchorMaxSizeExceeded,
        ValidationLogCode::SignatureMalformed,
        ValidationLogCode::MissingSubFilter,
        ValidationLogCode::UnsupportedSubFilter,
        ValidationLogCode::InvalidCertificateDn,
        ValidationLogCode::UnsupportedAlgorithm,
        ValidationLogCode::UnsupportedProvider,
        ValidationLogCode::SignerDigestMismatch,
        ValidationLogCode::CertificateNotValid,
        ValidationLogCode::CorruptedPdf,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationLogCode::Unknown => "unknown",
            ValidationLogCode::AnchorMaxSizeExceeded => "anchor_max_size_exceeded",
            ValidationLogCode::SignatureMalformed => "signature_malformed",
            ValidationLogCode::MissingSubFilter => "missing_sub_filter",
            ValidationLogCode::UnsupportedSubFilter => "unsupported_sub_filter",
            ValidationLogCode::InvalidCertificateDn => "invalid_certificate_dn",
            ValidationLogCode::UnsupportedAlgorithm => "unsupported_algorithm",
            ValidationLogCode::UnsupportedProvider => "unsupported_provider",
            ValidationLogCode::SignerDigestMismatch => "signer_digest_mismatch",
            ValidationLogCode::CertificateNotValid => "certificate_not_valid",
            ValidationLogCode::CorruptedPdf => "corrupted_pdf",
        }
    }
}

impl fmt::Display for ValidationLogCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValidationLogCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ValidationLogCode::ALL
            .into_iter()
            .find(|code| code.as_str() == s)
            .ok_or_else(|| format!("unknown validation log code '{}'", s))
    }
}

/// Overall conclusion of the upstream validation report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Indication {
    TotalPassed,
    TotalFailed,
    #[default]
    Indeterminate,
}

/// Attributes of the signing certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateInfo {
    pub serial_number: String,
    #[serde(default)]
    pub issuer: BTreeMap<String, String>,
    #[serde(default)]
    pub subject: BTreeMap<String, String>,
    #[serde(default)]
    pub self_signed: bool,
    #[serde(default)]
    pub self_issued: bool,
    #[serde(with = "crate::value::rfc3339")]
    pub not_valid_before: OffsetDateTime,
    #[serde(with = "crate::value::rfc3339")]
    pub not_valid_after: OffsetDateTime,
    /// Validity at the moment the upstream validator ran.
    #[serde(default)]
    pub valid_now: bool,
}

impl CertificateInfo {
    pub fn is_valid_at(&self, at: OffsetDateTime) -> bool {
        self.not_valid_before <= at && at <= self.not_valid_after
    }

    fn to_value(&self, sign_date: Option<OffsetDateTime>) -> Value {
        let rdns = |names: &BTreeMap<String, String>| {
            Value::mapping(names.iter().map(|(k, v)| (k.clone(), Value::from(v.as_str()))))
        };
        Value::mapping([
            ("serial_number", Value::from(self.serial_number.as_str())),
            ("issuer", rdns(&self.issuer)),
            ("subject", rdns(&self.subject)),
            ("self_signed", Value::Bool(self.self_signed)),
            ("self_issued", Value::Bool(self.self_issued)),
            ("not_valid_before", Value::Timestamp(self.not_valid_before)),
            ("not_valid_after", Value::Timestamp(self.not_valid_after)),
            ("valid_now", Value::Bool(self.valid_now)),
            (
                "valid_at_sign_time",
                Value::from(sign_date.map(|at| self.is_valid_at(at))),
            ),
        ])
    }
}

/// The validated signature as seen by permission rules.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SignatureValidation {
    pub log_code: Option<ValidationLogCode>,
    pub indication: Indication,
    pub signature_algorithm: Option<String>,
    pub encryption_algorithm: Option<String>,
    pub digest_algorithm: Option<String>,
    pub mask_generation_function: Option<String>,
    #[serde(with = "crate::value::rfc3339::option")]
    pub sign_date: Option<OffsetDateTime>,
    pub signature_qualification: Option<String>,
    pub qualified: bool,
    pub covers_whole_document: bool,
    pub signing_reason: Option<String>,
    pub signing_location: Option<String>,
    pub signer_name: Option<String>,
    pub contact_info: Option<String>,
    pub filter: Option<String>,
    pub sub_filter: Option<String>,
    pub certificate: Option<CertificateInfo>,
}

impl SignatureValidation {
    /// A signature the upstream validator refused to process.
    pub fn rejected(code: ValidationLogCode) -> Self {
        SignatureValidation {
            log_code: Some(code),
            indication: Indication::TotalFailed,
            ..SignatureValidation::default()
        }
    }

    pub fn passed(&self) -> bool {
        self.indication == Indication::TotalPassed
    }

    pub fn failed(&self) -> bool {
        self.indication == Indication::TotalFailed
    }

    pub fn has_not_failed(&self) -> bool {
        !self.failed()
    }

    /// Qualification only counts for a signature that passed validation.
    pub fn is_qualified(&self) -> bool {
        self.passed() && self.qualified
    }

    /// Render the tree placed under the `signature` namespace.
    pub fn to_value(&self) -> Value {
        let text = |s: &Option<String>| Value::from(s.as_deref());
        let mut map = Mapping::new();
        map.insert(
            "log_code".to_string(),
            Value::from(self.log_code.map(|c| c.as_str())),
        );
        map.insert("signature_algorithm".to_string(), text(&self.signature_algorithm));
        map.insert("encryption_algorithm".to_string(), text(&self.encryption_algorithm));
        map.insert("digest_algorithm".to_string(), text(&self.digest_algorithm));
        map.insert(
            "mask_generation_function".to_string(),
            text(&self.mask_generation_function),
        );
        map.insert("sign_date".to_string(), Value::from(self.sign_date));
        map.insert("validation_passed".to_string(), Value::Bool(self.passed()));
        map.insert("validation_failed".to_string(), Value::Bool(self.failed()));
        map.insert(
            "signature_qualification".to_string(),
            text(&self.signature_qualification),
        );
        map.insert("is_qualified".to_string(), Value::Bool(self.is_qualified()));
        map.insert(
            "covers_whole_document".to_string(),
            Value::Bool(self.covers_whole_document),
        );
        map.insert("signing_reason".to_string(), text(&self.signing_reason));
        map.insert("signing_location".to_string(), text(&self.signing_location));
        map.insert("signer_name".to_string(), text(&self.signer_name));
        map.insert("contact_info".to_string(), text(&self.contact_info));
        map.insert("filter".to_string(), text(&self.filter));
        map.insert("sub_filter".to_string(), text(&self.sub_filter));
        map.insert(
            "certificate".to_string(),
            self.certificate
                .as_ref()
                .map(|c| c.to_value(self.sign_date))
                .unwrap_or(Value::Null),
        );
        Value::Mapping(map)
    }
}
