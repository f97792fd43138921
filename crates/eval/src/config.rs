//! Engine configuration.
//!
//! The engine never reads the environment on its own. Callers build an
//! `EngineConfig` (from defaults, a TOML document, or environment overrides
//! they pass in explicitly) and hand it to whatever needs it.
//!
//! ```toml
//! max_rule_depth = 32
//! identifier_max_length = 128
//! text_max_length = 4096
//! entity_namespace = "$node"
//! record_trace = false
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_MAX_RULE_DEPTH: usize = 64;
pub const DEFAULT_IDENTIFIER_MAX_LENGTH: usize = 256;
pub const DEFAULT_ENTITY_NAMESPACE: &str = "$node";

/// Prefix of the environment variables recognized by
/// [`EngineConfig::with_env_overrides`].
pub const ENV_PREFIX: &str = "SIGIL_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Deepest operator nesting a rule may have.
    pub max_rule_depth: usize,
    /// Maximum length of identifier entity fields, in characters.
    pub identifier_max_length: usize,
    /// Maximum length of text entity fields; unbounded when absent.
    pub text_max_length: Option<usize>,
    /// Namespace the entity snapshot is placed under.
    pub entity_namespace: String,
    /// Whether callers should collect evaluation traces.
    pub record_trace: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_rule_depth: DEFAULT_MAX_RULE_DEPTH,
            identifier_max_length: DEFAULT_IDENTIFIER_MAX_LENGTH,
            text_max_length: None,
            entity_namespace: DEFAULT_ENTITY_NAMESPACE.to_string(),
            record_trace: true,
        }
    }
}

impl EngineConfig {
    /// Parse a TOML document; absent keys keep their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `SIGIL_*` overrides from the given variables.
    ///
    /// Callers pass `std::env::vars()` in production and a literal list in
    /// tests. Unrelated variables are ignored.
    pub fn with_env_overrides<I, K, V>(mut self, vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let (key, value) = (key.as_ref(), value.as_ref());
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match name {
                "MAX_RULE_DEPTH" => self.max_rule_depth = parse_env(key, value)?,
                "IDENTIFIER_MAX_LENGTH" => self.identifier_max_length = parse_env(key, value)?,
                "TEXT_MAX_LENGTH" => {
                    self.text_max_length = if value.is_empty() {
                        None
                    } else {
                        Some(parse_env(key, value)?)
                    }
                }
                "ENTITY_NAMESPACE" => self.entity_namespace = value.to_string(),
                "RECORD_TRACE" => self.record_trace = parse_env(key, value)?,
                _ => {}
            }
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_rule_depth == 0 {
            return Err(ConfigError::Zero {
                field: "max_rule_depth",
            });
        }
        if self.identifier_max_length == 0 {
            return Err(ConfigError::Zero {
                field: "identifier_max_length",
            });
        }
        if self.text_max_length == Some(0) {
            return Err(ConfigError::Zero {
                field: "text_max_length",
            });
        }
        if self.entity_namespace.is_empty() {
            return Err(ConfigError::Parse(
                "entity_namespace must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(var: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        var: var.to_string(),
        value: value.to_string(),
    })
}
