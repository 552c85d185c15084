// ABOUTME: Secret configuration values: literals or references to environment variables.
// ABOUTME: Resolved at connect time so config files need not carry plaintext credentials.

use crate::error::{Error, Result};
use serde::Deserialize;

#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Secret {
    Literal(String),
    FromEnv {
        #[serde(rename = "env")]
        var: String,
        #[serde(default)]
        default: Option<String>,
    },
}

impl Secret {
    /// Resolve to the secret text. A referenced variable that is unset and has
    /// no default is an error, as is a value that resolves to an empty string.
    pub fn resolve(&self, field: &str) -> Result<String> {
        let value = match self {
            Secret::Literal(s) => s.clone(),
            Secret::FromEnv { var, default } => match std::env::var(var) {
                Ok(val) => val,
                Err(_) => default
                    .clone()
                    .ok_or_else(|| Error::MissingEnvVar(var.clone()))?,
            },
        };

        if value.is_empty() {
            return Err(Error::InvalidConfig(format!("{field} resolves to an empty value")));
        }
        Ok(value)
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Secret::Literal(_) => f.write_str("Literal(<redacted>)"),
            Secret::FromEnv { var, .. } => f.debug_struct("FromEnv").field("var", var).finish(),
        }
    }
}
