//! JSON interchange configuration.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Placeholder written in place of sensitive field values.
pub const REDACTED: &str = "[redacted]";

/// Governs how Things and Actions map to and from JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonConfig {
    /// Alternate type/action names accepted on input, mapped to the
    /// canonical name.
    pub aliases: HashMap<String, String>,
    /// Replace sensitive field values on output.
    pub redact_sensitive: bool,
}

impl JsonConfig {
    /// A config that redacts sensitive fields, for logging and diagnostics.
    pub fn redacting() -> Self {
        Self {
            redact_sensitive: true,
            ..Self::default()
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>, canonical: impl Into<String>) -> Self {
        self.aliases.insert(alias.into(), canonical.into());
        self
    }

    /// The canonical name for `name`.
    pub fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map(String::as_str).unwrap_or(name)
    }

    /// Output form of a sensitive value.
    pub fn sensitive(&self, value: Value) -> Value {
        if self.redact_sensitive {
            Value::String(REDACTED.to_owned())
        } else {
            value
        }
    }
}
