//! The Action contract.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::registry::Variant;

/// How urgently a locally applied Action should reach the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemotePriority {
    /// Apply locally, never send.
    Local,
    /// Send with the next flush, no hurry.
    Whenever,
    /// Send with the next flush.
    Soon,
    /// Apply locally and send right away.
    Asap,
    /// Do not apply locally; send right away and report the remote outcome.
    /// Never queued for retry.
    Remote,
}

impl RemotePriority {
    /// Whether the Action is applied to the local Space.
    pub fn applies_locally(self) -> bool {
        !matches!(self, RemotePriority::Remote)
    }

    /// Whether the Action waits in the outbox for a flush.
    pub fn is_queued(self) -> bool {
        matches!(self, RemotePriority::Whenever | RemotePriority::Soon)
    }

    /// Whether the Action goes to the remote at all.
    pub fn is_sent(self) -> bool {
        !matches!(self, RemotePriority::Local)
    }
}

/// What kind of session an Action needs at the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthRequirement {
    NoAuth,
    Guest,
    #[default]
    User,
    UserOptional,
}

/// Causal and analytics context attached to an Action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionContext {
    /// Identifier of the Action (or UI event) that caused this one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    /// Free-form analytics attributes.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub analytics: IndexMap<String, String>,
}

impl ActionContext {
    pub fn caused_by(cause: impl Into<String>) -> Self {
        Self {
            cause: Some(cause.into()),
            analytics: IndexMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.analytics.insert(key.into(), value.into());
        self
    }
}

/// An immutable request to change state.
pub trait Action: Variant + Clone + fmt::Debug + Send + Sync + 'static {
    /// The action name. Defaults to the variant tag.
    fn name(&self) -> &'static str {
        self.variant()
    }

    /// When the Action happened, in milliseconds since the Unix epoch.
    fn time(&self) -> i64;

    fn context(&self) -> Option<&ActionContext> {
        None
    }

    fn auth(&self) -> AuthRequirement {
        AuthRequirement::default()
    }

    /// The default urgency for sending to the remote.
    fn priority(&self) -> RemotePriority;

    /// Whether the payload carries credentials (passwords, tokens).
    ///
    /// Credential-bearing Actions are never held in a retry queue.
    fn has_credentials(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_classes() {
        assert!(RemotePriority::Local.applies_locally());
        assert!(!RemotePriority::Local.is_sent());
        assert!(RemotePriority::Soon.is_queued());
        assert!(RemotePriority::Whenever.is_queued());
        assert!(!RemotePriority::Asap.is_queued());
        assert!(!RemotePriority::Remote.applies_locally());
        assert!(!RemotePriority::Remote.is_queued());
    }

    #[test]
    fn context_serializes_compactly() {
        let context = ActionContext::caused_by("tap").with_attribute("screen", "home");
        let json = serde_json::to_value(&context).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"cause": "tap", "analytics": {"screen": "home"}})
        );
        let empty = serde_json::to_value(ActionContext::default()).unwrap();
        assert_eq!(empty, serde_json::json!({}));
    }
}
