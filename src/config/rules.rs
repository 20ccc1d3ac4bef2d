//! Rule Table Configuration
//!
//! Configuration structures for the topic-mapping and transform tables.

use serde::Deserialize;
use serde_json::Value;
use tracing::error;

use crate::rewrite::sanitize;

/// Topic rewriter section
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TopicRewriterConfig {
    /// Topic mapping rules, in priority order
    #[serde(rename = "topic")]
    pub mappings: Vec<TopicMapping>,
}

/// Topic mapping rule
///
/// With a `pattern`, matching topics have `local_prefix/` stripped and
/// `remote_prefix/` prepended. Without one, matching topics are replaced
/// wholesale by `remote_prefix`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TopicMapping {
    /// Prefix the local topics carry
    #[serde(default, alias = "local")]
    pub local_prefix: Option<String>,

    /// Pattern below the local prefix (supports + and #)
    #[serde(default)]
    pub pattern: Option<String>,

    /// Prefix to publish under remotely
    #[serde(default, alias = "remote")]
    pub remote_prefix: Option<String>,
}

impl TopicMapping {
    /// Non-empty local prefix
    pub fn local_prefix(&self) -> Option<&str> {
        non_empty(&self.local_prefix)
    }

    /// Non-empty pattern
    pub fn pattern(&self) -> Option<&str> {
        non_empty(&self.pattern)
    }

    /// Non-empty remote prefix
    pub fn remote_prefix(&self) -> Option<&str> {
        non_empty(&self.remote_prefix)
    }

    /// Whether matching topics are replaced by the remote prefix
    pub fn is_replace_mode(&self) -> bool {
        self.pattern().is_none()
    }

    /// Full pattern this mapping is registered under
    ///
    /// `local_prefix/pattern` (prefix sanitized) when both are set, otherwise
    /// whichever one is set.
    pub fn resolved_pattern(&self) -> Option<String> {
        match (self.local_prefix(), self.pattern()) {
            (Some(prefix), Some(pattern)) => Some(format!("{}/{}", sanitize(prefix), pattern)),
            (Some(prefix), None) => Some(prefix.to_string()),
            (None, Some(pattern)) => Some(pattern.to_string()),
            (None, None) => None,
        }
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}

/// Message rewriter section
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MessageRewriterConfig {
    /// Transform entries, in priority order
    #[serde(rename = "entry")]
    pub entries: Vec<TransformEntryConfig>,
}

/// Payload transform entry
#[derive(Debug, Clone, Deserialize)]
pub struct TransformEntryConfig {
    /// Topic pattern selecting the messages this entry applies to
    pub topic: String,

    /// Start from a copy of the message (true) or from an empty object
    #[serde(default = "default_true")]
    pub append: bool,

    /// Transform spec as an inline table
    #[serde(default)]
    pub spec: Option<Value>,

    /// Transform spec as a JSON string
    #[serde(default)]
    pub spec_json: Option<String>,
}

fn default_true() -> bool {
    true
}

impl TransformEntryConfig {
    /// Whether both `spec` and `spec_json` are given
    pub fn has_conflicting_spec(&self) -> bool {
        self.spec.is_some() && self.spec_json.is_some()
    }

    /// Resolve the spec object, parsing `spec_json` if that is the form given
    ///
    /// An entry without a spec resolves to an empty object, and so does a
    /// `spec_json` that fails to parse: the entry then leaves payloads as
    /// they are.
    pub fn resolve_spec(&self) -> Value {
        if let Some(spec) = &self.spec {
            return spec.clone();
        }

        match &self.spec_json {
            Some(raw) => serde_json::from_str(raw).unwrap_or_else(|e| {
                error!(
                    "Transform entry '{}' has invalid spec_json, using an empty spec: {}",
                    self.topic, e
                );
                Value::Object(serde_json::Map::new())
            }),
            None => Value::Object(serde_json::Map::new()),
        }
    }
}
