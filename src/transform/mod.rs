//! Payload Transformation
//!
//! Rewrites the JSON payload of messages according to declarative specs
//! selected by topic pattern.
//!
//! A spec is a nested JSON object whose leaves are strings. Each leaf's flat
//! path is the destination in the output, and the leaf itself says what to
//! put there (see [`LeafSpec`]):
//!
//! ```json
//! {"temp_c": "readings.temp", "unit": "#C", "active": "=true"}
//! ```
//!
//! In append mode the output starts as a copy of the message and a value
//! moved by a query is removed from its original location. In replace mode
//! the output starts empty.
//!
//! # Example Configuration
//!
//! ```toml
//! [[json_message_rewriter.entry]]
//! topic = "machine/+/temp"
//! append = false
//! spec_json = '{"temp_c": "readings.temp", "unit": "#C"}'
//! ```

mod flat;
mod leaf;
mod query;


pub use flat::{flatten, unflatten, FlatMap};
pub use leaf::LeafSpec;
pub use query::{Query, QueryError, QueryMatch};

use std::fmt;

use serde_json::Value;
use tracing::{debug, error, warn};

use crate::config::{ConfigError, MessageRewriterConfig};
use crate::envelope::Envelope;
use crate::pipeline::{Outcome, Stage};
use crate::topic::{RuleId, TopicTrie};

/// Transform error types
#[derive(Debug, Clone)]
pub enum TransformError {
    /// The spec is not a JSON object
    SpecNotObject,
    /// A spec leaf is not a string
    SpecLeafNotString { path: String },
    /// A spec leaf is an empty string
    EmptyLeaf { path: String },
    /// A query leaf failed to parse
    Query { path: String, source: QueryError },
    /// The message payload is not a JSON object
    MessageNotObject,
    /// Two output paths disagree on whether a key is an object
    PathConflict { path: String },
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformError::SpecNotObject => write!(f, "spec must be a JSON object"),
            TransformError::SpecLeafNotString { path } => {
                write!(f, "spec leaf '{}' must be a string", path)
            }
            TransformError::EmptyLeaf { path } => write!(f, "spec leaf '{}' is empty", path),
            TransformError::Query { path, source } => {
                write!(f, "spec leaf '{}': {}", path, source)
            }
            TransformError::MessageNotObject => write!(f, "payload is not a JSON object"),
            TransformError::PathConflict { path } => {
                write!(f, "cannot place '{}': a parent key holds a non-object value", path)
            }
        }
    }
}

impl std::error::Error for TransformError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransformError::Query { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// A compiled transform spec: flattened, classified leaves in spec order
#[derive(Debug, Clone, PartialEq)]
pub struct TransformSpec {
    leaves: Vec<(String, LeafSpec)>,
}

impl TransformSpec {
    /// Flatten and classify a spec object, parsing every query once
    pub fn compile(spec: &Value) -> Result<Self, TransformError> {
        let Value::Object(object) = spec else {
            return Err(TransformError::SpecNotObject);
        };

        let mut leaves = Vec::new();
        for (path, raw) in flatten(object) {
            let raw = match raw {
                Value::String(raw) => raw,
                // an empty branch contributes no leaves
                Value::Object(ref map) if map.is_empty() => continue,
                _ => return Err(TransformError::SpecLeafNotString { path }),
            };

            if raw.is_empty() {
                return Err(TransformError::EmptyLeaf { path });
            }

            let leaf = LeafSpec::parse(&raw).map_err(|source| TransformError::Query {
                path: path.clone(),
                source,
            })?;
            leaves.push((path, leaf));
        }

        Ok(Self { leaves })
    }

    pub fn leaves(&self) -> &[(String, LeafSpec)] {
        &self.leaves
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Apply the spec to a message
    ///
    /// Queries always read the original message, never the partially built
    /// output. A query without matches leaves its destination untouched.
    pub fn apply(&self, message: &Value, append: bool) -> Result<Value, TransformError> {
        let Value::Object(source) = message else {
            return Err(TransformError::MessageNotObject);
        };

        let mut out = if append {
            flatten(source)
        } else {
            FlatMap::new()
        };

        for (path, leaf) in &self.leaves {
            let LeafSpec::Query(query) = leaf else {
                if let Some(value) = leaf.literal_value() {
                    out.insert(path.clone(), value);
                }
                continue;
            };

            let matches = query.find(message);
            let Some(found) = matches.first() else {
                warn!("Query '{}' for '{}' matched nothing and was ignored", query, path);
                continue;
            };
            if matches.len() > 1 {
                warn!(
                    "Query '{}' for '{}' matched {} values, using the first",
                    query,
                    path,
                    matches.len()
                );
            }

            out.insert(path.clone(), found.value.clone());
            if append && found.path != *path {
                out.shift_remove(&found.path);
            }
        }

        unflatten(out).map(Value::Object)
    }
}

/// Compile `spec` and apply it to `message` in one go
pub fn transform_message(
    message: &Value,
    spec: &Value,
    append: bool,
) -> Result<Value, TransformError> {
    TransformSpec::compile(spec)?.apply(message, append)
}

/// A transform table entry ready for use
#[derive(Debug, Clone)]
pub struct TransformRule {
    /// Topic pattern the rule was registered under
    pub topic: String,
    /// Start from a copy of the message
    pub append: bool,
    /// Compiled spec, or why it failed to compile
    ///
    /// A broken rule still claims its topics; every message it selects is
    /// forwarded unchanged.
    pub spec: Result<TransformSpec, TransformError>,
}

/// Payload transform stage
///
/// Classifies each message topic through its own trie and applies the
/// selected rule. Messages without a rule pass through unchanged.
#[derive(Debug, Default)]
pub struct MessageRewriter {
    trie: TopicTrie<RuleId>,
    rules: Vec<TransformRule>,
}

impl MessageRewriter {
    /// Build the stage from its configuration table
    ///
    /// Only a malformed table fails. A spec that does not compile is logged
    /// and kept as a broken rule.
    pub fn new(config: &MessageRewriterConfig) -> Result<Self, ConfigError> {
        let mut trie = TopicTrie::new();
        let mut rules = Vec::with_capacity(config.entries.len());

        for (id, entry) in config.entries.iter().enumerate() {
            if entry.has_conflicting_spec() {
                return Err(ConfigError::Validation(format!(
                    "Transform entry {} ('{}') cannot have both 'spec' and 'spec_json'",
                    id, entry.topic
                )));
            }

            let spec = TransformSpec::compile(&entry.resolve_spec());
            if let Err(e) = &spec {
                error!(
                    "Transform entry {} ('{}') has an invalid spec, matching messages will pass unchanged: {}",
                    id, entry.topic, e
                );
            }

            trie.insert(&entry.topic, id);
            rules.push(TransformRule {
                topic: entry.topic.clone(),
                append: entry.append,
                spec,
            });
        }

        debug!("Transform rules: {:?}", rules);
        debug!("Transform trie:\n{}", trie);

        Ok(Self { trie, rules })
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Rule selected for a topic, if any
    pub fn rule_for(&self, topic: &str) -> Option<&TransformRule> {
        let id = *self.trie.lookup(topic)?;
        self.rules.get(id)
    }

    /// Transform a payload for a topic
    ///
    /// Returns `Ok(None)` when no rule applies.
    pub fn rewrite_payload(
        &self,
        topic: &str,
        payload: &Value,
    ) -> Result<Option<Value>, TransformError> {
        let Some(rule) = self.rule_for(topic) else {
            return Ok(None);
        };

        debug!(
            "Transforming '{}' with rule '{}' ({})",
            topic,
            rule.topic,
            if rule.append { "append" } else { "replace" }
        );
        let spec = rule.spec.as_ref().map_err(Clone::clone)?;
        spec.apply(payload, rule.append).map(Some)
    }
}

impl Stage for MessageRewriter {
    fn name(&self) -> &'static str {
        "json_message_rewriter"
    }

    fn process(&self, envelope: Envelope) -> Outcome {
        match self.rewrite_payload(&envelope.topic, &envelope.payload) {
            Ok(Some(payload)) => Outcome::Rewritten(Envelope {
                topic: envelope.topic,
                payload,
            }),
            Ok(None) => Outcome::PassedThrough(envelope),
            Err(e) => {
                error!(
                    "Transform of '{}' failed, forwarding original payload: {}",
                    envelope.topic, e
                );
                Outcome::Failed(envelope)
            }
        }
    }
}
