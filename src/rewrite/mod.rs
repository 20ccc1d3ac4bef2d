//! Topic Rewriting
//!
//! Maps local bus topics into the remote namespace using a table of
//! [`TopicMapping`] rules selected through the topic trie.
//!
//! Two modes per rule:
//! - prefix substitution (rule has a `pattern`): `local_prefix/` is removed
//!   from the topic and `remote_prefix/` prepended, e.g. with
//!   `local_prefix = "local"`, `pattern = "machine/#"`, `remote_prefix = "remote"`:
//!   `local/machine/42/temp` -> `remote/machine/42/temp`
//! - replace (no `pattern`): every matching topic becomes `remote_prefix`
//!
//! The prefix removal is an unanchored first-occurrence substring removal,
//! so `a/local/x` under `local_prefix = "local"` becomes `a/x`.


use tracing::{debug, error};

use crate::config::{ConfigError, TopicMapping, TopicRewriterConfig};
use crate::envelope::Envelope;
use crate::pipeline::{Outcome, Stage};
use crate::topic::{RuleId, TopicTrie};

/// Strip wildcard characters from a prefix before it is used as literal text
pub fn sanitize(prefix: &str) -> String {
    prefix.chars().filter(|c| !matches!(c, '#' | '+')).collect()
}

/// Rewrite a topic according to one mapping
pub fn rewrite(topic: &str, mapping: &TopicMapping) -> String {
    if mapping.is_replace_mode() {
        return match mapping.remote_prefix() {
            Some(remote) => sanitize(remote),
            None => topic.to_string(),
        };
    }

    let mut result = match mapping.local_prefix() {
        Some(local) => topic.replacen(&format!("{}/", sanitize(local)), "", 1),
        None => topic.to_string(),
    };

    if let Some(remote) = mapping.remote_prefix() {
        result = format!("{}/{}", sanitize(remote), result);
    }

    result
}

/// Topic rewrite stage
#[derive(Debug, Default)]
pub struct TopicRewriter {
    trie: TopicTrie<RuleId>,
    mappings: Vec<TopicMapping>,
}

impl TopicRewriter {
    /// Build the stage from its configuration table
    ///
    /// Rules are registered under their resolved pattern; when two rules
    /// resolve to the same pattern the later one wins.
    pub fn new(config: &TopicRewriterConfig) -> Result<Self, ConfigError> {
        let mut trie = TopicTrie::new();

        for (id, mapping) in config.mappings.iter().enumerate() {
            let pattern = mapping.resolved_pattern().ok_or_else(|| {
                ConfigError::Validation(format!(
                    "Topic mapping {} needs a local_prefix or a pattern",
                    id
                ))
            })?;
            trie.insert(&pattern, id);
        }

        debug!("Topic mappings: {:?}", config.mappings);
        debug!("Topic mapping trie:\n{}", trie);

        Ok(Self {
            trie,
            mappings: config.mappings.clone(),
        })
    }

    pub fn mapping_count(&self) -> usize {
        self.mappings.len()
    }

    /// Mapping selected for a topic, if any
    pub fn mapping_for(&self, topic: &str) -> Option<&TopicMapping> {
        let id = *self.trie.lookup(topic)?;
        let mapping = self.mappings.get(id);
        if mapping.is_none() {
            error!("Topic '{}' resolved to unknown mapping {}", topic, id);
        }
        mapping
    }

    /// Remote topic for a local topic
    ///
    /// Returns `None` when no mapping applies.
    pub fn remap(&self, topic: &str) -> Option<String> {
        let mapping = self.mapping_for(topic)?;
        let remapped = rewrite(topic, mapping);
        debug!("Rewrote topic '{}' -> '{}'", topic, remapped);
        Some(remapped)
    }
}

impl Stage for TopicRewriter {
    fn name(&self) -> &'static str {
        "topic_rewriter"
    }

    fn process(&self, envelope: Envelope) -> Outcome {
        match self.remap(&envelope.topic) {
            Some(topic) => Outcome::Rewritten(Envelope {
                topic,
                payload: envelope.payload,
            }),
            None => Outcome::PassedThrough(envelope),
        }
    }
}
