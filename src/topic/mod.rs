//! Topic pattern classification
//!
//! Implements topic pattern validation and the topic trie shared by the
//! topic rewrite and payload transform stages. Each stage builds its own
//! trie once at startup over its own rule table and never mutates it again.

mod trie;
pub mod validation;

pub use trie::TopicTrie;
pub use validation::{
    lint_pattern, parse_levels, topic_matches_pattern, validate_pattern, TopicLevel,
};

/// Identifier of a rule: its zero-based position in the configured table
pub type RuleId = usize;
