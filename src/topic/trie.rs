//! Topic Trie for rule classification
//!
//! A trie (prefix tree) keyed by topic level that maps a topic to at most one
//! registered rule. Supports wildcards (+ and #) in the registered patterns.
//!
//! Lookup precedence is fixed per level: literal child, then `+` child, then
//! `#` child. A literal subtree that fails to produce a rule falls back to the
//! wildcard siblings at the same level.
//!
//! Performance optimizations:
//! - Uses compact_str for memory-efficient topic level storage
//! - Uses SmallVec for topic levels to avoid heap allocation on lookup

use std::fmt;

use ahash::AHashMap;
use compact_str::CompactString;
use smallvec::SmallVec;

use super::validation::{parse_levels, TopicLevel};

/// Node in the topic trie
#[derive(Debug)]
struct TrieNode<V> {
    /// Rule stored at this node (pattern ends exactly here)
    value: Option<V>,
    /// Children indexed by literal topic level
    children: AHashMap<CompactString, TrieNode<V>>,
    /// Single-level wildcard (+) child
    single_wildcard: Option<Box<TrieNode<V>>>,
    /// Multi-level wildcard (#) rule; always terminal
    multi_wildcard: Option<V>,
}

impl<V> TrieNode<V> {
    fn new() -> Self {
        Self {
            value: None,
            children: AHashMap::with_capacity(4),
            single_wildcard: None,
            multi_wildcard: None,
        }
    }
}

impl<V> Default for TrieNode<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Topic Trie mapping topics to rule identifiers
#[derive(Debug)]
pub struct TopicTrie<V> {
    root: TrieNode<V>,
    len: usize,
}

impl<V> TopicTrie<V> {
    pub fn new() -> Self {
        Self {
            root: TrieNode::new(),
            len: 0,
        }
    }

    /// Insert a topic pattern with associated value
    ///
    /// Levels after a `#` are ignored. Re-inserting an identical pattern
    /// replaces the previous value.
    pub fn insert(&mut self, pattern: &str, value: V) {
        let mut node = &mut self.root;
        let mut levels = parse_levels(pattern).peekable();

        while let Some(level) = levels.next() {
            let is_last = levels.peek().is_none();

            node = match level {
                TopicLevel::MultiWildcard => {
                    if node.multi_wildcard.replace(value).is_none() {
                        self.len += 1;
                    }
                    return;
                }
                TopicLevel::SingleWildcard => node
                    .single_wildcard
                    .get_or_insert_with(|| Box::new(TrieNode::new()))
                    .as_mut(),
                TopicLevel::Normal(name) => {
                    node.children.entry(CompactString::new(name)).or_default()
                }
            };

            if is_last {
                if node.value.replace(value).is_none() {
                    self.len += 1;
                }
                return;
            }
        }
    }

    /// Find the rule registered for a topic
    pub fn lookup(&self, topic: &str) -> Option<&V> {
        let levels: SmallVec<[&str; 8]> = topic.split('/').collect();
        Self::lookup_recursive(&self.root, &levels)
    }

    fn lookup_recursive<'a>(node: &'a TrieNode<V>, levels: &[&str]) -> Option<&'a V> {
        let Some((level, rest)) = levels.split_first() else {
            // `#` also covers the parent level itself
            return node.value.as_ref().or(node.multi_wildcard.as_ref());
        };

        if let Some(child) = node.children.get(*level) {
            if let Some(v) = Self::lookup_recursive(child, rest) {
                return Some(v);
            }
        }

        if let Some(child) = node.single_wildcard.as_deref() {
            if let Some(v) = Self::lookup_recursive(child, rest) {
                return Some(v);
            }
        }

        node.multi_wildcard.as_ref()
    }

    /// Number of distinct patterns stored
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<V> Default for TopicTrie<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> FromIterator<(String, V)> for TopicTrie<V> {
    fn from_iter<I: IntoIterator<Item = (String, V)>>(iter: I) -> Self {
        let mut trie = TopicTrie::new();
        for (pattern, value) in iter {
            trie.insert(&pattern, value);
        }
        trie
    }
}

/// Indented tree rendering, used for startup debug logs
impl<V: fmt::Display> fmt::Display for TopicTrie<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn render<V: fmt::Display>(
            node: &TrieNode<V>,
            depth: usize,
            f: &mut fmt::Formatter<'_>,
        ) -> fmt::Result {
            let indent = "  ".repeat(depth);
            let mut names: Vec<&CompactString> = node.children.keys().collect();
            names.sort();
            for name in names {
                let child = &node.children[name];
                write!(f, "{}{}", indent, name)?;
                if let Some(ref v) = child.value {
                    write!(f, " -> {}", v)?;
                }
                writeln!(f)?;
                render(child, depth + 1, f)?;
            }
            if let Some(ref child) = node.single_wildcard {
                write!(f, "{}+", indent)?;
                if let Some(ref v) = child.value {
                    write!(f, " -> {}", v)?;
                }
                writeln!(f)?;
                render(child, depth + 1, f)?;
            }
            if let Some(ref v) = node.multi_wildcard {
                writeln!(f, "{}# -> {}", indent, v)?;
            }
            Ok(())
        }

        render(&self.root, 0, f)
    }
}
