//! Topic pattern parsing and validation
//!
//! Key rules:
//! - Levels are separated by `/`
//! - Single-level wildcard (+) matches exactly one level
//! - Multi-level wildcard (#) matches any remaining levels, including none,
//!   and is only meaningful as the final level
//! - A wildcard character embedded inside a level is a literal character

/// Represents a level in a topic pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicLevel<'a> {
    /// Literal topic level
    Normal(&'a str),
    /// Single-level wildcard (+)
    SingleWildcard,
    /// Multi-level wildcard (#)
    MultiWildcard,
}

/// Parse a pattern into levels
pub fn parse_levels(pattern: &str) -> impl Iterator<Item = TopicLevel<'_>> {
    pattern.split('/').map(|level| match level {
        "+" => TopicLevel::SingleWildcard,
        "#" => TopicLevel::MultiWildcard,
        s => TopicLevel::Normal(s),
    })
}

/// Reject patterns that can never be loaded into a rule table
///
/// Patterns:
/// - Must be at least 1 character
/// - Must not exceed 65535 bytes
/// - Must not contain null character
pub fn validate_pattern(pattern: &str) -> Result<(), &'static str> {
    if pattern.is_empty() {
        return Err("topic pattern cannot be empty");
    }

    if pattern.len() > 65535 {
        return Err("topic pattern exceeds maximum length");
    }

    if pattern.contains('\0') {
        return Err("topic pattern cannot contain null character");
    }

    Ok(())
}

/// Report wildcard placement that the trie will interpret loosely
///
/// These patterns still load: levels after `#` are ignored and a wildcard
/// embedded in a level is matched literally. Callers log the returned
/// message as a warning.
pub fn lint_pattern(pattern: &str) -> Option<&'static str> {
    let levels: Vec<&str> = pattern.split('/').collect();

    for (i, level) in levels.iter().enumerate() {
        if level.contains('#') {
            if *level != "#" {
                return Some("multi-level wildcard embedded in a level is matched literally");
            }
            if i != levels.len() - 1 {
                return Some("levels after a multi-level wildcard are ignored");
            }
        }

        if level.contains('+') && *level != "+" {
            return Some("single-level wildcard embedded in a level is matched literally");
        }
    }

    None
}

/// Check if a topic pattern matches a topic
///
/// Straight-line reference matcher, independent of the trie. `#` matches
/// zero or more trailing levels.
pub fn topic_matches_pattern(topic: &str, pattern: &str) -> bool {
    let topic_levels: Vec<&str> = topic.split('/').collect();
    let mut ti = 0;

    for level in parse_levels(pattern) {
        match level {
            TopicLevel::MultiWildcard => return true,
            TopicLevel::SingleWildcard => {
                if ti >= topic_levels.len() {
                    return false;
                }
                ti += 1;
            }
            TopicLevel::Normal(expected) => {
                if ti >= topic_levels.len() || topic_levels[ti] != expected {
                    return false;
                }
                ti += 1;
            }
        }
    }

    ti == topic_levels.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_parse_levels() {
        let levels: Vec<_> = parse_levels("a/+/#").collect();
        assert_eq!(
            levels,
            vec![
                TopicLevel::Normal("a"),
                TopicLevel::SingleWildcard,
                TopicLevel::MultiWildcard
            ]
        );
    }

    #[test]
    fn test_validate_pattern() {
        assert!(validate_pattern("a/b").is_ok());
        assert!(validate_pattern("#").is_ok());
        assert!(validate_pattern("").is_err());
        assert!(validate_pattern("a\0b").is_err());
    }

    #[test]
    fn test_lint_pattern() {
        assert_eq!(lint_pattern("a/+/#"), None);
        assert!(lint_pattern("a/#/b").is_some());
        assert!(lint_pattern("a/b#").is_some());
        assert!(lint_pattern("a+/b").is_some());
    }

    #[test_case("a/b", "a/b", true ; "exact")]
    #[test_case("a/b", "a/c", false ; "literal mismatch")]
    #[test_case("a/b", "a/+", true ; "single wildcard")]
    #[test_case("a/b/c", "a/+", false ; "single wildcard one level only")]
    #[test_case("a", "a/+", false ; "single wildcard needs a level")]
    #[test_case("a/b/c", "a/#", true ; "multi wildcard")]
    #[test_case("a", "a/#", true ; "multi wildcard zero levels")]
    #[test_case("b", "a/#", false ; "multi wildcard prefix mismatch")]
    #[test_case("anything/at/all", "#", true ; "bare multi wildcard")]
    #[test_case("a/b", "a/b/c", false ; "pattern longer than topic")]
    fn test_topic_matches_pattern(topic: &str, pattern: &str, expected: bool) {
        assert_eq!(topic_matches_pattern(topic, pattern), expected);
    }
}
