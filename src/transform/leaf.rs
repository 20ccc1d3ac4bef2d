//! Spec leaf classification
//!
//! Every leaf of a transform spec is a string whose first character selects
//! how it is interpreted:
//!
//! | Leaf           | Meaning                                              |
//! |----------------|------------------------------------------------------|
//! | `#text`        | the literal string `text`                            |
//! | `=true`/`=false` | a boolean (case-insensitive)                       |
//! | `=null`        | JSON null (case-insensitive)                         |
//! | `=42`, `=2.5`  | an integer, else a floating point number             |
//! | anything else  | a query evaluated against the incoming message       |
//!
//! An `=` leaf that is none of the above falls back to a literal string.

use serde_json::{Number, Value};
use tracing::warn;

use super::query::{Query, QueryError};

/// A classified spec leaf
#[derive(Debug, Clone, PartialEq)]
pub enum LeafSpec {
    /// Literal string (`#` sigil, or an unparseable `=` value)
    Literal(String),
    /// Number (`=` sigil)
    Number(Number),
    /// Boolean (`=` sigil)
    Boolean(bool),
    /// Null (`=` sigil)
    Null,
    /// Query expression (no sigil)
    Query(Query),
}

impl LeafSpec {
    /// Classify a raw leaf string
    pub fn parse(raw: &str) -> Result<Self, QueryError> {
        if let Some(text) = raw.strip_prefix('#') {
            return Ok(LeafSpec::Literal(text.to_string()));
        }

        if let Some(rest) = raw.strip_prefix('=') {
            return Ok(Self::parse_typed(rest));
        }

        Query::parse(raw).map(LeafSpec::Query)
    }

    fn parse_typed(rest: &str) -> Self {
        match rest.to_lowercase().as_str() {
            "true" => return LeafSpec::Boolean(true),
            "false" => return LeafSpec::Boolean(false),
            "null" => return LeafSpec::Null,
            _ => {}
        }

        let number = rest.trim();
        if let Ok(n) = number.parse::<i64>() {
            return LeafSpec::Number(n.into());
        }
        if let Ok(n) = number.parse::<u64>() {
            return LeafSpec::Number(n.into());
        }
        if let Some(n) = number.parse::<f64>().ok().and_then(Number::from_f64) {
            return LeafSpec::Number(n);
        }

        warn!("Unable to parse '={}' as a typed value, treating it as a string", rest);
        LeafSpec::Literal(rest.to_string())
    }

    /// The value this leaf always produces, or `None` for a query
    pub fn literal_value(&self) -> Option<Value> {
        match self {
            LeafSpec::Literal(s) => Some(Value::String(s.clone())),
            LeafSpec::Number(n) => Some(Value::Number(n.clone())),
            LeafSpec::Boolean(b) => Some(Value::Bool(*b)),
            LeafSpec::Null => Some(Value::Null),
            LeafSpec::Query(_) => None,
        }
    }
}
