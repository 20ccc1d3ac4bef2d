//! Path queries over JSON messages
//!
//! A small JSONPath dialect used by spec leaves to pull values out of the
//! incoming message:
//!
//! - `readings.temp` / `$.readings.temp` - child fields
//! - `['odd.key']` / `["odd key"]` - quoted field names
//! - `values[0]`, `values[-1]` - array elements
//! - `*` / `[*]` - every child of an object or array
//! - `..temp` / `..*` - recursive descent
//!
//! Only the forms above are supported. Filters (`[?(...)]`), slices
//! (`[1:3]`) and unions (`[0,1]`) are parse errors rather than silent
//! mismatches.
//!
//! Matches come back in document order, each with the flat path it was
//! found at (`a.b.[0]` for array elements).

use std::fmt;

use serde_json::Value;

/// A query that failed to parse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryError {
    pub expression: String,
    pub reason: String,
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid query '{}': {}", self.expression, self.reason)
    }
}

impl std::error::Error for QueryError {}

#[derive(Debug, Clone, PartialEq)]
enum Step {
    /// Named child of an object
    Field(String),
    /// Element of an array; negative counts from the end
    Index(i64),
    /// Every child
    Wildcard,
    /// Named field anywhere below
    DescendantField(String),
    /// Every node below
    DescendantWildcard,
}

/// A value found by a query
#[derive(Debug, Clone, PartialEq)]
pub struct QueryMatch<'a> {
    pub value: &'a Value,
    /// Flat path of the value inside the queried document
    pub path: String,
}

/// A parsed query expression
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    source: String,
    steps: Vec<Step>,
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Query {
    pub fn parse(expression: &str) -> Result<Self, QueryError> {
        let steps = Parser::new(expression).parse()?;
        Ok(Self {
            source: expression.to_string(),
            steps,
        })
    }

    /// The expression as written
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Evaluate against a document
    pub fn find<'a>(&self, root: &'a Value) -> Vec<QueryMatch<'a>> {
        let mut current = vec![QueryMatch {
            value: root,
            path: String::new(),
        }];

        for step in &self.steps {
            let mut next = Vec::new();
            for found in &current {
                apply_step(step, found.value, &found.path, &mut next);
            }
            current = next;
            if current.is_empty() {
                break;
            }
        }

        current
    }
}

fn child_path(parent: &str, segment: &str) -> String {
    if parent.is_empty() {
        segment.to_string()
    } else {
        format!("{}.{}", parent, segment)
    }
}

fn index_path(parent: &str, index: usize) -> String {
    child_path(parent, &format!("[{}]", index))
}

fn apply_step<'a>(step: &Step, value: &'a Value, path: &str, out: &mut Vec<QueryMatch<'a>>) {
    match step {
        Step::Field(name) => {
            if let Some(child) = value.as_object().and_then(|map| map.get(name)) {
                out.push(QueryMatch {
                    value: child,
                    path: child_path(path, name),
                });
            }
        }
        Step::Index(index) => {
            if let Some(items) = value.as_array() {
                let resolved = if *index < 0 {
                    items.len().checked_sub(index.unsigned_abs() as usize)
                } else {
                    Some(*index as usize)
                };
                if let Some(i) = resolved {
                    if let Some(child) = items.get(i) {
                        out.push(QueryMatch {
                            value: child,
                            path: index_path(path, i),
                        });
                    }
                }
            }
        }
        Step::Wildcard => push_children(value, path, out),
        Step::DescendantField(name) => {
            let field = Step::Field(name.clone());
            descend(value, path, &mut |node, node_path| {
                apply_step(&field, node, node_path, out)
            });
        }
        Step::DescendantWildcard => {
            descend(value, path, &mut |node, node_path| {
                push_children(node, node_path, out)
            });
        }
    }
}

fn push_children<'a>(value: &'a Value, path: &str, out: &mut Vec<QueryMatch<'a>>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                out.push(QueryMatch {
                    value: child,
                    path: child_path(path, key),
                });
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                out.push(QueryMatch {
                    value: child,
                    path: index_path(path, i),
                });
            }
        }
        _ => {}
    }
}

/// Visit `value` and every node below it, parents first
fn descend<'a, F>(value: &'a Value, path: &str, visit: &mut F)
where
    F: FnMut(&'a Value, &str),
{
    visit(value, path);
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                descend(child, &child_path(path, key), visit);
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                descend(child, &index_path(path, i), visit);
            }
        }
        _ => {}
    }
}

struct Parser<'a> {
    expression: &'a str,
    rest: &'a str,
}

impl<'a> Parser<'a> {
    fn new(expression: &'a str) -> Self {
        Self {
            expression,
            rest: expression.trim(),
        }
    }

    fn error(&self, reason: impl Into<String>) -> QueryError {
        QueryError {
            expression: self.expression.to_string(),
            reason: reason.into(),
        }
    }

    fn parse(mut self) -> Result<Vec<Step>, QueryError> {
        if self.rest.is_empty() {
            return Err(self.error("empty expression"));
        }

        let mut steps = Vec::new();

        if let Some(rest) = self.rest.strip_prefix('$') {
            self.rest = rest;
        } else if !self.rest.starts_with(['.', '[']) {
            // leading field without a dot
            steps.push(self.dotted_step()?);
        }

        while !self.rest.is_empty() {
            let step = if let Some(rest) = self.rest.strip_prefix("..") {
                self.rest = rest;
                match self.dotted_step()? {
                    Step::Field(name) => Step::DescendantField(name),
                    Step::Wildcard => Step::DescendantWildcard,
                    _ => return Err(self.error("expected a field name after '..'")),
                }
            } else if let Some(rest) = self.rest.strip_prefix('.') {
                self.rest = rest;
                self.dotted_step()?
            } else if let Some(rest) = self.rest.strip_prefix('[') {
                self.rest = rest;
                self.bracket_step()?
            } else {
                return Err(self.error(format!("unexpected input at '{}'", self.rest)));
            };
            steps.push(step);
        }

        Ok(steps)
    }

    /// `*` or a bare field name
    fn dotted_step(&mut self) -> Result<Step, QueryError> {
        let rest = self.rest;
        let end = rest.find(['.', '[', ']']).unwrap_or(rest.len());
        let name = rest[..end].trim();
        self.rest = &rest[end..];

        match name {
            "" => Err(self.error("expected a field name")),
            "*" => Ok(Step::Wildcard),
            name => Ok(Step::Field(name.to_string())),
        }
    }

    /// Contents of `[...]` after the opening bracket
    fn bracket_step(&mut self) -> Result<Step, QueryError> {
        let inner = self.rest.trim_start();

        if let Some(quote) = inner.chars().next().filter(|c| *c == '\'' || *c == '"') {
            let body = &inner[1..];
            let Some(close) = body.find(quote) else {
                return Err(self.error("unterminated quoted field name"));
            };
            let name = &body[..close];
            let after = body[close + 1..].trim_start();
            let Some(rest) = after.strip_prefix(']') else {
                return Err(self.error("expected ']' after quoted field name"));
            };
            self.rest = rest;
            return Ok(Step::Field(name.to_string()));
        }

        let Some(close) = inner.find(']') else {
            return Err(self.error("missing ']'"));
        };
        let token = inner[..close].trim();
        self.rest = &inner[close + 1..];

        if token == "*" {
            return Ok(Step::Wildcard);
        }
        token
            .parse::<i64>()
            .map(Step::Index)
            .map_err(|_| self.error(format!("invalid index '{}'", token)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "readings": {"temp": 21.5, "humidity": 40},
            "device": {"id": "m-42", "meta": {"temp": -1}},
            "values": [10, 20, 30],
            "odd.key": "dotted"
        })
    }

    fn find(expression: &str, document: &Value) -> Vec<(Value, String)> {
        Query::parse(expression)
            .unwrap()
            .find(document)
            .into_iter()
            .map(|m| (m.value.clone(), m.path))
            .collect()
    }

    #[test]
    fn test_dotted_path() {
        let doc = sample();
        assert_eq!(
            find("readings.temp", &doc),
            vec![(json!(21.5), "readings.temp".to_string())]
        );
        assert_eq!(find("$.readings.temp", &doc), find("readings.temp", &doc));
    }

    #[test]
    fn test_missing_path() {
        let doc = sample();
        assert!(find("readings.pressure", &doc).is_empty());
        assert!(find("readings.temp.deeper", &doc).is_empty());
        assert!(find("values.temp", &doc).is_empty());
    }

    #[test]
    fn test_root() {
        let doc = json!({"a": 1});
        assert_eq!(find("$", &doc), vec![(doc.clone(), String::new())]);
    }

    #[test]
    fn test_quoted_field() {
        let doc = sample();
        assert_eq!(
            find("['odd.key']", &doc),
            vec![(json!("dotted"), "odd.key".to_string())]
        );
        assert_eq!(
            find("$[\"readings\"].humidity", &doc),
            vec![(json!(40), "readings.humidity".to_string())]
        );
    }

    #[test]
    fn test_index() {
        let doc = sample();
        assert_eq!(
            find("values[1]", &doc),
            vec![(json!(20), "values.[1]".to_string())]
        );
        assert_eq!(
            find("values[-1]", &doc),
            vec![(json!(30), "values.[2]".to_string())]
        );
        assert!(find("values[3]", &doc).is_empty());
        assert!(find("values[-4]", &doc).is_empty());
    }

    #[test]
    fn test_wildcards() {
        let doc = sample();
        let readings: Vec<String> = find("readings.*", &doc).into_iter().map(|m| m.1).collect();
        assert_eq!(readings, vec!["readings.temp", "readings.humidity"]);

        let values: Vec<Value> = find("values[*]", &doc).into_iter().map(|m| m.0).collect();
        assert_eq!(values, vec![json!(10), json!(20), json!(30)]);
    }

    #[test]
    fn test_recursive_descent_in_document_order() {
        let doc = sample();
        assert_eq!(
            find("..temp", &doc),
            vec![
                (json!(21.5), "readings.temp".to_string()),
                (json!(-1), "device.meta.temp".to_string()),
            ]
        );
        assert_eq!(find("$..id", &doc), vec![(json!("m-42"), "device.id".to_string())]);
    }

    #[test]
    fn test_recursive_wildcard() {
        let doc = json!({"a": {"b": 1}});
        let paths: Vec<String> = find("..*", &doc).into_iter().map(|m| m.1).collect();
        assert_eq!(paths, vec!["a", "a.b"]);
    }

    #[test]
    fn test_parse_errors() {
        for bad in ["", "   ", "a.", "a..", "a[", "a[x]", "a['b'", "a['b'x]", "a]b", "..[0]"] {
            assert!(Query::parse(bad).is_err(), "expected error for {:?}", bad);
        }
    }

    #[test]
    fn test_unsupported_forms_are_rejected() {
        for bad in ["values[1:3]", "values[:2]", "values[0,1]", "a['b','c']", "values[?(@ > 10)]"] {
            assert!(Query::parse(bad).is_err(), "expected error for {:?}", bad);
        }
    }

    #[test]
    fn test_display_keeps_source() {
        let query = Query::parse("$.a.b").unwrap();
        assert_eq!(query.to_string(), "$.a.b");
        assert_eq!(query.as_str(), "$.a.b");
    }
}
