use std::collections::HashMap;

use serde_json::Value;

/// One filter condition against a record field (spec.md §4.1 `query`'s
/// filter DSL: equality, `__in`, `__like`, `__gt/__lt/__gte/__lte`,
/// `__null`, `__not_null`), ported in spirit from
/// `examples/original_source/src/feedspine/models/query.py`'s
/// `Query.where*` suffix convention.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    Eq(Value),
    In(Vec<Value>),
    Like(String),
    Gt(Value),
    Lt(Value),
    Gte(Value),
    Lte(Value),
    IsNull,
    IsNotNull,
}

/// A set of named filter conditions. Keys may be a bare top-level record
/// field (`"layer"`) or a dotted content path (`"content.form_type"`) —
/// `InMemoryStorage` walks the dotted path directly against the record's
/// `serde_json::Value` view; `PostgresStorage` compiles it to `content ->
/// 'form_type'` jsonb access (SPEC_FULL.md §4.1).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filters(pub HashMap<String, FilterOp>);

impl Filters {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    pub fn with(mut self, field: impl Into<String>, op: FilterOp) -> Self {
        self.0.insert(field.into(), op);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Evaluate `op` against `value` (a field already extracted from the
/// candidate record, possibly via a dotted content path).
pub fn matches(op: &FilterOp, value: Option<&Value>) -> bool {
    match op {
        FilterOp::Eq(expected) => value == Some(expected),
        FilterOp::In(values) => value.map(|v| values.contains(v)).unwrap_or(false),
        FilterOp::Like(pattern) => value
            .and_then(|v| v.as_str())
            .map(|s| like_matches(pattern, s))
            .unwrap_or(false),
        FilterOp::Gt(expected) => compare(value, expected).map(|o| o.is_gt()).unwrap_or(false),
        FilterOp::Lt(expected) => compare(value, expected).map(|o| o.is_lt()).unwrap_or(false),
        FilterOp::Gte(expected) => compare(value, expected).map(|o| o.is_ge()).unwrap_or(false),
        FilterOp::Lte(expected) => compare(value, expected).map(|o| o.is_le()).unwrap_or(false),
        FilterOp::IsNull => value.is_none() || value == Some(&Value::Null),
        FilterOp::IsNotNull => value.is_some() && value != Some(&Value::Null),
    }
}

/// Compare two JSON scalars. Numbers compare numerically; strings
/// lexicographically; anything else is incomparable (`None`).
fn compare(value: Option<&Value>, expected: &Value) -> Option<std::cmp::Ordering> {
    let value = value?;
    match (value, expected) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// SQL-`LIKE`-ish glob matching: `%` matches any run of characters, `_`
/// matches exactly one. Anchors the full string.
fn like_matches(pattern: &str, text: &str) -> bool {
    fn go(pattern: &[char], text: &[char]) -> bool {
        match pattern.first() {
            None => text.is_empty(),
            Some('%') => go(&pattern[1..], text) || (!text.is_empty() && go(pattern, &text[1..])),
            Some('_') => !text.is_empty() && go(&pattern[1..], &text[1..]),
            Some(c) => text.first() == Some(c) && go(&pattern[1..], &text[1..]),
        }
    }
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    go(&pattern, &text)
}

/// Extract a field from a record's JSON view, walking dotted `content.`
/// paths. Top-level fields are looked up directly; anything else is
/// assumed to live under `content`.
pub fn extract<'a>(record: &'a Value, field: &str) -> Option<&'a Value> {
    if let Some(rest) = field.strip_prefix("content.") {
        let mut cur = record.get("content")?;
        for part in rest.split('.') {
            cur = cur.get(part)?;
        }
        Some(cur)
    } else if field.contains('.') {
        let mut cur: Option<&Value> = Some(record);
        for part in field.split('.') {
            cur = cur.and_then(|v| v.get(part));
        }
        cur
    } else {
        record.get(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn eq_matches_exact_value() {
        assert!(matches(&FilterOp::Eq(json!("a")), Some(&json!("a"))));
        assert!(!matches(&FilterOp::Eq(json!("a")), Some(&json!("b"))));
    }

    #[test]
    fn in_matches_membership() {
        let op = FilterOp::In(vec![json!("a"), json!("b")]);
        assert!(matches(&op, Some(&json!("b"))));
        assert!(!matches(&op, Some(&json!("c"))));
    }

    #[test]
    fn like_supports_percent_wildcard() {
        assert!(like_matches("%Corp%", "Acme Corp Inc"));
        assert!(!like_matches("%Corp%", "Acme Inc"));
        assert!(like_matches("10-%", "10-K"));
    }

    #[test]
    fn numeric_comparisons() {
        assert!(matches(&FilterOp::Gt(json!(5)), Some(&json!(10))));
        assert!(!matches(&FilterOp::Gt(json!(5)), Some(&json!(3))));
        assert!(matches(&FilterOp::Lte(json!(5)), Some(&json!(5))));
    }

    #[test]
    fn null_checks() {
        assert!(matches(&FilterOp::IsNull, None));
        assert!(matches(&FilterOp::IsNull, Some(&Value::Null)));
        assert!(!matches(&FilterOp::IsNotNull, None));
        assert!(matches(&FilterOp::IsNotNull, Some(&json!(1))));
    }

    #[test]
    fn extract_walks_dotted_content_path() {
        let record = json!({"content": {"form_type": "10-K", "nested": {"x": 1}}});
        assert_eq!(extract(&record, "content.form_type"), Some(&json!("10-K")));
        assert_eq!(extract(&record, "content.nested.x"), Some(&json!(1)));
        assert_eq!(extract(&record, "content.missing"), None);
    }

    #[test]
    fn extract_top_level_field() {
        let record = json!({"layer": "bronze"});
        assert_eq!(extract(&record, "layer"), Some(&json!("bronze")));
    }
}
