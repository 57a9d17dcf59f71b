use serde_json::Value;

use feedspine_core::hex_sha256;

/// Default hex-digest length used by [`generate_content_key`], matching
/// `examples/original_source/src/feedspine/utils/keys.py::generate_content_key`'s
/// default `hash_length=16`.
pub const DEFAULT_HASH_LENGTH: usize = 16;

/// Builds a stable natural key from a content hash, for adapters whose
/// source rows carry no usable identifier of their own (spec.md §9 "key
/// strategy is the adapter's own choice"). Ported from
/// `examples/original_source/src/feedspine/utils/keys.py::generate_content_key`:
/// values are normalized (object keys sorted, strings lowercased and
/// whitespace-collapsed) before hashing, so logically identical content
/// always yields the same key regardless of field order or incidental
/// whitespace.
pub fn generate_content_key(content: &Value, prefix: &str, fields: Option<&[&str]>, hash_length: usize) -> String {
    let selected = match (content.as_object(), fields) {
        (Some(obj), Some(fields)) => {
            let mut filtered = serde_json::Map::new();
            for field in fields {
                if let Some(v) = obj.get(*field) {
                    filtered.insert((*field).to_string(), v.clone());
                }
            }
            Value::Object(filtered)
        }
        _ => content.clone(),
    };

    let normalized = normalize_for_hash(&selected);
    let serialized = serde_json::to_string(&normalized).unwrap_or_default();
    let digest = hex_sha256(serialized.as_bytes());
    let truncated = &digest[..hash_length.min(digest.len())];
    format!("{prefix}_{truncated}")
}

fn normalize_for_hash(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted = serde_json::Map::new();
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                sorted.insert(key.clone(), normalize_for_hash(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(normalize_for_hash).collect()),
        Value::String(s) => Value::String(s.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")),
        Value::Null => Value::String(String::new()),
        other => other.clone(),
    }
}

/// Joins a fixed list of row fields into a single deterministic key,
/// lowercased and `::`-separated. Ported from
/// `examples/original_source/src/feedspine/utils/keys.py::CompositeKeyBuilder`.
/// Missing fields contribute an empty segment rather than failing the
/// build, since source rows commonly omit optional columns.
pub struct CompositeKeyBuilder {
    fields: Vec<String>,
    separator: String,
}

impl CompositeKeyBuilder {
    pub fn new(fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            separator: "::".to_string(),
        }
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    pub fn build(&self, row: &Value) -> String {
        self.fields
            .iter()
            .map(|field| {
                row.get(field)
                    .map(value_to_key_segment)
                    .unwrap_or_default()
            })
            .collect::<Vec<_>>()
            .join(&self.separator)
    }
}

fn value_to_key_segment(value: &Value) -> String {
    match value {
        Value::String(s) => s.to_lowercase(),
        Value::Null => String::new(),
        other => other.to_string().to_lowercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_key_is_order_and_case_insensitive() {
        let a = serde_json::json!({"title": "Hello", "body": "World"});
        let b = serde_json::json!({"body": "world", "title": "hello"});
        assert_eq!(
            generate_content_key(&a, "ch", None, DEFAULT_HASH_LENGTH),
            generate_content_key(&b, "ch", None, DEFAULT_HASH_LENGTH)
        );
    }

    #[test]
    fn content_key_respects_field_selection() {
        let full = serde_json::json!({"title": "News", "body": "Content"});
        let restricted = serde_json::json!({"title": "News"});
        assert_eq!(
            generate_content_key(&full, "ch", Some(&["title"]), DEFAULT_HASH_LENGTH),
            generate_content_key(&restricted, "ch", None, DEFAULT_HASH_LENGTH)
        );
    }

    #[test]
    fn content_key_has_prefix_and_length() {
        let key = generate_content_key(&serde_json::json!({"a": 1}), "ch", None, 16);
        assert!(key.starts_with("ch_"));
        assert_eq!(key.len(), "ch_".len() + 16);
    }

    #[test]
    fn composite_key_joins_lowercased_fields() {
        let builder = CompositeKeyBuilder::new(["author", "date", "title"]);
        let row = serde_json::json!({"author": "John", "date": "2024-01-01", "title": "Hello"});
        assert_eq!(builder.build(&row), "john::2024-01-01::hello");
    }

    #[test]
    fn composite_key_tolerates_missing_fields() {
        let builder = CompositeKeyBuilder::new(["author", "title"]);
        let row = serde_json::json!({"title": "Hello"});
        assert_eq!(builder.build(&row), "::hello");
    }
}
