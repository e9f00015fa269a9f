use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One catalog item as returned by similarity search: the matched content
/// fragment, a similarity distance (lower is a closer match), chunk
/// provenance when the source entry was split into several indexable
/// fragments, and every remaining item field (category, price, rating,
/// stock, arbitrary attributes) flattened into a single ordered map.
///
/// The map is a `BTreeMap` so iteration order is lexicographic, which keeps
/// anything derived from field discovery reproducible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResultItem {
    pub content: String,
    pub score: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_chunks: Option<usize>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl SearchResultItem {
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Field value coerced to a number; accepts JSON numbers and numeric
    /// strings, since catalog metadata is not guaranteed a clean schema.
    pub fn numeric_field(&self, key: &str) -> Option<f64> {
        self.fields.get(key).and_then(as_number)
    }

    /// Item price, defaulting to 0 when absent or unparseable.
    pub fn price(&self) -> f64 {
        self.numeric_field("price").unwrap_or(0.0)
    }
}

/// Coerce a JSON value to a number, tolerating numeric strings.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(fields: Value) -> SearchResultItem {
        serde_json::from_value(json!({
            "content": "desc",
            "score": 0.4,
        }))
        .map(|mut it: SearchResultItem| {
            it.fields = serde_json::from_value(fields).unwrap();
            it
        })
        .unwrap()
    }

    #[test]
    fn flattened_metadata_round_trips() {
        let raw = json!({
            "content": "Trail shoe | Category: Footwear",
            "score": 0.5,
            "chunk_index": 0,
            "total_chunks": 2,
            "name": "Trail Runner",
            "price": "129.99",
            "rating": 4.6,
            "stock": 12
        });

        let parsed: SearchResultItem = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.chunk_index, Some(0));
        assert_eq!(parsed.total_chunks, Some(2));
        assert_eq!(parsed.field("name"), Some(&json!("Trail Runner")));
        assert_eq!(parsed.numeric_field("price"), Some(129.99));
        assert_eq!(parsed.numeric_field("rating"), Some(4.6));

        let back = serde_json::to_value(&parsed).unwrap();
        assert_eq!(back["name"], json!("Trail Runner"));
        assert_eq!(back["score"], json!(0.5));
    }

    #[test]
    fn price_defaults_to_zero() {
        assert_eq!(item(json!({})).price(), 0.0);
        assert_eq!(item(json!({"price": "not a number"})).price(), 0.0);
        assert_eq!(item(json!({"price": 75})).price(), 75.0);
    }

    #[test]
    fn numeric_coercion_handles_strings_and_numbers() {
        assert_eq!(as_number(&json!(4.5)), Some(4.5));
        assert_eq!(as_number(&json!("4.5")), Some(4.5));
        assert_eq!(as_number(&json!(" 12 ")), Some(12.0));
        assert_eq!(as_number(&json!(true)), None);
        assert_eq!(as_number(&json!(null)), None);
    }
}
